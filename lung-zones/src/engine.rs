//! 分区统计的运行入口.
//!
//! 一次运行处理一对 (体素网格, 标签网格): 校验参数, 生成帧分组, 逐组统计,
//! 最后把结果一次性追加到调用方持有的 [`ResultTable`] 中.
//! 运行失败 (包括被取消) 时结果表保持不变.

use log::{debug, info, warn};

use crate::data::{check_shapes, GridAttr, LabelGrid, VoxelGrid};
use crate::error::{ZonalError, ZonalResult};
use crate::hooks::RunHooks;
use crate::stats::{aggregate_group, AggregateOptions, FrameGrouping, GroupStatistics, SdKind};
use crate::table::{ResultTable, TableForm, TableLayout};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 运行参数.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunParams {
    /// 帧分组方式.
    pub grouping: FrameGrouping,
    /// 分区数. `None` 时取标签网格的最大标签值.
    pub zones: Option<usize>,
    /// 输出表格形式.
    pub form: TableForm,
    /// 是否计算并输出中位数.
    pub median: bool,
    /// 标准差估计方式.
    pub sd: SdKind,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            grouping: FrameGrouping::PerSlice,
            zones: None,
            form: TableForm::Long,
            median: true,
            sd: SdKind::Sample,
        }
    }
}

impl RunParams {
    /// 校验参数. 显式给出的分区数必须在 `[1, 65535]` 内, 取模分组的模数必须为正.
    pub fn validate(&self) -> ZonalResult<()> {
        self.grouping.validate()?;
        match self.zones {
            Some(0) => Err(ZonalError::param("分区数必须为正")),
            Some(n) if n > u16::MAX as usize => Err(ZonalError::param(format!("分区数 {n} 过大"))),
            _ => Ok(()),
        }
    }

    /// 对应的表格布局.
    #[inline]
    pub fn layout(&self) -> TableLayout {
        TableLayout {
            form: self.form,
            median: self.median,
        }
    }

    /// 本次运行实际使用的分区数.
    fn zone_count(&self, labels: &LabelGrid) -> u16 {
        match self.zones {
            Some(n) => n as u16,
            None => labels.max_label(),
        }
    }

    fn aggregate_options(&self, zones: u16) -> AggregateOptions {
        AggregateOptions {
            zones,
            sd: self.sd,
            median: self.median,
            voxel_z: self.grouping.is_whole(),
        }
    }
}

/// 一次运行的摘要.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunSummary {
    /// 分区数.
    pub zones: u16,
    /// 帧分组数.
    pub groups: usize,
    /// 追加到结果表的行数.
    pub rows: usize,
}

/// 计算前的公共校验, 返回分区数. 任何校验失败都发生在计算之前.
fn prepare(
    voxels: &VoxelGrid,
    labels: &LabelGrid,
    params: &RunParams,
    table: &ResultTable,
) -> ZonalResult<u16> {
    params.validate()?;
    table.check_layout(params.layout())?;
    check_shapes(voxels, labels)?;
    let zones = params.zone_count(labels);
    if zones == 0 {
        warn!("Label map contains no zones, nothing to aggregate");
    }
    Ok(zones)
}

/// 计算 `voxels` 与 `labels` 在每个帧分组, 每个分区上的统计量, 不写表.
///
/// 每个帧分组开始前检查取消标记, 完成后报告进度.
pub fn compute(
    voxels: &VoxelGrid,
    labels: &LabelGrid,
    params: &RunParams,
    mut hooks: RunHooks<'_>,
) -> ZonalResult<Vec<GroupStatistics>> {
    params.validate()?;
    check_shapes(voxels, labels)?;
    let zones = params.zone_count(labels);
    aggregate_all(voxels, labels, params, zones, &mut hooks)
}

fn aggregate_all(
    voxels: &VoxelGrid,
    labels: &LabelGrid,
    params: &RunParams,
    zones: u16,
    hooks: &mut RunHooks<'_>,
) -> ZonalResult<Vec<GroupStatistics>> {
    let groups = params.grouping.groups(voxels.len_z())?;
    let opt = params.aggregate_options(zones);
    info!("Processing started: {} frame groups ({}), {zones} zones", groups.len(), params.grouping);

    hooks.report(0, groups.len());
    let mut ans = Vec::with_capacity(groups.len());
    for (i, g) in groups.iter().enumerate() {
        hooks.check()?;
        ans.push(aggregate_group(voxels, labels, g, &opt)?);
        debug!("Processed frame group {i}");
        hooks.report(i + 1, groups.len());
    }
    info!("Processing completed");
    Ok(ans)
}

/// 运行分区统计, 并把结果追加到 `table`.
///
/// `input_vol` 与 `label_map` 是写入表格前两列的名字.
///
/// # 返回值
///
/// 成功时返回 [`RunSummary`]. 参数非法, 形状不一致, 布局与 `table` 不一致,
/// 或被取消时返回 `Err`, 且 `table` 不变.
pub fn run(
    input_vol: &str,
    label_map: &str,
    voxels: &VoxelGrid,
    labels: &LabelGrid,
    params: &RunParams,
    table: &mut ResultTable,
    mut hooks: RunHooks<'_>,
) -> ZonalResult<RunSummary> {
    let zones = prepare(voxels, labels, params, table)?;
    let groups = aggregate_all(voxels, labels, params, zones, &mut hooks)?;
    let rows = table.append(params.layout(), input_vol, label_map, &groups)?;
    Ok(RunSummary {
        zones,
        groups: groups.len(),
        rows,
    })
}

/// 借助 `rayon` 并行统计各帧分组的 [`run`]. 结果与 [`run`] 完全一致.
///
/// 取消标记在每个帧分组开始前检查; 进度仅在全部分组完成后报告一次 `100`.
#[cfg(feature = "rayon")]
pub fn par_run(
    input_vol: &str,
    label_map: &str,
    voxels: &VoxelGrid,
    labels: &LabelGrid,
    params: &RunParams,
    table: &mut ResultTable,
    mut hooks: RunHooks<'_>,
) -> ZonalResult<RunSummary> {
    use rayon::prelude::*;
    use std::sync::atomic::Ordering;

    let zones = prepare(voxels, labels, params, table)?;
    let groups = params.grouping.groups(voxels.len_z())?;
    let opt = params.aggregate_options(zones);
    info!("Processing started: {} frame groups ({}), {zones} zones, parallel", groups.len(), params.grouping);

    let cancel = hooks.cancel_flag();
    let stats = groups
        .par_iter()
        .map(|g| {
            if cancel.is_some_and(|c| c.load(Ordering::Acquire)) {
                return Err(ZonalError::Cancelled);
            }
            aggregate_group(voxels, labels, g, &opt)
        })
        .collect::<ZonalResult<Vec<_>>>()?;
    hooks.report(groups.len(), groups.len());
    info!("Processing completed");

    let rows = table.append(params.layout(), input_vol, label_map, &stats)?;
    Ok(RunSummary {
        zones,
        groups: stats.len(),
        rows,
    })
}
