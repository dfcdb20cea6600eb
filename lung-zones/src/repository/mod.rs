//! 数据仓库: 分区统计引擎与外部存储之间的边界.
//!
//! 引擎只处理已经加载到内存中的 [`VoxelGrid`] 与 [`LabelGrid`];
//! 按名字列举, 加载, 保存网格以及关联显示用颜色表都由 [`VolumeRepository`] 完成.

use std::sync::atomic::{AtomicBool, Ordering};

use itertools::Itertools;
use log::{info, warn};

use crate::consts::GENERIC_ANATOMY_COLORS;
use crate::engine::{self, RunParams};
use crate::error::{ZonalError, ZonalResult};
use crate::hooks::RunHooks;
use crate::stats::{compute_histograms, Histogram, HistogramParams};
use crate::table::ResultTable;
use crate::zone::{partition_volume, PartitionPolicy};
use crate::{GridAttr, LabelGrid, VoxelGrid};

mod memory;
mod nifti_dir;

pub use memory::MemoryRepository;
pub use nifti_dir::{home_dataset_dir_with, NiftiRepository, LABEL_DIR, VOLUME_DIR};

/// 按名字存取体素网格与标签网格.
pub trait VolumeRepository {
    /// 所有体素网格的名字, 升序.
    fn volume_names(&self) -> ZonalResult<Vec<String>>;

    /// 所有标签网格的名字, 升序.
    fn label_map_names(&self) -> ZonalResult<Vec<String>>;

    /// 加载体素网格 `name`. 不存在时返回 `Err(ZonalError::NotFound)`.
    fn load_volume(&self, name: &str) -> ZonalResult<VoxelGrid>;

    /// 加载标签网格 `name`. 不存在时返回 `Err(ZonalError::NotFound)`.
    fn load_label_map(&self, name: &str) -> ZonalResult<LabelGrid>;

    /// 保存 (或覆盖) 标签网格 `name`.
    fn store_label_map(&mut self, name: &str, labels: LabelGrid) -> ZonalResult<()>;

    /// 为标签网格 `name` 关联显示用颜色表. 默认不做任何事.
    fn attach_display(&mut self, _name: &str, _color_table: &str) -> ZonalResult<()> {
        Ok(())
    }
}

/// 对仓库中每一对几何信息一致 (形状, 体素尺寸, 仿射变换均相同) 的
/// (体素网格, 标签网格) 运行分区统计, 结果依次追加到 `table`.
///
/// 进度按已处理的网格对报告; 取消标记在每一对开始前, 以及每个帧分组开始前检查.
///
/// # 返回值
///
/// 成功时返回实际处理的 `(体素网格名, 标签网格名)`, 按名字升序.
/// 被取消时返回 `Err(ZonalError::Cancelled)`, 但已处理的网格对的结果保留在 `table` 中.
pub fn run_all<R: VolumeRepository + ?Sized>(
    repo: &R,
    params: &RunParams,
    table: &mut ResultTable,
    mut hooks: RunHooks<'_>,
) -> ZonalResult<Vec<(String, String)>> {
    params.validate()?;
    table.check_layout(params.layout())?;

    let volumes = repo.volume_names()?;
    let label_maps = repo
        .label_map_names()?
        .into_iter()
        .map(|name| repo.load_label_map(&name).map(|l| (name, l)))
        .collect::<ZonalResult<Vec<_>>>()?;
    info!("Running on {} volumes and {} label maps", volumes.len(), label_maps.len());

    let cancel = hooks.cancel_flag();
    let mut done = vec![];
    hooks.report(0, volumes.len());
    for (i, vname) in volumes.iter().enumerate() {
        hooks.check()?;
        let voxels = repo.load_volume(vname)?;
        for (lname, labels) in label_maps.iter().filter(|(_, l)| voxels.is_aligned_with(l)) {
            info!("Running {vname}/{lname}");
            let inner = match cancel {
                Some(flag) => RunHooks::none().with_cancel(flag),
                None => RunHooks::none(),
            };
            engine::run(vname, lname, &voxels, labels, params, table, inner)?;
            done.push((vname.clone(), lname.clone()));
        }
        hooks.report(i + 1, volumes.len());
    }
    if done.is_empty() {
        warn!("No aligned volume/label map pair found");
    }
    Ok(done)
}

/// 将仓库中每个体素网格的前景沿前后方向切分成 `n` 个分区,
/// 分区结果以 `<体素网格名><suffix>` 为名保存, 并关联 `GenericAnatomyColors` 颜色表.
///
/// 返回保存的标签网格名. 标签网格名与已有体素网格同名时返回 `Err`, 什么都不保存.
pub fn partition_all<R: VolumeRepository + ?Sized>(
    repo: &mut R,
    n: usize,
    policy: PartitionPolicy,
    suffix: &str,
    cancel: Option<&AtomicBool>,
) -> ZonalResult<Vec<String>> {
    let volumes = repo.volume_names()?;
    let targets = volumes.iter().map(|v| format!("{v}{suffix}")).collect_vec();
    if let Some(t) = targets.iter().find(|t| volumes.contains(t)) {
        return Err(ZonalError::param(format!("输出 `{t}` 与输入体素网格同名")));
    }

    let mut ans = vec![];
    for (vname, target) in volumes.iter().zip(targets) {
        if cancel.is_some_and(|c| c.load(Ordering::Acquire)) {
            return Err(ZonalError::Cancelled);
        }
        let voxels = repo.load_volume(vname)?;
        let hooks = match cancel {
            Some(flag) => RunHooks::none().with_cancel(flag),
            None => RunHooks::none(),
        };
        let labels = partition_volume(&voxels, n, policy, hooks)?;
        repo.store_label_map(&target, labels)?;
        repo.attach_display(&target, GENERIC_ANATOMY_COLORS)?;
        info!("Stored {target}");
        ans.push(target);
    }
    Ok(ans)
}

/// 统计仓库中每个体素网格的直方图. 给出 `mask` 时以该标签网格为掩码,
/// 几何信息与掩码不一致的体素网格被跳过.
///
/// 进度按已处理的体素网格报告; 取消标记在每个体素网格开始前, 以及每个帧分组开始前检查.
///
/// # 返回值
///
/// 成功时返回 `(体素网格名, 各帧分组的直方图)`, 按名字升序.
/// 掩码不存在时返回 `Err(ZonalError::NotFound)`.
pub fn histogram_all<R: VolumeRepository + ?Sized>(
    repo: &R,
    mask: Option<&str>,
    params: &HistogramParams,
    mut hooks: RunHooks<'_>,
) -> ZonalResult<Vec<(String, Vec<Histogram>)>> {
    params.validate()?;
    let mask = mask.map(|name| repo.load_label_map(name)).transpose()?;
    let volumes = repo.volume_names()?;

    let cancel = hooks.cancel_flag();
    let mut ans = vec![];
    hooks.report(0, volumes.len());
    for (i, vname) in volumes.iter().enumerate() {
        hooks.check()?;
        let voxels = repo.load_volume(vname)?;
        match mask.as_ref() {
            Some(m) if !voxels.is_aligned_with(m) => warn!("Skipping {vname}: not aligned with the mask"),
            _ => {
                info!("Histogram of {vname}");
                let inner = match cancel {
                    Some(flag) => RunHooks::none().with_cancel(flag),
                    None => RunHooks::none(),
                };
                ans.push((vname.clone(), compute_histograms(&voxels, mask.as_ref(), params, inner)?));
            }
        }
        hooks.report(i + 1, volumes.len());
    }
    Ok(ans)
}
