//! 二维帧与三维体素网格的前后向 (按行) 分区.
//!
//! 对每一帧, 以每行的前景像素数为权重调用 [`partition_weighted`],
//! 然后把行所在分区的编号写到该行的前景像素上. 背景像素始终为 `0`.

use log::{debug, info};

use super::partition::{partition_weighted, Partition, PartitionPolicy};
use crate::data::{GridAttr, LabelGrid, LabelSliceMut, VoxelGrid, VoxelSlice};
use crate::error::{ZonalError, ZonalResult};
use crate::hooks::RunHooks;

/// 将 `slice` 的前景沿行方向切分成 `n` 个分区, 结果写入 `out`.
///
/// 返回行方向上的分区结果. 没有前景时返回空分区, 且 `out` 被写为全背景.
///
/// # 注意
///
/// 如果 `slice` 与 `out` 形状不一致, 则程序 panic.
pub fn partition_slice(
    slice: &VoxelSlice<'_>,
    out: &mut LabelSliceMut<'_>,
    n: usize,
    policy: PartitionPolicy,
) -> ZonalResult<Partition> {
    assert_eq!(slice.shape(), out.shape(), "体素帧与标签帧形状不一致");
    let weights = slice.row_foreground_counts();
    let p = partition_weighted(&weights, n, policy)?;
    fill_zones(slice, out, &p);
    Ok(p)
}

/// 按行分区结果 `p` 为每个前景像素写入分区号.
fn fill_zones(slice: &VoxelSlice<'_>, out: &mut LabelSliceMut<'_>, p: &Partition) {
    out.fill(crate::consts::BACKGROUND);
    for (i, range) in p.ranges().iter().enumerate() {
        let zone = (i + 1) as u16;
        for row in range.start..range.end {
            out.write_row_masked(row, slice.row_foreground(row), zone);
        }
    }
}

fn check_zone_count(n: usize) -> ZonalResult<()> {
    if n == 0 || n > u16::MAX as usize {
        Err(ZonalError::param(format!("分区数 {n} 不在 [1, {}] 内", u16::MAX)))
    } else {
        Ok(())
    }
}

/// 对 `voxels` 的每一帧调用 [`partition_slice`], 生成与之几何信息一致的标签网格.
///
/// 没有前景的帧保持全背景. 每处理完一帧报告一次进度, 每帧开始前检查取消标记.
pub fn partition_volume(
    voxels: &VoxelGrid,
    n: usize,
    policy: PartitionPolicy,
    mut hooks: RunHooks<'_>,
) -> ZonalResult<LabelGrid> {
    check_zone_count(n)?;
    info!("Partitioning {} frames into {n} zones ({policy})", voxels.len_z());

    let mut labels = LabelGrid::zeros(voxels.shape(), voxels.geometry().clone());
    let total = voxels.len_z();
    hooks.report(0, total);
    for (z, (slice, mut out)) in voxels.slice_iter().zip(labels.slice_iter_mut()).enumerate() {
        hooks.check()?;
        let p = partition_slice(&slice, &mut out, n, policy)?;
        match p.extent() {
            Some(e) => debug!("Frame {z}: foreground rows {}..{}", e.start, e.end),
            None => debug!("Frame {z}: no foreground"),
        }
        hooks.report(z + 1, total);
    }
    info!("Partitioning completed");
    Ok(labels)
}

/// 借助 `rayon`, 并行地对每一帧实施 [`partition_slice`].
///
/// 结果与 [`partition_volume`] 完全一致. 不报告进度; 取消标记在每帧开始前检查,
/// 被取消时返回 `Err(ZonalError::Cancelled)`.
#[cfg(feature = "rayon")]
pub fn par_partition_volume(
    voxels: &VoxelGrid,
    n: usize,
    policy: PartitionPolicy,
    hooks: RunHooks<'_>,
) -> ZonalResult<LabelGrid> {
    use rayon::prelude::*;
    use std::sync::atomic::Ordering;

    check_zone_count(n)?;
    info!("Partitioning {} frames into {n} zones ({policy}), parallel", voxels.len_z());

    let cancel = hooks.cancel_flag();
    let partitions = (0..voxels.len_z())
        .into_par_iter()
        .map(|z| {
            if cancel.is_some_and(|c| c.load(Ordering::Acquire)) {
                return Err(ZonalError::Cancelled);
            }
            partition_weighted(&voxels.slice_at(z).row_foreground_counts(), n, policy)
        })
        .collect::<ZonalResult<Vec<_>>>()?;

    let mut labels = LabelGrid::zeros(voxels.shape(), voxels.geometry().clone());
    labels.par_for_each_indexed_slice_mut(|z, mut out| {
        fill_zones(&voxels.slice_at(z), &mut out, &partitions[z]);
    });
    info!("Partitioning completed");
    Ok(labels)
}
