//! 分区统计量的计算.
//!
//! 对一个帧分组, 先一次遍历把体素按标签分桶, 再对每个桶求统计量,
//! 整体复杂度为 `O(体素数 + 分区数)`.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ordered_float::OrderedFloat;

use super::grouping::FrameGroup;
use crate::consts::{is_background, MM3_PER_CM3};
use crate::data::{check_shapes, GridAttr, LabelGrid, VoxelGrid};
use crate::error::{ZonalError, ZonalResult};
use crate::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 标准差的估计方式.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SdKind {
    /// 样本标准差, 分母为 `n - 1`.
    #[default]
    Sample,
    /// 总体标准差, 分母为 `n`.
    Population,
}

impl Display for SdKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Sample => "sample",
            Self::Population => "population",
        })
    }
}

impl FromStr for SdKind {
    type Err = ZonalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sample" => Ok(Self::Sample),
            "population" => Ok(Self::Population),
            other => Err(ZonalError::param(format!("未知的标准差类型 `{other}`"))),
        }
    }
}

/// 一个 `(帧分组, 分区)` 的统计结果.
///
/// `count == 0` 时, `mean`, `sd`, `median`, `centroid` 均为 `None`,
/// 而 `volume` 为 `0`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ZoneStatistic {
    /// 分区编号, 从 1 开始.
    pub zone: u16,
    /// 体素个数.
    pub count: usize,
    /// 体积, 单位 cm³.
    pub volume: f64,
    /// 强度均值.
    pub mean: Option<f64>,
    /// 强度标准差.
    pub sd: Option<f64>,
    /// 强度中位数. 未要求计算时恒为 `None`.
    pub median: Option<f64>,
    /// 质心的物理坐标 `(R, A, S)`.
    pub centroid: Option<Point3>,
    /// 所属帧分组的帧数.
    pub slice_count: usize,
}

impl ZoneStatistic {
    /// 是否为空分区?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// 单个分组内所有分区的统计结果, 按分区编号升序.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupStatistics {
    /// 帧分组.
    pub group: FrameGroup,
    /// 各分区的统计量, 第 `i` 项对应分区 `i + 1`.
    pub zones: Vec<ZoneStatistic>,
}

/// 统计选项.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AggregateOptions {
    /// 分区数. 标签值超过它的体素被忽略.
    pub zones: u16,
    /// 标准差估计方式.
    pub sd: SdKind,
    /// 是否计算中位数.
    pub median: bool,
    /// 质心的 z 坐标是否取体素自身帧号的均值 (整体模式).
    /// 否则取分组帧号的均值.
    pub voxel_z: bool,
}

/// 单个分区的累加器. 均值与方差使用 Welford 算法.
#[derive(Debug, Default, Clone)]
struct Accumulator {
    count: usize,
    mean: f64,
    m2: f64,
    sum_x: f64,
    sum_y: f64,
    sum_z: f64,
    values: Vec<OrderedFloat<f32>>,
}

impl Accumulator {
    #[inline]
    fn push(&mut self, value: f32, (z, y, x): (usize, usize, usize), keep: bool) {
        self.count += 1;
        let v = value as f64;
        let delta = v - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (v - self.mean);
        self.sum_x += x as f64;
        self.sum_y += y as f64;
        self.sum_z += z as f64;
        if keep {
            self.values.push(OrderedFloat(value));
        }
    }

    fn sd(&self, kind: SdKind) -> f64 {
        let n = self.count as f64;
        match kind {
            SdKind::Sample if self.count < 2 => 0.0,
            SdKind::Sample => (self.m2 / (n - 1.0)).sqrt(),
            SdKind::Population => (self.m2 / n).sqrt(),
        }
    }
}

/// 求中位数. 偶数个元素时取中间两者的均值. 会打乱 `values` 的顺序.
fn median(values: &mut [OrderedFloat<f32>]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    let (lower, upper, _) = values.select_nth_unstable(mid);
    let upper = upper.0 as f64;
    if n % 2 == 1 {
        Some(upper)
    } else {
        let lower = lower.iter().max().map(|v| v.0 as f64).unwrap_or(upper);
        Some((lower + upper) / 2.0)
    }
}

/// 计算 `group` 内每个分区 `1..=opt.zones` 的统计量.
///
/// 体积按体素网格的体素尺寸计算, 质心按体素网格的仿射变换转换为物理坐标.
///
/// # 注意
///
/// 分组中的帧号必须都在网格范围内, 否则 panic.
pub fn aggregate_group(
    voxels: &VoxelGrid,
    labels: &LabelGrid,
    group: &FrameGroup,
    opt: &AggregateOptions,
) -> ZonalResult<GroupStatistics> {
    check_shapes(voxels, labels)?;
    let zones = opt.zones as usize;
    let mut acc = vec![Accumulator::default(); zones];

    for &z in group.frames() {
        let vs = voxels.slice_at(z);
        let ls = labels.slice_at(z);
        for (((y, x), v), l) in vs.indexed_iter().zip(ls.iter()) {
            if is_background(*l) || *l as usize > zones {
                continue;
            }
            acc[*l as usize - 1].push(*v, (z, y, x), opt.median);
        }
    }

    let mm3 = voxels.voxel_mm3();
    let transform = voxels.transform();
    let mean_frame = group.mean_frame();
    let stats = acc
        .into_iter()
        .enumerate()
        .map(|(i, mut a)| {
            let zone = (i + 1) as u16;
            let volume = a.count as f64 * mm3 / MM3_PER_CM3;
            if a.count == 0 {
                return ZoneStatistic {
                    zone,
                    count: 0,
                    volume,
                    mean: None,
                    sd: None,
                    median: None,
                    centroid: None,
                    slice_count: group.len(),
                };
            }
            let n = a.count as f64;
            let cz = if opt.voxel_z {
                a.sum_z / n
            } else {
                mean_frame.unwrap_or(0.0)
            };
            let centroid = transform.to_physical([a.sum_x / n, a.sum_y / n, cz]);
            ZoneStatistic {
                zone,
                count: a.count,
                volume,
                mean: Some(a.mean),
                sd: Some(a.sd(opt.sd)),
                median: if opt.median { median(&mut a.values) } else { None },
                centroid: Some(centroid),
                slice_count: group.len(),
            }
        })
        .collect();

    Ok(GroupStatistics {
        group: group.clone(),
        zones: stats,
    })
}

#[cfg(test)]
mod tests {
    use super::{aggregate_group, median, AggregateOptions, SdKind};
    use crate::data::{Geometry, PhysicalTransform, Spacing};
    use crate::stats::{FrameGroup, FrameGrouping};
    use crate::{LabelGrid, VoxelGrid};
    use ndarray::arr3;
    use ordered_float::OrderedFloat;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn opt(zones: u16) -> AggregateOptions {
        AggregateOptions {
            zones,
            sd: SdKind::Sample,
            median: true,
            voxel_z: true,
        }
    }

    #[test]
    fn test_two_zones_unit_grid() {
        let v = VoxelGrid::from_array(arr3(&[[[1.0, 2.0], [3.0, 4.0]]]));
        let l = LabelGrid::from_array(arr3(&[[[1, 1], [2, 2]]]));
        let g = &FrameGrouping::Whole.groups(1).unwrap()[0];
        let s = aggregate_group(&v, &l, g, &opt(2)).unwrap();
        assert_eq!(s.zones.len(), 2);

        let z1 = &s.zones[0];
        assert_eq!((z1.zone, z1.count), (1, 2));
        assert!(close(z1.volume, 0.002));
        assert!(close(z1.mean.unwrap(), 1.5));
        assert!(close(z1.sd.unwrap(), 0.5f64.sqrt()));
        assert!(close(z1.median.unwrap(), 1.5));
        assert_eq!(z1.centroid, Some([0.5, 0.0, 0.0]));
        assert_eq!(z1.slice_count, 1);

        let z2 = &s.zones[1];
        assert_eq!(z2.count, 2);
        assert!(close(z2.mean.unwrap(), 3.5));
        assert!(close(z2.volume, 0.002));
        assert_eq!(z2.centroid, Some([0.5, 1.0, 0.0]));
    }

    #[test]
    fn test_empty_zone_is_none() {
        let v = VoxelGrid::from_array(arr3(&[[[5.0, 6.0]], [[7.0, 8.0]]]));
        let l = LabelGrid::from_array(arr3(&[[[0, 0]], [[0, 0]]]));
        let g = FrameGroup::new(vec![0, 1]);
        let s = aggregate_group(&v, &l, &g, &opt(1)).unwrap();
        let z = &s.zones[0];
        assert!(z.is_empty());
        assert_eq!(z.volume, 0.0);
        assert_eq!((z.mean, z.sd, z.median, z.centroid), (None, None, None, None));
        assert_eq!(z.slice_count, 2);
    }

    #[test]
    fn test_group_frame_and_geometry() {
        let v = VoxelGrid::new(
            arr3(&[[[1.0, 1.0]], [[2.0, 0.0]], [[4.0, 0.0]]]),
            Geometry::new(
                Spacing::new(2.0, 2.0, 5.0).unwrap(),
                PhysicalTransform::from_spacing_origin(Spacing::new(2.0, 2.0, 5.0).unwrap(), [10.0, 20.0, 30.0]),
            ),
        );
        let l = LabelGrid::from_array(arr3(&[[[1, 3]], [[1, 0]], [[1, 2]]]));
        let g = FrameGroup::new(vec![0, 2]);

        let mut o = opt(2);
        o.voxel_z = false;
        o.sd = SdKind::Population;
        let s = aggregate_group(&v, &l, &g, &o).unwrap();
        // 标签 3 超出分区数, 被忽略.
        assert_eq!(s.zones.len(), 2);
        let z1 = &s.zones[0];
        assert_eq!(z1.count, 2);
        assert!(close(z1.volume, 2.0 * 20.0 / 1000.0));
        assert!(close(z1.mean.unwrap(), 2.5));
        assert!(close(z1.sd.unwrap(), 1.5));
        // 质心索引 (0, 0, 1), z 取分组帧号均值.
        assert_eq!(z1.centroid, Some([10.0, 20.0, 35.0]));

        let z2 = &s.zones[1];
        assert_eq!(z2.count, 1);
        assert_eq!(z2.sd, Some(0.0));
        assert_eq!(z2.centroid, Some([12.0, 20.0, 35.0]));

        o.voxel_z = true;
        let s = aggregate_group(&v, &l, &g, &o).unwrap();
        assert_eq!(s.zones[1].centroid, Some([12.0, 20.0, 40.0]));
    }

    #[test]
    fn test_single_voxel_sample_sd() {
        let v = VoxelGrid::from_array(arr3(&[[[3.0]]]));
        let l = LabelGrid::from_array(arr3(&[[[1]]]));
        let s = aggregate_group(&v, &l, &FrameGroup::new(vec![0]), &opt(1)).unwrap();
        assert_eq!(s.zones[0].sd, Some(0.0));
        assert_eq!(s.zones[0].median, Some(3.0));
    }

    #[test]
    fn test_median() {
        let mut v: Vec<_> = [5.0f32, 1.0, 4.0, 2.0].into_iter().map(OrderedFloat).collect();
        assert_eq!(median(&mut v), Some(3.0));
        let mut v: Vec<_> = [5.0f32, 1.0, 4.0].into_iter().map(OrderedFloat).collect();
        assert_eq!(median(&mut v), Some(4.0));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_shape_mismatch() {
        let v = VoxelGrid::from_array(arr3(&[[[3.0, 1.0]]]));
        let l = LabelGrid::from_array(arr3(&[[[1]]]));
        assert!(aggregate_group(&v, &l, &FrameGroup::new(vec![0]), &opt(1)).is_err());
    }
}
