//! 帧分组的掩码直方图.
//!
//! 每个帧分组统计一张等宽分箱的直方图. 给出掩码时只统计掩码标签非 `0` 的体素.
//! 分箱规则: 区间 `[lo, hi]` 等分为 `bins` 个左闭右开的箱, 最后一个箱包含 `hi`;
//! 区间之外的值以及 NaN 不计入.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use itertools::{Itertools, MinMaxResult};
use log::{debug, info};

use crate::consts::is_background;
use crate::data::{check_shapes, GridAttr, LabelGrid, VoxelGrid};
use crate::error::{ZonalError, ZonalResult};
use crate::hooks::RunHooks;
use crate::stats::grouping::{FrameGroup, FrameGrouping};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 默认分箱数.
pub const DEFAULT_BINS: usize = 100;

/// 直方图的取值区间 `[lo, hi]`.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinRange {
    /// 下界, 即第一个箱的起点.
    pub lo: f64,
    /// 上界, 即最后一个箱的终点.
    pub hi: f64,
}

impl BinRange {
    /// 以 `[lo, hi]` 创建区间. 含有非有限值或 `lo > hi` 时返回 `Err`.
    pub fn new(lo: f64, hi: f64) -> ZonalResult<Self> {
        if !lo.is_finite() || !hi.is_finite() || lo > hi {
            return Err(ZonalError::param(format!("直方图区间非法: [{lo}, {hi}]")));
        }
        Ok(Self { lo, hi })
    }

    /// 退化区间 `lo == hi` 向两侧各扩展 `0.5`.
    #[inline]
    fn widened(self) -> Self {
        if self.lo == self.hi {
            Self {
                lo: self.lo - 0.5,
                hi: self.hi + 0.5,
            }
        } else {
            self
        }
    }

    /// 全部体素 (不考虑掩码) 的取值范围, 忽略 NaN. 没有任何有效体素时为 `[0, 0]`.
    fn of_voxels(voxels: &VoxelGrid) -> Self {
        match voxels.data().iter().filter(|v| !v.is_nan()).minmax() {
            MinMaxResult::NoElements => Self { lo: 0.0, hi: 0.0 },
            MinMaxResult::OneElement(v) => Self {
                lo: *v as f64,
                hi: *v as f64,
            },
            MinMaxResult::MinMax(lo, hi) => Self {
                lo: *lo as f64,
                hi: *hi as f64,
            },
        }
    }
}

impl Display for BinRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}:{}", self.lo, self.hi))
    }
}

impl FromStr for BinRange {
    type Err = ZonalError;

    /// 解析 `<lo>:<hi>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lo, hi) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| ZonalError::param(format!("无法解析直方图区间 `{s}`")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| ZonalError::param(format!("无法解析直方图区间端点 `{v}`")))
        };
        Self::new(parse(lo)?, parse(hi)?)
    }
}

/// 直方图参数.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramParams {
    /// 取值区间. `None` 时取全部体素的最小值与最大值.
    pub range: Option<BinRange>,
    /// 分箱数.
    pub bins: usize,
    /// 帧分组方式.
    pub grouping: FrameGrouping,
}

impl Default for HistogramParams {
    fn default() -> Self {
        Self {
            range: None,
            bins: DEFAULT_BINS,
            grouping: FrameGrouping::Whole,
        }
    }
}

impl HistogramParams {
    /// 校验参数. 分箱数必须为正.
    pub fn validate(&self) -> ZonalResult<()> {
        self.grouping.validate()?;
        if self.bins == 0 {
            return Err(ZonalError::param("分箱数必须为正"));
        }
        if let Some(r) = self.range {
            BinRange::new(r.lo, r.hi)?;
        }
        Ok(())
    }
}

/// 一个帧分组的直方图.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Histogram {
    /// 帧分组.
    pub group: FrameGroup,
    range: BinRange,
    counts: Vec<usize>,
}

impl Histogram {
    fn empty(group: FrameGroup, range: BinRange, bins: usize) -> Self {
        Self {
            group,
            range,
            counts: vec![0; bins],
        }
    }

    /// 把 `v` 计入所属的箱. 区间外或 NaN 时忽略.
    fn insert(&mut self, v: f64) {
        let BinRange { lo, hi } = self.range;
        if !(lo..=hi).contains(&v) {
            return;
        }
        let bins = self.counts.len();
        let idx = ((v - lo) * bins as f64 / (hi - lo)) as usize;
        self.counts[idx.min(bins - 1)] += 1;
    }

    /// 取值区间.
    #[inline]
    pub fn range(&self) -> BinRange {
        self.range
    }

    /// 分箱数.
    #[inline]
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// 每个箱的计数.
    #[inline]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// 计入直方图的体素总数.
    #[inline]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// 箱宽.
    #[inline]
    pub fn bin_width(&self) -> f64 {
        (self.range.hi - self.range.lo) / self.bins() as f64
    }

    /// 第 `i` 个箱的起点.
    #[inline]
    pub fn bin_start(&self, i: usize) -> f64 {
        self.range.lo + i as f64 * self.bin_width()
    }

    /// 第 `i` 个箱的中点.
    #[inline]
    pub fn bin_mid(&self, i: usize) -> f64 {
        self.bin_start(i) + self.bin_width() / 2.0
    }

    /// 第 `i` 个箱的终点.
    #[inline]
    pub fn bin_end(&self, i: usize) -> f64 {
        self.bin_start(i) + self.bin_width()
    }

    /// 第 `i` 个箱的频率. 直方图为空时为 `0`.
    pub fn density(&self, i: usize) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.counts[i] as f64 / total as f64,
        }
    }
}

/// 统计 `group` 中 (掩码内) 体素的直方图.
fn histogram_group(
    voxels: &VoxelGrid,
    mask: Option<&LabelGrid>,
    group: &FrameGroup,
    range: BinRange,
    bins: usize,
) -> Histogram {
    let mut ans = Histogram::empty(group.clone(), range, bins);
    for &z in group.frames() {
        let frame = voxels.slice_at(z);
        match mask {
            Some(mask) => frame
                .iter()
                .zip(mask.slice_at(z).iter())
                .filter(|(_, l)| !is_background(**l))
                .for_each(|(v, _)| ans.insert(*v as f64)),
            None => frame.iter().for_each(|v| ans.insert(*v as f64)),
        }
    }
    ans
}

/// 逐帧分组统计 `voxels` 的直方图. 给出 `mask` 时只统计标签非 `0` 的体素.
///
/// 每个帧分组开始前检查取消标记, 完成后报告进度.
///
/// # 返回值
///
/// 每个帧分组一张直方图, 顺序与 [`FrameGrouping::groups`] 一致. 参数非法,
/// `mask` 与 `voxels` 形状不一致或被取消时返回 `Err`.
pub fn compute_histograms(
    voxels: &VoxelGrid,
    mask: Option<&LabelGrid>,
    params: &HistogramParams,
    mut hooks: RunHooks<'_>,
) -> ZonalResult<Vec<Histogram>> {
    params.validate()?;
    if let Some(mask) = mask {
        check_shapes(voxels, mask)?;
    }
    let range = params
        .range
        .unwrap_or_else(|| BinRange::of_voxels(voxels))
        .widened();
    let groups = params.grouping.groups(voxels.len_z())?;
    info!(
        "Histogram started: {} frame groups ({}), {} bins over [{}, {}]",
        groups.len(),
        params.grouping,
        params.bins,
        range.lo,
        range.hi
    );

    hooks.report(0, groups.len());
    let mut ans = Vec::with_capacity(groups.len());
    for (i, g) in groups.iter().enumerate() {
        hooks.check()?;
        ans.push(histogram_group(voxels, mask, g, range, params.bins));
        debug!("Histogram of frame group {i} done");
        hooks.report(i + 1, groups.len());
    }
    info!("Histogram completed");
    Ok(ans)
}

#[cfg(test)]
mod tests {
    use super::{compute_histograms, BinRange, HistogramParams};
    use crate::error::ZonalError;
    use crate::hooks::RunHooks;
    use crate::stats::FrameGrouping;
    use crate::{LabelGrid, VoxelGrid};
    use ndarray::{arr3, Array3};
    use std::sync::atomic::AtomicBool;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn voxels() -> VoxelGrid {
        VoxelGrid::from_array(arr3(&[
            [[0.0, 0.5], [1.0, 2.0]],
            [[3.0, 4.0], [4.0, 9.0]],
        ]))
    }

    #[test]
    fn test_whole_explicit_range() {
        let p = HistogramParams {
            range: Some(BinRange::new(0.0, 4.0).unwrap()),
            bins: 4,
            grouping: FrameGrouping::Whole,
        };
        let h = compute_histograms(&voxels(), None, &p, RunHooks::none()).unwrap();
        assert_eq!(h.len(), 1);
        let h = &h[0];
        // 9.0 在区间外; 4.0 落在最后一个箱.
        assert_eq!(h.counts(), &[2, 1, 1, 3]);
        assert_eq!(h.total(), 7);
        assert!(close(h.bin_start(1), 1.0));
        assert!(close(h.bin_mid(1), 1.5));
        assert!(close(h.bin_end(3), 4.0));
        assert!(close(h.density(3), 3.0 / 7.0));
        assert_eq!(h.group.frames(), &[0, 1]);
    }

    #[test]
    fn test_per_slice_masked_auto_range() {
        let mask = LabelGrid::from_array(arr3(&[[[0, 1], [1, 0]], [[2, 0], [0, 0]]]));
        let p = HistogramParams {
            range: None,
            bins: 3,
            grouping: FrameGrouping::PerSlice,
        };
        let h = compute_histograms(&voxels(), Some(&mask), &p, RunHooks::none()).unwrap();
        assert_eq!(h.len(), 2);
        // 区间取全部体素 [0, 9], 箱宽 3.
        assert!(close(h[0].bin_width(), 3.0));
        assert_eq!(h[0].counts(), &[2, 0, 0]);
        assert_eq!(h[1].counts(), &[0, 1, 0]);
        assert!(close(h[1].density(1), 1.0));
    }

    #[test]
    fn test_empty_mask_has_zero_density() {
        let mask = LabelGrid::from_array(Array3::zeros((2, 2, 2)));
        let p = HistogramParams {
            bins: 2,
            ..Default::default()
        };
        let h = compute_histograms(&voxels(), Some(&mask), &p, RunHooks::none()).unwrap();
        assert_eq!(h[0].total(), 0);
        assert!((0..2).all(|i| h[0].density(i) == 0.0));
    }

    #[test]
    fn test_constant_volume_widens_range() {
        let v = VoxelGrid::from_array(Array3::from_elem((1, 2, 2), 5.0));
        let p = HistogramParams {
            bins: 2,
            ..Default::default()
        };
        let h = compute_histograms(&v, None, &p, RunHooks::none()).unwrap();
        assert!(close(h[0].range().lo, 4.5));
        assert!(close(h[0].range().hi, 5.5));
        assert_eq!(h[0].counts(), &[0, 4]);
    }

    #[test]
    fn test_invalid() {
        let v = voxels();
        let bad_bins = HistogramParams {
            bins: 0,
            ..Default::default()
        };
        assert!(matches!(
            compute_histograms(&v, None, &bad_bins, RunHooks::none()),
            Err(ZonalError::InvalidParameter(_))
        ));

        let mask = LabelGrid::from_array(Array3::zeros((1, 2, 2)));
        assert!(matches!(
            compute_histograms(&v, Some(&mask), &HistogramParams::default(), RunHooks::none()),
            Err(ZonalError::InputShapeMismatch { .. })
        ));

        assert!(BinRange::new(2.0, 1.0).is_err());
        assert!("1:nan".parse::<BinRange>().is_err());
        assert!("3".parse::<BinRange>().is_err());
        assert_eq!("-1.5: 2".parse::<BinRange>().unwrap(), BinRange::new(-1.5, 2.0).unwrap());

        let flag = AtomicBool::new(true);
        assert!(matches!(
            compute_histograms(&v, None, &HistogramParams::default(), RunHooks::none().with_cancel(&flag)),
            Err(ZonalError::Cancelled)
        ));
    }
}
