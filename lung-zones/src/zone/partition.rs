//! 一维扫描线上的前景分区.
//!
//! 给定一条长度为 `W` 的扫描线以及每个位置的前景权重 (即该位置上的前景像素个数,
//! 纯一维情形下只取 0 或 1), 将 `[首个前景位置, 末个前景位置]` 切分成 `n`
//! 个连续、互不重叠的区间. 区间以左闭右开 `[start, end)` 表示, 第 `i` 个区间的分区号为 `i + 1`.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::consts::BACKGROUND;
use crate::error::{ZonalError, ZonalResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 分区策略.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PartitionPolicy {
    /// 将前景范围等宽切分. 各分区的前景像素数可能不同.
    EqualSpan,

    /// 按前景像素累计数等量切分, 每个分区包含 `⌊k/n⌋` 或 `⌈k/n⌉` 个前景像素.
    #[default]
    EqualCount,
}

impl Display for PartitionPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EqualSpan => f.write_str("equal-span"),
            Self::EqualCount => f.write_str("equal-count"),
        }
    }
}

impl FromStr for PartitionPolicy {
    type Err = ZonalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "equal-span" => Ok(Self::EqualSpan),
            "equal-count" => Ok(Self::EqualCount),
            other => Err(ZonalError::param(format!("未知分区策略 `{other}`"))),
        }
    }
}

/// 一个分区所覆盖的左闭右开索引区间.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ZoneRange {
    /// 起始索引 (含).
    pub start: usize,
    /// 终止索引 (不含).
    pub end: usize,
}

impl ZoneRange {
    /// 直接构建. 要求 `start <= end`.
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// 区间长度.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// 是否为空区间 (`start == end`)?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// 区间是否包含 `index`?
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.end).contains(&index)
    }
}

/// 一条扫描线的分区结果.
///
/// 不存在前景时, 结果为空 (调用方应将整条扫描线视为背景).
/// 否则恰好有 `n` 个区间, 它们首尾相接, 覆盖整个前景范围, 且分区号随位置单调递增.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Partition {
    ranges: Vec<ZoneRange>,
}

impl Partition {
    /// 按分区号顺序获得所有区间. 第 `i` 个区间属于分区 `i + 1`.
    #[inline]
    pub fn ranges(&self) -> &[ZoneRange] {
        &self.ranges
    }

    /// 区间个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// 是否为空分区 (扫描线上没有前景)?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// 前景范围 `[first, last + 1)`. 空分区时返回 `None`.
    pub fn extent(&self) -> Option<ZoneRange> {
        let first = self.ranges.first()?;
        let last = self.ranges.last()?;
        Some(ZoneRange::new(first.start, last.end))
    }

    /// 位置 `index` 按区间归属的分区号. 不在任何非空区间内时返回 `None`.
    ///
    /// 注意该方法只看区间归属, 不看该位置本身是否为前景.
    pub fn zone_of(&self, index: usize) -> Option<u16> {
        self.ranges
            .iter()
            .position(|r| r.contains(index))
            .map(|i| (i + 1) as u16)
    }

    /// 按原前景标记 `flags` 为整条扫描线赋予分区号.
    ///
    /// 区间范围内的背景位置仍然是 `0`, 而不是所在区间的分区号.
    pub fn label_line(&self, flags: &[bool]) -> Vec<u16> {
        flags
            .iter()
            .enumerate()
            .map(|(i, &fg)| match fg {
                true => self.zone_of(i).unwrap_or(BACKGROUND),
                false => BACKGROUND,
            })
            .collect()
    }

    /// 按前景权重统计每个分区内的前景像素数.
    pub fn zone_weights(&self, weights: &[usize]) -> Vec<usize> {
        self.ranges
            .iter()
            .map(|r| weights[r.start.min(weights.len())..r.end.min(weights.len())].iter().sum())
            .collect()
    }
}

/// 将布尔前景标记 `flags` 按 `policy` 切分为 `n` 个分区.
///
/// `n == 0` 时返回 `Err(ZonalError::InvalidParameter)`.
#[inline]
pub fn partition(flags: &[bool], n: usize, policy: PartitionPolicy) -> ZonalResult<Partition> {
    let weights: Vec<usize> = flags.iter().map(|&f| usize::from(f)).collect();
    partition_weighted(&weights, n, policy)
}

/// 将前景权重 `weights` 按 `policy` 切分为 `n` 个分区.
///
/// `weights[i]` 是位置 `i` 上的前景像素个数. 例如对二维帧按行切分时,
/// 它就是第 `i` 行的前景像素数.
///
/// # 返回值
///
/// - `n == 0` 时返回 `Err(ZonalError::InvalidParameter)`;
/// - 没有任何前景时返回空分区;
/// - 否则返回恰好 `n` 个区间. 前景像素少于 `n` 时, 部分区间可能为空.
pub fn partition_weighted(
    weights: &[usize],
    n: usize,
    policy: PartitionPolicy,
) -> ZonalResult<Partition> {
    if n == 0 {
        return Err(ZonalError::param("分区数必须至少为 1"));
    }
    if n > u16::MAX as usize {
        return Err(ZonalError::param(format!("分区数 {n} 超出标签表示范围")));
    }
    let Some(first) = weights.iter().position(|&w| w > 0) else {
        return Ok(Partition::default());
    };
    // 存在 first 则必然存在 last.
    let last = weights.iter().rposition(|&w| w > 0).unwrap_or(first);

    let ranges = match policy {
        PartitionPolicy::EqualSpan => equal_span(first, last, n),
        PartitionPolicy::EqualCount => equal_count(weights, first, last, n),
    };
    debug_assert_eq!(ranges.len(), n);
    debug_assert!(ranges.windows(2).all(|w| w[0].end == w[1].start));
    Ok(Partition { ranges })
}

/// 区间 `i` 为 `[first + span * i / n, first + span * (i + 1) / n)`, 其中 `span = last - first + 1`.
fn equal_span(first: usize, last: usize, n: usize) -> Vec<ZoneRange> {
    let span = last - first + 1;
    (0..n)
        .map(|i| ZoneRange::new(first + span * i / n, first + span * (i + 1) / n))
        .collect()
}

/// 从左到右遍历前景像素, 第 `o` 个前景像素 (从 0 计) 归属分区 `⌊o * n / total⌋`.
/// 每当该值变化就在当前位置切开; 一次跳过多个分区时补出相应的空区间.
/// 最后一个区间延伸至 `last + 1`, 不足 `n` 个时在末尾补空区间.
fn equal_count(weights: &[usize], first: usize, last: usize, n: usize) -> Vec<ZoneRange> {
    let total: usize = weights.iter().sum();
    let mut ranges = Vec::with_capacity(n);
    let mut start = first;
    let mut zone = 0usize;
    let mut ordinal = 0usize;

    for (pos, &w) in weights.iter().enumerate().take(last + 1).skip(first) {
        for _ in 0..w {
            let cur = ordinal * n / total;
            while zone < cur {
                ranges.push(ZoneRange::new(start, pos));
                start = pos;
                zone += 1;
            }
            ordinal += 1;
        }
    }
    ranges.push(ZoneRange::new(start, last + 1));
    while ranges.len() < n {
        ranges.push(ZoneRange::new(last + 1, last + 1));
    }
    ranges
}
