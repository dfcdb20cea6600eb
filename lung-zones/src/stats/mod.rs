//! 帧分组, 分区统计与直方图.

mod aggregate;
mod grouping;
mod histogram;

pub use aggregate::{aggregate_group, AggregateOptions, GroupStatistics, SdKind, ZoneStatistic};
pub use grouping::{FrameGroup, FrameGrouping};
pub use histogram::{compute_histograms, BinRange, Histogram, HistogramParams, DEFAULT_BINS};
