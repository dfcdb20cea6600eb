//! 🫁欢迎光临🫁
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d, Point3};

pub use crate::data::{
    check_shapes, Geometry, GridAttr, LabelGrid, LabelSlice, LabelSliceMut, PhysicalTransform,
    Spacing, VoxelGrid, VoxelSlice,
};

pub use crate::consts::{BACKGROUND, GENERIC_ANATOMY_COLORS, NA};
pub use crate::error::{ZonalError, ZonalResult};
pub use crate::hooks::RunHooks;

pub use crate::zone::{partition, partition_slice, partition_volume, partition_weighted};
pub use crate::zone::{Partition, PartitionPolicy, ZoneRange};

pub use crate::stats::{FrameGroup, FrameGrouping, GroupStatistics, SdKind, ZoneStatistic};
pub use crate::stats::{compute_histograms, BinRange, Histogram, HistogramParams};
pub use crate::table::{write_histograms_csv, Cell, ResultTable, TableForm, TableLayout};

pub use crate::engine::{compute, run, RunParams, RunSummary};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        pub use crate::engine::par_run;
        pub use crate::zone::par_partition_volume;
    }
}

pub use crate::repository::{
    histogram_all, partition_all, run_all, MemoryRepository, NiftiRepository, VolumeRepository,
};
