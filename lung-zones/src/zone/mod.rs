//! 前景分区.

mod partition;
mod slicing;

pub use partition::{partition, partition_weighted, Partition, PartitionPolicy, ZoneRange};
pub use slicing::{partition_slice, partition_volume};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        pub use slicing::par_partition_volume;
    }
}
