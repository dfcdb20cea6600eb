//! 体素/标签网格单帧切片对象的操作.

mod core;

pub use core::{LabelSlice, LabelSliceMut, VoxelSlice};
