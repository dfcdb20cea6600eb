#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供动态肺部 CT 的逐帧分区统计与前后向分区功能.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 体素网格与标签网格一律按 `(z, y, x)` 即 (帧, 行, 列) 访问;
//!   仿射变换的输入则是 `(x, y, z)` 即 (列, 行, 帧), 输出为物理坐标 `(R, A, S)`.
//! 2. 标签值 `0` 表示背景, 不参与任何统计.
//! 3. 空分区不是错误. 它的统计量为 `None`, 在结果表中显示为 `NA`.
//! 4. 在非期望情况下 (例如越界索引), 程序会直接 panic, 而不会导致内存错误.
//!
//! # 开发计划
//!
//! ### 数据模型 ✅
//!
//! 体素网格, 标签网格, 体素尺寸与索引到物理空间的仿射变换 (含 nifti header 解析).
//!
//! 实现位于 `lung-zones/src/data`.
//!
//! ### 一维 / 加权分区 ✅
//!
//! 等跨度与等数量两种策略. 后者保证每个分区的前景像素数为 `⌊k/n⌋` 或 `⌈k/n⌉`.
//!
//! 实现位于 `lung-zones/src/zone/partition.rs`.
//!
//! ### 帧与体数据的前后向分区 ✅
//!
//! 以每行前景像素数为权重切分每帧, 再按前景掩膜写入分区号.
//!
//! 实现位于 `lung-zones/src/zone/slicing.rs`.
//!
//! ### 帧分组与分区统计 ✅
//!
//! 整体 / 取模 / 逐帧三种分组; 一次遍历按标签分桶, 计算计数, 体积, 均值,
//! 标准差, 中位数与物理质心.
//!
//! 实现位于 `lung-zones/src/stats`.
//!
//! ### 掩码直方图 ✅
//!
//! 按帧分组统计 (掩码内) 体素的等宽分箱直方图, 输出计数与频率.
//!
//! 实现位于 `lung-zones/src/stats/histogram.rs`.
//!
//! ### 长表 / 宽表输出 ✅
//!
//! 可跨多次运行累积的结果表, 支持单调加宽与 CSV 导出. 实数按 `%.3g` 输出.
//!
//! 实现位于 `lung-zones/src/table`.
//!
//! ### 运行入口, 进度与取消 ✅
//!
//! 实现位于 `lung-zones/src/engine.rs` 与 `lung-zones/src/hooks.rs`.
//!
//! ### 数据仓库 ✅
//!
//! 内存仓库与按目录组织的 nifti 仓库; 批量统计 (`run_all`), 批量分区 (`partition_all`)
//! 与批量直方图 (`histogram_all`).
//!
//! 实现位于 `lung-zones/src/repository`.
//!
//! ### 并行化 ✅
//!
//! `rayon` feature 下提供 `par_run` 与 `par_partition_volume`.

/// 二维索引 `(y, x)`.
pub type Idx2d = (usize, usize);

/// 三维索引 `(z, y, x)`.
pub type Idx3d = (usize, usize, usize);

/// 三维实数点. 索引空间中为 `[x, y, z]`, 物理空间中为 `[R, A, S]`.
pub type Point3 = [f64; 3];

/// 网格数据结构与几何信息.
pub mod data;

pub use data::{
    check_shapes, Geometry, GridAttr, LabelGrid, LabelSlice, LabelSliceMut, PhysicalTransform,
    Spacing, VoxelGrid, VoxelSlice,
};

pub mod consts;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod prelude;
pub mod repository;
pub mod stats;
pub mod table;
pub mod zone;

pub use error::{ZonalError, ZonalResult};
