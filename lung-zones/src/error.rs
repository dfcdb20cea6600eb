//! 运行时错误.

use crate::Idx3d;
use thiserror::Error;

/// 分区统计流程中所有可能出现的错误.
///
/// 空分区 (某个 `(帧组, 分区)` 没有任何体素) **不是** 错误,
/// 它以 `None` 统计量的形式出现在结果中.
#[derive(Debug, Error)]
pub enum ZonalError {
    /// 体素网格与标签网格形状不一致. 在任何计算开始前报告.
    #[error("体素网格与标签网格形状不一致: {voxels:?} != {labels:?}")]
    InputShapeMismatch {
        /// 体素网格形状 `(z, y, x)`.
        voxels: Idx3d,
        /// 标签网格形状 `(z, y, x)`.
        labels: Idx3d,
    },

    /// 需要求逆时, 仿射矩阵不可逆 (或含有非有限值).
    #[error("仿射变换矩阵不可逆")]
    InvalidTransform,

    /// 参数非法 (分区数为 0, 取模分组的模数为 0, 无法解析的选择器等).
    #[error("参数非法: {0}")]
    InvalidParameter(String),

    /// 结果表已有的布局与本次追加的布局不一致.
    #[error("结果表布局不一致: 已有 {existing}, 追加 {incoming}")]
    TableLayoutMismatch {
        /// 表中已有的布局描述.
        existing: String,
        /// 本次追加的布局描述.
        incoming: String,
    },

    /// 运行在两个帧组之间被调用方取消.
    #[error("运行已被取消")]
    Cancelled,

    /// 数据仓库中找不到指定名字的卷.
    #[error("找不到数据 `{0}`")]
    NotFound(String),

    /// 读写 nifti 文件错误.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// 写出 CSV 错误.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// 其他底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ZonalError {
    /// 便捷构造 [`ZonalError::InvalidParameter`].
    #[inline]
    pub(crate) fn param(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}

/// 本 crate 的 `Result` 别名.
pub type ZonalResult<T> = Result<T, ZonalError>;
