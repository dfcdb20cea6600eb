//! 帧分组策略.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::{ZonalError, ZonalResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 帧的分组方式. 每个分组作为一个统计单元.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrameGrouping {
    /// 全部帧 `[0, Z)` 构成唯一的分组. 质心的 z 坐标取体素自身的帧号均值.
    Whole,
    /// `m` 个分组, 第 `k` 组包含帧 `{k, k + m, k + 2m, ...}`.
    Modulo(usize),
    /// 每帧单独成组, 共 `Z` 组.
    #[default]
    PerSlice,
}

impl FrameGrouping {
    /// 由一个整数模数构造: `m > 0` 时为 [`FrameGrouping::Modulo`],
    /// 否则为 [`FrameGrouping::PerSlice`].
    #[inline]
    pub fn from_modulo(m: i64) -> Self {
        if m > 0 {
            Self::Modulo(m as usize)
        } else {
            Self::PerSlice
        }
    }

    /// 是否为整体模式?
    #[inline]
    pub fn is_whole(&self) -> bool {
        matches!(self, Self::Whole)
    }

    /// 检查参数. 显式选择的 `Modulo(0)` 非法.
    pub fn validate(&self) -> ZonalResult<()> {
        match self {
            Self::Modulo(0) => Err(ZonalError::param("取模分组的模数必须为正")),
            _ => Ok(()),
        }
    }

    /// 对总帧数 `len_z` 生成有序的帧分组.
    ///
    /// # 注意
    ///
    /// `Modulo(m)` 且 `m > len_z` 时, 排在后面的分组为空.
    pub fn groups(&self, len_z: usize) -> ZonalResult<Vec<FrameGroup>> {
        self.validate()?;
        let ans = match *self {
            Self::Whole => vec![FrameGroup::new((0..len_z).collect())],
            Self::Modulo(m) => (0..m)
                .map(|k| FrameGroup::new((k..len_z).step_by(m).collect()))
                .collect(),
            Self::PerSlice => (0..len_z).map(|z| FrameGroup::new(vec![z])).collect(),
        };
        Ok(ans)
    }
}

impl Display for FrameGrouping {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Whole => f.write_str("whole"),
            Self::Modulo(m) => f.write_fmt(format_args!("modulo:{m}")),
            Self::PerSlice => f.write_str("per-slice"),
        }
    }
}

impl FromStr for FrameGrouping {
    type Err = ZonalError;

    /// 解析 `whole`, `modulo:<m>`, `per-slice`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "whole" => return Ok(Self::Whole),
            "per-slice" => return Ok(Self::PerSlice),
            _ => {}
        }
        let m = s
            .strip_prefix("modulo:")
            .ok_or_else(|| ZonalError::param(format!("未知的分组方式 `{s}`")))?;
        let m: usize = m
            .trim()
            .parse()
            .map_err(|_| ZonalError::param(format!("无法解析模数 `{m}`")))?;
        let ans = Self::Modulo(m);
        ans.validate()?;
        Ok(ans)
    }
}

/// 一个帧分组: 升序排列的帧号.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameGroup {
    frames: Vec<usize>,
}

impl FrameGroup {
    /// 以帧号序列创建分组.
    #[inline]
    pub fn new(frames: Vec<usize>) -> Self {
        Self { frames }
    }

    /// 分组包含的帧号.
    #[inline]
    pub fn frames(&self) -> &[usize] {
        &self.frames
    }

    /// 帧数.
    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// 是否为空分组?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 帧号的算术平均值. 空分组返回 `None`.
    pub fn mean_frame(&self) -> Option<f64> {
        if self.frames.is_empty() {
            None
        } else {
            let sum: usize = self.frames.iter().sum();
            Some(sum as f64 / self.frames.len() as f64)
        }
    }
}
