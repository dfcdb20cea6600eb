//! 体素物理尺寸与网格几何信息.

use nifti::NiftiHeader;

use crate::consts::MM3_PER_CM3;
use crate::data::transform::PhysicalTransform;
use crate::error::{ZonalError, ZonalResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 单个体素的物理尺寸, 以毫米为单位, 分别对应列 (x), 行 (y), 帧 (z) 方向.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spacing {
    x: f64,
    y: f64,
    z: f64,
}

impl Default for Spacing {
    /// 各向同性的 1 mm 体素.
    #[inline]
    fn default() -> Self {
        Self {
            x: 1.0,
            y: 1.0,
            z: 1.0,
        }
    }
}

impl Spacing {
    /// 构建体素尺寸. 三个分量都必须是有限正数, 否则返回 `InvalidParameter`.
    pub fn new(x: f64, y: f64, z: f64) -> ZonalResult<Self> {
        if [x, y, z].iter().all(|v| v.is_finite() && *v > 0.0) {
            Ok(Self { x, y, z })
        } else {
            Err(ZonalError::param(format!(
                "体素尺寸必须为有限正数, 但得到 ({x}, {y}, {z})"
            )))
        }
    }

    /// 从 nifti `pixdim` 读取. 非正或非有限的分量按 1 mm 处理.
    pub fn from_nifti_header(header: &NiftiHeader) -> Self {
        let fix = |v: f32| {
            let v = (v as f64).abs();
            if v.is_finite() && v > 0.0 {
                v
            } else {
                1.0
            }
        };
        let [_, x, y, z, ..] = header.pixdim;
        Self {
            x: fix(x),
            y: fix(y),
            z: fix(z),
        }
    }

    /// 按 `[x, y, z]` 顺序返回.
    #[inline]
    pub fn as_xyz(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// 列方向尺寸.
    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    /// 行方向尺寸.
    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    /// 帧方向尺寸.
    #[inline]
    pub fn z(&self) -> f64 {
        self.z
    }

    /// 单个体素的体积, 以立方毫米为单位.
    #[inline]
    pub fn voxel_mm3(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// `count` 个体素的体积, 以立方厘米为单位.
    #[inline]
    pub fn volume_cm3(&self, count: usize) -> f64 {
        count as f64 * self.voxel_mm3() / MM3_PER_CM3
    }
}

/// 网格的几何信息: 体素尺寸与索引到物理空间的变换.
///
/// 相当于 nifti header 中与本 crate 有关的那部分.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Geometry {
    /// 体素尺寸.
    pub spacing: Spacing,

    /// 索引空间到物理空间的仿射变换.
    pub transform: PhysicalTransform,
}

impl Geometry {
    /// 直接构建.
    #[inline]
    pub fn new(spacing: Spacing, transform: PhysicalTransform) -> Self {
        Self { spacing, transform }
    }

    /// 从 nifti header 构建.
    pub fn from_nifti_header(header: &NiftiHeader) -> ZonalResult<Self> {
        Ok(Self {
            spacing: Spacing::from_nifti_header(header),
            transform: PhysicalTransform::from_nifti_header(header)?,
        })
    }

    /// 两份几何信息是否在 1e-6 容差内一致 (相同原点, 相同尺寸, 相同方向)?
    pub fn is_aligned_with(&self, other: &Self) -> bool {
        const EPS: f64 = 1e-6;
        self.spacing
            .as_xyz()
            .iter()
            .zip(other.spacing.as_xyz().iter())
            .all(|(a, b)| (a - b).abs() <= EPS)
            && self.transform.approx_eq(&other.transform, EPS)
    }
}

#[cfg(test)]
mod tests {
    use super::{Geometry, Spacing};
    use crate::data::transform::PhysicalTransform;

    #[test]
    fn test_spacing_invalid() {
        assert!(Spacing::new(0.0, 1.0, 1.0).is_err());
        assert!(Spacing::new(1.0, -1.0, 1.0).is_err());
        assert!(Spacing::new(1.0, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_volume() {
        let s = Spacing::default();
        assert!((s.volume_cm3(2) - 0.002).abs() < 1e-12);

        let s = Spacing::new(0.5, 0.5, 4.0).unwrap();
        assert!((s.voxel_mm3() - 1.0).abs() < 1e-12);
        assert!((s.volume_cm3(1500) - 1.5).abs() < 1e-12);
        assert_eq!(s.volume_cm3(0), 0.0);
    }

    #[test]
    fn test_alignment() {
        let s = Spacing::new(0.5, 0.5, 4.0).unwrap();
        let a = Geometry::new(s, PhysicalTransform::from_spacing_origin(s, [1.0, 2.0, 3.0]));
        let b = a.clone();
        assert!(a.is_aligned_with(&b));

        let c = Geometry::new(s, PhysicalTransform::from_spacing_origin(s, [1.0, 2.0, 3.5]));
        assert!(!a.is_aligned_with(&c));

        let d = Geometry::new(Spacing::default(), a.transform.clone());
        assert!(!a.is_aligned_with(&d));
    }
}
