//! 索引空间到物理空间的仿射变换.
//!
//! 索引空间坐标按 `(x, y, z)` 排列, 即 (列, 行, 帧); 物理空间坐标按 `(R, A, S)` 排列.
//! 注意这与网格数据本身的 `(z, y, x)` 存储顺序相反.

use nalgebra::{Matrix4, Vector3, Vector4};
use nifti::NiftiHeader;

use crate::data::geometry::Spacing;
use crate::error::{ZonalError, ZonalResult};
use crate::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 4×4 齐次仿射矩阵, 将 `(x, y, z, 1)` 映射到 `(R, A, S, 1)`.
///
/// 该结构是只读的. 若要修改变换, 你应该创建新的实例.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhysicalTransform {
    matrix: Matrix4<f64>,
}

impl Default for PhysicalTransform {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl PhysicalTransform {
    /// 恒等变换.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// 以 `nalgebra` 矩阵直接构建. 含有 NaN 或 inf 时返回 `Err(ZonalError::InvalidTransform)`.
    fn from_matrix(matrix: Matrix4<f64>) -> ZonalResult<Self> {
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(ZonalError::InvalidTransform);
        }
        Ok(Self { matrix })
    }

    /// 以 "索引 -> 物理" 方向的矩阵直接构建.
    ///
    /// 如果矩阵中含有 NaN 或 inf, 则返回 `Err(ZonalError::InvalidTransform)`.
    pub fn from_index_to_physical(m: [[f64; 4]; 4]) -> ZonalResult<Self> {
        Self::from_matrix(Matrix4::from_fn(|r, c| m[r][c]))
    }

    /// 以 "物理 -> 索引" 方向的矩阵构建, 内部会对其求逆.
    ///
    /// 矩阵不可逆时返回 `Err(ZonalError::InvalidTransform)`.
    pub fn from_physical_to_index(m: [[f64; 4]; 4]) -> ZonalResult<Self> {
        Self::from_index_to_physical(m)?.inverse()
    }

    /// 无旋转的轴对齐变换: 每个轴按 `spacing` 缩放, 然后平移到 `origin`.
    pub fn from_spacing_origin(spacing: Spacing, origin: Point3) -> Self {
        let [sx, sy, sz] = spacing.as_xyz();
        let mut matrix = Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz));
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from_slice(&origin);
        Self { matrix }
    }

    /// 从 nifti 元数据 `header` 中构建变换.
    ///
    /// 1. `sform_code > 0` 时使用 `srow_{x, y, z}`;
    /// 2. 否则 `qform_code > 0` 时使用四元数与 `quatern_{x, y, z}` 偏移;
    /// 3. 否则仅按 `pixdim` 缩放, 原点为 `(0, 0, 0)`.
    pub fn from_nifti_header(header: &NiftiHeader) -> ZonalResult<Self> {
        if header.sform_code <= 0 && header.qform_code <= 0 {
            let spacing = Spacing::from_nifti_header(header);
            return Ok(Self::from_spacing_origin(spacing, [0.0; 3]));
        }
        if header.sform_code > 0 {
            return Self::from_header_affine(header);
        }

        // qform 要求 pixdim 非负, 且 qfac 为 ±1. qfac 为 0 时按 1 处理.
        let [qfac, dx, dy, dz, ..] = header.pixdim;
        if [dx, dy, dz].iter().any(|d| *d < 0.0) || ![-1.0, 0.0, 1.0].contains(&qfac) {
            return Err(ZonalError::InvalidTransform);
        }
        if qfac == 0.0 {
            let mut header = header.clone();
            header.pixdim[0] = 1.0;
            return Self::from_header_affine(&header);
        }
        Self::from_header_affine(header)
    }

    /// 取 nifti 给出的最佳仿射矩阵 (sform 优先于 qform).
    fn from_header_affine(header: &NiftiHeader) -> ZonalResult<Self> {
        let affine = header.affine::<f64>();
        Self::from_matrix(Matrix4::from_fn(|r, c| affine[(r, c)]))
    }

    /// 获得底层矩阵的不可变引用.
    #[inline]
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// 索引空间原点 `(0, 0, 0)` 对应的物理坐标.
    #[inline]
    pub fn origin(&self) -> Point3 {
        [
            self.matrix[(0, 3)],
            self.matrix[(1, 3)],
            self.matrix[(2, 3)],
        ]
    }

    /// 将索引空间点 `(x, y, z)` (可以是小数, 如质心) 变换为物理坐标 `(R, A, S)`.
    #[inline]
    pub fn to_physical(&self, [x, y, z]: Point3) -> Point3 {
        let p = self.matrix * Vector4::new(x, y, z, 1.0);
        [p.x, p.y, p.z]
    }

    /// 求逆变换, 即 "物理 -> 索引" 方向.
    ///
    /// 矩阵不可逆时返回 `Err(ZonalError::InvalidTransform)`.
    pub fn inverse(&self) -> ZonalResult<Self> {
        let inv = self
            .matrix
            .try_inverse()
            .ok_or(ZonalError::InvalidTransform)?;
        Self::from_matrix(inv)
    }

    /// 将物理坐标 `(R, A, S)` 变换回索引空间.
    #[inline]
    pub fn to_index(&self, point: Point3) -> ZonalResult<Point3> {
        Ok(self.inverse()?.to_physical(point))
    }

    /// 与 `other` 在 `eps` 容差内是否相同?
    #[inline]
    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        (self.matrix - other.matrix).amax() <= eps
    }
}

#[cfg(test)]
mod tests {
    use super::PhysicalTransform;
    use crate::data::geometry::Spacing;
    use crate::error::ZonalError;
    use nifti::NiftiHeader;

    fn point_eq(a: [f64; 3], b: [f64; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn test_origin_round_trip() {
        let t = PhysicalTransform::from_spacing_origin(
            Spacing::new(0.7, 0.7, 2.5).unwrap(),
            [-120.0, 35.5, 18.0],
        );
        assert!(point_eq(t.to_physical([0.0, 0.0, 0.0]), t.origin()));
        assert!(point_eq(t.origin(), [-120.0, 35.5, 18.0]));

        let t = PhysicalTransform::from_index_to_physical([
            [0.0, -1.0, 0.0, 5.0],
            [1.0, 0.0, 0.0, -3.0],
            [0.0, 0.0, 2.0, 7.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
        .unwrap();
        assert!(point_eq(t.to_physical([0.0; 3]), [5.0, -3.0, 7.0]));
    }

    #[test]
    fn test_fractional_point() {
        let t = PhysicalTransform::from_spacing_origin(Spacing::new(2.0, 3.0, 4.0).unwrap(), [1.0; 3]);
        assert!(point_eq(t.to_physical([0.5, 1.5, 2.25]), [2.0, 5.5, 10.0]));
    }

    #[test]
    fn test_inverse() {
        let m = [
            [0.0, -1.0, 0.0, 5.0],
            [1.0, 0.0, 0.0, -3.0],
            [0.0, 0.0, 2.0, 7.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let t = PhysicalTransform::from_index_to_physical(m).unwrap();
        let p = [3.0, 4.0, 5.0];
        let back = t.to_index(t.to_physical(p)).unwrap();
        assert!(point_eq(back, p));

        // "物理 -> 索引" 矩阵求逆后应与原矩阵互逆.
        let inv = t.inverse().unwrap();
        let m_inv: [[f64; 4]; 4] = std::array::from_fn(|r| std::array::from_fn(|c| inv.matrix()[(r, c)]));
        let t2 = PhysicalTransform::from_physical_to_index(m_inv).unwrap();
        assert!(t2.approx_eq(&t, 1e-9));
    }

    #[test]
    fn test_singular() {
        let m = [
            [1.0, 0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        assert!(matches!(
            PhysicalTransform::from_physical_to_index(m),
            Err(ZonalError::InvalidTransform)
        ));
        let t = PhysicalTransform::from_index_to_physical(m).unwrap();
        assert!(matches!(t.inverse(), Err(ZonalError::InvalidTransform)));
        assert!(t.to_index([1.0, 1.0, 1.0]).is_err());

        let mut m = m;
        m[0][0] = f64::NAN;
        assert!(PhysicalTransform::from_index_to_physical(m).is_err());
    }

    #[test]
    fn test_from_header() {
        // 无 sform/qform: 仅缩放.
        let mut h = NiftiHeader::default();
        h.pixdim = [1.0, 0.5, 0.5, 3.0, 0.0, 0.0, 0.0, 0.0];
        h.sform_code = 0;
        h.qform_code = 0;
        let t = PhysicalTransform::from_nifti_header(&h).unwrap();
        assert!(point_eq(t.to_physical([2.0, 2.0, 2.0]), [1.0, 1.0, 6.0]));

        // 单位四元数 + 偏移.
        h.qform_code = 1;
        (h.quatern_b, h.quatern_c, h.quatern_d) = (0.0, 0.0, 0.0);
        (h.quatern_x, h.quatern_y, h.quatern_z) = (10.0, 20.0, -30.0);
        let t = PhysicalTransform::from_nifti_header(&h).unwrap();
        assert!(point_eq(t.origin(), [10.0, 20.0, -30.0]));
        assert!(point_eq(t.to_physical([2.0, 2.0, 2.0]), [11.0, 21.0, -24.0]));

        // 绕 z 轴 180°: (b, c, d) = (0, 0, 1).
        h.quatern_d = 1.0;
        let t = PhysicalTransform::from_nifti_header(&h).unwrap();
        assert!(point_eq(t.to_physical([2.0, 2.0, 0.0]), [9.0, 19.0, -30.0]));

        // sform 优先.
        h.sform_code = 2;
        h.srow_x = [-1.0, 0.0, 0.0, 100.0];
        h.srow_y = [0.0, -1.0, 0.0, 50.0];
        h.srow_z = [0.0, 0.0, 2.0, -10.0];
        let t = PhysicalTransform::from_nifti_header(&h).unwrap();
        assert!(point_eq(t.to_physical([1.0, 1.0, 1.0]), [99.0, 49.0, -8.0]));
    }

    #[test]
    fn test_from_header_qform_guards() {
        let mut h = NiftiHeader::default();
        h.sform_code = 0;
        h.qform_code = 1;
        (h.quatern_b, h.quatern_c, h.quatern_d) = (0.0, 0.0, 0.0);
        (h.quatern_x, h.quatern_y, h.quatern_z) = (1.0, 2.0, 3.0);

        // qfac 为 0 时按 1 处理.
        h.pixdim = [0.0, 2.0, 2.0, 2.0, 0.0, 0.0, 0.0, 0.0];
        let t = PhysicalTransform::from_nifti_header(&h).unwrap();
        assert!(point_eq(t.to_physical([1.0, 1.0, 1.0]), [3.0, 4.0, 5.0]));

        // qfac 为 -1 时翻转 z 轴.
        h.pixdim[0] = -1.0;
        let t = PhysicalTransform::from_nifti_header(&h).unwrap();
        assert!(point_eq(t.to_physical([1.0, 1.0, 1.0]), [3.0, 4.0, 1.0]));

        h.pixdim[0] = 1.0;
        h.pixdim[3] = -2.0;
        assert!(matches!(
            PhysicalTransform::from_nifti_header(&h),
            Err(ZonalError::InvalidTransform)
        ));

        h.pixdim[3] = 2.0;
        h.pixdim[0] = 0.5;
        assert!(PhysicalTransform::from_nifti_header(&h).is_err());
    }
}
