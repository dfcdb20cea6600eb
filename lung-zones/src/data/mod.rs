use std::ops::{Index, IndexMut};
use std::path::Path;

use ndarray::{Array3, ArrayD, ArrayView, ArrayViewMut, Axis, Ix3};
use nifti::{InMemNiftiObject, IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::is_foreground;
use crate::error::{ZonalError, ZonalResult};
use crate::{Idx2d, Idx3d};

pub mod geometry;
pub mod slice;
pub mod transform;

pub use geometry::{Geometry, Spacing};
pub use slice::{LabelSlice, LabelSliceMut, VoxelSlice};
pub use transform::PhysicalTransform;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 将 nifti 的 (x, y, z) 维度转换成 (z, y, x). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    let [_, x, y, z, ..] = h.dim;
    (z as usize, y as usize, x as usize)
}

/// 读取 nifti 文件, 返回对象本体, 几何信息和 (z, y, x) 形状.
fn open_nifti(path: &Path) -> ZonalResult<(InMemNiftiObject, Geometry, Idx3d)> {
    let obj = ReaderOptions::new().read_file(path)?;
    let header = obj.header();
    let geometry = Geometry::from_nifti_header(header)?;
    let shape = get_shape_from_header(header);
    Ok((obj, geometry, shape))
}

/// 将 nifti 读出的 `[x, y, z]` 动态维度数组转置为 `[z, y, x]`, 并收紧为 `Array3`.
///
/// 尾部长度为 1 的维度 (如 `[x, y, z, 1]`) 会被去掉. 其余非三维数据返回 `Err`.
fn into_array3<T>(mut data: ArrayD<T>, shape: Idx3d) -> ZonalResult<Array3<T>> {
    while data.ndim() > 3 && data.shape()[data.ndim() - 1] == 1 {
        let last = data.ndim() - 1;
        data = data.index_axis_move(Axis(last), 0);
    }
    if data.ndim() != 3 {
        return Err(ZonalError::param(format!(
            "只支持三维 nifti 数据, 实际形状为 {:?}",
            data.shape()
        )));
    }
    // [x, y, z] -> [z, y, x].
    let data = data.permuted_axes([2, 1, 0].as_slice());
    // The nature of nifti data field layout.
    debug_assert!(data.is_standard_layout());
    Array3::from_shape_vec(shape, data.into_raw_vec())
        .map_err(|e| ZonalError::param(format!("nifti 维度与数据长度不符: {e}")))
}

/// 三维网格 (体素网格与标签网格) 的共用属性和部分通用操作.
pub trait GridAttr {
    /// 获取几何信息.
    fn geometry(&self) -> &Geometry;

    /// 获取数据形状大小 `(z, y, x)`.
    fn shape(&self) -> Idx3d;

    /// 获取单帧形状大小 `(y, x)`.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取帧个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取体素尺寸.
    #[inline]
    fn spacing(&self) -> Spacing {
        self.geometry().spacing
    }

    /// 获取索引到物理空间的变换.
    #[inline]
    fn transform(&self) -> &PhysicalTransform {
        &self.geometry().transform
    }

    /// 获取单个体素的物理体积, 以立方毫米为单位.
    #[inline]
    fn voxel_mm3(&self) -> f64 {
        self.spacing().voxel_mm3()
    }

    /// 与 `other` 是否逐体素对齐 (形状一致且几何信息一致)?
    #[inline]
    fn is_aligned_with<G: GridAttr + ?Sized>(&self, other: &G) -> bool {
        self.shape() == other.shape() && self.geometry().is_aligned_with(other.geometry())
    }
}

/// 3D 体素网格. 强度值以 `f32` 保存, 按 `(z, y, x)` 索引.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VoxelGrid {
    geometry: Geometry,
    data: Array3<f32>,
}

impl GridAttr for VoxelGrid {
    #[inline]
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl Index<Idx3d> for VoxelGrid {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl VoxelGrid {
    /// 以 `(z, y, x)` 排列的数组和几何信息创建体素网格.
    #[inline]
    pub fn new(data: Array3<f32>, geometry: Geometry) -> Self {
        Self { geometry, data }
    }

    /// 以单位体素尺寸和恒等变换创建体素网格.
    #[inline]
    pub fn from_array(data: Array3<f32>) -> Self {
        Self::new(data, Geometry::default())
    }

    /// 打开 nii 文件格式的 3D 体素网格. 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> ZonalResult<Self> {
        let (obj, geometry, shape) = open_nifti(path.as_ref())?;
        let data = obj.into_volume().into_ndarray::<f32>()?;
        let data = into_array3(data, shape)?;
        Ok(Self { geometry, data })
    }

    /// 获取第 `z_index` 帧的不可变视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> VoxelSlice<'_> {
        VoxelSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取能按升序迭代所有帧的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = VoxelSlice> {
        self.data.axis_iter(Axis(0)).map(VoxelSlice::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 统计前景 (值大于 0) 体素个数.
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|v| is_foreground(**v)).count()
    }
}

/// 3D 标签网格. 标签值以 `u16` 保存, `0` 为背景, 按 `(z, y, x)` 索引.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabelGrid {
    geometry: Geometry,
    data: Array3<u16>,
}

impl GridAttr for LabelGrid {
    #[inline]
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl Index<Idx3d> for LabelGrid {
    type Output = u16;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for LabelGrid {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl LabelGrid {
    /// 以 `(z, y, x)` 排列的数组和几何信息创建标签网格.
    #[inline]
    pub fn new(data: Array3<u16>, geometry: Geometry) -> Self {
        Self { geometry, data }
    }

    /// 以单位体素尺寸和恒等变换创建标签网格.
    #[inline]
    pub fn from_array(data: Array3<u16>) -> Self {
        Self::new(data, Geometry::default())
    }

    /// 创建与 `shape`, `geometry` 对应的全背景标签网格.
    #[inline]
    pub fn zeros(shape: Idx3d, geometry: Geometry) -> Self {
        Self::new(Array3::zeros(shape), geometry)
    }

    /// 打开 nii 文件格式的 3D 标签网格. 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> ZonalResult<Self> {
        let (obj, geometry, shape) = open_nifti(path.as_ref())?;
        let data = obj.into_volume().into_ndarray::<u16>()?;
        let data = into_array3(data, shape)?;
        Ok(Self { geometry, data })
    }

    /// 以 nifti 格式将标签网格写到 `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ZonalResult<()> {
        // [z, y, x] -> [x, y, z]
        let view = self.data.view().permuted_axes([2, 1, 0]);
        let mut header = NiftiHeader::default();
        let [sx, sy, sz] = self.geometry.spacing.as_xyz();
        header.pixdim[1..4].copy_from_slice(&[sx as f32, sy as f32, sz as f32]);
        let m = self.geometry.transform.matrix();
        header.sform_code = 2;
        for c in 0..4 {
            header.srow_x[c] = m[(0, c)] as f32;
            header.srow_y[c] = m[(1, c)] as f32;
            header.srow_z[c] = m[(2, c)] as f32;
        }
        nifti::writer::WriterOptions::new(path.as_ref())
            .reference_header(&header)
            .write_nifti(&view)?;
        Ok(())
    }

    /// 获取第 `z_index` 帧的不可变视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> LabelSlice<'_> {
        LabelSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取第 `z_index` 帧的可变视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at_mut(&mut self, z_index: usize) -> LabelSliceMut<'_> {
        LabelSliceMut::new(self.data.index_axis_mut(Axis(0), z_index))
    }

    /// 获取能按升序迭代所有帧的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = LabelSlice> {
        self.data.axis_iter(Axis(0)).map(LabelSlice::new)
    }

    /// 获取能按升序迭代所有可变帧的迭代器.
    #[inline]
    pub fn slice_iter_mut(&mut self) -> impl ExactSizeIterator<Item = LabelSliceMut> {
        self.data.axis_iter_mut(Axis(0)).map(LabelSliceMut::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u16, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, u16, Ix3> {
        self.data.view_mut()
    }

    /// 最大标签值. 全背景 (或空网格) 时为 `0`.
    #[inline]
    pub fn max_label(&self) -> u16 {
        self.data.iter().copied().max().unwrap_or(0)
    }

    /// 获取值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u16) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }
}

/// 检查体素网格与标签网格形状是否一致.
pub fn check_shapes(voxels: &VoxelGrid, labels: &LabelGrid) -> ZonalResult<()> {
    if voxels.shape() == labels.shape() {
        Ok(())
    } else {
        Err(ZonalError::InputShapeMismatch {
            voxels: voxels.shape(),
            labels: labels.shape(),
        })
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl LabelGrid {
    /// 借助 `rayon`, 并行地对每个可变帧实施 `op` 操作.
    /// 该操作会同时携带 z 方向索引信息.
    pub fn par_for_each_indexed_slice_mut<F>(&mut self, op: F)
    where
        F: Fn(usize, LabelSliceMut) + Sync + Send,
    {
        self.data_mut()
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, v)| {
                op(i, LabelSliceMut::new(v));
            });
    }
}
