use crate::consts::{is_background, is_foreground};
use crate::Idx2d;
use ndarray::iter::Iter;
use ndarray::{ArrayView2, ArrayViewMut2, Axis, Ix2};
use std::ops::{Index, IndexMut};

/// 不可变、借用的二维标签帧.
pub struct LabelSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::LabelGrid`].
    data: ArrayView2<'a, u16>,
}

impl Index<Idx2d> for LabelSlice<'_> {
    type Output = u16;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

/// 可变、借用的二维标签帧.
pub struct LabelSliceMut<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::LabelGrid`].
    data: ArrayViewMut2<'a, u16>,
}

/// 可变方法集合.
impl<'a> LabelSliceMut<'a> {
    /// 将整帧填充为 `label`.
    #[inline]
    pub fn fill(&mut self, label: u16) {
        self.data.fill(label);
    }

    /// 将第 `row` 行中 `mask` 为 `true` 的位置写为 `label`, 其余位置写为背景.
    ///
    /// 如果 `mask` 长度与帧宽不符, 则程序 panic.
    pub fn write_row_masked(&mut self, row: usize, mask: impl IntoIterator<Item = bool>, label: u16) {
        let mut line = self.data.index_axis_mut(Axis(0), row);
        let mut written = 0usize;
        for (dst, fg) in line.iter_mut().zip(mask) {
            *dst = if fg { label } else { crate::consts::BACKGROUND };
            written += 1;
        }
        assert_eq!(written, line.len(), "掩码长度与帧宽不符");
    }
}

impl Index<Idx2d> for LabelSliceMut<'_> {
    type Output = u16;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx2d> for LabelSliceMut<'_> {
    #[inline]
    fn index_mut(&mut self, index: Idx2d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

/// label 不可变方法集合.
macro_rules! impl_label_slice_immut {
    ($life: lifetime, $slice: ty, $array: ty) => {
        /// 不可变方法集合.
        impl<$life> $slice {
            /// 直接初始化.
            #[inline]
            pub(crate) fn new(data: $array) -> Self {
                Self { data }
            }

            /// 获得 **底层** 数据的一份不可变 shallow copy.
            #[inline]
            pub fn array_view(&self) -> ArrayView2<u16> {
                self.data.view()
            }

            /// 获取可以迭代像素的迭代器.
            #[inline]
            pub fn iter(&self) -> Iter<'_, u16, Ix2> {
                self.data.iter()
            }

            /// 该帧是否为全背景?
            #[inline]
            pub fn is_background(&self) -> bool {
                self.data.iter().copied().all(is_background)
            }

            /// 帧的分辨率 (行, 列).
            #[inline]
            pub fn shape(&self) -> Idx2d {
                self.data.dim()
            }

            /// 统计帧中值为 `label` 的像素总个数.
            #[inline]
            pub fn count(&self, label: u16) -> usize {
                self.data.iter().filter(|&p| *p == label).count()
            }
        }
    };
}
impl_label_slice_immut!('a, LabelSlice<'a>, ArrayView2<'a, u16>);
impl_label_slice_immut!('a, LabelSliceMut<'a>, ArrayViewMut2<'a, u16>);

/// 不可变、借用的二维体素帧.
pub struct VoxelSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::VoxelGrid`].
    data: ArrayView2<'a, f32>,
}

impl Index<Idx2d> for VoxelSlice<'_> {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> VoxelSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: ArrayView2<'a, f32>) -> Self {
        Self { data }
    }

    /// 获取可以迭代像素的迭代器.
    #[inline]
    pub fn iter(&self) -> Iter<'_, f32, Ix2> {
        self.data.iter()
    }

    /// 帧的分辨率 (行, 列).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 以行优先规则, 获取能迭代帧内所有 `(索引, 体素值)` 的迭代器.
    #[inline]
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &f32)> {
        self.data.indexed_iter()
    }

    /// 第 `row` 行每个位置是否为前景.
    ///
    /// 当 `row` 越界时 panic.
    pub fn row_foreground(&self, row: usize) -> impl Iterator<Item = bool> + '_ {
        self.data
            .index_axis(Axis(0), row)
            .into_iter()
            .map(|v| is_foreground(*v))
    }

    /// 每一行前景像素的个数, 按行号升序排列.
    pub fn row_foreground_counts(&self) -> Vec<usize> {
        self.data
            .axis_iter(Axis(0))
            .map(|line| line.iter().filter(|v| is_foreground(**v)).count())
            .collect()
    }
}
