use super::LabelMirror;
use crate::consts::is_background;
use crate::{Idx2d, LabelId};
use ndarray::iter::Iter;
use ndarray::{s, Array2, ArrayView2, ArrayViewMut2, Ix2, Zip};
use std::ops::{Index, IndexMut};

/// 不可变、借用的二维水平分割标签切片.
pub struct LabelSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::SegVolume`].
    data: ArrayView2<'a, LabelId>,
}

impl Index<Idx2d> for LabelSlice<'_> {
    type Output = LabelId;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

/// 可变、借用的二维水平分割标签切片.
///
/// 所有写操作都直接落在 [`crate::SegVolume`] 的存储上, 不经过任何拷贝.
pub struct LabelSliceMut<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::SegVolume`].
    data: ArrayViewMut2<'a, LabelId>,
}

/// 可变方法集合.
impl<'a> LabelSliceMut<'a> {
    /// 获得 **底层** 数据的一份可变 shallow copy.
    #[inline]
    pub fn array_view_mut(&mut self) -> ArrayViewMut2<'_, LabelId> {
        self.data.view_mut()
    }

    /// 将以 `(row, col)` 为中心, 半径为 `radius` 的正方形区域 (边长 `2 * radius + 1`)
    /// 全部写为 `label`. 越界部分被裁剪.
    ///
    /// 中心本身越界时不做任何事, 返回 `false`.
    pub fn fill_square(&mut self, (row, col): Idx2d, radius: usize, label: LabelId) -> bool {
        if !self.check((row, col)) {
            return false;
        }
        let (h, w) = self.shape();
        let r0 = row.saturating_sub(radius);
        let r1 = row.saturating_add(radius).saturating_add(1).min(h);
        let c0 = col.saturating_sub(radius);
        let c1 = col.saturating_add(radius).saturating_add(1).min(w);
        self.data.slice_mut(s![r0..r1, c0..c1]).fill(label);
        true
    }

    /// 将 `mask` 为 `true` 的所有位置写为 `label`, 返回写入的像素个数.
    ///
    /// `mask` 与切片形状不一致时 panic.
    pub fn fill_masked(&mut self, mask: &ArrayView2<bool>, label: LabelId) -> usize {
        assert_eq!(self.data.shape(), mask.shape(), "掩码形状不符");
        let mut cnt = 0usize;
        Zip::from(&mut self.data).and(mask).for_each(|p, &m| {
            if m {
                *p = label;
                cnt += 1;
            }
        });
        cnt
    }

    /// 按行优先的扁平索引写入像素. 越界时 panic.
    #[inline]
    pub fn set_flat(&mut self, flat: usize, label: LabelId) {
        let pos = self.unflatten(flat);
        self.data[pos] = label;
    }
}

impl Index<Idx2d> for LabelSliceMut<'_> {
    type Output = LabelId;

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
            pub fn array_view(&self) -> ArrayView2<'_, LabelId> {
                self.data.view()
            }

            /// 获取可以迭代图像像素的迭代器.
            #[inline]
            pub fn iter(&self) -> Iter<'_, LabelId, Ix2> {
                self.data.iter()
            }

            /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
            #[inline]
            pub fn get(&self, pos: Idx2d) -> Option<&LabelId> {
                self.data.get(pos)
            }

            /// 按行优先的扁平索引读取像素. 越界时返回 `None`.
            #[inline]
            pub fn get_flat(&self, flat: usize) -> Option<&LabelId> {
                if flat >= self.size() {
                    return None;
                }
                self.data.get(self.unflatten(flat))
            }

            /// 扁平索引转换为 (高, 宽) 索引. 不检查越界.
            #[inline]
            fn unflatten(&self, flat: usize) -> Idx2d {
                let w = self.width();
                debug_assert_ne!(w, 0);
                (flat / w, flat % w)
            }

            /// 该图是否为全背景图?
            #[inline]
            pub fn is_background(&self) -> bool {
                self.data.iter().copied().all(is_background)
            }

            /// 图像的分辨率 (高, 宽).
            #[inline]
            pub fn shape(&self) -> Idx2d {
                self.data.dim()
            }

            /// 图像的像素个数.
            #[inline]
            pub fn size(&self) -> usize {
                let (h, w) = self.shape();
                h * w
            }

            /// 判断一个索引是否合法 (未越界).
            #[inline]
            pub fn check(&self, (h, w): Idx2d) -> bool {
                let (h_len, w_len) = self.shape();
                h < h_len && w < w_len
            }

            /// 统计图像中值为 `label` 的像素总个数.
            #[inline]
            pub fn count(&self, label: LabelId) -> usize {
                self.data.iter().filter(|&p| *p == label).count()
            }

            /// 将图像转化为行优先的序列化存储.
            pub fn as_row_major_vec(&self) -> Vec<LabelId> {
                let mut buf = Vec::with_capacity(self.size());
                buf.extend(self.iter());
                buf
            }

            /// 获取拥有所有权的镜像, 供以后比较或恢复.
            #[inline]
            pub fn mirror(&self) -> LabelMirror {
                LabelMirror::from_row_major(self.as_row_major_vec())
            }

            /// 获得图像的高.
            #[inline]
            pub fn height(&self) -> usize {
                self.shape().0
            }

            /// 获得图像的宽.
            #[inline]
            pub fn width(&self) -> usize {
                self.shape().1
            }

            /// 以行优先规则, 获取能迭代图像所有 `(索引, 像素值)` 的迭代器.
            #[inline]
            pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &LabelId)> {
                self.data.indexed_iter()
            }
        }
    };
}
impl_label_slice_immut!('a, LabelSlice<'a>, ArrayView2<'a, LabelId>);
impl_label_slice_immut!('a, LabelSliceMut<'a>, ArrayViewMut2<'a, LabelId>);

/// 拥有所有权的二维水平分割标签切片.
///
/// 不属于任何标签体的独立切片, 主要用于单独验证光栅化结果.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedLabelSlice {
    data: Array2<LabelId>,
}

impl OwnedLabelSlice {
    /// 创建形状为 `shape`, 所有像素都是 `label` 的切片.
    #[inline]
    pub fn from_elem(shape: Idx2d, label: LabelId) -> Self {
        Self {
            data: Array2::from_elem(shape, label),
        }
    }

    /// 创建形状为 `shape` 的全背景切片.
    #[inline]
    pub fn background(shape: Idx2d) -> Self {
        Self::from_elem(shape, crate::consts::BACKGROUND)
    }

    /// 复制 `slice` 的全部像素.
    pub fn copy_of(slice: &LabelSlice<'_>) -> Self {
        Self {
            data: slice.array_view().to_owned(),
        }
    }

    /// 获得不可变切片引用.
    #[inline]
    pub fn as_immut(&self) -> LabelSlice<'_> {
        LabelSlice::new(self.data.view())
    }

    /// 获得可变切片引用.
    #[inline]
    pub fn as_mutable(&mut self) -> LabelSliceMut<'_> {
        LabelSliceMut::new(self.data.view_mut())
    }
}
