use std::ops::{Index, IndexMut};

use ndarray::{Array3, ArrayView, Axis, Ix3};

use crate::consts::BACKGROUND;
use crate::{Idx2d, Idx3d, LabelId};

pub mod slice;
pub mod window;

use slice::{LabelSlice, LabelSliceMut};

/// 3D 体数据的共用形状属性和部分通用操作.
///
/// 所有体数据都按照 (z, H, W) 的模式存储和访问.
pub trait VolumeShape {
    /// 形状 (z, H, W).
    fn shape(&self) -> Idx3d;

    /// 单层水平切片的形状 (H, W).
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 水平切片个数, 即 z 方向长度.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取单层水平切片的像素个数.
    #[inline]
    fn slice_size(&self) -> usize {
        let (h, w) = self.slice_shape();
        h * w
    }

    /// 体素总数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// `(z, h, w)` 是否落在体数据内?
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }
}

/// 3D CT 扫描 (HU 值以 `f32` 保存), 仅用于显示.
#[derive(Debug, Clone)]
pub struct ScanVolume {
    data: Array3<f32>,
}

impl VolumeShape for ScanVolume {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl Index<Idx3d> for ScanVolume {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl ScanVolume {
    /// 由 (z, H, W) 数组直接创建.
    #[inline]
    pub fn new(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// 获取第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ndarray::ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }
}

/// 3D 分割标签体. 每个体素保存一个标签值, `0` 代表背景.
///
/// 这是所有编辑操作的唯一事实来源.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegVolume {
    data: Array3<LabelId>,
}

impl VolumeShape for SegVolume {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl Index<Idx3d> for SegVolume {
    type Output = LabelId;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for SegVolume {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl SegVolume {
    /// 由 (z, H, W) 数组直接创建.
    #[inline]
    pub fn new(data: Array3<LabelId>) -> Self {
        Self { data }
    }

    /// 创建形状为 `shape` 的全背景标签体.
    #[inline]
    pub fn background(shape: Idx3d) -> Self {
        Self::new(Array3::from_elem(shape, BACKGROUND))
    }

    /// 第 `z_index` 层的只读切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> LabelSlice<'_> {
        LabelSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 第 `z_index` 层的可写切片视图.
    /// 对切片的修改会立即反映在本标签体上.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at_mut(&mut self, z_index: usize) -> LabelSliceMut<'_> {
        LabelSliceMut::new(self.data.index_axis_mut(Axis(0), z_index))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, LabelId, Ix3> {
        self.data.view()
    }

    /// 值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: LabelId) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 在第 `z_index` 层切片上, 把 `flat_idx` (行优先扁平索引) 处的体素依次写为 `vals`.
    ///
    /// 调用方保证两者等长且索引不越界, 否则程序 panic.
    pub fn write_flat(&mut self, z_index: usize, flat_idx: &[u32], vals: &[LabelId]) {
        assert_eq!(flat_idx.len(), vals.len(), "索引与取值长度不一致");
        let mut sli = self.slice_at_mut(z_index);
        for (&i, &v) in flat_idx.iter().zip(vals) {
            sli.set_flat(i as usize, v);
        }
    }

    /// 收集标签体中出现过的所有非背景标签值, 升序排列.
    pub fn present_labels(&self) -> Vec<LabelId> {
        let mut seen = std::collections::BTreeSet::new();
        seen.extend(self.data.iter().copied().filter(|&p| p != BACKGROUND));
        seen.into_iter().collect()
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use std::collections::BTreeSet;
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl SegVolume {
    /// 借助 `rayon`, 按水平切片并行收集出现过的所有非背景标签值, 升序排列.
    pub fn par_present_labels(&self) -> Vec<LabelId> {
        self.data
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|sli| {
                sli.iter()
                    .copied()
                    .filter(|&p| p != BACKGROUND)
                    .collect::<BTreeSet<_>>()
            })
            .reduce(BTreeSet::new, |mut a, b| {
                a.extend(b);
                a
            })
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{SegVolume, VolumeShape};

    #[test]
    fn test_slice_view_writes_through() {
        let mut vol = SegVolume::background((3, 4, 5));
        {
            let mut sli = vol.slice_at_mut(1);
            sli[(2, 3)] = 6;
        }
        assert_eq!(vol[(1, 2, 3)], 6);
        assert_eq!(vol.count(6), 1);
        assert_eq!(vol.slice_at(0).count(6), 0);
    }

    #[test]
    fn test_write_flat() {
        let mut vol = SegVolume::background((2, 2, 3));
        vol.write_flat(1, &[0, 5], &[3, 4]);
        assert_eq!(vol[(1, 0, 0)], 3);
        assert_eq!(vol[(1, 1, 2)], 4);
        assert_eq!(vol.slice_at(0).count(0), 6);
    }

    #[test]
    fn test_shape_helpers() {
        let vol = SegVolume::background((7, 4, 5));
        assert_eq!(vol.len_z(), 7);
        assert_eq!(vol.slice_shape(), (4, 5));
        assert_eq!(vol.slice_size(), 20);
        assert_eq!(vol.size(), 140);
        assert!(vol.check(&(6, 3, 4)));
        assert!(!vol.check(&(7, 0, 0)));
    }

    #[test]
    fn test_present_labels() {
        let mut vol = SegVolume::background((3, 2, 2));
        vol[(0, 0, 0)] = 5;
        vol[(2, 1, 1)] = 2;
        vol[(1, 1, 0)] = 5;
        assert_eq!(vol.present_labels(), vec![2, 5]);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_present_labels_matches_serial() {
        let mut vol = SegVolume::background((4, 3, 3));
        vol[(0, 1, 1)] = 9;
        vol[(3, 2, 0)] = 1;
        vol[(2, 0, 2)] = -2;
        assert_eq!(vol.par_present_labels(), vol.present_labels());
        assert_eq!(vol.par_present_labels(), vec![-2, 1, 9]);
    }
}
