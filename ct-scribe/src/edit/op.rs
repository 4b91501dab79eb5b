//! 编辑操作: 单层切片上的稀疏差分.

use crate::{LabelId, SegVolume};

/// 重放方向.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Side {
    /// 写回编辑前的值 (撤销).
    Before,

    /// 写入编辑后的值 (重做 / 重放).
    After,
}

/// 一次编辑在一层切片上造成的全部体素变化.
///
/// 三个数组等长且非空, `flat_idx` 为该层切片内的行优先扁平索引, 严格升序.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EditOp {
    slice_idx: usize,
    flat_idx: Vec<u32>,
    old_vals: Vec<LabelId>,
    new_vals: Vec<LabelId>,
}

impl EditOp {
    /// 从 `(扁平索引, 旧值, 新值)` 序列构建操作. 序列为空时返回 `None`,
    /// 这样零变化的编辑永远不会被记录.
    ///
    /// 调用方保证扁平索引严格升序.
    pub fn from_changes<I>(slice_idx: usize, changes: I) -> Option<Self>
    where
        I: IntoIterator<Item = (usize, LabelId, LabelId)>,
    {
        let mut flat_idx = Vec::new();
        let mut old_vals = Vec::new();
        let mut new_vals = Vec::new();
        for (i, old, new) in changes {
            debug_assert!(i <= u32::MAX as usize);
            flat_idx.push(i as u32);
            old_vals.push(old);
            new_vals.push(new);
        }
        if flat_idx.is_empty() {
            return None;
        }
        debug_assert!(flat_idx.windows(2).all(|w| w[0] < w[1]));
        Some(Self {
            slice_idx,
            flat_idx,
            old_vals,
            new_vals,
        })
    }

    /// 直接由三个等长数组构建. 长度不一致或为空时返回 `None`.
    pub fn from_parts(
        slice_idx: usize,
        flat_idx: Vec<u32>,
        old_vals: Vec<LabelId>,
        new_vals: Vec<LabelId>,
    ) -> Option<Self> {
        if flat_idx.is_empty() || flat_idx.len() != old_vals.len() || flat_idx.len() != new_vals.len()
        {
            return None;
        }
        Some(Self {
            slice_idx,
            flat_idx,
            old_vals,
            new_vals,
        })
    }

    /// 所在切片的 z 索引.
    #[inline]
    pub fn slice_idx(&self) -> usize {
        self.slice_idx
    }

    /// 切片内的扁平索引.
    #[inline]
    pub fn flat_idx(&self) -> &[u32] {
        &self.flat_idx
    }

    /// 编辑前的值.
    #[inline]
    pub fn old_vals(&self) -> &[LabelId] {
        &self.old_vals
    }

    /// 编辑后的值.
    #[inline]
    pub fn new_vals(&self) -> &[LabelId] {
        &self.new_vals
    }

    /// 变化的体素个数 (总是大于 0).
    #[inline]
    pub fn len(&self) -> usize {
        self.flat_idx.len()
    }

    /// 总是返回 `false`. 空操作不会被构造出来.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flat_idx.is_empty()
    }

    /// 把 `side` 一侧的值写回 `volume`.
    ///
    /// 切片或扁平索引越界时 panic. 从日志解码出的操作在解码时已校验过.
    pub fn write_into(&self, volume: &mut SegVolume, side: Side) {
        let vals = match side {
            Side::Before => &self.old_vals,
            Side::After => &self.new_vals,
        };
        volume.write_flat(self.slice_idx, &self.flat_idx, vals);
    }
}
