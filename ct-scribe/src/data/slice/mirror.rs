//! 水平切片镜像. 用于在编辑前快照标签切片, 并在随后求差分或复原.

use super::LabelSlice;
use crate::LabelId;

/// 一个拥有所有权的标签水平切片的不透明镜像, 按行优先存储.
///
/// 注意该结构是被设计来 **快速** 比较和回填原数据的,
/// 因此并不压缩原数据.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelMirror(Vec<LabelId>);

impl LabelMirror {
    #[inline]
    pub(crate) fn from_row_major(data: Vec<LabelId>) -> Self {
        Self(data)
    }

    /// 镜像的像素个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 镜像是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 行优先的原始数据.
    #[inline]
    pub fn as_slice(&self) -> &[LabelId] {
        &self.0
    }

    /// 与 `current` 逐像素比较, 按扁平索引升序迭代所有发生变化的
    /// `(扁平索引, 镜像中的旧值, current 中的新值)`.
    ///
    /// 如果 `current` 大小与镜像不符, 则程序 panic.
    pub fn changes<'s>(
        &'s self,
        current: &'s LabelSlice<'_>,
    ) -> impl Iterator<Item = (usize, LabelId, LabelId)> + 's {
        assert_eq!(self.len(), current.size(), "镜像大小不符");
        self.0
            .iter()
            .zip(current.iter())
            .enumerate()
            .filter_map(|(i, (&old, &new))| (old != new).then_some((i, old, new)))
    }
}
