//! 分割标签切片对象的操作.

mod core;
mod mirror;

pub use core::{LabelSlice, LabelSliceMut, OwnedLabelSlice};

pub use mirror::LabelMirror;
