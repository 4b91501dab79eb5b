//! 🖌️欢迎光临🩻
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d, LabelId};

pub use crate::data::slice::{LabelMirror, LabelSlice, LabelSliceMut, OwnedLabelSlice};
pub use crate::data::window::CtWindow;
pub use crate::data::{ScanVolume, SegVolume, VolumeShape};

pub use crate::catalog::{LabelCatalog, LabelEntry, LabelInfo};
pub use crate::consts::{BACKGROUND, DEFAULT_BRUSH_SIZE};

pub use crate::dataset::EditorConfig;
pub use crate::edit::{EditHistory, EditOp, Stroke, StrokeMode};
pub use crate::session::{
    EditError, EditReport, EditRequest, EditorSession, HistoryReport, SaveReport, SessionHandle,
};
