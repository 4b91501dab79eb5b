//! 标签编辑: 笔画光栅化, 编辑操作, 撤销/重做历史与编辑日志.

mod csr;
mod error;
mod history;
mod op;
mod raster;
mod stroke;

pub use csr::PackedLog;
pub use error::HistoryError;
pub use history::EditHistory;
pub use op::{EditOp, Side};
pub use raster::{apply_strokes, polygon_mask};
pub use stroke::{Stroke, StrokeMode};

/// 编辑日志相关操作的返回类型.
pub type HistoryResult<T> = Result<T, HistoryError>;
