//! 编辑日志的运行时错误.

use ndarray_npy::{ReadNpzError, WriteNpzError};

/// 编辑日志持久化 / 重放错误.
///
/// 无论发生哪种错误, 内存中的标签体和撤销/重做栈都保持原样且可继续使用.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// 底层文件 I/O 错误.
    #[error("edit log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 读取 npz 归档错误.
    #[error("failed to read edit log: {0}")]
    ReadNpz(#[from] ReadNpzError),

    /// 写入 npz 归档错误.
    #[error("failed to write edit log: {0}")]
    WriteNpz(#[from] WriteNpzError),

    /// 归档内容与 CSR 格式或当前标签体形状不一致.
    #[error("corrupt edit log: {0}")]
    Corrupt(String),

    /// 切片索引或扁平索引超出日志格式 (`i16` / `i32`) 的表示范围.
    #[error("index {0} does not fit the edit log format")]
    IndexOverflow(usize),
}
