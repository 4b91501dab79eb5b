//! 撤销 / 重做历史, 以及历史在磁盘上的持久化.

use super::csr::PackedLog;
use super::{EditOp, HistoryResult, Side};
use crate::data::VolumeShape;
use crate::SegVolume;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// 编辑历史.
///
/// 撤销栈自底向上即为 "基础标签体 + 依次重放" 能得到当前标签体的操作序列,
/// 这也是持久化时写出的全部内容. 重做栈只存在于内存中.
#[derive(Clone, Debug, Default)]
pub struct EditHistory {
    undo_stack: Vec<EditOp>,
    redo_stack: Vec<EditOp>,
}

impl EditHistory {
    /// 空历史.
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个新操作. 任何新编辑都会使重做栈失效.
    pub fn push(&mut self, op: EditOp) {
        self.undo_stack.push(op);
        self.redo_stack.clear();
    }

    /// 是否有可撤销的操作?
    #[inline]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// 是否有可重做的操作?
    #[inline]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// 撤销栈深度.
    #[inline]
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// 重做栈深度.
    #[inline]
    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// 撤销栈中的操作, 最早的在前.
    #[inline]
    pub fn ops(&self) -> &[EditOp] {
        &self.undo_stack
    }

    /// 撤销栈中所有操作涉及的体素总数.
    pub fn total_voxels(&self) -> usize {
        self.undo_stack.iter().map(EditOp::len).sum()
    }

    /// 撤销最近一个操作, 返回其切片索引. 撤销栈为空时返回 `None`, `volume` 不变.
    pub fn undo(&mut self, volume: &mut SegVolume) -> Option<usize> {
        let op = self.undo_stack.pop()?;
        op.write_into(volume, Side::Before);
        let z = op.slice_idx();
        self.redo_stack.push(op);
        Some(z)
    }

    /// 重做最近一次撤销的操作, 返回其切片索引. 重做栈为空时返回 `None`, `volume` 不变.
    pub fn redo(&mut self, volume: &mut SegVolume) -> Option<usize> {
        let op = self.redo_stack.pop()?;
        op.write_into(volume, Side::After);
        let z = op.slice_idx();
        self.undo_stack.push(op);
        Some(z)
    }

    /// 将撤销栈写入 `path` (压缩 npz).
    ///
    /// 先写入同目录下的临时文件再改名, 写到一半失败不会破坏已有日志.
    pub fn save_npz<P: AsRef<Path>>(&self, path: P) -> HistoryResult<()> {
        let path = path.as_ref();
        let packed = PackedLog::pack(&self.undo_stack)?;
        let tmp = tmp_path(path);
        if let Err(e) = write_packed(&packed, &tmp).and_then(|_| Ok(fs::rename(&tmp, path)?)) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        log::debug!(
            "wrote {} ops ({} voxels) to {}",
            packed.num_ops(),
            packed.idxs.len(),
            path.display()
        );
        Ok(())
    }

    /// 读取 `path` 处的日志, 按顺序重放到 `volume` 上, 并用它替换撤销栈 (重做栈清空).
    /// 返回重放的操作数.
    ///
    /// 文件不存在时返回 `Ok(0)`, 什么也不改. 日志在修改任何状态之前就已整体校验,
    /// 出错时 `volume` 与本历史保持原样.
    pub fn load_and_replay<P: AsRef<Path>>(
        &mut self,
        volume: &mut SegVolume,
        path: P,
    ) -> HistoryResult<usize> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let packed = PackedLog::read_npz(BufReader::new(file))?;
        let ops = packed.unpack(volume.shape())?;
        Ok(self.replay(volume, ops))
    }

    /// 按顺序把 `ops` 写入 `volume`, 并让它们成为新的撤销栈.
    pub(crate) fn replay(&mut self, volume: &mut SegVolume, ops: Vec<EditOp>) -> usize {
        for op in &ops {
            op.write_into(volume, Side::After);
        }
        let n = ops.len();
        self.undo_stack = ops;
        self.redo_stack.clear();
        n
    }
}

fn write_packed(packed: &PackedLog, path: &Path) -> HistoryResult<()> {
    let file = File::create(path)?;
    let mut w = packed.write_npz(BufWriter::new(file))?;
    w.flush()?;
    w.get_ref().sync_all()?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
