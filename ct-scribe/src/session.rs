//! 编辑会话: 一个进程内唯一的可编辑病例.
//!
//! [`EditorSession`] 持有标签体, CT 扫描, 标签表与编辑历史. 每次编辑都按
//! "快照 -> 光栅化 -> 求差 -> 入栈" 的顺序在同一个 `&mut self` 借用内完成,
//! 因此不会与其他编辑交错. 需要在多个线程间共享时使用 [`SessionHandle`].

use crate::consts::is_background;
use crate::data::VolumeShape;
use crate::dataset::{load_catalog, load_scan, load_segmentation, EditorConfig, LoadError, LoadResult};
use crate::edit::{apply_strokes, EditHistory, EditOp, HistoryResult, Side, Stroke};
use crate::render::{self, RenderError, RenderResult};
use crate::{LabelCatalog, LabelEntry, LabelId, OwnedLabelSlice, ScanVolume, SegVolume};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// 一次编辑的结果.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EditReport {
    /// 编辑生效, 共改变 `num_pixels` 个体素.
    Ok {
        /// 改变的体素个数.
        num_pixels: usize,
    },

    /// 笔画没有改变任何体素, 历史不变.
    NoChange,

    /// 请求中没有笔画.
    NoStrokes,
}

/// 一次撤销 / 重做的结果.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HistoryReport {
    /// 成功, 受影响的是第 `slice_idx` 层切片.
    Ok {
        /// 受影响的切片.
        slice_idx: usize,
    },

    /// 对应的栈为空, 什么也没发生.
    Empty,
}

impl From<Option<usize>> for HistoryReport {
    #[inline]
    fn from(value: Option<usize>) -> Self {
        value.map_or(Self::Empty, |slice_idx| Self::Ok { slice_idx })
    }
}

/// 编辑日志保存结果.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SaveReport {
    /// 日志文件路径.
    pub path: PathBuf,

    /// 写入的操作个数.
    pub num_ops: usize,
}

impl Serialize for SaveReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("SaveReport", 3)?;
        s.serialize_field("status", "ok")?;
        s.serialize_field("path", &self.path)?;
        s.serialize_field("num_ops", &self.num_ops)?;
        s.end()
    }
}

/// 编辑请求被拒绝. 此时会话状态没有任何变化.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum EditError {
    /// 切片索引越界.
    #[error("Slice index out of range")]
    SliceOutOfRange {
        /// 请求的切片索引.
        index: usize,
        /// 切片总数.
        len: usize,
    },
}

impl Serialize for EditError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("EditError", 2)?;
        s.serialize_field("status", "error")?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

/// 编辑请求体: `{"strokes": [...]}`. 缺少 `strokes` 时视为空列表.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct EditRequest {
    /// 按顺序应用的笔画.
    #[serde(default)]
    pub strokes: Vec<Stroke>,
}

/// 编辑会话.
#[derive(Debug)]
pub struct EditorSession {
    segmentation: SegVolume,
    scan: Option<ScanVolume>,
    catalog: LabelCatalog,
    history: EditHistory,
    edits_log_path: PathBuf,
}

impl EditorSession {
    /// 以 `segmentation` 为基础标签体创建会话. `edits_log_path` 处若已有编辑日志,
    /// 会立即重放到标签体上.
    pub fn new<P: AsRef<Path>>(
        mut segmentation: SegVolume,
        catalog: LabelCatalog,
        edits_log_path: P,
    ) -> HistoryResult<Self> {
        let edits_log_path = edits_log_path.as_ref().to_owned();
        let mut history = EditHistory::new();
        let n = history.load_and_replay(&mut segmentation, &edits_log_path)?;
        if n > 0 {
            log::info!("replayed {n} ops from {}", edits_log_path.display());
        }
        Ok(Self {
            segmentation,
            scan: None,
            catalog,
            history,
            edits_log_path,
        })
    }

    /// 挂载 CT 扫描用于渲染. 形状必须与标签体一致.
    pub fn with_scan(mut self, scan: ScanVolume) -> LoadResult<Self> {
        let (seg, scan_shape) = (self.segmentation.shape(), scan.shape());
        if seg != scan_shape {
            return Err(LoadError::ShapeMismatch {
                scan: scan_shape,
                seg,
            });
        }
        self.scan = Some(scan);
        Ok(self)
    }

    /// 按 `config` 加载 CT, 基础标签体与标签表, 然后重放已有的编辑日志.
    pub fn open(config: &EditorConfig) -> LoadResult<Self> {
        let scan = load_scan(&config.scan_path)?;
        let segmentation = load_segmentation(&config.seg_path)?;
        let catalog = load_catalog(&config.labels_path)?;
        if scan.shape() != segmentation.shape() {
            return Err(LoadError::ShapeMismatch {
                scan: scan.shape(),
                seg: segmentation.shape(),
            });
        }
        let mut session = Self::new(segmentation, catalog, &config.edits_log_path)?;
        session.scan = Some(scan);
        log::info!(
            "opened {} with shape {:?}, {} labels",
            config.seg_path.display(),
            session.segmentation.shape(),
            session.catalog.len()
        );
        Ok(session)
    }

    /// 在第 `slice_idx` 层切片上以 `label` 为目标标签依次应用 `strokes`.
    ///
    /// 切片越界时返回错误且不做任何修改. 有体素变化时, 这些变化作为一个操作记入历史
    /// (并清空重做栈); 没有变化时历史保持不变.
    pub fn apply_edit(
        &mut self,
        slice_idx: usize,
        label: LabelId,
        strokes: &[Stroke],
    ) -> Result<EditReport, EditError> {
        let len = self.segmentation.len_z();
        if slice_idx >= len {
            return Err(EditError::SliceOutOfRange {
                index: slice_idx,
                len,
            });
        }
        if strokes.is_empty() {
            return Ok(EditReport::NoStrokes);
        }
        if !is_background(label) && !self.catalog.contains(label) {
            log::warn!("painting label {label} which is not in the label table");
        }

        // 先在副本上光栅化, 标签体只在得到完整操作后才被写入.
        let op = {
            let before = self.segmentation.slice_at(slice_idx).mirror();
            let mut scratch = OwnedLabelSlice::copy_of(&self.segmentation.slice_at(slice_idx));
            apply_strokes(&mut scratch.as_mutable(), label, strokes);
            EditOp::from_changes(slice_idx, before.changes(&scratch.as_immut()))
        };

        match op {
            None => {
                log::debug!("slice {slice_idx}: {} strokes, no change", strokes.len());
                Ok(EditReport::NoChange)
            }
            Some(op) => {
                let num_pixels = op.len();
                op.write_into(&mut self.segmentation, Side::After);
                self.history.push(op);
                log::debug!("slice {slice_idx}: label {label}, {num_pixels} voxels changed");
                Ok(EditReport::Ok { num_pixels })
            }
        }
    }

    /// 撤销最近一次编辑.
    pub fn undo(&mut self) -> HistoryReport {
        self.history.undo(&mut self.segmentation).into()
    }

    /// 重做最近一次撤销.
    pub fn redo(&mut self) -> HistoryReport {
        self.history.redo(&mut self.segmentation).into()
    }

    /// 把撤销栈写入编辑日志文件. 失败时内存状态不受影响.
    pub fn save_log(&self) -> HistoryResult<SaveReport> {
        self.history.save_npz(&self.edits_log_path)?;
        let num_ops = self.history.undo_len();
        log::info!("saved {num_ops} ops to {}", self.edits_log_path.display());
        Ok(SaveReport {
            path: self.edits_log_path.clone(),
            num_ops,
        })
    }

    /// 水平切片个数.
    #[inline]
    pub fn num_slices(&self) -> usize {
        self.segmentation.len_z()
    }

    /// 当前标签体中出现过的非背景标签, 按标签值升序.
    pub fn label_list(&self) -> Vec<LabelEntry> {
        self.catalog.present_in(&self.segmentation)
    }

    /// 当前标签体.
    #[inline]
    pub fn segmentation(&self) -> &SegVolume {
        &self.segmentation
    }

    /// CT 扫描 (如果已挂载).
    #[inline]
    pub fn scan(&self) -> Option<&ScanVolume> {
        self.scan.as_ref()
    }

    /// 标签表.
    #[inline]
    pub fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }

    /// 编辑历史.
    #[inline]
    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    /// 编辑日志路径.
    #[inline]
    pub fn edits_log_path(&self) -> &Path {
        &self.edits_log_path
    }

    /// 第 `slice_idx` 层 CT 切片的 PNG.
    pub fn ct_png(&self, slice_idx: usize) -> RenderResult<Vec<u8>> {
        let scan = self.scan.as_ref().ok_or(RenderError::NoScan)?;
        render::ct_slice_png(scan, slice_idx)
    }

    /// 第 `slice_idx` 层 `label` 叠加层的 PNG.
    pub fn mask_png(&self, slice_idx: usize, label: LabelId) -> RenderResult<Vec<u8>> {
        render::mask_slice_png(&self.segmentation, &self.catalog, slice_idx, label)
    }
}

/// 可在线程间共享的会话句柄.
///
/// 每个操作都在持有锁的情况下完成. 锁被毒化时直接取回内部状态继续使用:
/// 编辑的光栅化在切片副本上进行, 标签体与历史只在其后被更新,
/// 这之间以及撤销 / 重做中都没有会失败的步骤.
#[derive(Clone, Debug)]
pub struct SessionHandle(Arc<Mutex<EditorSession>>);

impl From<EditorSession> for SessionHandle {
    #[inline]
    fn from(session: EditorSession) -> Self {
        Self::new(session)
    }
}

impl SessionHandle {
    /// 包装一个会话.
    pub fn new(session: EditorSession) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, EditorSession> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 见 [`EditorSession::apply_edit`].
    pub fn apply_edit(
        &self,
        slice_idx: usize,
        label: LabelId,
        strokes: &[Stroke],
    ) -> Result<EditReport, EditError> {
        self.lock().apply_edit(slice_idx, label, strokes)
    }

    /// 见 [`EditorSession::undo`].
    pub fn undo(&self) -> HistoryReport {
        self.lock().undo()
    }

    /// 见 [`EditorSession::redo`].
    pub fn redo(&self) -> HistoryReport {
        self.lock().redo()
    }

    /// 见 [`EditorSession::save_log`].
    pub fn save_log(&self) -> HistoryResult<SaveReport> {
        self.lock().save_log()
    }

    /// 在持有锁的情况下以只读方式访问会话.
    pub fn with<R>(&self, f: impl FnOnce(&EditorSession) -> R) -> R {
        f(&self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::{EditError, EditReport, EditRequest, EditorSession, HistoryReport, SessionHandle};
    use crate::edit::Stroke;
    use crate::{LabelCatalog, LabelInfo, ScanVolume, SegVolume};
    use ndarray::Array3;
    use serde_json::json;

    fn catalog() -> LabelCatalog {
        [
            (3, LabelInfo { name: "spleen".into(), color_rgb: [0, 255, 0] }),
            (7, LabelInfo { name: "liver".into(), color_rgb: [255, 0, 0] }),
        ]
        .into_iter()
        .collect()
    }

    fn session(seg: SegVolume) -> (tempfile::TempDir, EditorSession) {
        let dir = tempfile::tempdir().unwrap();
        let s = EditorSession::new(seg, catalog(), dir.path().join("edits_log.npz")).unwrap();
        (dir, s)
    }

    #[test]
    fn test_single_pixel_undo_redo() {
        let (_dir, mut s) = session(SegVolume::background((1, 4, 4)));
        let report = s.apply_edit(0, 7, &[Stroke::pen(1, [(1.0, 1.0)])]).unwrap();
        assert_eq!(report, EditReport::Ok { num_pixels: 1 });
        assert_eq!(s.segmentation()[(0, 1, 1)], 7);
        assert_eq!(s.segmentation().count(7), 1);

        assert_eq!(s.undo(), HistoryReport::Ok { slice_idx: 0 });
        assert_eq!(s.segmentation(), &SegVolume::background((1, 4, 4)));

        assert_eq!(s.redo(), HistoryReport::Ok { slice_idx: 0 });
        assert_eq!(s.segmentation()[(0, 1, 1)], 7);
        assert_eq!(s.segmentation().count(7), 1);
    }

    #[test]
    fn test_lasso_rubber_clears_slice() {
        let mut seg = SegVolume::background((2, 5, 6));
        seg.slice_at_mut(1).array_view_mut().fill(3);
        let (_dir, mut s) = session(seg);

        let full = [(-1.0, -1.0), (6.0, -1.0), (6.0, 5.0), (-1.0, 5.0)];
        let report = s.apply_edit(1, 3, &[Stroke::lasso_rubber(full)]).unwrap();
        assert_eq!(report, EditReport::Ok { num_pixels: 30 });
        assert!(s.segmentation().slice_at(1).is_background());

        let op = &s.history().ops()[0];
        assert_eq!(op.len(), 30);
        assert!(op.old_vals().iter().all(|&v| v == 3));
        assert!(op.new_vals().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_no_change_and_no_strokes() {
        let (_dir, mut s) = session(SegVolume::background((1, 4, 4)));
        let rubber = [Stroke::rubber(3, [(2.0, 2.0)])];
        assert_eq!(s.apply_edit(0, 7, &rubber).unwrap(), EditReport::NoChange);
        assert_eq!(s.apply_edit(0, 7, &[]).unwrap(), EditReport::NoStrokes);
        assert_eq!(s.history().undo_len(), 0);
        assert_eq!(s.undo(), HistoryReport::Empty);
        assert_eq!(s.redo(), HistoryReport::Empty);
    }

    #[test]
    fn test_slice_out_of_range() {
        let (_dir, mut s) = session(SegVolume::background((2, 4, 4)));
        let err = s
            .apply_edit(2, 7, &[Stroke::pen(1, [(1.0, 1.0)])])
            .unwrap_err();
        assert_eq!(err, EditError::SliceOutOfRange { index: 2, len: 2 });
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"status": "error", "message": "Slice index out of range"})
        );
        assert!(s.segmentation().data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_report_wire_format() {
        assert_eq!(
            serde_json::to_value(EditReport::Ok { num_pixels: 4 }).unwrap(),
            json!({"status": "ok", "num_pixels": 4})
        );
        assert_eq!(
            serde_json::to_value(EditReport::NoChange).unwrap(),
            json!({"status": "no_change"})
        );
        assert_eq!(
            serde_json::to_value(HistoryReport::Ok { slice_idx: 2 }).unwrap(),
            json!({"status": "ok", "slice_idx": 2})
        );
        assert_eq!(
            serde_json::to_value(HistoryReport::Empty).unwrap(),
            json!({"status": "empty"})
        );
    }

    #[test]
    fn test_save_and_reopen() {
        let (dir, mut s) = session(SegVolume::background((2, 6, 6)));
        s.apply_edit(1, 7, &[Stroke::pen(3, [(2.0, 2.0), (4.0, 2.0)])])
            .unwrap();
        s.apply_edit(0, 3, &[Stroke::lasso_pen([(0.0, 0.0), (3.0, 0.0), (0.0, 3.0)])])
            .unwrap();
        let report = s.save_log().unwrap();
        assert_eq!(report.num_ops, 2);
        assert_eq!(
            serde_json::to_value(&report).unwrap()["status"],
            json!("ok")
        );

        let reopened = EditorSession::new(
            SegVolume::background((2, 6, 6)),
            catalog(),
            dir.path().join("edits_log.npz"),
        )
        .unwrap();
        assert_eq!(reopened.segmentation(), s.segmentation());
        assert_eq!(reopened.history().ops(), s.history().ops());
        let ids: Vec<_> = reopened.label_list().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 7]);
    }

    #[test]
    fn test_scan_shape_checked() {
        let (_dir, s) = session(SegVolume::background((2, 4, 4)));
        assert!(s.ct_png(0).is_err());
        let bad = ScanVolume::new(Array3::zeros((2, 4, 5)));
        assert!(s.with_scan(bad).is_err());

        let (_dir, s) = session(SegVolume::background((2, 4, 4)));
        let s = s.with_scan(ScanVolume::new(Array3::zeros((2, 4, 4)))).unwrap();
        assert!(!s.ct_png(1).unwrap().is_empty());
    }

    #[test]
    fn test_edit_request_body() {
        let req: EditRequest = serde_json::from_str(
            r#"{"strokes": [{"mode": "pen", "brushSize": 1, "points": [{"x": 1, "y": 1}]}]}"#,
        )
        .unwrap();
        assert_eq!(req.strokes.len(), 1);
        let empty: EditRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.strokes.is_empty());
    }

    #[test]
    fn test_handle_shares_state() {
        let (_dir, s) = session(SegVolume::background((1, 4, 4)));
        let handle = SessionHandle::new(s);
        let other = handle.clone();
        std::thread::spawn(move || {
            other
                .apply_edit(0, 7, &[Stroke::pen(1, [(0.0, 0.0)])])
                .unwrap();
        })
        .join()
        .unwrap();
        assert_eq!(handle.with(|s| s.history().undo_len()), 1);
        assert_eq!(handle.undo(), HistoryReport::Ok { slice_idx: 0 });
        assert_eq!(handle.with(|s| s.segmentation().count(7)), 0);
    }

    #[test]
    fn test_poisoned_handle_keeps_state() {
        let (_dir, s) = session(SegVolume::background((1, 4, 4)));
        let handle = SessionHandle::new(s);
        handle
            .apply_edit(0, 7, &[Stroke::pen(3, [(1.0, 1.0)])])
            .unwrap();

        let other = handle.clone();
        let joined = std::thread::spawn(move || {
            other.with(|s| assert_eq!(s.history().undo_len(), 0, "panics while holding the lock"))
        })
        .join();
        assert!(joined.is_err());

        assert_eq!(handle.with(|s| s.segmentation().count(7)), 9);
        assert_eq!(
            handle.apply_edit(0, 3, &[Stroke::pen(1, [(3.0, 3.0)])]).unwrap(),
            EditReport::Ok { num_pixels: 1 }
        );
        assert_eq!(handle.undo(), HistoryReport::Ok { slice_idx: 0 });
        assert_eq!(handle.undo(), HistoryReport::Ok { slice_idx: 0 });
        assert_eq!(handle.with(|s| s.segmentation().clone()), SegVolume::background((1, 4, 4)));
    }
}
