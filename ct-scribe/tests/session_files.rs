//! 从病例目录打开会话, 编辑, 保存, 再次打开.

use ct_scribe::prelude::*;
use ndarray::Array3;
use ndarray_npy::write_npy;
use std::fs;
use std::path::Path;

const LABELS: &str = r#"{
    "labels": {
        "1": {"name": "liver", "color_rgb": [255, 0, 0]},
        "2": {"name": "tumor", "color_rgb": [0, 255, 0]}
    }
}"#;

fn init_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}

/// 写出一个 (4, 12, 10) 的病例: CT 为 f64, 标签为 u8, 第 2 层有一块肝脏.
fn write_case(dir: &Path) -> EditorConfig {
    let ct = Array3::from_shape_fn((4, 12, 10), |(z, h, w)| (z * 100 + h * 10 + w) as f64 - 200.0);
    let mut seg = Array3::<u8>::zeros((4, 12, 10));
    for h in 3..7 {
        for w in 2..6 {
            seg[(2, h, w)] = 1;
        }
    }
    write_npy(dir.join("ct_volume.npy"), &ct).unwrap();
    write_npy(dir.join("rtstruct_labels.npy"), &seg).unwrap();
    fs::write(dir.join("labels.json"), LABELS).unwrap();
    EditorConfig::from_dir(dir)
}

#[test]
fn open_edit_save_reopen() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = write_case(dir.path());

    let mut session = EditorSession::open(&config).unwrap();
    assert_eq!(session.num_slices(), 4);
    let ids: Vec<_> = session.label_list().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1]);

    let req: EditRequest = serde_json::from_str(
        r#"{"strokes": [
            {"mode": "lasso_pen", "points": [{"x": 1, "y": 1}, {"x": 8, "y": 1}, {"x": 8, "y": 9}, {"x": 1, "y": 9}]},
            {"mode": "rubber", "brushSize": 1, "points": [{"x": 4, "y": 4}]}
        ]}"#,
    )
    .unwrap();
    let report = session.apply_edit(1, 2, &req.strokes).unwrap();
    // 8 * 9 的方块, 中间擦掉一个像素.
    assert_eq!(report, EditReport::Ok { num_pixels: 71 });

    session
        .apply_edit(2, 0, &[Stroke::lasso_rubber([(0.0, 0.0), (9.0, 0.0), (9.0, 11.0), (0.0, 11.0)])])
        .unwrap();
    assert!(session.segmentation().slice_at(2).is_background());

    let saved = session.save_log().unwrap();
    assert_eq!(saved.num_ops, 2);
    assert_eq!(saved.path, config.edits_log_path);
    assert!(config.edits_log_path.exists());

    let reopened = EditorSession::open(&config).unwrap();
    assert_eq!(reopened.segmentation(), session.segmentation());
    assert_eq!(reopened.history().undo_len(), 2);
    let ids: Vec<_> = reopened.label_list().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![2]);

    // 基础标签文件从不被改写.
    let base: Array3<u8> = ndarray_npy::read_npy(&config.seg_path).unwrap();
    assert_eq!(base.iter().filter(|&&v| v == 1).count(), 16);
}

#[test]
fn undo_then_save_persists_only_undo_stack() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = write_case(dir.path());

    let mut session = EditorSession::open(&config).unwrap();
    session
        .apply_edit(0, 1, &[Stroke::pen(3, [(5.0, 5.0)])])
        .unwrap();
    session
        .apply_edit(3, 2, &[Stroke::pen(3, [(2.0, 2.0)])])
        .unwrap();
    assert_eq!(session.undo(), HistoryReport::Ok { slice_idx: 3 });
    assert_eq!(session.save_log().unwrap().num_ops, 1);

    let reopened = EditorSession::open(&config).unwrap();
    assert_eq!(reopened.segmentation(), session.segmentation());
    assert_eq!(reopened.segmentation().slice_at(0).count(1), 9);
    assert_eq!(reopened.segmentation().slice_at(3).count(2), 0);
}

#[test]
fn shape_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_case(dir.path());
    write_npy(&config.seg_path, &Array3::<i16>::zeros((4, 12, 11))).unwrap();
    assert!(matches!(
        EditorSession::open(&config),
        Err(ct_scribe::dataset::LoadError::ShapeMismatch { .. })
    ));
}

#[test]
fn corrupt_log_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_case(dir.path());
    fs::write(&config.edits_log_path, b"garbage").unwrap();
    assert!(matches!(
        EditorSession::open(&config),
        Err(ct_scribe::dataset::LoadError::History(_))
    ));
}

#[test]
fn rendering_through_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_case(dir.path());
    let session = EditorSession::open(&config).unwrap();

    let ct = image::load_from_memory(&session.ct_png(1).unwrap())
        .unwrap()
        .to_luma8();
    assert_eq!(ct.dimensions(), (10, 12));

    let mask = image::load_from_memory(&session.mask_png(2, 1).unwrap())
        .unwrap()
        .to_rgba8();
    assert_eq!(mask.get_pixel(3, 4).0, [255, 0, 0, 120]);
    assert_eq!(mask.get_pixel(9, 11).0, [0, 0, 0, 0]);
    assert!(session.ct_png(4).is_err());
}

#[test]
fn shared_handle_serializes_edits() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_case(dir.path());
    let handle = SessionHandle::new(EditorSession::open(&config).unwrap());

    let workers: Vec<_> = (0..4)
        .map(|z| {
            let h = handle.clone();
            std::thread::spawn(move || {
                h.apply_edit(z, 2, &[Stroke::pen(1, [(9.0, 11.0)])])
                    .unwrap()
            })
        })
        .collect();
    for w in workers {
        assert_eq!(w.join().unwrap(), EditReport::Ok { num_pixels: 1 });
    }
    assert_eq!(handle.with(|s| s.history().undo_len()), 4);
    assert_eq!(handle.save_log().unwrap().num_ops, 4);
}
