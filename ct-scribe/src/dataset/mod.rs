//! 数据集操作: 病例目录布局与磁盘数据加载.

use crate::consts::files;
use std::env;
use std::path::{Path, PathBuf};

mod loader;

pub use loader::{load_catalog, load_scan, load_segmentation, LoadError, LoadResult};

/// 指定病例目录的环境变量.
pub const DATA_DIR_ENV: &str = "CT_SCRIBE_DATA_DIR";

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 一个编辑会话所需的全部文件路径.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditorConfig {
    /// CT 扫描体数据 (npy).
    pub scan_path: PathBuf,

    /// 基础分割标签体数据 (npy). 编辑不会改写该文件.
    pub seg_path: PathBuf,

    /// 标签表 (json).
    pub labels_path: PathBuf,

    /// 编辑日志 (npz). 可以不存在.
    pub edits_log_path: PathBuf,
}

impl EditorConfig {
    /// 使用默认文件名, 所有文件都位于 `dir` 下.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            scan_path: dir.join(files::CT_VOLUME),
            seg_path: dir.join(files::SEGMENTATION),
            labels_path: dir.join(files::LABELS),
            edits_log_path: dir.join(files::EDITS_LOG),
        }
    }

    /// 优先使用环境变量 [`DATA_DIR_ENV`] 指定的目录, 否则使用 `{用户主目录}/dataset/images`.
    ///
    /// 两者都无法确定时返回 `None`.
    pub fn from_env_or_home() -> Option<Self> {
        let dir = match env::var_os(DATA_DIR_ENV) {
            Some(d) if !d.is_empty() => PathBuf::from(d),
            _ => home_dataset_dir_with(["images"])?,
        };
        Some(Self::from_dir(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::EditorConfig;
    use std::path::Path;

    #[test]
    fn test_from_dir_file_names() {
        let cfg = EditorConfig::from_dir("/data/case_01");
        assert_eq!(cfg.scan_path, Path::new("/data/case_01/ct_volume.npy"));
        assert_eq!(cfg.seg_path, Path::new("/data/case_01/rtstruct_labels.npy"));
        assert_eq!(cfg.labels_path, Path::new("/data/case_01/labels.json"));
        assert_eq!(cfg.edits_log_path, Path::new("/data/case_01/edits_log.npz"));
    }
}
