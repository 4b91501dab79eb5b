//! npy 体数据与 json 标签表的加载.

use crate::edit::HistoryError;
use crate::{Idx3d, LabelCatalog, LabelId, ScanVolume, SegVolume};
use ndarray::Array3;
use ndarray_npy::{read_npy, ReadNpyError, ReadableElement};
use num::ToPrimitive;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// 加载病例数据错误.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// 打开文件失败.
    #[error("failed to open {}: {source}", .path.display())]
    Io {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: std::io::Error,
    },

    /// npy 文件无法解析, 或者不是 3 维数组.
    #[error("failed to read {}: {source}", .path.display())]
    Npy {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: ReadNpyError,
    },

    /// 标签表不是合法的 json.
    #[error("failed to parse {}: {source}", .path.display())]
    Json {
        /// 文件路径.
        path: PathBuf,
        /// 底层错误.
        source: serde_json::Error,
    },

    /// npy 文件的 dtype 不在支持列表中.
    #[error("unsupported dtype in {}", .0.display())]
    UnsupportedDtype(PathBuf),

    /// 标签值超出 `i16` 范围.
    #[error("label value {value} in {} does not fit i16", .path.display())]
    LabelOutOfRange {
        /// 文件路径.
        path: PathBuf,
        /// 越界的值.
        value: i64,
    },

    /// CT 与分割标签的形状不一致.
    #[error("CT volume shape {scan:?} does not match segmentation shape {seg:?}")]
    ShapeMismatch {
        /// CT 形状.
        scan: Idx3d,
        /// 分割标签形状.
        seg: Idx3d,
    },

    /// 编辑日志重放失败.
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// 加载操作的返回类型.
pub type LoadResult<T> = Result<T, LoadError>;

/// 以 `T` 读取 (z, H, W) npy 数组. dtype 不匹配时返回 `Ok(None)`.
fn try_read<T: ReadableElement>(path: &Path) -> LoadResult<Option<Array3<T>>> {
    match read_npy::<_, Array3<T>>(path) {
        Ok(a) => Ok(Some(a)),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(source) => Err(LoadError::Npy {
            path: path.to_owned(),
            source,
        }),
    }
}

/// 加载 CT 扫描体数据. 接受 `f32`, `f64`, `i16` 存储的 npy 文件.
pub fn load_scan<P: AsRef<Path>>(path: P) -> LoadResult<ScanVolume> {
    let path = path.as_ref();
    if let Some(a) = try_read::<f32>(path)? {
        return Ok(ScanVolume::new(a));
    }
    if let Some(a) = try_read::<f64>(path)? {
        return Ok(ScanVolume::new(a.mapv(|v| v as f32)));
    }
    if let Some(a) = try_read::<i16>(path)? {
        return Ok(ScanVolume::new(a.mapv(f32::from)));
    }
    Err(LoadError::UnsupportedDtype(path.to_owned()))
}

/// 加载基础分割标签体. 接受 `i16`, `u8`, `i32`, `i64` 存储的 npy 文件,
/// 更宽的整数类型要求所有值都能放进 `i16`.
pub fn load_segmentation<P: AsRef<Path>>(path: P) -> LoadResult<SegVolume> {
    let path = path.as_ref();
    if let Some(a) = try_read::<i16>(path)? {
        return Ok(SegVolume::new(a));
    }
    if let Some(a) = try_read::<u8>(path)? {
        return Ok(SegVolume::new(a.mapv(LabelId::from)));
    }
    if let Some(a) = try_read::<i32>(path)? {
        return narrow(path, a);
    }
    if let Some(a) = try_read::<i64>(path)? {
        return narrow(path, a);
    }
    Err(LoadError::UnsupportedDtype(path.to_owned()))
}

fn narrow<T: ToPrimitive + Copy>(path: &Path, a: Array3<T>) -> LoadResult<SegVolume> {
    if let Some(v) = a.iter().find(|v| v.to_i16().is_none()) {
        return Err(LoadError::LabelOutOfRange {
            path: path.to_owned(),
            value: v.to_i64().unwrap_or_default(),
        });
    }
    Ok(SegVolume::new(a.mapv(|v| v.to_i16().unwrap_or_default())))
}

/// 加载 `labels.json` 标签表.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> LoadResult<LabelCatalog> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    LabelCatalog::from_json_reader(BufReader::new(file)).map_err(|source| LoadError::Json {
        path: path.to_owned(),
        source,
    })
}
