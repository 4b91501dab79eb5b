//! 通用常量.

use crate::LabelId;

/// 背景 (未标注) 的标签值. 橡皮擦类工具写入该值.
pub const BACKGROUND: LabelId = 0;

/// 请求中没有给出 `brushSize` 时使用的笔刷直径 (像素).
pub const DEFAULT_BRUSH_SIZE: i64 = 5;

/// 构成套索多边形所需的最少有效点数.
pub const MIN_LASSO_POINTS: usize = 3;

/// 标签叠加层中前景像素的不透明度.
pub const MASK_ALPHA: u8 = 120;

/// CT 灰度窗口使用的百分位数 (下限, 上限).
pub const CT_PERCENTILES: (f64, f64) = (1.0, 99.0);

/// 病例目录下的默认文件名.
pub mod files {
    /// CT 扫描体数据.
    pub const CT_VOLUME: &str = "ct_volume.npy";

    /// 基础分割标签体数据.
    pub const SEGMENTATION: &str = "rtstruct_labels.npy";

    /// 标签表 (id -> 名称, 颜色).
    pub const LABELS: &str = "labels.json";

    /// 编辑日志.
    pub const EDITS_LOG: &str = "edits_log.npz";
}

/// 像素是否是背景?
#[inline]
pub const fn is_background(p: LabelId) -> bool {
    p == BACKGROUND
}
