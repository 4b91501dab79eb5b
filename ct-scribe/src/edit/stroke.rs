//! 笔画 (stroke): 一次连续的指针手势.
//!
//! 浏览器发送的 JSON 字段可能缺失或残缺, 所有默认值都在反序列化边界一次性补齐,
//! 光栅化代码只面对类型完整的 [`Stroke`].

use crate::consts::{BACKGROUND, DEFAULT_BRUSH_SIZE};
use crate::{LabelId, Point2d};
use serde::Deserialize;

/// 绘制模式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum StrokeMode {
    /// 自由画笔, 写入目标标签.
    #[default]
    Pen,

    /// 自由橡皮擦, 写入背景.
    Rubber,

    /// 套索填充, 写入目标标签.
    LassoPen,

    /// 套索擦除, 写入背景.
    LassoRubber,

    /// 无法识别的模式. 该笔画不产生任何效果.
    Unsupported,
}

impl From<&str> for StrokeMode {
    fn from(value: &str) -> Self {
        match value {
            "pen" => Self::Pen,
            "rubber" => Self::Rubber,
            "lasso_pen" => Self::LassoPen,
            "lasso_rubber" => Self::LassoRubber,
            _ => Self::Unsupported,
        }
    }
}

impl StrokeMode {
    /// 是否为套索 (多边形) 模式?
    #[inline]
    pub fn is_lasso(&self) -> bool {
        matches!(self, Self::LassoPen | Self::LassoRubber)
    }

    /// 是否为自由笔刷模式?
    #[inline]
    pub fn is_freehand(&self) -> bool {
        matches!(self, Self::Pen | Self::Rubber)
    }

    /// 以 `label` 为目标标签时, 该模式实际写入的值. `Unsupported` 返回 `None`.
    #[inline]
    pub fn paints(&self, label: LabelId) -> Option<LabelId> {
        match self {
            Self::Pen | Self::LassoPen => Some(label),
            Self::Rubber | Self::LassoRubber => Some(BACKGROUND),
            Self::Unsupported => None,
        }
    }
}

/// 一次笔画: 模式, 笔刷直径, 以及图像像素坐标系下的有序采样点 `(x, y)`.
///
/// 构造时会丢弃坐标不是有限值的点.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "RawStroke")]
pub struct Stroke {
    mode: StrokeMode,
    brush_size: i64,
    points: Vec<Point2d>,
}

impl Stroke {
    /// 直接构造.
    pub fn new<I: IntoIterator<Item = Point2d>>(mode: StrokeMode, brush_size: i64, points: I) -> Self {
        Self {
            mode,
            brush_size,
            points: points
                .into_iter()
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .collect(),
        }
    }

    /// 画笔笔画.
    #[inline]
    pub fn pen<I: IntoIterator<Item = Point2d>>(brush_size: i64, points: I) -> Self {
        Self::new(StrokeMode::Pen, brush_size, points)
    }

    /// 橡皮擦笔画.
    #[inline]
    pub fn rubber<I: IntoIterator<Item = Point2d>>(brush_size: i64, points: I) -> Self {
        Self::new(StrokeMode::Rubber, brush_size, points)
    }

    /// 套索填充笔画.
    #[inline]
    pub fn lasso_pen<I: IntoIterator<Item = Point2d>>(points: I) -> Self {
        Self::new(StrokeMode::LassoPen, DEFAULT_BRUSH_SIZE, points)
    }

    /// 套索擦除笔画.
    #[inline]
    pub fn lasso_rubber<I: IntoIterator<Item = Point2d>>(points: I) -> Self {
        Self::new(StrokeMode::LassoRubber, DEFAULT_BRUSH_SIZE, points)
    }

    /// 绘制模式.
    #[inline]
    pub fn mode(&self) -> StrokeMode {
        self.mode
    }

    /// 笔刷直径 (像素).
    #[inline]
    pub fn brush_size(&self) -> i64 {
        self.brush_size
    }

    /// 有效采样点.
    #[inline]
    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// 方形笔刷半径, 笔刷边长为 `2 * radius + 1`.
    ///
    /// 直径不大于 1 时半径为 0, 即只覆盖单个像素.
    #[inline]
    pub fn radius(&self) -> usize {
        (self.brush_size.max(1) / 2) as usize
    }
}

#[inline]
fn default_mode() -> Option<String> {
    Some("pen".to_string())
}

/// 线上格式的点. 任一坐标缺失的点会被丢弃.
#[derive(Deserialize)]
struct RawPoint {
    x: Option<f64>,
    y: Option<f64>,
}

/// 线上格式的笔画.
///
/// `mode` 缺失时视为 `"pen"`; 显式为 `null` 时视为无法识别.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStroke {
    #[serde(default = "default_mode")]
    mode: Option<String>,
    brush_size: Option<f64>,
    points: Option<Vec<RawPoint>>,
}

impl From<RawStroke> for Stroke {
    fn from(raw: RawStroke) -> Self {
        let mode = raw
            .mode
            .as_deref()
            .map_or(StrokeMode::Unsupported, StrokeMode::from);
        let brush_size = raw
            .brush_size
            .filter(|b| b.is_finite())
            .map_or(DEFAULT_BRUSH_SIZE, |b| b.trunc() as i64);
        let points = raw
            .points
            .unwrap_or_default()
            .into_iter()
            .filter_map(|RawPoint { x, y }| Some((x?, y?)));
        Stroke::new(mode, brush_size, points)
    }
}
