//! CT 显示窗口.

use ndarray::ArrayView2;
use ordered_float::OrderedFloat;

/// CT 窗口, 以 HU 值上下限表示. 窗口内的值线性映射到 0 ~ 255 灰度.
///
/// 构造后不可修改, 且总满足 `lower < upper`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CtWindow {
    lower: f32,
    upper: f32,
}

impl CtWindow {
    /// 以上下限构建 CT 窗. 当 `upper <= lower` 时, 上限被修正为 `lower + 1`.
    ///
    /// 任一参数不是有限值时返回 `None`.
    pub fn from_bounds(lower: f32, upper: f32) -> Option<CtWindow> {
        if !lower.is_finite() || !upper.is_finite() {
            return None;
        }
        let upper = if upper <= lower { lower + 1.0 } else { upper };
        Some(Self { lower, upper })
    }

    /// 以切片自身 HU 值分布的 `lo` / `hi` 百分位数 (0 ~ 100) 作为上下限构建 CT 窗.
    /// 非有限值不参与统计.
    ///
    /// 切片中没有任何有限值时返回 `None`.
    pub fn from_percentiles(slice: &ArrayView2<f32>, lo: f64, hi: f64) -> Option<CtWindow> {
        let mut values: Vec<OrderedFloat<f32>> = slice
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .map(OrderedFloat)
            .collect();
        if values.is_empty() {
            return None;
        }
        values.sort_unstable();
        Self::from_bounds(percentile_sorted(&values, lo), percentile_sorted(&values, hi))
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.lower
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.upper
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        (self.lower + self.upper) / 2.0
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.upper - self.lower
    }

    /// 把 `ct` HU 值裁剪到窗口内, 再线性映射为灰度值 (0 ~ 255), 小数部分截断.
    ///
    /// `ct` 为 NaN 或无穷时返回 `None`.
    pub fn eval(&self, ct: f32) -> Option<u8> {
        if !ct.is_finite() {
            return None;
        }
        let t = ((ct - self.lower) / self.width()).clamp(0.0, 1.0);
        Some((t * 255.0) as u8)
    }
}

/// 线性插值百分位数, 与 numpy 默认行为一致. `sorted` 必须非空且升序.
fn percentile_sorted(sorted: &[OrderedFloat<f32>], q: f64) -> f32 {
    debug_assert!(!sorted.is_empty());
    let q = q.clamp(0.0, 100.0);
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    let (a, b) = (sorted[lo].0 as f64, sorted[hi].0 as f64);
    (a + (b - a) * frac) as f32
}
