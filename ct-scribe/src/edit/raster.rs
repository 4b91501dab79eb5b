//! 笔画光栅化.
//!
//! 坐标约定: 笔画点为 `(x, y)` = (列, 行), 像素 `(row, col)` 的中心位于整数坐标
//! `(x = col, y = row)`. 取整均为四舍五入到最近像素.

use super::Stroke;
use crate::consts::MIN_LASSO_POINTS;
use crate::{Idx2d, LabelId, LabelSliceMut, Point2d};
use itertools::Itertools;
use ndarray::Array2;
use num::ToPrimitive;

/// 将 `strokes` 依次光栅化到 `slice` 上. 副作用仅限于 `slice` 本身.
///
/// - `pen` / `lasso_pen` 写入 `label`;
/// - `rubber` / `lasso_rubber` 写入背景;
/// - 套索有效点少于 3 个, 或点列为空, 或模式无法识别时, 该笔画被跳过.
pub fn apply_strokes(slice: &mut LabelSliceMut, label: LabelId, strokes: &[Stroke]) {
    for stroke in strokes {
        let Some(value) = stroke.mode().paints(label) else {
            continue;
        };
        let points = stroke.points();
        if points.is_empty() {
            continue;
        }
        if stroke.mode().is_lasso() {
            if points.len() < MIN_LASSO_POINTS {
                continue;
            }
            let mask = polygon_mask(slice.shape(), points);
            slice.fill_masked(&mask.view(), value);
        } else {
            draw_freehand(slice, points, stroke.radius(), value);
        }
    }
}

/// 将坐标取整为像素索引 (行, 列). 落在负半轴或无法表示时返回 `None`.
#[inline]
fn to_pixel((x, y): Point2d) -> Option<Idx2d> {
    let row = y.round().to_usize()?;
    let col = x.round().to_usize()?;
    Some((row, col))
}

/// 在取整后的像素上盖一个方形笔刷. 中心越界时什么也不做.
#[inline]
fn stamp(slice: &mut LabelSliceMut, p: Point2d, radius: usize, value: LabelId) {
    if let Some(pos) = to_pixel(p) {
        slice.fill_square(pos, radius, value);
    }
}

/// 自由笔刷: 首点直接盖章, 之后每一段按 `floor(max(|dx|, |dy|))` 步线性插值.
/// 步数为 0 时仍在当前点盖一次章, 以保证单击也能落笔.
///
/// 每段先裁剪到切片外扩 `radius + 1` 的矩形内再插值, 步数不超过切片尺寸.
fn draw_freehand(slice: &mut LabelSliceMut, points: &[Point2d], radius: usize, value: LabelId) {
    let (h, w) = slice.shape();
    let margin = radius as f64 + 1.0;
    let bounds = Bounds {
        x0: -margin,
        y0: -margin,
        x1: (w as f64 - 1.0) + margin,
        y1: (h as f64 - 1.0) + margin,
    };
    let mut prev: Option<Point2d> = None;
    for &cur in points {
        match prev {
            None => stamp(slice, cur, radius, value),
            Some(start) => {
                if chebyshev(start, cur).floor() == 0.0 {
                    stamp(slice, cur, radius, value);
                } else if let Some((a, b)) = bounds.clip(start, cur) {
                    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
                    // 被裁剪的段向上取整, 保证相邻采样点间距不超过 1.
                    let len = chebyshev(a, b);
                    let len = if a == start && b == cur {
                        len.floor()
                    } else {
                        len.ceil()
                    };
                    let steps = len as usize;
                    if steps == 0 {
                        stamp(slice, b, radius, value);
                    }
                    for i in 1..=steps {
                        let t = i as f64 / steps as f64;
                        stamp(slice, (a.0 + t * dx, a.1 + t * dy), radius, value);
                    }
                }
            }
        }
        prev = Some(cur);
    }
}

/// 将闭合多边形 (末点隐式连回首点) 光栅化为形状为 `(h, w)` 的布尔掩码.
///
/// 内部以像素中心为采样点做奇偶规则扫描线填充, 再把每条边作为线段光栅化,
/// 因此落在边上的像素也被包含. 少于 3 个顶点时返回全 `false` 掩码.
pub fn polygon_mask((h, w): Idx2d, poly: &[Point2d]) -> Array2<bool> {
    let mut mask = Array2::from_elem((h, w), false);
    if poly.len() < MIN_LASSO_POINTS || h == 0 || w == 0 {
        return mask;
    }

    let max_col = (w - 1) as f64;
    let mut nodes: Vec<f64> = Vec::with_capacity(poly.len());
    for row in 0..h {
        let yf = row as f64;
        nodes.clear();
        // 半开区间判定, 顶点处不会被重复计数, 水平边自然被跳过.
        for (&(xi, yi), &(xj, yj)) in poly.iter().circular_tuple_windows() {
            if (yi <= yf && yf < yj) || (yj <= yf && yf < yi) {
                let t = (yf - yi) / (yj - yi);
                nodes.push(xi + t * (xj - xi));
            }
        }
        nodes.sort_by(f64::total_cmp);
        for pair in nodes.chunks_exact(2) {
            let start = pair[0].ceil().max(0.0);
            let end = pair[1].floor().min(max_col);
            if start > end {
                continue;
            }
            for col in start as usize..=end as usize {
                mask[(row, col)] = true;
            }
        }
    }

    for (&a, &b) in poly.iter().circular_tuple_windows() {
        draw_segment(&mut mask, a, b);
    }
    mask
}

/// 将线段 `a -> b` 上的像素 (含端点) 在掩码中置为 `true`, 越界部分被裁剪.
fn draw_segment(mask: &mut Array2<bool>, a: Point2d, b: Point2d) {
    let (h, w) = mask.dim();
    let bounds = Bounds {
        x0: -1.0,
        y0: -1.0,
        x1: w as f64,
        y1: h as f64,
    };
    let Some((a, b)) = bounds.clip(a, b) else {
        return;
    };
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let steps = chebyshev(a, b).ceil() as usize;
    for i in 0..=steps {
        let t = if steps == 0 { 0.0 } else { i as f64 / steps as f64 };
        if let Some(pos) = to_pixel((a.0 + t * dx, a.1 + t * dy)) {
            if let Some(p) = mask.get_mut(pos) {
                *p = true;
            }
        }
    }
}

#[inline]
fn chebyshev(a: Point2d, b: Point2d) -> f64 {
    (b.0 - a.0).abs().max((b.1 - a.1).abs())
}

/// 闭合矩形 `[x0, x1] × [y0, y1]`.
#[derive(Copy, Clone, Debug)]
struct Bounds {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl Bounds {
    /// Liang-Barsky 裁剪. 返回线段 `a -> b` 落在矩形内的部分, 完全在外时返回 `None`.
    ///
    /// 未被裁掉的端点原样返回.
    fn clip(&self, a: Point2d, b: Point2d) -> Option<(Point2d, Point2d)> {
        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let (mut t0, mut t1) = (0.0f64, 1.0f64);
        for (p, q) in [
            (-dx, a.0 - self.x0),
            (dx, self.x1 - a.0),
            (-dy, a.1 - self.y0),
            (dy, self.y1 - a.1),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
        let at = |t: f64| match t {
            t if t <= 0.0 => a,
            t if t >= 1.0 => b,
            t => (a.0 + t * dx, a.1 + t * dy),
        };
        Some((at(t0), at(t1)))
    }
}
