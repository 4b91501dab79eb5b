//! 切片渲染: CT 灰度图与单标签叠加层, 编码为 PNG.

use crate::consts::{CT_PERCENTILES, MASK_ALPHA};
use crate::data::VolumeShape;
use crate::{CtWindow, LabelCatalog, LabelId, ScanVolume, SegVolume};
use image::codecs::png::PngEncoder;
use image::{ColorType, GrayImage, ImageEncoder, ImageError, Luma, Rgba, RgbaImage};

/// 渲染错误.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// 切片索引越界.
    #[error("Slice index out of range")]
    SliceOutOfRange {
        /// 请求的切片索引.
        index: usize,
        /// 切片总数.
        len: usize,
    },

    /// 会话没有加载 CT 扫描.
    #[error("no CT volume loaded")]
    NoScan,

    /// PNG 编码失败.
    #[error("failed to encode PNG: {0}")]
    Image(#[from] ImageError),
}

/// 渲染操作的返回类型.
pub type RenderResult<T> = Result<T, RenderError>;

#[inline]
fn check_index<V: VolumeShape>(volume: &V, index: usize) -> RenderResult<()> {
    let len = volume.len_z();
    if index < len {
        Ok(())
    } else {
        Err(RenderError::SliceOutOfRange { index, len })
    }
}

/// 把第 `z` 层 CT 切片渲染为 8 位灰度图.
///
/// 窗口取该切片自身 HU 值的 1% / 99% 百分位数, 非有限值像素渲染为黑色.
pub fn ct_slice_image(scan: &ScanVolume, z: usize) -> RenderResult<GrayImage> {
    check_index(scan, z)?;
    let slice = scan.slice_at(z);
    let (height, width) = slice.dim();
    let mut buf = GrayImage::new(width as u32, height as u32);
    let (lo, hi) = CT_PERCENTILES;
    if let Some(window) = CtWindow::from_percentiles(&slice, lo, hi) {
        for ((h, w), &ct) in slice.indexed_iter() {
            let gray = window.eval(ct).unwrap_or(u8::MIN);
            buf.put_pixel(w as u32, h as u32, Luma([gray]));
        }
    }
    Ok(buf)
}

/// 把第 `z` 层中值为 `label` 的体素渲染为 RGBA 叠加层.
///
/// 命中体素使用标签颜色, 不透明度为 [`MASK_ALPHA`]; 其余像素完全透明.
/// 标签不在标签表中时返回整张透明图.
pub fn mask_slice_image(
    seg: &SegVolume,
    catalog: &LabelCatalog,
    z: usize,
    label: LabelId,
) -> RenderResult<RgbaImage> {
    check_index(seg, z)?;
    let slice = seg.slice_at(z);
    let (height, width) = slice.shape();
    let mut buf = RgbaImage::new(width as u32, height as u32);
    if let Some(info) = catalog.get(label) {
        let [r, g, b] = info.color_rgb;
        for ((h, w), &pix) in slice.indexed_iter() {
            if pix == label {
                buf.put_pixel(w as u32, h as u32, Rgba([r, g, b, MASK_ALPHA]));
            }
        }
    }
    Ok(buf)
}

/// [`ct_slice_image`] 的 PNG 编码版本.
pub fn ct_slice_png(scan: &ScanVolume, z: usize) -> RenderResult<Vec<u8>> {
    let img = ct_slice_image(scan, z)?;
    encode_png(img.as_raw(), img.width(), img.height(), ColorType::L8)
}

/// [`mask_slice_image`] 的 PNG 编码版本.
pub fn mask_slice_png(
    seg: &SegVolume,
    catalog: &LabelCatalog,
    z: usize,
    label: LabelId,
) -> RenderResult<Vec<u8>> {
    let img = mask_slice_image(seg, catalog, z, label)?;
    encode_png(img.as_raw(), img.width(), img.height(), ColorType::Rgba8)
}

fn encode_png(raw: &[u8], width: u32, height: u32, color: ColorType) -> RenderResult<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(raw, width, height, color)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::{ct_slice_png, mask_slice_image, mask_slice_png, RenderError};
    use crate::{LabelCatalog, LabelInfo, ScanVolume, SegVolume};
    use ndarray::Array3;

    fn catalog() -> LabelCatalog {
        [(
            4,
            LabelInfo {
                name: "liver".to_string(),
                color_rgb: [200, 10, 30],
            },
        )]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_ct_png_stretches_percentiles() {
        let data = Array3::from_shape_fn((2, 10, 10), |(_, h, w)| (h * 10 + w) as f32);
        let png = ct_slice_png(&ScanVolume::new(data), 1).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (10, 10));
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        assert_eq!(img.get_pixel(9, 9).0, [255]);
        let mid = img.get_pixel(0, 5).0[0];
        assert!(100 < mid && mid < 155, "{mid}");
    }

    #[test]
    fn test_ct_png_constant_slice() {
        let data = Array3::from_elem((1, 3, 3), 42.0f32);
        let png = ct_slice_png(&ScanVolume::new(data), 0).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_luma8();
        assert!(img.pixels().all(|p| p.0 == [0]));
    }

    #[test]
    fn test_mask_colors_and_alpha() {
        let mut seg = SegVolume::background((1, 2, 3));
        seg[(0, 1, 2)] = 4;
        seg[(0, 0, 0)] = 5;
        let png = mask_slice_png(&seg, &catalog(), 0, 4).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(2, 1).0, [200, 10, 30, 120]);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_unknown_label_is_transparent() {
        let mut seg = SegVolume::background((1, 2, 2));
        seg[(0, 0, 0)] = 9;
        let img = mask_slice_image(&seg, &catalog(), 0, 9).unwrap();
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_out_of_range() {
        let seg = SegVolume::background((2, 2, 2));
        assert!(matches!(
            mask_slice_png(&seg, &catalog(), 2, 4),
            Err(RenderError::SliceOutOfRange { index: 2, len: 2 })
        ));
    }
}
