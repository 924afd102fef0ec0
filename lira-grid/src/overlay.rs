//! 可视化: 把标签网格以半透明色块叠加到缩小后的原图上.

use crate::consts::{class, CLASS_N};
use crate::pipeline::array_to_rgb;
use crate::{GridError, GridParams, GridResult};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use ndarray::{ArrayView2, ArrayView3};

/// 各类别的显示颜色 (RGB), 按全局索引排列.
pub const CLASS_COLORS: [Rgb<u8>; CLASS_N] = [
    Rgb([255, 0, 255]),
    Rgb([255, 0, 0]),
    Rgb([0, 255, 0]),
    Rgb([200, 200, 200]),
    Rgb([255, 255, 0]),
    Rgb([0, 0, 255]),
    Rgb([143, 66, 244]),
];

/// 叠加图参数.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OverlayOptions {
    /// 输出相对原图的缩放倍率, `(0, 1]`.
    pub resize_factor: f32,

    /// 色块的不透明度, `[0, 1]`.
    pub alpha: f32,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            resize_factor: 1.0 / 8.0,
            alpha: 0.33,
        }
    }
}

/// 输出文件名 `{uid}_overlay_{name}.png`.
pub fn overlay_file_name(uid: &str, name: &str) -> String {
    format!("{uid}_overlay_{name}.png")
}

/// 生成叠加图.
///
/// 缩小后的分块大小 `(sub_h * f, sub_w * f)` 截断取整, 原图被缩放到恰好
/// `rows * sub_h' x cols * sub_w'`, 保证色块与图像内容对齐.
pub fn render_overlay(
    image: ArrayView3<u8>,
    labels: ArrayView2<u8>,
    params: &GridParams,
    opts: OverlayOptions,
) -> GridResult<RgbImage> {
    if !(opts.resize_factor > 0.0 && opts.resize_factor <= 1.0) {
        return Err(GridError::InvalidParams("resize factor must be in (0, 1]"));
    }
    if !(0.0..=1.0).contains(&opts.alpha) {
        return Err(GridError::InvalidParams("alpha must be in [0, 1]"));
    }
    let sub_h = (params.sub_h as f32 * opts.resize_factor) as u32;
    let sub_w = (params.sub_w as f32 * opts.resize_factor) as u32;
    let (rows, cols) = labels.dim();
    if sub_h == 0 || sub_w == 0 || rows == 0 || cols == 0 {
        return Err(GridError::InvalidParams("overlay would be empty"));
    }
    let src = array_to_rgb(image).ok_or(GridError::InvalidParams("image must have 3 channels"))?;

    let (width, height) = (cols as u32 * sub_w, rows as u32 * sub_h);
    let base = imageops::resize(&src, width, height, FilterType::Triangle);

    let mut overlay = RgbImage::new(width, height);
    for ((r, c), &label) in labels.indexed_iter() {
        let color = CLASS_COLORS
            .get(label as usize)
            .copied()
            .unwrap_or(CLASS_COLORS[class::UNKNOWN_MISC as usize]);
        let rect = Rect::at((c as u32 * sub_w) as i32, (r as u32 * sub_h) as i32).of_size(sub_w, sub_h);
        draw_filled_rect_mut(&mut overlay, rect, color);
    }

    Ok(blend(&base, &overlay, opts.alpha))
}

/// `alpha * top + (1 - alpha) * bottom`, 四舍五入.
fn blend(bottom: &RgbImage, top: &RgbImage, alpha: f32) -> RgbImage {
    let mut out = bottom.clone();
    for (dst, src) in out.pixels_mut().zip(top.pixels()) {
        for (d, &s) in dst.0.iter_mut().zip(src.0.iter()) {
            *d = (alpha * s as f32 + (1.0 - alpha) * *d as f32)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
    }
    out
}
