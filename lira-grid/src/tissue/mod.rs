//! 组织区域检测.
//!
//! 在缩小后的图像上以 HSV 门限分离组织与玻片背景, 经形态学去噪后追踪轮廓,
//! 再把轮廓放大回原分辨率. 整个过程是确定性的.

mod contour;
mod hsv;

pub use contour::Contour;

use crate::{GridError, GridResult, TissueParams};
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use ndarray::ArrayView3;

/// 检测 `img` (`(H, W, 3)`) 中的组织区域轮廓, 坐标为原图像素坐标.
///
/// 同时返回外轮廓与孔洞轮廓. 面积不大于 `params.min_area` 的轮廓被丢弃.
/// 缩小后图像的任一边长为 0 时, 返回空集合.
pub fn detect_tissue(img: ArrayView3<u8>, params: &TissueParams) -> GridResult<Vec<Contour>> {
    params.validate()?;
    let &[height, width, channels] = img.shape() else {
        unreachable!()
    };
    if channels != 3 {
        return Err(GridError::InvalidParams("tissue detection expects 3 channels"));
    }

    let new_w = (width as f32 * params.scale) as u32;
    let new_h = (height as f32 * params.scale) as u32;
    if new_w == 0 || new_h == 0 {
        log::warn!("image {height}x{width} too small for tissue detection");
        return Ok(vec![]);
    }

    let standard = img.as_standard_layout();
    let raw = standard
        .as_slice()
        .ok_or(GridError::InvalidParams("image is not contiguous"))?;
    let full = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(width as u32, height as u32, raw)
        .ok_or(GridError::InvalidParams("image buffer size mismatch"))?;
    let small = imageops::resize(&full, new_w, new_h, FilterType::Triangle);
    let blurred = if params.blur_sigma > 0.0 {
        imageops::blur(&small, params.blur_sigma)
    } else {
        small
    };

    let mask = tissue_mask(&blurred, params);
    let contours = imageproc::contours::find_contours::<i32>(&mask);

    let factor = 1.0 / params.scale;
    let ans: Vec<Contour> = contours
        .into_iter()
        .map(|c| {
            Contour::new(
                c.points
                    .iter()
                    .map(|p| (p.x as f32 * factor, p.y as f32 * factor))
                    .collect(),
            )
        })
        .filter(|c| c.area() > params.min_area as f64)
        .collect();

    log::debug!(
        "tissue detection on {height}x{width}: {} contour(s) kept",
        ans.len()
    );
    Ok(ans)
}

/// 门限 + 膨胀/腐蚀/膨胀. 前景 (组织) 为 255.
fn tissue_mask(img: &RgbImage, params: &TissueParams) -> GrayImage {
    let mut mask = GrayImage::new(img.width(), img.height());
    for (x, y, Rgb(px)) in img.enumerate_pixels() {
        if hsv::in_range(hsv::rgb_to_hsv(*px), params.hsv_lower, params.hsv_upper) {
            mask.put_pixel(x, y, Luma([u8::MAX]));
        }
    }
    // 3x3 方形核迭代 k 次 == L-inf 半径 k.
    let mask = dilate(&mask, Norm::LInf, params.dilate_1);
    let mask = erode(&mask, Norm::LInf, params.erode);
    dilate(&mask, Norm::LInf, params.dilate_2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array3};

    /// 白色玻片上放一块 `[y0, y1) x [x0, x1)` 的紫色组织.
    fn slide_with_block(h: usize, w: usize, block: (usize, usize, usize, usize)) -> Array3<u8> {
        let (y0, y1, x0, x1) = block;
        Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
            if (y0..y1).contains(&y) && (x0..x1).contains(&x) {
                [183, 117, 180][c]
            } else {
                [242, 241, 243][c]
            }
        })
    }

    fn small_params() -> TissueParams {
        TissueParams {
            scale: 0.25,
            dilate_1: 1,
            erode: 1,
            dilate_2: 1,
            min_area: 100.0,
            ..TissueParams::default()
        }
    }

    #[test]
    fn test_blank_slide_has_no_tissue() {
        let img = slide_with_block(200, 200, (0, 0, 0, 0));
        let contours = detect_tissue(img.view(), &small_params()).unwrap();
        assert!(contours.is_empty());
    }

    #[test]
    fn test_block_is_detected() {
        let img = slide_with_block(400, 400, (80, 320, 100, 300));
        let contours = detect_tissue(img.view(), &small_params()).unwrap();
        assert!(!contours.is_empty());
        assert!(contours.iter().any(|c| c.contains((200.0, 200.0))));
        assert!(contours.iter().all(|c| !c.contains((20.0, 20.0))));
        // 放大回原分辨率后面积与组织块同量级.
        let max_area = contours.iter().map(Contour::area).fold(0.0, f64::max);
        assert!(max_area > 0.5 * 240.0 * 200.0);
        assert!(max_area < 1.5 * 240.0 * 200.0);
    }

    #[test]
    fn test_deterministic() {
        let img = slide_with_block(300, 260, (40, 200, 60, 220));
        let a = detect_tissue(img.view(), &small_params()).unwrap();
        let b = detect_tissue(img.view(), &small_params()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tiny_image_and_min_area() {
        let img = slide_with_block(10, 10, (0, 10, 0, 10));
        let p = TissueParams {
            scale: 0.05,
            ..TissueParams::default()
        };
        assert!(detect_tissue(img.view(), &p).unwrap().is_empty());

        let img = slide_with_block(400, 400, (80, 320, 100, 300));
        let p = TissueParams {
            min_area: 1e9,
            ..small_params()
        };
        assert!(detect_tissue(img.view(), &p).unwrap().is_empty());
    }

    #[test]
    fn test_strided_view_matches_owned() {
        let wide = slide_with_block(400, 520, (80, 320, 100, 300));
        let view = wide.slice(s![.., ..400, ..]);
        assert!(view.as_slice().is_none());
        let owned = view.to_owned();
        let a = detect_tissue(view, &small_params()).unwrap();
        let b = detect_tissue(owned.view(), &small_params()).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_non_rgb() {
        let img = Array3::<u8>::zeros((100, 100, 1));
        assert!(detect_tissue(img.view(), &small_params()).is_err());
    }
}
