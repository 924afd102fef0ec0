//! 合成切片. 没有真实数据集时用于跑通实验流程.

use lira_grid::Detection;
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 玻片背景色.
const GLASS: [u8; 3] = [242, 241, 243];

/// 染色组织的平均颜色.
const TISSUE: [u8; 3] = [183, 117, 180];

/// 病灶颜色 (较深).
const LESION: [u8; 3] = [120, 40, 110];

/// 一张合成切片及其病灶检测框.
pub struct SyntheticSlide {
    /// `(H, W, 3)` 图像.
    pub image: Array3<u8>,

    /// 病灶检测框.
    pub detections: Vec<Detection>,
}

/// 生成一张 `height x width` 的合成切片: 白色玻片上一块椭圆形组织,
/// 组织内有 `lesions` 个深色圆形病灶.
pub fn synthetic_slide(height: usize, width: usize, lesions: usize, seed: u64) -> SyntheticSlide {
    let mut rng = StdRng::seed_from_u64(seed);
    let (cy, cx) = (height as f32 / 2.0, width as f32 / 2.0);
    let (ry, rx) = (height as f32 * 0.38, width as f32 * 0.38);

    let blobs: Vec<(f32, f32, f32)> = (0..lesions)
        .map(|_| {
            let y = cy + rng.gen_range(-0.5..0.5) * ry;
            let x = cx + rng.gen_range(-0.5..0.5) * rx;
            let r = (height.min(width) as f32 * 0.04).max(2.0) * rng.gen_range(1.0..2.0);
            (y, x, r)
        })
        .collect();

    let mut image = Array3::<u8>::zeros((height, width, 3));
    for ((y, x, c), v) in image.indexed_iter_mut() {
        let (fy, fx) = (y as f32, x as f32);
        let in_tissue = ((fy - cy) / ry).powi(2) + ((fx - cx) / rx).powi(2) <= 1.0;
        let in_lesion = blobs
            .iter()
            .any(|&(by, bx, r)| (fy - by).powi(2) + (fx - bx).powi(2) <= r * r);
        *v = if in_lesion {
            LESION[c]
        } else if in_tissue {
            // 组织纹理: 轻微的确定性扰动.
            let noise = ((x * 31 + y * 17 + c * 7) % 21) as i16 - 10;
            (TISSUE[c] as i16 + noise).clamp(0, 255) as u8
        } else {
            GLASS[c]
        };
    }

    let detections = blobs
        .into_iter()
        .map(|(y, x, r)| Detection::new(x - r, y - r, x + r, y + r))
        .collect();

    SyntheticSlide { image, detections }
}

/// 生成 `n` 张合成切片, 拆分为图像列表与检测框列表.
pub fn synthetic_set(
    n: usize,
    height: usize,
    width: usize,
) -> (Vec<Array3<u8>>, Vec<Vec<Detection>>) {
    (0..n)
        .map(|i| {
            let s = synthetic_slide(height, width, 1 + i % 4, i as u64 + 1);
            (s.image, s.detections)
        })
        .unzip()
}
