//! 网格生成参数.

use crate::consts::*;
use crate::{GridError, GridResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 预测网格生成参数.
///
/// 该结构不做任何运行时校验, 使用前请调用 [`GridParams::validate`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridParams {
    /// 分块高度 (像素).
    pub sub_h: usize,

    /// 分块宽度 (像素).
    pub sub_w: usize,

    /// 推理批大小. 只影响吞吐量, 不影响结果.
    pub batch_size: usize,

    /// 去噪强度, `[0, 1]`. 0 代表不去噪.
    pub denoising_weight: f32,

    /// 组织区域检测参数.
    pub tissue: TissueParams,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            sub_h: DEFAULT_SUB_H,
            sub_w: DEFAULT_SUB_W,
            batch_size: DEFAULT_BATCH_SIZE,
            denoising_weight: DEFAULT_DENOISING_WEIGHT,
            tissue: TissueParams::default(),
        }
    }
}

impl GridParams {
    /// 以给定分块大小构建参数, 其余取默认值.
    pub fn with_tile(sub_h: usize, sub_w: usize) -> Self {
        Self {
            sub_h,
            sub_w,
            ..Self::default()
        }
    }

    /// 检查参数是否合法.
    pub fn validate(&self) -> GridResult<()> {
        if self.sub_h == 0 || self.sub_w == 0 {
            return Err(GridError::InvalidParams("tile size must be positive"));
        }
        if self.batch_size == 0 {
            return Err(GridError::InvalidParams("batch size must be positive"));
        }
        if !(0.0..=1.0).contains(&self.denoising_weight) {
            return Err(GridError::InvalidParams("denoising weight must be in [0, 1]"));
        }
        self.tissue.validate()
    }
}

/// 组织区域 (tissue) 检测参数.
///
/// HSV 门限沿用 OpenCV 8-bit 约定: H 位于 `[0, 180)`, S 和 V 位于 `[0, 255]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TissueParams {
    /// 检测前的缩小倍率, `(0, 1]`.
    pub scale: f32,

    /// 高斯模糊的标准差. 不大于 0 时跳过模糊.
    pub blur_sigma: f32,

    /// HSV 下限 (含).
    pub hsv_lower: [u8; 3],

    /// HSV 上限 (含).
    pub hsv_upper: [u8; 3],

    /// 第一次膨胀的迭代次数 (3x3 方形核).
    pub dilate_1: u8,

    /// 腐蚀的迭代次数.
    pub erode: u8,

    /// 第二次膨胀的迭代次数.
    pub dilate_2: u8,

    /// 原分辨率下轮廓的最小面积 (平方像素). 面积不大于该值的轮廓被视为噪声.
    pub min_area: f32,
}

impl Default for TissueParams {
    fn default() -> Self {
        Self {
            scale: 0.05,
            blur_sigma: 0.5,
            hsv_lower: [0, 15, 15],
            hsv_upper: [255, 255, 255],
            dilate_1: 4,
            erode: 7,
            dilate_2: 7,
            // 即缩小后 1000 平方像素.
            min_area: 1000.0 / (0.05 * 0.05),
        }
    }
}

impl TissueParams {
    /// 检查参数是否合法.
    pub fn validate(&self) -> GridResult<()> {
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(GridError::InvalidParams("tissue scale must be in (0, 1]"));
        }
        if !self.min_area.is_finite() || self.min_area < 0.0 {
            return Err(GridError::InvalidParams("min area must be non-negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_valid() {
        let p = GridParams::default();
        assert!(p.validate().is_ok());
        assert_eq!((p.sub_h, p.sub_w, p.batch_size), (80, 145, 24));
    }

    #[test]
    fn test_invalid_params() {
        let mut p = GridParams::default();
        p.batch_size = 0;
        assert!(matches!(p.validate(), Err(GridError::InvalidParams(_))));

        let mut p = GridParams::with_tile(0, 10);
        assert!(p.validate().is_err());
        p.sub_h = 10;
        p.denoising_weight = 1.5;
        assert!(p.validate().is_err());

        let mut p = GridParams::default();
        p.tissue.scale = 0.0;
        assert!(p.validate().is_err());
    }
}
