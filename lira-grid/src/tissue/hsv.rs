//! RGB -> HSV 转换, 沿用 OpenCV 8-bit 约定.

/// 将 `[r, g, b]` 转换为 `[h, s, v]`.
///
/// H 位于 `[0, 180)` (角度减半), S 和 V 位于 `[0, 255]`.
pub(crate) fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;

    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };

    let h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [
        ((h / 2.0).round() as u8).min(179),
        s.round() as u8,
        v.round() as u8,
    ]
}

/// `hsv` 的每个分量是否都在 `[lower, upper]` 闭区间内?
#[inline]
pub(crate) fn in_range(hsv: [u8; 3], lower: [u8; 3], upper: [u8; 3]) -> bool {
    hsv.iter()
        .zip(lower.iter().zip(upper.iter()))
        .all(|(v, (lo, hi))| lo <= v && v <= hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0, 0, 0]);
        assert_eq!(rgb_to_hsv([255, 255, 255]), [0, 0, 255]);
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120, 255, 255]);
        // 粉紫色染色组织, 饱和度明显.
        let [_, s, v] = rgb_to_hsv([183, 117, 180]);
        assert!(s > 15 && v > 15);
        // 玻片背景接近白色.
        let [_, s, _] = rgb_to_hsv([240, 238, 241]);
        assert!(s < 15);
    }

    #[test]
    fn test_in_range() {
        let lo = [0, 15, 15];
        let hi = [255, 255, 255];
        assert!(in_range([10, 15, 200], lo, hi));
        assert!(!in_range([10, 14, 200], lo, hi));
        assert!(!in_range([10, 200, 3], lo, hi));
    }
}
