//! 通用常量.

/// 统一类别编号. 所有分类器的原生输出最终都映射到这 7 个全局索引.
pub mod class {
    /// 健康组织.
    pub const HEALTHY: u8 = 0;

    /// I 型病灶 - 干酪样坏死 (caseum).
    pub const TYPE_ONE_CASEUM: u8 = 1;

    /// II 型病灶.
    pub const TYPE_TWO: u8 = 2;

    /// 空玻片 (背景). 也是网格的默认类别.
    pub const EMPTY_SLIDE: u8 = 3;

    /// III 型病灶.
    pub const TYPE_THREE: u8 = 4;

    /// I 型病灶 - 边缘 (rim).
    pub const TYPE_ONE_RIM: u8 = 5;

    /// 未知/其它.
    pub const UNKNOWN_MISC: u8 = 6;

    /// 是否是背景?
    #[inline]
    pub const fn is_empty_slide(label: u8) -> bool {
        matches!(label, EMPTY_SLIDE)
    }

    /// 是否属于某种 I 型病灶?
    #[inline]
    pub const fn is_type_one(label: u8) -> bool {
        matches!(label, TYPE_ONE_CASEUM | TYPE_ONE_RIM)
    }
}

/// 类别总数.
pub const CLASS_N: usize = 7;

/// 跳过 (背景) 分块在 argmax 之后的标签.
pub const SKIP_LABEL: u8 = class::EMPTY_SLIDE;

/// 各类别的可读名称, 按全局索引排列.
pub const CLASS_NAMES: [&str; CLASS_N] = [
    "Healthy Tissue",
    "Type I - Caseum",
    "Type II",
    "Empty Slide",
    "Type III",
    "Type I - Rim",
    "Unknown/Misc",
];

/// 默认分块高度 (像素).
pub const DEFAULT_SUB_H: usize = 80;

/// 默认分块宽度 (像素).
pub const DEFAULT_SUB_W: usize = 145;

/// 默认推理批大小. 经测试在常见 GPU 上吞吐量最高.
pub const DEFAULT_BATCH_SIZE: usize = 24;

/// 默认去噪强度, `0.0 <= w <= 1.0`, 越大越平滑.
pub const DEFAULT_DENOISING_WEIGHT: f32 = 0.8;
