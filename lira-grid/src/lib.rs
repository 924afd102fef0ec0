#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 对大尺寸组织切片 (histology slide) 图像进行分块分类,
//! 生成稠密的预测网格 (prediction grid), 供人工复核与统计.
//!
//! 外部训练好的分类模型被视为黑盒, 通过 [`TileClassifier`] trait 接入.
//!
//! # 注意
//!
//! 1. 图像统一以 `(H, W, 3)` 的 `u8` 数组表示, 原点在左上角, 行优先.
//! 2. 网格的每个格子 (tile) 大小固定为 `sub_h * sub_w`, 不足一格的尾部行列直接丢弃.
//! 3. 所有可恢复错误都以 [`GridError`] 返回, 而不是 panic.
//!
//! # 开发计划
//!
//! ### 惰性分块访问 ✅
//!
//! 以线性索引或 `(行, 列)` 访问图像的分块, 不预先复制任何分块.
//!
//! 实现位于 `lira-grid/src/tile`.
//!
//! ### 组织区域轮廓检测 ✅
//!
//! 缩小 -> 模糊 -> HSV 门限 -> 膨胀/腐蚀/膨胀 -> 轮廓追踪 -> 放大回原分辨率.
//! 用于跳过纯玻片背景区域, 节省推理时间.
//!
//! 实现位于 `lira-grid/src/tissue`.
//!
//! ### 分类器路由 ✅
//!
//! 每个分块被分配到病灶分类器、通用分类器或直接跳过 (背景).
//!
//! 实现位于 `lira-grid/src/routing.rs`.
//!
//! ### 双分类器批量推理 ✅
//!
//! 按固定批大小推理, 并将两个分类器的原生输出映射到统一的 7 类概率向量.
//! 批大小只影响吞吐量, 不影响结果.
//!
//! 实现位于 `lira-grid/src/engine.rs` 和 `lira-grid/src/classifier.rs`.
//!
//! ### 网格去噪 ✅
//!
//! 逐类别通道的全变分 (TV, Chambolle) 去噪.
//!
//! 实现位于 `lira-grid/src/denoise.rs`.
//!
//! ### argmax 与持久化 ✅
//!
//! 实现位于 `lira-grid/src/grid`.
//!
//! ### 统计与可视化叠加图 ✅
//!
//! 实现位于 `lira-grid/src/stats.rs` 和 `lira-grid/src/overlay.rs`.

/// 二维索引 `(行, 列)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 平面直角坐标系下的点 `(x, y)`, 以原图像素为单位.
pub type Point2f = (f32, f32);

pub mod consts;

mod error;

pub use error::{GridError, GridResult};

mod params;

pub use params::{GridParams, TissueParams};

pub mod tile;

pub use tile::{Subsections, TileGeometry};

pub mod tissue;

pub use tissue::Contour;

pub mod routing;

pub use routing::{Detection, Route, RoutingMask};

pub mod classifier;

pub use classifier::{ClassifierKind, Classifiers, Deployment, Remap, TileClassifier};

pub mod engine;

pub use engine::GridEngine;

pub mod denoise;

pub use denoise::{Denoiser, Identity, TvChambolle};

pub mod grid;

pub use grid::{argmax_labels, EditingDatasets, GridStore, MemoryStore, NpyStore};

pub mod progress;

pub use progress::{Flag, UserProgress};

pub mod pipeline;

pub use pipeline::{DetectionSource, ImageDir, ImageSource, NoDetections, PredictionGrids};

pub mod stats;

pub mod overlay;

pub mod dataset;

pub mod prelude;

/// 测试时把日志输出到终端. 可重复调用.
#[cfg(test)]
pub(crate) fn init_test_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Debug)
        .init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_logger_init_is_idempotent() {
        super::init_test_logger();
        super::init_test_logger();
        assert!(log::log_enabled!(log::Level::Debug));
    }
}
