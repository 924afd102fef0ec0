//! 🔬欢迎光临🧫
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Point2f};

pub use crate::{GridError, GridParams, GridResult, TissueParams};

pub use crate::consts::class::{
    EMPTY_SLIDE, HEALTHY, TYPE_ONE_CASEUM, TYPE_ONE_RIM, TYPE_THREE, TYPE_TWO, UNKNOWN_MISC,
};
pub use crate::consts::{CLASS_N, CLASS_NAMES, SKIP_LABEL};

pub use crate::tile::{Subsections, TileGeometry};
pub use crate::tissue::{detect_tissue, Contour};

pub use crate::routing::{Detection, Route, RoutingMask};

pub use crate::classifier::{ClassifierKind, Classifiers, Deployment, TileClassifier};
pub use crate::engine::GridEngine;

pub use crate::denoise::{Denoiser, Identity, TvChambolle};
pub use crate::grid::{argmax_labels, EditingDatasets, GridStore, MemoryStore, NpyStore};

pub use crate::pipeline::{DetectionSource, ImageDir, ImageSource, NoDetections, PredictionGrids};
pub use crate::progress::{Flag, UserProgress};

pub use crate::dataset::{self, data_dir};
pub use crate::overlay::{render_overlay, OverlayOptions};
pub use crate::stats::{self, ClassCounts, ImageStats};
