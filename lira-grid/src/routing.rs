//! 分块路由: 决定每个分块交给哪个分类器, 或直接跳过.

use crate::tissue::Contour;
use crate::TileGeometry;
use num::ToPrimitive;
use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 病灶检测框 `(x1, y1, x2, y2)`, 原图像素坐标, 轴对齐.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Detection {
    /// 左.
    pub x1: f32,
    /// 上.
    pub y1: f32,
    /// 右.
    pub x2: f32,
    /// 下.
    pub y2: f32,
}

impl Detection {
    /// 直接初始化.
    #[inline]
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 换算到分块网格坐标, 返回 `(行范围, 列范围)`, 左闭右开.
    ///
    /// 坐标分别除以 `sub_h`/`sub_w` 后截断取整, 负数视为 0, 超出网格的部分被裁掉.
    /// 该方法不修改 `self`.
    pub fn to_tile_span(&self, geom: &TileGeometry) -> (Range<usize>, Range<usize>) {
        #[inline]
        fn trunc(v: f32, sub: usize, limit: usize) -> usize {
            (v / sub as f32).to_usize().unwrap_or(0).min(limit)
        }
        let rows = trunc(self.y1, geom.sub_h(), geom.rows())..trunc(self.y2, geom.sub_h(), geom.rows());
        let cols = trunc(self.x1, geom.sub_w(), geom.cols())..trunc(self.x2, geom.sub_w(), geom.cols());
        (rows, cols)
    }

    /// 两个检测框是否相交 (含边界接触)?
    #[inline]
    pub fn touches(&self, other: &Detection) -> bool {
        self.x1 <= other.x2 && other.x1 <= self.x2 && self.y1 <= other.y2 && other.y1 <= self.y2
    }
}

/// 单个分块的路由结果.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Route {
    /// 与至少一个检测框相交, 交给病灶分类器.
    Lesion,

    /// 交给通用分类器.
    General,

    /// 完全位于组织区域之外, 不推理, 保持背景类别.
    Skip,
}

/// 整张图像的路由表.
///
/// 三个索引列表两两不相交, 并集恰为全部分块, 且各自升序.
#[derive(Clone, Debug)]
pub struct RoutingMask {
    routes: Vec<Route>,
    lesion: Vec<usize>,
    general: Vec<usize>,
    skip: Vec<usize>,
}

impl RoutingMask {
    /// 构建路由表.
    ///
    /// 1. 与任一检测框 (换算到网格坐标后) 相交的分块为 [`Route::Lesion`].
    /// 2. 其余分块中, 四个角点都不在任何轮廓内 (边界算内部) 的为 [`Route::Skip`].
    /// 3. 剩下的为 [`Route::General`].
    ///
    /// `contours` 为空时视为所有分块都在组织内, 不产生 `Skip`;
    /// 组织检测失败时宁可多推理, 也不能丢掉整张图.
    pub fn build(geom: &TileGeometry, detections: &[Detection], contours: &[Contour]) -> Self {
        let n = geom.len();
        let mut routes = vec![Route::General; n];

        for det in detections {
            let (rows, cols) = det.to_tile_span(geom);
            for r in rows {
                for c in cols.clone() {
                    routes[geom.index_of((r, c))] = Route::Lesion;
                }
            }
        }

        if !contours.is_empty() {
            let outside = outside_mask(geom, &routes, contours);
            for (route, out) in routes.iter_mut().zip(outside) {
                if out {
                    debug_assert_ne!(*route, Route::Lesion);
                    *route = Route::Skip;
                }
            }
        }

        Self::from_routes(routes)
    }

    /// 由逐分块路由直接构建.
    pub fn from_routes(routes: Vec<Route>) -> Self {
        let mut lesion = Vec::new();
        let mut general = Vec::new();
        let mut skip = Vec::new();
        for (idx, route) in routes.iter().enumerate() {
            match route {
                Route::Lesion => lesion.push(idx),
                Route::General => general.push(idx),
                Route::Skip => skip.push(idx),
            }
        }
        Self {
            routes,
            lesion,
            general,
            skip,
        }
    }

    /// 分块总数.
    #[inline]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// 是否为空表?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// 第 `idx` 个分块的路由. 越界时返回 `None`.
    #[inline]
    pub fn route(&self, idx: usize) -> Option<Route> {
        self.routes.get(idx).copied()
    }

    /// 逐分块路由.
    #[inline]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// 病灶分类器的输入分块, 升序.
    #[inline]
    pub fn lesion(&self) -> &[usize] {
        &self.lesion
    }

    /// 通用分类器的输入分块, 升序.
    #[inline]
    pub fn general(&self) -> &[usize] {
        &self.general
    }

    /// 跳过的分块, 升序.
    #[inline]
    pub fn skip(&self) -> &[usize] {
        &self.skip
    }

    /// 需要推理的分块总数.
    #[inline]
    pub fn classified_len(&self) -> usize {
        self.lesion.len() + self.general.len()
    }
}

/// 判断分块 `idx` 的四个角点是否至少有一个落在某个轮廓内 (边界算内部).
pub fn any_corner_inside(geom: &TileGeometry, idx: usize, contours: &[Contour]) -> bool {
    let corners = geom.corners(idx);
    contours
        .iter()
        .any(|c| corners.iter().any(|&p| c.contains(p)))
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 逐分块判断是否完全位于轮廓之外. 病灶分块恒为 `false`.
        fn outside_mask(geom: &TileGeometry, routes: &[Route], contours: &[Contour]) -> Vec<bool> {
            use rayon::prelude::*;

            routes
                .par_iter()
                .enumerate()
                .map(|(idx, r)| *r != Route::Lesion && !any_corner_inside(geom, idx, contours))
                .collect()
        }
    } else {
        /// 逐分块判断是否完全位于轮廓之外. 病灶分块恒为 `false`.
        fn outside_mask(geom: &TileGeometry, routes: &[Route], contours: &[Contour]) -> Vec<bool> {
            routes
                .iter()
                .enumerate()
                .map(|(idx, r)| *r != Route::Lesion && !any_corner_inside(geom, idx, contours))
                .collect()
        }
    }
}
