use crate::Point2f;

/// 首尾相连的简单多边形, 近似一块组织区域的边界. 坐标为原图像素坐标 `(x, y)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    points: Vec<Point2f>,
}

impl Contour {
    /// 由有序顶点构建. 首尾自动视为相连, 无需重复首点.
    #[inline]
    pub fn new(points: Vec<Point2f>) -> Self {
        Self { points }
    }

    /// 顶点.
    #[inline]
    pub fn points(&self) -> &[Point2f] {
        &self.points
    }

    /// 顶点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否没有顶点?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 将所有顶点坐标乘以 `factor`, 返回新轮廓.
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(
            self.points
                .iter()
                .map(|&(x, y)| (x * factor, y * factor))
                .collect(),
        )
    }

    /// 有向面积的两倍 (鞋带公式). 顶点少于 3 个时为 0.
    fn signed_area2(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        self.edges()
            .map(|((x1, y1), (x2, y2))| {
                let (x1, y1, x2, y2) = (x1 as f64, y1 as f64, x2 as f64, y2 as f64);
                x1 * y2 - x2 * y1
            })
            .sum()
    }

    /// 多边形面积 (平方像素).
    #[inline]
    pub fn area(&self) -> f64 {
        self.signed_area2().abs() / 2.0
    }

    /// 顶点是否在图像坐标系 (y 轴向下) 中按顺时针排列.
    ///
    /// 多边形至少需要 3 个不共线顶点, 否则结果无意义.
    #[inline]
    pub fn is_clockwise(&self) -> bool {
        // y 轴向下时, 正的鞋带面积即为视觉上的顺时针.
        self.signed_area2() > 0.0
    }

    /// 迭代所有边 `(起点, 终点)`, 包括末点到首点的闭合边.
    fn edges(&self) -> impl Iterator<Item = (Point2f, Point2f)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// 判断点 `p` 是否位于多边形内部. **边界上的点视为内部**.
    pub fn contains(&self, p: Point2f) -> bool {
        match self.points.len() {
            0 => false,
            1 => self.points[0] == p,
            _ => {
                if self.edges().any(|(a, b)| on_segment(p, a, b)) {
                    return true;
                }
                // 射线法: 向 +x 方向发出射线, 统计穿越次数.
                let (px, py) = p;
                let mut inside = false;
                for ((x1, y1), (x2, y2)) in self.edges() {
                    if (y1 > py) != (y2 > py) {
                        let t = (py - y1) / (y2 - y1);
                        let cross_x = x1 + t * (x2 - x1);
                        if px < cross_x {
                            inside = !inside;
                        }
                    }
                }
                inside
            }
        }
    }
}

/// 判断 `p` 是否落在线段 `ab` 上 (含端点).
fn on_segment(p: Point2f, a: Point2f, b: Point2f) -> bool {
    let (px, py) = (p.0 as f64, p.1 as f64);
    let (ax, ay) = (a.0 as f64, a.1 as f64);
    let (bx, by) = (b.0 as f64, b.1 as f64);
    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    let scale = (bx - ax).abs().max((by - ay).abs()).max(1.0);
    if cross.abs() > 1e-6 * scale {
        return false;
    }
    px >= ax.min(bx) && px <= ax.max(bx) && py >= ay.min(by) && py <= ay.max(by)
}
