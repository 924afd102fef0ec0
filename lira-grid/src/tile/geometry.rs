use crate::{GridError, GridResult, Idx2d, Point2f};

/// 分块网格的几何信息.
///
/// `rows = H / sub_h`, `cols = W / sub_w` (截断除法), 尾部不足一格的像素被丢弃.
/// 线性索引 `idx` 与二维位置 `(idx / cols, idx % cols)` 一一对应.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TileGeometry {
    sub_h: usize,
    sub_w: usize,
    rows: usize,
    cols: usize,
}

impl TileGeometry {
    /// 由图像分辨率 `(height, width)` 和分块大小构建网格.
    ///
    /// 分块大小为 0 时返回 `Err(GridError::InvalidParams)`.
    pub fn new((height, width): Idx2d, sub_h: usize, sub_w: usize) -> GridResult<Self> {
        if sub_h == 0 || sub_w == 0 {
            return Err(GridError::InvalidParams("tile size must be positive"));
        }
        Ok(Self {
            sub_h,
            sub_w,
            rows: height / sub_h,
            cols: width / sub_w,
        })
    }

    /// 分块高度.
    #[inline]
    pub fn sub_h(&self) -> usize {
        self.sub_h
    }

    /// 分块宽度.
    #[inline]
    pub fn sub_w(&self) -> usize {
        self.sub_w
    }

    /// 网格行数 (prediction_h).
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// 网格列数 (prediction_w).
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// 网格形状 `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        (self.rows, self.cols)
    }

    /// 分块总数 (prediction_n).
    #[inline]
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// 网格是否不含任何分块?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 检查线性索引是否越界.
    #[inline]
    pub fn check(&self, idx: usize) -> GridResult<()> {
        if idx < self.len() {
            Ok(())
        } else {
            Err(GridError::TileIndexOutOfRange {
                index: idx,
                len: self.len(),
            })
        }
    }

    /// 线性索引 -> `(行, 列)`. 不检查越界.
    #[inline]
    pub fn pos_of(&self, idx: usize) -> Idx2d {
        (idx / self.cols, idx % self.cols)
    }

    /// `(行, 列)` -> 线性索引. 不检查越界.
    #[inline]
    pub fn index_of(&self, (row, col): Idx2d) -> usize {
        row * self.cols + col
    }

    /// 分块在原图中的像素范围 `(y0, x0, y1, x1)`, 左闭右开.
    #[inline]
    pub fn pixel_bounds(&self, idx: usize) -> (usize, usize, usize, usize) {
        let (row, col) = self.pos_of(idx);
        let (y0, x0) = (row * self.sub_h, col * self.sub_w);
        (y0, x0, y0 + self.sub_h, x0 + self.sub_w)
    }

    /// 分块外接矩形的四个角点 `(x, y)`, 依次为左上、左下、右上、右下.
    pub fn corners(&self, idx: usize) -> [Point2f; 4] {
        let (y0, x0, y1, x1) = self.pixel_bounds(idx);
        let (y0, x0, y1, x1) = (y0 as f32, x0 as f32, y1 as f32, x1 as f32);
        [(x0, y0), (x0, y1), (x1, y0), (x1, y1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_truncates() {
        let g = TileGeometry::new((240, 290), 80, 145).unwrap();
        assert_eq!(g.shape(), (3, 2));
        assert_eq!(g.len(), 6);

        let g = TileGeometry::new((250, 300), 80, 145).unwrap();
        assert_eq!(g.shape(), (3, 2));

        let g = TileGeometry::new((79, 300), 80, 145).unwrap();
        assert!(g.is_empty());

        assert!(TileGeometry::new((10, 10), 0, 1).is_err());
    }

    #[test]
    fn test_index_round_trip() {
        let g = TileGeometry::new((80 * 7, 145 * 5), 80, 145).unwrap();
        for i in 0..g.len() {
            assert_eq!(g.index_of(g.pos_of(i)), i);
        }
        assert_eq!(g.pos_of(g.len() - 1), (6, 4));
    }

    #[test]
    fn test_bounds_and_corners() {
        let g = TileGeometry::new((240, 290), 80, 145).unwrap();
        // idx 3 -> (1, 1)
        assert_eq!(g.pixel_bounds(3), (80, 145, 160, 290));
        assert_eq!(
            g.corners(3),
            [(145.0, 80.0), (145.0, 160.0), (290.0, 80.0), (290.0, 160.0)]
        );
        assert!(g.check(5).is_ok());
        assert!(matches!(
            g.check(6),
            Err(GridError::TileIndexOutOfRange { index: 6, len: 6 })
        ));
    }
}
