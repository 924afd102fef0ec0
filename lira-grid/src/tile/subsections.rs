use super::TileGeometry;
use crate::{GridResult, Idx2d};
use ndarray::{s, Array4, ArrayView3, Axis};

/// 把图像当作分块向量访问的轻量级视图.
///
/// 构建时不复制任何像素; 只有 [`Subsections::batch`] 会为请求的分块分配内存.
#[derive(Clone, Debug)]
pub struct Subsections<'a> {
    /// 原图 `(H, W, C)` 的视图.
    img: ArrayView3<'a, u8>,
    geom: TileGeometry,
}

impl<'a> Subsections<'a> {
    /// 以 `sub_h * sub_w` 分块大小包装图像 `img`.
    pub fn new(img: ArrayView3<'a, u8>, sub_h: usize, sub_w: usize) -> GridResult<Self> {
        let &[h, w, _] = img.shape() else {
            unreachable!()
        };
        let geom = TileGeometry::new((h, w), sub_h, sub_w)?;
        Ok(Self { img, geom })
    }

    /// 网格几何信息.
    #[inline]
    pub fn geometry(&self) -> &TileGeometry {
        &self.geom
    }

    /// 分块总数.
    #[inline]
    pub fn len(&self) -> usize {
        self.geom.len()
    }

    /// 是否一个分块都没有?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.geom.is_empty()
    }

    /// 图像通道数.
    #[inline]
    pub fn channels(&self) -> usize {
        self.img.shape()[2]
    }

    /// 通过线性索引获取分块视图 (零拷贝).
    pub fn get(&self, idx: usize) -> GridResult<ArrayView3<'a, u8>> {
        self.geom.check(idx)?;
        let (y0, x0, y1, x1) = self.geom.pixel_bounds(idx);
        Ok(self.img.slice_move(s![y0..y1, x0..x1, ..]))
    }

    /// 通过 `(行, 列)` 获取分块视图 (零拷贝).
    #[inline]
    pub fn get_pos(&self, pos: Idx2d) -> GridResult<ArrayView3<'a, u8>> {
        if pos.1 >= self.geom.cols() {
            return Err(crate::GridError::TileIndexOutOfRange {
                index: pos.0.saturating_mul(self.geom.cols()).saturating_add(pos.1),
                len: self.len(),
            });
        }
        self.get(self.geom.index_of(pos))
    }

    /// 按 `indices` 的顺序获取一批分块, 叠成 `(N, sub_h, sub_w, C)` 的数组,
    /// 可直接作为分类器输入.
    ///
    /// 任一索引越界时返回错误, 不返回部分结果.
    pub fn batch(&self, indices: &[usize]) -> GridResult<Array4<u8>> {
        for &idx in indices {
            self.geom.check(idx)?;
        }
        let mut out = Array4::<u8>::zeros((
            indices.len(),
            self.geom.sub_h(),
            self.geom.sub_w(),
            self.channels(),
        ));
        for (mut dst, &idx) in out.axis_iter_mut(Axis(0)).zip(indices) {
            dst.assign(&self.get(idx)?);
        }
        Ok(out)
    }
}
