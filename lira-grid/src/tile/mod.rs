//! 惰性分块访问.
//!
//! 将一张大图像视为 `rows * cols` 个固定大小分块组成的虚拟网格,
//! 但从不一次性切分或复制整张图像.

mod geometry;
mod subsections;

pub use geometry::TileGeometry;
pub use subsections::Subsections;
