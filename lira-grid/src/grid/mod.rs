//! 标签网格: argmax 与 "编辑前/编辑后" 两份持久化副本.

mod npy;
mod store;

pub use npy::NpyStore;
pub use store::{GridStore, MemoryStore};

use crate::GridResult;
use ndarray::{Array2, ArrayView3, Axis};
use std::path::Path;

/// 编辑前副本在数据目录下的子目录名.
pub const BEFORE_EDITING_DIR: &str = "prediction_grids_before_editing";

/// 编辑后副本在数据目录下的子目录名.
pub const AFTER_EDITING_DIR: &str = "prediction_grids_after_editing";

/// 沿类别轴取 argmax, 得到 `(rows, cols)` 的标签网格.
///
/// 有多个最大值时取索引最小者; NaN 永远不会被选中. 全为 NaN 的格子标记为 0.
pub fn argmax_labels(grid: ArrayView3<f32>) -> Array2<u8> {
    grid.map_axis(Axis(2), |scores| {
        let mut best: Option<(usize, f32)> = None;
        for (k, &v) in scores.iter().enumerate() {
            if v.is_nan() {
                continue;
            }
            match best {
                Some((_, b)) if v <= b => {}
                _ => best = Some((k, v)),
            }
        }
        best.map_or(0, |(k, _)| k as u8)
    })
}

/// 一组图像的两份标签网格: 生成后即不再修改的 `before`, 以及供人工编辑的 `after`.
#[derive(Clone, Debug)]
pub struct EditingDatasets<S> {
    /// 编辑前.
    pub before: S,

    /// 编辑后.
    pub after: S,
}

impl<S: GridStore> EditingDatasets<S> {
    /// 由两个容量相同的存储构建.
    pub fn new(before: S, after: S) -> GridResult<Self> {
        if before.len() != after.len() {
            return Err(crate::GridError::InvalidParams(
                "before/after stores differ in length",
            ));
        }
        Ok(Self { before, after })
    }

    /// 图像总数.
    #[inline]
    pub fn len(&self) -> usize {
        self.before.len()
    }

    /// 是否没有任何图像?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 把同一份标签网格同时写入编辑前与编辑后.
    pub fn persist(&mut self, index: usize, labels: Array2<u8>) -> GridResult<()> {
        self.before.set(index, labels.clone())?;
        self.after.set(index, labels)
    }

    /// 清空两份副本.
    pub fn clear(&mut self) -> GridResult<()> {
        self.before.clear()?;
        self.after.clear()
    }
}

impl EditingDatasets<MemoryStore> {
    /// 纯内存的两份副本.
    pub fn in_memory(len: usize) -> Self {
        Self {
            before: MemoryStore::new(len),
            after: MemoryStore::new(len),
        }
    }
}

impl EditingDatasets<NpyStore> {
    /// 在 `root` 下打开 [`BEFORE_EDITING_DIR`] 与 [`AFTER_EDITING_DIR`] 两个目录.
    pub fn open<P: AsRef<Path>>(root: P, len: usize, restart: bool) -> GridResult<Self> {
        let root = root.as_ref();
        Ok(Self {
            before: NpyStore::open(root.join(BEFORE_EDITING_DIR), len, restart)?,
            after: NpyStore::open(root.join(AFTER_EDITING_DIR), len, restart)?,
        })
    }
}
