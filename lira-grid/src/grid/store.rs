use crate::{GridError, GridResult};
use ndarray::Array2;

/// 按图像索引存放标签网格 (`(rows, cols)` 的 `u8` 数组) 的容器.
///
/// 容量 `len` 在创建时确定, 每个槽位初始为空.
pub trait GridStore {
    /// 槽位个数, 即图像总数.
    fn len(&self) -> usize;

    /// 是否没有任何槽位?
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 写入第 `index` 张图像的标签网格, 覆盖旧值.
    fn set(&mut self, index: usize, labels: Array2<u8>) -> GridResult<()>;

    /// 读取第 `index` 张图像的标签网格. 尚未写入时返回 `Ok(None)`.
    fn get(&self, index: usize) -> GridResult<Option<Array2<u8>>>;

    /// 清空所有槽位.
    fn clear(&mut self) -> GridResult<()>;

    /// 按索引顺序迭代所有槽位.
    fn iter(&self) -> impl Iterator<Item = GridResult<Option<Array2<u8>>>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// 是否每个槽位都已写入?
    fn is_complete(&self) -> GridResult<bool> {
        for slot in self.iter() {
            if slot?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[inline]
pub(super) fn check_index(index: usize, len: usize) -> GridResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(GridError::ImageIndexOutOfRange { index, len })
    }
}

/// 纯内存存储.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    slots: Vec<Option<Array2<u8>>>,
}

impl MemoryStore {
    /// 创建 `len` 个空槽位.
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }
}

impl GridStore for MemoryStore {
    #[inline]
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn set(&mut self, index: usize, labels: Array2<u8>) -> GridResult<()> {
        check_index(index, self.len())?;
        self.slots[index] = Some(labels);
        Ok(())
    }

    fn get(&self, index: usize) -> GridResult<Option<Array2<u8>>> {
        check_index(index, self.len())?;
        Ok(self.slots[index].clone())
    }

    fn clear(&mut self) -> GridResult<()> {
        self.slots.iter_mut().for_each(|s| *s = None);
        Ok(())
    }
}
