use super::store::{check_index, GridStore};
use crate::GridResult;
use ndarray::Array2;
use ndarray_npy::{read_npy, write_npy};
use std::fs;
use std::path::{Path, PathBuf};

/// 以 `{index}.npy` 形式把每张图像的标签网格存放在同一目录下.
///
/// 写入时先写临时文件再重命名, 中途失败不会留下损坏的 npy 文件.
#[derive(Clone, Debug)]
pub struct NpyStore {
    dir: PathBuf,
    len: usize,
}

impl NpyStore {
    /// 打开 (必要时创建) 目录 `dir`, 容量为 `len`.
    ///
    /// `restart` 为 `true` 时删除该目录下已有的 `0.npy` 至 `{len - 1}.npy`,
    /// 其余文件不受影响.
    pub fn open<P: AsRef<Path>>(dir: P, len: usize, restart: bool) -> GridResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let mut ans = Self { dir, len };
        if restart {
            ans.clear()?;
        }
        Ok(ans)
    }

    /// 存储目录.
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 第 `index` 张图像的文件路径.
    #[inline]
    pub fn path_of(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{index}.npy"))
    }
}

impl GridStore for NpyStore {
    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    fn set(&mut self, index: usize, labels: Array2<u8>) -> GridResult<()> {
        check_index(index, self.len)?;
        let dst = self.path_of(index);
        let tmp = dst.with_extension("npy.tmp");
        write_npy(&tmp, &labels)?;
        fs::rename(&tmp, &dst)?;
        Ok(())
    }

    fn get(&self, index: usize) -> GridResult<Option<Array2<u8>>> {
        check_index(index, self.len)?;
        let path = self.path_of(index);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(read_npy(path)?))
    }

    fn clear(&mut self) -> GridResult<()> {
        for index in 0..self.len {
            match fs::remove_file(self.path_of(index)) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lira-grid-npy-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_npy_round_trip() {
        let dir = temp_dir("round-trip");
        let mut store = NpyStore::open(&dir, 2, false).unwrap();
        assert_eq!(store.get(0).unwrap(), None);

        let labels = Array2::from_shape_fn((3, 4), |(r, c)| ((r * 4 + c) % 7) as u8);
        store.set(1, labels.clone()).unwrap();
        assert!(store.path_of(1).is_file());
        assert!(!store.path_of(1).with_extension("npy.tmp").exists());

        // 重新打开, 不重置.
        let reopened = NpyStore::open(&dir, 2, false).unwrap();
        assert_eq!(reopened.get(1).unwrap(), Some(labels));
        assert!(reopened.get(2).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_restart_clears_grids_only() {
        let dir = temp_dir("restart");
        let mut store = NpyStore::open(&dir, 2, false).unwrap();
        store.set(0, Array2::zeros((2, 2))).unwrap();
        fs::write(dir.join("notes.txt"), b"keep").unwrap();

        let store = NpyStore::open(&dir, 2, true).unwrap();
        assert_eq!(store.get(0).unwrap(), None);
        assert!(dir.join("notes.txt").is_file());

        fs::remove_dir_all(&dir).unwrap();
    }
}
