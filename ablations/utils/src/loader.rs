//! 对 `lira-grid::dataset` 的更一层封装. 提供更直接的图像加载器.

use lira_grid::{GridResult, ImageDir};
use std::env;
use std::path::{Path, PathBuf};

/// 获取切片图像目录.
///
/// 1. 若环境变量 `$LIRA_IMAGE_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/lira/images`.
pub fn image_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var("LIRA_IMAGE_DIR") {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => lira_grid::dataset::home_data_dir_with(["images"]),
    }
}

/// 获取切片图像加载器.
#[inline]
pub fn image_loader<P: AsRef<Path>>(path: P) -> GridResult<ImageDir> {
    ImageDir::open(path)
}

/// 从 `$LIRA_IMAGE_DIR` 或者 `$HOME/dataset/lira/images` 加载图像.
///
/// 目录不存在或其中没有图像时返回 `None`.
pub fn image_loader_from_env_or_home() -> Option<ImageDir> {
    let dir = image_dir_from_env_or_home()?;
    if !dir.is_dir() {
        return None;
    }
    image_loader(dir).ok().filter(|d| !d.files().is_empty())
}
