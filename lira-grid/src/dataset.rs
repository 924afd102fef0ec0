//! 数据目录约定.
//!
//! 优先读取环境变量 [`DATA_DIR_ENV`], 否则使用 `{用户主目录}/dataset/lira`.

use std::path::{Path, PathBuf};

/// 覆盖默认数据目录的环境变量.
pub const DATA_DIR_ENV: &str = "LIRA_DATA_DIR";

/// 用户进度文件所在的子目录.
pub const PROGRESS_DIR: &str = "user_progress";

/// 获取 `{用户主目录}/dataset/lira` 目录.
pub fn home_data_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.push("lira");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset/lira` 目录下给定继续项组成的全路径.
pub fn home_data_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_data_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 数据根目录: 环境变量 [`DATA_DIR_ENV`] (非空时), 否则 [`home_data_dir`].
pub fn data_dir() -> Option<PathBuf> {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(v) if !v.is_empty() => Some(PathBuf::from(v)),
        _ => home_data_dir(),
    }
}

/// 用户 `uid` 的预测网格目录 `{root}/{uid}`.
///
/// 编辑前/编辑后两份副本分别位于其下的
/// [`BEFORE_EDITING_DIR`](crate::grid::BEFORE_EDITING_DIR) 和
/// [`AFTER_EDITING_DIR`](crate::grid::AFTER_EDITING_DIR).
pub fn grids_dir<P: AsRef<Path>>(root: P, uid: &str) -> PathBuf {
    root.as_ref().join(uid)
}

/// 用户 `uid` 的进度文件 `{root}/user_progress/{uid}.bin`.
pub fn progress_file<P: AsRef<Path>>(root: P, uid: &str) -> PathBuf {
    root.as_ref().join(PROGRESS_DIR).join(format!("{uid}.bin"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let root = Path::new("/data");
        assert_eq!(grids_dir(root, "u7"), PathBuf::from("/data/u7"));
        assert_eq!(
            progress_file(root, "u7"),
            PathBuf::from("/data/user_progress/u7.bin")
        );
        if let Some(home) = home_data_dir_with(["a", "b"]) {
            assert!(home.ends_with("dataset/lira/a/b"));
        }
    }
}
