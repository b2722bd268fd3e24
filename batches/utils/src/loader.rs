//! 对 `tomo-berry::dataset` 的更一层封装.

use std::env;
use std::path::PathBuf;

/// 数据集根目录的环境变量.
pub const DATASET_ENV: &str = "FM_DATASET_DIR";

/// 获取数据集根目录.
///
/// 1. 若环境变量 `$FM_DATASET_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset`. 找不到主目录时返回 `None`.
pub fn dataset_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var(DATASET_ENV) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => tomo_berry::dataset::home_dataset_dir(),
    }
}

/// 把 `~` 或 `~/...` 展开为主目录下的路径, 其余原样返回.
pub fn expand_home(path: PathBuf) -> PathBuf {
    let Some(s) = path.to_str() else {
        return path;
    };
    let rest = match s.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => return path,
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => path,
    }
}
