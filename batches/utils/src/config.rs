//! 从 TOML 文件加载批处理配置.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use tomo_berry::batch::BatchConfig;

use crate::loader;

/// 配置文件路径的环境变量.
pub const CONFIG_ENV: &str = "FM_FRAMES_CONFIG";

/// 当前目录下的默认配置文件名.
pub const DEFAULT_CONFIG_NAME: &str = "fm-frames.toml";

/// 加载配置文件错误.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// 无法读取.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// 配置文件.
        path: PathBuf,

        /// 底层错误.
        source: io::Error,
    },

    /// 格式错误.
    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        /// 配置文件.
        path: PathBuf,

        /// 底层错误.
        source: toml::de::Error,
    },
}

/// 从 `path` 解析配置, 未出现的字段取默认值.
pub fn from_path(path: &Path) -> Result<BatchConfig, LoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg: BatchConfig = toml::from_str(&raw).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    cfg.dataset_root = loader::expand_home(cfg.dataset_root);
    cfg.output_dir = loader::expand_home(cfg.output_dir);
    cfg.scratch_dir = cfg.scratch_dir.map(loader::expand_home);
    Ok(cfg)
}

/// 按优先级确定配置文件:
///
/// 1. `explicit` (命令行给出);
/// 2. 环境变量 `$FM_FRAMES_CONFIG`;
/// 3. 当前目录下的 `fm-frames.toml` (若存在).
///
/// 前两者指向的文件必须存在.
pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    match env::var(CONFIG_ENV) {
        Ok(p) if !p.is_empty() => Some(PathBuf::from(p)),
        _ => {
            let p = PathBuf::from(DEFAULT_CONFIG_NAME);
            p.is_file().then_some(p)
        }
    }
}

/// 加载配置. 没有任何配置文件时使用默认值.
///
/// 配置中没有给出数据集根目录时, 取 `$FM_DATASET_DIR` 或 `$HOME/dataset`.
/// 返回配置及其来源文件.
pub fn load(explicit: Option<&Path>) -> Result<(BatchConfig, Option<PathBuf>), LoadError> {
    let source = locate(explicit);
    let mut cfg = match &source {
        Some(path) => {
            log::debug!("loading configuration from {}", path.display());
            from_path(path)?
        }
        None => BatchConfig::default(),
    };
    if cfg.dataset_root.as_os_str().is_empty() {
        if let Some(root) = loader::dataset_dir_from_env_or_home() {
            cfg.dataset_root = root;
        }
    }
    Ok((cfg, source))
}
