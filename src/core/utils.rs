use dirs::home_dir;
use std::{
    env,
    path::{Path, PathBuf},
};

use crate::errors::Result;

const DEFAULT_DIR_NAME: &str = ".expense_core";
const HOME_ENV: &str = "EXPENSE_CORE_HOME";
const STORE_FILE: &str = "store.json";
const QUEUE_DIR: &str = "report_queue";
const CONFIG_DIR: &str = "config";
const CONFIG_FILE: &str = "config.json";
const TMP_SUFFIX: &str = "tmp";

/// Resolves every on-disk location relative to one application root.
pub struct PathResolver;

impl PathResolver {
    /// Application data directory, `$EXPENSE_CORE_HOME` or `~/.expense_core`.
    pub fn base_dir() -> PathBuf {
        if let Some(custom) = env::var_os(HOME_ENV) {
            return PathBuf::from(custom);
        }
        home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR_NAME)
    }

    pub fn resolve_base(root: Option<PathBuf>) -> PathBuf {
        root.unwrap_or_else(Self::base_dir)
    }

    pub fn store_file_in(base: &Path) -> PathBuf {
        base.join(STORE_FILE)
    }

    pub fn queue_dir_in(base: &Path) -> PathBuf {
        base.join(QUEUE_DIR)
    }

    pub fn config_dir_in(base: &Path) -> PathBuf {
        base.join(CONFIG_DIR)
    }

    pub fn config_file_in(base: &Path) -> PathBuf {
        Self::config_dir_in(base).join(CONFIG_FILE)
    }
}

pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

/// Sibling path used to stage a write before renaming over `path`.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

/// Writes `data` to a temp file and renames it over `path`.
pub async fn write_atomic(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, data.as_bytes()).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn tmp_path_keeps_original_extension() {
        let tmp = tmp_path(Path::new("/data/store.json"));
        assert_eq!(tmp, PathBuf::from("/data/store.json.tmp"));
    }

    #[tokio::test]
    async fn write_atomic_replaces_contents() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("nested").join("file.json");
        write_atomic(&path, "{\"a\":1}").await.expect("first write");
        write_atomic(&path, "{\"a\":2}").await.expect("second write");
        let data = tokio::fs::read_to_string(&path).await.expect("read back");
        assert_eq!(data, "{\"a\":2}");
        assert!(!tmp_path(&path).exists());
    }
}
