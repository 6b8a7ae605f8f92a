pub mod error;
pub mod model;
pub mod store;

pub use error::*;
pub use model::*;
pub use store::ConfigStore;

use std::path::PathBuf;

/// 設定ファイルのパスを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "PACKFLOW_CONFIG_PATH";

const CONFIG_FILE_NAME: &str = "config.json";

/// packflowのグローバル設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigFileNotFound)?
        .join("packflow");

    Ok(config_dir)
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 PACKFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: config.json
/// 3. ./.packflow/ ディレクトリ内: config.json
/// 4. ~/.config/packflow/config.json (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            "{} points to a missing file: {}",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリ
    let path = current_dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Ok(path);
    }

    // 3. ./.packflow/
    let path = current_dir.join(".packflow").join(CONFIG_FILE_NAME);
    if path.exists() {
        return Ok(path);
    }

    // 4. グローバル設定
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("packflow").join(CONFIG_FILE_NAME);
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}
