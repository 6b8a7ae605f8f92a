//! 設定ファイルの読み書き
//!
//! ドキュメント全体を読み込み、全体を書き戻します。
//! `ApplicationSettings.Images` 以外の未知のキーは書き戻し時にそのまま保持されます。

use crate::error::{ConfigError, Result};
use crate::model::{APPLICATION_SECTION, ApplicationSettings, IMAGES_KEY, ImageSpec};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const BACKUP_SUFFIX: &str = "backup";

/// JSON 設定ドキュメントへのハンドル
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    project_root: PathBuf,
}

impl ConfigStore {
    /// 設定ファイルを開く（存在確認のみ、内容は読み込まない）
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(ConfigError::ConfigFileNotFound);
        }

        let project_root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Self { path, project_root })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 相対パスの基準となるディレクトリ（設定ファイルの親ディレクトリ）
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// 設定中のパスをプロジェクトルート基準で解決
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// ドキュメント全体を JSON 値として読み込む
    pub fn read_document(&self) -> Result<Value> {
        let content = fs::read_to_string(&self.path)?;
        let document: Value = serde_json::from_str(&content)?;

        if !document.is_object() {
            return Err(ConfigError::InvalidDocument {
                path: self.path.clone(),
                message: "top level must be an object".to_string(),
            });
        }

        Ok(document)
    }

    /// 1つのトップレベルセクションを読み込む（存在しない場合は None）
    pub fn read_section(&self, name: &str) -> Result<Option<Value>> {
        let document = self.read_document()?;
        Ok(document.get(name).cloned())
    }

    /// `ApplicationSettings` セクションを型付きで読み込む
    ///
    /// セクションが存在しない場合は既定値を返します。
    pub fn read_settings(&self) -> Result<ApplicationSettings> {
        let settings = match self.read_section(APPLICATION_SECTION)? {
            Some(section) => serde_json::from_value(section)?,
            None => {
                tracing::warn!(
                    "Section '{}' not found in {}, using defaults",
                    APPLICATION_SECTION,
                    self.path.display()
                );
                ApplicationSettings::default()
            }
        };

        tracing::debug!(
            "Loaded {} image definitions from {}",
            settings.images.len(),
            self.path.display()
        );
        Ok(settings)
    }

    /// ドキュメント全体を書き込む
    ///
    /// 既存ファイルは `<file>.backup` に退避されます。
    pub fn write_document(&self, document: &Value) -> Result<()> {
        let backup = self.backup_path();
        if self.path.exists() {
            if backup.exists() {
                fs::remove_file(&backup)?;
            }
            fs::copy(&self.path, &backup)?;
            tracing::debug!("Created config backup: {}", backup.display());
        }

        let content = serde_json::to_string_pretty(document)?;
        fs::write(&self.path, content)?;

        tracing::debug!("Saved config: {}", self.path.display());
        Ok(())
    }

    /// イメージ一覧を置き換えて1回の書き込みで保存
    pub fn write_images(&self, images: &[ImageSpec]) -> Result<()> {
        let mut document = self.read_document()?;

        let root = document
            .as_object_mut()
            .ok_or_else(|| ConfigError::InvalidDocument {
                path: self.path.clone(),
                message: "top level must be an object".to_string(),
            })?;

        let section = root
            .entry(APPLICATION_SECTION)
            .or_insert_with(|| Value::Object(Default::default()));

        let section = section
            .as_object_mut()
            .ok_or_else(|| ConfigError::InvalidDocument {
                path: self.path.clone(),
                message: format!("'{}' must be an object", APPLICATION_SECTION),
            })?;

        section.insert(IMAGES_KEY.to_string(), serde_json::to_value(images)?);

        self.write_document(&document)?;
        tracing::info!("Persisted {} image definitions", images.len());
        Ok(())
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(BACKUP_SUFFIX);
        self.path.with_file_name(name)
    }
}
