//! 設定ドキュメントのモデル
//!
//! `config.json` の `ApplicationSettings` セクションに対応する型。
//! キーは PascalCase で保存されます。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// トップレベルのセクション名
pub const APPLICATION_SECTION: &str = "ApplicationSettings";
/// イメージ一覧のキー
pub const IMAGES_KEY: &str = "Images";

pub const DEFAULT_OUTPUT_DIRECTORY: &str = "./packages";
pub const DEFAULT_COMPOSE_FILE: &str = "./compose.yaml";
pub const DEFAULT_COMPOSE_COMMAND: &str = "docker-compose";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApplicationSettings {
    pub images: Vec<ImageSpec>,
    pub package_settings: PackageSettings,
    pub build_settings: BuildSettings,
}

impl ApplicationSettings {
    /// 名前でイメージ定義を検索
    pub fn find_image(&self, name: &str) -> Option<&ImageSpec> {
        self.images.iter().find(|image| image.name == name)
    }

    /// 設定済みのベースイメージ名一覧
    pub fn base_images(&self) -> Vec<String> {
        self.images
            .iter()
            .map(|image| image.base_image.clone())
            .collect()
    }
}

/// 1つのイメージ定義
///
/// `version` はリリースビルド時にオーケストレーターが書き換える唯一のフィールド。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageSpec {
    pub name: String,
    pub base_image: String,
    pub context_path: PathBuf,
    pub volumes: Vec<PathBuf>,
    pub version: String,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            name: "Unnamed Image".to_string(),
            base_image: "UnknownBase".to_string(),
            context_path: PathBuf::from("."),
            volumes: Vec::new(),
            version: "0.0.0".to_string(),
        }
    }
}

impl ImageSpec {
    pub fn new(name: impl Into<String>, base_image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_image: base_image.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context_path: impl Into<PathBuf>) -> Self {
        self.context_path = context_path.into();
        self
    }

    pub fn with_volume(mut self, volume: impl Into<PathBuf>) -> Self {
        self.volumes.push(volume.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PackageSettings {
    pub output_directory: PathBuf,
    pub ownership: Ownership,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from(DEFAULT_OUTPUT_DIRECTORY),
            ownership: Ownership::default(),
        }
    }
}

/// 生成したアーカイブの所有者設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Ownership {
    pub user: Option<String>,
    pub group: Option<String>,
}

/// 所有者ポリシーの解決結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipPolicy<'a> {
    /// 何も設定されていない
    Unset,
    /// user / group の片方のみ設定されている
    Partial,
    Apply { user: &'a str, group: &'a str },
}

impl Ownership {
    pub fn policy(&self) -> OwnershipPolicy<'_> {
        let user = self.user.as_deref().filter(|u| !u.is_empty());
        let group = self.group.as_deref().filter(|g| !g.is_empty());

        match (user, group) {
            (Some(user), Some(group)) => OwnershipPolicy::Apply { user, group },
            (None, None) => OwnershipPolicy::Unset,
            _ => OwnershipPolicy::Partial,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BuildSettings {
    pub compose_file_path: PathBuf,
    pub compose_command: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            compose_file_path: PathBuf::from(DEFAULT_COMPOSE_FILE),
            compose_command: DEFAULT_COMPOSE_COMMAND.to_string(),
        }
    }
}
