//! 実行オプションの解決
//!
//! 1回の実行に必要な情報は [`RunContext`] にまとめ、生成後は変更しません。
//! 各イメージの処理内容は [`BuildPlan`] で決まります。

use crate::layout::ImageTag;
use packflow_config::{ApplicationSettings, ConfigStore, ImageSpec, Ownership};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// イメージごとの実行オプション（1回の実行の間だけ有効）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    pub build: bool,
    /// ビルド前に既存の `{baseImage}_*.tar.gz` を削除
    pub delete: bool,
    /// latest とバージョン固定タグの両方を作り、バージョンを上げる
    pub release: bool,
    pub pack_volumes: bool,
    /// 固定タグに使うバージョンの上書き
    pub version: Option<String>,
}

static DEFAULT_OPTIONS: ImageOptions = ImageOptions {
    build: false,
    delete: false,
    release: false,
    pack_volumes: false,
    version: None,
};

impl ImageOptions {
    pub fn build() -> Self {
        Self {
            build: true,
            ..Default::default()
        }
    }

    pub fn with_release(mut self) -> Self {
        self.release = true;
        self
    }

    pub fn with_delete(mut self) -> Self {
        self.delete = true;
        self
    }

    pub fn with_pack_volumes(mut self) -> Self {
        self.pack_volumes = true;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// 1イメージの処理内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPlan {
    /// ビルドしない（ボリューム同梱用のプレースホルダーのみ）
    NotSelected,
    BuildLatest,
    BuildLatestAndRelease,
}

impl BuildPlan {
    pub fn resolve(build_all: bool, options: &ImageOptions) -> Self {
        match (build_all || options.build, options.release) {
            (false, _) => BuildPlan::NotSelected,
            (true, false) => BuildPlan::BuildLatest,
            (true, true) => BuildPlan::BuildLatestAndRelease,
        }
    }

    pub fn is_selected(&self) -> bool {
        !matches!(self, BuildPlan::NotSelected)
    }

    /// エンジンでビルドするタグ（この順に実行）
    pub fn build_tags(&self, pinned_version: &str) -> Vec<ImageTag> {
        match self {
            BuildPlan::NotSelected => Vec::new(),
            BuildPlan::BuildLatest => vec![ImageTag::Latest],
            BuildPlan::BuildLatestAndRelease => vec![
                ImageTag::Latest,
                ImageTag::Pinned(pinned_version.to_string()),
            ],
        }
    }
}

/// ビルドしないイメージに記録するプレースホルダーのタグ
pub fn placeholder_tags(release: bool, pinned_version: &str) -> Vec<ImageTag> {
    let mut tags = vec![ImageTag::Latest];
    if release {
        tags.push(ImageTag::Pinned(pinned_version.to_string()));
    }
    tags
}

/// 1回の実行コンテキスト
#[derive(Debug, Clone)]
pub struct RunContext {
    build_all: bool,
    options: HashMap<String, ImageOptions>,
    project_root: PathBuf,
    output_dir: PathBuf,
    ownership: Ownership,
}

impl RunContext {
    pub fn new(project_root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_all: false,
            options: HashMap::new(),
            project_root: project_root.into(),
            output_dir: output_dir.into(),
            ownership: Ownership::default(),
        }
    }

    /// 設定ファイルの内容から作成（パスはプロジェクトルート基準で解決）
    pub fn from_settings(
        store: &ConfigStore,
        settings: &ApplicationSettings,
        build_all: bool,
        options: HashMap<String, ImageOptions>,
    ) -> Self {
        Self {
            build_all,
            options,
            project_root: store.project_root().to_path_buf(),
            output_dir: store.resolve(&settings.package_settings.output_directory),
            ownership: settings.package_settings.ownership.clone(),
        }
    }

    pub fn with_build_all(mut self, build_all: bool) -> Self {
        self.build_all = build_all;
        self
    }

    pub fn with_options(mut self, image_name: impl Into<String>, options: ImageOptions) -> Self {
        self.options.insert(image_name.into(), options);
        self
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn build_all(&self) -> bool {
        self.build_all
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    /// オプション未指定のイメージはすべて false として扱う
    pub fn options_for(&self, image_name: &str) -> &ImageOptions {
        self.options.get(image_name).unwrap_or(&DEFAULT_OPTIONS)
    }

    pub fn plan_for(&self, image: &ImageSpec) -> BuildPlan {
        BuildPlan::resolve(self.build_all, self.options_for(&image.name))
    }

    /// 固定タグに使うバージョン（上書き指定があればそれを優先）
    pub fn pinned_version(&self, image: &ImageSpec) -> String {
        self.options_for(&image.name)
            .version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&image.version)
            .to_string()
    }

    /// 設定中のパスをプロジェクトルート基準で解決
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}
