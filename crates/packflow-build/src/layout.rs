//! パッケージ出力のファイル配置
//!
//! ```text
//! {out}/{stem}.tar        保存直後の一時ファイル
//! {out}/{stem}/           パッケージディレクトリ（tar、manifest.txt、volume_{i}/）
//! {out}/{stem}.tar.gz     圧縮後。ディレクトリは削除される
//! {out}/all_images.tar.gz 全イメージの latest アーカイブをまとめたもの
//! ```
//!
//! `stem` は `{baseImage}_{tag}`。

use std::fmt;
use std::path::{Path, PathBuf};

pub const LATEST_TAG: &str = "latest";
pub const MANIFEST_FILE: &str = "manifest.txt";
pub const AGGREGATE_DIR: &str = "all_images";
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// ビルド対象のタグ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageTag {
    Latest,
    /// リリース時のバージョン固定タグ
    Pinned(String),
}

impl ImageTag {
    pub fn as_str(&self) -> &str {
        match self {
            ImageTag::Latest => LATEST_TAG,
            ImageTag::Pinned(version) => version,
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self, ImageTag::Pinned(_))
    }

    /// エンジン上の完全なタグ `{baseImage}:{tag}`
    pub fn engine_tag(&self, base_image: &str) -> String {
        format!("{}:{}", base_image, self.as_str())
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ベースイメージ名をファイル名の一部として使える形にする
///
/// `acme/api` や `localhost:5000/api` が1つのパス要素に収まるよう `/` と `:` を `_` に置換。
pub fn sanitize_base_image(base_image: &str) -> String {
    base_image.replace(['/', ':'], "_")
}

/// 出力ディレクトリ上のパス計算
#[derive(Debug, Clone)]
pub struct PackageLayout {
    output_dir: PathBuf,
}

impl PackageLayout {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn stem(&self, base_image: &str, tag: &ImageTag) -> String {
        format!("{}_{}", sanitize_base_image(base_image), tag.as_str())
    }

    /// パッケージディレクトリ（拡張子なしのパス。各ファイルはここから派生する）
    pub fn package_dir(&self, base_image: &str, tag: &ImageTag) -> PathBuf {
        self.output_dir.join(self.stem(base_image, tag))
    }

    pub fn tar_path(&self, base_image: &str, tag: &ImageTag) -> PathBuf {
        with_extension(&self.package_dir(base_image, tag), "tar")
    }

    pub fn archive_path(&self, base_image: &str, tag: &ImageTag) -> PathBuf {
        archive_path_for(&self.package_dir(base_image, tag))
    }

    /// `delete` オプションで削除する既存アーカイブのglobパターン
    pub fn delete_pattern(&self, base_image: &str) -> String {
        let prefix = glob::Pattern::escape(&sanitize_base_image(base_image));
        let dir = glob::Pattern::escape(&self.output_dir.to_string_lossy());
        format!("{}/{}_*.{}", dir, prefix, ARCHIVE_EXTENSION)
    }

    pub fn aggregate_dir(&self) -> PathBuf {
        self.output_dir.join(AGGREGATE_DIR)
    }

    pub fn aggregate_archive(&self) -> PathBuf {
        archive_path_for(&self.aggregate_dir())
    }
}

/// ディレクトリ `dir` を圧縮した場合のアーカイブパス（`{dir}.tar.gz`）
pub fn archive_path_for(dir: &Path) -> PathBuf {
    with_extension(dir, ARCHIVE_EXTENSION)
}

// `Path::with_extension` はバージョン番号の `.` を拡張子とみなすため使わない
fn with_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_for_latest() {
        let layout = PackageLayout::new("/out");
        let tag = ImageTag::Latest;

        assert_eq!(layout.stem("api", &tag), "api_latest");
        assert_eq!(layout.tar_path("api", &tag), PathBuf::from("/out/api_latest.tar"));
        assert_eq!(layout.package_dir("api", &tag), PathBuf::from("/out/api_latest"));
        assert_eq!(
            layout.archive_path("api", &tag),
            PathBuf::from("/out/api_latest.tar.gz")
        );
    }

    #[test]
    fn test_pinned_version_keeps_dots() {
        let layout = PackageLayout::new("/out");
        let tag = ImageTag::Pinned("1.0.3".to_string());

        assert_eq!(
            layout.archive_path("api", &tag),
            PathBuf::from("/out/api_1.0.3.tar.gz")
        );
        assert_eq!(
            layout.tar_path("api", &tag),
            PathBuf::from("/out/api_1.0.3.tar")
        );
        assert_eq!(tag.engine_tag("api"), "api:1.0.3");
    }

    #[test]
    fn test_sanitize_registry_style_names() {
        assert_eq!(sanitize_base_image("acme/api"), "acme_api");
        assert_eq!(
            sanitize_base_image("localhost:5000/api"),
            "localhost_5000_api"
        );

        let layout = PackageLayout::new("/out");
        assert_eq!(
            layout.archive_path("acme/api", &ImageTag::Latest),
            PathBuf::from("/out/acme_api_latest.tar.gz")
        );
        // エンジンのタグは元の名前のまま
        assert_eq!(ImageTag::Latest.engine_tag("acme/api"), "acme/api:latest");
    }

    #[test]
    fn test_delete_pattern() {
        let layout = PackageLayout::new("/out");
        assert_eq!(layout.delete_pattern("api"), "/out/api_*.tar.gz");

        // glob の特殊文字はエスケープされる
        let pattern = layout.delete_pattern("api[1]");
        assert!(glob::Pattern::new(&pattern)
            .unwrap()
            .matches("/out/api[1]_latest.tar.gz"));
    }

    #[test]
    fn test_aggregate_paths() {
        let layout = PackageLayout::new("/out");
        assert_eq!(layout.aggregate_dir(), PathBuf::from("/out/all_images"));
        assert_eq!(
            layout.aggregate_archive(),
            PathBuf::from("/out/all_images.tar.gz")
        );
    }
}
