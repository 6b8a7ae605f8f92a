#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use packflow_build::{BuildError, BuildResult, ContainerEngine, ImageHandle};
use packflow_config::{ConfigStore, ImageSpec};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// メモリ上でイメージを管理するエンジン
#[derive(Default)]
pub struct FakeEngine {
    /// ビルドに失敗させるコンテキストディレクトリ名
    failing_contexts: HashSet<String>,
    /// `get_image` が None を返す参照
    hidden: HashSet<String>,
    failing_removal: bool,
    images: Mutex<HashMap<String, Vec<u8>>>,
    pub builds: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, context_dir_name: &str) -> Self {
        self.failing_contexts.insert(context_dir_name.to_string());
        self
    }

    /// ビルドは成功するが `get_image` では見つからない
    pub fn hiding(mut self, reference: &str) -> Self {
        self.hidden.insert(reference.to_string());
        self
    }

    /// `remove_image` を常に失敗させる
    pub fn failing_removal(mut self) -> Self {
        self.failing_removal = true;
        self
    }

    pub fn builds(&self) -> Vec<String> {
        self.builds.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    pub fn has_image(&self, reference: &str) -> bool {
        self.images.lock().unwrap().contains_key(reference)
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn build(&self, context_path: &Path, tag: &str) -> BuildResult<()> {
        let name = context_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.failing_contexts.contains(&name) {
            return Err(BuildError::BuildFailed(format!("{} failed", tag)));
        }

        self.builds.lock().unwrap().push(tag.to_string());
        // イメージの中身はタグから決まる
        self.images
            .lock()
            .unwrap()
            .insert(tag.to_string(), format!("image:{}", tag).into_bytes());
        Ok(())
    }

    async fn get_image(&self, reference: &str) -> BuildResult<Option<ImageHandle>> {
        if self.hidden.contains(reference) {
            return Ok(None);
        }
        Ok(self
            .images
            .lock()
            .unwrap()
            .contains_key(reference)
            .then(|| ImageHandle {
                id: format!("sha256:{}", reference),
                reference: reference.to_string(),
                tags: vec![reference.to_string()],
            }))
    }

    async fn remove_image(&self, reference: &str, _force: bool) -> BuildResult<()> {
        if self.failing_removal {
            return Err(BuildError::ImageNotFound(reference.to_string()));
        }
        self.removed.lock().unwrap().push(reference.to_string());
        self.images.lock().unwrap().remove(reference);
        Ok(())
    }

    fn save_image(&self, image: &ImageHandle) -> BoxStream<'static, BuildResult<Bytes>> {
        let content = self
            .images
            .lock()
            .unwrap()
            .get(&image.reference)
            .cloned()
            .unwrap_or_default();
        // 2チャンクに分けて返す
        let (head, tail) = content.split_at(content.len() / 2);
        let chunks = vec![
            Ok(Bytes::copy_from_slice(head)),
            Ok(Bytes::copy_from_slice(tail)),
        ];
        stream::iter(chunks).boxed()
    }

    async fn list_images(&self, reference_filter: &str) -> BuildResult<Vec<ImageHandle>> {
        Ok(self
            .images
            .lock()
            .unwrap()
            .keys()
            .filter(|reference| reference.starts_with(reference_filter))
            .map(|reference| ImageHandle {
                id: format!("sha256:{}", reference),
                reference: reference.clone(),
                tags: vec![reference.clone()],
            })
            .collect())
    }
}

/// 一時ディレクトリ上のプロジェクト
pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("packages")
    }

    /// Dockerfile を含むコンテキストディレクトリを作成
    pub fn context(&self, name: &str) -> PathBuf {
        let dir = self.root().join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Dockerfile"), "FROM scratch\n").unwrap();
        dir
    }

    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// config.json を書き出して開く
    pub fn write_config(&self, images: &[ImageSpec]) -> ConfigStore {
        let document = json!({
            "ApplicationSettings": {
                "Images": images,
                "PackageSettings": { "OutputDirectory": "./packages" },
                "BuildSettings": { "ComposeFilePath": "./compose.yaml" }
            },
            "Logging": { "Level": "debug" }
        });
        let path = self.root().join("config.json");
        fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();
        ConfigStore::open(path).unwrap()
    }

    pub fn read_images(&self) -> Vec<ImageSpec> {
        ConfigStore::open(self.root().join("config.json"))
            .unwrap()
            .read_settings()
            .unwrap()
            .images
    }

    /// 出力ディレクトリ直下のファイル名一覧（ソート済み）
    pub fn outputs(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.output_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

/// アーカイブ内のエントリ名一覧
pub fn archive_entries(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).unwrap();
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    archive
        .entries()
        .unwrap()
        .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
        .collect()
}

/// アーカイブ内の1ファイルの内容
pub fn archive_file(path: &Path, name: &str) -> Option<Vec<u8>> {
    use std::io::Read;

    let file = fs::File::open(path).unwrap();
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        if entry.path().unwrap().to_string_lossy() == name {
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            return Some(content);
        }
    }
    None
}
