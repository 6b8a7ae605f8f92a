//! テスト環境の起動・停止
//!
//! compose コマンドで、ビルドしたイメージを使うテスト環境を操作します。

use crate::engine::ContainerEngine;
use crate::error::{BuildError, BuildResult};
use packflow_config::{ApplicationSettings, ConfigStore};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// 呼び出し側が所有する compose セッション
pub struct ComposeSession {
    engine: Arc<dyn ContainerEngine>,
    compose_file: PathBuf,
    /// `docker compose` のように複数語でもよい
    compose_command: String,
    base_images: Vec<String>,
}

impl ComposeSession {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        compose_file: impl Into<PathBuf>,
        compose_command: impl Into<String>,
        base_images: Vec<String>,
    ) -> Self {
        Self {
            engine,
            compose_file: compose_file.into(),
            compose_command: compose_command.into(),
            base_images,
        }
    }

    /// 設定ファイルの BuildSettings から作成
    pub fn from_settings(
        engine: Arc<dyn ContainerEngine>,
        store: &ConfigStore,
        settings: &ApplicationSettings,
    ) -> Self {
        Self::new(
            engine,
            store.resolve(&settings.build_settings.compose_file_path),
            settings.build_settings.compose_command.clone(),
            settings.base_images(),
        )
    }

    pub fn compose_file(&self) -> &Path {
        &self.compose_file
    }

    /// テスト環境を起動
    ///
    /// `skip_existing` でなければ、設定済みベースイメージの既存イメージを先に強制削除します。
    pub async fn up(&self, skip_existing: bool) -> BuildResult<()> {
        self.ensure_compose_file()?;

        if !skip_existing {
            self.remove_existing_images().await;
        }

        tracing::info!("Starting test environment from {}", self.compose_file.display());
        self.run_compose(&["up", "-d"]).await
    }

    /// テスト環境を停止
    pub async fn down(&self) -> BuildResult<()> {
        self.ensure_compose_file()?;

        tracing::info!("Stopping test environment from {}", self.compose_file.display());
        self.run_compose(&["down"]).await
    }

    fn ensure_compose_file(&self) -> BuildResult<()> {
        if !self.compose_file.is_file() {
            return Err(BuildError::ComposeFileNotFound(self.compose_file.clone()));
        }
        Ok(())
    }

    async fn remove_existing_images(&self) {
        for base_image in &self.base_images {
            let images = match self.engine.list_images(base_image).await {
                Ok(images) => images,
                Err(e) => {
                    tracing::error!("Failed to list images for {}: {}", base_image, e);
                    continue;
                }
            };

            for image in images {
                match self.engine.remove_image(&image.id, true).await {
                    Ok(()) => tracing::info!("Removed image {} ({})", image.reference, image.id),
                    Err(e) => tracing::error!("Failed to remove image {}: {}", image.id, e),
                }
            }
        }
    }

    /// compose コマンドのプログラムと引数
    fn command_line(&self, action: &[&str]) -> BuildResult<(String, Vec<OsString>)> {
        let mut words = self.compose_command.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| BuildError::ComposeFailed("compose command is empty".to_string()))?
            .to_string();

        let mut args: Vec<OsString> = words.map(OsString::from).collect();
        args.push("-f".into());
        args.push(self.compose_file.clone().into_os_string());
        args.extend(action.iter().map(OsString::from));

        Ok((program, args))
    }

    async fn run_compose(&self, action: &[&str]) -> BuildResult<()> {
        let (program, args) = self.command_line(action)?;
        tracing::debug!("Running: {} {:?}", program, args);

        let output = Command::new(&program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::ComposeFailed(stderr.trim().to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ImageHandle;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream::{self, BoxStream, StreamExt};
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingEngine {
        removed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContainerEngine for RecordingEngine {
        async fn build(&self, _context_path: &Path, _tag: &str) -> BuildResult<()> {
            Ok(())
        }

        async fn get_image(&self, _reference: &str) -> BuildResult<Option<ImageHandle>> {
            Ok(None)
        }

        async fn remove_image(&self, reference: &str, _force: bool) -> BuildResult<()> {
            self.removed.lock().unwrap().push(reference.to_string());
            Ok(())
        }

        fn save_image(&self, _image: &ImageHandle) -> BoxStream<'static, BuildResult<Bytes>> {
            stream::empty().boxed()
        }

        async fn list_images(&self, reference_filter: &str) -> BuildResult<Vec<ImageHandle>> {
            Ok(vec![ImageHandle {
                id: format!("sha256:{}", reference_filter),
                reference: format!("{}:latest", reference_filter),
                tags: vec![format!("{}:latest", reference_filter)],
            }])
        }
    }

    fn session(file: &Path, command: &str, engine: Arc<RecordingEngine>) -> ComposeSession {
        ComposeSession::new(engine, file, command, vec!["acme-api".into(), "acme-web".into()])
    }

    #[test]
    fn test_command_line_multi_word() {
        let engine = Arc::new(RecordingEngine::default());
        let session = session(Path::new("/p/compose.yaml"), "docker compose", engine);

        let (program, args) = session.command_line(&["up", "-d"]).unwrap();
        assert_eq!(program, "docker");
        assert_eq!(
            args,
            vec!["compose", "-f", "/p/compose.yaml", "up", "-d"]
                .into_iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_command_line_empty_command() {
        let engine = Arc::new(RecordingEngine::default());
        let session = session(Path::new("/p/compose.yaml"), "  ", engine);
        assert!(matches!(
            session.command_line(&["down"]),
            Err(BuildError::ComposeFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_up_requires_compose_file() {
        let temp = tempdir().unwrap();
        let engine = Arc::new(RecordingEngine::default());
        let session = session(&temp.path().join("compose.yaml"), "true", engine.clone());

        let result = session.up(false).await;

        assert!(matches!(result, Err(BuildError::ComposeFileNotFound(_))));
        // 失敗時はイメージを削除しない
        assert!(engine.removed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_up_removes_existing_images() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("compose.yaml");
        std::fs::write(&file, "services: {}\n").unwrap();
        let engine = Arc::new(RecordingEngine::default());

        // `true` は引数を無視して成功する
        session(&file, "true", engine.clone()).up(false).await.unwrap();

        assert_eq!(
            *engine.removed.lock().unwrap(),
            vec!["sha256:acme-api", "sha256:acme-web"]
        );
    }

    #[tokio::test]
    async fn test_up_skip_existing() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("compose.yaml");
        std::fs::write(&file, "services: {}\n").unwrap();
        let engine = Arc::new(RecordingEngine::default());

        session(&file, "true", engine.clone()).up(true).await.unwrap();

        assert!(engine.removed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_down_reports_failure() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("compose.yaml");
        std::fs::write(&file, "services: {}\n").unwrap();
        let engine = Arc::new(RecordingEngine::default());

        let result = session(&file, "false", engine).down().await;

        assert!(matches!(result, Err(BuildError::ComposeFailed(_))));
    }
}
