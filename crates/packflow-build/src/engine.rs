//! コンテナエンジンクライアント
//!
//! オーケストレーターはこのトレイト越しにのみエンジンを操作します。
//! 実運用では bollard 経由で Docker を呼び出す [`DockerEngine`] を使用します。

use crate::context::ContextBuilder;
use crate::error::{BuildError, BuildResult};
use async_trait::async_trait;
use bollard::Docker;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::path::Path;

/// エンジンが保持するイメージへの参照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    pub id: String,
    /// 取得時に使った参照（`name:tag`）
    pub reference: String,
    pub tags: Vec<String>,
}

/// コンテナエンジンの操作
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// コンテキストディレクトリからイメージをビルドし `tag` を付ける
    async fn build(&self, context_path: &Path, tag: &str) -> BuildResult<()>;

    /// 参照からイメージを取得（存在しない場合は None）
    async fn get_image(&self, reference: &str) -> BuildResult<Option<ImageHandle>>;

    async fn remove_image(&self, reference: &str, force: bool) -> BuildResult<()>;

    /// イメージの tar 表現をチャンク単位で返す
    fn save_image(&self, image: &ImageHandle) -> BoxStream<'static, BuildResult<Bytes>>;

    /// `reference` フィルタに一致するイメージ一覧
    async fn list_images(&self, reference_filter: &str) -> BuildResult<Vec<ImageHandle>>;
}

/// bollard による Docker 実装
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// ローカルの Docker デーモンに接続し、疎通を確認する
    pub async fn connect() -> BuildResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        docker.ping().await?;
        Ok(Self::new(docker))
    }

    /// ビルド出力の処理
    fn handle_build_output(&self, output: bollard::models::BuildInfo) -> BuildResult<()> {
        if let Some(stream) = output.stream {
            let line = stream.trim_end();
            if !line.is_empty() {
                tracing::debug!("{}", line);
            }
        }

        if let Some(error) = output.error {
            return Err(BuildError::BuildFailed(error));
        }

        if let Some(error_detail) = output.error_detail {
            let error_msg = error_detail
                .message
                .unwrap_or_else(|| "Unknown build error".to_string());
            return Err(BuildError::BuildFailed(error_msg));
        }

        if let Some(status) = output.status {
            tracing::debug!("{}", status);
        }

        Ok(())
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn build(&self, context_path: &Path, tag: &str) -> BuildResult<()> {
        tracing::info!("Building image: {}", tag);

        let context_dir = context_path.to_path_buf();
        let context_data =
            tokio::task::spawn_blocking(move || ContextBuilder::create_context(&context_dir))
                .await??;

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile",
            t: tag,
            rm: true,      // 中間コンテナを削除
            forcerm: true, // ビルド失敗時も中間コンテナを削除
            ..Default::default()
        };

        tracing::debug!("Build options: {:?}", options);

        use http_body_util::{Either, Full};
        let body = Full::new(Bytes::from(context_data));
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        while let Some(msg) = stream.next().await {
            let output = msg?;
            self.handle_build_output(output)?;
        }

        tracing::info!("Successfully built: {}", tag);
        Ok(())
    }

    async fn get_image(&self, reference: &str) -> BuildResult<Option<ImageHandle>> {
        match self.docker.inspect_image(reference).await {
            Ok(inspect) => Ok(Some(ImageHandle {
                id: inspect.id.unwrap_or_default(),
                reference: reference.to_string(),
                tags: inspect.repo_tags.unwrap_or_default(),
            })),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(BuildError::DockerConnection(e)),
        }
    }

    async fn remove_image(&self, reference: &str, force: bool) -> BuildResult<()> {
        let options = bollard::query_parameters::RemoveImageOptions {
            force,
            ..Default::default()
        };

        match self
            .docker
            .remove_image(reference, Some(options), None)
            .await
        {
            Ok(_) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(BuildError::ImageNotFound(reference.to_string())),
            Err(e) => Err(BuildError::DockerConnection(e)),
        }
    }

    fn save_image(&self, image: &ImageHandle) -> BoxStream<'static, BuildResult<Bytes>> {
        // タグ付きの参照で取得すると tar 内に RepoTags が保持される
        self.docker
            .export_image(&image.reference)
            .map(|chunk| chunk.map_err(BuildError::from))
            .boxed()
    }

    async fn list_images(&self, reference_filter: &str) -> BuildResult<Vec<ImageHandle>> {
        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![reference_filter.to_string()]);

        #[allow(deprecated)]
        let options = bollard::image::ListImagesOptions::<String> {
            all: true,
            filters,
            ..Default::default()
        };

        let images = self.docker.list_images(Some(options)).await?;

        Ok(images
            .into_iter()
            .map(|summary| ImageHandle {
                reference: summary
                    .repo_tags
                    .first()
                    .cloned()
                    .unwrap_or_else(|| summary.id.clone()),
                id: summary.id,
                tags: summary.repo_tags,
            })
            .collect())
    }
}
