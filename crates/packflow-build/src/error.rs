use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Dockerfile not found: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Volume not found: {0}")]
    VolumeNotFound(PathBuf),

    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("Compose file not found: {0}")]
    ComposeFileNotFound(PathBuf),

    #[error("Compose command failed: {0}")]
    ComposeFailed(String),

    #[error("Ownership error: {0}")]
    Ownership(String),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Config error: {0}")]
    Config(#[from] packflow_config::ConfigError),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::DockerfileNotFound(path) => {
                format!(
                    "Dockerfileが見つかりません: {}\n\
                     \n\
                     ContextPath に Dockerfile を置いてください。",
                    path.display()
                )
            }
            BuildError::ContextNotFound(path) => {
                format!(
                    "ビルドコンテキストが見つかりません: {}\n\
                     \n\
                     config.json の ContextPath を確認してください。",
                    path.display()
                )
            }
            BuildError::BuildFailed(msg) => {
                format!(
                    "ビルドに失敗しました: {}\n\
                     \n\
                     Dockerfileの内容を確認してください。",
                    msg
                )
            }
            BuildError::VolumeNotFound(path) => {
                format!(
                    "ボリュームが見つかりません: {}\n\
                     \n\
                     config.json の Volumes を確認してください。",
                    path.display()
                )
            }
            BuildError::ComposeFileNotFound(path) => {
                format!(
                    "composeファイルが見つかりません: {}\n\
                     \n\
                     BuildSettings.ComposeFilePath を確認してください。",
                    path.display()
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
