//! packflow のビルド・パッケージング機能
//!
//! 設定済みのイメージをビルドしてエンジンから保存し、ボリュームと一緒に
//! `.tar.gz` パッケージにまとめます。テスト環境の起動・停止も扱います。

pub mod archive;
pub mod compose;
pub mod context;
pub mod engine;
pub mod error;
pub mod layout;
pub mod orchestrator;
pub mod package;
pub mod plan;
pub mod progress;
pub mod report;
pub mod version;

pub use compose::ComposeSession;
pub use context::ContextBuilder;
pub use engine::{ContainerEngine, DockerEngine, ImageHandle};
pub use error::{BuildError, BuildResult};
pub use layout::{ImageTag, PackageLayout};
pub use orchestrator::{BuildOrchestrator, RunHandle};
pub use plan::{BuildPlan, ImageOptions, RunContext};
pub use progress::{BuildProgress, ChannelReporter, NoopReporter, ProgressEvent, ProgressReporter};
pub use report::{Phase, RunReport, StageFailure};
pub use version::bump_version;
