use packflow_config::ImageSpec;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// パイプラインの段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// 設定の読み込み・出力ディレクトリの準備
    Prepare,
    Delete,
    Build,
    Save,
    Package,
    Version,
    Persist,
    Aggregate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Prepare => write!(f, "prepare"),
            Phase::Delete => write!(f, "delete"),
            Phase::Build => write!(f, "build"),
            Phase::Save => write!(f, "save"),
            Phase::Package => write!(f, "package"),
            Phase::Version => write!(f, "version"),
            Phase::Persist => write!(f, "persist"),
            Phase::Aggregate => write!(f, "aggregate"),
        }
    }
}

/// 1イメージ・1段階の失敗
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    /// 対象イメージ名（全体に関わる段階では None）
    pub image: Option<String>,
    pub phase: Phase,
    pub message: String,
}

impl StageFailure {
    pub fn new(image: Option<&str>, phase: Phase, message: impl Into<String>) -> Self {
        Self {
            image: image.map(str::to_string),
            phase,
            message: message.into(),
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.image {
            Some(image) => write!(f, "[{}] {}: {}", self.phase, image, self.message),
            None => write!(f, "[{}] {}", self.phase, self.message),
        }
    }
}

/// 1回の実行結果
///
/// 失敗があっても実行自体は完了扱い。`failures` で個別に確認します。
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub failures: Vec<StageFailure>,
    /// 生成された `.tar.gz` のパス
    pub archives: Vec<PathBuf>,
    /// 設定ファイルに書き戻したイメージ一覧
    pub images: Vec<ImageSpec>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures_for(&self, image: &str) -> impl Iterator<Item = &StageFailure> {
        self.failures
            .iter()
            .filter(move |f| f.image.as_deref() == Some(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        let failure = StageFailure::new(Some("api"), Phase::Build, "boom");
        assert_eq!(failure.to_string(), "[build] api: boom");

        let failure = StageFailure::new(None, Phase::Persist, "read-only");
        assert_eq!(failure.to_string(), "[persist] read-only");
    }

    #[test]
    fn test_failures_for() {
        let report = RunReport {
            failures: vec![
                StageFailure::new(Some("api"), Phase::Build, "x"),
                StageFailure::new(Some("web"), Phase::Save, "y"),
                StageFailure::new(Some("api"), Phase::Package, "z"),
            ],
            ..Default::default()
        };

        assert_eq!(report.failures_for("api").count(), 2);
        assert!(!report.is_success());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&Phase::Aggregate).unwrap();
        assert_eq!(json, "\"aggregate\"");
    }
}
