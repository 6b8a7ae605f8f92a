//! 進捗通知
//!
//! オーケストレーターは [`ProgressReporter`] にだけ進捗を伝えます。
//! バックグラウンド実行では [`ChannelReporter`] がイベントをチャネルに流し、
//! 呼び出し側が [`BuildProgress`] などで表示します。

use crate::report::StageFailure;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

/// 段階ごとのステップ数を受け取る進捗表示
pub trait ProgressReporter: Send + Sync {
    fn start(&self, title: &str, total_steps: u64);

    fn increment(&self, message: Option<&str>, amount: u64);

    /// 個別の失敗をオペレーターに通知
    fn notify(&self, failure: &StageFailure);

    /// 実行完了
    fn close(&self);
}

/// チャネル経由で流れる進捗イベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { title: String, total_steps: u64 },
    Step { message: Option<String>, amount: u64 },
    Failure(StageFailure),
    Finished,
}

impl ProgressEvent {
    /// イベントを別の reporter に転送
    pub fn forward(&self, reporter: &dyn ProgressReporter) {
        match self {
            ProgressEvent::Started { title, total_steps } => reporter.start(title, *total_steps),
            ProgressEvent::Step { message, amount } => {
                reporter.increment(message.as_deref(), *amount)
            }
            ProgressEvent::Failure(failure) => reporter.notify(failure),
            ProgressEvent::Finished => reporter.close(),
        }
    }
}

/// 呼び出しをイベントに変換してチャネルへ送る reporter
pub struct ChannelReporter {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelReporter {
    pub fn new(sender: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    fn send(&self, event: ProgressEvent) {
        // 受信側が先に閉じられても実行は続ける
        if self.sender.send(event).is_err() {
            tracing::trace!("Progress receiver dropped");
        }
    }
}

impl ProgressReporter for ChannelReporter {
    fn start(&self, title: &str, total_steps: u64) {
        self.send(ProgressEvent::Started {
            title: title.to_string(),
            total_steps,
        });
    }

    fn increment(&self, message: Option<&str>, amount: u64) {
        self.send(ProgressEvent::Step {
            message: message.map(str::to_string),
            amount,
        });
    }

    fn notify(&self, failure: &StageFailure) {
        self.send(ProgressEvent::Failure(failure.clone()));
    }

    fn close(&self) {
        self.send(ProgressEvent::Finished);
    }
}

/// 何も表示しない reporter
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn start(&self, _title: &str, _total_steps: u64) {}
    fn increment(&self, _message: Option<&str>, _amount: u64) {}
    fn notify(&self, _failure: &StageFailure) {}
    fn close(&self) {}
}

/// ターミナル用のプログレスバー
pub struct BuildProgress {
    progress_bar: ProgressBar,
}

impl BuildProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );
        Self { progress_bar: pb }
    }

    /// テストやパイプ出力向けに描画しないバー
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
        }
    }

    pub fn position(&self) -> u64 {
        self.progress_bar.position()
    }

    pub fn length(&self) -> Option<u64> {
        self.progress_bar.length()
    }
}

impl Default for BuildProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BuildProgress {
    fn start(&self, title: &str, total_steps: u64) {
        self.progress_bar.set_length(total_steps);
        self.progress_bar.set_position(0);
        self.progress_bar.set_message(title.to_string());
    }

    fn increment(&self, message: Option<&str>, amount: u64) {
        if let Some(message) = message {
            self.progress_bar.set_message(message.to_string());
        }
        self.progress_bar.inc(amount);
    }

    fn notify(&self, failure: &StageFailure) {
        self.progress_bar
            .println(format!("  {} {}", "✗".red().bold(), failure));
    }

    fn close(&self) {
        self.progress_bar.finish_with_message("Completed ✓");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Phase;

    #[test]
    fn test_channel_reporter_events() {
        let (reporter, mut receiver) = ChannelReporter::channel();

        reporter.start("Building images", 10);
        reporter.increment(Some("api built"), 1);
        reporter.notify(&StageFailure::new(Some("web"), Phase::Build, "boom"));
        reporter.close();

        assert_eq!(
            receiver.try_recv().unwrap(),
            ProgressEvent::Started {
                title: "Building images".into(),
                total_steps: 10
            }
        );
        assert_eq!(
            receiver.try_recv().unwrap(),
            ProgressEvent::Step {
                message: Some("api built".into()),
                amount: 1
            }
        );
        assert!(matches!(
            receiver.try_recv().unwrap(),
            ProgressEvent::Failure(_)
        ));
        assert_eq!(receiver.try_recv().unwrap(), ProgressEvent::Finished);
    }

    #[test]
    fn test_channel_reporter_survives_dropped_receiver() {
        let (reporter, receiver) = ChannelReporter::channel();
        drop(receiver);
        reporter.increment(None, 1);
        reporter.close();
    }

    #[test]
    fn test_forward_into_progress_bar() {
        let bar = BuildProgress::hidden();

        ProgressEvent::Started {
            title: "Building".into(),
            total_steps: 6,
        }
        .forward(&bar);
        ProgressEvent::Step {
            message: None,
            amount: 2,
        }
        .forward(&bar);
        ProgressEvent::Step {
            message: Some("saved".into()),
            amount: 1,
        }
        .forward(&bar);

        assert_eq!(bar.length(), Some(6));
        assert_eq!(bar.position(), 3);
    }
}
