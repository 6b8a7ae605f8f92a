//! 実行環境のチェック
//!
//! Docker を操作するコマンドの前に呼び出します。

use tokio::process::Command;

/// POSIX 環境・docker コマンド・（必要なら）root 権限を確認
pub async fn ensure_environment(require_root: bool) -> anyhow::Result<()> {
    if !cfg!(unix) {
        anyhow::bail!("packflow は POSIX 環境でのみ動作します");
    }

    let which = Command::new("which").arg("docker").output().await;
    match which {
        Ok(output) if output.status.success() => {
            tracing::debug!(
                "docker found at {}",
                String::from_utf8_lossy(&output.stdout).trim()
            );
        }
        _ => anyhow::bail!("docker コマンドが見つかりません。PATH を確認してください"),
    }

    if require_root && !nix::unistd::geteuid().is_root() {
        anyhow::bail!("root 権限で実行してください（sudo packflow ...）");
    }

    Ok(())
}
