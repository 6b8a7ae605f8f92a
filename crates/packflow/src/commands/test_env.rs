use crate::docker;
use colored::Colorize;
use packflow_build::ComposeSession;
use packflow_config::{ApplicationSettings, ConfigStore};
use std::sync::Arc;

async fn session(
    store: &ConfigStore,
    settings: &ApplicationSettings,
) -> anyhow::Result<ComposeSession> {
    let engine = Arc::new(docker::init_engine_with_error_handling().await?);
    Ok(ComposeSession::from_settings(engine, store, settings))
}

/// テスト環境を起動
pub async fn up(
    store: &ConfigStore,
    settings: &ApplicationSettings,
    skip_existing: bool,
) -> anyhow::Result<()> {
    let session = session(store, settings).await?;
    println!(
        "{} {}",
        "テスト環境を起動中...".blue(),
        session.compose_file().display()
    );
    if !skip_existing {
        println!("  既存のイメージを削除します");
    }

    session
        .up(skip_existing)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("{}", "✓ テスト環境を起動しました".green());
    Ok(())
}

/// テスト環境を停止
pub async fn down(store: &ConfigStore, settings: &ApplicationSettings) -> anyhow::Result<()> {
    let session = session(store, settings).await?;
    println!(
        "{} {}",
        "テスト環境を停止中...".blue(),
        session.compose_file().display()
    );

    session
        .down()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    println!("{}", "✓ テスト環境を停止しました".green());
    Ok(())
}
