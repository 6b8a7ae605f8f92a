use colored::Colorize;
use packflow_build::DockerEngine;

fn print_connection_error(cause: &dyn std::fmt::Display) {
    eprintln!();
    eprintln!("{}", "✗ Docker接続エラー".red().bold());
    eprintln!();
    eprintln!("{}", "原因:".yellow());
    eprintln!("  {}", cause);
    eprintln!();
    eprintln!("{}", "解決方法:".yellow());
    eprintln!("  • Dockerが起動しているか確認してください");
    eprintln!("  • docker ps コマンドが正常に動作するか確認してください");
    eprintln!("  • ソケットへのアクセス権限（docker グループ）を確認してください");
}

/// Docker に接続し、失敗時は対処方法を表示する
pub async fn init_engine_with_error_handling() -> anyhow::Result<DockerEngine> {
    match DockerEngine::connect().await {
        Ok(engine) => Ok(engine),
        Err(e) => {
            print_connection_error(&e);
            Err(anyhow::anyhow!("Docker接続に失敗しました"))
        }
    }
}
