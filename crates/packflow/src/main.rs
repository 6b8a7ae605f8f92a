mod commands;
mod docker;
mod env_check;

use anyhow::Context;
use clap::{Parser, Subcommand};
use packflow_config::ConfigStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "packflow")]
#[command(about = "イメージをビルドして、ボリュームごと持ち運べる形に。", long_about = None)]
struct Cli {
    /// 設定ファイルのパス（省略時は自動検出）
    #[arg(long, global = true, env = "PACKFLOW_CONFIG_PATH")]
    config: Option<PathBuf>,
    /// 詳細なログを出力
    #[arg(short, long, global = true)]
    verbose: bool,
    /// root 権限での実行を必須にする
    #[arg(
        long,
        global = true,
        env = "PACKFLOW_REQUIRE_ROOT",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    require_root: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// イメージをビルドしてパッケージを作成
    Build {
        /// 全イメージをビルドし、all_images.tar.gz にまとめる
        #[arg(long)]
        all: bool,
        /// ビルドするイメージ名
        #[arg(short = 'i', long = "image", value_name = "NAME")]
        images: Vec<String>,
        /// リリースビルド（latest とバージョン固定タグを作成し、バージョンを上げる）
        #[arg(long, value_name = "NAME")]
        release: Vec<String>,
        /// ビルド前に既存のアーカイブを削除
        #[arg(long, value_name = "NAME")]
        delete: Vec<String>,
        /// ボリュームをパッケージに同梱
        #[arg(long, value_name = "NAME")]
        pack_volumes: Vec<String>,
        /// 固定タグに使うバージョンを上書き
        #[arg(
            long,
            value_name = "NAME=VERSION",
            value_parser = commands::build::parse_version_override
        )]
        set_version: Vec<(String, String)>,
        /// 実行結果を JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// 設定済みのイメージを一覧表示
    Images,
    /// テスト環境を操作
    #[command(subcommand)]
    Test(TestCommands),
    /// バージョン情報を表示
    Version,
}

#[derive(Subcommand)]
enum TestCommands {
    /// テスト環境を起動
    Up {
        /// 既存イメージを削除せずに起動
        #[arg(long)]
        skip_existing: bool,
    },
    /// テスト環境を停止
    Down,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("packflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_path = match cli.config {
        Some(path) => path,
        None => packflow_config::find_config_file()?,
    };
    let store = ConfigStore::open(&config_path)
        .with_context(|| format!("設定ファイルを開けません: {}", config_path.display()))?;
    let settings = store
        .read_settings()
        .with_context(|| format!("設定ファイルを読み込めません: {}", config_path.display()))?;
    tracing::debug!("Loaded config from {}", store.path().display());

    match cli.command {
        Commands::Build {
            all,
            images,
            release,
            delete,
            pack_volumes,
            set_version,
            json,
        } => {
            let args = commands::build::BuildArgs {
                all,
                images,
                release,
                delete,
                pack_volumes,
                set_version,
                json,
            };
            commands::build::handle(store, &settings, args, cli.require_root).await?;
        }
        Commands::Images => {
            commands::images::handle(&store, &settings);
        }
        Commands::Test(TestCommands::Up { skip_existing }) => {
            env_check::ensure_environment(cli.require_root).await?;
            commands::test_env::up(&store, &settings, skip_existing).await?;
        }
        Commands::Test(TestCommands::Down) => {
            env_check::ensure_environment(cli.require_root).await?;
            commands::test_env::down(&store, &settings).await?;
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
