use crate::docker;
use crate::env_check;
use colored::Colorize;
use packflow_build::version::validate_version;
use packflow_build::{BuildOrchestrator, BuildProgress, ImageOptions, RunContext, RunReport};
use packflow_config::{ApplicationSettings, ConfigStore};
use std::collections::HashMap;
use std::sync::Arc;

pub struct BuildArgs {
    pub all: bool,
    pub images: Vec<String>,
    pub release: Vec<String>,
    pub delete: Vec<String>,
    pub pack_volumes: Vec<String>,
    pub set_version: Vec<(String, String)>,
    pub json: bool,
}

/// `NAME=VERSION` 形式の引数を解析
pub fn parse_version_override(value: &str) -> Result<(String, String), String> {
    let (name, version) = value
        .split_once('=')
        .ok_or_else(|| format!("'{}' は NAME=VERSION の形式ではありません", value))?;
    let (name, version) = (name.trim(), version.trim());

    if name.is_empty() {
        return Err(format!("'{}' にイメージ名がありません", value));
    }
    validate_version(version).map_err(|e| e.to_string())?;

    Ok((name.to_string(), version.to_string()))
}

/// 引数からイメージごとのオプションを組み立てる
///
/// `--release` はそのイメージのビルドも含む。未知のイメージ名はエラー。
pub fn collect_options(
    settings: &ApplicationSettings,
    args: &BuildArgs,
) -> anyhow::Result<HashMap<String, ImageOptions>> {
    let mut options: HashMap<String, ImageOptions> = HashMap::new();

    for name in &args.images {
        entry(&mut options, settings, name)?.build = true;
    }
    for name in &args.release {
        let opts = entry(&mut options, settings, name)?;
        opts.build = true;
        opts.release = true;
    }
    for name in &args.delete {
        entry(&mut options, settings, name)?.delete = true;
    }
    for name in &args.pack_volumes {
        entry(&mut options, settings, name)?.pack_volumes = true;
    }
    for (name, version) in &args.set_version {
        entry(&mut options, settings, name)?.version = Some(version.clone());
    }

    Ok(options)
}

fn entry<'a>(
    options: &'a mut HashMap<String, ImageOptions>,
    settings: &ApplicationSettings,
    name: &str,
) -> anyhow::Result<&'a mut ImageOptions> {
    if settings.find_image(name).is_none() {
        anyhow::bail!("イメージ '{}' が見つかりません", name);
    }
    Ok(options.entry(name.to_string()).or_default())
}

/// ビルドコマンドを処理
pub async fn handle(
    store: ConfigStore,
    settings: &ApplicationSettings,
    args: BuildArgs,
    require_root: bool,
) -> anyhow::Result<()> {
    let options = collect_options(settings, &args)?;
    if !args.all && options.is_empty() {
        anyhow::bail!("対象がありません。--all または -i <NAME> を指定してください");
    }

    env_check::ensure_environment(require_root).await?;

    println!("{}", "イメージをビルド中...".blue());
    let mut names: Vec<&String> = options.keys().collect();
    names.sort();
    if args.all {
        println!("  対象: {}", "全イメージ".cyan());
    } else {
        for name in names {
            println!("  {} {}", "•".cyan(), name);
        }
    }

    let engine = Arc::new(docker::init_engine_with_error_handling().await?);
    let context = RunContext::from_settings(&store, settings, args.all, options);
    tracing::debug!("Output directory: {}", context.output_dir().display());

    let progress = BuildProgress::new();
    let report = BuildOrchestrator::new(engine, store, context)
        .spawn()
        .wait_with(&progress)
        .await?;

    print_summary(&report);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn print_summary(report: &RunReport) {
    println!();
    for archive in &report.archives {
        println!("  {} {}", "✓".green(), archive.display());
    }

    if report.is_success() {
        println!("{}", "✓ すべてのパッケージを作成しました".green().bold());
        return;
    }

    println!();
    println!(
        "{}",
        format!("✗ {} 件の失敗がありました", report.failures.len())
            .red()
            .bold()
    );
    for failure in &report.failures {
        println!("  • {}", failure);
    }
}
