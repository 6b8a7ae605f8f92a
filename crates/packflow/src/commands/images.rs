use colored::Colorize;
use packflow_config::{ApplicationSettings, ConfigStore};

/// 設定済みイメージの一覧を表示
pub fn handle(store: &ConfigStore, settings: &ApplicationSettings) {
    println!("設定ファイル: {}", store.path().display().to_string().cyan());
    println!();

    if settings.images.is_empty() {
        println!("{}", "イメージが設定されていません".dimmed());
        return;
    }

    for image in &settings.images {
        println!(
            "{} {} {}",
            "•".cyan(),
            image.name.bold(),
            format!("({}:{})", image.base_image, image.version).dimmed()
        );
        println!("    コンテキスト: {}", image.context_path.display());
        for volume in &image.volumes {
            println!("    ボリューム: {}", volume.display());
        }
    }

    println!();
    println!(
        "出力先: {}",
        store
            .resolve(&settings.package_settings.output_directory)
            .display()
    );
}
