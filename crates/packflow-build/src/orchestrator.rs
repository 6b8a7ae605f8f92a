//! ビルドパイプライン
//!
//! 設定済みの全イメージに対して、次の段階を順に実行します。
//!
//! 1. ビルド（`delete` 指定時は既存アーカイブを先に削除）
//! 2. 保存（エンジンから `{stem}.tar` へ書き出し）
//! 3. パッケージング（tar・ボリューム・manifest を `.tar.gz` に）
//! 4. バージョン更新と設定ファイルへの書き戻し
//! 5. 集約（`--all` 指定時のみ）
//!
//! 個々のイメージの失敗はログに記録して reporter に通知し、処理は止めません。

use crate::engine::{ContainerEngine, ImageHandle};
use crate::error::{BuildError, BuildResult};
use crate::layout::{ImageTag, PackageLayout};
use crate::package::{PackageJob, VolumeSource, aggregate_latest};
use crate::plan::{RunContext, placeholder_tags};
use crate::progress::{ChannelReporter, ProgressEvent, ProgressReporter};
use crate::report::{Phase, RunReport, StageFailure};
use crate::version::bump_version;
use futures_util::StreamExt;
use packflow_config::{ConfigStore, ImageSpec};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// フェーズ1で記録するアーティファクト
#[derive(Debug, Clone)]
pub struct BuiltArtifact {
    pub image_index: usize,
    pub image_name: String,
    pub base_image: String,
    pub tag: ImageTag,
    /// 拡張子なしのパッケージパス
    pub package_path: PathBuf,
    /// 今回ビルドしたエンジン上のタグ（プレースホルダーは None）
    pub engine_tag: Option<String>,
    pub pack_volumes: bool,
    pub volumes: Vec<PathBuf>,
}

/// フェーズ2の結果
#[derive(Debug, Clone)]
pub struct SavedArtifact {
    pub artifact: BuiltArtifact,
    pub tar_path: Option<PathBuf>,
}

/// バックグラウンド実行のハンドル
pub struct RunHandle {
    /// 進捗イベント（実行終了時に `ProgressEvent::Finished` が届く）
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
    task: JoinHandle<RunReport>,
}

impl RunHandle {
    /// 実行完了を待つ
    pub async fn join(self) -> BuildResult<RunReport> {
        Ok(self.task.await?)
    }

    /// イベントを `reporter` に転送しながら完了を待つ
    pub async fn wait_with(mut self, reporter: &dyn ProgressReporter) -> BuildResult<RunReport> {
        while let Some(event) = self.events.recv().await {
            event.forward(reporter);
        }
        self.join().await
    }
}

pub struct BuildOrchestrator {
    engine: Arc<dyn ContainerEngine>,
    store: ConfigStore,
    context: RunContext,
}

impl BuildOrchestrator {
    pub fn new(engine: Arc<dyn ContainerEngine>, store: ConfigStore, context: RunContext) -> Self {
        Self {
            engine,
            store,
            context,
        }
    }

    /// 1回の実行の総ステップ数
    ///
    /// イメージごとにビルド・保存・パッケージ・バージョン更新の4つ、書き戻しで1つ、
    /// `build_all` なら集約で1つ。
    pub fn total_steps(image_count: usize, build_all: bool) -> u64 {
        image_count as u64 * 4 + 1 + u64::from(build_all)
    }

    /// バックグラウンドの tokio タスクで実行
    pub fn spawn(self) -> RunHandle {
        let (reporter, events) = ChannelReporter::channel();
        let task = tokio::spawn(async move { self.run(&reporter).await });
        RunHandle { events, task }
    }

    /// 全フェーズを順に実行
    pub async fn run(&self, reporter: &dyn ProgressReporter) -> RunReport {
        let mut run = Run {
            engine: self.engine.as_ref(),
            store: &self.store,
            context: &self.context,
            layout: PackageLayout::new(self.context.output_dir()),
            reporter,
            report: RunReport::default(),
        };

        let images = match self.store.read_settings() {
            Ok(settings) => settings.images,
            Err(e) => {
                run.fail(None, Phase::Prepare, e.into());
                reporter.close();
                return run.report;
            }
        };

        reporter.start(
            "イメージをビルド中",
            Self::total_steps(images.len(), self.context.build_all()),
        );
        tracing::info!(
            "Starting run for {} image(s), output directory {}",
            images.len(),
            self.context.output_dir().display()
        );

        if let Err(e) = tokio::fs::create_dir_all(self.context.output_dir()).await {
            run.fail(None, Phase::Prepare, e.into());
        }

        let artifacts = run.build_phase(&images).await;
        let saved = run.save_phase(&images, artifacts).await;
        run.package_phase(&images, saved).await;
        run.version_phase(&images);
        if self.context.build_all() {
            run.aggregate_phase(&images).await;
        }

        tracing::info!(
            "Run finished: {} archive(s), {} failure(s)",
            run.report.archives.len(),
            run.report.failures.len()
        );
        reporter.close();
        run.report
    }
}

/// 1回の実行の状態
struct Run<'a> {
    engine: &'a dyn ContainerEngine,
    store: &'a ConfigStore,
    context: &'a RunContext,
    layout: PackageLayout,
    reporter: &'a dyn ProgressReporter,
    report: RunReport,
}

impl Run<'_> {
    fn fail(&mut self, image: Option<&str>, phase: Phase, error: BuildError) {
        let failure = StageFailure::new(image, phase, error.to_string());
        tracing::error!("{}", failure);
        self.reporter.notify(&failure);
        self.report.failures.push(failure);
    }

    fn step(&self, message: String) {
        self.reporter.increment(Some(&message), 1);
    }

    async fn build_phase(&mut self, images: &[ImageSpec]) -> Vec<BuiltArtifact> {
        let context = self.context;
        let mut artifacts = Vec::new();

        for (index, image) in images.iter().enumerate() {
            let options = context.options_for(&image.name);
            if options.delete {
                self.delete_archives(image).await;
            }

            let plan = context.plan_for(image);
            let pinned = context.pinned_version(image);
            tracing::debug!("{}: plan {:?}, pinned version {}", image.name, plan, pinned);

            if plan.is_selected() {
                let context_path = context.resolve(&image.context_path);
                for tag in plan.build_tags(&pinned) {
                    let engine_tag = tag.engine_tag(&image.base_image);
                    tracing::info!("Building {} as {}", image.name, engine_tag);

                    if let Err(e) = self.engine.build(&context_path, &engine_tag).await {
                        self.fail(Some(&image.name), Phase::Build, e);
                        break;
                    }
                    artifacts.push(self.artifact(index, image, tag, Some(engine_tag)));
                }
                self.step(format!("ビルド: {}", image.name));
            } else {
                for tag in placeholder_tags(options.release, &pinned) {
                    artifacts.push(self.artifact(index, image, tag, None));
                }
                self.step(format!("スキップ: {}", image.name));
            }
        }

        artifacts
    }

    fn artifact(
        &self,
        index: usize,
        image: &ImageSpec,
        tag: ImageTag,
        engine_tag: Option<String>,
    ) -> BuiltArtifact {
        BuiltArtifact {
            image_index: index,
            image_name: image.name.clone(),
            base_image: image.base_image.clone(),
            package_path: self.layout.package_dir(&image.base_image, &tag),
            tag,
            engine_tag,
            pack_volumes: self.context.options_for(&image.name).pack_volumes,
            volumes: image.volumes.clone(),
        }
    }

    async fn delete_archives(&mut self, image: &ImageSpec) {
        let pattern = self.layout.delete_pattern(&image.base_image);
        tracing::debug!("Removing archives matching {}", pattern);

        let result = tokio::task::spawn_blocking(move || crate::archive::remove_matching(&pattern))
            .await
            .map_err(BuildError::from)
            .and_then(|removed| removed);

        match result {
            Ok(removed) => {
                tracing::info!("Removed {} archive(s) of {}", removed.len(), image.name)
            }
            Err(e) => self.fail(Some(&image.name), Phase::Delete, e),
        }
    }

    async fn save_phase(
        &mut self,
        images: &[ImageSpec],
        artifacts: Vec<BuiltArtifact>,
    ) -> Vec<SavedArtifact> {
        let mut saved = Vec::with_capacity(artifacts.len());
        let mut pending = artifacts.into_iter().peekable();

        for (index, image) in images.iter().enumerate() {
            while let Some(artifact) = pending.next_if(|a| a.image_index == index) {
                let tar_path = match &artifact.engine_tag {
                    Some(engine_tag) => match self.save_artifact(&artifact, engine_tag).await {
                        Ok(path) => Some(path),
                        Err(e) => {
                            self.fail(Some(&image.name), Phase::Save, e);
                            None
                        }
                    },
                    None => None,
                };

                // バージョン固定タグは保存後にエンジンから外す
                if let (true, Some(engine_tag)) = (artifact.tag.is_pinned(), &artifact.engine_tag) {
                    if let Err(e) = self.engine.remove_image(engine_tag, false).await {
                        self.fail(Some(&image.name), Phase::Save, e);
                    }
                }

                saved.push(SavedArtifact { artifact, tar_path });
            }
            self.step(format!("保存: {}", image.name));
        }

        saved
    }

    async fn save_artifact(
        &self,
        artifact: &BuiltArtifact,
        engine_tag: &str,
    ) -> BuildResult<PathBuf> {
        let handle = self
            .engine
            .get_image(engine_tag)
            .await?
            .ok_or_else(|| BuildError::ImageNotFound(engine_tag.to_string()))?;

        let tar_path = self.layout.tar_path(&artifact.base_image, &artifact.tag);
        tracing::info!("Saving {} to {}", engine_tag, tar_path.display());

        if let Err(e) = self.write_stream(&handle, &tar_path).await {
            // 途中までの tar を残さない
            if let Err(remove_err) = tokio::fs::remove_file(&tar_path).await {
                tracing::debug!(
                    "Failed to remove partial {}: {}",
                    tar_path.display(),
                    remove_err
                );
            }
            return Err(e);
        }

        Ok(tar_path)
    }

    async fn write_stream(&self, handle: &ImageHandle, tar_path: &Path) -> BuildResult<()> {
        let mut file = tokio::fs::File::create(tar_path).await?;
        let mut stream = self.engine.save_image(handle);
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    async fn package_phase(&mut self, images: &[ImageSpec], saved: Vec<SavedArtifact>) {
        let mut pending = saved.into_iter().peekable();

        for (index, image) in images.iter().enumerate() {
            while let Some(SavedArtifact { artifact, tar_path }) =
                pending.next_if(|s| s.artifact.image_index == index)
            {
                let job = self.package_job(artifact, tar_path);
                if job.is_empty() {
                    continue;
                }

                let result = tokio::task::spawn_blocking(move || job.run())
                    .await
                    .map_err(BuildError::from)
                    .and_then(|archive| archive);

                match result {
                    Ok(Some(archive)) => self.report.archives.push(archive),
                    Ok(None) => {}
                    Err(e) => self.fail(Some(&image.name), Phase::Package, e),
                }
            }
            self.step(format!("パッケージ: {}", image.name));
        }
    }

    fn package_job(&self, artifact: BuiltArtifact, tar_path: Option<PathBuf>) -> PackageJob {
        let volumes = if artifact.pack_volumes {
            artifact
                .volumes
                .into_iter()
                .map(|original| VolumeSource {
                    source: self.context.resolve(&original),
                    original,
                })
                .collect()
        } else {
            Vec::new()
        };

        PackageJob {
            package_dir: artifact.package_path,
            saved_tar: tar_path,
            volumes,
            ownership: self.context.ownership().clone(),
        }
    }

    fn version_phase(&mut self, images: &[ImageSpec]) {
        let context = self.context;
        let mut updated = Vec::with_capacity(images.len());

        for image in images {
            let mut image = image.clone();
            // 上書き指定は固定タグにのみ使い、更新は保存済みのバージョンから行う
            if context.options_for(&image.name).release {
                match bump_version(&image.version) {
                    Ok(next) => {
                        tracing::info!("{}: version {} -> {}", image.name, image.version, next);
                        image.version = next;
                    }
                    Err(e) => self.fail(Some(&image.name), Phase::Version, e),
                }
            }
            self.step(format!("バージョン: {}", image.name));
            updated.push(image);
        }

        if let Err(e) = self.store.write_images(&updated) {
            self.fail(None, Phase::Persist, e.into());
        }
        self.step("設定ファイルを保存".to_string());
        self.report.images = updated;
    }

    async fn aggregate_phase(&mut self, images: &[ImageSpec]) {
        let layout = self.layout.clone();
        let images = images.to_vec();
        let ownership = self.context.ownership().clone();

        let result = tokio::task::spawn_blocking(move || {
            let mut copy_failures = Vec::new();
            let archive = aggregate_latest(&layout, &images, &ownership, |image, e| {
                copy_failures.push((image.name.clone(), e))
            });
            (archive, copy_failures)
        })
        .await;

        match result {
            Ok((archive, copy_failures)) => {
                for (name, e) in copy_failures {
                    self.fail(Some(&name), Phase::Aggregate, e);
                }
                match archive {
                    Ok(path) => {
                        tracing::info!("Created aggregate archive {}", path.display());
                        self.report.archives.push(path);
                    }
                    Err(e) => self.fail(None, Phase::Aggregate, e),
                }
            }
            Err(e) => self.fail(None, Phase::Aggregate, e.into()),
        }
        self.step("all_images を作成".to_string());
    }
}
