//! パッケージの組み立て
//!
//! 保存済みの tar とボリュームを1つのディレクトリにまとめ、`.tar.gz` に圧縮します。
//! 同期処理なのでオーケストレーターからは `spawn_blocking` で実行します。

use crate::archive;
use crate::error::{BuildError, BuildResult};
use crate::layout::{ImageTag, MANIFEST_FILE, PackageLayout};
use packflow_config::{ImageSpec, Ownership, OwnershipPolicy};
use std::fs;
use std::path::{Path, PathBuf};

/// 同梱するボリューム
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSource {
    /// 実際にコピーするパス（プロジェクトルート基準で解決済み）
    pub source: PathBuf,
    /// 設定ファイルに書かれていたパス（manifest に記録）
    pub original: PathBuf,
}

/// 1アーティファクト分のパッケージング
#[derive(Debug, Clone)]
pub struct PackageJob {
    pub package_dir: PathBuf,
    pub saved_tar: Option<PathBuf>,
    pub volumes: Vec<VolumeSource>,
    pub ownership: Ownership,
}

impl PackageJob {
    /// 保存済み tar も同梱ボリュームもなければ何も作らない
    pub fn is_empty(&self) -> bool {
        self.saved_tar.is_none() && self.volumes.is_empty()
    }

    /// パッケージを作成し、生成したアーカイブのパスを返す
    ///
    /// 何も同梱するものがない場合は `Ok(None)`。
    pub fn run(&self) -> BuildResult<Option<PathBuf>> {
        if self.is_empty() {
            tracing::debug!("Nothing to package for {}", self.package_dir.display());
            return Ok(None);
        }

        // 中断された前回の実行が残したディレクトリは使わない
        archive::remove_dir(&self.package_dir)?;
        fs::create_dir_all(&self.package_dir)?;

        let archive_path = match self.assemble() {
            Ok(path) => path,
            Err(e) => {
                if let Err(remove_err) = archive::remove_dir(&self.package_dir) {
                    tracing::debug!(
                        "Failed to remove {}: {}",
                        self.package_dir.display(),
                        remove_err
                    );
                }
                return Err(e);
            }
        };
        archive::remove_dir(&self.package_dir)?;
        tracing::info!("Created package {}", archive_path.display());

        apply_ownership(&archive_path, &self.ownership)?;

        Ok(Some(archive_path))
    }

    /// 空のパッケージディレクトリに中身を揃えて圧縮する
    fn assemble(&self) -> BuildResult<PathBuf> {
        if let Some(tar) = &self.saved_tar {
            archive::move_into(tar, &self.package_dir)?;
        }

        if !self.volumes.is_empty() {
            self.copy_volumes()?;
        }

        archive::compress_dir(&self.package_dir)
    }

    fn copy_volumes(&self) -> BuildResult<()> {
        let mut manifest = String::new();

        for (index, volume) in self.volumes.iter().enumerate() {
            let volume_dir = self.package_dir.join(format!("volume_{}", index));
            archive::copy_volume(&volume.source, &volume_dir)?;

            manifest.push_str(&format!(
                "volume_{}:{}\n",
                index,
                volume.original.display()
            ));
        }

        fs::write(self.package_dir.join(MANIFEST_FILE), manifest)?;
        Ok(())
    }
}

/// 所有者設定を適用
///
/// User と Group の両方が設定されている場合のみ chown。片方だけなら警告して何もしない。
pub fn apply_ownership(path: &Path, ownership: &Ownership) -> BuildResult<()> {
    match ownership.policy() {
        OwnershipPolicy::Unset => Ok(()),
        OwnershipPolicy::Partial => {
            tracing::warn!(
                "Ownership needs both User and Group, skipping chown of {}",
                path.display()
            );
            Ok(())
        }
        OwnershipPolicy::Apply { user, group } => {
            tracing::debug!("chown {}:{} {}", user, group, path.display());
            archive::chown(path, user, group)
        }
    }
}

/// 全イメージの latest アーカイブを `all_images.tar.gz` にまとめる
///
/// 個別のコピー失敗は `on_error` に渡して処理を続けます。
pub fn aggregate_latest(
    layout: &PackageLayout,
    images: &[ImageSpec],
    ownership: &Ownership,
    mut on_error: impl FnMut(&ImageSpec, BuildError),
) -> BuildResult<PathBuf> {
    let aggregate_dir = layout.aggregate_dir();
    archive::remove_dir(&aggregate_dir)?;
    fs::create_dir_all(&aggregate_dir)?;

    for image in images {
        let archive = layout.archive_path(&image.base_image, &ImageTag::Latest);
        if !archive.exists() {
            tracing::debug!("No latest archive for {}, skipping", image.name);
            continue;
        }

        let Some(name) = archive.file_name() else {
            continue;
        };
        if let Err(e) = fs::copy(&archive, aggregate_dir.join(name)) {
            on_error(image, e.into());
        }
    }

    let archive_path = archive::compress_dir(&aggregate_dir)?;
    archive::remove_dir(&aggregate_dir)?;
    apply_ownership(&archive_path, ownership)?;

    Ok(archive_path)
}
