//! ファイル操作ユーティリティ
//!
//! パッケージング用のファイル移動・コピー・圧縮・削除・所有者変更。
//! すべて同期 I/O なので、非同期コンテキストからは `spawn_blocking` 経由で呼び出します。

use crate::error::{BuildError, BuildResult};
use crate::layout::archive_path_for;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tar::{Builder, HeaderMode};

/// ファイルをディレクトリ内に移動し、移動先のパスを返す
///
/// 別ファイルシステム間で `rename` できない場合はコピーして元を削除します。
pub fn move_into(file: &Path, dir: &Path) -> io::Result<PathBuf> {
    let name = file.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a file path: {}", file.display()),
        )
    })?;
    let dest = dir.join(name);

    if let Err(e) = fs::rename(file, &dest) {
        tracing::debug!(
            "rename {} failed ({}), falling back to copy",
            file.display(),
            e
        );
        fs::copy(file, &dest)?;
        fs::remove_file(file)?;
    }

    Ok(dest)
}

/// ディレクトリを再帰的にコピー（シンボリックリンクはリンクとして複製）
pub fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;

    for entry in sorted_entries(src)? {
        let path = entry.path();
        let target = dest.join(entry.file_name());
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            copy_tree(&path, &target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(&path)?;
            std::os::unix::fs::symlink(link, &target)?;
        } else {
            fs::copy(&path, &target)?;
        }
    }

    Ok(())
}

/// ボリュームを `dest_dir` にコピーする
///
/// ディレクトリは元の名前のサブディレクトリとして、ファイルはそのまま `dest_dir` 直下に置かれます。
pub fn copy_volume(volume: &Path, dest_dir: &Path) -> BuildResult<PathBuf> {
    let metadata = match fs::metadata(volume) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BuildError::VolumeNotFound(volume.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    fs::create_dir_all(dest_dir)?;

    // `/` のように名前を持たないパスは "volume" として扱う
    let name = volume
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "volume".into());
    let target = dest_dir.join(name);

    if metadata.is_dir() {
        copy_tree(volume, &target)?;
    } else {
        fs::copy(volume, &target)?;
    }

    Ok(target)
}

/// ディレクトリを `{dir}.tar.gz` に圧縮し、アーカイブのパスを返す
///
/// エントリはパス順に並べ、mtime・所有者を固定するため、同じ内容からは同じバイト列が生成されます。
pub fn compress_dir(dir: &Path) -> BuildResult<PathBuf> {
    let archive_path = archive_path_for(dir);
    tracing::debug!(
        "Compressing {} -> {}",
        dir.display(),
        archive_path.display()
    );

    let file = File::create(&archive_path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut tar = Builder::new(encoder);
    tar.mode(HeaderMode::Deterministic);
    tar.follow_symlinks(false);

    append_tree(&mut tar, dir, Path::new(""))?;

    tar.into_inner()?.finish()?;
    Ok(archive_path)
}

fn append_tree<W: io::Write>(tar: &mut Builder<W>, dir: &Path, prefix: &Path) -> io::Result<()> {
    for entry in sorted_entries(dir)? {
        let path = entry.path();
        let name = prefix.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            tar.append_dir(&name, &path)?;
            append_tree(tar, &path, &name)?;
        } else {
            tar.append_path_with_name(&path, &name)?;
        }
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

/// ディレクトリを再帰的に削除（存在しなければ何もしない）
pub fn remove_dir(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// globパターンに一致するファイルを削除し、削除したパスを返す
pub fn remove_matching(pattern: &str) -> BuildResult<Vec<PathBuf>> {
    let mut removed = Vec::new();

    for entry in glob::glob(pattern)? {
        let path = entry.map_err(io::Error::from)?;
        if path.is_file() {
            fs::remove_file(&path)?;
            tracing::debug!("Removed {}", path.display());
            removed.push(path);
        }
    }

    Ok(removed)
}

/// ユーザー名・グループ名を解決してファイルの所有者を変更
pub fn chown(path: &Path, user: &str, group: &str) -> BuildResult<()> {
    use nix::unistd::{Group, User};

    let uid = User::from_name(user)
        .map_err(|e| BuildError::Ownership(format!("failed to look up user '{}': {}", user, e)))?
        .ok_or_else(|| BuildError::Ownership(format!("unknown user '{}'", user)))?
        .uid;

    let gid = Group::from_name(group)
        .map_err(|e| {
            BuildError::Ownership(format!("failed to look up group '{}': {}", group, e))
        })?
        .ok_or_else(|| BuildError::Ownership(format!("unknown group '{}'", group)))?
        .gid;

    nix::unistd::chown(path, Some(uid), Some(gid)).map_err(|e| {
        BuildError::Ownership(format!(
            "chown {}:{} {} failed: {}",
            user,
            group,
            path.display(),
            e
        ))
    })
}
