//! バージョン文字列の操作
//!
//! バージョンは `.` 区切りの数値列（例: `1.0.3`）。
//! 数値でない要素を含む文字列（`1.0-beta` など）は不正として扱い、更新しません。

use crate::error::{BuildError, BuildResult};

/// バージョン文字列を検証
pub fn validate_version(version: &str) -> BuildResult<()> {
    parse_components(version).map(|_| ())
}

/// 最後の要素を1つ増やす
///
/// - `1.2.9` -> `1.2.10`
/// - `2.0.0` -> `2.0.1`
/// - `7` -> `8`
pub fn bump_version(version: &str) -> BuildResult<String> {
    let components = parse_components(version)?;

    let (last, leading) = components
        .split_last()
        .ok_or_else(|| invalid(version, "empty version"))?;
    let bumped = last
        .checked_add(1)
        .ok_or_else(|| invalid(version, "last component overflows"))?;

    // 先頭側の要素は元の表記のまま残す（`01` を `1` に正規化しない）
    let mut parts: Vec<&str> = version.split('.').take(leading.len()).collect();
    let bumped = bumped.to_string();
    parts.push(&bumped);

    Ok(parts.join("."))
}

fn parse_components(version: &str) -> BuildResult<Vec<u64>> {
    if version.trim().is_empty() {
        return Err(invalid(version, "empty version"));
    }

    version
        .split('.')
        .map(|part| {
            let not_integer = || {
                invalid(
                    version,
                    &format!("component '{}' is not a non-negative integer", part),
                )
            };

            // `u64::from_str` は `+1` も受け付けるので数字のみに限定
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(not_integer());
            }
            part.parse::<u64>().map_err(|_| not_integer())
        })
        .collect()
}

fn invalid(version: &str, reason: &str) -> BuildError {
    BuildError::InvalidVersion {
        version: version.to_string(),
        reason: reason.to_string(),
    }
}
