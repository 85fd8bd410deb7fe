//! Builds collision-safe, bounded-length destination paths from untrusted remote text.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Longest path we are willing to hand to the filesystem, in bytes.
pub const MAX_PATH_LENGTH: usize = 250;

/// Characters that could inject a separator or a control code into a file name.
const REPLACED_CHARS: [char; 6] = [' ', '/', '\\', '\n', '\r', '\0'];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path too long and title too short to shorten: {path} ({overflow} bytes over the limit)")]
    TooLong { path: String, overflow: usize },
}

pub type PathResult<T> = Result<T, PathError>;

/// Replaces every separator and control character we guard against with `_`.
pub fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| if REPLACED_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

fn file_name(target_name: &str, title: &str, url_file_name: &str) -> String {
    format!("{}_{}_{}", target_name, title, url_file_name)
}

fn path_len(path: &Path) -> usize {
    path.as_os_str().len()
}

/// Computes the file path for a post as `<dir>/<target>_<title>_<file name>`.
///
/// The length limit applies to the absolute form of the path, so a relative
/// `destination_dir` is measured from the working directory. When it would
/// exceed [`MAX_PATH_LENGTH`] the title is shortened from the end. The
/// subreddit name and URL file name are never touched, so two different
/// images can't collapse onto the same path.
pub fn compute_path(
    destination_dir: &Path,
    target_name: &str,
    post_title: &str,
    url_file_name: &str,
) -> PathResult<PathBuf> {
    let target_name = sanitize(target_name);
    let mut title = sanitize(post_title);
    let url_file_name = sanitize(url_file_name);

    let anchor = std::path::absolute(destination_dir).unwrap_or_else(|_| destination_dir.to_path_buf());
    let measured = anchor.join(file_name(&target_name, &title, &url_file_name));
    let length = path_len(&measured);
    if length <= MAX_PATH_LENGTH {
        return Ok(destination_dir.join(file_name(&target_name, &title, &url_file_name)));
    }

    let overflow = length - MAX_PATH_LENGTH;
    if overflow > title.len() {
        return Err(PathError::TooLong {
            path: measured.display().to_string(),
            overflow,
        });
    }

    // Never split a multi-byte character; cutting a little more keeps us under the limit.
    let mut cut = title.len() - overflow;
    while !title.is_char_boundary(cut) {
        cut -= 1;
    }
    title.truncate(cut);

    Ok(destination_dir.join(file_name(&target_name, &title, &url_file_name)))
}
