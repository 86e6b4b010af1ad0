//! Filename sanitization, album path containment, and collision-free naming.
//!
//! [`unique_filename`] only probes the directory. Writers that may race on
//! the same name go through [`claim_unique_file`], which creates the file
//! with `create_new` so each caller owns a distinct path.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tracing::debug;
use url::Url;

use super::constants::PART_SUFFIX;
use super::error::DownloadError;

/// Name used when a URL has no usable last path segment.
const FALLBACK_MEDIA_NAME: &str = "media";

/// Sanitizes a human title into a single filesystem-safe path component.
///
/// Characters in `<>:"/\|?*` and control characters become `_`, surrounding
/// whitespace is trimmed, and one leading underscore is dropped.
///
/// # Example
///
/// ```
/// use mediadl_core::download::sanitize;
///
/// assert_eq!(sanitize("  Summer: Day 1 "), "Summer_ Day 1");
/// assert_eq!(sanitize("/etc"), "etc");
/// ```
#[must_use]
pub fn sanitize(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim();
    trimmed.strip_prefix('_').unwrap_or(trimmed).to_string()
}

/// Resolves the album directory for `title` under `root` and creates it.
///
/// The root is created if missing and canonicalized; the album path is the
/// sanitized title joined under it and normalized lexically.
///
/// # Errors
///
/// Returns [`DownloadError::PathEscape`] if the album directory would not be a
/// direct child of the root (empty titles, `.`, `..`), and
/// [`DownloadError::Io`] if a directory cannot be created or resolved.
pub fn final_album_path(root: &Path, title: &str) -> Result<PathBuf, DownloadError> {
    std::fs::create_dir_all(root).map_err(|e| DownloadError::io(root, e))?;
    let resolved_root = root
        .canonicalize()
        .map_err(|e| DownloadError::io(root, e))?;

    let candidate = normalize_lexically(&resolved_root.join(sanitize(title)));
    if candidate.parent() != Some(resolved_root.as_path()) {
        return Err(DownloadError::path_escape(resolved_root, candidate));
    }

    std::fs::create_dir_all(&candidate).map_err(|e| DownloadError::io(&candidate, e))?;
    debug!(title, path = %candidate.display(), "resolved album path");
    Ok(candidate)
}

/// Returns `base` if nothing exists there, else the first free `stem_N.ext`.
///
/// Suffixes are probed in order starting at 1, so repeated calls against a
/// growing directory yield strictly increasing suffixes.
#[must_use]
pub fn unique_filename(base: &Path) -> PathBuf {
    if !base.exists() {
        return base.to_path_buf();
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = base
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut suffix: u64 = 1;
    loop {
        let candidate = base.with_file_name(format!("{stem}_{suffix}{ext}"));
        if !candidate.exists() {
            debug!(base = %base.display(), path = %candidate.display(), "allocated unique filename");
            return candidate;
        }
        suffix += 1;
    }
}

/// Creates the first free name from [`unique_filename`] exclusively.
///
/// A name taken between the probe and the create is skipped and the probe
/// runs again, so concurrent callers never receive the same path.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] for any failure other than the name being
/// taken.
pub async fn claim_unique_file(base: &Path) -> Result<(PathBuf, File), DownloadError> {
    loop {
        let candidate = unique_filename(base);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %candidate.display(), "name claimed concurrently, probing again");
            }
            Err(e) => return Err(DownloadError::io(&candidate, e)),
        }
    }
}

/// Derives a media file name from the last path segment of a URL.
///
/// The segment is percent-decoded and sanitized; an empty result falls back
/// to `media`.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidUrl`] if `url` does not parse.
pub fn media_name_from_url(url: &str) -> Result<String, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    let last = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let name = sanitize(&decoded);

    if name.is_empty() || !is_safe_filename_segment(&name) {
        return Ok(FALLBACK_MEDIA_NAME.to_string());
    }
    Ok(name)
}

/// Whether a file name already carries an extension.
#[must_use]
pub fn has_extension(name: &str) -> bool {
    Path::new(name).extension().is_some()
}

/// Guesses a file extension (without the dot) from a Content-Type header.
///
/// Unknown types fall back to the MIME subtype, e.g. `image/avif` -> `avif`.
#[must_use]
pub fn extension_from_content_type(content_type: &str) -> Option<String> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    let known = match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        "video/x-matroska" => Some("mkv"),
        "video/mp2t" => Some("ts"),
        _ => None,
    };
    if let Some(ext) = known {
        return Some(ext.to_string());
    }

    let subtype = mime.split('/').nth(1)?.trim();
    let safe = !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphanumeric());
    safe.then(|| subtype.to_string())
}

/// Temporary path used while a transfer to `destination` is in flight.
#[must_use]
pub fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ==================== sanitize ====================

    #[test]
    fn test_sanitize_replaces_invalid_chars() {
        assert_eq!(sanitize("a<b>c:d\"e/f\\g|h?i*j"), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn test_sanitize_trims_and_drops_leading_underscore() {
        assert_eq!(sanitize("  title  "), "title");
        assert_eq!(sanitize("_hidden"), "hidden");
        assert_eq!(sanitize("/root"), "root");
        assert_eq!(sanitize("__two"), "_two");
    }

    #[test]
    fn test_sanitize_preserves_unicode() {
        assert_eq!(sanitize("コスプレ (vol. 2)"), "コスプレ (vol. 2)");
    }

    // ==================== final_album_path ====================

    #[test]
    fn test_final_album_path_creates_child_of_root() {
        let temp_dir = TempDir::new().unwrap();
        let path = final_album_path(temp_dir.path(), "My Album").unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        assert_eq!(path.parent(), Some(root.as_path()));
        assert!(path.is_dir());
        assert_eq!(path.file_name().unwrap(), "My Album");
    }

    #[test]
    fn test_final_album_path_contains_traversal_titles() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        for title in ["../../etc", "..\\..\\windows", "a/../../b", "/etc/passwd", "./x"] {
            let path = final_album_path(temp_dir.path(), title).unwrap();
            assert_eq!(path.parent(), Some(root.as_path()), "title {title:?}");
        }
    }

    #[test]
    fn test_final_album_path_rejects_dot_titles() {
        let temp_dir = TempDir::new().unwrap();
        for title in ["..", ".", "", "   ", "_"] {
            let result = final_album_path(temp_dir.path(), title);
            assert!(
                matches!(result, Err(DownloadError::PathEscape { .. })),
                "title {title:?} gave {result:?}"
            );
        }
    }

    #[test]
    fn test_final_album_path_creates_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested").join("downloads");
        let path = final_album_path(&root, "album").unwrap();
        assert!(path.is_dir());
    }

    // ==================== unique_filename ====================

    #[test]
    fn test_unique_filename_returns_base_when_free() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("clip.mp4");
        assert_eq!(unique_filename(&base), base);
    }

    #[test]
    fn test_unique_filename_increasing_suffixes() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("photo.jpg");
        std::fs::write(&base, b"0").unwrap();

        let mut previous = Vec::new();
        for expected in 1..=4 {
            let next = unique_filename(&base);
            assert!(!next.exists());
            assert_eq!(
                next.file_name().unwrap().to_str().unwrap(),
                format!("photo_{expected}.jpg")
            );
            std::fs::write(&next, b"x").unwrap();
            previous.push(next);
        }
    }

    #[test]
    fn test_unique_filename_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("blob");
        std::fs::write(&base, b"0").unwrap();
        assert_eq!(unique_filename(&base), temp_dir.path().join("blob_1"));
    }

    #[test]
    fn test_unique_filename_fills_gaps_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("a.png");
        std::fs::write(&base, b"0").unwrap();
        std::fs::write(temp_dir.path().join("a_2.png"), b"2").unwrap();
        assert_eq!(unique_filename(&base), temp_dir.path().join("a_1.png"));
    }

    #[tokio::test]
    async fn test_claim_unique_file_never_hands_out_a_name_twice() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("a.jpg");

        let (first, _) = claim_unique_file(&base).await.unwrap();
        let (second, _) = claim_unique_file(&base).await.unwrap();

        assert_eq!(first, base);
        assert_eq!(second, temp_dir.path().join("a_1.jpg"));
        assert!(second.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_get_distinct_names() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("clip.mp4");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let base = base.clone();
                tokio::spawn(async move { claim_unique_file(&base).await.unwrap().0 })
            })
            .collect();
        let mut claimed = Vec::new();
        for handle in handles {
            claimed.push(handle.await.unwrap());
        }
        claimed.sort();
        claimed.dedup();

        assert_eq!(claimed.len(), 8);
    }

    // ==================== media names ====================

    #[test]
    fn test_media_name_from_url_decodes_last_segment() {
        let name = media_name_from_url("https://cdn.example.com/albums/7/my%20photo.jpg?x=1").unwrap();
        assert_eq!(name, "my photo.jpg");
    }

    #[test]
    fn test_media_name_from_url_neutralizes_encoded_separators() {
        let name = media_name_from_url("https://example.com/a/..%2F..%2Fevil.jpg").unwrap();
        assert_eq!(name, ".._.._evil.jpg");
    }

    #[test]
    fn test_media_name_from_url_falls_back() {
        assert_eq!(media_name_from_url("https://example.com/").unwrap(), "media");
        assert_eq!(media_name_from_url("https://example.com/%2E%2E").unwrap(), "media");
    }

    #[test]
    fn test_media_name_from_invalid_url() {
        assert!(matches!(
            media_name_from_url("not a url"),
            Err(DownloadError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_extension_from_content_type() {
        assert_eq!(extension_from_content_type("image/jpeg").as_deref(), Some("jpg"));
        assert_eq!(
            extension_from_content_type("video/mp4; charset=binary").as_deref(),
            Some("mp4")
        );
        assert_eq!(extension_from_content_type("image/avif").as_deref(), Some("avif"));
        assert_eq!(extension_from_content_type("garbage"), None);
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension("a.jpg"));
        assert!(!has_extension("abc"));
    }

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/x/clip.mp4")),
            PathBuf::from("/x/clip.mp4.part")
        );
    }
}
