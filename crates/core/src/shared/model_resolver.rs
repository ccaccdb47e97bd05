use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model {name} not found in {dir} or the cache, and no download URL is configured")]
    NotFound { name: String, dir: PathBuf },
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Locate a model asset, downloading it only as a last resort.
///
/// Resolution order:
/// 1. `model_dir/name` (the bundled, relative asset location)
/// 2. User cache directory (platform-specific)
/// 3. Download from `url` into the cache, when a URL is given
pub fn resolve(
    model_dir: &Path,
    name: &str,
    url: Option<&str>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_with_cache(model_dir, model_cache_dir().as_deref(), name, url, progress)
}

fn resolve_with_cache(
    model_dir: &Path,
    cache_dir: Option<&Path>,
    name: &str,
    url: Option<&str>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let bundled_path = model_dir.join(name);
    if bundled_path.is_file() {
        return Ok(bundled_path);
    }

    if let Some(cache_dir) = cache_dir {
        let cached_path = cache_dir.join(name);
        if cached_path.is_file() {
            return Ok(cached_path);
        }
        if let Some(url) = url {
            fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
            log::info!("Downloading model {name} from {url}");
            download(url, &cached_path, progress)?;
            return Ok(cached_path);
        }
    }

    Err(ModelResolveError::NotFound {
        name: name.to_string(),
        dir: model_dir.to_path_buf(),
    })
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Facecam/models/`
/// - Linux: `$XDG_CACHE_HOME/Facecam/models/` or `~/.cache/Facecam/models/`
/// - Windows: `%LOCALAPPDATA%/Facecam/models/`
pub fn model_cache_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR_NAME).join("models"))
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = download_to(url, dest, &temp_path, progress);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn download_to(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut file = fs::File::create(temp_path).map_err(write_error(temp_path))?;

    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_error(temp_path))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_error(temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_error(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_error(dest))
}

fn write_error(path: &Path) -> impl FnOnce(std::io::Error) -> ModelResolveError {
    let path = path.to_path_buf();
    move |source| ModelResolveError::Write { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prefers_bundled_model() {
        let tmp = TempDir::new().unwrap();
        let bundled = tmp.path().join("models");
        let cache = tmp.path().join("cache");
        fs::create_dir_all(&bundled).unwrap();
        fs::create_dir_all(&cache).unwrap();
        fs::write(bundled.join("m.onnx"), b"bundled").unwrap();
        fs::write(cache.join("m.onnx"), b"cached").unwrap();

        let path = resolve_with_cache(&bundled, Some(&cache), "m.onnx", None, None).unwrap();

        assert_eq!(path, bundled.join("m.onnx"));
    }

    #[test]
    fn test_falls_back_to_cache() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("m.onnx"), b"cached").unwrap();

        let path =
            resolve_with_cache(&tmp.path().join("missing"), Some(&cache), "m.onnx", None, None)
                .unwrap();

        assert_eq!(path, cache.join("m.onnx"));
    }

    #[test]
    fn test_missing_without_url_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let result = resolve_with_cache(
            &tmp.path().join("models"),
            Some(&tmp.path().join("cache")),
            "m.onnx",
            None,
            None,
        );
        assert!(matches!(result, Err(ModelResolveError::NotFound { .. })));
    }

    #[test]
    fn test_model_cache_dir_is_app_scoped() {
        if let Some(path) = model_cache_dir() {
            assert!(path.ends_with(Path::new(APP_DIR_NAME).join("models")));
        }
    }

    #[test]
    fn test_failed_download_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
