//! Path to URI normalization.
//!
//! Hosts hand the player whatever they have: a file path, an `http(s)`
//! stream, an `rtsp` camera. Engines only speak URIs, so anything that is
//! not already one must name an existing file and is converted to a
//! `file://` URI. Paths are canonicalized first, so the engine never sees
//! a URI that depends on the working directory.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use url::Url;

/// Normalize `path` into a URI the engine can load.
pub fn to_uri(path: &str) -> Result<String> {
    if let Ok(url) = Url::parse(path) {
        // Single-letter schemes are Windows drive prefixes, not URIs.
        if url.scheme().len() > 1 {
            return Ok(path.to_string());
        }
    }
    let canonical = Path::new(path)
        .canonicalize()
        .with_context(|| format!("no such file: {path}"))?;
    let url = Url::from_file_path(&canonical)
        .map_err(|_| anyhow!("path {} does not form a file uri", canonical.display()))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_uris_pass_through() {
        assert_eq!(
            to_uri("http://example.com/stream.m3u8").unwrap(),
            "http://example.com/stream.m3u8"
        );
        assert_eq!(
            to_uri("rtsp://camera.local/feed").unwrap(),
            "rtsp://camera.local/feed"
        );
        assert_eq!(to_uri("file:///tmp/clip.mp4").unwrap(), "file:///tmp/clip.mp4");
    }

    #[test]
    fn existing_file_becomes_a_file_uri() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let uri = to_uri(file.path().to_str().unwrap()).unwrap();
        assert!(uri.starts_with("file://"), "got {uri}");

        let name = file.path().file_name().unwrap().to_str().unwrap();
        assert!(uri.ends_with(name), "got {uri}");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = to_uri("/definitely/not/here.mp4").unwrap_err();
        assert!(format!("{err:#}").contains("no such file"));
    }
}
