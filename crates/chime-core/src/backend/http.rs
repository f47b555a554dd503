//! Remote sources for the native backend.
//!
//! An HTTP response body is not seekable, so it is wrapped in symphonia's
//! `ReadOnlySource`. Seeking such a stream fails in the decoder and is
//! reported as a sound error rather than a load failure.

use symphonia::core::io::{MediaSourceStream, ReadOnlySource};

use crate::error::{Error, Result};

/// Fetch `url` and hand the body to symphonia.
pub fn open_url(url: &str) -> Result<MediaSourceStream> {
    let response = ureq::get(url).call().map_err(|e| Error::LoadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let reader = response.into_body().into_reader();
    Ok(MediaSourceStream::new(
        Box::new(ReadOnlySource::new(reader)),
        Default::default(),
    ))
}

/// Lowercased extension of the last path segment, ignoring query and
/// fragment: `"https://x/a/song.MP3?t=1"` gives `Some("mp3")`.
pub fn extension_from_url(url: &str) -> Option<String> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let segment = url[..end].rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_ignores_query_and_fragment() {
        assert_eq!(
            extension_from_url("https://example.com/a/song.MP3?token=abc"),
            Some("mp3".into())
        );
        assert_eq!(
            extension_from_url("https://example.com/clip.ogg#t=3"),
            Some("ogg".into())
        );
    }

    #[test]
    fn extension_absent_without_dot() {
        assert_eq!(extension_from_url("https://example.com/stream"), None);
        assert_eq!(extension_from_url("https://example.com/.hidden"), None);
    }

    #[test]
    fn http_scheme_detection() {
        assert!(is_http_url("https://example.com/song.mp3"));
        assert!(is_http_url("http://example.com/song.mp3"));
        assert!(!is_http_url("file:///tmp/song.mp3"));
        assert!(!is_http_url("song.mp3"));
    }
}
