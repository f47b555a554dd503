//! Source opening and format probing with symphonia.

use std::fs::File;
use std::path::Path;

use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Error, Result};

/// Stream parameters of a source's default track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaFormat {
    pub sample_rate: u32,
    pub channels: u32,
    /// Absent for streams that do not declare a frame count.
    pub duration_ms: Option<u64>,
}

fn load_failed(url: &str, reason: impl std::fmt::Display) -> Error {
    Error::LoadFailed {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// Map a sound url to a local path. Accepts plain paths and `file://` urls.
pub fn local_path(url: &str) -> &str {
    url.strip_prefix("file://").unwrap_or(url)
}

/// Open `url` as a symphonia stream plus a format hint.
pub fn open_source(url: &str) -> Result<(MediaSourceStream, Hint)> {
    let mut hint = Hint::new();

    #[cfg(feature = "http")]
    if super::http::is_http_url(url) {
        if let Some(ext) = super::http::extension_from_url(url) {
            hint.with_extension(&ext);
        }
        return Ok((super::http::open_url(url)?, hint));
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        return Err(load_failed(url, "http sources need the `http` feature"));
    }

    let path = Path::new(local_path(url));
    let file = File::open(path).map_err(|e| load_failed(url, e))?;
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    Ok((MediaSourceStream::new(Box::new(file), Default::default()), hint))
}

/// Open and demux `url`, returning the format reader.
pub fn open_reader(url: &str) -> Result<Box<dyn FormatReader>> {
    let (mss, hint) = open_source(url)?;
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| load_failed(url, e))?;
    Ok(probed.format)
}

/// Read the default track's parameters without decoding.
pub fn probe_source(url: &str) -> Result<MediaFormat> {
    let reader = open_reader(url)?;
    let track = reader
        .default_track()
        .ok_or_else(|| load_failed(url, "no default track"))?;
    Ok(format_of(&track.codec_params))
}

pub(crate) fn format_of(params: &symphonia::core::codecs::CodecParameters) -> MediaFormat {
    let sample_rate = params.sample_rate.unwrap_or(44_100);
    let channels = params.channels.map(|c| c.count() as u32).unwrap_or(2);
    let duration_ms = params
        .n_frames
        .map(|frames| frames * 1000 / u64::from(sample_rate.max(1)));
    MediaFormat {
        sample_rate,
        channels,
        duration_ms,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;

    /// Write a silent 16-bit PCM mono WAV of `duration_ms` at 8 kHz.
    pub fn silent_wav(duration_ms: u64) -> tempfile::NamedTempFile {
        let rate: u32 = 8_000;
        let frames = (u64::from(rate) * duration_ms / 1000) as u32;
        let data_len = frames * 2;

        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&rate.to_le_bytes());
        bytes.extend_from_slice(&(rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(44 + data_len as usize, 0);

        let mut file = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile()
            .unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();
        file
    }
}
