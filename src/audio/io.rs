//! Audio decoding

use crate::{Error, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tempfile::NamedTempFile;

use super::dsp::to_mono;

/// Audio data container
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples (mono, normalized to [-1, 1])
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioData {
    /// Create new audio data
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Get duration in seconds
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode an in-memory upload to mono samples at the file's native rate.
///
/// The payload is spooled to a named temporary file carrying `extension` as
/// its suffix. The file is removed when the guard drops, whichever way this
/// function returns.
///
/// # Arguments
/// * `bytes` - Raw container bytes
/// * `extension` - Container hint such as `mp3`, `wav` or `m4a`
pub fn decode(bytes: &[u8], extension: &str) -> Result<AudioData> {
    decode_in(bytes, extension, &std::env::temp_dir())
}

fn decode_in(bytes: &[u8], extension: &str, dir: &Path) -> Result<AudioData> {
    let temp = spool(bytes, extension, dir)?;
    decode_file(temp.path())
}

fn spool(bytes: &[u8], extension: &str, dir: &Path) -> Result<NamedTempFile> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    let mut temp = tempfile::Builder::new()
        .prefix("kicau-upload-")
        .suffix(&suffix)
        .tempfile_in(dir)?;

    temp.write_all(bytes)?;
    temp.flush()?;

    log::debug!(
        "Spooled {} bytes to {}",
        bytes.len(),
        temp.path().display()
    );

    Ok(temp)
}

/// Load audio from a file on disk
///
/// # Returns
/// Mono audio data at the file's native sample rate
pub fn load_audio<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }

    decode_file(path)
}

fn decode_file(path: &Path) -> Result<AudioData> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Decode(format!("unsupported audio format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("no audio track found".into()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("unsupported codec: {}", e)))?;

    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels = spec.channels.count().max(1);

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buffer.samples());
            }
            // Corrupt frames are skipped, the rest of the stream is still usable
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let sample_rate = sample_rate
        .filter(|&sr| sr > 0)
        .ok_or_else(|| Error::Decode("unknown sample rate".into()))?;

    let samples = to_mono(&interleaved, channels);
    if samples.is_empty() {
        return Err(Error::Decode("no audio samples decoded".into()));
    }

    Ok(AudioData::new(samples, sample_rate))
}
