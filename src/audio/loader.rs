// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Sample loading.
//!
//! Samples are decoded entirely into memory, mixed down to mono and converted to
//! the output sample rate before a chain is marked ready.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info, warn};

use super::error::LoadError;

/// Mono sample data at the output sample rate, shared between voices.
#[derive(Clone)]
pub struct LoadedSample {
    data: Arc<Vec<f32>>,
    sample_rate: u32,
}

impl LoadedSample {
    pub fn new(data: Vec<f32>, sample_rate: u32) -> LoadedSample {
        LoadedSample {
            data: Arc::new(data),
            sample_rate,
        }
    }

    pub fn data(&self) -> &Arc<Vec<f32>> {
        &self.data
    }

    pub fn frames(&self) -> usize {
        self.data.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.data.len() as f64 / self.sample_rate as f64)
    }
}

impl std::fmt::Debug for LoadedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedSample")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Fetches and decodes the audio behind a descriptor's source URL.
pub trait SampleLoader: Send + Sync + 'static {
    fn load(&self, source_url: &str) -> Result<LoadedSample, LoadError>;
}

/// Loads samples from disk, relative to a samples root.
pub struct FileSampleLoader {
    root: PathBuf,
    target_sample_rate: u32,
    /// Decoded samples by resolved path.
    cache: Mutex<HashMap<PathBuf, LoadedSample>>,
}

impl FileSampleLoader {
    pub fn new(root: &Path, target_sample_rate: u32) -> FileSampleLoader {
        FileSampleLoader {
            root: root.to_path_buf(),
            target_sample_rate,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a source URL against the samples root. Absolute paths that exist are used as is.
    pub fn resolve(&self, source_url: &str) -> PathBuf {
        let source_url = source_url.strip_prefix("file://").unwrap_or(source_url);
        let path = Path::new(source_url);
        if path.is_absolute() && path.exists() {
            return path.to_path_buf();
        }
        self.root.join(source_url.trim_start_matches('/'))
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache
            .lock()
            .values()
            .map(|sample| sample.frames() * std::mem::size_of::<f32>())
            .sum()
    }
}

impl SampleLoader for FileSampleLoader {
    fn load(&self, source_url: &str) -> Result<LoadedSample, LoadError> {
        let path = self.resolve(source_url);
        if let Some(sample) = self.cache.lock().get(&path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(sample.clone());
        }

        info!(path = ?path, "Loading sample into memory");
        let (mono, source_rate) = decode_mono(&path)?;
        if mono.is_empty() {
            return Err(LoadError::Empty(path));
        }

        let data = if source_rate != self.target_sample_rate {
            debug!(
                source_rate = source_rate,
                target_rate = self.target_sample_rate,
                "Transcoding sample"
            );
            transcode(&mono, source_rate, self.target_sample_rate)
        } else {
            mono
        };

        let loaded = LoadedSample::new(data, self.target_sample_rate);
        info!(
            path = ?path,
            duration_ms = loaded.duration().as_millis(),
            memory_kb = loaded.frames() * std::mem::size_of::<f32>() / 1024,
            "Sample loaded"
        );
        self.cache.lock().insert(path, loaded.clone());
        Ok(loaded)
    }
}

impl std::fmt::Debug for FileSampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSampleLoader")
            .field("root", &self.root)
            .field("cached_samples", &self.cache.lock().len())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Decodes a whole file and averages its channels. Returns the samples and their rate.
fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32), LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let decode_error = |source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_error)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::NoAudioTrack(path.to_path_buf()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| LoadError::UnknownSampleRate {
            path: path.to_path_buf(),
        })?;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_error)?;

    let mut mono: Vec<f32> = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(decode_error(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count().max(1);
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                mono.extend(
                    buffer
                        .samples()
                        .chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = ?path, err = e, "Skipping undecodable packet");
            }
            Err(e) => return Err(decode_error(e)),
        }
    }

    Ok((mono, sample_rate))
}

/// Converts mono samples between rates using linear interpolation, which is
/// sufficient for drum hits and one-shots.
fn transcode(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let target_frames = (samples.len() as f64 * ratio).ceil() as usize;

    (0..target_frames)
        .map(|target_frame| {
            let source_pos = target_frame as f64 / ratio;
            let source_frame = source_pos.floor() as usize;
            let frac = source_pos.fract() as f32;

            let s0 = samples.get(source_frame).copied().unwrap_or(0.0);
            let s1 = samples.get(source_frame + 1).copied().unwrap_or(s0);
            s0 + (s1 - s0) * frac
        })
        .collect()
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use crate::audio::error::LoadError;
    use crate::testutil::write_wav;

    use super::{transcode, FileSampleLoader, SampleLoader};

    #[test]
    fn test_transcode_length() {
        let source: Vec<f32> = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let result = transcode(&source, 44100, 48000);
        assert_eq!((4410.0_f64 * 48000.0 / 44100.0).ceil() as usize, result.len());
        assert_eq!(source[0], result[0]);
    }

    #[test]
    fn test_load_mixes_down_to_mono() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_wav(
            dir.path().join("kits/stereo.wav"),
            vec![vec![0.5_f32; 100], vec![0.25_f32; 100]],
            44100,
        )?;

        let loader = FileSampleLoader::new(dir.path(), 44100);
        let sample = loader.load("/kits/stereo.wav")?;
        assert_eq!(100, sample.frames());
        assert_eq!(44100, sample.sample_rate());
        assert!(sample.data().iter().all(|s| (s - 0.375).abs() < 1e-6));

        // Served from the cache the second time.
        let again = loader.load("kits/stereo.wav")?;
        assert!(std::sync::Arc::ptr_eq(sample.data(), again.data()));
        Ok(())
    }

    #[test]
    fn test_load_transcodes_to_target_rate() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        write_wav(dir.path().join("clap.wav"), vec![vec![0.1_f32; 441]], 44100)?;

        let loader = FileSampleLoader::new(dir.path(), 48000);
        let sample = loader.load("clap.wav")?;
        assert_eq!(48000, sample.sample_rate());
        assert!((480..=481).contains(&sample.frames()));
        Ok(())
    }

    #[test]
    fn test_load_failures() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let loader = FileSampleLoader::new(dir.path(), 44100);
        assert!(matches!(
            loader.load("missing.wav"),
            Err(LoadError::Io { .. })
        ));

        std::fs::write(dir.path().join("garbage.wav"), b"not a wav file at all")?;
        assert!(matches!(
            loader.load("garbage.wav"),
            Err(LoadError::Decode { .. })
        ));

        write_wav(dir.path().join("empty.wav"), vec![Vec::<f32>::new()], 44100)?;
        assert!(loader.load("empty.wav").is_err());
        Ok(())
    }
}
