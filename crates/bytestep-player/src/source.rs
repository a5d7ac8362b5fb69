//! Directory-backed sample source
//!
//! Picks a random `.wav` file from a directory on every fetch.

use std::path::{Path, PathBuf};

use bytestep_core::buffer::SampleBuffer;
use bytestep_core::source::{FetchError, SampleSource};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct DirectorySampleSource {
    name: String,
    files: Vec<PathBuf>,
    rng: StdRng,
}

impl DirectorySampleSource {
    /// Scan `dir` for WAV files
    ///
    /// The listing is taken once; files added later are not seen.
    pub fn open(dir: &Path, seed: Option<u64>) -> Result<Self, FetchError> {
        let entries = std::fs::read_dir(dir).map_err(|source| FetchError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_wav(p))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(FetchError::Empty(dir.display().to_string()));
        }
        log::info!("Found {} WAV file(s) in {:?}", files.len(), dir);

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            name: format!("directory {}", dir.display()),
            files,
            rng,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl SampleSource for DirectorySampleSource {
    fn fetch_sample(&mut self) -> Result<SampleBuffer, FetchError> {
        if self.files.is_empty() {
            return Err(FetchError::Empty(self.name.clone()));
        }
        let path = &self.files[self.rng.gen_range(0..self.files.len())];
        log::debug!("Loading {:?}", path);
        load_wav(path)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// Decode a WAV file into a planar buffer at its own sample rate
pub fn load_wav(path: &Path) -> Result<SampleBuffer, FetchError> {
    let decode_err = |reason: String| FetchError::Decode {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = hound::WavReader::open(path).map_err(|e| match e {
        hound::Error::IoError(source) => FetchError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => decode_err(other.to_string()),
    })?;
    let spec = reader.spec();
    let num_channels = spec.channels as usize;
    if num_channels == 0 {
        return Err(decode_err("no channels".to_string()));
    }

    let raw: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| decode_err(e.to_string()))?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()
                .map_err(|e| decode_err(e.to_string()))?
        }
    };

    // L R L R -> (L L, R R)
    let frames = raw.len() / num_channels;
    let mut channels = vec![Vec::with_capacity(frames); num_channels];
    for frame in raw.chunks_exact(num_channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            channels[ch].push(sample);
        }
    }

    SampleBuffer::new(channels, spec.sample_rate).map_err(|e| decode_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            for ch in 0..channels {
                let value = if ch == 0 { 16384 } else { -16384 };
                writer.write_sample((value + i as i32) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_stereo_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, 100);

        let buffer = load_wav(&path).unwrap();
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.sample_rate(), 44100);
        assert!((buffer.get(0, 0).unwrap() - 0.5).abs() < 1e-4);
        assert!((buffer.get(1, 0).unwrap() + 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_mono_wav_becomes_stereo_downstream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, 32);

        let buffer = load_wav(&path).unwrap();
        assert_eq!(buffer.num_channels(), 1);
        let stereo = buffer.into_stereo();
        assert_eq!(stereo.num_channels(), 2);
        assert_eq!(stereo.channel(0), stereo.channel(1));
    }

    #[test]
    fn test_directory_source_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("a.wav"), 2, 10);
        write_wav(&dir.path().join("b.WAV"), 2, 20);
        std::fs::write(dir.path().join("notes.txt"), "not audio").unwrap();

        let mut source = DirectorySampleSource::open(dir.path(), Some(4)).unwrap();
        assert_eq!(source.len(), 2);
        for _ in 0..8 {
            let len = source.fetch_sample().unwrap().len();
            assert!(len == 10 || len == 20);
        }
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            DirectorySampleSource::open(dir.path(), None),
            Err(FetchError::Empty(_))
        ));
    }

    #[test]
    fn test_corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"this is not a wav file at all").unwrap();
        assert!(matches!(load_wav(&path), Err(FetchError::Decode { .. })));
    }
}
