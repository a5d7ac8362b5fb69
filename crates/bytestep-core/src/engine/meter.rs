//! RMS / peak measurement of rendered blocks

use serde::Serialize;

use crate::types::Sample;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Loudness {
    pub rms: f32,
    pub peak: f32,
}

/// RMS and absolute peak of one block of samples (silence for an empty block)
pub fn analyze_loudness(samples: &[Sample]) -> Loudness {
    let mut acc = LoudnessAccumulator::default();
    acc.add(samples);
    acc.finish()
}

/// Running sums for measuring several channels as one block
#[derive(Debug, Clone, Copy, Default)]
pub struct LoudnessAccumulator {
    sum_squares: f64,
    count: usize,
    peak: f32,
}

impl LoudnessAccumulator {
    #[inline]
    pub fn add(&mut self, samples: &[Sample]) {
        for &s in samples {
            self.sum_squares += (s as f64) * (s as f64);
            self.peak = self.peak.max(s.abs());
        }
        self.count += samples.len();
    }

    pub fn finish(self) -> Loudness {
        if self.count == 0 {
            return Loudness::default();
        }
        Loudness {
            rms: (self.sum_squares / self.count as f64).sqrt() as f32,
            peak: self.peak,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_and_empty() {
        assert_eq!(analyze_loudness(&[]), Loudness::default());
        assert_eq!(analyze_loudness(&[0.0; 64]), Loudness::default());
    }

    #[test]
    fn test_square_wave() {
        let block: Vec<Sample> = (0..100).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let loudness = analyze_loudness(&block);
        assert!((loudness.rms - 0.5).abs() < 1e-6);
        assert_eq!(loudness.peak, 0.5);
    }

    #[test]
    fn test_accumulator_spans_channels() {
        let mut acc = LoudnessAccumulator::default();
        acc.add(&[1.0, 1.0]);
        acc.add(&[0.0, 0.0]);
        let loudness = acc.finish();
        assert!((loudness.rms - 0.5f32.sqrt()).abs() < 1e-6);
        assert_eq!(loudness.peak, 1.0);
    }
}
