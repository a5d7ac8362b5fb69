//! Multi-channel sample buffers
//!
//! [`SampleBuffer`] is the unit of material that flows through the system:
//! fetched by the acquisition side, reconciled by the arrangement functions,
//! and converged by a lane. All channels share one length, checked at
//! construction, so `len()` can always answer from channel 0.
//!
//! [`WorkingPair`] is the two equal-length buffers one lane converges.

use thiserror::Error;

use crate::types::{Sample, NUM_CHANNELS, SAMPLE_RATE};

/// Errors raised when buffer invariants are violated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// A buffer needs at least one channel
    #[error("sample buffer has no channels")]
    NoChannels,

    /// Every channel must have the same number of frames
    #[error("channel {channel} has {found} frames, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        found: usize,
    },

    /// A working pair must hold two buffers of equal length
    #[error("working pair length mismatch: a={a}, b={b}")]
    PairLengthMismatch { a: usize, b: usize },

    /// A working pair cannot be converged without frames
    #[error("working pair buffers are empty")]
    EmptyPair,
}

/// Multi-channel float sample container
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<Sample>>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Build a buffer from per-channel sample data
    pub fn new(channels: Vec<Vec<Sample>>, sample_rate: u32) -> Result<Self, BufferError> {
        let expected = channels.first().ok_or(BufferError::NoChannels)?.len();
        if let Some((channel, data)) = channels
            .iter()
            .enumerate()
            .find(|(_, data)| data.len() != expected)
        {
            return Err(BufferError::ChannelLengthMismatch {
                channel,
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Single-channel buffer
    pub fn from_mono(data: Vec<Sample>, sample_rate: u32) -> Self {
        Self {
            channels: vec![data],
            sample_rate,
        }
    }

    /// Buffer of `len` zero frames on `num_channels` channels (at least one)
    pub fn silence(num_channels: usize, len: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; len]; num_channels.max(1)],
            sample_rate,
        }
    }

    /// Frame count, taken from channel 0
    #[inline]
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channel(&self, channel: usize) -> Option<&[Sample]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    #[inline]
    pub fn channel_mut(&mut self, channel: usize) -> Option<&mut [Sample]> {
        self.channels.get_mut(channel).map(Vec::as_mut_slice)
    }

    /// Sample at (channel, frame), `None` when out of range
    #[inline]
    pub fn get(&self, channel: usize, frame: usize) -> Option<Sample> {
        self.channels.get(channel)?.get(frame).copied()
    }

    /// Normalize to exactly two channels
    ///
    /// Mono is duplicated into both channels; extra channels are dropped.
    pub fn into_stereo(mut self) -> Self {
        match self.channels.len() {
            1 => {
                let left = self.channels[0].clone();
                self.channels.push(left);
            }
            n if n > NUM_CHANNELS => self.channels.truncate(NUM_CHANNELS),
            _ => {}
        }
        self
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::silence(NUM_CHANNELS, 0, SAMPLE_RATE)
    }
}

/// The two equal-length buffers a lane converges
///
/// Buffer `a` is rewritten in place as it converges towards `b`.
#[derive(Debug, Clone)]
pub struct WorkingPair {
    a: SampleBuffer,
    b: SampleBuffer,
}

impl WorkingPair {
    pub fn new(a: SampleBuffer, b: SampleBuffer) -> Result<Self, BufferError> {
        if a.len() != b.len() {
            return Err(BufferError::PairLengthMismatch {
                a: a.len(),
                b: b.len(),
            });
        }
        if a.is_empty() {
            return Err(BufferError::EmptyPair);
        }
        Ok(Self { a, b })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.a.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    pub fn a(&self) -> &SampleBuffer {
        &self.a
    }

    pub fn b(&self) -> &SampleBuffer {
        &self.b
    }

    /// Split borrow: mutable `a`, shared `b`
    #[inline]
    pub fn split_mut(&mut self) -> (&mut SampleBuffer, &SampleBuffer) {
        (&mut self.a, &self.b)
    }

    pub fn into_parts(self) -> (SampleBuffer, SampleBuffer) {
        (self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_missing_channels() {
        assert_eq!(SampleBuffer::new(vec![], 44100), Err(BufferError::NoChannels));
    }

    #[test]
    fn test_rejects_ragged_channels() {
        let err = SampleBuffer::new(vec![vec![0.0; 4], vec![0.0; 3]], 44100).unwrap_err();
        assert_eq!(
            err,
            BufferError::ChannelLengthMismatch {
                channel: 1,
                expected: 4,
                found: 3
            }
        );
    }

    #[test]
    fn test_length_and_access() {
        let buffer = SampleBuffer::new(vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]], 48000).unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.get(1, 2), Some(0.6));
        assert_eq!(buffer.get(2, 0), None);
        assert_eq!(buffer.get(0, 3), None);
    }

    #[test]
    fn test_mono_into_stereo_duplicates() {
        let buffer = SampleBuffer::from_mono(vec![0.25, -0.25], 44100).into_stereo();
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.channel(0), buffer.channel(1));
    }

    #[test]
    fn test_working_pair_requires_equal_lengths() {
        let a = SampleBuffer::silence(2, 10, 44100);
        let b = SampleBuffer::silence(2, 12, 44100);
        assert_eq!(
            WorkingPair::new(a, b).unwrap_err(),
            BufferError::PairLengthMismatch { a: 10, b: 12 }
        );

        let empty = WorkingPair::new(SampleBuffer::default(), SampleBuffer::default());
        assert_eq!(empty.unwrap_err(), BufferError::EmptyPair);
    }
}
