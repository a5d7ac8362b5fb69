//! Fade envelope for the echo overlay
//!
//! A trapezoid over a fixed window: linear ramp in, flat at 1, linear ramp
//! out, then 0 once the window has elapsed.

/// Window length in multiples of the working buffer length
pub const DEFAULT_FADE_WINDOW: usize = 3;

/// Fraction of the window spent ramping in (and again ramping out)
pub const DEFAULT_FADE_RAMP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeEnvelope {
    sample_index: usize,
    total_samples: usize,
    fade_in_samples: usize,
    fade_out_samples: usize,
}

impl FadeEnvelope {
    pub fn new(total_samples: usize, fade_in_samples: usize, fade_out_samples: usize) -> Self {
        Self {
            sample_index: 0,
            total_samples,
            fade_in_samples: fade_in_samples.min(total_samples),
            fade_out_samples: fade_out_samples.min(total_samples),
        }
    }

    /// Envelope spanning `window` buffer lengths, ramping over `ramp` of it
    pub fn for_window(buffer_len: usize, window: usize, ramp: f32) -> Self {
        let total = buffer_len.saturating_mul(window);
        let ramp_samples = (total as f64 * ramp.clamp(0.0, 0.5) as f64).floor() as usize;
        Self::new(total, ramp_samples, ramp_samples)
    }

    /// Value at the current index and the state one frame later
    ///
    /// Past the window the value is 0 and the state no longer moves.
    #[inline]
    pub fn next_value(self) -> (f32, Self) {
        if self.is_finished() {
            return (0.0, self);
        }
        let idx = self.sample_index;
        let value = if idx < self.fade_in_samples {
            idx as f32 / self.fade_in_samples as f32
        } else if idx > self.total_samples - self.fade_out_samples {
            (self.total_samples - idx) as f32 / self.fade_out_samples as f32
        } else {
            1.0
        };
        let next = Self {
            sample_index: idx + 1,
            ..self
        };
        (value, next)
    }

    /// In-place form of [`next_value`](Self::next_value)
    #[inline]
    pub fn advance(&mut self) -> f32 {
        let (value, next) = self.next_value();
        *self = next;
        value
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.sample_index >= self.total_samples
    }

    pub fn sample_index(&self) -> usize {
        self.sample_index
    }

    pub fn total_samples(&self) -> usize {
        self.total_samples
    }
}
