//! 8-bit byte domain used by the convergence step
//!
//! Samples in `[-1, 1]` map onto `0..=255` with `round((s + 1) * 127.5)`,
//! rounding halves upward. Out-of-range input is clamped into the byte range.

use crate::types::Sample;

/// Default per-frame step in the byte domain
pub const DEFAULT_STEP: u8 = 2;

/// Float sample to byte value
#[inline]
pub fn to_byte(sample: Sample) -> u8 {
    let scaled = ((sample as f64 + 1.0) * 127.5 + 0.5).floor();
    if scaled.is_nan() {
        return 128;
    }
    scaled.clamp(0.0, 255.0) as u8
}

/// Byte value back to a float sample
#[inline]
pub fn from_byte(byte: u8) -> Sample {
    (byte as f64 / 127.5 - 1.0) as Sample
}

/// Result of one convergence step at a single index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub value: u8,
    pub finished: bool,
}

/// Move `current` toward `target` by `step`
///
/// Only an index that already matches, or a move that overshoots and is
/// clamped back onto `target`, counts as finished. A move that lands exactly
/// on `target` does not; it finishes on the next frame.
#[inline]
pub fn step_toward(current: u8, target: u8, step: u8) -> Step {
    if current < target {
        let next = current as u16 + step as u16;
        if next > target as u16 {
            Step {
                value: target,
                finished: true,
            }
        } else {
            Step {
                value: next as u8,
                finished: false,
            }
        }
    } else if current > target {
        let next = current as i16 - step as i16;
        if next < target as i16 {
            Step {
                value: target,
                finished: true,
            }
        } else {
            Step {
                value: next as u8,
                finished: false,
            }
        }
    } else {
        Step {
            value: current,
            finished: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_mapping_endpoints() {
        assert_eq!(to_byte(-1.0), 0);
        assert_eq!(to_byte(1.0), 255);
        // 127.5 rounds up
        assert_eq!(to_byte(0.0), 128);
        assert_eq!(to_byte(3.0), 255);
        assert_eq!(to_byte(-3.0), 0);
        assert_eq!(to_byte(Sample::NAN), 128);
    }

    #[test]
    fn test_byte_roundtrip_is_stable() {
        for byte in 0..=255u8 {
            assert_eq!(to_byte(from_byte(byte)), byte);
        }
    }

    #[test]
    fn test_equal_values_finish_immediately() {
        let step = step_toward(77, 77, DEFAULT_STEP);
        assert_eq!(step, Step { value: 77, finished: true });
    }

    #[test]
    fn test_step_clamps_to_target() {
        assert_eq!(step_toward(10, 11, 2), Step { value: 11, finished: true });
        assert_eq!(step_toward(11, 10, 2), Step { value: 10, finished: true });
        assert_eq!(step_toward(10, 20, 2), Step { value: 12, finished: false });
        assert_eq!(step_toward(20, 10, 2), Step { value: 18, finished: false });
    }

    #[test]
    fn test_exact_landing_finishes_next_frame() {
        assert_eq!(step_toward(10, 12, 2), Step { value: 12, finished: false });
        assert_eq!(step_toward(12, 10, 2), Step { value: 10, finished: false });
        assert_eq!(step_toward(12, 12, 2), Step { value: 12, finished: true });
    }

    #[test]
    fn test_full_range_converges_in_128_frames() {
        for (start, target) in [(0u8, 255u8), (255, 0)] {
            let mut value = start;
            let mut frames = 0;
            loop {
                let step = step_toward(value, target, DEFAULT_STEP);
                frames += 1;
                value = step.value;
                if step.finished {
                    break;
                }
            }
            assert_eq!(value, target);
            assert_eq!(frames, 128);
        }
    }

    #[test]
    fn test_no_oscillation_after_convergence() {
        let mut value = 3;
        for _ in 0..10 {
            value = step_toward(value, 200, 2).value;
        }
        let settled = (0..200).fold(value, |v, _| step_toward(v, 200, 2).value);
        assert_eq!(settled, 200);
        for _ in 0..10 {
            let step = step_toward(settled, 200, 2);
            assert_eq!(step.value, 200);
            assert!(step.finished);
        }
    }
}
