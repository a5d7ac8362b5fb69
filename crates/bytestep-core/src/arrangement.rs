//! Buffer arrangement
//!
//! Reconciles two buffers of possibly different lengths into an equal-length
//! pair. The longer buffer always passes through untouched; the shorter side
//! is rebuilt at the longer length using one of three layout policies:
//!
//! - [`equal`]: tile the shorter buffer with wrap-around, centred by half of
//!   the remainder, zero where no source frame exists
//! - [`repeat`]: lay the shorter buffer down `longer / shorter` times, spaced
//!   according to a [`Justify`] policy
//! - [`random`]: [`repeat`] with a uniformly chosen [`Justify`]
//!
//! Rebuilt buffers take their channel count from the longer buffer. A source
//! channel missing on the shorter side reads as silence.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::buffer::SampleBuffer;
use crate::types::Sample;

/// Buffers shorter than this are rebuilt as silence instead of tiled
pub const MIN_ARRANGE_LEN: usize = 1;

/// Spacing policy for [`repeat`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Justify {
    /// Remainder spread between repetitions, none before the first
    SpaceBetween,
    /// Remainder spread evenly before, between and after repetitions
    SpaceEvenly,
    /// Half the remainder before the first repetition
    Center,
    /// Repetitions packed from frame 0
    Start,
}

impl Justify {
    pub const ALL: [Justify; 4] = [
        Justify::SpaceBetween,
        Justify::SpaceEvenly,
        Justify::Center,
        Justify::Start,
    ];

    /// `(spacing, leading offset)` in frames for `fit` repetitions leaving `rest` frames
    pub fn layout(self, rest: usize, fit: usize) -> (f64, f64) {
        let rest = rest as f64;
        match self {
            Justify::SpaceBetween => {
                let spacing = if fit > 1 { rest / (fit - 1) as f64 } else { 0.0 };
                (spacing, 0.0)
            }
            Justify::SpaceEvenly => {
                let spacing = rest / (fit + 1) as f64;
                (spacing, spacing)
            }
            Justify::Center => (0.0, rest / 2.0),
            Justify::Start => (0.0, 0.0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Justify::SpaceBetween => "space-between",
            Justify::SpaceEvenly => "space-evenly",
            Justify::Center => "center",
            Justify::Start => "start",
        }
    }
}

impl Default for Justify {
    fn default() -> Self {
        Justify::SpaceBetween
    }
}

/// Which arrangement a lane applies to freshly delivered buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ArrangementPolicy {
    Equal,
    Repeat {
        #[serde(default)]
        justify: Justify,
    },
    Random,
}

impl Default for ArrangementPolicy {
    fn default() -> Self {
        ArrangementPolicy::Random
    }
}

impl ArrangementPolicy {
    pub fn arrange<R: Rng + ?Sized>(
        &self,
        s1: SampleBuffer,
        s2: SampleBuffer,
        rng: &mut R,
    ) -> Arranged {
        match *self {
            ArrangementPolicy::Equal => equal(s1, s2),
            ArrangementPolicy::Repeat { justify } => repeat(s1, s2, justify),
            ArrangementPolicy::Random => random(s1, s2, rng),
        }
    }
}

/// Equal-length result of an arrangement, in the caller's `(s1, s2)` order
#[derive(Debug, Clone, PartialEq)]
pub struct Arranged {
    pub s1: SampleBuffer,
    pub s2: SampleBuffer,
}

/// Stretch the shorter buffer to the longer length by wrap-around tiling
pub fn equal(s1: SampleBuffer, s2: SampleBuffer) -> Arranged {
    if s1.len() > s2.len() {
        let s2 = fit_in(&s1, &s2);
        Arranged { s1, s2 }
    } else if s2.len() > s1.len() {
        let s1 = fit_in(&s2, &s1);
        Arranged { s1, s2 }
    } else {
        Arranged { s1, s2 }
    }
}

fn fit_in(longer: &SampleBuffer, smaller: &SampleBuffer) -> SampleBuffer {
    let buff_len = longer.len();
    let smaller_len = smaller.len();
    let num_channels = longer.num_channels();

    if smaller_len < MIN_ARRANGE_LEN {
        return SampleBuffer::silence(num_channels, buff_len, smaller.sample_rate());
    }

    let fit = buff_len / smaller_len;
    let rest = buff_len - fit * smaller_len;
    // fit >= 1 here: smaller_len <= buff_len
    let mod_room = smaller_len as f64 + rest as f64 / fit as f64;
    let lead = rest as f64 / 2.0;

    let channels = (0..num_channels)
        .map(|ch| {
            let source = smaller.channel(ch);
            (0..buff_len)
                .map(|i| {
                    let index = (i as f64 - lead) % mod_room;
                    source.and_then(|data| sample_at(data, index)).unwrap_or(0.0)
                })
                .collect()
        })
        .collect();

    rebuilt(channels, num_channels, buff_len, smaller.sample_rate())
}

/// Only non-negative whole indices address a frame
#[inline]
fn sample_at(data: &[Sample], index: f64) -> Option<Sample> {
    if index < 0.0 || index.fract() != 0.0 {
        return None;
    }
    data.get(index as usize).copied()
}

/// Lay the shorter buffer down as many whole times as it fits
///
/// Fractional spacing offsets are floored to a whole frame, so every
/// repetition is written. Unlike [`equal`], no frames are dropped for
/// landing between indices.
pub fn repeat(s1: SampleBuffer, s2: SampleBuffer, justify: Justify) -> Arranged {
    let s1_longer = s1.len() > s2.len();
    let (longer, smaller) = if s1_longer { (s1, s2) } else { (s2, s1) };

    let longer_len = longer.len();
    let smaller_len = smaller.len();
    let num_channels = longer.num_channels();

    let rebuilt_buffer = if smaller_len < MIN_ARRANGE_LEN {
        SampleBuffer::silence(num_channels, longer_len, smaller.sample_rate())
    } else {
        let fit = longer_len / smaller_len;
        let rest = longer_len - fit * smaller_len;
        let (spacing, initial_offset) = justify.layout(rest, fit);

        let channels = (0..num_channels)
            .map(|ch| {
                let mut data = vec![0.0; longer_len];
                let source = smaller.channel(ch);
                let mut offset = initial_offset;
                for rep in 0..fit {
                    let base = rep * smaller_len + offset.floor() as usize;
                    for k in 0..smaller_len {
                        let index = base + k;
                        if index >= longer_len {
                            break;
                        }
                        data[index] = source.and_then(|s| s.get(k).copied()).unwrap_or(0.0);
                    }
                    offset += spacing;
                }
                data
            })
            .collect();

        rebuilt(channels, num_channels, longer_len, smaller.sample_rate())
    };

    if s1_longer {
        Arranged {
            s1: longer,
            s2: rebuilt_buffer,
        }
    } else {
        Arranged {
            s1: rebuilt_buffer,
            s2: longer,
        }
    }
}

/// Pick one of the four [`Justify`] policies uniformly
pub fn pick_justify<R: Rng + ?Sized>(rng: &mut R) -> Justify {
    Justify::ALL[rng.gen_range(0..Justify::ALL.len())]
}

/// [`repeat`] with a randomly chosen justify policy
pub fn random<R: Rng + ?Sized>(s1: SampleBuffer, s2: SampleBuffer, rng: &mut R) -> Arranged {
    let justify = pick_justify(rng);
    log::debug!("arrangement: random picked {}", justify.name());
    repeat(s1, s2, justify)
}

fn rebuilt(channels: Vec<Vec<Sample>>, num_channels: usize, len: usize, sample_rate: u32) -> SampleBuffer {
    // Every channel was built at `len`, so construction cannot fail
    SampleBuffer::new(channels, sample_rate)
        .unwrap_or_else(|_| SampleBuffer::silence(num_channels, len, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ramp(len: usize) -> SampleBuffer {
        let data: Vec<Sample> = (0..len).map(|i| (i as Sample + 1.0) / 10_000.0).collect();
        SampleBuffer::new(vec![data.clone(), data], 44100).unwrap()
    }

    fn constant(len: usize, value: Sample) -> SampleBuffer {
        SampleBuffer::new(vec![vec![value; len], vec![value; len]], 44100).unwrap()
    }

    #[test]
    fn test_equal_matches_longer_length() {
        for (a, b) in [(1000, 300), (300, 1000), (7, 7), (64, 1), (5, 17)] {
            let result = equal(ramp(a), ramp(b));
            assert_eq!(result.s1.len(), result.s2.len());
            assert_eq!(result.s1.len(), a.max(b));
        }
    }

    #[test]
    fn test_equal_keeps_longer_untouched() {
        let long = ramp(1000);
        let result = equal(long.clone(), ramp(300));
        assert_eq!(result.s1, long);

        let result = equal(ramp(300), long.clone());
        assert_eq!(result.s2, long);
    }

    #[test]
    fn test_equal_wraps_and_zero_fills() {
        // 1000 / 300: fit 3, rest 100, lead 50, tile length 333.33..
        let short = ramp(300);
        let result = equal(ramp(1000), short.clone());
        let rebuilt = result.s2.channel(0).unwrap();

        // Before the lead-in nothing maps to a valid index
        assert!(rebuilt[..50].iter().all(|&s| s == 0.0));
        // First tile is a straight copy
        assert_eq!(&rebuilt[50..350], short.channel(0).unwrap());
        // Index 300 is past the source
        assert_eq!(rebuilt[350], 0.0);
        // Later tiles land on fractional indices
        assert!(rebuilt[351..].iter().all(|&s| s == 0.0));
        assert_eq!(rebuilt.len(), 1000);
    }

    #[test]
    fn test_equal_exact_multiple_is_plain_tiling() {
        let short = ramp(250);
        let result = equal(short.clone(), ramp(1000));
        let rebuilt = result.s1.channel(1).unwrap();
        for tile in 0..4 {
            assert_eq!(&rebuilt[tile * 250..(tile + 1) * 250], short.channel(1).unwrap());
        }
    }

    #[test]
    fn test_equal_empty_shorter_becomes_silence() {
        let result = equal(ramp(64), SampleBuffer::default());
        assert_eq!(result.s2.len(), 64);
        assert!(result.s2.channel(0).unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_repeat_start_places_copy_at_zero() {
        let short = ramp(300);
        let result = repeat(ramp(1000), short.clone(), Justify::Start);
        let rebuilt = result.s2.channel(0).unwrap();
        assert_eq!(&rebuilt[..300], short.channel(0).unwrap());
        assert_eq!(&rebuilt[300..600], short.channel(0).unwrap());
        assert_eq!(&rebuilt[600..900], short.channel(0).unwrap());
        assert!(rebuilt[900..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_repeat_center_offsets_by_half_rest() {
        let result = repeat(ramp(1000), constant(300, 0.5), Justify::Center);
        let rebuilt = result.s2.channel(0).unwrap();
        assert!(rebuilt[..50].iter().all(|&s| s == 0.0));
        assert!(rebuilt[50..950].iter().all(|&s| s == 0.5));
        assert!(rebuilt[950..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_repeat_floors_fractional_offsets() {
        // 1001 / 300: rest 101, centered lead of 50.5
        let short = ramp(300);
        let result = repeat(ramp(1001), short.clone(), Justify::Center);
        let rebuilt = result.s2.channel(0).unwrap();
        assert!(rebuilt[..50].iter().all(|&s| s == 0.0));
        for rep in 0..3 {
            let start = 50 + rep * 300;
            assert_eq!(&rebuilt[start..start + 300], short.channel(0).unwrap());
        }
        assert!(rebuilt[950..].iter().all(|&s| s == 0.0));

        // equal drops frames on fractional indices; here that is every tile
        let tiled = equal(ramp(1001), short);
        assert!(tiled.s2.channel(0).unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_repeat_space_between_reaches_end() {
        let result = repeat(ramp(1000), constant(300, 0.5), Justify::SpaceBetween);
        let rebuilt = result.s2.channel(0).unwrap();
        // gaps of 50 between the three copies, last copy ends on the final frame
        assert!(rebuilt[..300].iter().all(|&s| s == 0.5));
        assert!(rebuilt[300..350].iter().all(|&s| s == 0.0));
        assert!(rebuilt[350..650].iter().all(|&s| s == 0.5));
        assert!(rebuilt[700..].iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_repeat_space_evenly_leads_with_spacing() {
        // rest 100 over 4 gaps = 25
        let result = repeat(ramp(1000), constant(300, 0.5), Justify::SpaceEvenly);
        let rebuilt = result.s2.channel(0).unwrap();
        assert!(rebuilt[..25].iter().all(|&s| s == 0.0));
        assert!(rebuilt[25..325].iter().all(|&s| s == 0.5));
        assert!(rebuilt[975..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_repeat_preserves_argument_order() {
        let long = ramp(900);
        let result = repeat(ramp(200), long.clone(), Justify::Start);
        assert_eq!(result.s2, long);
        assert_eq!(result.s1.len(), 900);
    }

    #[test]
    fn test_repeat_stays_in_bounds_for_awkward_lengths() {
        for justify in Justify::ALL {
            for (a, b) in [(1001, 7), (10, 3), (97, 96), (5, 5), (3, 1)] {
                let result = repeat(ramp(a), ramp(b), justify);
                assert_eq!(result.s1.len(), result.s2.len());
                assert_eq!(result.s1.len(), a.max(b));
            }
        }
    }

    #[test]
    fn test_repeat_missing_source_channel_reads_silence() {
        let mono = SampleBuffer::from_mono(vec![0.5; 10], 44100);
        let result = repeat(constant(40, 0.1), mono, Justify::Start);
        assert!(result.s2.channel(0).unwrap().iter().all(|&s| s == 0.5));
        assert!(result.s2.channel(1).unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_random_delegates_to_a_justify_policy() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..16 {
            let result = random(ramp(1000), ramp(300), &mut rng);
            let matches_one = Justify::ALL
                .iter()
                .any(|&j| repeat(ramp(1000), ramp(300), j) == result);
            assert!(matches_one);
        }
    }

    #[test]
    fn test_random_is_reproducible_with_seed() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for _ in 0..8 {
            assert_eq!(random(ramp(777), ramp(100), &mut a), random(ramp(777), ramp(100), &mut b));
        }
    }

    #[test]
    fn test_policy_roundtrips_through_yaml() {
        let policy = ArrangementPolicy::Repeat {
            justify: Justify::SpaceEvenly,
        };
        let yaml = serde_yaml::to_string(&policy).unwrap();
        assert!(yaml.contains("space-evenly"));
        let back: ArrangementPolicy = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, policy);
    }
}
