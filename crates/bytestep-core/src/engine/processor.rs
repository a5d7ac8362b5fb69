//! Host-facing frame callback

use crate::types::Sample;

/// A unit the audio host calls once per block of output frames
///
/// `outputs` holds one slice per output channel, all of the block's length.
/// The return value tells the host whether to keep calling; lanes always
/// return `true`, even while stopped, so the callback stays alive.
pub trait FrameProcessor: Send {
    fn produce_frame(&mut self, outputs: &mut [&mut [Sample]]) -> bool;
}
