//! Fresh-buffer inbox - the two `sendSample` slots of a lane

use crate::buffer::SampleBuffer;
use crate::message::SLOT_COUNT;

#[derive(Debug, Default)]
pub struct SampleInbox {
    slots: [Option<SampleBuffer>; SLOT_COUNT],
}

impl SampleInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a buffer in `slot`; once both slots are filled they are taken out
    ///
    /// A slot delivered twice keeps the newer buffer. Out-of-range slots are
    /// rejected upstream by message validation and ignored here.
    pub fn deliver(&mut self, slot: usize, buffer: SampleBuffer) -> Option<(SampleBuffer, SampleBuffer)> {
        let entry = self.slots.get_mut(slot)?;
        if entry.is_some() {
            log::debug!("inbox: slot {} overwritten before its pair was complete", slot);
        }
        *entry = Some(buffer);

        if self.slots.iter().all(Option::is_some) {
            let [first, second] = std::mem::take(&mut self.slots);
            return first.zip(second);
        }
        None
    }

    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(len: usize) -> SampleBuffer {
        SampleBuffer::silence(2, len, 44100)
    }

    #[test]
    fn test_pair_completes_in_any_order() {
        let mut inbox = SampleInbox::new();
        assert!(inbox.deliver(1, buffer(20)).is_none());
        let (first, second) = inbox.deliver(0, buffer(10)).unwrap();
        assert_eq!((first.len(), second.len()), (10, 20));
        assert_eq!(inbox.filled(), 0);
    }

    #[test]
    fn test_redelivery_replaces_slot() {
        let mut inbox = SampleInbox::new();
        inbox.deliver(0, buffer(1));
        inbox.deliver(0, buffer(2));
        assert_eq!(inbox.filled(), 1);
        let (first, _) = inbox.deliver(1, buffer(3)).unwrap();
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_out_of_range_slot_ignored() {
        let mut inbox = SampleInbox::new();
        assert!(inbox.deliver(7, buffer(1)).is_none());
        assert_eq!(inbox.filled(), 0);
    }
}
