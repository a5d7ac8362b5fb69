//! Lane message port
//!
//! Wire types for talking to a lane from outside the process-local API:
//! incoming [`LaneMessage`]s (`start`, `stop`, `sendSample`) and outgoing
//! [`LaneNotification`]s (`requestNewSample`, `nextTrigger`). Both are JSON
//! objects tagged by a `type` field.
//!
//! ```json
//! {"type":"sendSample","index":0,"buffer":{"channels":[[0.0,0.1],[0.0,0.1]],"length":2,"sampleRate":44100}}
//! {"type":"requestNewSample","processorId":"byte-step-processor-2"}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::SampleBuffer;
use crate::engine::LaneEvent;
use crate::types::{LaneId, Sample, SAMPLE_RATE};

/// Number of fresh-buffer slots per lane
pub const SLOT_COUNT: usize = 2;

/// Errors for malformed inter-context messages
///
/// These are logged and the message is dropped; the sender is never told.
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("failed to decode lane message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("sendSample without a buffer payload")]
    MissingBuffer,

    #[error("sample payload has no channels")]
    NoChannels,

    #[error("channel {channel} has {found} frames, payload declares {declared}")]
    LengthMismatch {
        channel: usize,
        declared: usize,
        found: usize,
    },

    #[error("sample slot {0} out of range (expected 0 or 1)")]
    InvalidSlot(usize),

    #[error("unknown lane: {0}")]
    UnknownLane(String),
}

/// Plain array-of-floats form of a sample buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePayload {
    #[serde(default)]
    pub channels: Vec<Vec<Sample>>,
    #[serde(default)]
    pub length: usize,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_sample_rate() -> u32 {
    SAMPLE_RATE
}

impl SamplePayload {
    pub fn from_buffer(buffer: &SampleBuffer) -> Self {
        Self {
            channels: (0..buffer.num_channels())
                .filter_map(|ch| buffer.channel(ch).map(<[Sample]>::to_vec))
                .collect(),
            length: buffer.len(),
            sample_rate: buffer.sample_rate(),
        }
    }

    /// Validate and convert to a two-channel [`SampleBuffer`]
    ///
    /// Every channel must match the declared length. Mono is duplicated.
    pub fn into_buffer(self) -> Result<SampleBuffer, MessageError> {
        if self.channels.is_empty() {
            return Err(MessageError::NoChannels);
        }
        if let Some((channel, data)) = self
            .channels
            .iter()
            .enumerate()
            .find(|(_, data)| data.len() != self.length)
        {
            return Err(MessageError::LengthMismatch {
                channel,
                declared: self.length,
                found: data.len(),
            });
        }
        let buffer = SampleBuffer::new(self.channels, self.sample_rate).map_err(|_| MessageError::NoChannels)?;
        Ok(buffer.into_stereo())
    }
}

impl From<SampleBuffer> for SamplePayload {
    fn from(buffer: SampleBuffer) -> Self {
        Self::from_buffer(&buffer)
    }
}

/// Messages accepted by a lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LaneMessage {
    Start,
    Stop,
    /// Fill one of the lane's two fresh-buffer slots
    SendSample {
        #[serde(default)]
        buffer: Option<SamplePayload>,
        #[serde(default)]
        index: usize,
    },
}

impl LaneMessage {
    pub fn send_sample(buffer: SampleBuffer, index: usize) -> Self {
        LaneMessage::SendSample {
            buffer: Some(buffer.into()),
            index,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Validated `sendSample` contents
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDelivery {
    pub slot: usize,
    pub buffer: SampleBuffer,
}

/// Check a `sendSample` message's slot and payload
pub fn validate_send_sample(buffer: Option<SamplePayload>, index: usize) -> Result<SlotDelivery, MessageError> {
    if index >= SLOT_COUNT {
        return Err(MessageError::InvalidSlot(index));
    }
    let payload = buffer.ok_or(MessageError::MissingBuffer)?;
    Ok(SlotDelivery {
        slot: index,
        buffer: payload.into_buffer()?,
    })
}

/// Notifications a lane emits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LaneNotification {
    #[serde(rename_all = "camelCase")]
    RequestNewSample { processor_id: String },
    #[serde(rename_all = "camelCase")]
    NextTrigger { processor_id: String },
}

impl LaneNotification {
    /// Notification for a lane event, `None` for events with no wire form
    pub fn from_event(lane: LaneId, event: LaneEvent) -> Option<Self> {
        let processor_id = lane.processor_name();
        match event {
            LaneEvent::RequestNewSample => Some(LaneNotification::RequestNewSample { processor_id }),
            LaneEvent::NextTrigger => Some(LaneNotification::NextTrigger { processor_id }),
            LaneEvent::PairSwapped => None,
        }
    }

    pub fn processor_id(&self) -> &str {
        match self {
            LaneNotification::RequestNewSample { processor_id }
            | LaneNotification::NextTrigger { processor_id } => processor_id,
        }
    }

    pub fn lane(&self) -> Result<LaneId, MessageError> {
        LaneId::from_processor_name(self.processor_id())
            .ok_or_else(|| MessageError::UnknownLane(self.processor_id().to_string()))
    }

    pub fn to_json(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_messages() {
        assert_eq!(LaneMessage::from_json(r#"{"type":"start"}"#).unwrap(), LaneMessage::Start);
        assert_eq!(LaneMessage::from_json(r#"{"type":"stop"}"#).unwrap(), LaneMessage::Stop);
        assert!(matches!(
            LaneMessage::from_json(r#"{"type":"rewind"}"#),
            Err(MessageError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_send_sample() {
        let json = r#"{"type":"sendSample","index":1,"buffer":{"channels":[[0.5,-0.5]],"length":2,"sampleRate":48000}}"#;
        let LaneMessage::SendSample { buffer, index } = LaneMessage::from_json(json).unwrap() else {
            panic!("expected sendSample");
        };
        let delivery = validate_send_sample(buffer, index).unwrap();
        assert_eq!(delivery.slot, 1);
        assert_eq!(delivery.buffer.num_channels(), 2);
        assert_eq!(delivery.buffer.sample_rate(), 48000);
        assert_eq!(delivery.buffer.channel(1), Some(&[0.5, -0.5][..]));
    }

    #[test]
    fn test_send_sample_without_buffer_is_rejected() {
        let msg = LaneMessage::from_json(r#"{"type":"sendSample","index":0}"#).unwrap();
        let LaneMessage::SendSample { buffer, index } = msg else {
            panic!("expected sendSample");
        };
        assert!(matches!(validate_send_sample(buffer, index), Err(MessageError::MissingBuffer)));
    }

    #[test]
    fn test_invalid_payloads_are_rejected() {
        let empty = SamplePayload {
            channels: vec![],
            length: 0,
            sample_rate: 44100,
        };
        assert!(matches!(validate_send_sample(Some(empty), 0), Err(MessageError::NoChannels)));

        let ragged = SamplePayload {
            channels: vec![vec![0.0; 4], vec![0.0; 3]],
            length: 4,
            sample_rate: 44100,
        };
        assert!(matches!(
            validate_send_sample(Some(ragged), 0),
            Err(MessageError::LengthMismatch { channel: 1, declared: 4, found: 3 })
        ));

        let ok = SamplePayload::from_buffer(&SampleBuffer::silence(2, 4, 44100));
        assert!(matches!(validate_send_sample(Some(ok), 2), Err(MessageError::InvalidSlot(2))));
    }

    #[test]
    fn test_payload_roundtrip_through_json() {
        let buffer = SampleBuffer::new(vec![vec![0.25; 3], vec![-0.25; 3]], 44100).unwrap();
        let json = LaneMessage::send_sample(buffer.clone(), 0).to_json().unwrap();
        assert!(json.contains(r#""type":"sendSample""#));
        assert!(json.contains(r#""sampleRate":44100"#));

        let LaneMessage::SendSample { buffer: payload, index } = LaneMessage::from_json(&json).unwrap() else {
            panic!("expected sendSample");
        };
        assert_eq!(validate_send_sample(payload, index).unwrap().buffer, buffer);
    }

    #[test]
    fn test_notification_wire_format() {
        let n = LaneNotification::from_event(LaneId(1), LaneEvent::RequestNewSample).unwrap();
        assert_eq!(
            n.to_json().unwrap(),
            r#"{"type":"requestNewSample","processorId":"byte-step-processor-2"}"#
        );
        assert_eq!(n.lane().unwrap(), LaneId(1));

        let n = LaneNotification::from_json(r#"{"type":"nextTrigger","processorId":"proc3"}"#).unwrap();
        assert_eq!(n.lane().unwrap(), LaneId(2));
        assert!(LaneNotification::from_event(LaneId(0), LaneEvent::PairSwapped).is_none());
    }
}
