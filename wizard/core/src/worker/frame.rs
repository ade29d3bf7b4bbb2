//! Worker Frame Codec
//!
//! Length-prefixed JSON frames with a CRC32 of the payload, used on the
//! worker socket in both directions.
//!
//! ```text
//! +----------------+----------------+-------------------------------------+
//! | Length (4)     | Checksum (4)   | JSON payload (Length bytes)         |
//! | big-endian u32 | CRC32, BE      | WorkerRequest or WorkerFrame        |
//! +----------------+----------------+-------------------------------------+
//! ```
//!
//! The length is checked against [`MAX_FRAME_SIZE`] before any payload is
//! buffered for decoding.

use serde::{de::DeserializeOwned, Serialize};

use super::TransportError;

/// Largest payload accepted in either direction (10 MiB)
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Length + checksum
pub const HEADER_SIZE: usize = 8;

const INITIAL_CAPACITY: usize = 4096;

fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(word)
}

/// Encode one message as a complete frame
///
/// # Errors
///
/// Returns `TransportError::SerializationError` if the message cannot be
/// serialized or its payload exceeds [`MAX_FRAME_SIZE`].
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, TransportError> {
    let payload =
        serde_json::to_vec(msg).map_err(|e| TransportError::SerializationError(e.to_string()))?;

    let len = u32::try_from(payload.len())
        .ok()
        .filter(|_| payload.len() <= MAX_FRAME_SIZE)
        .ok_or_else(|| {
            TransportError::SerializationError(format!(
                "Frame too large: {} bytes (max: {MAX_FRAME_SIZE})",
                payload.len()
            ))
        })?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Incremental frame decoder for a byte stream
///
/// Feed it whatever the socket returns with [`FrameDecoder::push`], then call
/// [`FrameDecoder::decode`] until it yields `Ok(None)`.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    consumed: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(INITIAL_CAPACITY),
            consumed: 0,
        }
    }

    /// Append bytes read from the stream
    pub fn push(&mut self, data: &[u8]) {
        if self.consumed > INITIAL_CAPACITY && self.consumed > self.buffer.len() / 2 {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Bytes buffered but not yet decoded
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.consumed
    }

    /// Decode the next complete frame, if one is buffered
    ///
    /// # Errors
    ///
    /// - `ChecksumMismatch` when the payload does not match its CRC32
    /// - `SerializationError` for oversized frames or malformed JSON
    ///
    /// A frame that fails its checksum or JSON decoding is skipped so the
    /// stream stays aligned; an oversized length poisons the stream and the
    /// caller should drop the connection.
    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<Option<T>, TransportError> {
        let pending = &self.buffer[self.consumed..];
        if pending.len() < HEADER_SIZE {
            return Ok(None);
        }

        let len = read_u32(pending) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(TransportError::SerializationError(format!(
                "Frame size {len} exceeds maximum {MAX_FRAME_SIZE}"
            )));
        }
        if pending.len() < HEADER_SIZE + len {
            return Ok(None);
        }

        let expected = read_u32(&pending[4..]);
        let payload = &pending[HEADER_SIZE..HEADER_SIZE + len];
        let actual = crc32fast::hash(payload);
        let decoded = if actual == expected {
            serde_json::from_slice(payload)
                .map_err(|e| TransportError::SerializationError(e.to_string()))
        } else {
            Err(TransportError::ChecksumMismatch { expected, actual })
        };

        self.consumed += HEADER_SIZE + len;
        decoded.map(Some)
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.consumed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::protocol::{ReplyOutcome, WorkerFrame};
    use crate::worker::EventChannel;
    use serde_json::json;

    fn progress_frame(value: f64) -> WorkerFrame {
        WorkerFrame::Event {
            channel: EventChannel::Progress,
            payload: json!(value),
        }
    }

    #[test]
    fn test_partial_frame_waits_for_data() {
        let encoded = encode(&progress_frame(42.0)).unwrap();
        let mut decoder = FrameDecoder::new();

        decoder.push(&encoded[..3]);
        assert!(matches!(decoder.decode::<WorkerFrame>(), Ok(None)));

        decoder.push(&encoded[3..encoded.len() - 1]);
        assert!(matches!(decoder.decode::<WorkerFrame>(), Ok(None)));

        decoder.push(&encoded[encoded.len() - 1..]);
        let frame: WorkerFrame = decoder.decode().unwrap().unwrap();
        assert_eq!(frame, progress_frame(42.0));
        assert_eq!(decoder.available(), 0);
    }

    #[test]
    fn test_multiple_frames_in_one_read() {
        let mut bytes = encode(&progress_frame(1.0)).unwrap();
        bytes.extend(
            encode(&WorkerFrame::Reply {
                id: 7,
                outcome: ReplyOutcome::Ok(json!(["a.xci"])),
            })
            .unwrap(),
        );

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes);

        assert_eq!(decoder.decode::<WorkerFrame>().unwrap(), Some(progress_frame(1.0)));
        assert!(matches!(
            decoder.decode::<WorkerFrame>().unwrap(),
            Some(WorkerFrame::Reply { id: 7, .. })
        ));
        assert!(decoder.decode::<WorkerFrame>().unwrap().is_none());
    }

    #[test]
    fn test_checksum_mismatch_skips_frame() {
        let mut corrupted = encode(&progress_frame(5.0)).unwrap();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xFF;
        corrupted.extend(encode(&progress_frame(6.0)).unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.push(&corrupted);

        assert!(matches!(
            decoder.decode::<WorkerFrame>(),
            Err(TransportError::ChecksumMismatch { .. })
        ));
        assert_eq!(decoder.decode::<WorkerFrame>().unwrap(), Some(progress_frame(6.0)));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut decoder = FrameDecoder::new();
        let len = u32::try_from(MAX_FRAME_SIZE + 1).unwrap();
        decoder.push(&len.to_be_bytes());
        decoder.push(&[0, 0, 0, 0]);

        assert!(matches!(
            decoder.decode::<WorkerFrame>(),
            Err(TransportError::SerializationError(_))
        ));
    }

    #[test]
    fn test_header_layout() {
        let encoded = encode(&json!("ok")).unwrap();
        let payload = &encoded[HEADER_SIZE..];

        assert_eq!(read_u32(&encoded) as usize, payload.len());
        assert_eq!(read_u32(&encoded[4..]), crc32fast::hash(payload));
    }

    #[test]
    fn test_clear_discards_partial_data() {
        let encoded = encode(&progress_frame(9.0)).unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.push(&encoded[..10]);
        decoder.clear();
        assert_eq!(decoder.available(), 0);
    }
}
