//! Frame buffer for reassembling length-prefixed messages.
//!
//! Bytes arrive from the transport in arbitrary chunks. The buffer walks a
//! small state machine over each chunk:
//! - `AwaitingByte1`: next byte is the high byte of the length prefix
//! - `AwaitingByte2`: next byte completes the 16-bit length
//! - `Receiving`: copy payload bytes until the frame is complete
//! - `ShuttingDown`: terminal, all input is dropped
//!
//! A single `push` may complete any number of frames. Prefix and payload are
//! held together in one owned buffer of fixed capacity; a frame that cannot
//! fit is discarded whole, together with the rest of the chunk it arrived in.
//!
//! # Example
//!
//! ```
//! use iotdm_client::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! assert!(buffer.push(&[0x00, 0x03, b'a']).is_empty());
//! let frames = buffer.push(&[b'b', b'c']);
//!
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].payload(), b"abc");
//! ```

use std::cmp::min;

use bytes::BytesMut;

use super::wire_format::{fits_buffer, length_from_bytes, LENGTH_FIELD_SIZE, MAX_FRAME_BUFFER};
use super::Frame;
use crate::error::DmError;

/// State machine for frame reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the high byte of the length prefix.
    AwaitingByte1,
    /// High byte stored, waiting for the low byte.
    AwaitingByte2,
    /// Length known, accumulating payload bytes.
    Receiving { frame_length: u16 },
    /// Terminal: no transitions out.
    ShuttingDown,
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Length prefix followed by the payload received so far.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Hard cap on `buffer.len()`, prefix included.
    capacity: usize,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default 1024-byte capacity.
    pub fn new() -> Self {
        Self::with_capacity(MAX_FRAME_BUFFER)
    }

    /// Create a new frame buffer with a custom capacity (prefix included).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(LENGTH_FIELD_SIZE);
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::AwaitingByte1,
            capacity,
        }
    }

    /// Push a received chunk and extract all frames it completes.
    ///
    /// Frames are returned in stream order. Partial data is kept for the
    /// next push. Oversized frames are logged and dropped, never returned.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut input = data;

        while let Some((&byte, rest)) = input.split_first() {
            match self.state {
                State::AwaitingByte1 => {
                    self.buffer.extend_from_slice(&[byte]);
                    self.state = State::AwaitingByte2;
                    input = rest;
                }

                State::AwaitingByte2 => {
                    let frame_length = length_from_bytes(self.buffer[0], byte);
                    self.buffer.extend_from_slice(&[byte]);
                    input = rest;

                    if frame_length == 0 {
                        frames.push(self.take_frame());
                    } else {
                        self.state = State::Receiving { frame_length };
                    }
                }

                State::Receiving { frame_length } => {
                    let to_copy = min(
                        input.len(),
                        min(
                            self.remaining_capacity(frame_length),
                            self.remaining_frame(frame_length),
                        ),
                    );

                    if to_copy == 0 {
                        tracing::warn!(
                            "Discarding {} buffered and {} pending bytes: {}",
                            self.buffer.len(),
                            input.len(),
                            DmError::FrameTooLarge {
                                declared: usize::from(frame_length) + LENGTH_FIELD_SIZE,
                                capacity: self.capacity,
                            }
                        );
                        self.reset();
                        break;
                    }

                    self.buffer.extend_from_slice(&input[..to_copy]);
                    input = &input[to_copy..];

                    if self.buffer.len() - LENGTH_FIELD_SIZE == usize::from(frame_length) {
                        frames.push(self.take_frame());
                    }
                }

                State::ShuttingDown => {
                    tracing::debug!("Reassembler shut down, dropping {} bytes", input.len());
                    break;
                }
            }
        }

        frames
    }

    /// Bytes of buffer space usable by the current frame.
    ///
    /// Zero when the whole frame could never fit, so it is dropped before
    /// any payload is stored.
    fn remaining_capacity(&self, frame_length: u16) -> usize {
        if fits_buffer(usize::from(frame_length), self.capacity) {
            self.capacity - self.buffer.len()
        } else {
            0
        }
    }

    fn remaining_frame(&self, frame_length: u16) -> usize {
        usize::from(frame_length) + LENGTH_FIELD_SIZE - self.buffer.len()
    }

    /// Deliver the buffered payload and reset for the next frame.
    fn take_frame(&mut self) -> Frame {
        let payload = self.buffer.split().freeze().slice(LENGTH_FIELD_SIZE..);
        tracing::debug!("Received frame, msgLength: {}", payload.len());
        self.reset();
        Frame::new(payload)
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.buffer.reserve(self.capacity);
        self.state = State::AwaitingByte1;
    }

    /// Enter the terminal state. Subsequent input is dropped.
    pub fn shutdown(&mut self) {
        self.buffer.clear();
        self.state = State::ShuttingDown;
    }

    /// Check if the buffer has been shut down.
    pub fn is_shut_down(&self) -> bool {
        self.state == State::ShuttingDown
    }

    /// Get the number of buffered bytes, length prefix included.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Maximum bytes held at once, length prefix included.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear the buffer and reset state. Has no effect once shut down.
    pub fn clear(&mut self) {
        if self.state != State::ShuttingDown {
            self.reset();
        }
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::AwaitingByte1 => "AwaitingByte1",
            State::AwaitingByte2 => "AwaitingByte2",
            State::Receiving { .. } => "Receiving",
            State::ShuttingDown => "ShuttingDown",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_frame;

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&build_frame(b"hello").unwrap());

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"hello");
        assert!(buffer.is_empty());
        assert_eq!(buffer.state_name(), "AwaitingByte1");
    }

    #[test]
    fn test_every_split_point() {
        let message: Vec<u8> = (0..=200u8).collect();
        let encoded = build_frame(&message).unwrap();

        for split in 0..=encoded.len() {
            let mut buffer = FrameBuffer::new();
            let mut frames = buffer.push(&encoded[..split]);
            frames.extend(buffer.push(&encoded[split..]));

            assert_eq!(frames.len(), 1, "split at {}", split);
            assert_eq!(frames[0].payload(), &message[..], "split at {}", split);
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let encoded = build_frame(b"one byte per read").unwrap();
        let mut buffer = FrameBuffer::new();
        let mut frames = Vec::new();

        for byte in &encoded {
            frames.extend(buffer.push(std::slice::from_ref(byte)));
        }

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"one byte per read");
    }

    #[test]
    fn test_states_while_fragmented() {
        let mut buffer = FrameBuffer::new();
        let encoded = build_frame(b"test").unwrap();

        buffer.push(&encoded[..1]);
        assert_eq!(buffer.state_name(), "AwaitingByte2");
        assert_eq!(buffer.len(), 1);

        buffer.push(&encoded[1..2]);
        assert_eq!(buffer.state_name(), "Receiving");

        buffer.push(&encoded[2..4]);
        assert_eq!(buffer.state_name(), "Receiving");
        assert_eq!(buffer.len(), 4);

        let frames = buffer.push(&encoded[4..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(buffer.state_name(), "AwaitingByte1");
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = build_frame(b"first").unwrap();
        combined.extend(build_frame(b"second").unwrap());
        combined.extend(build_frame(b"third").unwrap());

        let frames = buffer.push(&combined);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload(), b"first");
        assert_eq!(frames[1].payload(), b"second");
        assert_eq!(frames[2].payload(), b"third");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = FrameBuffer::new();

        let frame1 = build_frame(b"first").unwrap();
        let frame2 = build_frame(b"second").unwrap();

        let mut data = frame1.clone();
        data.extend_from_slice(&frame2[..4]);

        let frames = buffer.push(&data);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"first");
        assert_eq!(buffer.state_name(), "Receiving");

        let frames = buffer.push(&frame2[4..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"second");
    }

    #[test]
    fn test_empty_frame() {
        let mut buffer = FrameBuffer::new();
        let mut data = build_frame(b"").unwrap();
        data.extend(build_frame(b"after").unwrap());

        let frames = buffer.push(&data);

        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_empty());
        assert_eq!(frames[1].payload(), b"after");
    }

    #[test]
    fn test_largest_frame_fits() {
        let mut buffer = FrameBuffer::new();
        let payload = vec![0x5A; MAX_FRAME_BUFFER - LENGTH_FIELD_SIZE];

        let frames = buffer.push(&build_frame(&payload).unwrap());

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 1022);
    }

    #[test]
    fn test_oversized_frame_discarded() {
        let mut buffer = FrameBuffer::new();
        let payload = vec![0xAB; MAX_FRAME_BUFFER - LENGTH_FIELD_SIZE + 1];

        let frames = buffer.push(&build_frame(&payload).unwrap());

        assert!(frames.is_empty());
        assert_eq!(buffer.state_name(), "AwaitingByte1");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_discard_drops_rest_of_chunk() {
        let mut buffer = FrameBuffer::with_capacity(16);

        let mut data = build_frame(&[1u8; 20]).unwrap();
        data.extend(build_frame(b"lost").unwrap());

        assert!(buffer.push(&data).is_empty());
        assert!(buffer.is_empty());

        // The stream resynchronizes on the next chunk
        let frames = buffer.push(&build_frame(b"kept").unwrap());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"kept");
    }

    #[test]
    fn test_oversized_prefix_at_end_of_chunk() {
        let mut buffer = FrameBuffer::with_capacity(8);

        // Length 100 never fits; the prefix alone is buffered
        assert!(buffer.push(&[0x00, 0x64]).is_empty());
        assert_eq!(buffer.state_name(), "Receiving");

        assert!(buffer.push(&[0u8; 10]).is_empty());
        assert_eq!(buffer.state_name(), "AwaitingByte1");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let mut buffer = FrameBuffer::new();
        buffer.push(&[0x00]);
        buffer.shutdown();

        assert!(buffer.is_shut_down());
        assert!(buffer.push(&build_frame(b"ignored").unwrap()).is_empty());

        buffer.clear();
        assert_eq!(buffer.state_name(), "ShuttingDown");
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        buffer.push(&build_frame(b"test").unwrap()[..3]);

        assert_eq!(buffer.state_name(), "Receiving");
        assert_eq!(buffer.len(), 3);

        buffer.clear();

        assert_eq!(buffer.state_name(), "AwaitingByte1");
        assert!(buffer.is_empty());
    }
}
