//! Protocol module - wire format, framing, and status codes.
//!
//! This module implements the byte-stream side of the DM session:
//! - 2-byte big-endian length prefix encoding/decoding
//! - Frame buffer that reassembles messages from arbitrary chunks
//! - CoAP status codes returned by the dispatcher

mod frame;
mod frame_buffer;
mod status;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use status::StatusCode;
pub use wire_format::{
    encode_length, fits_buffer, length_from_bytes, LENGTH_FIELD_SIZE, MAX_FRAME_BUFFER,
};
