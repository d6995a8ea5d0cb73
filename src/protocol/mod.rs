//! The slice of the WebSocket protocol (RFC 6455) the compression layer
//! touches: opcodes and logical frames.

pub mod frame;
pub mod opcode;

pub use frame::{Frame, MAX_CONTROL_FRAME_PAYLOAD};
pub use opcode::OpCode;
