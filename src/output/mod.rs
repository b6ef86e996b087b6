// Tue Jan 13 2026 - Alex

pub mod frame;
pub mod message;
pub mod sink;

pub use frame::{encode, FrameDecoder};
pub use message::{MessageHeader, OutboundMessage};
pub use sink::{MessageSink, SinkError, StreamSink};
