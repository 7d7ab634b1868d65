//! Chat event-stream handling: byte framing, payload parsing and the per-turn
//! reducer that turns frames into document effects.

mod decoder;
mod frames;
mod turn;

pub use self::decoder::FrameDecoder;
pub use self::frames::{FrameError, StreamFrame, StreamMessage, parse_payload};
pub use self::turn::{ToolOutcome, TurnEffect, TurnOutcome, TurnReducer, looks_like_tool_payload, tool_outcome};

#[cfg(test)]
#[path = "tests/stream_tests.rs"]
mod tests;
