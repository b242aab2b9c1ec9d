mod codec;
mod command;

pub use codec::{BATCH_WIDTH, BatchUpdate, FRAME_LEN, Frame, FrameError, decode, decode_batch, encode};
pub use command::Command;
