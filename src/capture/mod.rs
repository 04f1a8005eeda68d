pub mod decoder;
pub mod frame;
pub mod memory;
pub mod sequence;
pub mod source;

pub use frame::{Frame, Rect, END_OF_STREAM};
pub use memory::MemoryCapture;
pub use sequence::ImageSequenceCapture;
pub use source::{Capture, CaptureProperty};
