pub mod mask_io;
pub mod raw_video;
pub mod video;

pub use mask_io::{load_mask, save_mask};
pub use raw_video::{PixelType, RawVideoReader};
pub use video::{InMemoryVideo, VideoSource};
