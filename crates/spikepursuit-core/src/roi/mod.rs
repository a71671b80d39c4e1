pub mod morphology;
pub mod region;

pub use morphology::{dilate_disk, dilate_square};
pub use region::{align_mask, BoundingBox, CellRegion};
