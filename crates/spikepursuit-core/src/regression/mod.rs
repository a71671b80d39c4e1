pub mod background;
pub mod crossval;
pub mod ridge;

pub use background::BackgroundSubtractor;
pub use crossval::{cross_validate, CrossValidation};
pub use ridge::{lambda_grid, with_intercept, RidgeForm, RidgeSolver};
