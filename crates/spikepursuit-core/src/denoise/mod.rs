pub mod matched_filter;

pub use matched_filter::{
    correct_shrinkage, guess_signal, whitened_matched_filter, DenoisedTrace, MatchedFilterDenoiser,
};
