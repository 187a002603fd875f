pub mod distance_vector;
pub mod link_state;

pub use distance_vector::DvOutcome;
