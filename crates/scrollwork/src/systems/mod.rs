pub mod scroll;
pub mod triggers;
pub mod sections;
pub mod scramble;
pub mod rng;
