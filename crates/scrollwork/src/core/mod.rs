pub mod clock;
pub mod error;
pub mod stage;
pub mod surface;
pub mod time;
