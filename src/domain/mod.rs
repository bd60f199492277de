pub mod battery;
pub mod schedule;
pub mod types;

pub use battery::*;
pub use schedule::*;
pub use types::*;
