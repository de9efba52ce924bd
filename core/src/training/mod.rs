pub mod evaluation;
pub mod progress;
pub mod trainer;

pub use evaluation::evaluate;
pub use trainer::{History, Trainer};
