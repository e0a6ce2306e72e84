// Utility modules

pub mod concurrency;

pub use concurrency::{Limiter, join_bounded};
