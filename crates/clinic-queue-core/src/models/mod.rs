//! Domain models for the clinic queue.

mod patient;

pub use patient::*;
