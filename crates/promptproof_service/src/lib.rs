#![forbid(unsafe_code)]

pub mod generation;

pub use generation::{GenerateError, GenerationService};
