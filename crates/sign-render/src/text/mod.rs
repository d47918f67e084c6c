//! Text band generation and rendering

pub mod engine;
pub mod layout;

pub use engine::{FontMetrics, TextEngine};
pub use layout::{TextFit, TextMeasure, strength_placeholder, wrap_two_lines};
