//! # Utilities

pub mod double_buffer;

pub use double_buffer::DoubleBuffer;
