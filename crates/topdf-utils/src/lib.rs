//! Shared helpers: input decoding, PDF inspection, shell command rendering.

pub mod encoding;
pub mod pdf;
pub mod shell;
