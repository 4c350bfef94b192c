//! Core types for the document-to-PDF normalization pipeline.

pub mod error;
pub mod options;
pub mod pipeline;
pub mod plugin;
pub mod request;
pub mod workdir;
