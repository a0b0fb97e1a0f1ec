//! Rendering module for serializing documents.

mod json;

pub use json::{to_json, to_writer, JsonFormat};
