// Output module - exporters and terminal presentation

pub mod json;
pub mod terminal;

pub use json::{Envelope, ExportMetadata, generate_json, write_json_file};
