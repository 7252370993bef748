mod emitter;
mod xml_parser;

use crate::errors::ExtractError;
use crate::models::{InputFormat, Record};

// Re-export public API
pub use emitter::emit;
pub use xml_parser::parse_record_bytes;

/// Runs the extractor matching `format` over one payload.
///
/// Pure: touches no shared state, so workers call it without synchronization.
pub fn extract(format: InputFormat, content: &[u8]) -> Result<Record, ExtractError> {
    match format {
        InputFormat::Xml => parse_record_bytes(content),
    }
}
