// Build phase, part one: turns extracted document text into bounded, overlapping chunks.
// Text extraction from PDFs happens upstream; this module only sees plain text.

pub mod chunker;
pub mod document;

pub use chunker::{chunk, Chunk};
pub use document::{Document, IngestionError};
