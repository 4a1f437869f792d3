pub mod extractor;

pub use extractor::{extract, ContactLayout, DatePattern, HeadingCase, StyleDescriptor};
