//! Podcast scripts: the typed document, its validator and the generator that
//! coaxes one out of a language model.
//!
//! A model answer is untrusted text. [`ScriptGenerator::generate`] strips an
//! optional ```` ```json ```` fence, parses the rest as JSON and hands it to
//! [`ScriptDocument::validate`]; anything that does not pass is rejected as a
//! whole, never repaired.

pub mod generator;
pub mod prompts;
pub mod schema;

pub use generator::{strip_code_fence, GenerationError, ScriptGenerator};
pub use schema::{contains_markdown, Paragraph, Rule, SchemaViolation, ScriptDocument, Segment};
