// Document conversion engine.
// - `structured.rs` models the raw Docs API response.
// - `parser.rs` validates it into the structural tree.
// - `markdown.rs` renders the tree as Markdown and plain text.

pub mod document_model;
pub mod markdown;
pub mod parser;
pub mod structured;

pub use document_model::{Block, ConvertError, ConvertedDocument, Span, SpanStyle, TableCell};
pub use markdown::{render_markdown, render_text};
pub use parser::parse_document;
pub use structured::StructuredDocument;
