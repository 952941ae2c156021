// Structural document model - the output of parsing a Google Docs body.
// These types are format-agnostic: the Markdown serializer is one consumer,
// the JSON tree attached to every content node is another.

use serde::Serialize;
use thiserror::Error;

/// Errors raised while converting a structured document.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The document contains a block the converter does not recognize.
    /// Failing loudly beats dropping content on the floor.
    #[error("Unsupported block kind: {kind}")]
    UnsupportedBlockKind { kind: String },
}

/// Style flags carried by one inline span.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SpanStyle {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub link: Option<String>,
}

/// An inline run of text sharing one style-flag set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: SpanStyle::default(),
        }
    }

    pub fn styled(text: impl Into<String>, style: SpanStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// One cell of a table. Holds a sub-sequence of blocks so nested
/// structure survives into the tree even though pipe tables flatten it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableCell {
    pub blocks: Vec<Block>,
}

/// A top-level structural unit of a document.
///
/// This is a closed set: anything the parser cannot place into one of
/// these variants is a [`ConvertError::UnsupportedBlockKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Block {
    Paragraph {
        spans: Vec<Span>,
    },
    Heading {
        level: u8,
        spans: Vec<Span>,
    },
    BulletItem {
        depth: u8,
        spans: Vec<Span>,
    },
    /// Numbered items keep their list id so the serializer can run one
    /// counter per (list id, depth) within a single document.
    NumberedItem {
        depth: u8,
        list_id: String,
        spans: Vec<Span>,
    },
    /// Rows are rectangular: every row has the same cell count, with
    /// spanned-over positions filled by empty cells.
    Table {
        rows: Vec<Vec<TableCell>>,
    },
    Image {
        reference: String,
        alt: String,
    },
    HorizontalRule,
}

/// The finished conversion of one source document.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    pub id: String,
    pub date: Option<String>,
    pub title: String,
    pub content: Vec<Block>,
    pub markdown: String,
    pub text: String,
}
