// Node assembly - combines a converted document with its Drive metadata
// into the content node handed to the store. No I/O here; field mapping
// and defaults are plain data supplied by the caller.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::document::ConvertedDocument;
use crate::core::source::FileDescriptor;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Failed to serialize structural tree: {0}")]
    Tree(String),
}

/// Metadata projection rules: renames applied to source field names and
/// defaults applied only where the source provided no value.
#[derive(Debug, Clone, Default)]
pub struct FieldConfig {
    pub mapper: BTreeMap<String, String>,
    pub defaults: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInternal {
    pub mime_type: String,
    pub content: String,
}

/// The unit registered into the content store, one per source document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub title: String,
    pub slug: String,
    pub body: String,
    /// Plain-text rendition, kept alongside the Markdown so hosts can
    /// index it for full-text search.
    pub text: String,
    pub json: String,
    pub internal: NodeInternal,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// Build a content node from a converted document and its descriptor.
/// The node's id is the descriptor's id, unchanged.
pub fn assemble_node(
    file: &FileDescriptor,
    document: &ConvertedDocument,
    config: &FieldConfig,
) -> Result<ContentNode, AssemblyError> {
    let json = serde_json::to_string(&document.content)
        .map_err(|err| AssemblyError::Tree(err.to_string()))?;

    let mut fields: BTreeMap<String, Value> = BTreeMap::new();
    let mut date = document.date.clone();
    let mut title: Option<String> = None;

    for (source, value) in &file.metadata {
        let destination = config
            .mapper
            .get(source)
            .map(String::as_str)
            .unwrap_or(source.as_str());
        match destination {
            "date" => {
                if let Some(text) = value.as_str() {
                    date = Some(text.to_string());
                }
            }
            "title" => {
                if let Some(text) = value.as_str() {
                    title = Some(text.to_string());
                }
            }
            // Reserved node fields cannot be overridden by metadata.
            "id" | "slug" | "body" | "json" | "internal" => {}
            _ => {
                fields.insert(destination.to_string(), value.clone());
            }
        }
    }

    for (destination, default) in &config.defaults {
        match destination.as_str() {
            "date" => {
                if date.is_none() {
                    date = default.as_str().map(str::to_string);
                }
            }
            "title" => {
                if title.is_none() {
                    title = default.as_str().map(str::to_string);
                }
            }
            _ => {
                fields
                    .entry(destination.clone())
                    .or_insert_with(|| default.clone());
            }
        }
    }

    let title = title.unwrap_or_else(|| document.title.clone());
    let slug = slugify(&title);

    Ok(ContentNode {
        id: file.id.clone(),
        date,
        title,
        slug,
        body: document.markdown.clone(),
        text: document.text.clone(),
        json,
        internal: NodeInternal {
            mime_type: "text/markdown".to_string(),
            content: document.markdown.clone(),
        },
        fields,
    })
}

/// Lowercase the title and collapse every non-alphanumeric run into a
/// single dash. Two documents with the same title produce the same slug;
/// collision handling is left to the consumer.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_separator = false;

    for c in input.chars() {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_separator = true;
        }
    }
    slug
}
