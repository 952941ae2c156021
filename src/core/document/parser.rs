// Walks the raw Docs API body and builds the structural tree.
// This is the validation boundary: anything outside the recognized block
// set fails with UnsupportedBlockKind instead of being dropped.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::document_model::{Block, ConvertError, Span, SpanStyle, TableCell};
use super::structured::{
    InlineObjectElement, Paragraph, StructuralElement, StructuredDocument, Table, TextStyle,
};

/// Glyph types the Docs API uses for ordered lists.
const ORDERED_GLYPH_TYPES: [&str; 6] = [
    "DECIMAL",
    "ZERO_DECIMAL",
    "ALPHA",
    "UPPER_ALPHA",
    "ROMAN",
    "UPPER_ROMAN",
];

/// Font families treated as code spans. The Docs API has no semantic
/// "code" style, so a monospace font is the closest signal available.
const MONOSPACE_FONTS: [&str; 3] = ["Consolas", "Courier New", "Roboto Mono"];

/// Parse a structured document into an ordered sequence of blocks.
pub fn parse_document(doc: &StructuredDocument) -> Result<Vec<Block>, ConvertError> {
    let content = doc
        .body
        .as_ref()
        .map(|body| body.content.as_slice())
        .unwrap_or_default();

    let mut blocks = Vec::new();
    for element in content {
        blocks.extend(parse_element(doc, element)?);
    }
    Ok(blocks)
}

fn parse_element(
    doc: &StructuredDocument,
    element: &StructuralElement,
) -> Result<Vec<Block>, ConvertError> {
    if let Some(paragraph) = &element.paragraph {
        parse_paragraph(doc, paragraph)
    } else if let Some(table) = &element.table {
        Ok(vec![parse_table(doc, table)?])
    } else if element.section_break.is_some() {
        // Section breaks carry layout only, no content.
        Ok(Vec::new())
    } else if let Some(kind) = unrecognized_key(&element.other) {
        Err(ConvertError::UnsupportedBlockKind {
            kind: kind.to_string(),
        })
    } else {
        Ok(Vec::new())
    }
}

/// A paragraph can produce up to three things: one text block (paragraph,
/// heading or list item), any inline images as standalone image blocks,
/// and a horizontal rule.
fn parse_paragraph(
    doc: &StructuredDocument,
    paragraph: &Paragraph,
) -> Result<Vec<Block>, ConvertError> {
    let mut spans = Vec::new();
    let mut images = Vec::new();
    let mut rule = false;

    for element in &paragraph.elements {
        if let Some(text_run) = &element.text_run {
            let content = text_run.content.as_deref().unwrap_or("");
            // The API includes the paragraph's trailing newline in the last run.
            let content = content.strip_suffix('\n').unwrap_or(content);
            if content.is_empty() {
                continue;
            }
            spans.push(Span::styled(content, map_style(text_run.text_style.as_ref())));
        } else if let Some(inline) = &element.inline_object_element {
            images.push(resolve_image(doc, inline)?);
        } else if element.horizontal_rule.is_some() {
            rule = true;
        } else if let Some(kind) = unrecognized_key(&element.other) {
            return Err(ConvertError::UnsupportedBlockKind {
                kind: kind.to_string(),
            });
        }
    }

    let spans = merge_spans(spans);

    let mut blocks = Vec::new();
    if !spans.is_empty() {
        blocks.push(text_block(doc, paragraph, spans)?);
    }
    blocks.extend(images);
    if rule {
        blocks.push(Block::HorizontalRule);
    }
    Ok(blocks)
}

fn text_block(
    doc: &StructuredDocument,
    paragraph: &Paragraph,
    spans: Vec<Span>,
) -> Result<Block, ConvertError> {
    if let Some(bullet) = &paragraph.bullet {
        let list_id = bullet.list_id.clone().unwrap_or_default();
        let depth = bullet.nesting_level;
        if is_numbered_list(doc, &list_id, depth) {
            return Ok(Block::NumberedItem {
                depth,
                list_id,
                spans,
            });
        }
        return Ok(Block::BulletItem { depth, spans });
    }

    let style = paragraph
        .paragraph_style
        .as_ref()
        .and_then(|s| s.named_style_type.as_deref())
        .unwrap_or("NORMAL_TEXT");

    match style {
        "NORMAL_TEXT" => Ok(Block::Paragraph { spans }),
        "TITLE" => Ok(Block::Heading { level: 1, spans }),
        "SUBTITLE" => Ok(Block::Heading { level: 2, spans }),
        other => match other
            .strip_prefix("HEADING_")
            .and_then(|level| level.parse::<u8>().ok())
            .filter(|level| (1..=6).contains(level))
        {
            Some(level) => Ok(Block::Heading { level, spans }),
            None => Err(ConvertError::UnsupportedBlockKind {
                kind: other.to_string(),
            }),
        },
    }
}

/// Merge adjacent spans carrying identical style flags so the serializer
/// never emits back-to-back delimiter pairs.
fn merge_spans(spans: Vec<Span>) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if span.text.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.style == span.style => last.text.push_str(&span.text),
            _ => merged.push(span),
        }
    }
    merged
}

fn map_style(style: Option<&TextStyle>) -> SpanStyle {
    let Some(style) = style else {
        return SpanStyle::default();
    };
    SpanStyle {
        bold: style.bold,
        italic: style.italic,
        strikethrough: style.strikethrough,
        code: style
            .weighted_font_family
            .as_ref()
            .and_then(|family| family.font_family.as_deref())
            .map(|family| MONOSPACE_FONTS.contains(&family))
            .unwrap_or(false),
        link: style.link.as_ref().and_then(|link| link.url.clone()),
    }
}

fn is_numbered_list(doc: &StructuredDocument, list_id: &str, depth: u8) -> bool {
    doc.lists
        .get(list_id)
        .and_then(|list| list.list_properties.as_ref())
        .and_then(|properties| properties.nesting_levels.get(depth as usize))
        .and_then(|level| level.glyph_type.as_deref())
        .map(|glyph| ORDERED_GLYPH_TYPES.contains(&glyph))
        .unwrap_or(false)
}

fn resolve_image(
    doc: &StructuredDocument,
    element: &InlineObjectElement,
) -> Result<Block, ConvertError> {
    let object_id = element.inline_object_id.as_deref().unwrap_or_default();
    let embedded = doc
        .inline_objects
        .get(object_id)
        .and_then(|object| object.inline_object_properties.as_ref())
        .and_then(|properties| properties.embedded_object.as_ref());

    let reference = embedded
        .and_then(|object| object.image_properties.as_ref())
        .and_then(|properties| properties.content_uri.clone())
        .ok_or_else(|| ConvertError::UnsupportedBlockKind {
            kind: format!("inlineObject:{object_id}"),
        })?;

    let alt = embedded
        .and_then(|object| {
            object
                .description
                .clone()
                .filter(|text| !text.is_empty())
                .or_else(|| object.title.clone())
        })
        .unwrap_or_default();

    Ok(Block::Image { reference, alt })
}

/// Build a rectangular grid out of a raw table. A cell spanning several
/// rows or columns keeps its content in the top-left occupied position;
/// every spanned-over position becomes an empty cell.
fn parse_table(doc: &StructuredDocument, table: &Table) -> Result<Block, ConvertError> {
    let mut covered: HashSet<(usize, usize)> = HashSet::new();
    let mut rows: Vec<Vec<TableCell>> = Vec::with_capacity(table.table_rows.len());

    for (row_index, row) in table.table_rows.iter().enumerate() {
        let mut cells: Vec<TableCell> = Vec::new();
        let mut column = 0usize;

        for cell in &row.table_cells {
            while covered.contains(&(row_index, column)) {
                cells.push(TableCell::default());
                column += 1;
            }

            let style = cell.table_cell_style.as_ref();
            let row_span = style.and_then(|s| s.row_span).unwrap_or(1).max(1) as usize;
            let column_span = style.and_then(|s| s.column_span).unwrap_or(1).max(1) as usize;

            let mut blocks = Vec::new();
            for element in &cell.content {
                blocks.extend(parse_element(doc, element)?);
            }
            cells.push(TableCell { blocks });

            for _ in 1..column_span {
                cells.push(TableCell::default());
            }
            for spanned_row in row_index + 1..row_index + row_span {
                for spanned_column in column..column + column_span {
                    covered.insert((spanned_row, spanned_column));
                }
            }
            column += column_span;
        }

        while covered.contains(&(row_index, column)) {
            cells.push(TableCell::default());
            column += 1;
        }
        rows.push(cells);
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize_with(width, TableCell::default);
    }
    Ok(Block::Table { rows })
}

/// Pick out the member that made an element unrecognizable, ignoring the
/// index bookkeeping the API attaches to every element.
fn unrecognized_key(other: &HashMap<String, Value>) -> Option<&str> {
    other
        .keys()
        .map(String::as_str)
        .find(|key| !matches!(*key, "startIndex" | "endIndex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> StructuredDocument {
        serde_json::from_value(value).expect("test document should deserialize")
    }

    fn span_texts(block: &Block) -> Vec<&str> {
        match block {
            Block::Paragraph { spans }
            | Block::Heading { spans, .. }
            | Block::BulletItem { spans, .. }
            | Block::NumberedItem { spans, .. } => {
                spans.iter().map(|s| s.text.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    #[test]
    fn adjacent_spans_with_identical_styles_merge() {
        let doc = doc(json!({
            "body": {"content": [{"paragraph": {"elements": [
                {"textRun": {"content": "A", "textStyle": {"bold": true}}},
                {"textRun": {"content": "B\n", "textStyle": {"bold": true}}}
            ]}}]}
        }));

        let blocks = parse_document(&doc).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(span_texts(&blocks[0]), vec!["AB"]);
    }

    #[test]
    fn spans_with_different_styles_stay_separate() {
        let doc = doc(json!({
            "body": {"content": [{"paragraph": {"elements": [
                {"textRun": {"content": "plain "}},
                {"textRun": {"content": "loud\n", "textStyle": {"bold": true}}}
            ]}}]}
        }));

        let blocks = parse_document(&doc).unwrap();
        assert_eq!(span_texts(&blocks[0]), vec!["plain ", "loud"]);
    }

    #[test]
    fn named_styles_map_to_heading_levels() {
        let doc = doc(json!({
            "body": {"content": [
                {"paragraph": {
                    "paragraphStyle": {"namedStyleType": "HEADING_3"},
                    "elements": [{"textRun": {"content": "Deep\n"}}]
                }},
                {"paragraph": {
                    "paragraphStyle": {"namedStyleType": "TITLE"},
                    "elements": [{"textRun": {"content": "Top\n"}}]
                }}
            ]}
        }));

        let blocks = parse_document(&doc).unwrap();
        assert!(matches!(blocks[0], Block::Heading { level: 3, .. }));
        assert!(matches!(blocks[1], Block::Heading { level: 1, .. }));
    }

    #[test]
    fn unknown_named_style_is_rejected() {
        let doc = doc(json!({
            "body": {"content": [{"paragraph": {
                "paragraphStyle": {"namedStyleType": "HEADING_9"},
                "elements": [{"textRun": {"content": "x\n"}}]
            }}]}
        }));

        let err = parse_document(&doc).unwrap_err();
        assert!(err.to_string().contains("HEADING_9"));
    }

    #[test]
    fn unknown_block_kind_is_rejected_by_name() {
        let doc = doc(json!({
            "body": {"content": [
                {"startIndex": 0, "endIndex": 1, "tableOfContents": {"content": []}}
            ]}
        }));

        let err = parse_document(&doc).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedBlockKind { ref kind } if kind == "tableOfContents"));
    }

    #[test]
    fn section_breaks_produce_no_blocks() {
        let doc = doc(json!({
            "body": {"content": [{"sectionBreak": {"sectionStyle": {}}}]}
        }));

        assert!(parse_document(&doc).unwrap().is_empty());
    }

    #[test]
    fn empty_paragraphs_produce_no_blocks() {
        let doc = doc(json!({
            "body": {"content": [{"paragraph": {"elements": [{"textRun": {"content": "\n"}}]}}]}
        }));

        assert!(parse_document(&doc).unwrap().is_empty());
    }

    #[test]
    fn bullet_glyphs_decide_numbered_versus_bulleted() {
        let doc = doc(json!({
            "lists": {
                "list-a": {"listProperties": {"nestingLevels": [{"glyphType": "DECIMAL"}]}},
                "list-b": {"listProperties": {"nestingLevels": [{"glyphSymbol": "●"}]}}
            },
            "body": {"content": [
                {"paragraph": {
                    "bullet": {"listId": "list-a"},
                    "elements": [{"textRun": {"content": "first\n"}}]
                }},
                {"paragraph": {
                    "bullet": {"listId": "list-b"},
                    "elements": [{"textRun": {"content": "dot\n"}}]
                }}
            ]}
        }));

        let blocks = parse_document(&doc).unwrap();
        assert!(
            matches!(&blocks[0], Block::NumberedItem { list_id, depth: 0, .. } if list_id == "list-a")
        );
        assert!(matches!(blocks[1], Block::BulletItem { depth: 0, .. }));
    }

    #[test]
    fn nesting_level_becomes_depth() {
        let doc = doc(json!({
            "lists": {"list-a": {"listProperties": {"nestingLevels": [
                {"glyphSymbol": "●"},
                {"glyphType": "DECIMAL"}
            ]}}},
            "body": {"content": [{"paragraph": {
                "bullet": {"listId": "list-a", "nestingLevel": 1},
                "elements": [{"textRun": {"content": "inner\n"}}]
            }}]}
        }));

        let blocks = parse_document(&doc).unwrap();
        assert!(
            matches!(&blocks[0], Block::NumberedItem { depth: 1, list_id, .. } if list_id == "list-a")
        );
    }

    #[test]
    fn monospace_font_becomes_code_span() {
        let doc = doc(json!({
            "body": {"content": [{"paragraph": {"elements": [{"textRun": {
                "content": "let x = 1;\n",
                "textStyle": {"weightedFontFamily": {"fontFamily": "Courier New"}}
            }}]}}]}
        }));

        let blocks = parse_document(&doc).unwrap();
        let Block::Paragraph { spans } = &blocks[0] else {
            panic!("expected a paragraph");
        };
        assert!(spans[0].style.code);
    }

    #[test]
    fn inline_images_resolve_through_the_object_map() {
        let doc = doc(json!({
            "inlineObjects": {"kix.img1": {"inlineObjectProperties": {"embeddedObject": {
                "title": "Diagram",
                "imageProperties": {"contentUri": "https://lh3.example/img1"}
            }}}},
            "body": {"content": [{"paragraph": {"elements": [
                {"inlineObjectElement": {"inlineObjectId": "kix.img1"}}
            ]}}]}
        }));

        let blocks = parse_document(&doc).unwrap();
        assert_eq!(
            blocks[0],
            Block::Image {
                reference: "https://lh3.example/img1".to_string(),
                alt: "Diagram".to_string(),
            }
        );
    }

    #[test]
    fn unresolvable_inline_object_is_rejected() {
        let doc = doc(json!({
            "body": {"content": [{"paragraph": {"elements": [
                {"inlineObjectElement": {"inlineObjectId": "kix.missing"}}
            ]}}]}
        }));

        assert!(parse_document(&doc).is_err());
    }

    #[test]
    fn horizontal_rule_becomes_a_block() {
        let doc = doc(json!({
            "body": {"content": [{"paragraph": {"elements": [{"horizontalRule": {}}]}}]}
        }));

        let blocks = parse_document(&doc).unwrap();
        assert_eq!(blocks, vec![Block::HorizontalRule]);
    }

    #[test]
    fn column_spans_keep_the_grid_rectangular() {
        let doc = doc(json!({
            "body": {"content": [{"table": {"tableRows": [
                {"tableCells": [
                    {"content": [{"paragraph": {"elements": [{"textRun": {"content": "wide\n"}}]}}],
                     "tableCellStyle": {"columnSpan": 2}}
                ]},
                {"tableCells": [
                    {"content": [{"paragraph": {"elements": [{"textRun": {"content": "a\n"}}]}}]},
                    {"content": [{"paragraph": {"elements": [{"textRun": {"content": "b\n"}}]}}]}
                ]}
            ]}}]}
        }));

        let blocks = parse_document(&doc).unwrap();
        let Block::Table { rows } = &blocks[0] else {
            panic!("expected a table");
        };
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == 2));
        assert!(rows[0][1].blocks.is_empty());
    }

    #[test]
    fn row_spans_cover_cells_in_later_rows() {
        let doc = doc(json!({
            "body": {"content": [{"table": {"tableRows": [
                {"tableCells": [
                    {"content": [{"paragraph": {"elements": [{"textRun": {"content": "tall\n"}}]}}],
                     "tableCellStyle": {"rowSpan": 2}},
                    {"content": [{"paragraph": {"elements": [{"textRun": {"content": "r1\n"}}]}}]}
                ]},
                {"tableCells": [
                    {"content": [{"paragraph": {"elements": [{"textRun": {"content": "r2\n"}}]}}]}
                ]}
            ]}}]}
        }));

        let blocks = parse_document(&doc).unwrap();
        let Block::Table { rows } = &blocks[0] else {
            panic!("expected a table");
        };
        assert!(rows.iter().all(|row| row.len() == 2));
        // The second row's first position is covered by the tall cell.
        assert!(rows[1][0].blocks.is_empty());
        assert!(!rows[1][1].blocks.is_empty());
    }
}
