//! Paragraph layout of `word/document.xml`
//!
//! Parsing records, for every body paragraph, its text and the byte offsets
//! needed to splice new content into the original XML without re-serializing
//! the rest of the document.

use super::{DocumentError, Paragraph};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// A body paragraph and where it lives in the source XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphSpan {
    pub text: String,
    pub runs: usize,
    /// Offset of the opening `<w:p` tag
    pub start: usize,
    /// Offset just past the closing tag (or past `/>` when self-closing)
    pub end: usize,
    /// Offset of `</w:p>`; `None` for a self-closing `<w:p/>`
    pub close_tag: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct BodyLayout {
    pub paragraphs: Vec<ParagraphSpan>,
    /// Highest `wp:docPr/@id` seen; drawing ids must be unique per document
    pub max_drawing_id: u32,
}

impl BodyLayout {
    pub fn paragraphs(&self) -> Vec<Paragraph> {
        self.paragraphs
            .iter()
            .enumerate()
            .map(|(i, span)| Paragraph {
                position: i + 1,
                text: span.text.clone(),
                runs: span.runs,
            })
            .collect()
    }

    /// 1-based position of the first paragraph whose trimmed text equals `marker`.
    pub fn find(&self, marker: &str) -> Option<usize> {
        self.paragraphs
            .iter()
            .position(|p| p.text.trim() == marker)
            .map(|i| i + 1)
    }
}

pub fn parse_body(xml: &str) -> Result<BodyLayout, DocumentError> {
    let mut reader = Reader::from_str(xml);
    let mut layout = BodyLayout::default();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    // Open body paragraph and the stack depth of its parent (`w:body`)
    let mut current: Option<(ParagraphSpan, usize)> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            DocumentError::Format(format!(
                "XML error at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;
        let pos = reader.buffer_position();

        match event {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                record_drawing_id(&e, &mut layout);

                if name == b"w:p" && parent_is(&stack, b"w:body") {
                    let span = ParagraphSpan {
                        text: String::new(),
                        runs: 0,
                        start: tag_start(xml, pos),
                        end: pos,
                        close_tag: None,
                    };
                    current = Some((span, stack.len()));
                } else if let Some((span, depth)) = current.as_mut() {
                    if name == b"w:r" && stack.len() == *depth + 1 {
                        span.runs += 1;
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let qname = e.name();
                let name = qname.as_ref();
                record_drawing_id(&e, &mut layout);

                if name == b"w:p" && parent_is(&stack, b"w:body") {
                    layout.paragraphs.push(ParagraphSpan {
                        text: String::new(),
                        runs: 0,
                        start: tag_start(xml, pos),
                        end: pos,
                        close_tag: None,
                    });
                } else if let Some((span, depth)) = current.as_mut() {
                    if name == b"w:r" && stack.len() == *depth + 1 {
                        span.runs += 1;
                    } else if parent_is(&stack, b"w:r") && !in_text_box(&stack) {
                        match name {
                            b"w:tab" => span.text.push('\t'),
                            b"w:br" | b"w:cr" => span.text.push('\n'),
                            _ => {}
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let Some((span, _)) = current.as_mut() {
                    if parent_is(&stack, b"w:t") && !in_text_box(&stack) {
                        span.text.push_str(&t.unescape()?);
                    }
                }
            }
            Event::End(e) => {
                stack.pop();
                let closes_current = matches!(&current, Some((_, depth)) if stack.len() == *depth)
                    && e.name().as_ref() == b"w:p";
                if closes_current {
                    if let Some((mut span, _)) = current.take() {
                        span.close_tag = xml[..pos].rfind("</");
                        span.end = pos;
                        layout.paragraphs.push(span);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() || current.is_some() {
        return Err(DocumentError::Format("unexpected end of document XML".to_string()));
    }
    if !xml.contains("<w:body") {
        return Err(DocumentError::Format("document has no body".to_string()));
    }
    Ok(layout)
}

fn parent_is(stack: &[Vec<u8>], name: &[u8]) -> bool {
    stack.last().map(Vec::as_slice) == Some(name)
}

fn in_text_box(stack: &[Vec<u8>]) -> bool {
    stack.iter().any(|n| n.as_slice() == b"w:txbxContent")
}

/// Start of the tag that ends right before `end`. Attribute values cannot
/// contain a raw `<`, so the last one before `end` opens the tag.
fn tag_start(xml: &str, end: usize) -> usize {
    xml[..end].rfind('<').unwrap_or(0)
}

fn record_drawing_id(e: &BytesStart<'_>, layout: &mut BodyLayout) {
    if e.name().as_ref() != b"wp:docPr" {
        return;
    }
    let id = e
        .try_get_attribute(b"id")
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok()?.parse::<u32>().ok());
    if let Some(id) = id {
        layout.max_drawing_id = layout.max_drawing_id.max(id);
    }
}
