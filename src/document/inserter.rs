//! Inline image insertion
//!
//! The image becomes a new run at the end of an existing paragraph. Besides
//! the paragraph itself three parts change: the media file is added, the main
//! document gains an image relationship, and `[Content_Types].xml` gets a
//! default entry for the image extension when it has none.

use super::body::parse_body;
use super::package::{CONTENT_TYPES_PART, DOCUMENT_RELS_PART, MAIN_DOCUMENT_PART};
use super::{DocumentError, DocxPackage};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

pub const EMU_PER_INCH: f64 = 914_400.0;

const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const EMPTY_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#;

const SUPPORTED_IMAGE_SUBTYPES: &[&str] = &["png", "jpeg", "gif", "bmp", "tiff"];

/// Signature image bytes with the metadata needed to embed them.
#[derive(Debug, Clone)]
pub struct SignatureImage {
    pub file_name: String,
    pub extension: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl SignatureImage {
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "signature".to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .ok_or_else(|| DocumentError::UnsupportedImage(file_name.clone()))?;
        let content_type = image_content_type(&extension)
            .ok_or_else(|| DocumentError::UnsupportedImage(extension.clone()))?;

        Ok(Self {
            file_name,
            extension,
            content_type,
            data: fs::read(path)?,
        })
    }
}

/// Content type for an image extension that can be embedded in a document.
pub fn image_content_type(extension: &str) -> Option<String> {
    mime_guess::from_ext(extension)
        .first()
        .filter(|m| m.type_() == mime::IMAGE)
        .filter(|m| SUPPORTED_IMAGE_SUBTYPES.contains(&m.subtype().as_str()))
        .map(|m| m.essence_str().to_string())
}

/// Append `image` as an inline picture of `width_in` x `height_in` inches to
/// the end of paragraph `paragraph` (1-based) and overwrite `document`.
///
/// The picture is stretched to exactly the given size.
pub fn insert_image(
    document: &Path,
    image: &Path,
    paragraph: usize,
    width_in: f64,
    height_in: f64,
) -> Result<(), DocumentError> {
    let image = SignatureImage::load(image)?;
    insert_signature(document, &image, paragraph, width_in, height_in)
}

/// Same as [`insert_image`] with an already loaded image.
pub fn insert_signature(
    document: &Path,
    image: &SignatureImage,
    paragraph: usize,
    width_in: f64,
    height_in: f64,
) -> Result<(), DocumentError> {
    let mut package = DocxPackage::open(document)?;
    insert_into_package(&mut package, image, paragraph, width_in, height_in)?;
    package.save(document)?;

    info!(
        document = %document.display(),
        paragraph,
        width_in,
        height_in,
        "Signature image inserted"
    );
    Ok(())
}

pub fn insert_into_package(
    package: &mut DocxPackage,
    image: &SignatureImage,
    paragraph: usize,
    width_in: f64,
    height_in: f64,
) -> Result<(), DocumentError> {
    let cx = to_emu(width_in);
    let cy = to_emu(height_in);
    if cx <= 0 || cy <= 0 {
        return Err(DocumentError::InvalidImageSize { width_in, height_in });
    }

    let xml = package.main_document()?;
    let layout = parse_body(xml)?;
    let count = layout.paragraphs.len();
    if paragraph < 1 || paragraph > count {
        return Err(DocumentError::InvalidParagraphIndex { index: paragraph, count });
    }
    let target = &layout.paragraphs[paragraph - 1];

    let media_part = package.unused_part_name("word/media/signature", &image.extension);
    let media_target = media_part.trim_start_matches("word/").to_string();

    let rels = package
        .xml_part(DOCUMENT_RELS_PART)?
        .unwrap_or(EMPTY_RELS)
        .to_string();
    let rel_id = next_relationship_id(&rels)?;
    let relationship = format!(
        r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
        rel_id, IMAGE_REL_TYPE, media_target
    );
    let rels = append_to_root(&rels, "Relationships", &relationship)?;

    let content_types = package
        .xml_part(CONTENT_TYPES_PART)?
        .ok_or_else(|| DocumentError::Format(format!("missing {}", CONTENT_TYPES_PART)))?
        .to_string();
    let content_types = if has_default_extension(&content_types, &image.extension)? {
        content_types
    } else {
        let default = format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            image.extension, image.content_type
        );
        append_to_root(&content_types, "Types", &default)?
    };

    let run = drawing_run(&rel_id, layout.max_drawing_id + 1, &image.file_name, cx, cy);
    let document = match target.close_tag {
        Some(close) => format!("{}{}{}", &xml[..close], run, &xml[close..]),
        None => {
            let open = xml[target.start..target.end]
                .trim_end_matches("/>")
                .trim_end();
            format!(
                "{}{}>{}</w:p>{}",
                &xml[..target.start],
                open,
                run,
                &xml[target.end..]
            )
        }
    };

    package.set_part(&media_part, image.data.clone());
    package.set_part(DOCUMENT_RELS_PART, rels.into_bytes());
    package.set_part(CONTENT_TYPES_PART, content_types.into_bytes());
    package.set_part(MAIN_DOCUMENT_PART, document.into_bytes());
    Ok(())
}

fn to_emu(inches: f64) -> i64 {
    if inches.is_finite() {
        (inches * EMU_PER_INCH).round() as i64
    } else {
        0
    }
}

fn drawing_run(rel_id: &str, drawing_id: u32, name: &str, cx: i64, cy: i64) -> String {
    let name = escape(name);
    format!(
        concat!(
            r#"<w:r><w:drawing>"#,
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:docPr id="{id}" name="Picture {id}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline>"#,
            r#"</w:drawing></w:r>"#,
        ),
        cx = cx,
        cy = cy,
        id = drawing_id,
        name = name,
        rel = rel_id,
    )
}

/// Values of `attr` on every `element` in `xml`.
fn attribute_values(xml: &str, element: &[u8], attr: &[u8]) -> Result<Vec<String>, DocumentError> {
    let mut reader = Reader::from_str(xml);
    let mut values = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == element => {
                if let Some(value) = e.try_get_attribute(attr)? {
                    values.push(value.unescape_value()?.into_owned());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(values)
}

fn next_relationship_id(rels: &str) -> Result<String, DocumentError> {
    let ids: HashSet<String> = attribute_values(rels, b"Relationship", b"Id")?
        .into_iter()
        .collect();
    let highest = ids
        .iter()
        .filter_map(|id| id.strip_prefix("rId")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    Ok((highest + 1..)
        .map(|n| format!("rId{}", n))
        .find(|id| !ids.contains(id))
        .unwrap_or_else(|| format!("rId{}", highest + 1)))
}

fn has_default_extension(content_types: &str, extension: &str) -> Result<bool, DocumentError> {
    Ok(attribute_values(content_types, b"Default", b"Extension")?
        .iter()
        .any(|e| e.eq_ignore_ascii_case(extension)))
}

/// Insert `child` as the last child of the root element `root`.
fn append_to_root(xml: &str, root: &str, child: &str) -> Result<String, DocumentError> {
    let close = format!("</{}>", root);
    if let Some(pos) = xml.rfind(&close) {
        return Ok(format!("{}{}{}", &xml[..pos], child, &xml[pos..]));
    }

    // Self-closing root, e.g. `<Relationships xmlns="..."/>`
    let open = format!("<{}", root);
    let start = xml
        .find(&open)
        .ok_or_else(|| DocumentError::Format(format!("missing <{}> element", root)))?;
    let end = xml[start..]
        .find("/>")
        .map(|i| start + i)
        .ok_or_else(|| DocumentError::Format(format!("malformed <{}> element", root)))?;
    Ok(format!(
        "{}>{}{}{}",
        &xml[..end],
        child,
        close,
        &xml[end + 2..]
    ))
}
