use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use super::ExtractError;

/// Extracts the text of every page, joined with newlines.
///
/// Encrypted files are opened with the empty password. A page whose text
/// cannot be extracted contributes an empty string. Files `lopdf` cannot
/// parse at all get a second chance through `pdf-extract`.
pub fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;

    let mut doc = match Document::load_mem(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("lopdf could not load {}: {e}; trying pdf-extract", path.display());
            return extract_with_pdf_extract(&bytes);
        }
    };

    if doc.is_encrypted() {
        doc.decrypt("")
            .map_err(|e| ExtractError::Encrypted(e.to_string()))?;
        debug!("Decrypted {} with empty password", path.display());
    }

    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        let text = doc.extract_text(&[*page_number]).unwrap_or_else(|e| {
            warn!(
                "Error extracting text from page {page_number} of {}: {e}",
                path.display()
            );
            String::new()
        });
        texts.push(text);
    }

    debug!("Extracted {} pages from {}", texts.len(), path.display());
    Ok(texts.join("\n"))
}

/// `pdf-extract` is known to panic on some malformed inputs; a panic here is
/// reported as an ordinary extraction failure.
fn extract_with_pdf_extract(bytes: &[u8]) -> Result<String, ExtractError> {
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("PDF parser panicked".to_string())),
    }
}

/// Single-page document with one line of Courier text.
#[cfg(test)]
pub(crate) fn write_sample_pdf(path: &Path, line: &str) {
    sample_document(&[SamplePage::Text(line)]).save(path).unwrap();
}

#[cfg(test)]
enum SamplePage<'a> {
    /// One line of Courier text.
    Text(&'a str),
    /// `Contents` points at an object that does not exist.
    MissingContents,
    /// Text drawn after a `Tf` with no operands, which `extract_text` rejects.
    BrokenFont(&'a str),
}

#[cfg(test)]
fn sample_document(pages: &[SamplePage]) -> Document {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let text_ops = |font: Vec<Object>, line: &str| Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", font),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content = match page {
            SamplePage::Text(line) => Some(text_ops(vec!["F1".into(), 24.into()], *line)),
            SamplePage::BrokenFont(line) => Some(text_ops(vec![], *line)),
            SamplePage::MissingContents => None,
        };
        let content_id = match content {
            Some(content) => {
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()))
            }
            None => (9999, 0),
        };
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}
