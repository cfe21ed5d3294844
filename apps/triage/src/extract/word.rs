use std::path::Path;
use std::process::Command;

use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use tracing::{debug, warn};

use super::ExtractError;

/// Visible paragraph text of a `.docx`, one line per paragraph.
pub fn extract_docx(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;
    docx_text(&bytes)
}

fn docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| ExtractError::Word(e.to_string()))?;

    let mut text = String::new();
    for child in &docx.document.children {
        let DocumentChild::Paragraph(paragraph) = child else {
            continue;
        };
        for paragraph_child in &paragraph.children {
            let ParagraphChild::Run(run) = paragraph_child else {
                continue;
            };
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    _ => {}
                }
            }
        }
        text.push('\n');
    }
    Ok(text)
}

/// Legacy `.doc` through an external converter that prints the document's
/// text on stdout (`antiword <file>` by default).
///
/// Files saved with a `.doc` name but holding OOXML (zip) content are read as
/// `.docx` instead.
pub fn extract_doc(path: &Path, converter: &str) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;
    if bytes.starts_with(b"PK\x03\x04") {
        debug!("{} is OOXML despite its .doc extension", path.display());
        return docx_text(&bytes);
    }

    let output = Command::new(converter)
        .arg(path)
        .output()
        .map_err(|e| ExtractError::Converter(format!("could not run '{converter}': {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("'{converter}' failed on {}: {}", path.display(), stderr.trim());
        return Err(ExtractError::Converter(format!(
            "'{converter}' exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
