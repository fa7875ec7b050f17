//! Text extraction for uploaded documents.
//!
//! Converts a raw payload plus its declared media type into plain UTF-8
//! text. Extraction is a pure function of the bytes (no network, no
//! filesystem), so it can be retried cheaply and tested with fixed fixtures.
//! Unsupported media types are rejected before any downstream work is
//! attempted.

use std::io::Read;

use thiserror::Error;

/// Media types accepted by the extractor.
pub const MEDIA_TEXT: &str = "text/plain";
pub const MEDIA_MARKDOWN: &str = "text/markdown";
pub const MEDIA_PDF: &str = "application/pdf";
pub const MEDIA_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Upper bound on a PDF payload; larger inputs fail instead of risking
/// unbounded parse time on pathological structures.
const MAX_PDF_BYTES: usize = 50 * 1024 * 1024;
/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb cap).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction error. `UnsupportedMediaType` is user-correctable (re-upload
/// in a supported format); `Failed` means the bytes are malformed and a
/// retry cannot help.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Extract plain text from an uploaded payload.
pub fn extract_text(bytes: &[u8], media_type: &str) -> Result<String, ExtractError> {
    match media_type {
        MEDIA_TEXT | MEDIA_MARKDOWN => extract_plain(bytes),
        MEDIA_PDF => extract_pdf(bytes),
        MEDIA_DOCX => extract_docx(bytes),
        other => Err(ExtractError::UnsupportedMediaType(other.to_string())),
    }
}

/// Map a filename extension to a supported media type. Used by intake
/// layers that only know the filename (e.g. the CLI).
pub fn media_type_for_path(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "txt" => Some(MEDIA_TEXT),
        "md" | "markdown" => Some(MEDIA_MARKDOWN),
        "pdf" => Some(MEDIA_PDF),
        "docx" => Some(MEDIA_DOCX),
        _ => None,
    }
}

/// Plain text and markdown: strict UTF-8 decode, line endings normalized to
/// `\n`, no other transformation.
fn extract_plain(bytes: &[u8]) -> Result<String, ExtractError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ExtractError::Failed(format!("invalid UTF-8: {}", e)))?;
    Ok(normalize_newlines(text))
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    if bytes.len() > MAX_PDF_BYTES {
        return Err(ExtractError::Failed(format!(
            "PDF exceeds size limit ({} bytes)",
            MAX_PDF_BYTES
        )));
    }
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ExtractError::Failed(format!("PDF parse: {}", e)))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Failed(format!("DOCX archive: {}", e)))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Failed("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Failed(format!("DOCX read: {}", e)))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Failed(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_text_runs(&doc_xml)
}

/// Walk `w:t` text runs and join paragraphs with newlines.
fn extract_text_runs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                // Paragraph boundary
                if e.local_name().as_ref() == b"p" && !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Failed(format!("DOCX xml: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal_docx(phrase: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
                phrase
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn unsupported_media_type_fails_fast() {
        let err = extract_text(b"foo", "application/octet-stream").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedMediaType(_)));
    }

    #[test]
    fn plain_text_passes_through() {
        let text = extract_text(b"Revenue grew 12%.", MEDIA_TEXT).unwrap();
        assert_eq!(text, "Revenue grew 12%.");
    }

    #[test]
    fn line_endings_are_normalized() {
        let text = extract_text(b"a\r\nb\rc\n", MEDIA_MARKDOWN).unwrap();
        assert_eq!(text, "a\nb\nc\n");
    }

    #[test]
    fn invalid_utf8_is_extraction_failure() {
        let err = extract_text(&[0xff, 0xfe, 0x00], MEDIA_TEXT).unwrap_err();
        assert!(matches!(err, ExtractError::Failed(_)));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", MEDIA_PDF).unwrap_err();
        assert!(matches!(err, ExtractError::Failed(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", MEDIA_DOCX).unwrap_err();
        assert!(matches!(err, ExtractError::Failed(_)));
    }

    #[test]
    fn docx_without_document_xml_fails() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_text(&buf, MEDIA_DOCX).unwrap_err();
        assert!(matches!(err, ExtractError::Failed(_)));
    }

    #[test]
    fn docx_text_runs_extracted() {
        let bytes = minimal_docx("quarterly revenue report");
        let text = extract_text(&bytes, MEDIA_DOCX).unwrap();
        assert_eq!(text, "quarterly revenue report");
    }

    #[test]
    fn media_type_from_extension() {
        use std::path::Path;
        assert_eq!(media_type_for_path(Path::new("a.txt")), Some(MEDIA_TEXT));
        assert_eq!(media_type_for_path(Path::new("a.MD")), Some(MEDIA_MARKDOWN));
        assert_eq!(media_type_for_path(Path::new("a.pdf")), Some(MEDIA_PDF));
        assert_eq!(media_type_for_path(Path::new("a.docx")), Some(MEDIA_DOCX));
        assert_eq!(media_type_for_path(Path::new("a.exe")), None);
        assert_eq!(media_type_for_path(Path::new("noext")), None);
    }
}
