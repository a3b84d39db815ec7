// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Document loading for plain text, PDF and DOCX inputs

use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::{DocSentryError, Result};

/// Sample Power Purchase Agreement used when no document is given
pub const SAMPLE_DOCUMENT: &str = "This Power Purchase Agreement (PPA) is made on January 1, 2023, \
between Green Energy Corp, located in California, and Solar Solutions Inc. \
The agreement covers the supply of 100MW solar power for 20 years. \
The contract value is $50 million.";

/// Default location of the sample document
pub const SAMPLE_FILE: &str = "sample_document.txt";

/// Read the text of a document, dispatching on its extension
pub fn load_document(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    debug!("Loading document {:?} (type: {})", path, if ext.is_empty() { "none" } else { ext.as_str() });

    match ext.as_str() {
        "txt" | "text" | "md" | "markdown" | "rst" => Ok(std::fs::read_to_string(path)?),
        "pdf" => extract_pdf(path),
        "docx" => extract_docx(path),
        _ => Err(DocSentryError::UnsupportedFileType(
            path.display().to_string(),
        )),
    }
}

/// Write the sample document if the file does not exist yet.
///
/// Returns `true` when the file was created.
pub fn ensure_sample(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, SAMPLE_DOCUMENT)?;
    info!("Created sample document at {:?}", path);
    Ok(true)
}

/// Truncate to at most `max` characters
pub fn truncate_content(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Content hash used to identify archived reports
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

fn extract_pdf(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| DocSentryError::Pdf(format!("Text extraction failed: {}", e)))
}

fn extract_docx(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| DocSentryError::Analysis(format!("Failed to open DOCX: {}", e)))?;

    // DOCX stores content in word/document.xml
    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|_| DocSentryError::Analysis("No document.xml found".to_string()))?;

    let mut content = String::new();
    document_xml.read_to_string(&mut content)?;

    Ok(docx_xml_to_text(&content))
}

/// Collect `<w:t>` runs; paragraph ends and breaks become newlines
fn docx_xml_to_text(xml: &str) -> String {
    let mut text = String::new();
    let mut in_text = false;
    let mut rest = xml;

    while let Some(open) = rest.find('<') {
        if in_text {
            text.push_str(&unescape_xml(&rest[..open]));
        }
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        let tag = &rest[open + 1..open + close];

        match tag.split_whitespace().next().unwrap_or("") {
            "w:t" => in_text = true,
            "/w:t" => in_text = false,
            "/w:p" | "w:br/" | "w:cr/" => text.push('\n'),
            "w:tab/" => text.push('\t'),
            _ => {}
        }

        rest = &rest[open + close + 1..];
    }

    text.trim_end().to_string()
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_ensure_sample_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SAMPLE_FILE);

        assert!(ensure_sample(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE_DOCUMENT);

        std::fs::write(&path, "custom").unwrap();
        assert!(!ensure_sample(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "custom");
    }

    #[test]
    fn test_load_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.TXT");
        std::fs::write(&path, "Invoice #42").unwrap();
        assert_eq!(load_document(&path).unwrap(), "Invoice #42");
    }

    #[test]
    fn test_load_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, [0u8, 1, 2]).unwrap();
        assert!(matches!(load_document(&path), Err(DocSentryError::UnsupportedFileType(_))));
    }

    #[test]
    fn test_load_docx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.docx");

        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(
            br#"<w:document><w:body><w:p><w:r><w:t>Contract Summary</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">Term: 15 years &amp; </w:t></w:r><w:r><w:t>renewable</w:t></w:r></w:p></w:body></w:document>"#,
        )
        .unwrap();
        zip.finish().unwrap();

        let text = load_document(&path).unwrap();
        assert_eq!(text, "Contract Summary\nTerm: 15 years & renewable");
    }

    #[test]
    fn test_truncate_content_counts_chars() {
        assert_eq!(truncate_content("short", 100), "short");
        assert_eq!(truncate_content("€100", 2), "€1");
        assert_eq!(truncate_content("ab€", 3), "ab€");
        assert_eq!(truncate_content("ab€d", 3), "ab€");
        assert_eq!(truncate_content("abcdef", 3), "abc");
        assert_eq!(truncate_content("abc", 0), "");
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("abc").len(), 64);
    }
}
