//! Multi-format plain-text extraction for uploaded documents.
//!
//! Connector layer between raw upload bytes and the document store: given
//! bytes plus a MIME type / file extension, return plain UTF-8 text. Binary
//! formats go through parsing crates (pdf-extract for PDF, zip + quick-xml
//! for OOXML); text formats are decoded and lightly normalized.

use std::collections::HashSet;
use std::io::Read;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// MIME types with dedicated extraction paths.
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_XLS: &str = "application/vnd.ms-excel";

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum worksheets processed in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;

/// Source-code file extensions stored with a file-type banner.
static CODE_EXTENSIONS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "js", "jsx", "ts", "tsx", "py", "java", "c", "cpp", "cs", "go", "rs", "rb", "php",
        "swift", "kt", "r", "sql", "sh", "bash", "json", "xml", "yaml", "yml", "css", "scss",
        "sass", "less",
    ]
    .into_iter()
    .collect()
});

static SCRIPT_STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").unwrap());
static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static RTF_CONTROL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\\[^{}]+\}|[{}]|\\[A-Za-z]+(-?\d+)? ?").unwrap());

/// Extraction failure. The upload handler surfaces these as client errors;
/// nothing here panics on malformed input.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("file is not valid UTF-8: {0}")]
    Encoding(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// Extract plain text from uploaded bytes.
///
/// Dispatches on the reported MIME type first, then the file extension,
/// mirroring how browsers are inconsistent about both.
pub fn extract_text(
    bytes: &[u8],
    mime_type: &str,
    extension: &str,
) -> Result<String, ExtractError> {
    let ext = extension.to_ascii_lowercase();
    match mime_type {
        MIME_PDF => return extract_pdf(bytes),
        MIME_DOCX => return extract_docx(bytes),
        MIME_XLSX | MIME_XLS => return extract_xlsx(bytes),
        "text/plain" => return decode_utf8(bytes),
        "text/csv" => return decode_utf8(bytes),
        "text/markdown" => return decode_utf8(bytes),
        "text/html" => return extract_html(bytes),
        "application/rtf" => return extract_rtf(bytes),
        _ => {}
    }

    match ext.as_str() {
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        "xlsx" | "xls" => extract_xlsx(bytes),
        "txt" | "md" | "csv" => decode_utf8(bytes),
        "html" | "htm" => extract_html(bytes),
        "rtf" => extract_rtf(bytes),
        _ if CODE_EXTENSIONS.contains(ext.as_str()) => extract_code(bytes, &ext),
        _ => Err(ExtractError::UnsupportedType(if mime_type.is_empty() {
            ext
        } else {
            mime_type.to_string()
        })),
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String, ExtractError> {
    String::from_utf8(bytes.to_vec())
        .map(|s| s.trim().to_string())
        .map_err(|e| ExtractError::Encoding(e.to_string()))
}

fn extract_code(bytes: &[u8], extension: &str) -> Result<String, ExtractError> {
    let code = decode_utf8(bytes)?;
    Ok(format!("File Type: {}\n\n{}", extension, code)
        .trim()
        .to_string())
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map(|s| s.trim().to_string())
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Strip markup from HTML, dropping script/style bodies entirely.
fn extract_html(bytes: &[u8]) -> Result<String, ExtractError> {
    let html = String::from_utf8_lossy(bytes);
    let without_blocks = SCRIPT_STYLE_RE.replace_all(&html, " ");
    let without_tags = HTML_TAG_RE.replace_all(&without_blocks, " ");
    let text = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    Ok(collapse_whitespace(&text))
}

/// Basic RTF extraction: drop control words and groups, keep the text runs.
fn extract_rtf(bytes: &[u8]) -> Result<String, ExtractError> {
    let rtf = String::from_utf8_lossy(bytes)
        .replace("\\par", "\n")
        .replace("\\pard", "\n");
    let text = RTF_CONTROL_RE.replace_all(&rtf, "");
    Ok(collapse_whitespace(&text))
}

fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit",
            name
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml")?;
    let paragraphs = collect_text_elements(&xml, b"p")?;
    Ok(paragraphs.join("\n").trim().to_string())
}

/// Collect the text content of `<w:t>` runs, grouped by the enclosing
/// element named `group_tag` (paragraphs for docx).
fn collect_text_elements(xml: &[u8], group_tag: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut groups: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if in_text_run => {
                current.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = false;
                } else if e.local_name().as_ref() == group_tag {
                    groups.push(std::mem::take(&mut current));
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !current.is_empty() {
        groups.push(current);
    }
    Ok(groups)
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;

    let has_shared = archive.file_names().any(|n| n == "xl/sharedStrings.xml");
    let shared = if has_shared {
        let xml = read_zip_entry_bounded(&mut archive, "xl/sharedStrings.xml")?;
        read_shared_strings(&xml)?
    } else {
        Vec::new()
    };

    let mut sheet_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    sheet_names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    let mut out = String::new();
    for name in sheet_names.into_iter().take(XLSX_MAX_SHEETS) {
        let xml = read_zip_entry_bounded(&mut archive, &name)?;
        let cells = read_sheet_cells(&xml, &shared)?;
        if !cells.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&cells.join(", "));
        }
    }
    Ok(out)
}

fn read_shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut in_si = false;
    let mut current = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = true;
                    current.clear();
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if in_si => {
                current.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn read_sheet_cells(xml: &[u8], shared: &[String]) -> Result<Vec<String>, ExtractError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut cells = Vec::new();
    let mut cell_is_shared = false;
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"c" {
                    cell_is_shared = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                } else if e.local_name().as_ref() == b"v" {
                    in_value = true;
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if in_value => {
                let raw = t.unescape().unwrap_or_default();
                let value = raw.trim();
                if value.is_empty() {
                    // skip
                } else if cell_is_shared {
                    if let Ok(i) = value.parse::<usize>() {
                        if let Some(s) = shared.get(i) {
                            cells.push(s.clone());
                        }
                    }
                } else {
                    cells.push(value.to_string());
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"v" {
                    in_value = false;
                } else if e.local_name().as_ref() == b"c" {
                    cell_is_shared = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(cells)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Dispatch ----

    #[test]
    fn test_unsupported_type_errors() {
        let err = extract_text(b"blob", "application/octet-stream", "bin").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedType(_)));
    }

    #[test]
    fn test_extension_fallback_when_mime_missing() {
        let text = extract_text(b"plain body", "", "txt").unwrap();
        assert_eq!(text, "plain body");
    }

    // ---- Text formats ----

    #[test]
    fn test_plain_text_trimmed() {
        let text = extract_text(b"  hello world \n", "text/plain", "txt").unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn test_markdown_passthrough() {
        let text = extract_text(b"# Title\n\nBody", "text/markdown", "md").unwrap();
        assert_eq!(text, "# Title\n\nBody");
    }

    #[test]
    fn test_csv_passthrough() {
        let text = extract_text(b"name,age\nalice,30\n", "text/csv", "csv").unwrap();
        assert!(text.contains("alice,30"));
    }

    #[test]
    fn test_invalid_utf8_errors() {
        let err = extract_text(&[0xff, 0xfe, 0xfd], "text/plain", "txt").unwrap_err();
        assert!(matches!(err, ExtractError::Encoding(_)));
    }

    #[test]
    fn test_code_file_gets_banner() {
        let text = extract_text(b"fn main() {}", "", "rs").unwrap();
        assert!(text.starts_with("File Type: rs"));
        assert!(text.contains("fn main() {}"));
    }

    // ---- HTML ----

    #[test]
    fn test_html_strips_tags() {
        let html = b"<html><body><h1>Title</h1><p>Some <b>bold</b> text.</p></body></html>";
        let text = extract_text(html, "text/html", "html").unwrap();
        assert!(text.contains("Title"));
        assert!(text.contains("bold"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_html_drops_script_and_style() {
        let html = b"<p>visible</p><script>var hidden = 1;</script><style>.x{color:red}</style>";
        let text = extract_text(html, "text/html", "html").unwrap();
        assert!(text.contains("visible"));
        assert!(!text.contains("hidden"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn test_html_decodes_entities() {
        let text = extract_text(b"<p>a &amp; b</p>", "text/html", "html").unwrap();
        assert_eq!(text, "a & b");
    }

    // ---- RTF ----

    #[test]
    fn test_rtf_basic_extraction() {
        let rtf = br"{\rtf1{\fonttbl{\f0 Courier;}}\f0 Hello\par World}";
        let text = extract_text(rtf, "application/rtf", "rtf").unwrap();
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
        assert!(!text.contains("rtf1"));
    }

    // ---- Binary formats (error paths; valid fixtures need real files) ----

    #[test]
    fn test_invalid_pdf_errors() {
        let err = extract_text(b"not a pdf", MIME_PDF, "pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_invalid_docx_errors() {
        let err = extract_text(b"not a zip", MIME_DOCX, "docx").unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn test_invalid_xlsx_errors() {
        let err = extract_text(b"not a zip", MIME_XLSX, "xlsx").unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    // ---- OOXML XML walkers (driven directly with XML fragments) ----

    #[test]
    fn test_docx_text_runs_grouped_by_paragraph() {
        let xml = br#"<w:document xmlns:w="ns"><w:body>
            <w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>
            <w:p><w:r><w:t>Second line</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let groups = collect_text_elements(xml, b"p").unwrap();
        assert_eq!(groups, vec!["Hello world".to_string(), "Second line".to_string()]);
    }

    #[test]
    fn test_shared_strings_parsed() {
        let xml = br#"<sst><si><t>alpha</t></si><si><t>beta</t></si></sst>"#;
        let strings = read_shared_strings(xml).unwrap();
        assert_eq!(strings, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn test_sheet_cells_resolve_shared_strings() {
        let shared = vec!["name".to_string(), "alice".to_string()];
        let xml = br#"<worksheet><sheetData>
            <row><c t="s"><v>0</v></c><c t="s"><v>1</v></c><c><v>30</v></c></row>
        </sheetData></worksheet>"#;
        let cells = read_sheet_cells(xml, &shared).unwrap();
        assert_eq!(
            cells,
            vec!["name".to_string(), "alice".to_string(), "30".to_string()]
        );
    }
}
