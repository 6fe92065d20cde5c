//! Multi-format text extraction.
//!
//! Converts raw document bytes plus a declared content type (MIME type or
//! file extension) into a single UTF-8 text blob. Each format family is an
//! ordered chain of extraction providers; the dispatcher tries them in order
//! and takes the first non-empty result. When every provider in a chain
//! fails, [`normalize`] returns a human-readable `"Error: ..."` marker
//! string instead of failing — downstream ingestion treats that marker like
//! real content, which keeps ingestion total at the cost of occasionally
//! indexing an error message.
//!
//! PDF output is annotated with `[Page N]` markers, PowerPoint with
//! `[Slide N]`, and Excel with `[Sheet N: name]`, preserving structural
//! context for retrieval and prompting.

use std::io::Read;

use tracing::debug;

/// Maximum sheets to process in a spreadsheet.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Outcome of a single extraction provider.
pub enum Extraction {
    /// Extraction succeeded (text may still be empty).
    Ok(String),
    /// The provider cannot run in this build (e.g. no OCR backend).
    Unavailable(&'static str),
    /// The provider ran and failed.
    Failed(String),
}

/// Format family resolved from the declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Pdf,
    Word,
    Excel,
    Powerpoint,
    Csv,
    Html,
    Image,
    Json,
    Xml,
    Markdown,
    Plain,
}

impl Family {
    fn name(&self) -> &'static str {
        match self {
            Family::Pdf => "PDF",
            Family::Word => "Word",
            Family::Excel => "Excel",
            Family::Powerpoint => "PowerPoint",
            Family::Csv => "CSV",
            Family::Html => "HTML",
            Family::Image => "image",
            Family::Json => "JSON",
            Family::Xml => "XML",
            Family::Markdown => "Markdown",
            Family::Plain => "text",
        }
    }

    /// Ordered provider chain for this family.
    fn providers(&self) -> &'static [fn(&[u8]) -> Extraction] {
        match self {
            Family::Pdf => &[extract_pdf_pages, extract_pdf_lopdf],
            Family::Word => &[extract_docx],
            Family::Excel => &[extract_xlsx_calamine, extract_xlsx_zip],
            Family::Powerpoint => &[extract_pptx],
            Family::Csv => &[extract_csv, extract_plain],
            Family::Html => &[extract_html, extract_plain],
            Family::Image => &[extract_image_ocr],
            Family::Json => &[extract_json, extract_plain],
            Family::Xml => &[extract_xml, extract_plain],
            Family::Markdown => &[extract_plain],
            Family::Plain => &[extract_plain],
        }
    }
}

/// Resolves a lowercased declared type or extension to a format family by
/// substring matching. Unrecognized types fall back to plain text.
pub fn detect_family(declared_type: &str) -> Family {
    let t = declared_type.to_lowercase();
    if t.contains("pdf") {
        Family::Pdf
    } else if t.contains("wordprocessingml") || t.contains("msword") || t.contains("doc") {
        Family::Word
    } else if t.contains("spreadsheetml") || t.contains("excel") || t.contains("xls") {
        Family::Excel
    } else if t.contains("presentationml") || t.contains("powerpoint") || t.contains("ppt") {
        Family::Powerpoint
    } else if t.contains("csv") {
        Family::Csv
    } else if t.contains("html") || t.contains("htm") {
        Family::Html
    } else if t.contains("image")
        || t.contains("png")
        || t.contains("jpg")
        || t.contains("jpeg")
        || t.contains("tiff")
        || t.contains("bmp")
        || t.contains("gif")
    {
        Family::Image
    } else if t.contains("json") {
        Family::Json
    } else if t.contains("xml") {
        Family::Xml
    } else if t.contains("markdown") || t == "md" || t.ends_with(".md") {
        Family::Markdown
    } else {
        Family::Plain
    }
}

/// Extracts text from document bytes. Never fails: if every provider in the
/// family's chain fails, the returned string is an `"Error: ..."` marker
/// that flows through the pipeline like real content.
pub fn normalize(bytes: &[u8], declared_type: &str) -> String {
    let family = detect_family(declared_type);
    debug!(
        declared_type,
        family = family.name(),
        input_bytes = bytes.len(),
        "extraction dispatch"
    );

    let mut last_reason = String::from("no extraction provider available");
    let mut saw_empty_ok = false;

    for provider in family.providers() {
        match provider(bytes) {
            Extraction::Ok(text) => {
                if text.trim().is_empty() {
                    debug!(family = family.name(), "provider returned empty text, trying next");
                    saw_empty_ok = true;
                    continue;
                }
                debug!(
                    family = family.name(),
                    output_chars = text.chars().count(),
                    "extraction succeeded"
                );
                return text;
            }
            Extraction::Unavailable(reason) => {
                debug!(family = family.name(), reason, "provider unavailable");
                last_reason = reason.to_string();
            }
            Extraction::Failed(reason) => {
                debug!(family = family.name(), %reason, "provider failed");
                last_reason = reason;
            }
        }
    }

    // A provider succeeded but the document genuinely has no text: empty
    // output, not an error marker.
    if saw_empty_ok {
        return String::new();
    }

    format!(
        "Error: Unable to extract {} content from '{}': {}",
        family.name(),
        declared_type,
        last_reason
    )
}

// ============ PDF ============

fn extract_pdf_pages(bytes: &[u8]) -> Extraction {
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes));
    match result {
        Ok(Ok(pages)) => {
            let mut out = String::new();
            for (i, page) in pages.iter().enumerate() {
                if !out.is_empty() {
                    out.push_str("\n\n");
                }
                out.push_str(&format!("[Page {}]\n", i + 1));
                out.push_str(page.trim());
            }
            Extraction::Ok(out)
        }
        Ok(Err(e)) => Extraction::Failed(format!("pdf-extract failed: {}", e)),
        Err(_) => Extraction::Failed("pdf-extract panicked on malformed input".to_string()),
    }
}

fn extract_pdf_lopdf(bytes: &[u8]) -> Extraction {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(d) => d,
        Err(e) => return Extraction::Failed(format!("lopdf load failed: {}", e)),
    };

    let mut out = String::new();
    for (page_num, _) in doc.get_pages() {
        let page_text = match doc.extract_text(&[page_num]) {
            Ok(t) => t,
            Err(_) => continue,
        };
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("[Page {}]\n", page_num));
        out.push_str(page_text.trim());
    }
    Extraction::Ok(out)
}

// ============ OOXML helpers ============

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, String> {
    let entry = archive.by_name(name).map_err(|e| e.to_string())?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| e.to_string())?;
    if out.len() as u64 >= max_bytes {
        return Err(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        ));
    }
    Ok(out)
}

/// Collects the text of every `<t>` element (any namespace), inserting a
/// newline at the end of each `<p>` paragraph element.
fn collect_t_elements(xml: &[u8]) -> Result<String, String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = false;
                } else if e.local_name().as_ref() == b"p" && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

// ============ Word ============

fn extract_docx(bytes: &[u8]) -> Extraction {
    let mut archive = match zip::ZipArchive::new(std::io::Cursor::new(bytes)) {
        Ok(a) => a,
        Err(e) => return Extraction::Failed(format!("not a valid OOXML archive: {}", e)),
    };
    let doc_xml = match read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)
    {
        Ok(x) => x,
        Err(e) => return Extraction::Failed(format!("word/document.xml: {}", e)),
    };
    match collect_t_elements(&doc_xml) {
        Ok(text) => Extraction::Ok(text),
        Err(e) => Extraction::Failed(format!("document.xml parse failed: {}", e)),
    }
}

// ============ PowerPoint ============

fn extract_pptx(bytes: &[u8]) -> Extraction {
    let mut archive = match zip::ZipArchive::new(std::io::Cursor::new(bytes)) {
        Ok(a) => a,
        Err(e) => return Extraction::Failed(format!("not a valid OOXML archive: {}", e)),
    };
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });

    if slide_names.is_empty() {
        return Extraction::Failed("no slides found in archive".to_string());
    }

    let mut out = String::new();
    for (i, name) in slide_names.iter().enumerate() {
        let xml = match read_zip_entry_bounded(&mut archive, name, MAX_XML_ENTRY_BYTES) {
            Ok(x) => x,
            Err(e) => return Extraction::Failed(format!("{}: {}", name, e)),
        };
        let text = match collect_t_elements(&xml) {
            Ok(t) => t,
            Err(e) => return Extraction::Failed(format!("{} parse failed: {}", name, e)),
        };
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("[Slide {}]\n", i + 1));
        out.push_str(text.trim());
    }
    Extraction::Ok(out)
}

// ============ Excel ============

fn extract_xlsx_calamine(bytes: &[u8]) -> Extraction {
    use calamine::{Data, Reader, Xlsx};

    let mut workbook = match Xlsx::new(std::io::Cursor::new(bytes)) {
        Ok(w) => w,
        Err(e) => return Extraction::Failed(format!("calamine open failed: {}", e)),
    };

    let sheet_names = workbook.sheet_names().to_owned();
    let mut out = String::new();

    for (i, name) in sheet_names.iter().take(XLSX_MAX_SHEETS).enumerate() {
        let range = match workbook.worksheet_range(name) {
            Ok(r) => r,
            Err(e) => return Extraction::Failed(format!("sheet '{}': {}", name, e)),
        };
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("[Sheet {}: {}]\n", i + 1, name));
        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .filter(|c| !matches!(c, Data::Empty))
                .map(|c| c.to_string())
                .collect();
            if !cells.is_empty() {
                out.push_str(&cells.join(" | "));
                out.push('\n');
            }
        }
    }
    Extraction::Ok(out)
}

/// Fallback spreadsheet extraction that walks the raw OOXML: resolves the
/// shared-strings table and renders each `<row>` as pipe-joined cell values.
fn extract_xlsx_zip(bytes: &[u8]) -> Extraction {
    let mut archive = match zip::ZipArchive::new(std::io::Cursor::new(bytes)) {
        Ok(a) => a,
        Err(e) => return Extraction::Failed(format!("not a valid OOXML archive: {}", e)),
    };

    let shared_strings = match read_zip_entry_bounded(
        &mut archive,
        "xl/sharedStrings.xml",
        MAX_XML_ENTRY_BYTES,
    ) {
        Ok(xml) => match parse_shared_strings(&xml) {
            Ok(s) => s,
            Err(e) => return Extraction::Failed(format!("sharedStrings.xml: {}", e)),
        },
        // Sheets with only inline numbers have no shared strings part.
        Err(_) => Vec::new(),
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
    for (i, name) in sheet_names.into_iter().take(XLSX_MAX_SHEETS).enumerate() {
        let sheet_xml = match read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES) {
            Ok(x) => x,
            Err(e) => return Extraction::Failed(format!("{}: {}", name, e)),
        };
        let rows = match parse_sheet_rows(&sheet_xml, &shared_strings) {
            Ok(r) => r,
            Err(e) => return Extraction::Failed(format!("{} parse failed: {}", name, e)),
        };
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("[Sheet {}]\n", i + 1));
        for row in rows {
            out.push_str(&row.join(" | "));
            out.push('\n');
        }
    }
    Extraction::Ok(out)
}

fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, String> {
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut current = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn parse_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>, String> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut in_v = false;
    let mut cell_is_shared = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => current_row.clear(),
                b"c" => {
                    cell_is_shared = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                }
                b"v" => in_v = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_v => {
                let raw = te.unescape().unwrap_or_default();
                let s = raw.trim();
                if s.is_empty() {
                    continue;
                }
                if cell_is_shared {
                    if let Ok(i) = s.parse::<usize>() {
                        if let Some(resolved) = shared_strings.get(i) {
                            current_row.push(resolved.clone());
                        }
                    }
                } else {
                    current_row.push(s.to_string());
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"c" => cell_is_shared = false,
                b"row" => {
                    if !current_row.is_empty() {
                        rows.push(std::mem::take(&mut current_row));
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

// ============ CSV ============

fn extract_csv(bytes: &[u8]) -> Extraction {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut out = String::new();
    for record in reader.byte_records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => return Extraction::Failed(format!("CSV parse failed: {}", e)),
        };
        let fields: Vec<String> = record
            .iter()
            .map(|f| String::from_utf8_lossy(f).trim().to_string())
            .collect();
        if fields.iter().any(|f| !f.is_empty()) {
            out.push_str(&fields.join(" | "));
            out.push('\n');
        }
    }
    Extraction::Ok(out)
}

// ============ HTML ============

fn extract_html(bytes: &[u8]) -> Extraction {
    let html = String::from_utf8_lossy(bytes);

    // Drop non-content elements before collecting text nodes.
    let document = scraper::Html::parse_document(&html);
    let mut stripped = html.to_string();
    for selector_str in ["script", "style", "noscript"] {
        if let Ok(selector) = scraper::Selector::parse(selector_str) {
            for element in document.select(&selector) {
                let element_html = element.html();
                stripped = stripped.replace(&element_html, "");
            }
        }
    }

    let document = scraper::Html::parse_document(&stripped);
    let mut out = String::new();
    for piece in document.root_element().text() {
        let t = piece.trim();
        if !t.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(t);
        }
    }
    Extraction::Ok(out)
}

// ============ Image (OCR) ============

fn extract_image_ocr(_bytes: &[u8]) -> Extraction {
    // No OCR backend is bundled; the dispatcher degrades this to an inline
    // error marker rather than a hard failure.
    Extraction::Unavailable("no OCR backend configured")
}

// ============ JSON ============

fn extract_json(bytes: &[u8]) -> Extraction {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(value) => {
            let mut out = String::new();
            flatten_json(&value, "", &mut out);
            Extraction::Ok(out)
        }
        Err(e) => Extraction::Failed(format!("invalid JSON: {}", e)),
    }
}

/// Renders a JSON value as `path: value` lines so nested structure survives
/// chunking as searchable text.
fn flatten_json(value: &serde_json::Value, prefix: &str, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_json(val, &path, out);
            }
        }
        serde_json::Value::Array(arr) => {
            for (i, val) in arr.iter().enumerate() {
                flatten_json(val, &format!("{}[{}]", prefix, i), out);
            }
        }
        serde_json::Value::String(s) => {
            out.push_str(&format!("{}: {}\n", prefix, s));
        }
        serde_json::Value::Number(n) => {
            out.push_str(&format!("{}: {}\n", prefix, n));
        }
        serde_json::Value::Bool(b) => {
            out.push_str(&format!("{}: {}\n", prefix, b));
        }
        serde_json::Value::Null => {}
    }
}

// ============ XML ============

fn extract_xml(bytes: &[u8]) -> Extraction {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Text(te)) => {
                let text = te.unescape().unwrap_or_default();
                let t = text.trim();
                if !t.is_empty() {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(t);
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Extraction::Failed(format!("XML parse failed: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Extraction::Ok(out)
}

// ============ Plain text ============

fn extract_plain(bytes: &[u8]) -> Extraction {
    match std::str::from_utf8(bytes) {
        Ok(s) => Extraction::Ok(s.to_string()),
        Err(_) => Extraction::Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal_ooxml(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, content) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn family_detection_by_substring() {
        assert_eq!(detect_family("application/pdf"), Family::Pdf);
        assert_eq!(detect_family(".pdf"), Family::Pdf);
        assert_eq!(
            detect_family("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            Family::Word
        );
        assert_eq!(
            detect_family("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
            Family::Excel
        );
        assert_eq!(
            detect_family("application/vnd.openxmlformats-officedocument.presentationml.presentation"),
            Family::Powerpoint
        );
        assert_eq!(detect_family("text/csv"), Family::Csv);
        assert_eq!(detect_family("text/html"), Family::Html);
        assert_eq!(detect_family("image/png"), Family::Image);
        assert_eq!(detect_family("application/json"), Family::Json);
        assert_eq!(detect_family("application/xml"), Family::Xml);
        assert_eq!(detect_family("text/markdown"), Family::Markdown);
        assert_eq!(detect_family("application/octet-stream"), Family::Plain);
    }

    #[test]
    fn invalid_pdf_degrades_to_error_marker() {
        let text = normalize(b"not a pdf at all", "application/pdf");
        assert!(text.starts_with("Error: Unable to extract PDF content"));
    }

    #[test]
    fn image_without_ocr_backend_degrades_to_error_marker() {
        let text = normalize(b"\x89PNG\r\n", "image/png");
        assert!(text.starts_with("Error: Unable to extract image content"));
        assert!(text.contains("no OCR backend configured"));
    }

    #[test]
    fn plain_text_passes_through() {
        let text = normalize("plain body".as_bytes(), "text/plain");
        assert_eq!(text, "plain body");
    }

    #[test]
    fn invalid_utf8_decodes_lossily() {
        let text = normalize(&[b'o', b'k', 0xFF, b'!'], "text/plain");
        assert!(text.starts_with("ok"));
        assert!(text.ends_with('!'));
    }

    #[test]
    fn empty_text_file_yields_empty_not_marker() {
        let text = normalize(b"", "text/plain");
        assert_eq!(text, "");
    }

    #[test]
    fn docx_paragraph_text_extracted() {
        let bytes = minimal_ooxml(&[(
            "word/document.xml",
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>first paragraph</w:t></w:r></w:p><w:p><w:r><w:t>second paragraph</w:t></w:r></w:p></w:body></w:document>",
        )]);
        let text = normalize(&bytes, ".docx");
        assert!(text.contains("first paragraph"));
        assert!(text.contains("second paragraph"));
        let first = text.find("first paragraph").unwrap();
        let second = text.find("second paragraph").unwrap();
        assert!(text[first..second].contains('\n'));
    }

    #[test]
    fn pptx_slides_annotated_in_order() {
        let slide = |t: &str| {
            format!(
                "<?xml version=\"1.0\"?><p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\"><a:t>{}</a:t></p:sld>",
                t
            )
        };
        let s1 = slide("opening remarks");
        let s2 = slide("closing remarks");
        let bytes = minimal_ooxml(&[
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
        ]);
        let text = normalize(&bytes, ".pptx");
        assert!(text.contains("[Slide 1]"));
        assert!(text.contains("[Slide 2]"));
        assert!(text.find("opening remarks").unwrap() < text.find("closing remarks").unwrap());
    }

    #[test]
    fn xlsx_fallback_renders_pipe_joined_rows() {
        let shared = "<?xml version=\"1.0\"?><sst xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><si><t>name</t></si><si><t>acme</t></si></sst>";
        let sheet = "<?xml version=\"1.0\"?><worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData><row><c t=\"s\"><v>0</v></c><c><v>42</v></c></row><row><c t=\"s\"><v>1</v></c><c><v>7</v></c></row></sheetData></worksheet>";
        let bytes = minimal_ooxml(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);
        // Not a full xlsx (no workbook part), so calamine fails and the raw
        // ZIP walker takes over.
        let text = normalize(&bytes, ".xlsx");
        assert!(text.contains("[Sheet 1]"));
        assert!(text.contains("name | 42"));
        assert!(text.contains("acme | 7"));
    }

    #[test]
    fn csv_rows_pipe_joined() {
        let text = normalize(b"name,qty\nwidget,3\ngadget,5\n", "text/csv");
        assert!(text.contains("name | qty"));
        assert!(text.contains("widget | 3"));
        assert!(text.contains("gadget | 5"));
    }

    #[test]
    fn html_text_extracted_scripts_dropped() {
        let html = b"<html><head><script>var hidden = 1;</script><style>p{color:red}</style></head><body><h1>Title</h1><p>Body text.</p></body></html>";
        let text = normalize(html, "text/html");
        assert!(text.contains("Title"));
        assert!(text.contains("Body text."));
        assert!(!text.contains("hidden"));
        assert!(!text.contains("color:red"));
    }

    #[test]
    fn json_flattened_to_path_value_lines() {
        let json = br#"{"company":{"name":"acme","sites":[{"city":"berlin"}]}}"#;
        let text = normalize(json, "application/json");
        assert!(text.contains("company.name: acme"));
        assert!(text.contains("company.sites[0].city: berlin"));
    }

    #[test]
    fn invalid_json_falls_back_to_plain_text() {
        let text = normalize(b"{not json", "application/json");
        assert_eq!(text, "{not json");
    }

    #[test]
    fn xml_text_nodes_collected() {
        let xml = b"<root><item>alpha</item><item>beta</item></root>";
        let text = normalize(xml, "application/xml");
        assert!(text.contains("alpha"));
        assert!(text.contains("beta"));
    }
}
