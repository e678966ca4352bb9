//! hOCR output
//!
//! Each recognized chunk contributes the `ocr_page` element of tesseract's
//! hOCR output. Its `title` properties are rewritten with the provenance
//! carried by the read session so the saved document points back at the
//! source image, page, rotation and resolution.

use anyhow::Context;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::{OutputEditor, ReadSession};
use crate::config::OutputMode;
use crate::engine::OcrEngine;

static PAGE_OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<div\s[^>]*class=['"]ocr_page['"][^>]*>"#).unwrap());

static TITLE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"title=("([^"]*)"|'([^']*)')"#).unwrap());

static ID_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"id=("[^"]*"|'[^']*')"#).unwrap());

/// Parse an hOCR property group `key value; key value`, keeping order
pub fn deserialize_attr_group(title: &str) -> Vec<(String, String)> {
    title
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| match p.split_once(char::is_whitespace) {
            Some((key, value)) => (key.to_string(), value.trim().to_string()),
            None => (p.to_string(), String::new()),
        })
        .collect()
}

pub fn serialize_attr_group(attrs: &[(String, String)]) -> String {
    attrs
        .iter()
        .map(|(k, v)| if v.is_empty() { k.clone() } else { format!("{} {}", k, v) })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Replace the value of `key`, appending it when absent
fn set_attr(attrs: &mut Vec<(String, String)>, key: &str, value: String) {
    match attrs.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 = value,
        None => attrs.push((key.to_string(), value)),
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

fn unescape_attr(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Slice out the complete `ocr_page` element, nested divs included
fn extract_page(hocr: &str) -> Option<&str> {
    let open = PAGE_OPEN_TAG.find(hocr)?;
    let mut depth = 1usize;
    let mut pos = open.end();

    while depth > 0 {
        let rest = &hocr[pos..];
        let next_open = rest.find("<div");
        let next_close = rest.find("</div>")?;
        match next_open {
            Some(o) if o < next_close => {
                depth += 1;
                pos += o + "<div".len();
            }
            _ => {
                depth -= 1;
                pos += next_close + "</div>".len();
            }
        }
    }
    Some(&hocr[open.start()..pos])
}

/// Rewrite the page element's opening tag with session provenance
fn rewrite_page(page: &str, session: &ReadSession, page_number: usize) -> String {
    let Some(open) = PAGE_OPEN_TAG.find(page) else {
        return page.to_string();
    };
    let tag = open.as_str();

    let current = TITLE_ATTR
        .captures(tag)
        .and_then(|c| c.get(2).or_else(|| c.get(3)))
        .map(|m| unescape_attr(m.as_str()))
        .unwrap_or_default();

    let mut attrs = deserialize_attr_group(&current);
    set_attr(&mut attrs, "image", format!("'{}'", session.file.display()));
    set_attr(&mut attrs, "ppageno", session.page.to_string());
    set_attr(&mut attrs, "rot", format!("{}", session.angle));
    set_attr(&mut attrs, "res", session.resolution.to_string());
    let title = format!("title=\"{}\"", escape_attr(&serialize_attr_group(&attrs)));

    let tag = if TITLE_ATTR.is_match(tag) {
        TITLE_ATTR.replace(tag, regex::NoExpand(&title)).into_owned()
    } else {
        tag.replacen("<div", &format!("<div {}", title), 1)
    };
    let id = format!("id=\"page_{}\"", page_number);
    let tag = if ID_ATTR.is_match(&tag) {
        ID_ATTR.replace(&tag, regex::NoExpand(&id)).into_owned()
    } else {
        tag.replacen("<div", &format!("<div {}", id), 1)
    };

    format!("{}{}", tag, &page[open.end()..])
}

/// Accumulates hOCR pages
#[derive(Debug, Default)]
pub struct HocrEditor {
    pages: Vec<String>,
    languages: Vec<String>,
    modified: bool,
}

impl HocrEditor {
    pub fn new() -> Self {
        Self::default()
    }

    fn document(&self) -> String {
        let mut doc = String::from(concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Transitional//EN\" ",
            "\"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd\">\n",
            "<html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"en\" lang=\"en\">\n",
            " <head>\n",
            "  <title></title>\n",
            "  <meta http-equiv=\"Content-Type\" content=\"text/html;charset=utf-8\" />\n",
            "  <meta name=\"ocr-system\" content=\"page-reader (tesseract)\" />\n",
            "  <meta name=\"ocr-capabilities\" content=\"ocr_page ocr_carea ocr_par ocr_line ocrx_word\" />\n",
        ));
        doc.push_str(&format!(
            "  <meta name=\"ocr-langs\" content=\"{}\" />\n",
            escape_attr(&self.languages.join(" "))
        ));
        doc.push_str(" </head>\n <body>\n");
        for page in &self.pages {
            doc.push_str("  ");
            doc.push_str(page.trim());
            doc.push('\n');
        }
        doc.push_str(" </body>\n</html>\n");
        doc
    }
}

impl OutputEditor for HocrEditor {
    fn mode(&self) -> OutputMode {
        OutputMode::Hocr
    }

    fn init_read(&mut self, engine: &dyn OcrEngine) -> ReadSession {
        let session = ReadSession::new(engine.language());
        for lang in session.language.split('+').filter(|l| !l.is_empty()) {
            if !self.languages.iter().any(|l| l == lang) {
                self.languages.push(lang.to_string());
            }
        }
        session
    }

    fn read(&mut self, engine: &dyn OcrEngine, session: &mut ReadSession) {
        let hocr = engine.hocr_text();
        let Some(page) = extract_page(&hocr) else {
            warn!("No ocr_page element in engine output for {}", session.display_name());
            session
                .errors
                .push(format!("{}[{}]: no hOCR page in engine output", session.display_name(), session.page));
            return;
        };

        let rewritten = rewrite_page(page, session, self.pages.len() + 1);
        debug!("Added hOCR page {} from {}", self.pages.len() + 1, session.display_name());
        self.pages.push(rewritten);
        self.modified = true;
        session.chunks_read += 1;
    }

    fn read_error(&mut self, message: &str, session: &mut ReadSession) {
        let message = message.trim().trim_start_matches('[').trim_end_matches(']');
        let entry = if session.file.as_os_str().is_empty() {
            format!("page {}: {}", session.page, message)
        } else {
            format!("{}[{}]: {}", session.display_name(), session.page, message)
        };
        session.errors.push(entry);
    }

    fn finalize_read(&mut self, session: ReadSession) {
        if !session.errors.is_empty() {
            warn!(
                "The following pages could not be processed:\n{}",
                session.errors.join("\n")
            );
        }
    }

    fn is_modified(&self) -> bool {
        self.modified
    }

    fn save(&mut self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.document())
            .with_context(|| format!("Failed to write {:?}", path))?;
        self.modified = false;
        Ok(())
    }

    fn clear(&mut self) {
        self.pages.clear();
        self.languages.clear();
        self.modified = false;
    }

    fn contents(&self) -> String {
        self.document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const TESSERACT_HOCR: &str = r#"<body>
  <div class='ocr_page' id='page_1' title='image "/tmp/page-reader/region.png"; bbox 0 0 200 100; ppageno 0; scan_res 300 300'>
   <div class='ocr_carea' id='block_1_1' title="bbox 10 10 190 90">
    <p class='ocr_par' id='par_1_1'><span class='ocrx_word' id='word_1_1'>Hello</span></p>
   </div>
  </div>
 </body>"#;

    fn session() -> ReadSession {
        let mut session = ReadSession::new("eng");
        session.file = PathBuf::from("/scans/letter.png");
        session.page = 2;
        session.angle = 90.0;
        session.resolution = 300;
        session
    }

    #[test]
    fn test_attr_group_roundtrip_keeps_order() {
        let attrs = deserialize_attr_group("image 'a.png'; bbox 0 0 10 10; ppageno 0");
        assert_eq!(attrs[0], ("image".to_string(), "'a.png'".to_string()));
        assert_eq!(attrs[1].0, "bbox");
        assert_eq!(serialize_attr_group(&attrs), "image 'a.png'; bbox 0 0 10 10; ppageno 0");
    }

    #[test]
    fn test_extract_page_with_nested_divs() {
        let page = extract_page(TESSERACT_HOCR).unwrap();
        assert!(page.starts_with("<div class='ocr_page'"));
        assert!(page.ends_with("</div>\n  </div>"));
        assert!(page.contains("Hello"));
        assert!(extract_page("<body></body>").is_none());
    }

    #[test]
    fn test_read_rewrites_title() {
        let mut editor = HocrEditor::new();
        let engine = FakeEngine::with_hocr(TESSERACT_HOCR);
        let provenance = session();
        let mut session = editor.init_read(&engine);
        session.file = provenance.file;
        session.page = provenance.page;
        session.angle = provenance.angle;
        session.resolution = provenance.resolution;

        editor.read(&engine, &mut session);

        let doc = editor.contents();
        assert!(doc.contains(
            "title=\"image '/scans/letter.png'; bbox 0 0 200 100; ppageno 2; scan_res 300 300; rot 90; res 300\""
        ));
        assert!(doc.contains("id=\"page_1\""));
        assert!(doc.contains("<meta name=\"ocr-langs\" content=\"eng\" />"));
        assert_eq!(doc.matches("class='ocr_page'").count(), 1);
        assert_eq!(session.chunks_read, 1);
    }

    #[test]
    fn test_pages_are_numbered_in_order() {
        let mut editor = HocrEditor::new();
        let engine = FakeEngine::with_hocr(TESSERACT_HOCR);
        let mut session = session();

        editor.read(&engine, &mut session);
        editor.read(&engine, &mut session);

        let doc = editor.contents();
        let first = doc.find("id=\"page_1\"").unwrap();
        let second = doc.find("id=\"page_2\"").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_missing_page_is_recorded() {
        let mut editor = HocrEditor::new();
        let mut session = session();
        editor.read(&FakeEngine::with_hocr("<body></body>"), &mut session);

        assert!(editor.pages.is_empty());
        assert_eq!(session.errors.len(), 1);
        assert!(!editor.is_modified());
    }

    #[test]
    fn test_read_error_records_file_and_page() {
        let mut editor = HocrEditor::new();
        let mut session = session();
        editor.read_error("\n[Failed to recognize page 2]\n", &mut session);

        assert_eq!(session.errors, vec!["letter.png[2]: Failed to recognize page 2"]);
    }

    #[test]
    fn test_save_writes_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.html");
        let mut editor = HocrEditor::new();
        let mut session = session();
        editor.read(&FakeEngine::with_hocr(TESSERACT_HOCR), &mut session);

        editor.save(&path).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.starts_with("<?xml"));
        assert!(saved.contains("class='ocr_page'"));
        assert!(saved.trim_end().ends_with("</html>"));
        assert!(!editor.is_modified());
    }
}
