//! Text extraction for uploaded documents.
//!
//! Dispatch goes through a closed table keyed by [`FileType`]; a declared type
//! outside that set is an explicit [`Extraction::Unsupported`] outcome rather
//! than an error.

use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use relay_core::events::FileType;

use crate::error::ExtractionError;

/// Outcome of running an extractor over one staged file.
#[derive(Debug)]
pub enum Extraction {
    /// Ordered text chunks (pages, paragraphs, or the whole file)
    Text(Vec<String>),
    /// The declared type is not one the worker handles
    Unsupported(String),
    Failed(ExtractionError),
}

impl Extraction {
    /// Chunks to store; unsupported and failed extractions store nothing.
    pub fn into_chunks(self) -> Vec<String> {
        match self {
            Extraction::Text(chunks) => chunks,
            Extraction::Unsupported(_) | Extraction::Failed(_) => Vec::new(),
        }
    }
}

/// Pluggable text extraction. Runs on the blocking thread pool.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path, declared_type: &str) -> Extraction;
}

type ExtractFn = fn(&Path) -> Result<Vec<String>, ExtractionError>;

fn extractor_for(file_type: FileType) -> ExtractFn {
    match file_type {
        FileType::Pdf => extract_pdf,
        FileType::Docx => extract_docx,
        FileType::Txt => extract_txt,
    }
}

/// Production extractor: PDF pages via `pdf-extract`, DOCX paragraphs from
/// `word/document.xml`, plain text read whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, path: &Path, declared_type: &str) -> Extraction {
        let Some(file_type) = FileType::parse(declared_type) else {
            return Extraction::Unsupported(declared_type.to_string());
        };

        match extractor_for(file_type)(path) {
            Ok(chunks) => Extraction::Text(chunks),
            Err(err) => Extraction::Failed(err),
        }
    }
}

fn extract_pdf(path: &Path) -> Result<Vec<String>, ExtractionError> {
    let bytes = std::fs::read(path)?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

    Ok(pages
        .into_iter()
        .filter(|page| !page.trim().is_empty())
        .collect())
}

static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>").expect("valid paragraph regex"));
static RUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab/>|<w:br/>").expect("valid run regex")
});

fn extract_docx(path: &Path) -> Result<Vec<String>, ExtractionError> {
    let file = std::fs::File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| ExtractionError::DocxParsing(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractionError::DocxParsing(e.to_string()))?
        .read_to_string(&mut xml)?;

    Ok(docx_paragraphs(&xml))
}

/// One chunk per non-empty `<w:p>` paragraph, in document order.
fn docx_paragraphs(xml: &str) -> Vec<String> {
    PARAGRAPH_RE
        .find_iter(xml)
        .map(|paragraph| {
            let mut text = String::new();
            for run in RUN_RE.captures_iter(paragraph.as_str()) {
                match run.get(1) {
                    Some(t) => text.push_str(&unescape_xml(t.as_str())),
                    None if &run[0] == "<w:tab/>" => text.push('\t'),
                    None => text.push('\n'),
                }
            }
            text
        })
        .filter(|text| !text.trim().is_empty())
        .collect()
}

fn unescape_xml(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn extract_txt(path: &Path) -> Result<Vec<String>, ExtractionError> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![text])
}
