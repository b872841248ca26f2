//! Document ingestion: file or raw text to ordered, tagged chunks.

use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use quorum_core::Chunk;

use crate::error::IngestionError;

/// Metadata key recording a file's extension.
pub const FILE_TYPE_KEY: &str = "file_type";

/// Turns sources into chunks. Blocking; callers run it off the async runtime.
pub trait DocumentIngestor: Send + Sync {
    /// Load, extract, and chunk a file. Chunks are tagged with the file name
    /// as `source` and the extension as `file_type`.
    fn load_file(&self, path: &Path) -> Result<Vec<Chunk>, IngestionError>;

    /// Chunk raw text under the given source label.
    fn load_text(&self, text: &str, source: &str) -> Result<Vec<Chunk>, IngestionError>;
}

// =============================================================================
// TextChunker
// =============================================================================

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Character-window splitter with overlap.
///
/// Windows are `chunk_size` characters; a window that does not reach the end
/// of the text is pulled back to the last paragraph, line, or word break in
/// its second half. Consecutive windows share `chunk_overlap` characters.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total {
            let mut end = (start + self.chunk_size).min(total);
            if end < total {
                end = self.find_break(&chars, start, end);
            }

            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }

            if end >= total {
                break;
            }
            start = end.saturating_sub(self.chunk_overlap).max(start + 1);
        }
        chunks
    }

    fn find_break(&self, chars: &[char], start: usize, end: usize) -> usize {
        let floor = start + (end - start) / 2;
        for sep in SEPARATORS {
            let sep: Vec<char> = sep.chars().collect();
            let mut pos = end.saturating_sub(sep.len());
            while pos > floor {
                if chars[pos..pos + sep.len()] == sep[..] {
                    return pos + sep.len();
                }
                pos -= 1;
            }
        }
        end
    }
}

// =============================================================================
// FileIngestor
// =============================================================================

/// Reads text, HTML, PDF, and DOCX files from disk.
#[derive(Debug, Clone, Default)]
pub struct FileIngestor {
    chunker: TextChunker,
}

impl FileIngestor {
    pub fn new(chunker: TextChunker) -> Self {
        Self { chunker }
    }

    fn chunk(&self, text: &str, source: &str, file_type: Option<&str>) -> Vec<Chunk> {
        self.chunker
            .split(text)
            .into_iter()
            .map(|piece| {
                let mut chunk = Chunk::new(piece, source);
                if let Some(ft) = file_type {
                    chunk.metadata.insert(FILE_TYPE_KEY.to_string(), ft.into());
                }
                chunk
            })
            .collect()
    }
}

impl DocumentIngestor for FileIngestor {
    fn load_file(&self, path: &Path) -> Result<Vec<Chunk>, IngestionError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();

        let text = match extension.as_str() {
            ".txt" | ".md" | ".html" | ".htm" | ".pdf" | ".docx" => {
                if !path.is_file() {
                    return Err(IngestionError::NotFound(path.display().to_string()));
                }
                extract_text(path, &extension)?
            }
            "" => return Err(IngestionError::UnsupportedFileType("(none)".into())),
            other => return Err(IngestionError::UnsupportedFileType(other.to_string())),
        };

        if text.trim().is_empty() {
            return Err(IngestionError::EmptyInput);
        }

        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        let chunks = self.chunk(&text, &source, Some(&extension));
        debug!(source = %source, chunks = chunks.len(), "Document chunked");
        Ok(chunks)
    }

    fn load_text(&self, text: &str, source: &str) -> Result<Vec<Chunk>, IngestionError> {
        if text.trim().is_empty() {
            return Err(IngestionError::EmptyInput);
        }
        Ok(self.chunk(text, source, None))
    }
}

fn extract_text(path: &Path, extension: &str) -> Result<String, IngestionError> {
    match extension {
        ".txt" | ".md" => Ok(std::fs::read_to_string(path)?),
        ".html" | ".htm" => Ok(strip_html(&std::fs::read_to_string(path)?)),
        ".pdf" => pdf_extract::extract_text(path)
            .map_err(|e| IngestionError::Read(format!("PDF extraction failed: {}", e))),
        ".docx" => read_docx(path),
        other => Err(IngestionError::UnsupportedFileType(other.to_string())),
    }
}

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<!--.*?-->")
            .expect("Invalid block regex")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"))
}

fn blank_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("Invalid whitespace regex"))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Visible text of an HTML document, one line per block.
pub fn strip_html(html: &str) -> String {
    let without_blocks = block_regex().replace_all(html, " ");
    let without_tags = tag_regex().replace_all(&without_blocks, " ");
    let decoded = decode_entities(&without_tags);
    decoded
        .lines()
        .map(|line| blank_run_regex().replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Paragraph text of a `.docx` file.
fn read_docx(path: &Path) -> Result<String, IngestionError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| IngestionError::Read(format!("invalid DOCX archive: {}", e)))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| IngestionError::Read(format!("DOCX has no document body: {}", e)))?
        .read_to_string(&mut xml)?;
    Ok(docx_xml_to_text(&xml))
}

fn docx_xml_to_text(xml: &str) -> String {
    let with_breaks = xml
        .replace("</w:p>", "\n")
        .replace("<w:tab/>", "\t")
        .replace("<w:br/>", "\n");
    let text = tag_regex().replace_all(&with_breaks, "");
    decode_entities(&text)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
