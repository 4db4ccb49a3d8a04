//! Minimal DOCX support: build a document from headings and paragraphs, and
//! pull plain text back out of an uploaded one.
//!
//! Only the parts Word needs to open a file are written (content types,
//! package relationships, the main document and a style sheet with `Title`
//! and `Heading1`/`Heading2`). Reading ignores everything except text runs,
//! tabs and breaks in `word/document.xml`.

mod reader;
mod writer;

pub use reader::{extract_text, MAX_DOCUMENT_XML_BYTES};

/// MIME type for `.docx` downloads.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, thiserror::Error)]
pub enum DocxError {
    #[error("DOCX archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("DOCX I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("DOCX file has no word/document.xml part")]
    MissingDocumentPart,
    #[error("DOCX document part is not valid UTF-8")]
    InvalidEncoding,
    #[error("DOCX document part exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

/// One block-level element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Level 0 is the document title; 1 and 2 are section headings.
    Heading { level: u8, text: String },
    Paragraph(String),
}

impl Block {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading {
            level,
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph(text.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Serialize as a `.docx` package.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        writer::write_package(&self.blocks)
    }
}
