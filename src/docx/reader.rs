use std::io::{Cursor, Read};
use std::sync::OnceLock;

use regex::Regex;

use super::DocxError;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?s)<w:t(?:\s[^>]*[^/>])?\s*>(.*?)</w:t>|<w:(?:tab|br|cr)(?:\s[^>]*)?/>|</w:p>",
        )
        .expect("valid docx token regex")
    })
}

/// Upper bound on the decompressed size of `word/document.xml`.
pub const MAX_DOCUMENT_XML_BYTES: u64 = 32 * 1024 * 1024;

/// Plain text of an uploaded `.docx`: one line per paragraph, tabs and
/// breaks preserved, trailing blank lines dropped.
///
/// Decompression stops at [`MAX_DOCUMENT_XML_BYTES`]; a larger document
/// part fails with [`DocxError::TooLarge`].
pub fn extract_text(bytes: &[u8]) -> Result<String, DocxError> {
    extract_text_within(bytes, MAX_DOCUMENT_XML_BYTES)
}

fn extract_text_within(bytes: &[u8], limit: u64) -> Result<String, DocxError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut raw = Vec::new();
    match archive.by_name("word/document.xml") {
        Ok(part) => {
            // The declared size is untrusted; cap the read as well.
            if part.size() > limit {
                return Err(DocxError::TooLarge { limit });
            }
            part.take(limit + 1).read_to_end(&mut raw)?;
            if raw.len() as u64 > limit {
                return Err(DocxError::TooLarge { limit });
            }
        }
        Err(zip::result::ZipError::FileNotFound) => return Err(DocxError::MissingDocumentPart),
        Err(e) => return Err(e.into()),
    }
    let xml = String::from_utf8(raw).map_err(|_| DocxError::InvalidEncoding)?;

    let mut text = String::new();
    for token in token_re().captures_iter(&xml) {
        if let Some(run) = token.get(1) {
            text.push_str(&unescape_xml(run.as_str()));
            continue;
        }
        match &token[0] {
            "</w:p>" => text.push('\n'),
            t if t.starts_with("<w:tab") => text.push('\t'),
            _ => text.push('\n'),
        }
    }

    let trimmed = text.trim_end_matches('\n').len();
    text.truncate(trimmed);
    Ok(text)
}

fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        let Some(end) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => numeric_entity(entity),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn numeric_entity(entity: &str) -> Option<char> {
    let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse().ok()?
    };
    char::from_u32(code)
}
