use std::io::{Cursor, Read};
use std::panic;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::client::SlackMessenger;
use crate::events::SlackFile;

const DOCX_BODY: &str = "word/document.xml";
const PPTX_SLIDE_PREFIX: &str = "ppt/slides/slide";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("unsupported file type `{0}`")]
    UnsupportedType(String),
    #[error("document could not be read: {0}")]
    Document(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Pptx,
    PlainText,
}

impl DocumentKind {
    /// Maps Slack's `filetype` to a reader. Legacy binary Office formats are not readable.
    pub fn from_filetype(filetype: &str) -> Option<Self> {
        match filetype.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            "text" | "txt" | "markdown" | "md" | "csv" => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// Extracts plain text from an attachment's bytes.
pub fn extract_text(filetype: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
    let kind = DocumentKind::from_filetype(filetype)
        .ok_or_else(|| ExtractionError::UnsupportedType(filetype.to_owned()))?;

    let text = match kind {
        DocumentKind::Pdf => pdf_text(bytes)?,
        DocumentKind::Docx => docx_text(bytes)?,
        DocumentKind::Pptx => pptx_text(bytes)?,
        DocumentKind::PlainText => String::from_utf8_lossy(bytes).into_owned(),
    };
    Ok(text.trim().to_owned())
}

/// Downloads attachments in order and returns the first non-empty text.
/// Failures are logged and the next file is tried.
pub async fn first_document_text(
    messenger: &dyn SlackMessenger,
    files: &[SlackFile],
) -> Option<String> {
    for file in files {
        let file_id = file.id.as_deref().unwrap_or("unknown");
        let (Some(url), Some(filetype)) = (&file.url_private_download, &file.filetype) else {
            debug!(
                event_name = "relay.attachment.skipped",
                file_id,
                "attachment has no download url or type"
            );
            continue;
        };
        if DocumentKind::from_filetype(filetype).is_none() {
            debug!(
                event_name = "relay.attachment.skipped",
                file_id,
                filetype = %filetype,
                "unsupported attachment type"
            );
            continue;
        }

        let bytes = match messenger.download_file(url).await {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(
                    event_name = "relay.attachment.download_failed",
                    file_id,
                    error = %error,
                    "attachment download failed"
                );
                continue;
            }
        };

        let filetype = filetype.clone();
        let extracted =
            tokio::task::spawn_blocking(move || extract_text(&filetype, &bytes)).await;
        match extracted {
            Ok(Ok(text)) if !text.is_empty() => {
                debug!(
                    event_name = "relay.attachment.extracted",
                    file_id,
                    chars = text.len(),
                    "attachment text extracted"
                );
                return Some(text);
            }
            Ok(Ok(_)) => {
                debug!(
                    event_name = "relay.attachment.empty",
                    file_id,
                    "attachment has no text"
                );
            }
            Ok(Err(error)) => {
                warn!(
                    event_name = "relay.attachment.extract_failed",
                    file_id,
                    error = %error,
                    "attachment text extraction failed"
                );
            }
            Err(error) => {
                warn!(
                    event_name = "relay.attachment.extract_failed",
                    file_id,
                    error = %error,
                    "attachment extraction task failed"
                );
            }
        }
    }
    None
}

fn pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    // The PDF parser panics on some malformed inputs.
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(error)) => Err(ExtractionError::Document(format!("{error:?}"))),
        Err(_) => Err(ExtractionError::Document("pdf parser panicked".to_owned())),
    }
}

fn docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, DOCX_BODY)?;
    xml_paragraphs(&xml)
}

fn pptx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = open_archive(bytes)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name.strip_prefix(PPTX_SLIDE_PREFIX)?.strip_suffix(".xml")?;
            Some((number.parse().ok()?, name.to_owned()))
        })
        .collect();
    slides.sort_by_key(|(number, _)| *number);

    let mut sections = Vec::with_capacity(slides.len());
    for (_, name) in slides {
        let xml = read_entry(&mut archive, &name)?;
        let text = xml_paragraphs(&xml)?;
        if !text.trim().is_empty() {
            sections.push(text.trim().to_owned());
        }
    }
    Ok(sections.join("\n\n"))
}

fn open_archive(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, ExtractionError> {
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|error| ExtractionError::Document(error.to_string()))
}

fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<String, ExtractionError> {
    let mut entry =
        archive.by_name(name).map_err(|error| ExtractionError::Document(error.to_string()))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|error| ExtractionError::Document(error.to_string()))?;
    Ok(xml)
}

/// Collects `<*:t>` runs, one line per `<*:p>` paragraph. Covers WordprocessingML
/// and DrawingML, which share these local names.
fn xml_paragraphs(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut output = String::new();
    let mut in_text_run = false;

    loop {
        let event =
            reader.read_event().map_err(|error| ExtractionError::Document(error.to_string()))?;
        match event {
            Event::Start(start) if start.local_name().as_ref() == b"t" => in_text_run = true,
            Event::End(end) if end.local_name().as_ref() == b"t" => in_text_run = false,
            Event::End(end) if end.local_name().as_ref() == b"p" => output.push('\n'),
            Event::Text(text) if in_text_run => {
                let unescaped =
                    text.unescape().map_err(|error| ExtractionError::Document(error.to_string()))?;
                output.push_str(&unescaped);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(output)
}
