use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use common::error::AppError;

const FAST_PATH_MIN_LEN: usize = 150;
const FAST_PATH_MIN_ASCII_RATIO: f64 = 0.7;

/// Extracts the text of a PDF in page order.
///
/// The `pdf-extract` text layer is tried first. When it fails or looks too
/// noisy, every page is decoded separately with `lopdf` and the pages are
/// joined. Both results are reflowed so hard-wrapped lines become paragraphs.
pub async fn extract_pdf_content(file_path: &Path) -> Result<String, AppError> {
    let pdf_bytes = tokio::fs::read(file_path).await.map_err(|err| {
        AppError::Extraction(format!("cannot open {}: {err}", file_path.display()))
    })?;

    let fast = try_fast_path(pdf_bytes.clone()).await;
    if let Some(text) = fast.as_deref() {
        if looks_good_enough(text) {
            return Ok(reflow_markdown(text));
        }
        debug!(
            path = %file_path.display(),
            chars = text.chars().count(),
            "PDF text layer looks noisy; decoding pages individually"
        );
    }

    match extract_pages(pdf_bytes).await {
        Ok(pages) if !pages.trim().is_empty() => Ok(reflow_markdown(&pages)),
        Ok(_) => Ok(fast.map(|text| reflow_markdown(&text)).unwrap_or_default()),
        Err(err) => match fast {
            Some(text) => {
                warn!(
                    path = %file_path.display(),
                    error = %err,
                    "per-page PDF decoding failed; keeping text layer output"
                );
                Ok(reflow_markdown(&text))
            }
            None => Err(err),
        },
    }
}

/// Runs `pdf-extract` off the async executor. Any failure, including a panic
/// inside the parser, yields `None` so the caller can fall back.
async fn try_fast_path(pdf_bytes: Vec<u8>) -> Option<String> {
    let extraction = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&pdf_bytes).map(|s| s.trim().to_string())
    })
    .await;

    match extraction {
        Ok(Ok(text)) if !text.is_empty() => Some(text),
        Ok(Ok(_)) => None,
        Ok(Err(err)) => {
            debug!(error = %err, "pdf-extract could not read the text layer");
            None
        }
        Err(err) => {
            warn!(error = %err, "pdf-extract task aborted");
            None
        }
    }
}

/// Decodes each page with `lopdf`, in page-number order.
async fn extract_pages(pdf_bytes: Vec<u8>) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || -> Result<String, AppError> {
        let document = Document::load_mem(&pdf_bytes)
            .map_err(|err| AppError::Extraction(format!("failed to parse PDF: {err}")))?;

        let mut page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        page_numbers.sort_unstable();
        if page_numbers.is_empty() {
            return Err(AppError::Extraction("PDF appears to have no pages".into()));
        }

        let mut pages = Vec::with_capacity(page_numbers.len());
        for page in page_numbers {
            match document.extract_text(&[page]) {
                Ok(text) => pages.push(text.trim().to_string()),
                Err(err) => warn!(page, error = %err, "skipping unreadable PDF page"),
            }
        }
        Ok(pages.join("\n\n"))
    })
    .await?
}

/// Heuristic that determines whether the fast-path text looks like well-formed prose.
fn looks_good_enough(text: &str) -> bool {
    if text.len() < FAST_PATH_MIN_LEN {
        return false;
    }

    let total_chars = text.chars().count() as f64;
    if total_chars == 0.0 {
        return false;
    }

    let ascii_chars = text.chars().filter(char::is_ascii).count() as f64;
    if ascii_chars / total_chars < FAST_PATH_MIN_ASCII_RATIO {
        return false;
    }

    let letters = text.chars().filter(|c| c.is_alphabetic()).count() as f64;
    letters / total_chars > 0.3
}

/// Joins hard-wrapped paragraph text while preserving structural Markdown lines.
fn reflow_markdown(input: &str) -> String {
    let cleaned = input.replace('\r', "");
    let mut paragraphs = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for line in cleaned.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !buffer.is_empty() {
                paragraphs.push(buffer.join(" "));
                buffer.clear();
            }
            continue;
        }

        if is_structural_line(trimmed) {
            if !buffer.is_empty() {
                paragraphs.push(buffer.join(" "));
                buffer.clear();
            }
            paragraphs.push(trimmed.to_string());
            continue;
        }

        buffer.push(trimmed);
    }

    if !buffer.is_empty() {
        paragraphs.push(buffer.join(" "));
    }

    paragraphs.join("\n\n")
}

/// Detects whether a line is structural Markdown that should remain on its own.
fn is_structural_line(line: &str) -> bool {
    line.starts_with('#')
        || line.starts_with('-')
        || line.starts_with('*')
        || line.starts_with('>')
        || line.starts_with("```")
        || line.starts_with("| ")
        || line.chars().next().is_some_and(|c| c.is_ascii_digit()) && line.contains('.')
}
