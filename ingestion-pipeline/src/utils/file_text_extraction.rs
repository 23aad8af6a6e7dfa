use std::path::Path;

use common::error::AppError;
use mime_guess::from_path;
use tracing::debug;

use super::pdf_ingestion::extract_pdf_content;

/// Reads the text of the document at `path`.
///
/// The format is chosen from the file extension. Plain-text formats must be
/// valid UTF-8. A document that yields only whitespace is rejected so that
/// ingestion never indexes nothing.
pub async fn extract_text_from_file(path: &Path) -> Result<String, AppError> {
    let mime_type = guess_mime_type(path);

    let text = match mime_type.as_str() {
        "application/pdf" => extract_pdf_content(path).await?,
        "application/json" | "application/octet-stream" => read_utf8(path).await?,
        other if other.starts_with("text/") => read_utf8(path).await?,
        other => {
            return Err(AppError::Extraction(format!(
                "unsupported format {other} for {}",
                path.display()
            )))
        }
    };

    if text.trim().is_empty() {
        return Err(AppError::Extraction(format!(
            "empty content in {}",
            path.display()
        )));
    }

    debug!(
        path = %path.display(),
        %mime_type,
        chars = text.chars().count(),
        "extracted document text"
    );
    Ok(text)
}

fn guess_mime_type(path: &Path) -> String {
    from_path(path)
        .first_or(mime::APPLICATION_OCTET_STREAM)
        .essence_str()
        .to_string()
}

async fn read_utf8(path: &Path) -> Result<String, AppError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| AppError::Extraction(format!("cannot open {}: {err}", path.display())))?;
    String::from_utf8(bytes).map_err(|_| {
        AppError::Extraction(format!("{} is not valid UTF-8 text", path.display()))
    })
}
