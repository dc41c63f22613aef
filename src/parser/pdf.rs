use anyhow::{Context, Result};
use tracing::debug;

use super::Upload;

/// Extract the text of an uploaded PDF
///
/// Pages are extracted in document order and appended without a separator.
/// Scanned or image-only pages contribute nothing, so the result may be
/// partial or empty.
pub fn extract_text(upload: &Upload) -> Result<String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(&upload.bytes)
        .with_context(|| format!("Failed to extract text from PDF: {}", upload.file_name))?;

    let page_count = pages.len();
    let text = join_pages(pages);

    debug!(
        file = %upload.file_name,
        pages = page_count,
        chars = text.len(),
        "Extracted PDF text"
    );

    Ok(text)
}

fn join_pages(pages: Vec<String>) -> String {
    pages.concat()
}
