use bytes::Bytes;
use tracing::warn;

/// Text of an uploaded resume, truncated to `max_chars` characters.
///
/// PDFs go through `pdf-extract` on the blocking pool; anything else, and
/// any PDF the extractor rejects, is decoded as lossy UTF-8. Control
/// characters other than line breaks and tabs are dropped, so the result is
/// always storable as Postgres `TEXT`.
pub async fn extract_resume_text(
    file_name: &str,
    content_type: Option<&str>,
    data: Bytes,
    max_chars: usize,
) -> String {
    let text = if is_pdf(file_name, content_type) {
        let pdf = data.clone();
        match tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("PDF extraction failed for '{file_name}': {e}; decoding as text");
                String::from_utf8_lossy(&data).into_owned()
            }
            Err(e) => {
                warn!("PDF extractor aborted on '{file_name}': {e}; decoding as text");
                String::from_utf8_lossy(&data).into_owned()
            }
        }
    } else {
        String::from_utf8_lossy(&data).into_owned()
    };

    truncate_chars(strip_control(&text).trim(), max_chars)
}

fn strip_control(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

fn is_pdf(file_name: &str, content_type: Option<&str>) -> bool {
    content_type == Some("application/pdf") || file_name.to_lowercase().ends_with(".pdf")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
