//! Message payload rendering.

/// Render `payload` for display.
///
/// Without `pretty` the bytes are decoded as text (invalid UTF-8 sequences
/// are replaced, never rejected). With `pretty`, a payload that parses as
/// JSON is re-indented with two spaces; anything else falls back to the raw
/// text. Formatting never fails.
pub fn format_payload(payload: &[u8], pretty: bool) -> String {
    if pretty {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(payload) {
            if let Ok(rendered) = serde_json::to_string_pretty(&value) {
                return rendered;
            }
        }
    }
    String::from_utf8_lossy(payload).into_owned()
}
