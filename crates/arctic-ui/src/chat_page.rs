//! The chat page served at `/` and `/ui`.
//!
//! Layout: a sidebar with the sampling sliders, history reset, file upload,
//! PDF downloads and the microphone button; the transcript and message box
//! on the right. Replies are read from the SSE body of
//! `POST /sessions/{id}/messages` as they stream in.

/// The complete self-contained chat page.
///
/// Microphone audio is recorded in the browser and posted as a 16-bit mono
/// WAV to `/sessions/{id}/voice`; the page then requests the reply through
/// `/sessions/{id}/respond`. A session stopped by the token budget shows its
/// last message in red until the history is cleared.
pub const CHAT_HTML: &str = include_str!("../assets/chat.html");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_html_is_valid_html() {
        assert!(CHAT_HTML.starts_with("<!DOCTYPE html>"));
        assert!(CHAT_HTML.contains("<html"));
        assert!(CHAT_HTML.contains("</html>"));
    }

    #[test]
    fn chat_html_has_sidebar_controls() {
        assert!(CHAT_HTML.contains("id=\"temperature\""));
        assert!(CHAT_HTML.contains("id=\"top-p\""));
        assert!(CHAT_HTML.contains("min=\"0.01\" max=\"5\""));
        assert!(CHAT_HTML.contains("min=\"0.01\" max=\"1\""));
        assert!(CHAT_HTML.contains("id=\"clear-history\""));
        assert!(CHAT_HTML.contains("id=\"upload-file\""));
        assert!(CHAT_HTML.contains("accept=\".csv,.xlsx\""));
        assert!(CHAT_HTML.contains("id=\"record\""));
    }

    #[test]
    fn chat_html_uses_session_endpoints() {
        for path in [
            "/sessions",
            "/messages",
            "/respond",
            "/controls",
            "/clear",
            "/upload",
            "/voice",
            "/exports/response.pdf",
            "/exports/results.pdf",
        ] {
            assert!(CHAT_HTML.contains(path), "missing {}", path);
        }
    }

    #[test]
    fn chat_html_handles_stream_events() {
        for event in ["fragment", "aborted", "error", "done"] {
            assert!(CHAT_HTML.contains(&format!("'{}'", event)), "missing {}", event);
        }
    }

    #[test]
    fn chat_html_has_no_external_resources() {
        assert!(!CHAT_HTML.contains("<script src="));
        assert!(!CHAT_HTML.contains("<link rel=\"stylesheet\""));
    }
}
