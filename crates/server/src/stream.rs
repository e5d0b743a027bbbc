//! SSE framing for the streaming answer path

use axum::response::sse::Event;

use weeklog_qa::StreamEvent;

/// Escape embedded newlines to the literal two-character sequence `\n`
/// so every fragment stays a single protocol message. Clients reverse
/// this after parsing the event payload.
pub fn escape_newlines(s: &str) -> String {
    s.replace('\n', "\\n")
}

fn event_name(event: &StreamEvent) -> &'static str {
    match event {
        StreamEvent::Status { .. } => "status",
        StreamEvent::Chunk { .. } => "chunk",
        StreamEvent::Metadata { .. } => "metadata",
        StreamEvent::Error { .. } => "error",
    }
}

/// Convert a pipeline event into an SSE frame
pub fn to_sse_event(event: StreamEvent) -> Event {
    let event = match event {
        StreamEvent::Chunk { content } => StreamEvent::Chunk {
            content: escape_newlines(&content),
        },
        other => other,
    };

    let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
    Event::default().event(event_name(&event)).data(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_newlines() {
        assert_eq!(escape_newlines("a\nb\nc"), "a\\nb\\nc");
        assert_eq!(escape_newlines("no newlines"), "no newlines");
    }

    #[test]
    fn test_chunk_content_is_escaped_before_framing() {
        let event = StreamEvent::Chunk {
            content: "line one\nline two".to_string(),
        };
        // The serialized payload must not contain a raw newline.
        let escaped = match event {
            StreamEvent::Chunk { content } => escape_newlines(&content),
            _ => unreachable!(),
        };
        assert!(!escaped.contains('\n'));
        assert!(escaped.contains("\\n"));
    }
}
