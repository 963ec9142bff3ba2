//! Message validation rules.

use flym_core::config::RealtimeConfig;
use flym_core::error::AppError;

use super::types::ClientMessage;

/// Parses and validates one inbound text frame.
///
/// Chat text comes back trimmed. Every failure is a validation error so
/// the connection answers with `INVALID_MESSAGE` and stays open.
pub fn parse_inbound(raw: &str, config: &RealtimeConfig) -> Result<ClientMessage, AppError> {
    if raw.len() > config.max_frame_bytes {
        return Err(AppError::validation(format!(
            "Message exceeds maximum size of {} bytes",
            config.max_frame_bytes
        )));
    }

    if raw.trim().is_empty() {
        return Err(AppError::validation("Empty message"));
    }

    let message: ClientMessage = serde_json::from_str(raw)
        .map_err(|e| AppError::validation(format!("Malformed message: {e}")))?;

    match message {
        ClientMessage::Message { text } => Ok(ClientMessage::Message {
            text: validate_text(&text, config.max_message_length)?,
        }),
        other => Ok(other),
    }
}

/// Trims chat text and checks it is non-empty and at most `max_chars`
/// characters long.
pub fn validate_text(text: &str, max_chars: usize) -> Result<String, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::validation("Message text is required"));
    }
    if text.chars().count() > max_chars {
        return Err(AppError::validation(format!(
            "Message text exceeds {max_chars} characters"
        )));
    }
    Ok(text.to_string())
}
