//! Invariants on user-authored text.

use crate::domain::error::DomainError;

/// Comments and posts share the same rule: text must survive trimming.
pub fn normalize_text(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("text must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// First characters of a post, used for titles and log lines.
pub fn excerpt(text: &str, limit: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        assert!(normalize_text(" \n\t ").is_err());
        assert_eq!(normalize_text("  hello ").expect("text"), "hello");
    }

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        assert_eq!(excerpt("Тестовый пост", 8), "Тестовый…");
        assert_eq!(excerpt("short", 15), "short");
    }
}
