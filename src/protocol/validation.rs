use super::types::MAX_CUSTOM_TAG_LENGTH;

/// Tags the server emits itself; clients may not relay frames under these names.
const RESERVED_TAGS: &[&str] = &["OPEN", "ID-TAKEN", "ERROR", "HEARTBEAT"];

pub fn validate_peer_id(peer_id: &str, max_length: usize) -> Result<(), String> {
    if peer_id.is_empty() {
        return Err("Peer id cannot be empty".to_string());
    }
    if peer_id.chars().count() > max_length {
        return Err(format!("Peer id too long (max {max_length} characters)"));
    }

    let mut chars = peer_id.chars();
    // Non-empty was checked above.
    if !chars.next().is_some_and(char::is_alphanumeric) {
        return Err("Peer id must start with a letter or digit".to_string());
    }
    if !chars.all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == ' ') {
        return Err("Peer id contains invalid characters".to_string());
    }
    Ok(())
}

pub fn validate_custom_tag(tag: &str) -> Result<(), String> {
    if tag.is_empty() {
        return Err("Message type cannot be empty".to_string());
    }
    if tag.len() > MAX_CUSTOM_TAG_LENGTH {
        return Err(format!(
            "Message type too long (max {MAX_CUSTOM_TAG_LENGTH} characters)"
        ));
    }
    if RESERVED_TAGS.contains(&tag) {
        return Err(format!("Message type `{tag}` is reserved"));
    }
    if !tag
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err("Message type must be upper-case ASCII".to_string());
    }
    Ok(())
}
