//! Name validation for factions and players.

use crate::config::FactionConfig;

/// Faction name validation errors with helpful messages
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("Name is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("Name is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Name must contain only letters and digits")]
    InvalidCharacters,

    #[error("Name is a reserved word")]
    Reserved,
}

/// Words that cannot be used as faction names. Mostly territory labels and
/// command keywords that would be ambiguous in messages and chat.
const RESERVED_NAMES: &[&str] = &[
    "wilderness", "safezone", "warzone", "admin", "server", "console", "faction", "factions",
    "help", "create", "disband", "invite", "accept", "leave", "kick", "claim", "unclaim",
    "ally", "unally", "home", "sethome", "delhome", "info", "top", "chat", "border",
];

/// Validate a faction name against the configured length bounds. Names are
/// case-sensitive and restricted to ASCII letters and digits, so they are
/// safe in storage keys and chat without escaping.
pub fn validate_faction_name(name: &str, config: &FactionConfig) -> Result<String, NameError> {
    let trimmed = name.trim();

    if trimmed.len() < config.min_name_length {
        return Err(NameError::TooShort {
            min: config.min_name_length,
        });
    }
    if trimmed.len() > config.max_name_length {
        return Err(NameError::TooLong {
            max: config.max_name_length,
        });
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(NameError::InvalidCharacters);
    }
    if RESERVED_NAMES.contains(&trimmed.to_lowercase().as_str()) {
        return Err(NameError::Reserved);
    }

    Ok(trimmed.to_string())
}

/// Truncate a faction description to the configured maximum, respecting
/// character boundaries.
pub fn clamp_description(description: &str, max_len: usize) -> String {
    if description.chars().count() <= max_len {
        description.to_string()
    } else {
        description.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FactionConfig {
        FactionConfig::default()
    }

    #[test]
    fn accepts_plain_alphanumeric_names() {
        assert_eq!(validate_faction_name("Alpha", &config()), Ok("Alpha".to_string()));
        assert_eq!(validate_faction_name("Squad42", &config()), Ok("Squad42".to_string()));
        // Leading/trailing whitespace is trimmed, not rejected.
        assert_eq!(validate_faction_name("  Alpha  ", &config()), Ok("Alpha".to_string()));
    }

    #[test]
    fn rejects_length_violations() {
        assert_eq!(
            validate_faction_name("ab", &config()),
            Err(NameError::TooShort { min: 3 })
        );
        assert_eq!(
            validate_faction_name("ThisNameIsMuchTooLong", &config()),
            Err(NameError::TooLong { max: 16 })
        );
    }

    #[test]
    fn rejects_symbols_and_reserved_words() {
        assert_eq!(
            validate_faction_name("War Zone", &config()),
            Err(NameError::InvalidCharacters)
        );
        assert_eq!(
            validate_faction_name("cool☂clan", &config()),
            Err(NameError::InvalidCharacters)
        );
        assert_eq!(
            validate_faction_name("Wilderness", &config()),
            Err(NameError::Reserved)
        );
        assert_eq!(
            validate_faction_name("admin", &config()),
            Err(NameError::Reserved)
        );
    }

    #[test]
    fn description_clamps_at_char_boundary() {
        assert_eq!(clamp_description("short", 120), "short");
        let long = "x".repeat(200);
        assert_eq!(clamp_description(&long, 120).len(), 120);
        assert_eq!(clamp_description("héllo", 2), "hé");
    }
}
