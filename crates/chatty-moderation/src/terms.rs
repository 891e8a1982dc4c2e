//! Keyword fallback used when the remote classifier cannot answer.

use crate::result::{ContentKind, ModerationResult};

pub const OFFENSIVE_TERMS: &[&str] = &[
    "porno",
    "xxx",
    "sexo",
    "gore",
    "muerte",
    "violencia",
    "drogas",
    "arma",
    "insulto",
    "maldición",
    "obsceno",
    "puta",
    "mierda",
];

/// Subset checked for message bodies, where the local check is lenient.
pub const SEVERE_TERMS: &[&str] = &["porno", "xxx", "gore", "drogas", "arma"];

pub const DISPLAY_NAME_MIN_CHARS: usize = 2;
pub const DISPLAY_NAME_MAX_CHARS: usize = 50;

pub fn check_local(text: &str, kind: ContentKind) -> ModerationResult {
    let lower = text.trim().to_lowercase();

    match kind {
        ContentKind::DisplayName => {
            if contains_any(&lower, OFFENSIVE_TERMS) {
                return ModerationResult::rejected("Name contains restricted content");
            }
            let len = lower.chars().count();
            if len < DISPLAY_NAME_MIN_CHARS {
                return ModerationResult::rejected(format!(
                    "Name must be at least {DISPLAY_NAME_MIN_CHARS} characters"
                ));
            }
            if len > DISPLAY_NAME_MAX_CHARS {
                return ModerationResult::rejected(format!(
                    "Name must be at most {DISPLAY_NAME_MAX_CHARS} characters"
                ));
            }
        }
        ContentKind::MessageBody => {
            if contains_any(&lower, SEVERE_TERMS) {
                return ModerationResult::rejected("Message contains restricted language");
            }
        }
    }

    ModerationResult::allowed()
}

fn contains_any(haystack: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| haystack.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severe_terms_are_a_subset() {
        for t in SEVERE_TERMS {
            assert!(OFFENSIVE_TERMS.contains(t));
        }
    }

    #[test]
    fn message_body_checks_severe_terms_case_insensitively() {
        for term in SEVERE_TERMS {
            let text = format!("look at this {}!", term.to_uppercase());
            assert!(!check_local(&text, ContentKind::MessageBody).is_appropriate, "{term}");
        }
    }

    #[test]
    fn message_body_ignores_milder_terms() {
        assert!(check_local("qué mierda de día", ContentKind::MessageBody).is_appropriate);
    }

    #[test]
    fn display_name_uses_full_list_and_length_bounds() {
        assert!(!check_local("Mierda Man", ContentKind::DisplayName).is_appropriate);
        assert!(!check_local("J", ContentKind::DisplayName).is_appropriate);
        assert!(check_local("Jo", ContentKind::DisplayName).is_appropriate);
        assert!(check_local(&"a".repeat(50), ContentKind::DisplayName).is_appropriate);
        assert!(!check_local(&"a".repeat(51), ContentKind::DisplayName).is_appropriate);
    }
}
