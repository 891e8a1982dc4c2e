use std::fmt;

use serde::{Deserialize, Serialize};

/// What a piece of text is, which decides how strictly it is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    DisplayName,
    MessageBody,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DisplayName => write!(f, "display-name"),
            Self::MessageBody => write!(f, "message-body"),
        }
    }
}

/// A classifier's answer, before the gate turns it into a result.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub is_appropriate: bool,
    pub reason: Option<String>,
    pub confidence: Option<f64>,
}

/// Outcome of one moderation call.
///
/// `bypassed` is set when the content is let through without a definite
/// verdict (oversized, quota, classifier unavailable or unconfigured).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationResult {
    pub is_appropriate: bool,
    pub reason: Option<String>,
    pub confidence: Option<f64>,
    pub bypassed: bool,
}

impl ModerationResult {
    pub fn allowed() -> Self {
        Self {
            is_appropriate: true,
            reason: None,
            confidence: None,
            bypassed: false,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_appropriate: false,
            reason: Some(reason.into()),
            confidence: None,
            bypassed: false,
        }
    }

    pub fn bypass(reason: impl Into<String>) -> Self {
        Self {
            is_appropriate: true,
            reason: Some(reason.into()),
            confidence: None,
            bypassed: true,
        }
    }

    /// Turns a negative result into an error carrying the stated reason, or
    /// `fallback` when the classifier gave none.
    pub fn ensure_allowed(self, fallback: &str) -> Result<Self, Rejected> {
        if self.is_appropriate || self.bypassed {
            return Ok(self);
        }
        let reason = self
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());
        Err(Rejected { reason })
    }
}

impl From<Verdict> for ModerationResult {
    fn from(v: Verdict) -> Self {
        Self {
            is_appropriate: v.is_appropriate,
            reason: v.reason,
            confidence: v.confidence,
            bypassed: false,
        }
    }
}

/// Content was judged inappropriate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{reason}")]
pub struct Rejected {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_allowed_uses_fallback_reason() {
        let result = ModerationResult {
            is_appropriate: false,
            reason: None,
            confidence: Some(0.9),
            bypassed: false,
        };
        let err = result.ensure_allowed("Inappropriate content").unwrap_err();
        assert_eq!(err.reason, "Inappropriate content");
    }

    #[test]
    fn bypass_is_never_a_rejection() {
        let result = ModerationResult::bypass("quota exceeded");
        assert!(result.clone().ensure_allowed("x").is_ok());
        assert!(result.bypassed);
    }
}
