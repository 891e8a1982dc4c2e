use async_trait::async_trait;
use serde_json::Value;

use crate::result::{ContentKind, Verdict};

/// Failures of a remote classifier. The gate routes every variant through
/// its fallback; none of them reach the client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier quota or rate limit exhausted")]
    Quota,

    #[error("classifier call timed out")]
    Timeout,

    #[error("classifier transport error: {0}")]
    Transport(String),

    #[error("classifier returned HTTP {0}")]
    Status(u16),

    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

/// A remote content classifier.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify_text(
        &self,
        content: &str,
        kind: ContentKind,
    ) -> Result<Verdict, ClassifierError>;

    async fn classify_image(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<Verdict, ClassifierError>;
}

/// Parse the classifier's answer text into a verdict.
///
/// The answer must be a JSON object with a boolean `isAppropriate`; a
/// surrounding Markdown code fence is tolerated.
pub fn parse_verdict(raw: &str) -> Result<Verdict, ClassifierError> {
    let body = strip_code_fence(raw.trim());

    let value: Value =
        serde_json::from_str(body).map_err(|e| ClassifierError::Malformed(e.to_string()))?;

    let is_appropriate = value
        .get("isAppropriate")
        .and_then(Value::as_bool)
        .ok_or_else(|| ClassifierError::Malformed("missing boolean isAppropriate".into()))?;

    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    Ok(Verdict {
        is_appropriate,
        reason,
        confidence: value.get("confidence").and_then(Value::as_f64),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an info string such as `json` on the opening fence line.
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let v = parse_verdict(r#"{"isAppropriate": false, "reason": "violence", "confidence": 0.93}"#)
            .unwrap();
        assert!(!v.is_appropriate);
        assert_eq!(v.reason.as_deref(), Some("violence"));
        assert_eq!(v.confidence, Some(0.93));
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"isAppropriate\": true, \"confidence\": 1}\n```";
        let v = parse_verdict(raw).unwrap();
        assert!(v.is_appropriate);
        assert_eq!(v.reason, None);
    }

    #[test]
    fn rejects_missing_verdict() {
        assert!(matches!(
            parse_verdict(r#"{"isAppropriate": "yes"}"#),
            Err(ClassifierError::Malformed(_))
        ));
        assert!(matches!(
            parse_verdict("I think it is fine"),
            Err(ClassifierError::Malformed(_))
        ));
    }
}
