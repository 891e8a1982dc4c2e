use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::classifier::{Classifier, ClassifierError};
use crate::result::{ContentKind, ModerationResult, Verdict};
use crate::terms;

/// Images larger than this are let through without asking the classifier.
pub const MAX_MODERATED_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub const BYPASS_OVERSIZED: &str = "image too large for moderation";
pub const BYPASS_NOT_CONFIGURED: &str = "moderation service not configured";
pub const BYPASS_QUOTA: &str = "moderation quota exceeded";
pub const BYPASS_UNAVAILABLE: &str = "moderation service unavailable";

/// Decides once per call whether content may pass.
///
/// Text falls back to the local term list whenever the classifier cannot give
/// a well-formed verdict. Images fail open with `bypassed` set; every bypass
/// is logged at `warn`.
#[derive(Clone)]
pub struct ModerationGate {
    classifier: Option<Arc<dyn Classifier>>,
    timeout: Duration,
}

impl ModerationGate {
    pub fn new(classifier: Option<Arc<dyn Classifier>>, timeout: Duration) -> Self {
        Self {
            classifier,
            timeout,
        }
    }

    /// Gate without a remote classifier.
    pub fn local_only() -> Self {
        Self::new(None, Duration::from_secs(60))
    }

    pub async fn evaluate_text(&self, content: &str, kind: ContentKind) -> ModerationResult {
        if content.trim().is_empty() {
            return ModerationResult::allowed();
        }

        let Some(classifier) = &self.classifier else {
            warn!(%kind, "No moderation classifier configured, using local term list");
            return terms::check_local(content, kind);
        };

        match self.call(classifier.classify_text(content, kind)).await {
            Ok(verdict) => {
                if !verdict.is_appropriate {
                    warn!(
                        %kind,
                        reason = verdict.reason.as_deref().unwrap_or(""),
                        confidence = ?verdict.confidence,
                        "Text flagged by classifier"
                    );
                }
                verdict.into()
            }
            Err(e) => {
                error!(%kind, error = %e, "Text classification failed, falling back to local term list");
                terms::check_local(content, kind)
            }
        }
    }

    pub async fn evaluate_image(&self, image: &[u8], mime_type: &str) -> ModerationResult {
        if image.is_empty() {
            return ModerationResult::allowed();
        }

        if image.len() > MAX_MODERATED_IMAGE_BYTES {
            warn!(bytes = image.len(), "Image moderation bypassed: oversized");
            return ModerationResult::bypass(BYPASS_OVERSIZED);
        }

        let Some(classifier) = &self.classifier else {
            warn!(bytes = image.len(), "Image moderation bypassed: no classifier configured");
            return ModerationResult::bypass(BYPASS_NOT_CONFIGURED);
        };

        match self.call(classifier.classify_image(image, mime_type)).await {
            Ok(verdict) => {
                if !verdict.is_appropriate {
                    warn!(
                        reason = verdict.reason.as_deref().unwrap_or(""),
                        confidence = ?verdict.confidence,
                        "Image flagged by classifier"
                    );
                }
                verdict.into()
            }
            Err(ClassifierError::Quota) => {
                warn!("Image moderation bypassed: classifier quota exhausted");
                ModerationResult::bypass(BYPASS_QUOTA)
            }
            Err(e) => {
                warn!(error = %e, "Image moderation bypassed: classifier unavailable");
                ModerationResult::bypass(BYPASS_UNAVAILABLE)
            }
        }
    }

    async fn call<F>(&self, fut: F) -> Result<Verdict, ClassifierError>
    where
        F: Future<Output = Result<Verdict, ClassifierError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .unwrap_or(Err(ClassifierError::Timeout))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    enum Script {
        Answer(Result<Verdict, ClassifierError>),
        Hang,
    }

    struct FakeClassifier {
        script: Script,
        calls: AtomicUsize,
    }

    impl FakeClassifier {
        fn answering(answer: Result<Verdict, ClassifierError>) -> Arc<Self> {
            Arc::new(Self {
                script: Script::Answer(answer),
                calls: AtomicUsize::new(0),
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                script: Script::Hang,
                calls: AtomicUsize::new(0),
            })
        }

        async fn respond(&self) -> Result<Verdict, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Answer(a) => a.clone(),
                Script::Hang => std::future::pending().await,
            }
        }
    }

    #[async_trait]
    impl Classifier for FakeClassifier {
        async fn classify_text(&self, _: &str, _: ContentKind) -> Result<Verdict, ClassifierError> {
            self.respond().await
        }

        async fn classify_image(&self, _: &[u8], _: &str) -> Result<Verdict, ClassifierError> {
            self.respond().await
        }
    }

    fn gate(classifier: Arc<FakeClassifier>) -> ModerationGate {
        ModerationGate::new(Some(classifier), Duration::from_secs(60))
    }

    fn flagged(reason: &str) -> Result<Verdict, ClassifierError> {
        Ok(Verdict {
            is_appropriate: false,
            reason: Some(reason.into()),
            confidence: Some(0.97),
        })
    }

    #[tokio::test]
    async fn blank_text_skips_classifier() {
        let fake = FakeClassifier::answering(flagged("nope"));
        let result = gate(fake.clone()).evaluate_text("   \n", ContentKind::MessageBody).await;
        assert!(result.is_appropriate);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn remote_verdict_wins_over_local_list() {
        let fake = FakeClassifier::answering(flagged("harassment"));
        let result = gate(fake).evaluate_text("you are awful", ContentKind::MessageBody).await;
        assert!(!result.is_appropriate);
        assert_eq!(result.reason.as_deref(), Some("harassment"));
        assert!(!result.bypassed);
    }

    #[tokio::test]
    async fn severe_term_rejected_when_classifier_fails() {
        for err in [
            ClassifierError::Quota,
            ClassifierError::Status(503),
            ClassifierError::Malformed("not json".into()),
        ] {
            let fake = FakeClassifier::answering(Err(err));
            let result = gate(fake).evaluate_text("buy drogas here", ContentKind::MessageBody).await;
            assert!(!result.is_appropriate);
        }
    }

    #[tokio::test]
    async fn severe_term_rejected_without_classifier() {
        let result = ModerationGate::local_only()
            .evaluate_text("XXX links", ContentKind::MessageBody)
            .await;
        assert!(!result.is_appropriate);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_classifier_times_out_into_fallback() {
        let gate = ModerationGate::new(Some(FakeClassifier::hanging()), Duration::from_secs(60));
        let result = gate.evaluate_text("hello there", ContentKind::MessageBody).await;
        assert!(result.is_appropriate);

        let result = gate.evaluate_text("gore pics", ContentKind::MessageBody).await;
        assert!(!result.is_appropriate);
    }

    #[tokio::test]
    async fn oversized_image_bypasses_classifier() {
        let fake = FakeClassifier::answering(flagged("nudity"));
        let image = vec![0u8; MAX_MODERATED_IMAGE_BYTES + 1];

        let result = gate(fake.clone()).evaluate_image(&image, "image/jpeg").await;
        assert!(result.is_appropriate);
        assert!(result.bypassed);
        assert_eq!(result.reason.as_deref(), Some(BYPASS_OVERSIZED));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);

        let result = ModerationGate::local_only().evaluate_image(&image, "image/jpeg").await;
        assert!(result.bypassed);
    }

    #[tokio::test]
    async fn image_fails_open_on_errors() {
        let quota = gate(FakeClassifier::answering(Err(ClassifierError::Quota)))
            .evaluate_image(b"jpeg", "image/jpeg")
            .await;
        assert!(quota.bypassed);
        assert_eq!(quota.reason.as_deref(), Some(BYPASS_QUOTA));

        let broken = gate(FakeClassifier::answering(Err(ClassifierError::Malformed("?".into()))))
            .evaluate_image(b"jpeg", "image/jpeg")
            .await;
        assert!(broken.bypassed);
        assert_eq!(broken.reason.as_deref(), Some(BYPASS_UNAVAILABLE));

        let unconfigured = ModerationGate::local_only().evaluate_image(b"jpeg", "image/jpeg").await;
        assert!(unconfigured.bypassed);
    }

    #[tokio::test]
    async fn explicit_image_verdict_rejects() {
        let result = gate(FakeClassifier::answering(flagged("graphic violence")))
            .evaluate_image(b"jpeg", "image/jpeg")
            .await;
        assert!(!result.is_appropriate);
        assert!(!result.bypassed);
        assert_eq!(
            result.ensure_allowed("Inappropriate image").unwrap_err().reason,
            "graphic violence"
        );
    }
}
