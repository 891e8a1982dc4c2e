use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::debug;

use crate::classifier::{Classifier, ClassifierError, parse_verdict};
use crate::result::{ContentKind, Verdict};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const RESPONSE_FORMAT: &str = "Respond STRICTLY with valid JSON and no other text. \
    Format: {\"isAppropriate\": boolean, \"reason\": string (optional), \"confidence\": number}";

/// Google Generative Language `generateContent` client.
pub struct GeminiClassifier {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClassifier {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            model,
        })
    }

    async fn generate(&self, parts: Vec<Value>) -> Result<Verdict, ClassifierError> {
        let url = format!("{}/{}:generateContent", API_BASE, self.model);
        let body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": { "responseMimeType": "application/json" },
        });

        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS || text.contains("RESOURCE_EXHAUSTED") {
                return Err(ClassifierError::Quota);
            }
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let payload: Value = resp.json().await.map_err(transport_error)?;
        let answer = payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| ClassifierError::Malformed("no candidate text".into()))?;

        debug!(model = %self.model, response = answer, "Classifier response");
        parse_verdict(answer)
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify_text(
        &self,
        content: &str,
        kind: ContentKind,
    ) -> Result<Verdict, ClassifierError> {
        let prompt = format!(
            "You are a strict, expert content moderator. \
             Analyse the following text (kind: {kind}) and decide whether it is inappropriate, \
             obscene, violent, or contains hate speech. {}\n{RESPONSE_FORMAT}\n\n\
             Evaluate this text: \"{content}\"",
            strictness(kind)
        );
        self.generate(vec![json!({ "text": prompt })]).await
    }

    async fn classify_image(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<Verdict, ClassifierError> {
        let prompt = format!(
            "You are an expert and EXTREMELY STRICT visual content moderator. \
             Decide whether the image contains inappropriate, obscene, violent, sexual, gore \
             or drug-related content. Be SEVERE with nudity, sexual content and graphic \
             violence. Only give a reason when the image is inappropriate.\n{RESPONSE_FORMAT}"
        );
        self.generate(vec![
            json!({ "text": prompt }),
            json!({ "inlineData": { "mimeType": mime_type, "data": B64.encode(image) } }),
            json!({ "text": "Evaluate this image for safety and appropriateness." }),
        ])
        .await
    }
}

fn strictness(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::DisplayName => {
            "This is a public display name: be extremely strict with sexual innuendo and \
             offensive names."
        }
        ContentKind::MessageBody => {
            "This is a private chat message: flag only clearly abusive or explicit content."
        }
    }
}

fn transport_error(e: reqwest::Error) -> ClassifierError {
    if e.is_timeout() {
        ClassifierError::Timeout
    } else if e.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
        ClassifierError::Quota
    } else {
        ClassifierError::Transport(e.to_string())
    }
}
