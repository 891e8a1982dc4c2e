//! Database row types, mapped directly from SQLite rows.
//! Conversions to the chatty-types wire models live here so handlers never
//! touch raw timestamp strings.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use chatty_types::models::{EnrichedMessage, UserProfile, UserSummary};

#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub profile_pic: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewMessage<'a> {
    pub id: &'a str,
    pub sender_id: &'a str,
    pub recipient_id: &'a str,
    pub text: &'a str,
    pub image: Option<&'a str>,
}

/// A message joined with both participants' display fields.
#[derive(Debug)]
pub struct EnrichedMessageRow {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_pic: Option<String>,
    pub recipient_id: String,
    pub recipient_name: String,
    pub recipient_pic: Option<String>,
    pub text: String,
    pub image: Option<String>,
    pub created_at: String,
}

/// Timestamp format written by the application: RFC 3339, UTC, millisecond
/// precision. Fixed width, so string order matches time order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}' on {}: {}", raw, context, e);
        DateTime::default()
    })
}

impl UserRow {
    pub fn into_profile(self) -> UserProfile {
        let created_at = parse_timestamp(&self.created_at, &self.id);
        let updated_at = parse_timestamp(&self.updated_at, &self.id);
        UserProfile {
            id: self.id,
            full_name: self.full_name,
            email: self.email,
            profile_pic: self.profile_pic,
            created_at,
            updated_at,
        }
    }
}

impl EnrichedMessageRow {
    pub fn into_message(self) -> EnrichedMessage {
        let created_at = parse_timestamp(&self.created_at, &self.id);
        EnrichedMessage {
            sender: UserSummary {
                id: self.sender_id.clone(),
                name: self.sender_name,
                avatar_url: self.sender_pic,
            },
            recipient: UserSummary {
                id: self.recipient_id.clone(),
                name: self.recipient_name,
                avatar_url: self.recipient_pic,
            },
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            text: self.text,
            image: self.image,
            created_at,
        }
    }
}
