use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public view of an account. The password hash never leaves the DB layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Display-ready identity attached to every message read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
}


/// A message with sender and recipient resolved to summaries.
///
/// Every read path (send response, paginated fetch, realtime push) returns
/// this exact shape so the client can reconcile an optimistic echo without
/// sniffing field types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedMessage {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub sender: UserSummary,
    pub recipient: UserSummary,
    /// Empty when the message only carries an image.
    pub text: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}
