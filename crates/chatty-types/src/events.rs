use serde::{Deserialize, Serialize};

use crate::models::EnrichedMessage;

/// Events pushed over the realtime gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum GatewayEvent {
    /// Ids of every user with a registered connection. Sent to all clients
    /// after each presence change.
    GetOnlineUsers(Vec<String>),

    /// A message addressed to the receiving connection's user.
    NewMessage(EnrichedMessage),
}
