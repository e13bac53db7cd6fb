// Discord REST payloads (only the fields this adapter reads or writes)

use serde::{Deserialize, Serialize};

/// Snowflakes travel as decimal strings
pub fn parse_snowflake(raw: &str) -> Option<u64> {
    raw.parse().ok()
}

pub const GUILD_TEXT: u8 = 0;

pub const OVERWRITE_ROLE: u8 = 0;
pub const OVERWRITE_MEMBER: u8 = 1;

pub const VIEW_CHANNEL: u64 = 1 << 10;
pub const SEND_MESSAGES: u64 = 1 << 11;
pub const READ_MESSAGE_HISTORY: u64 = 1 << 16;

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub id: String,
    pub author: User,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct PermissionOverwrite {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub allow: String,
    pub deny: String,
}

#[derive(Debug, Serialize)]
pub struct CreateChannel {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub topic: String,
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

impl CreateChannel {
    /// Text channel hidden from @everyone, usable by the bot
    pub fn hidden_text(name: &str, guild_id: u64, bot_id: u64) -> Self {
        Self {
            name: name.to_string(),
            kind: GUILD_TEXT,
            topic: "Queue storage - do not touch".to_string(),
            permission_overwrites: vec![
                // The @everyone role shares the guild's id
                PermissionOverwrite {
                    id: guild_id.to_string(),
                    kind: OVERWRITE_ROLE,
                    allow: "0".to_string(),
                    deny: VIEW_CHANNEL.to_string(),
                },
                PermissionOverwrite {
                    id: bot_id.to_string(),
                    kind: OVERWRITE_MEMBER,
                    allow: (VIEW_CHANNEL | SEND_MESSAGES | READ_MESSAGE_HISTORY).to_string(),
                    deny: "0".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageBody<'a> {
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct RateLimited {
    /// Seconds
    pub retry_after: f64,
}
