use time::OffsetDateTime;

/// Synthesized identifiers and timestamps for frames the source protocol
/// never carried. These are the only non-deterministic values a converter
/// produces.

pub fn chat_completion_id() -> String {
    format!("chatcmpl-{}", short_uuid())
}

pub fn message_id() -> String {
    format!("msg_{}", short_uuid())
}

pub fn response_id() -> String {
    format!("resp_{}", short_uuid())
}

pub fn tool_use_id() -> String {
    format!("toolu_{}", short_uuid())
}

pub fn call_id() -> String {
    format!("call_{}", short_uuid())
}

pub fn unix_timestamp() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn short_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..24].to_string()
}
