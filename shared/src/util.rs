/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate an opaque entity id.
///
/// All persisted entities are keyed by 128-bit identifiers; a v4 UUID in
/// hyphenated form keeps them opaque and collision-free across restaurants.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
