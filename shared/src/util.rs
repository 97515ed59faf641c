use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::types::Timestamp;

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Random alphanumeric identifier of `len` characters.
///
/// Used for `request_id` (20), `tenant_id` (10) and `username` (10).
pub fn random_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
