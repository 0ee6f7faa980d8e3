use chrono::Utc;
use uuid::Uuid;

/// Source of human-readable order identifiers
pub trait WorkIdSource: Send + Sync {
    fn next_work_id(&self) -> String;
}

/// `YYYYMMDDHHMMSS` plus six random hex digits, e.g. `20260301091502a41f0c`
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampWorkIds;

impl WorkIdSource for TimestampWorkIds {
    fn next_work_id(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}{}", Utc::now().format("%Y%m%d%H%M%S"), &suffix[..6])
    }
}
