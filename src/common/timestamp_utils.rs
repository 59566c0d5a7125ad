use chrono::{DateTime, Utc};

// Whole minutes since the unix epoch, the clock relay schedules are keyed on
pub fn epoch_minute(now: DateTime<Utc>) -> u64 {
    (now.timestamp().max(0) / 60) as u64
}

pub fn current_epoch_minute() -> u64 {
    epoch_minute(Utc::now())
}
