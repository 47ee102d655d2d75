use time::OffsetDateTime;

pub trait TimeSource {
    // Return milliseconds since the unix epoch
    fn now_millis(&self) -> i64;
}

#[derive(Clone)]
pub struct SystemTime {}

impl TimeSource for SystemTime {
    fn now_millis(&self) -> i64 {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
    }
}

#[derive(Clone)]
pub struct FixedTime {
    pub millis: i64,
}

impl TimeSource for FixedTime {
    fn now_millis(&self) -> i64 {
        self.millis
    }
}
