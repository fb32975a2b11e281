use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Current time at microsecond precision, the resolution stored in vault images.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Next `updated_at` for a row last touched at `previous`.
///
/// Never goes backwards, even when the wall clock does, so a local edit always
/// outranks the version it replaced.
#[must_use]
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let current = now();
    if current > previous {
        current
    } else {
        previous + Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_timestamp_is_strictly_later_than_future_previous() {
        let future = now() + Duration::hours(1);
        assert!(next_timestamp(future) > future);
    }

    #[test]
    fn next_timestamp_uses_wall_clock_when_ahead() {
        let past = now() - Duration::hours(1);
        let next = next_timestamp(past);
        assert!(next > past + Duration::minutes(59));
    }
}
