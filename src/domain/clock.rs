use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Current time truncated to microseconds, the precision Postgres keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Next optimistic-lock version: the current time, bumped past `previous` if the clock has not moved.
pub fn next_version(previous: DateTime<Utc>) -> DateTime<Utc> {
    let candidate = now();
    if candidate > previous {
        candidate
    } else {
        previous + Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_version_always_advances() {
        let future = now() + Duration::seconds(30);
        assert!(next_version(future) > future);
        let past = now() - Duration::seconds(30);
        assert!(next_version(past) > past);
    }
}
