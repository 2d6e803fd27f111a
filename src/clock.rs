use time::{Duration, OffsetDateTime};

/// Lifetime a room gets when its duration token isn't recognized.
pub const FALLBACK_TOKEN: &str = "1h";

pub fn duration_for(token: &str) -> Duration {
    match token {
        "1h" => Duration::hours(1),
        "4h" => Duration::hours(4),
        "24h" => Duration::hours(24),
        "7d" => Duration::days(7),
        "30d" => Duration::days(30),
        "1y" => Duration::days(365),
        _ => Duration::hours(1),
    }
}

pub fn expiry_for(token: &str, now: OffsetDateTime) -> OffsetDateTime {
    now + duration_for(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_recognized_token() {
        let cases = [
            ("1h", 3_600),
            ("4h", 14_400),
            ("24h", 86_400),
            ("7d", 604_800),
            ("30d", 2_592_000),
            ("1y", 31_536_000),
        ];
        for (token, secs) in cases {
            assert_eq!(duration_for(token).whole_seconds(), secs, "token {token}");
        }
    }

    #[test]
    fn unrecognized_tokens_fall_back_to_one_hour() {
        for token in ["5m", "", "1H", "forever"] {
            assert_eq!(duration_for(token), duration_for(FALLBACK_TOKEN));
        }
    }

    #[test]
    fn expiry_is_strictly_after_now() {
        let now = OffsetDateTime::now_utc();
        assert!(expiry_for("1h", now) > now);
        assert_eq!((expiry_for("7d", now) - now).whole_seconds(), 604_800);
    }
}
