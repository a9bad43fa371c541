// SPDX-License-Identifier: Apache-2.0

use crate::BoxError;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Parse a duration such as `"500ms"`, `"10s"`, `"2m"` or `"1h 30m"`. A bare
/// number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, BoxError> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| format!("invalid duration `{s}`: {e}").into())
}

// Durations may be given as strings ("10s") or as integer seconds
pub(crate) fn deser_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(num) => num
            .as_u64()
            .map(Duration::from_secs)
            .ok_or_else(|| serde::de::Error::custom("duration must be a positive integer")),
        serde_json::Value::String(s) => parse_duration(&s).map_err(serde::de::Error::custom),
        _ => Err(serde::de::Error::custom("unexpected value for duration")),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;
    use serde_json;
    use tokio_test::assert_ok;

    #[test]
    fn duration_parse() {
        let d = parse_duration("10s");
        assert_ok!(&d);
        assert_eq!(Duration::from_secs(10), d.unwrap());

        assert_eq!(
            Duration::from_millis(500),
            parse_duration("500ms").unwrap()
        );
        assert_eq!(Duration::from_secs(120), parse_duration("2m").unwrap());
        assert_eq!(Duration::from_secs(5400), parse_duration("1h 30m").unwrap());
        assert_eq!(Duration::from_secs(30), parse_duration(" 30 ").unwrap());
    }

    #[test]
    fn duration_parse_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn duration_parse_overflow_is_an_error() {
        let res = std::panic::catch_unwind(|| parse_duration("1000000000000000000m"));
        let res = res.expect("parsing must not panic");
        assert!(res.unwrap_err().to_string().contains("invalid duration"));
    }

    #[derive(Deserialize, Debug)]
    struct DurationConfig {
        #[serde(deserialize_with = "deser_duration")]
        value: Duration,
    }

    #[test]
    fn test_deser_duration_from_string() {
        let json = r#"{"value": "250ms"}"#;
        let config: DurationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.value, Duration::from_millis(250));
    }

    #[test]
    fn test_deser_duration_from_integer() {
        let json = r#"{"value": 42}"#;
        let config: DurationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.value, Duration::from_secs(42));
    }

    #[test]
    fn test_deser_duration_from_bool_fails() {
        let json = r#"{"value": true}"#;
        let result: Result<DurationConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("unexpected value for duration")
        );
    }
}
