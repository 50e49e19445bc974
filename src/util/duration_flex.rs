// Config timeouts accept either a bare number of seconds (int or float) or
// an ISO-8601-ish duration string ("30s", "2m", "1h30m", "1.5s").

use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, sync::LazyLock, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationFlex(pub Duration);

impl From<DurationFlex> for Duration {
    fn from(value: DurationFlex) -> Self {
        value.0
    }
}
impl From<Duration> for DurationFlex {
    fn from(value: Duration) -> Self {
        Self(value)
    }
}

static COMPONENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([0-9]+(?:\.[0-9]+)?)(ms|h|m|s)").unwrap());

fn parse_duration_string(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<f64>() {
        return duration_from_secs_f64(seconds);
    }

    let mut total = Duration::ZERO;
    let mut matched_chars = 0usize;

    for capture in COMPONENT_RE.captures_iter(value) {
        let whole = capture.get(0).unwrap();
        matched_chars += whole.as_str().len();

        let amount: f64 = capture[1]
            .parse()
            .map_err(|_| format!("invalid duration component in {value:?}"))?;
        let unit_seconds = match capture[2].to_ascii_lowercase().as_str() {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 0.001,
            other => return Err(format!("unrecognized duration unit {other:?} in {value:?}")),
        };
        total += duration_from_secs_f64(amount * unit_seconds)?;
    }

    if matched_chars == 0 || matched_chars != value.chars().filter(|c| !c.is_whitespace()).count() {
        return Err(format!("malformed duration string: {value:?}"));
    }

    Ok(total)
}

fn duration_from_secs_f64(seconds: f64) -> Result<Duration, String> {
    if seconds < 0.0 || !seconds.is_finite() {
        return Err(format!("duration must be non-negative, got {seconds}"));
    }
    Ok(Duration::from_secs_f64(seconds))
}

impl<'de> Deserialize<'de> for DurationFlex {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Visitor;
        impl de::Visitor<'_> for Visitor {
            type Value = DurationFlex;

            fn expecting(
                &self,
                f: &mut fmt::Formatter,
            ) -> fmt::Result {
                f.write_str("a number of seconds or a duration string like \"30s\"")
            }

            fn visit_u64<E: de::Error>(
                self,
                v: u64,
            ) -> Result<Self::Value, E> {
                Ok(DurationFlex(Duration::from_secs(v)))
            }
            fn visit_i64<E: de::Error>(
                self,
                v: i64,
            ) -> Result<Self::Value, E> {
                duration_from_secs_f64(v as f64)
                    .map(DurationFlex)
                    .map_err(de::Error::custom)
            }
            fn visit_f64<E: de::Error>(
                self,
                v: f64,
            ) -> Result<Self::Value, E> {
                duration_from_secs_f64(v).map(DurationFlex).map_err(de::Error::custom)
            }
            fn visit_str<E: de::Error>(
                self,
                v: &str,
            ) -> Result<Self::Value, E> {
                parse_duration_string(v).map(DurationFlex).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}
impl Serialize for DurationFlex {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.0.as_secs_f64())
    }
}

#[cfg(test)]
mod test_duration_flex {
    use super::{parse_duration_string, DurationFlex};
    use std::time::Duration;

    #[test]
    fn parses_plain_seconds() {
        let v: DurationFlex = serde_json::from_str("30").unwrap();
        assert_eq!(v.0, Duration::from_secs(30));
    }

    #[test]
    fn parses_fractional_seconds() {
        let v: DurationFlex = serde_json::from_str("1.5").unwrap();
        assert_eq!(v.0, Duration::from_secs_f64(1.5));
    }

    #[test]
    fn parses_suffixed_string() {
        assert_eq!(parse_duration_string("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration_string("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration_string("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration_string("500ms").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration_string("abc").is_err());
        assert!(parse_duration_string("-5s").is_err());
    }
}
