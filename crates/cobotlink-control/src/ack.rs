//! Command acknowledgements.
//!
//! Every handled command answers with the time its handler started,
//! serialized as `{"StartTime": "<ISO-8601>"}`. The payload is the same
//! whether the command ultimately ran, failed or was dropped.

use chrono::{DateTime, Local, NaiveDateTime, SubsecRound};
use serde::{Serialize, Serializer};

const START_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Response payload returned to the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandAcknowledgement {
    #[serde(rename = "StartTime", serialize_with = "serialize_start_time")]
    start_time: NaiveDateTime,
}

impl CommandAcknowledgement {
    /// Acknowledge a handler that started now, in local time.
    pub fn now() -> Self {
        Self::started_at(Local::now())
    }

    /// Acknowledge a handler that started at `at`.
    pub fn started_at(at: DateTime<Local>) -> Self {
        Self {
            start_time: at.naive_local().trunc_subsecs(6),
        }
    }

    /// When the handler started.
    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    /// Render the acknowledgement as its JSON payload.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "StartTime": self.start_time.format(START_TIME_FORMAT).to_string() })
    }
}

fn serialize_start_time<S: Serializer>(at: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&at.format(START_TIME_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ack_payload_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let ack = CommandAcknowledgement::started_at(at);

        let json = serde_json::to_string(&ack).unwrap();
        assert_eq!(json, r#"{"StartTime":"2024-03-05T14:07:09.000000"}"#);
        assert_eq!(ack.to_json(), serde_json::from_str::<serde_json::Value>(&json).unwrap());
    }

    #[test]
    fn test_ack_now_is_parseable() {
        let ack = CommandAcknowledgement::now();
        let value = serde_json::to_value(ack).unwrap();
        let text = value["StartTime"].as_str().unwrap();
        let parsed = NaiveDateTime::parse_from_str(text, START_TIME_FORMAT).unwrap();
        assert_eq!(parsed, ack.start_time());
    }
}
