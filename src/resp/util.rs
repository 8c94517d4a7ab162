//! Serde helpers for timestamps.

/// Serializes a `DateTime<Utc>` as a Unix timestamp in seconds, as JWT
/// "NumericDate" claims require (RFC 7519 section 2).
pub mod date_time_as_unix_seconds {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(date.timestamp())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Utc.timestamp_opt(i64::deserialize(deserializer)?, 0)
            .single()
            .ok_or_else(|| serde::de::Error::custom("Invalid Unix timestamp value."))
    }
}

/// Serializes a `DateTime<Utc>` as Unix milliseconds so stored documents sort
/// numerically by time.
pub mod date_time_as_unix_millis {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(date.timestamp_millis())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Utc.timestamp_millis_opt(i64::deserialize(deserializer)?)
            .single()
            .ok_or_else(|| serde::de::Error::custom("Invalid Unix timestamp value."))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, SubsecRound, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "super::date_time_as_unix_seconds")]
        seconds: DateTime<Utc>,
        #[serde(with = "super::date_time_as_unix_millis")]
        millis: DateTime<Utc>,
    }

    #[test]
    fn timestamps_keep_their_precision() {
        let now = Utc::now();
        let stamped = Stamped {
            seconds: now.round_subsecs(0),
            millis: now.round_subsecs(3),
        };

        let json = serde_json::to_value(&stamped).unwrap();
        assert!(json["seconds"].is_i64());
        assert!(json["millis"].is_i64());

        let back: Stamped = serde_json::from_value(json).unwrap();
        assert_eq!(back, stamped);
    }
}
