/// Serde adapter storing `DateTime<Utc>` claims as unix seconds, which is
/// how JWT `iat`/`exp` fields are specified.
pub mod date_time_as_unix_seconds {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.timestamp())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let seconds = i64::deserialize(deserializer)?;
        Utc.timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| serde::de::Error::custom("timestamp out of range"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, SubsecRound, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Stamp {
        #[serde(with = "super::date_time_as_unix_seconds")]
        at: DateTime<Utc>,
    }

    #[test]
    fn timestamps_roundtrip_at_second_precision() {
        let at = Utc::now().round_subsecs(0);
        let json = serde_json::to_string(&Stamp { at }).unwrap();
        let back: Stamp = serde_json::from_str(&json).unwrap();

        assert_eq!(back.at, at);
    }
}
