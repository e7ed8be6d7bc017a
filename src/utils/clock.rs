use time::OffsetDateTime;

/// Wall clock used to stamp records.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// UTC system time truncated to milliseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        truncate_to_millis(OffsetDateTime::now_utc())
    }
}

pub fn truncate_to_millis(at: OffsetDateTime) -> OffsetDateTime {
    at.replace_nanosecond(u32::from(at.millisecond()) * 1_000_000)
        .unwrap_or(at)
}

/// Serde adapter writing `YYYY-MM-DDTHH:MM:SS.mmmZ`, always three fraction
/// digits in UTC. Any RFC 3339 timestamp is accepted when reading.
pub mod iso_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{
        format_description::{well_known::Rfc3339, BorrowedFormatItem},
        macros::format_description,
        OffsetDateTime, UtcOffset,
    };

    const FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );

    pub fn format(at: OffsetDateTime) -> Result<String, time::error::Format> {
        at.to_offset(UtcOffset::UTC).format(FORMAT)
    }

    pub fn serialize<S: Serializer>(
        at: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let text = format(*at).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&text, &Rfc3339).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn truncation_drops_sub_millisecond_digits() {
        let at = datetime!(2024-03-01 10:20:30.123456789 UTC);
        assert_eq!(truncate_to_millis(at), datetime!(2024-03-01 10:20:30.123 UTC));
    }

    #[test]
    fn system_clock_is_utc() {
        assert!(SystemClock.now().offset().is_utc());
    }

    #[test]
    fn iso_millis_keeps_trailing_zeros() {
        let whole = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(iso_millis::format(whole).unwrap(), "2023-11-14T22:13:20.000Z");

        let fraction = datetime!(2023-11-14 22:13:20.12 UTC);
        assert_eq!(iso_millis::format(fraction).unwrap(), "2023-11-14T22:13:20.120Z");
    }

    #[test]
    fn iso_millis_normalises_to_utc() {
        let shifted = datetime!(2024-03-01 17:20:30.5 +07:00);
        assert_eq!(iso_millis::format(shifted).unwrap(), "2024-03-01T10:20:30.500Z");
    }

    #[test]
    fn iso_millis_reads_back_what_it_writes() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Stamped {
            #[serde(with = "iso_millis")]
            at: OffsetDateTime,
        }

        let at = datetime!(2024-03-01 10:20:30.007 UTC);
        let json = serde_json::to_string(&Stamped { at }).unwrap();
        assert_eq!(json, r#"{"at":"2024-03-01T10:20:30.007Z"}"#);
        assert_eq!(serde_json::from_str::<Stamped>(&json).unwrap().at, at);
    }
}
