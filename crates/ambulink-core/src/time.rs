use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::Result;

pub fn format_rfc3339(datetime: OffsetDateTime) -> Result<String> {
    Ok(datetime.format(&Rfc3339)?)
}

/// Current UTC time as an RFC 3339 string.
pub fn now_rfc3339() -> Result<String> {
    format_rfc3339(OffsetDateTime::now_utc())
}

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn formats_utc_timestamp() {
        let formatted = format_rfc3339(datetime!(2025-01-26 19:13:55 UTC)).unwrap();
        assert_eq!(formatted, "2025-01-26T19:13:55Z");
    }

    #[test]
    fn now_is_parseable() {
        let now = now_rfc3339().unwrap();
        assert!(OffsetDateTime::parse(&now, &Rfc3339).is_ok());
    }
}
