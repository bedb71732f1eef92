use std::fmt;

use log::error;
use serde::{Deserialize, Serialize};

/// Seconds since the unix epoch. Tasks carry one so listings keep creation order.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "backend-sql", derive(sqlx::Type))]
#[cfg_attr(feature = "backend-sql", sqlx(transparent))]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn now() -> Result<Self, ()> {
        use std::time::SystemTime;

        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|duration| duration.as_secs() as i64)
            .map(Self)
            .map_err(|e| {
                error!("couldn't get time: {e:?}");
            })
    }

    /// Calendar date in the same shape the task form's due date uses, e.g. "14 November, 2023".
    pub fn date(&self) -> String {
        use ::time::{macros::format_description, OffsetDateTime};

        OffsetDateTime::from_unix_timestamp(self.0)
            .ok()
            .and_then(|when| {
                when.format(format_description!("[day padding:none] [month repr:long], [year]"))
                    .ok()
            })
            .unwrap_or_else(|| self.0.to_string())
    }

    #[cfg(test)]
    pub fn from_i64(secs: i64) -> Self {
        Self(secs)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self(0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(fmt, "<epoch>");
        }

        use ::time::{format_description::well_known::Rfc3339, OffsetDateTime};

        let formatted = OffsetDateTime::from_unix_timestamp(self.0)
            .ok()
            .and_then(|when| when.format(&Rfc3339).ok());

        match formatted {
            Some(s) => write!(fmt, "{}", s),
            None => write!(fmt, "{}", self.0),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Timestamp::default().to_string(), "<epoch>");
        assert_eq!(
            Timestamp::from_i64(1_700_000_000).to_string(),
            "2023-11-14T22:13:20Z"
        );
        assert_eq!(Timestamp::from_i64(1_700_000_000).date(), "14 November, 2023");
    }
}
