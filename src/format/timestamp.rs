//! Multi-timezone timestamp rendering.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

const UTC_PATTERN: &str = "%Y-%m-%d %H:%M:%S";
const ZONE_PATTERN: &str = "%H:%M:%S on %Y-%m-%d";

/// Raised when a configured zone is not in the IANA database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timezone \"{zone}\"")]
pub struct InvalidTimezone {
    pub zone: String,
}

/// Ordered, deduplicated set of validated IANA zones.
#[derive(Debug, Clone, Default)]
pub struct TimezoneSet {
    zones: Vec<(String, Tz)>,
}

impl TimezoneSet {
    /// Validate every entry up front. Fails on the first unknown zone and
    /// returns no partial set.
    pub fn new<I, S>(zones: I) -> Result<Self, InvalidTimezone>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for zone in zones {
            let name = zone.as_ref().trim();
            let tz: Tz = name.parse().map_err(|_| InvalidTimezone {
                zone: name.to_string(),
            })?;
            if !set.zones.iter().any(|(existing, _)| existing == name) {
                set.zones.push((name.to_string(), tz));
            }
        }
        Ok(set)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.zones.iter().map(|(name, _)| name.as_str())
    }

    /// UTC line first, then one `"<zone>: HH:MM:SS on YYYY-MM-DD"` line per
    /// zone in insertion order.
    pub fn render_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.zones.len() + 1);
        lines.push(now.format(UTC_PATTERN).to_string());
        for (name, tz) in &self.zones {
            let local = now.with_timezone(tz);
            lines.push(format!("{}: {}", name, local.format(ZONE_PATTERN)));
        }
        lines
    }

    pub fn render(&self) -> Vec<String> {
        self.render_at(Utc::now())
    }
}

impl Serialize for TimezoneSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 23, 30, 5).unwrap()
    }

    #[test]
    fn rejects_unknown_zone_with_its_name() {
        let err = TimezoneSet::new(["Europe/Paris", "Mars/Olympus_Mons"]).unwrap_err();
        assert_eq!(err.zone, "Mars/Olympus_Mons");
        assert_eq!(err.to_string(), "invalid timezone \"Mars/Olympus_Mons\"");
    }

    #[test]
    fn collapses_duplicates_preserving_order() {
        let set = TimezoneSet::new(["Asia/Tokyo", "America/New_York", "Asia/Tokyo"]).unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["Asia/Tokyo", "America/New_York"]);
    }

    #[test]
    fn renders_utc_then_zones() {
        let set = TimezoneSet::new(["Asia/Tokyo", "America/New_York"]).unwrap();
        let lines = set.render_at(fixed_instant());
        assert_eq!(
            lines,
            vec![
                "2024-03-09 23:30:05".to_string(),
                "Asia/Tokyo: 08:30:05 on 2024-03-10".to_string(),
                "America/New_York: 18:30:05 on 2024-03-09".to_string(),
            ]
        );
    }

    #[test]
    fn empty_set_renders_only_utc() {
        let lines = TimezoneSet::empty().render_at(fixed_instant());
        assert_eq!(lines.len(), 1);
    }
}
