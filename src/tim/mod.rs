//! Time-zone, locale and date-format handling for the configuration store.

use crate::err::Error;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone as _, Utc};
use chrono_tz::Tz;
use std::fmt;

/// A stored time zone, either the host zone or an IANA-named zone.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TimeZone {
	#[default]
	Local,
	Named(Tz),
}

impl TimeZone {
	/// Parse a stored time-zone identifier.
	///
	/// An empty string or `local` selects the host zone; anything else
	/// must be a valid IANA name.
	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"" | "local" => Some(Self::Local),
			_ => s.parse::<Tz>().ok().map(Self::Named),
		}
	}

	/// The identifier persisted for this zone.
	pub fn name(&self) -> &str {
		match self {
			Self::Local => "local",
			Self::Named(tz) => tz.name(),
		}
	}
}

impl fmt::Display for TimeZone {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A language/country pair identifying the database locale.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Locale {
	pub language: String,
	pub country: String,
}

impl Locale {
	/// Build a locale from its components.
	///
	/// The language part is mandatory; the country may be empty.
	pub fn new(language: &str, country: &str) -> Result<Self, Error> {
		if language.is_empty() {
			return Err(Error::InvalidArgument(
				"a locale requires a non-empty language".to_owned(),
			));
		}
		Ok(Self {
			language: language.to_owned(),
			country: country.to_owned(),
		})
	}

	/// The locale of the host process, derived from the `LANG`
	/// environment variable, falling back to `en`/`US`.
	pub fn host_default() -> Self {
		let lang = std::env::var("LANG").unwrap_or_default();
		let tag = lang.split('.').next().unwrap_or_default();
		let mut parts = tag.split('_');
		let language = parts.next().unwrap_or_default();
		let country = parts.next().unwrap_or_default();
		if language.is_empty() || language == "C" || language == "POSIX" {
			Self {
				language: "en".to_owned(),
				country: "US".to_owned(),
			}
		} else {
			Self {
				language: language.to_owned(),
				country: country.to_owned(),
			}
		}
	}
}

impl fmt::Display for Locale {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.country.is_empty() {
			true => write!(f, "{}", self.language),
			false => write!(f, "{}_{}", self.language, self.country),
		}
	}
}

/// A strict date formatter bound to a time zone.
///
/// A fresh instance is built for every use, so instances can be moved
/// freely across threads without sharing state.
#[derive(Clone, Debug)]
pub struct DateFormatter {
	pattern: String,
	tz: TimeZone,
}

impl DateFormatter {
	/// Build a formatter, validating the strftime pattern up front.
	pub fn new(pattern: &str, tz: TimeZone) -> Result<Self, Error> {
		if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
			return Err(Error::InvalidArgument(format!(
				"'{pattern}' is not a valid date format pattern"
			)));
		}
		Ok(Self {
			pattern: pattern.to_owned(),
			tz,
		})
	}

	/// The pattern this formatter was built from.
	pub fn pattern(&self) -> &str {
		&self.pattern
	}

	/// Render an instant in the bound time zone.
	pub fn format(&self, at: DateTime<Utc>) -> String {
		match self.tz {
			TimeZone::Local => at.with_timezone(&Local).format(&self.pattern).to_string(),
			TimeZone::Named(tz) => at.with_timezone(&tz).format(&self.pattern).to_string(),
		}
	}

	/// Parse a textual timestamp in the bound time zone.
	///
	/// Parsing is strict: trailing input, out-of-range fields and
	/// nonexistent local times are all rejected.
	pub fn parse(&self, text: &str) -> Result<DateTime<Utc>, Error> {
		let naive = match NaiveDateTime::parse_from_str(text, &self.pattern) {
			Ok(v) => v,
			// Date-only patterns parse as a date at midnight
			Err(_) => NaiveDate::parse_from_str(text, &self.pattern)
				.map_err(|e| {
					Error::InvalidArgument(format!(
						"'{text}' does not match the date format '{}': {e}",
						self.pattern
					))
				})?
				.and_hms_opt(0, 0, 0)
				.ok_or_else(|| Error::Unreachable("midnight is always a valid time".to_owned()))?,
		};
		let resolved = match self.tz {
			TimeZone::Local => Local.from_local_datetime(&naive).earliest().map(|at| at.with_timezone(&Utc)),
			TimeZone::Named(tz) => tz.from_local_datetime(&naive).earliest().map(|at| at.with_timezone(&Utc)),
		};
		match resolved {
			Some(at) => Ok(at),
			None => Err(Error::InvalidArgument(format!(
				"'{text}' is not a valid local time in zone '{}'",
				self.tz
			))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn timezone_parsing() {
		assert_eq!(TimeZone::parse(""), Some(TimeZone::Local));
		assert_eq!(TimeZone::parse("local"), Some(TimeZone::Local));
		assert_eq!(
			TimeZone::parse("Europe/Berlin"),
			Some(TimeZone::Named(chrono_tz::Europe::Berlin))
		);
		assert_eq!(TimeZone::parse("Not/AZone"), None);
	}

	#[test]
	fn formatter_round_trip() {
		let fmt = DateFormatter::new("%Y-%m-%d %H:%M:%S", TimeZone::Named(chrono_tz::UTC)).unwrap();
		let at = Utc.with_ymd_and_hms(2024, 3, 9, 18, 30, 1).unwrap();
		let text = fmt.format(at);
		assert_eq!(text, "2024-03-09 18:30:01");
		assert_eq!(fmt.parse(&text).unwrap(), at);
	}

	#[test]
	fn date_only_pattern_parses_at_midnight() {
		let fmt = DateFormatter::new("%Y-%m-%d", TimeZone::Named(chrono_tz::UTC)).unwrap();
		let at = fmt.parse("2024-03-09").unwrap();
		assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap());
	}

	#[test]
	fn formatter_is_strict() {
		let fmt = DateFormatter::new("%Y-%m-%d", TimeZone::Named(chrono_tz::UTC)).unwrap();
		assert!(fmt.parse("2024-13-40").is_err());
		assert!(fmt.parse("2024-03-09 junk").is_err());
		assert!(DateFormatter::new("%Q", TimeZone::Local).is_err());
	}

	#[test]
	fn named_zone_offsets_apply() {
		let fmt =
			DateFormatter::new("%Y-%m-%d %H:%M:%S", TimeZone::Named(chrono_tz::Europe::Berlin))
				.unwrap();
		// Winter time, UTC+1
		let at = fmt.parse("2024-01-15 12:00:00").unwrap();
		assert_eq!(at, Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap());
	}
}
