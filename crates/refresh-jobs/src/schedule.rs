// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schedule parsing and next run calculation for the scheduler loop.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Used whenever the configured schedule cannot be parsed.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Convert a standard 5-field Unix cron expression to the 7-field format
/// expected by the `cron` crate.
///
/// 5-field format: minute hour day-of-month month day-of-week
/// 7-field format: second minute hour day-of-month month day-of-week year
///
/// Unix numbers weekdays 0-6 from Sunday (7 is Sunday too); the `cron` crate
/// numbers them 1-7 from Sunday, so the weekday field is rewritten.
fn convert_to_cron_crate_format(expression: &str) -> String {
	let fields: Vec<&str> = expression.split_whitespace().collect();
	if let [minute, hour, day_of_month, month, day_of_week] = fields[..] {
		format!(
			"0 {minute} {hour} {day_of_month} {month} {} *",
			remap_weekdays(day_of_week)
		)
	} else {
		// 6/7 fields are already in extended format; anything else fails to parse.
		expression.to_string()
	}
}

/// Rewrite a Unix day-of-week field into `cron` crate numbering.
///
/// Numeric items (single days, ranges, steps) are expanded into an explicit
/// list. Names and anything out of range are left for the parser to judge.
fn remap_weekdays(field: &str) -> String {
	if field == "*" || field == "?" {
		return field.to_string();
	}
	field
		.split(',')
		.map(|item| remap_weekday_item(item).unwrap_or_else(|| item.to_string()))
		.collect::<Vec<_>>()
		.join(",")
}

fn remap_weekday_item(item: &str) -> Option<String> {
	let (range, step) = match item.split_once('/') {
		Some((range, step)) => (range, step.parse::<usize>().ok().filter(|s| *s > 0)?),
		None => (item, 1),
	};

	let (start, end) = match range {
		"*" => (0, 6),
		_ => match range.split_once('-') {
			Some((start, end)) => (start.parse::<u8>().ok()?, end.parse::<u8>().ok()?),
			None => {
				let day = range.parse::<u8>().ok()?;
				// `5/2` means "from Friday every second day".
				(day, if item.contains('/') { 6 } else { day })
			}
		},
	};
	if start > end || end > 7 {
		return None;
	}

	let mut days: Vec<u8> = (start..=end).step_by(step).map(|day| day % 7 + 1).collect();
	days.sort_unstable();
	days.dedup();
	Some(days.iter().map(u8::to_string).collect::<Vec<_>>().join(","))
}

#[derive(Debug, Clone)]
pub enum Schedule {
	/// Fixed interval between runs.
	Interval(Duration),
	/// Cron expression.
	Cron(Box<cron::Schedule>),
}

impl Schedule {
	/// Parse a schedule setting.
	///
	/// Precedence: a positive integer is a number of seconds, otherwise a cron
	/// expression. Returns `Err` with the parse message when neither applies.
	pub fn try_parse(setting: &str) -> Result<Self, String> {
		let setting = setting.trim();
		if let Ok(secs) = setting.parse::<u64>() {
			if secs > 0 {
				return Ok(Schedule::Interval(Duration::from_secs(secs)));
			}
		}

		cron::Schedule::from_str(&convert_to_cron_crate_format(setting))
			.map(|s| Schedule::Cron(Box::new(s)))
			.map_err(|e| format!("invalid schedule '{setting}': {e}"))
	}

	/// Parse a schedule setting, degrading to [`DEFAULT_INTERVAL`] on error.
	pub fn parse(setting: &str) -> Self {
		match Self::try_parse(setting) {
			Ok(schedule) => schedule,
			Err(error) => {
				tracing::warn!(%error, default_secs = DEFAULT_INTERVAL.as_secs(), "falling back to default schedule");
				Schedule::Interval(DEFAULT_INTERVAL)
			}
		}
	}

	/// Next run strictly relative to `now`; previous scheduled times are not
	/// consulted, so missed runs never burst.
	pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
		let fallback = || now + chrono::Duration::seconds(DEFAULT_INTERVAL.as_secs() as i64);
		match self {
			Schedule::Interval(interval) => chrono::Duration::from_std(*interval)
				.ok()
				.and_then(|d| now.checked_add_signed(d))
				.unwrap_or_else(fallback),
			Schedule::Cron(schedule) => schedule.after(&now).next().unwrap_or_else(fallback),
		}
	}
}

impl fmt::Display for Schedule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Schedule::Interval(interval) => write!(f, "every {}s", interval.as_secs()),
			Schedule::Cron(schedule) => write!(f, "cron '{}'", schedule),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn test_integer_seconds() {
		let schedule = Schedule::parse("300");
		assert!(matches!(schedule, Schedule::Interval(d) if d == Duration::from_secs(300)));

		let now = Utc.with_ymd_and_hms(2026, 1, 19, 10, 30, 0).unwrap();
		assert_eq!(
			schedule.next_after(now),
			Utc.with_ymd_and_hms(2026, 1, 19, 10, 35, 0).unwrap()
		);
	}

	#[test]
	fn test_cron_hourly() {
		let schedule = Schedule::parse("0 * * * *");
		assert!(matches!(schedule, Schedule::Cron(_)));

		let now = Utc.with_ymd_and_hms(2026, 1, 19, 10, 30, 0).unwrap();
		assert_eq!(
			schedule.next_after(now),
			Utc.with_ymd_and_hms(2026, 1, 19, 11, 0, 0).unwrap()
		);
	}

	#[test]
	fn test_cron_every_fifteen_minutes() {
		let schedule = Schedule::parse("*/15 * * * *");
		let now = Utc.with_ymd_and_hms(2026, 1, 19, 10, 31, 12).unwrap();
		assert_eq!(
			schedule.next_after(now),
			Utc.with_ymd_and_hms(2026, 1, 19, 10, 45, 0).unwrap()
		);
	}

	#[test]
	fn test_zero_and_negative_fall_back() {
		for setting in ["0", "-5", "", "soon", "* * *"] {
			assert!(Schedule::try_parse(setting).is_err(), "{setting:?} should not parse");
			let schedule = Schedule::parse(setting);
			assert!(matches!(schedule, Schedule::Interval(d) if d == DEFAULT_INTERVAL));
		}
	}

	#[test]
	fn test_convert_passes_extended_through() {
		assert_eq!(convert_to_cron_crate_format("0 0 * * *"), "0 0 0 * * * *");
		assert_eq!(convert_to_cron_crate_format("0 0 0 * * *"), "0 0 0 * * *");
	}

	#[test]
	fn test_convert_remaps_weekdays() {
		assert_eq!(convert_to_cron_crate_format("0 9 * * 1-5"), "0 0 9 * * 2,3,4,5,6 *");
		assert_eq!(convert_to_cron_crate_format("0 0 * * 0"), "0 0 0 * * 1 *");
		assert_eq!(convert_to_cron_crate_format("0 0 * * 7"), "0 0 0 * * 1 *");
		assert_eq!(convert_to_cron_crate_format("0 0 * * 5-7"), "0 0 0 * * 1,6,7 *");
		assert_eq!(convert_to_cron_crate_format("0 0 * * */2"), "0 0 0 * * 1,3,5,7 *");
		assert_eq!(convert_to_cron_crate_format("0 0 * * 0,3"), "0 0 0 * * 1,4 *");
		assert_eq!(convert_to_cron_crate_format("0 0 * * MON-FRI"), "0 0 0 * * MON-FRI *");
	}

	#[test]
	fn test_cron_weekdays_skip_weekend() {
		// Saturday 2026-01-17.
		let now = Utc.with_ymd_and_hms(2026, 1, 17, 10, 0, 0).unwrap();
		let schedule = Schedule::try_parse("0 9 * * 1-5").unwrap();
		assert_eq!(
			schedule.next_after(now),
			Utc.with_ymd_and_hms(2026, 1, 19, 9, 0, 0).unwrap()
		);
	}

	#[test]
	fn test_cron_sunday_as_zero_or_seven() {
		let now = Utc.with_ymd_and_hms(2026, 1, 17, 10, 0, 0).unwrap();
		let sunday_midnight = Utc.with_ymd_and_hms(2026, 1, 18, 0, 0, 0).unwrap();
		for setting in ["0 0 * * 0", "0 0 * * 7"] {
			let schedule = Schedule::try_parse(setting).unwrap();
			assert_eq!(schedule.next_after(now), sunday_midnight, "{setting}");
		}
	}

	#[test]
	fn test_weekday_out_of_range_rejected() {
		assert!(Schedule::try_parse("0 0 * * 9").is_err());
	}
}
