//! 时间工具函数
//!
//! 时间戳统一为 i64 Unix millis（UTC）；排班域使用 `NaiveDate`/`NaiveTime`。
//! 日期→时间戳转换在 service/handler 层完成，repository 层只接收 `i64`。

use chrono::{Datelike, Days, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use super::{AppError, AppResult};

/// 解析 IANA 时区名；无效时回退 UTC
pub fn parse_timezone(name: &str) -> Tz {
    name.parse().unwrap_or(chrono_tz::UTC)
}

/// 解析日期字符串 (YYYY-MM-DD)
pub fn parse_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid date format: {}", date)))
}

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let days_from_monday = date.weekday().num_days_from_monday() as u64;
    date - Days::new(days_from_monday)
}

/// Day start (00:00:00 UTC) → Unix millis
pub fn day_start_millis(date: NaiveDate) -> i64 {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("valid midnight"))
        .timestamp_millis()
}

/// Exclusive day end → next day 00:00:00 UTC in Unix millis
pub fn day_end_millis(date: NaiveDate) -> i64 {
    day_start_millis(date + Days::new(1))
}

/// `[start, end)` millis range covering `days` days from `date`
pub fn range_millis(date: NaiveDate, days: u64) -> (i64, i64) {
    (day_start_millis(date), day_start_millis(date + Days::new(days)))
}

/// Date and hour-of-day (UTC) for a millis timestamp
pub fn millis_to_date_hour(millis: i64) -> (NaiveDate, u32) {
    let dt = Utc
        .timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap());
    (dt.date_naive(), dt.hour())
}

/// Date and hour-of-day in the restaurant's business timezone
pub fn millis_to_date_hour_tz(millis: i64, tz: Tz) -> (NaiveDate, u32) {
    let dt = Utc
        .timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
        .with_timezone(&tz);
    (dt.date_naive(), dt.hour())
}

/// Local-midnight millis for a business date.
///
/// DST gap fallback: 如果本地时间不存在（夏令时跳跃），回退到 UTC。
pub fn day_start_millis_tz(date: NaiveDate, tz: Tz) -> i64 {
    let naive = date.and_hms_opt(0, 0, 0).expect("valid midnight");
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| day_start_millis(date))
}

/// Minutes past midnight
pub fn minutes_of_day(t: NaiveTime) -> i64 {
    (t.hour() * 60 + t.minute()) as i64
}

/// Whether two time ranges overlap, treating end < start as overnight
pub fn times_overlap(start1: NaiveTime, end1: NaiveTime, start2: NaiveTime, end2: NaiveTime) -> bool {
    let (s1, mut e1) = (minutes_of_day(start1), minutes_of_day(end1));
    let (s2, mut e2) = (minutes_of_day(start2), minutes_of_day(end2));
    if e1 < s1 {
        e1 += 24 * 60;
    }
    if e2 < s2 {
        e2 += 24 * 60;
    }
    !(e1 <= s2 || e2 <= s1)
}

/// Whether `[inner_start, inner_end]` sits fully within `[outer_start, outer_end]`
pub fn time_within(
    inner_start: NaiveTime,
    inner_end: NaiveTime,
    outer_start: NaiveTime,
    outer_end: NaiveTime,
) -> bool {
    let (is_, mut ie) = (minutes_of_day(inner_start), minutes_of_day(inner_end));
    let (os, mut oe) = (minutes_of_day(outer_start), minutes_of_day(outer_end));
    if ie < is_ {
        ie += 24 * 60;
    }
    if oe < os {
        oe += 24 * 60;
    }
    os <= is_ && ie <= oe
}

/// Shift duration in hours, treating end < start as overnight
pub fn shift_hours(start: NaiveTime, end: NaiveTime) -> f64 {
    let s = minutes_of_day(start);
    let mut e = minutes_of_day(end);
    if e < s {
        e += 24 * 60;
    }
    (e - s) as f64 / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn week_start_is_monday() {
        // 2025-07-09 is a Wednesday
        let wed = NaiveDate::from_ymd_opt(2025, 7, 9).unwrap();
        assert_eq!(week_start(wed), NaiveDate::from_ymd_opt(2025, 7, 7).unwrap());
        let mon = NaiveDate::from_ymd_opt(2025, 7, 7).unwrap();
        assert_eq!(week_start(mon), mon);
    }

    #[test]
    fn overlap_detects_shared_minutes() {
        assert!(times_overlap(t(10, 0), t(14, 0), t(13, 0), t(18, 0)));
        assert!(!times_overlap(t(10, 0), t(14, 0), t(14, 0), t(18, 0)));
    }

    #[test]
    fn overnight_ranges_overlap() {
        // 21:00-02:00 wraps midnight and overlaps a 23:00-23:30 slot
        assert!(times_overlap(t(21, 0), t(2, 0), t(23, 0), t(23, 30)));
    }

    #[test]
    fn containment_checks_bounds() {
        assert!(time_within(t(11, 0), t(15, 0), t(9, 0), t(17, 0)));
        assert!(!time_within(t(8, 0), t(15, 0), t(9, 0), t(17, 0)));
    }

    #[test]
    fn overnight_shift_hours() {
        assert_eq!(shift_hours(t(21, 0), t(2, 0)), 5.0);
        assert_eq!(shift_hours(t(11, 0), t(15, 0)), 4.0);
    }
}
