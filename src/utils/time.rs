use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// `00:00:00.000Z` of the given UTC day.
pub fn start_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// `23:59:59.999Z` of the given UTC day.
pub fn end_of_day_utc(date: NaiveDate) -> DateTime<Utc> {
    start_of_day_utc(date) + Duration::days(1) - Duration::milliseconds(1)
}

/// Monday 00:00:00.000 through Sunday 23:59:59.999 of the week containing
/// `now`, with day boundaries taken in `offset`, returned in UTC.
pub fn iso_week_bounds(now: DateTime<Utc>, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local = now.with_timezone(&offset);
    let days_since_monday = i64::from(local.weekday().num_days_from_monday());
    let monday = local.date_naive() - Duration::days(days_since_monday);
    let start_local = monday.and_time(NaiveTime::MIN);
    // a fixed offset maps every local time to exactly one instant
    let start = (start_local - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc();
    let end = start + Duration::days(7) - Duration::milliseconds(1);
    (start, end)
}

pub fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
