//! Conversion between absolute instants and the store-local wall clock.
//!
//! Stored timestamps carry no zone: a BSON datetime holds the wall clock of
//! the store time zone as if it were UTC.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Time zone assumed for stored timestamps when none is given
pub const DEFAULT_STORE_TIME_ZONE: Tz = Tz::UTC;

/// Wall clock of `instant` in `store_time_zone`, zone stripped
pub fn to_store_local<Z: TimeZone>(instant: &DateTime<Z>, store_time_zone: Tz) -> NaiveDateTime {
    instant.with_timezone(&store_time_zone).naive_local()
}

/// Stored value for `instant` as written in `store_time_zone`.
///
/// Stored values are whole milliseconds, so a bound with finer precision is
/// rounded up to the next millisecond. Both `$gte start` and `$lt end` then
/// match exactly the stored values inside `[start, end)`.
pub fn to_store_datetime<Z: TimeZone>(instant: &DateTime<Z>, store_time_zone: Tz) -> bson::DateTime {
    let local = to_store_local(instant, store_time_zone).and_utc();
    let mut millis = local.timestamp_millis();
    if local.timestamp_subsec_nanos() % 1_000_000 != 0 {
        millis += 1;
    }
    bson::DateTime::from_millis(millis)
}

/// Interpret a store-local wall clock as an instant.
///
/// Ambiguous wall clocks (DST fall-back) resolve to the earlier instant;
/// wall clocks skipped by a DST jump yield `None`.
pub fn from_store_local(naive: NaiveDateTime, store_time_zone: Tz) -> Option<DateTime<Utc>> {
    store_time_zone
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 3, 12)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_utc_is_identity() {
        let instant = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(to_store_local(&instant, Tz::UTC), instant.naive_utc());
        assert_eq!(
            from_store_local(instant.naive_utc(), Tz::UTC),
            Some(instant)
        );
    }

    #[test]
    fn test_named_zone_round_trip() {
        let tz = chrono_tz::America::Chicago;
        let instant = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();

        let local = to_store_local(&instant, tz);
        assert_eq!(local.to_string(), "2023-06-01 07:00:00");
        assert_eq!(from_store_local(local, tz), Some(instant));
        assert_eq!(
            to_store_datetime(&instant, tz).to_chrono().naive_utc(),
            local
        );
    }

    #[test]
    fn test_sub_millisecond_bound_rounds_up() {
        let whole = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        let fine = whole + chrono::Duration::microseconds(500);

        assert_eq!(
            to_store_datetime(&whole, Tz::UTC).timestamp_millis(),
            whole.timestamp_millis()
        );
        assert_eq!(
            to_store_datetime(&fine, Tz::UTC).timestamp_millis(),
            whole.timestamp_millis() + 1
        );
    }

    #[test]
    fn test_skipped_wall_clock() {
        // 02:30 does not exist in Chicago on 2023-03-12
        assert_eq!(from_store_local(naive(2, 30), chrono_tz::America::Chicago), None);
        assert!(from_store_local(naive(3, 30), chrono_tz::America::Chicago).is_some());
    }
}
