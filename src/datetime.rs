//! Excel serial-date conversion.
//!
//! Excel stores dates as fractional day counts anchored at 1899-12-31, and
//! inherits the Lotus 1-2-3 defect of treating 1900 as a leap year: serial 60
//! names the non-existent 1900-02-29. Encoding therefore skips 60 for real
//! dates from 1900-03-01 onward, and decoding folds it back.

use crate::error::{Error, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// The serial assigned to the phantom 1900-02-29.
const LEAP_BUG_SERIAL: i64 = 60;

const SECONDS_PER_DAY: f64 = 86_400.0;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 31).expect("valid epoch date")
}

/// Convert a date-time to its Excel serial number.
///
/// The date must not precede 1900-01-01.
pub fn to_excel_date(datetime: &NaiveDateTime) -> Result<f64> {
    let mut days = (datetime.date() - epoch()).num_days();
    if days < 1 {
        return Err(Error::InvalidArgument(format!(
            "date precedes the Excel epoch: {}",
            datetime.date()
        )));
    }
    if days >= LEAP_BUG_SERIAL {
        days += 1;
    }

    let seconds = datetime.num_seconds_from_midnight() as f64;
    Ok(days as f64 + seconds / SECONDS_PER_DAY)
}

/// Convert a date (midnight time-of-day) to its Excel serial number.
pub fn date_to_excel(date: &NaiveDate) -> Result<f64> {
    to_excel_date(&date.and_time(NaiveTime::MIN))
}

/// Convert an Excel serial number back to a date-time.
///
/// The time-of-day fraction is rounded to the nearest second. Serial 60, the
/// phantom 1900-02-29, decodes as 1900-02-28 rather than failing.
pub fn from_excel_date(serial: f64) -> Result<NaiveDateTime> {
    if !serial.is_finite() || serial < 1.0 {
        return Err(Error::InvalidArgument(format!(
            "serial date out of range: {serial}"
        )));
    }

    let mut days = serial.trunc() as i64;
    let mut seconds = ((serial - days as f64) * SECONDS_PER_DAY).round() as i64;
    if seconds >= 86_400 {
        days += 1;
        seconds = 0;
    }
    if days >= LEAP_BUG_SERIAL {
        days -= 1;
    }

    let date = epoch()
        .checked_add_signed(Duration::days(days))
        .ok_or_else(|| Error::InvalidArgument(format!("serial date out of range: {serial}")))?;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds as u32, 0)
        .ok_or_else(|| Error::InvalidArgument(format!("serial date out of range: {serial}")))?;

    Ok(date.and_time(time))
}

/// Whether `serial` lies in the range Excel accepts as a date
/// (1900-01-01 through 2099-12-31).
pub fn is_valid_excel_date(serial: f64) -> bool {
    (1.0..=73_050.0).contains(&serial)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_epoch_neighbourhood() {
        assert_eq!(to_excel_date(&date(1900, 1, 1)).unwrap(), 1.0);
        assert_eq!(to_excel_date(&date(1900, 2, 28)).unwrap(), 59.0);
        // serial 60 is skipped for real dates
        assert_eq!(to_excel_date(&date(1900, 3, 1)).unwrap(), 61.0);
    }

    #[test]
    fn test_phantom_leap_day_decodes() {
        let decoded = from_excel_date(60.0).unwrap();
        assert_eq!(decoded.date(), NaiveDate::from_ymd_opt(1900, 2, 28).unwrap());
    }

    #[test]
    fn test_time_fraction() {
        let dt = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let serial = to_excel_date(&dt).unwrap();
        assert!((serial.fract() - 0.5).abs() < 1e-9);
        assert_eq!(from_excel_date(serial).unwrap(), dt);
    }

    #[test]
    fn test_roundtrip_modern_dates() {
        for &(y, m, d, h, mi, s) in &[
            (1900, 3, 1, 0, 0, 0),
            (1999, 12, 31, 23, 59, 59),
            (2024, 2, 29, 6, 30, 15),
            (2099, 12, 31, 0, 0, 0),
        ] {
            let dt = NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, mi, s)
                .unwrap();
            let serial = to_excel_date(&dt).unwrap();
            assert_eq!(from_excel_date(serial).unwrap(), dt, "{dt}");
        }
    }

    #[test]
    fn test_roundtrip_pre_march_1900() {
        for d in 1..=28 {
            let dt = date(1900, 2, d);
            assert_eq!(from_excel_date(to_excel_date(&dt).unwrap()).unwrap(), dt);
        }
    }

    #[test]
    fn test_rejects_pre_epoch() {
        assert!(to_excel_date(&date(1899, 12, 31)).is_err());
        assert!(from_excel_date(0.5).is_err());
    }

    #[test]
    fn test_validity_window() {
        assert!(is_valid_excel_date(1.0));
        assert!(is_valid_excel_date(73_050.0));
        assert!(!is_valid_excel_date(0.99));
        assert!(!is_valid_excel_date(73_050.5));
    }
}
