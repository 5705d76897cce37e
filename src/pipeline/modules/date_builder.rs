//! Date builder: turns date text into a structured date.
//!
//! Accepted text (case-insensitive): `today`, `tomorrow`, `yesterday`, `now`,
//! `N day(s)`, `N year(s)` relative to today, or one of [`DATE_FORMATS`].

use crate::pipeline::conf::{Conf, FieldSpec};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::record::Record;
use crate::pipeline::stage::RecordTransform;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use serde_json::{json, Value};

const DATE: FieldSpec = FieldSpec::text("DATE");
const ASSIGN: FieldSpec = FieldSpec::text("assign").or("date");

/// Absolute formats, tried in order.
pub const DATE_FORMATS: [&str; 5] = [
    "%m-%d-%Y",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%y",
    "%Y-%m-%dt%H:%M:%Sz",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DateBuilder;

fn out_of_range(text: &str) -> PipelineError {
    PipelineError::Module(format!("Date out of range: {text}"))
}

fn shift_days(date: NaiveDateTime, days: i64, text: &str) -> PipelineResult<NaiveDateTime> {
    Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or_else(|| out_of_range(text))
}

fn relative(text: &str, now: NaiveDateTime) -> Option<PipelineResult<NaiveDateTime>> {
    let today = now.date().and_hms_opt(0, 0, 0)?;
    match text {
        "today" => return Some(Ok(today)),
        "tomorrow" => return Some(shift_days(today, 1, text)),
        "yesterday" => return Some(shift_days(today, -1, text)),
        "now" => return Some(Ok(now)),
        _ => {}
    }

    let (count, unit) = text.split_once(' ')?;
    let count = match count.parse::<i64>() {
        Ok(count) => count,
        Err(_) => {
            return Some(Err(PipelineError::Module(format!(
                "Unrecognized date string: {text}"
            ))))
        }
    };

    match unit {
        "day" | "days" => Some(shift_days(today, count, text)),
        "year" | "years" => {
            let shifted = i32::try_from(count)
                .ok()
                .and_then(|count| today.year().checked_add(count))
                .and_then(|year| today.with_year(year));
            Some(shifted.ok_or_else(|| out_of_range(text)))
        }
        _ => None,
    }
}

fn absolute(text: &str) -> Option<NaiveDateTime> {
    DATE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(text, format).ok().or_else(|| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
    })
}

/// Parse date text relative to `now`.
pub fn parse_date(text: &str, now: NaiveDateTime) -> PipelineResult<NaiveDateTime> {
    let text = text.trim().to_lowercase();
    if let Some(result) = relative(&text, now) {
        return result;
    }
    absolute(&text)
        .ok_or_else(|| PipelineError::Module(format!("Unrecognized date string: {text}")))
}

/// Structured form of a date, in the shape of a time tuple.
pub fn date_value(date: NaiveDateTime) -> Value {
    json!({
        "year": date.year(),
        "month": date.month(),
        "day": date.day(),
        "hour": date.hour(),
        "minute": date.minute(),
        "second": date.second(),
        "weekday": date.weekday().num_days_from_monday(),
        "yearday": date.ordinal(),
        "utime": date.and_utc().timestamp(),
        "iso": date.format("%Y-%m-%dT%H:%M:%S").to_string(),
    })
}

impl RecordTransform for DateBuilder {
    fn transform(&self, conf: &Conf, mut record: Record) -> PipelineResult<Record> {
        let text = conf.text(&DATE, Some(&record))?;
        let date = parse_date(&text, Local::now().naive_local())?;
        let assign = conf.text(&ASSIGN, None)?;
        record.insert(assign, date_value(date));
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::modules::test_support::{args, records};
    use crate::pipeline::stage::{single, MapFactory, StageFactory};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2014, 12, 2)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    fn ymd(date: NaiveDateTime) -> (i32, u32, u32) {
        (date.year(), date.month(), date.day())
    }

    #[test]
    fn test_keywords() {
        assert_eq!(ymd(parse_date("Tomorrow", now()).unwrap()), (2014, 12, 3));
        assert_eq!(ymd(parse_date("yesterday", now()).unwrap()), (2014, 12, 1));
        assert_eq!(parse_date("now", now()).unwrap(), now());
        assert_eq!(parse_date("today", now()).unwrap().hour(), 0);
    }

    #[test]
    fn test_relative_counts() {
        assert_eq!(ymd(parse_date("3 days", now()).unwrap()), (2014, 12, 5));
        assert_eq!(ymd(parse_date("-1 day", now()).unwrap()), (2014, 12, 1));
        assert_eq!(ymd(parse_date("2 years", now()).unwrap()), (2016, 12, 2));
    }

    #[test]
    fn test_formats() {
        assert_eq!(ymd(parse_date("12/2/2014", now()).unwrap()), (2014, 12, 2));
        assert_eq!(ymd(parse_date("12/02/14", now()).unwrap()), (2014, 12, 2));
        let stamp = parse_date("2014-12-02T10:11:12Z", now()).unwrap();
        assert_eq!((stamp.hour(), stamp.minute()), (10, 11));
    }

    #[test]
    fn test_relative_out_of_range() {
        for text in ["100000000 days", "-100000000 days", "9223372036854775807 days"] {
            let err = parse_date(text, now()).unwrap_err();
            assert!(err.to_string().contains("Date out of range"), "{text}");
        }
        assert!(parse_date("9999999 years", now()).is_err());
        assert!(parse_date("2147483647 years", now()).is_err());
    }

    #[test]
    fn test_out_of_range_is_record_error() {
        let conf = Conf::from_value(&serde_json::json!({"DATE": {"value": "100000000 days"}}));
        let result = DateBuilder.transform(&conf, Record::new());
        assert!(matches!(result, Err(PipelineError::Module(_))));
    }

    #[test]
    fn test_unrecognized() {
        let err = parse_date("whenever", now()).unwrap_err();
        assert!(err.to_string().contains("Unrecognized date string"));
    }

    #[test]
    fn test_item_bound_date() {
        let input = records(vec![serde_json::json!({"when": "12/25/2014"})]);
        let conf = serde_json::json!({"DATE": {"subkey": "when"}, "assign": "xmas"});
        let stage = single(MapFactory::new(DateBuilder).build(args(input, conf)).unwrap()).unwrap();
        let out: Vec<_> = stage.map(Result::unwrap).collect();
        assert_eq!(out[0]["xmas"]["day"], serde_json::json!(25));
        assert_eq!(out[0]["xmas"]["weekday"], serde_json::json!(3));
    }
}
