use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use log_sea::parser::{Record, parse_log};
use log_sea::timeutil::{
    TimeControlError, format_time_control, parse_time_control, reference_date,
};

fn dated_records() -> Vec<Record> {
    parse_log(
        "client",
        "[2021-11-12 06:53:11.230] start\n[2021-11-13 00:01:02] next day",
    )
}

fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, hh, mm, ss).unwrap()
}

#[test]
fn test_reference_date_is_midnight_of_first_dated_record() {
    let records = dated_records();
    assert_eq!(reference_date(&records), Some(at(2021, 11, 12, 0, 0, 0)));
    assert_eq!(reference_date(&[]), None);
}

#[test]
fn test_relative_end_adds_to_start() {
    let records = dated_records();
    let start = at(2021, 11, 12, 6, 0, 0);
    assert_eq!(
        parse_time_control("+5 m", &records, Some(start)),
        Ok(Some(start + TimeDelta::minutes(5)))
    );
    assert_eq!(
        parse_time_control("-2hours", &records, Some(start)),
        Ok(Some(start - TimeDelta::hours(2)))
    );
    assert_eq!(
        parse_time_control("+10 seconds", &records, Some(start)),
        Ok(Some(start + TimeDelta::seconds(10)))
    );
}

#[test]
fn test_relative_without_anchor_needs_start() {
    let records = dated_records();
    let err = parse_time_control("+5 m", &records, None).unwrap_err();
    assert_eq!(err, TimeControlError::NeedStart);
    assert_eq!(err.to_string(), "need start for +N relative times");
}

#[test]
fn test_full_date_is_taken_literally() {
    assert_eq!(
        parse_time_control("2021-11-12 06:53:11.230", &[], None),
        Ok(Some(at(2021, 11, 12, 6, 53, 11) + TimeDelta::milliseconds(230)))
    );
}

#[test]
fn test_clock_time_uses_reference_date_and_day_offset() {
    let records = dated_records();
    assert_eq!(
        parse_time_control("00:01:02 (+1day)", &records, None),
        Ok(Some(at(2021, 11, 13, 0, 1, 2)))
    );
    assert_eq!(
        parse_time_control("23:00:00 (-1 days)", &records, None),
        Ok(Some(at(2021, 11, 11, 23, 0, 0)))
    );
}

#[test]
fn test_malformed_controls_name_the_expected_form() {
    let records = dated_records();
    let cases = [
        ("2021-11-12", TimeControlError::ExpectedDateTime),
        ("6:53", TimeControlError::ExpectedClock),
        ("06:53:11 tomorrow", TimeControlError::ExpectedDayOffset),
        ("+5 fortnights", TimeControlError::ExpectedRelative),
        ("soon", TimeControlError::Unrecognized),
        ("25:00:00", TimeControlError::InvalidDateTime),
    ];
    for (text, expected) in cases {
        let relative_to = Some(at(2021, 11, 12, 0, 0, 0));
        assert_eq!(
            parse_time_control(text, &records, relative_to),
            Err(expected),
            "control text {text:?}"
        );
    }
}

#[test]
fn test_clock_time_without_any_timed_records() {
    let records = parse_log("client", "[x] nothing timed");
    assert_eq!(
        parse_time_control("06:00:00", &records, None),
        Err(TimeControlError::NoReferenceDate)
    );
    assert_eq!(parse_time_control("", &records, None), Ok(None));
}

#[test]
fn test_format_then_parse_round_trips() {
    let records = dated_records();
    for text in [
        "06:53:11.230",
        "06:53:11",
        "00:01:02 (+1day)",
        "23:59:59.001 (+3days)",
        "12:00:00 (-1day)",
    ] {
        let time = parse_time_control(text, &records, None)
            .unwrap()
            .unwrap();
        assert_eq!(format_time_control(&time, &records), text);
    }
}
