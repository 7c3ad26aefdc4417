//! Calendar boundary math for billing cycles.
//!
//! All functions here are pure. A period boundary is crossed between two
//! evaluations at t1 < t2 iff `boundary(.., t1) != boundary(.., t2)`; the
//! state machine never needs the "next" boundary, only the latest one at or
//! before the instant it is handed.

use time::{Date, Duration, Month, OffsetDateTime, Time, UtcOffset};

use crate::domain::{Cycle, CycleOffset};

/// Latest period start at or before `instant` for the given cycle, shifted
/// forward by `offset`. If the shifted calendar-unit start would land after
/// `instant`, the previous unit's shifted start applies instead.
///
/// Returns `None` for `Cycle::None`, which has no boundaries at all.
pub fn boundary(cycle: Cycle, offset: CycleOffset, instant: OffsetDateTime) -> Option<OffsetDateTime> {
    if cycle == Cycle::None {
        return None;
    }

    let base = unit_start(cycle, instant);
    let shifted = base + offset.as_duration();
    let start = if shifted <= instant {
        shifted
    } else {
        previous_unit_start(cycle, base) + offset.as_duration()
    };
    Some(start)
}

fn unit_start(cycle: Cycle, t: OffsetDateTime) -> OffsetDateTime {
    let tz = t.offset();
    let date = t.date();
    match cycle {
        Cycle::None => unreachable!("Cycle::None is handled by boundary()"),
        Cycle::QuarterHourly => {
            let minute = t.minute() - t.minute() % 15;
            let tod = Time::from_hms(t.hour(), minute, 0).expect("quarter-hour time is valid");
            date.with_time(tod).assume_offset(tz)
        }
        Cycle::Hourly => {
            let tod = Time::from_hms(t.hour(), 0, 0).expect("top of hour is valid");
            date.with_time(tod).assume_offset(tz)
        }
        Cycle::Daily => at_midnight(date, tz),
        Cycle::Weekly => {
            let monday = date - Duration::days(i64::from(date.weekday().number_days_from_monday()));
            at_midnight(monday, tz)
        }
        Cycle::Monthly => at_midnight(first_of_month(date.year(), u8::from(date.month())), tz),
        // Multi-month cycles align on months counted from January: bimonthly
        // starts fall on Jan/Mar/May/Jul/Sep/Nov, quarterly on Jan/Apr/Jul/Oct,
        // biannual on Jan/Jul.
        Cycle::Bimonthly => at_midnight(aligned_month_start(date, 2), tz),
        Cycle::Quarterly => at_midnight(aligned_month_start(date, 3), tz),
        Cycle::Biannually => at_midnight(aligned_month_start(date, 6), tz),
        Cycle::Yearly => at_midnight(first_of_month(date.year(), 1), tz),
    }
}

fn previous_unit_start(cycle: Cycle, base: OffsetDateTime) -> OffsetDateTime {
    match cycle {
        Cycle::None => unreachable!("Cycle::None is handled by boundary()"),
        Cycle::QuarterHourly => base - Duration::minutes(15),
        Cycle::Hourly => base - Duration::hours(1),
        Cycle::Daily => base - Duration::days(1),
        Cycle::Weekly => base - Duration::weeks(1),
        Cycle::Monthly => months_back(base, 1),
        Cycle::Bimonthly => months_back(base, 2),
        Cycle::Quarterly => months_back(base, 3),
        Cycle::Biannually => months_back(base, 6),
        Cycle::Yearly => months_back(base, 12),
    }
}

fn at_midnight(date: Date, tz: UtcOffset) -> OffsetDateTime {
    date.with_time(Time::MIDNIGHT).assume_offset(tz)
}

fn aligned_month_start(date: Date, span: u8) -> Date {
    let month = u8::from(date.month());
    first_of_month(date.year(), month - (month - 1) % span)
}

fn first_of_month(year: i32, month: u8) -> Date {
    Date::from_calendar_date(year, Month::try_from(month).expect("month in 1..=12"), 1)
        .expect("day 1 exists in every month")
}

fn months_back(start: OffsetDateTime, months: i32) -> OffsetDateTime {
    let date = start.date();
    let index = date.year() * 12 + i32::from(u8::from(date.month())) - 1 - months;
    let year = index.div_euclid(12);
    let month = (index.rem_euclid(12) + 1) as u8;
    at_midnight(first_of_month(year, month), start.offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn plain(cycle: Cycle, t: OffsetDateTime) -> OffsetDateTime {
        boundary(cycle, CycleOffset::default(), t).expect("cycle has boundaries")
    }

    fn crossed(cycle: Cycle, offset: CycleOffset, t1: OffsetDateTime, t2: OffsetDateTime) -> bool {
        boundary(cycle, offset, t1) != boundary(cycle, offset, t2)
    }

    #[test]
    fn none_has_no_boundary() {
        assert_eq!(
            boundary(Cycle::None, CycleOffset::default(), datetime!(2017-12-31 23:59 UTC)),
            None
        );
    }

    #[test]
    fn quarter_hourly_snaps_to_quarter_starts() {
        assert_eq!(
            plain(Cycle::QuarterHourly, datetime!(2017-12-31 23:59 UTC)),
            datetime!(2017-12-31 23:45 UTC)
        );
        assert_eq!(
            plain(Cycle::QuarterHourly, datetime!(2017-12-31 23:14 UTC)),
            datetime!(2017-12-31 23:00 UTC)
        );
        assert_eq!(
            plain(Cycle::QuarterHourly, datetime!(2017-12-31 23:29 UTC)),
            datetime!(2017-12-31 23:15 UTC)
        );
        assert_eq!(
            plain(Cycle::QuarterHourly, datetime!(2017-12-31 23:44 UTC)),
            datetime!(2017-12-31 23:30 UTC)
        );
    }

    #[test]
    fn quarter_hourly_crosses_each_quarter() {
        let offset = CycleOffset::default();
        for start in [
            datetime!(2017-12-31 23:59 UTC),
            datetime!(2017-12-31 23:14 UTC),
            datetime!(2017-12-31 23:29 UTC),
            datetime!(2017-12-31 23:44 UTC),
        ] {
            assert!(crossed(Cycle::QuarterHourly, offset, start, start + Duration::minutes(1)));
            assert!(!crossed(Cycle::QuarterHourly, offset, start, start + Duration::seconds(30)));
        }
    }

    #[test]
    fn hourly_boundary() {
        assert_eq!(
            plain(Cycle::Hourly, datetime!(2017-12-31 23:59 UTC)),
            datetime!(2017-12-31 23:00 UTC)
        );
        assert!(crossed(
            Cycle::Hourly,
            CycleOffset::default(),
            datetime!(2017-12-31 23:59 UTC),
            datetime!(2018-01-01 00:00 UTC)
        ));
    }

    #[test]
    fn daily_boundary() {
        assert_eq!(
            plain(Cycle::Daily, datetime!(2017-12-31 23:59 UTC)),
            datetime!(2017-12-31 00:00 UTC)
        );
        assert!(crossed(
            Cycle::Daily,
            CycleOffset::default(),
            datetime!(2017-12-31 23:59 UTC),
            datetime!(2018-01-01 00:00 UTC)
        ));
    }

    #[test]
    fn weekly_boundary_is_iso_monday() {
        // 2017-12-31 was a Sunday; the ISO week started Monday the 25th.
        assert_eq!(
            plain(Cycle::Weekly, datetime!(2017-12-31 23:59 UTC)),
            datetime!(2017-12-25 00:00 UTC)
        );
        assert_eq!(
            plain(Cycle::Weekly, datetime!(2018-01-01 00:00 UTC)),
            datetime!(2018-01-01 00:00 UTC)
        );
    }

    #[test]
    fn monthly_boundary() {
        assert_eq!(
            plain(Cycle::Monthly, datetime!(2017-12-31 23:59 UTC)),
            datetime!(2017-12-01 00:00 UTC)
        );
        assert!(crossed(
            Cycle::Monthly,
            CycleOffset::default(),
            datetime!(2017-12-31 23:59 UTC),
            datetime!(2018-01-01 00:00 UTC)
        ));
    }

    #[test]
    fn bimonthly_resets_on_even_months_only() {
        // December belongs to the Nov/Dec pair, so Jan 1 starts a new pair.
        assert_eq!(
            plain(Cycle::Bimonthly, datetime!(2017-12-31 23:59 UTC)),
            datetime!(2017-11-01 00:00 UTC)
        );
        assert!(crossed(
            Cycle::Bimonthly,
            CycleOffset::default(),
            datetime!(2017-12-31 23:59 UTC),
            datetime!(2018-01-01 00:00 UTC)
        ));
        // February is inside the Jan/Feb pair: no crossing.
        assert!(!crossed(
            Cycle::Bimonthly,
            CycleOffset::default(),
            datetime!(2018-01-01 23:59 UTC),
            datetime!(2018-02-01 00:00 UTC)
        ));
    }

    #[test]
    fn quarterly_boundary() {
        assert_eq!(
            plain(Cycle::Quarterly, datetime!(2017-03-31 23:59 UTC)),
            datetime!(2017-01-01 00:00 UTC)
        );
        assert!(crossed(
            Cycle::Quarterly,
            CycleOffset::default(),
            datetime!(2017-03-31 23:59 UTC),
            datetime!(2017-04-01 00:00 UTC)
        ));
        assert!(!crossed(
            Cycle::Quarterly,
            CycleOffset::default(),
            datetime!(2017-04-30 23:59 UTC),
            datetime!(2017-05-01 00:00 UTC)
        ));
    }

    #[test]
    fn biannual_boundary_january_and_july() {
        assert!(crossed(
            Cycle::Biannually,
            CycleOffset::default(),
            datetime!(2017-12-31 23:59 UTC),
            datetime!(2018-01-01 00:00 UTC)
        ));
        assert!(crossed(
            Cycle::Biannually,
            CycleOffset::default(),
            datetime!(2018-06-30 23:59 UTC),
            datetime!(2018-07-01 00:00 UTC)
        ));
        assert!(!crossed(
            Cycle::Biannually,
            CycleOffset::default(),
            datetime!(2018-01-01 23:59 UTC),
            datetime!(2018-01-02 00:00 UTC)
        ));
        assert!(!crossed(
            Cycle::Biannually,
            CycleOffset::default(),
            datetime!(2018-07-01 23:59 UTC),
            datetime!(2018-07-02 00:00 UTC)
        ));
    }

    #[test]
    fn yearly_boundary() {
        assert!(crossed(
            Cycle::Yearly,
            CycleOffset::default(),
            datetime!(2017-12-31 23:59 UTC),
            datetime!(2018-01-01 00:00 UTC)
        ));
        assert!(!crossed(
            Cycle::Yearly,
            CycleOffset::default(),
            datetime!(2018-01-01 23:59 UTC),
            datetime!(2018-01-02 00:00 UTC)
        ));
    }

    #[test]
    fn yearly_offset_shifts_the_boundary_forward() {
        let offset = CycleOffset { days: 1, seconds: 600 };
        // One minute before the shifted boundary we are still in the old period.
        assert_eq!(
            boundary(Cycle::Yearly, offset, datetime!(2018-01-02 00:09 UTC)),
            Some(datetime!(2017-01-02 00:10 UTC))
        );
        assert_eq!(
            boundary(Cycle::Yearly, offset, datetime!(2018-01-02 00:10 UTC)),
            Some(datetime!(2018-01-02 00:10 UTC))
        );
        assert!(crossed(
            Cycle::Yearly,
            offset,
            datetime!(2018-01-02 00:09 UTC),
            datetime!(2018-01-02 00:10 UTC)
        ));
    }

    #[test]
    fn yearly_offset_not_yet_reached() {
        let offset = CycleOffset { days: 31, seconds: 0 };
        assert_eq!(
            boundary(Cycle::Yearly, offset, datetime!(2018-01-30 23:59 UTC)),
            Some(datetime!(2017-02-01 00:00 UTC))
        );
        assert!(!crossed(
            Cycle::Yearly,
            offset,
            datetime!(2018-01-30 23:59 UTC),
            datetime!(2018-01-31 00:00 UTC)
        ));
    }

    #[test]
    fn daily_offset_sub_day_remainder() {
        let offset = CycleOffset { days: 0, seconds: 3600 };
        assert_eq!(
            boundary(Cycle::Daily, offset, datetime!(2018-03-05 00:30 UTC)),
            Some(datetime!(2018-03-04 01:00 UTC))
        );
        assert_eq!(
            boundary(Cycle::Daily, offset, datetime!(2018-03-05 01:00 UTC)),
            Some(datetime!(2018-03-05 01:00 UTC))
        );
    }

    #[test]
    fn months_back_wraps_the_year() {
        assert_eq!(
            months_back(datetime!(2018-01-01 00:00 UTC), 2),
            datetime!(2017-11-01 00:00 UTC)
        );
        assert_eq!(
            months_back(datetime!(2018-01-01 00:00 UTC), 12),
            datetime!(2017-01-01 00:00 UTC)
        );
    }
}
