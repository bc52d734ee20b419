//! Date value generators.

use super::RowScope;
use crate::error::RuleError;
use chrono::{Datelike, Duration, NaiveDate};
use labgen_core::{Anchor, DateBound, Value};
use rand::Rng;

/// Resolve an anchor to a date. `Ok(None)` when the anchor field is null.
pub fn resolve_anchor(
    scope: &RowScope<'_>,
    anchor: &Anchor,
) -> Result<Option<NaiveDate>, RuleError> {
    match anchor {
        Anchor::AsOf => Ok(Some(scope.context.as_of)),
        Anchor::Period => scope
            .period
            .map(Some)
            .ok_or_else(|| RuleError::Other("row has no period".to_string())),
        Anchor::Field(reference) => {
            let value = scope.lookup(reference)?;
            match value {
                Value::Null => Ok(None),
                Value::Date(d) => Ok(Some(*d)),
                other => Err(RuleError::Other(format!(
                    "'{reference}' holds {} value, expected a date",
                    other.kind()
                ))),
            }
        }
    }
}

/// Add a signed number of days to a date.
pub fn shift(date: NaiveDate, days: i64) -> Result<NaiveDate, RuleError> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| RuleError::Other(format!("{date} shifted by {days} days is out of range")))
}

/// Resolve a bound. `Ok(None)` when its anchor is null.
pub fn resolve_bound(
    scope: &RowScope<'_>,
    bound: &DateBound,
) -> Result<Option<NaiveDate>, RuleError> {
    match resolve_anchor(scope, &bound.anchor)? {
        Some(date) => shift(date, bound.offset_days).map(Some),
        None => Ok(None),
    }
}

/// Uniform date in `[from, to]`; `from` itself when `to < from`.
pub fn generate_date_in<R: Rng>(rng: &mut R, from: NaiveDate, to: NaiveDate) -> NaiveDate {
    let span = (to - from).num_days();
    if span <= 0 {
        return from;
    }
    from + Duration::days(rng.random_range(0..=span))
}

/// Generate a date between two anchored bounds. Null when either anchor is null.
pub fn generate_date_between<R: Rng>(
    scope: &RowScope<'_>,
    rng: &mut R,
    from: &DateBound,
    to: &DateBound,
) -> Result<Value, RuleError> {
    let (Some(from), Some(to)) = (resolve_bound(scope, from)?, resolve_bound(scope, to)?) else {
        return Ok(Value::Null);
    };
    Ok(Value::Date(generate_date_in(rng, from, to)))
}

/// The `days` consecutive dates ending at `as_of`, oldest first.
pub fn daily_periods(as_of: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..i64::from(days))
        .rev()
        .filter_map(|back| as_of.checked_sub_signed(Duration::days(back)))
        .collect()
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// The `weeks` Monday week-starts ending with the week containing `as_of`, oldest first.
pub fn weekly_periods(as_of: NaiveDate, weeks: u32) -> Vec<NaiveDate> {
    let current = week_start(as_of);
    (0..i64::from(weeks))
        .rev()
        .filter_map(|back| current.checked_sub_signed(Duration::weeks(back)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::test_support::{context, scope};
    use chrono::Weekday;
    use labgen_core::{Catalogs, FieldRef, Row};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_between_stays_in_bounds() {
        let context = context();
        let catalogs = Catalogs::default();
        let mut parent = Row::new("customers", 0);
        parent.set_field("created_date", Value::Date(date(2024, 1, 15)));
        let row = Row::new("users", 0);
        let scope = scope(&context, &catalogs, &row, Some(&parent));
        let mut rng = StdRng::seed_from_u64(9);

        let from = DateBound::at(Anchor::Field(FieldRef::parent("created_date")));
        let to = DateBound::at(Anchor::AsOf);
        for _ in 0..200 {
            let value = generate_date_between(&scope, &mut rng, &from, &to).unwrap();
            let d = value.as_date().unwrap();
            assert!(d >= date(2024, 1, 15) && d <= context.as_of);
        }
    }

    #[test]
    fn test_inverted_bounds_yield_lower_bound() {
        let mut rng = StdRng::seed_from_u64(1);
        let from = date(2024, 7, 1);
        assert_eq!(generate_date_in(&mut rng, from, date(2024, 6, 1)), from);
    }

    #[test]
    fn test_offsets_apply_to_anchor() {
        let context = context();
        let catalogs = Catalogs::default();
        let row = Row::new("customers", 0);
        let scope = scope(&context, &catalogs, &row, None);

        let bound = DateBound::offset(Anchor::AsOf, -30);
        assert_eq!(resolve_bound(&scope, &bound).unwrap(), Some(date(2024, 5, 31)));
    }

    #[test]
    fn test_null_anchor_yields_null() {
        let context = context();
        let catalogs = Catalogs::default();
        let mut row = Row::new("leads", 0);
        row.set_field("mql_date", Value::Null);
        let scope = scope(&context, &catalogs, &row, None);
        let mut rng = StdRng::seed_from_u64(1);

        let from = DateBound::at(Anchor::Field(FieldRef::row("mql_date")));
        let to = DateBound::at(Anchor::AsOf);
        assert!(generate_date_between(&scope, &mut rng, &from, &to)
            .unwrap()
            .is_null());
    }

    #[test]
    fn test_non_date_anchor_rejected() {
        let context = context();
        let catalogs = Catalogs::default();
        let mut row = Row::new("t", 0);
        row.set_field("status", Value::text("Active"));
        let scope = scope(&context, &catalogs, &row, None);

        let anchor = Anchor::Field(FieldRef::row("status"));
        assert!(resolve_anchor(&scope, &anchor).is_err());
    }

    #[test]
    fn test_daily_periods() {
        let periods = daily_periods(date(2024, 6, 30), 90);
        assert_eq!(periods.len(), 90);
        assert_eq!(periods[0], date(2024, 4, 2));
        assert_eq!(periods[89], date(2024, 6, 30));
    }

    #[test]
    fn test_weekly_periods_are_mondays() {
        // 2024-06-30 is a Sunday; its week starts on 2024-06-24.
        let periods = weekly_periods(date(2024, 6, 30), 12);
        assert_eq!(periods.len(), 12);
        assert_eq!(periods[11], date(2024, 6, 24));
        assert_eq!(periods[0], date(2024, 4, 8));
        assert!(periods.iter().all(|d| d.weekday() == Weekday::Mon));
    }
}
