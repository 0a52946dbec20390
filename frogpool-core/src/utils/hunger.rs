use crate::config::MAX_HUNGER_LEVEL;

/// Whole hunger units that elapsed between `last_fed` and `now`.
///
/// One unit drains per full `unit`; partial units carry over to the next
/// tick because only `decrement * unit` is charged against `last_fed`.
pub fn hunger_decrement(
    last_fed: time::PrimitiveDateTime,
    now: time::PrimitiveDateTime,
    unit: std::time::Duration,
) -> i32 {
    let unit_ms = unit.as_millis() as i128;
    if unit_ms == 0 {
        return 0;
    }
    let elapsed_ms = (now - last_fed).whole_milliseconds();
    if elapsed_ms <= 0 {
        return 0;
    }
    (elapsed_ms / unit_ms).min(i32::MAX as i128) as i32
}

/// Clamp a hunger level to `0..=MAX_HUNGER_LEVEL`.
pub fn clamp_hunger(level: i64) -> i32 {
    level.clamp(0, MAX_HUNGER_LEVEL as i64) as i32
}

/// Timestamp the frog counts as fed at after `decrement` units were charged.
pub fn advance_last_fed(
    last_fed: time::PrimitiveDateTime,
    decrement: i32,
    unit: std::time::Duration,
) -> time::PrimitiveDateTime {
    let charged = time::Duration::try_from(unit).unwrap_or(time::Duration::ZERO) * decrement;
    last_fed.saturating_add(charged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const UNIT: std::time::Duration = std::time::Duration::from_secs(3);

    #[test]
    fn test_decrement_counts_whole_units() {
        let fed = datetime!(2025-01-01 00:00:00);
        assert_eq!(hunger_decrement(fed, datetime!(2025-01-01 00:00:02), UNIT), 0);
        assert_eq!(hunger_decrement(fed, datetime!(2025-01-01 00:00:03), UNIT), 1);
        assert_eq!(hunger_decrement(fed, datetime!(2025-01-01 00:00:08), UNIT), 2);
        assert_eq!(hunger_decrement(fed, datetime!(2025-01-01 00:05:00), UNIT), 100);
    }

    #[test]
    fn test_decrement_ignores_clock_skew() {
        let fed = datetime!(2025-01-01 00:00:10);
        assert_eq!(hunger_decrement(fed, datetime!(2025-01-01 00:00:00), UNIT), 0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_hunger(-4), 0);
        assert_eq!(clamp_hunger(57), 57);
        assert_eq!(clamp_hunger(250), MAX_HUNGER_LEVEL);
    }

    #[test]
    fn test_advance_keeps_remainder() {
        let fed = datetime!(2025-01-01 00:00:00);
        let now = datetime!(2025-01-01 00:00:08);
        let dec = hunger_decrement(fed, now, UNIT);
        let advanced = advance_last_fed(fed, dec, UNIT);
        assert_eq!(advanced, datetime!(2025-01-01 00:00:06));
        assert_eq!(hunger_decrement(advanced, datetime!(2025-01-01 00:00:09), UNIT), 1);
    }
}
