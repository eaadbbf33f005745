//! Deadline calculator.
//!
//! Pure function from an [`EffectiveConfig`] and a clock reading to a
//! [`SwitchStatus`]. Remaining time is rounded up, so any time left at all
//! reports at least one unit and "0 remaining" always means dead.
//!
//! Inputs outside the documented domain are handled without panicking:
//! a protocol length of zero or less puts the deadline at the last check-in,
//! and a last check-in in the future is treated as a check-in at `now`.

use serde::{Deserialize, Serialize};

use super::resolver::EffectiveConfig;
use crate::clock::{DAY_MS, HOUR_MS};

/// Derived countdown. Recomputed on every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchStatus {
    pub days_remaining: u64,
    /// Only non-zero in 24h mode.
    pub hours_remaining: u64,
    pub is_24h_mode: bool,
    pub is_dead: bool,
}

/// Coarse state of the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchPhase {
    AliveMultiDay,
    Alive24h,
    Dead,
}

impl SwitchStatus {
    /// The status of an expired switch in the given mode.
    pub fn dead(is_24h_mode: bool) -> Self {
        Self {
            days_remaining: 0,
            hours_remaining: 0,
            is_24h_mode,
            is_dead: true,
        }
    }

    pub fn phase(&self) -> SwitchPhase {
        if self.is_dead {
            SwitchPhase::Dead
        } else if self.is_24h_mode {
            SwitchPhase::Alive24h
        } else {
            SwitchPhase::AliveMultiDay
        }
    }
}

/// Absolute deadline in epoch milliseconds.
pub fn deadline_ms(config: &EffectiveConfig, now_ms: i64) -> i64 {
    let last = config.last_check_in_ms.min(now_ms);
    let window = config.protocol_length_days.max(0).saturating_mul(DAY_MS);
    last.saturating_add(window)
}

/// Evaluate the switch at `now_ms`.
pub fn evaluate(config: &EffectiveConfig, now_ms: i64) -> SwitchStatus {
    let diff = deadline_ms(config, now_ms).saturating_sub(now_ms);
    let is_24h_mode = config.protocol_length_days == 1;
    let is_dead = diff <= 0;

    if is_24h_mode {
        SwitchStatus {
            days_remaining: if is_dead { 0 } else { 1 },
            hours_remaining: ceil_units(diff, HOUR_MS),
            is_24h_mode,
            is_dead,
        }
    } else {
        SwitchStatus {
            days_remaining: ceil_units(diff, DAY_MS),
            hours_remaining: 0,
            is_24h_mode,
            is_dead,
        }
    }
}

/// `max(0, ceil(diff / unit))`.
fn ceil_units(diff: i64, unit: i64) -> u64 {
    if diff <= 0 {
        0
    } else {
        ((diff - 1) / unit + 1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NOW: i64 = 1_700_000_000_000;

    fn config(days: i64, last_check_in_ms: i64) -> EffectiveConfig {
        EffectiveConfig {
            protocol_length_days: days,
            last_check_in_ms,
        }
    }

    #[test]
    fn one_day_protocol_fresh_check_in_is_24_hours() {
        let status = evaluate(&config(1, NOW), NOW);
        assert_eq!(
            status,
            SwitchStatus {
                days_remaining: 1,
                hours_remaining: 24,
                is_24h_mode: true,
                is_dead: false,
            }
        );
        assert_eq!(status.phase(), SwitchPhase::Alive24h);
    }

    #[test]
    fn seven_days_with_half_a_day_left_rounds_up() {
        let last = NOW - 6 * DAY_MS - DAY_MS / 2;
        let status = evaluate(&config(7, last), NOW);
        assert_eq!(status.days_remaining, 1);
        assert_eq!(status.hours_remaining, 0);
        assert!(!status.is_dead);
        assert_eq!(status.phase(), SwitchPhase::AliveMultiDay);
    }

    #[test]
    fn one_day_with_an_hour_left() {
        let status = evaluate(&config(1, NOW - 23 * HOUR_MS), NOW);
        assert_eq!(status.hours_remaining, 1);
        assert_eq!(status.days_remaining, 1);
        assert!(!status.is_dead);
    }

    #[test]
    fn one_millisecond_left_still_reports_a_unit() {
        let cfg = config(30, NOW);
        let status = evaluate(&cfg, deadline_ms(&cfg, NOW) - 1);
        assert_eq!(status.days_remaining, 1);
        assert!(!status.is_dead);

        let cfg = config(1, NOW);
        let status = evaluate(&cfg, deadline_ms(&cfg, NOW) - 1);
        assert_eq!(status.hours_remaining, 1);
        assert_eq!(status.days_remaining, 1);
    }

    #[test]
    fn exactly_at_deadline_is_dead() {
        for days in [1, 7, 30] {
            let cfg = config(days, NOW);
            let status = evaluate(&cfg, NOW + days * DAY_MS);
            assert!(status.is_dead, "days={days}");
            assert_eq!(status.days_remaining, 0);
            assert_eq!(status.hours_remaining, 0);
            assert_eq!(status.phase(), SwitchPhase::Dead);
        }
    }

    #[test]
    fn zero_length_protocol_is_dead_immediately() {
        let status = evaluate(&config(0, NOW), NOW);
        assert!(status.is_dead);
        assert!(!status.is_24h_mode);

        let status = evaluate(&config(-3, NOW), NOW + 10);
        assert_eq!(status, SwitchStatus::dead(false));
    }

    #[test]
    fn future_check_in_is_clamped_to_now() {
        let status = evaluate(&config(7, NOW + 10 * DAY_MS), NOW);
        assert_eq!(status.days_remaining, 7);
        assert!(!status.is_dead);
    }

    #[test]
    fn extreme_inputs_do_not_overflow() {
        let status = evaluate(&config(i64::MAX, i64::MAX), i64::MAX);
        assert!(status.is_dead);

        let status = evaluate(&config(i64::MAX, 0), 0);
        assert!(!status.is_dead);
        assert!(status.days_remaining > 0);

        let status = evaluate(&config(7, i64::MIN), i64::MAX);
        assert!(status.is_dead);
    }

    proptest! {
        #[test]
        fn fresh_multi_day_check_in_reports_full_length(
            days in 2i64..10_000,
            now in 0i64..4_000_000_000_000,
        ) {
            let status = evaluate(&config(days, now), now);
            prop_assert!(!status.is_dead);
            prop_assert!(!status.is_24h_mode);
            prop_assert_eq!(status.days_remaining, days as u64);
            prop_assert_eq!(status.hours_remaining, 0);
        }

        #[test]
        fn at_or_past_deadline_is_dead(
            days in 1i64..10_000,
            last in 0i64..4_000_000_000_000,
            past in 0i64..1_000_000,
        ) {
            let cfg = config(days, last);
            let deadline = last + days * DAY_MS;
            let status = evaluate(&cfg, deadline + past);
            prop_assert!(status.is_dead);
            prop_assert_eq!(status.days_remaining, 0);
            prop_assert_eq!(status.hours_remaining, 0);
        }

        #[test]
        fn evaluation_is_idempotent(
            days in -5i64..400,
            last in 0i64..4_000_000_000_000,
            now in 0i64..4_000_000_000_000,
        ) {
            let cfg = config(days, last);
            prop_assert_eq!(evaluate(&cfg, now), evaluate(&cfg, now));
        }

        #[test]
        fn mode_invariants_hold(
            days in 1i64..400,
            last in 0i64..4_000_000_000_000,
            now in 0i64..4_000_000_000_000,
        ) {
            let status = evaluate(&config(days, last), now);
            if status.is_24h_mode {
                prop_assert_eq!(status.days_remaining, if status.is_dead { 0 } else { 1 });
                prop_assert!(status.hours_remaining <= 24);
            } else {
                prop_assert_eq!(status.hours_remaining, 0);
                prop_assert!(status.days_remaining <= days as u64);
            }
            prop_assert_eq!(status.is_dead, status.days_remaining == 0);
        }
    }
}
