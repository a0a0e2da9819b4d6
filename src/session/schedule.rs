//! Pure scheduling math for proactive refresh.
//!
//! DESIGN
//! ======
//! Every trigger path (bootstrap, refresh outcome, timer fire, network
//! reconciliation) funnels through [`plan_refresh`], which funnels through
//! [`compute_next_delay`]. Nothing here touches a timer or the clock; the
//! manager passes `now` in and arms whatever plan comes back.
//!
//! TRADE-OFFS
//! ==========
//! A delay longer than the check interval is not armed as-is; the timer is
//! armed for the interval and fires a re-evaluation instead. Long-lived
//! credentials thus never leave an unbounded timer behind, and clock jumps or
//! throttled background tabs are corrected on the next evaluation.

#[cfg(test)]
#[path = "schedule_test.rs"]
mod schedule_test;

use std::time::Duration;

use super::state::{SessionPhase, SessionState};
use crate::config::SessionConfig;

/// First backoff step; doubled per failure.
pub const BASE_BACKOFF_MS: u64 = 1000;

/// What the scheduler should do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulePlan {
    /// Nothing to schedule (unauthenticated or no known expiry).
    Idle,
    /// Refresh right away.
    Immediate,
    /// Arm a timer that refreshes when it fires.
    Refresh(Duration),
    /// Arm a timer that re-runs the planner when it fires.
    Reevaluate(Duration),
    /// Arm a timer that retries a first session fetch that failed transiently.
    Recheck(Duration),
}

impl SchedulePlan {
    pub fn delay(self) -> Option<Duration> {
        match self {
            Self::Refresh(d) | Self::Reevaluate(d) | Self::Recheck(d) => Some(d),
            Self::Idle | Self::Immediate => None,
        }
    }
}

/// `min(1000 * 2^failures, max_backoff_ms)`, or 0 with no failures.
pub fn backoff_floor_ms(failure_count: u32, max_backoff_ms: u64) -> u64 {
    if failure_count == 0 {
        return 0;
    }
    let factor = 1_u64.checked_shl(failure_count).unwrap_or(u64::MAX);
    BASE_BACKOFF_MS.saturating_mul(factor).min(max_backoff_ms)
}

/// Milliseconds until the next refresh attempt; `<= 0` means now.
///
/// `time_until_expiry_ms - threshold_ms`, raised to the backoff floor when
/// there are recorded failures.
pub fn compute_next_delay(failure_count: u32, time_until_expiry_ms: i64, threshold_ms: i64, max_backoff_ms: u64) -> i64 {
    let until_refresh = time_until_expiry_ms.saturating_sub(threshold_ms);
    if failure_count == 0 {
        return until_refresh;
    }
    let floor = i64::try_from(backoff_floor_ms(failure_count, max_backoff_ms)).unwrap_or(i64::MAX);
    until_refresh.max(floor)
}

/// Turn a raw delay into a plan, capping armed timers at `window`.
pub fn plan_for_delay(delay_ms: i64, window: Duration) -> SchedulePlan {
    let Ok(delay_ms) = u64::try_from(delay_ms) else {
        return SchedulePlan::Immediate;
    };
    if delay_ms == 0 {
        return SchedulePlan::Immediate;
    }
    let delay = Duration::from_millis(delay_ms);
    if delay > window {
        SchedulePlan::Reevaluate(window)
    } else {
        SchedulePlan::Refresh(delay)
    }
}

/// Plan the next step for `state` at `now` (epoch seconds).
#[allow(clippy::cast_possible_truncation)]
pub fn plan_refresh(state: &SessionState, now: f64, config: &SessionConfig) -> SchedulePlan {
    let max_backoff_ms = u64::try_from(config.max_backoff.as_millis()).unwrap_or(u64::MAX);
    if state.phase == SessionPhase::Unknown && state.transient_failure_count > 0 {
        let delay = Duration::from_millis(backoff_floor_ms(state.transient_failure_count, max_backoff_ms));
        return SchedulePlan::Recheck(delay.min(config.session_check_interval));
    }
    if !state.is_authenticated() {
        return SchedulePlan::Idle;
    }
    let Some(expires_at) = state.expires_at else {
        return SchedulePlan::Idle;
    };

    #[allow(clippy::cast_precision_loss)]
    let time_until_expiry_ms = ((expires_at as f64 - now) * 1000.0).round() as i64;
    let threshold_ms = i64::try_from(config.refresh_threshold.as_millis()).unwrap_or(i64::MAX);

    let delay_ms = compute_next_delay(state.backoff_exponent(), time_until_expiry_ms, threshold_ms, max_backoff_ms);
    let plan = plan_for_delay(delay_ms, config.session_check_interval);

    // A credential issued already inside the threshold would otherwise be
    // refreshed back-to-back.
    if plan == SchedulePlan::Immediate
        && let Some(last) = state.last_refreshed_at
    {
        let elapsed = Duration::from_secs_f64((now - last).max(0.0));
        if elapsed < config.min_refresh_spacing {
            return SchedulePlan::Refresh(config.min_refresh_spacing - elapsed);
        }
    }
    plan
}

/// Whether a tab coming back to the foreground should re-check the session.
pub fn should_reconcile_on_visible(last_checked_at: Option<f64>, now: f64, min_interval: Duration) -> bool {
    last_checked_at.is_none_or(|last| now - last > min_interval.as_secs_f64())
}
