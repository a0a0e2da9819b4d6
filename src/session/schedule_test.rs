use super::*;
use crate::net::types::{SessionResponse, User};

const NOW: f64 = 1_700_000_000.0;

fn config() -> SessionConfig {
    SessionConfig {
        refresh_threshold: Duration::from_secs(300),
        session_check_interval: Duration::from_secs(300),
        max_backoff: Duration::from_millis(60_000),
        min_refresh_spacing: Duration::from_secs(5),
        ..SessionConfig::default()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn session_expiring_in(secs: i64) -> SessionState {
    SessionState::seeded(
        SessionResponse {
            authenticated: true,
            user: Some(User {
                id: "u-1".to_owned(),
                email: String::new(),
                display_name: "Ops".to_owned(),
                roles: Vec::new(),
            }),
            expires_at: Some(NOW as i64 + secs),
            csrf_token: None,
            error: None,
        },
        NOW,
    )
}

// =============================================================
// backoff_floor_ms
// =============================================================

#[test]
fn backoff_floor_zero_without_failures() {
    assert_eq!(backoff_floor_ms(0, 60_000), 0);
}

#[test]
fn backoff_floor_doubles_per_failure() {
    assert_eq!(backoff_floor_ms(1, 60_000), 2_000);
    assert_eq!(backoff_floor_ms(2, 60_000), 4_000);
    assert_eq!(backoff_floor_ms(3, 60_000), 8_000);
}

#[test]
fn backoff_floor_is_capped() {
    assert_eq!(backoff_floor_ms(10, 60_000), 60_000);
    assert_eq!(backoff_floor_ms(200, 60_000), 60_000);
}

// =============================================================
// compute_next_delay
// =============================================================

#[test]
fn delay_is_time_until_threshold_without_failures() {
    assert_eq!(compute_next_delay(0, 600_000, 300_000, 60_000), 300_000);
    assert_eq!(compute_next_delay(0, 100_000, 300_000, 60_000), -200_000);
}

#[test]
fn failures_raise_delay_to_backoff_floor() {
    assert_eq!(compute_next_delay(1, -5_000, 300_000, 60_000), 2_000);
}

#[test]
fn backoff_floor_never_shortens_a_later_refresh() {
    assert_eq!(compute_next_delay(2, 900_000, 300_000, 60_000), 600_000);
}

#[test]
fn fourth_delay_after_three_failures_exceeds_first() {
    let first = compute_next_delay(1, 0, 300_000, 60_000);
    let fourth = compute_next_delay(3, 0, 300_000, 60_000);
    assert!(fourth >= 8_000);
    assert!(fourth > first);
}

#[test]
fn delays_grow_monotonically_until_cap() {
    let delays: Vec<i64> = (1..=8).map(|n| compute_next_delay(n, 0, 300_000, 60_000)).collect();
    assert!(delays.windows(2).all(|w| w[1] >= w[0]));
    assert_eq!(*delays.last().unwrap(), 60_000);
}

// =============================================================
// plan_for_delay
// =============================================================

#[test]
fn non_positive_delay_is_immediate() {
    let window = Duration::from_secs(300);
    assert_eq!(plan_for_delay(0, window), SchedulePlan::Immediate);
    assert_eq!(plan_for_delay(-1, window), SchedulePlan::Immediate);
}

#[test]
fn delay_within_window_refreshes_on_fire() {
    assert_eq!(
        plan_for_delay(5_000, Duration::from_secs(300)),
        SchedulePlan::Refresh(Duration::from_secs(5))
    );
}

#[test]
fn delay_beyond_window_reevaluates_on_fire() {
    assert_eq!(
        plan_for_delay(3_600_000, Duration::from_secs(300)),
        SchedulePlan::Reevaluate(Duration::from_secs(300))
    );
}

// =============================================================
// plan_refresh
// =============================================================

#[test]
fn unauthenticated_state_is_idle() {
    let mut state = SessionState::default();
    assert_eq!(plan_refresh(&state, NOW, &config()), SchedulePlan::Idle);
    state.reset_unauthenticated();
    assert_eq!(plan_refresh(&state, NOW, &config()), SchedulePlan::Idle);
}

#[test]
fn unknown_expiry_is_idle() {
    let mut state = session_expiring_in(600);
    state.expires_at = None;
    assert_eq!(plan_refresh(&state, NOW, &config()), SchedulePlan::Idle);
}

#[test]
fn ten_minute_session_refreshes_after_five_minutes() {
    let plan = plan_refresh(&session_expiring_in(600), NOW, &config());
    assert_eq!(plan, SchedulePlan::Refresh(Duration::from_secs(300)));
}

#[test]
fn long_session_is_capped_at_check_interval() {
    let plan = plan_refresh(&session_expiring_in(8 * 3600), NOW, &config());
    assert_eq!(plan, SchedulePlan::Reevaluate(Duration::from_secs(300)));
}

#[test]
fn session_inside_threshold_refreshes_immediately() {
    let plan = plan_refresh(&session_expiring_in(120), NOW, &config());
    assert_eq!(plan, SchedulePlan::Immediate);
}

#[test]
fn failure_inside_threshold_uses_backoff_floor() {
    let mut state = session_expiring_in(120);
    state.record_refresh_failure(crate::net::gateway::GatewayError::from_status(401, None), NOW, &config());
    assert_eq!(plan_refresh(&state, NOW, &config()), SchedulePlan::Refresh(Duration::from_secs(2)));
}

#[test]
fn deferred_bootstrap_plans_recheck_with_backoff() {
    let mut state = SessionState::default();
    state.defer_bootstrap(crate::net::gateway::GatewayError::RateLimited, NOW, 15);
    assert_eq!(plan_refresh(&state, NOW, &config()), SchedulePlan::Recheck(Duration::from_secs(2)));

    for _ in 0..8 {
        state.defer_bootstrap(crate::net::gateway::GatewayError::RateLimited, NOW, 15);
    }
    assert_eq!(plan_refresh(&state, NOW, &config()), SchedulePlan::Recheck(Duration::from_secs(60)));
}

#[test]
fn recent_refresh_spaces_out_immediate_plan() {
    let mut state = session_expiring_in(60);
    state.last_refreshed_at = Some(NOW - 2.0);
    assert_eq!(plan_refresh(&state, NOW, &config()), SchedulePlan::Refresh(Duration::from_secs(3)));

    state.last_refreshed_at = Some(NOW - 30.0);
    assert_eq!(plan_refresh(&state, NOW, &config()), SchedulePlan::Immediate);
}

// =============================================================
// should_reconcile_on_visible
// =============================================================

#[test]
fn reconcile_when_never_checked() {
    assert!(should_reconcile_on_visible(None, NOW, Duration::from_secs(60)));
}

#[test]
fn reconcile_only_after_min_interval() {
    let min = Duration::from_secs(60);
    assert!(!should_reconcile_on_visible(Some(NOW - 30.0), NOW, min));
    assert!(!should_reconcile_on_visible(Some(NOW - 60.0), NOW, min));
    assert!(should_reconcile_on_visible(Some(NOW - 61.0), NOW, min));
}
