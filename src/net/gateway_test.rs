use super::*;

// =============================================================
// classify_status
// =============================================================

#[test]
fn classify_status_maps_success_range() {
    assert_eq!(classify_status(200), StatusClass::Success);
    assert_eq!(classify_status(204), StatusClass::Success);
}

#[test]
fn classify_status_separates_unauthenticated_and_rate_limited() {
    assert_eq!(classify_status(401), StatusClass::Unauthenticated);
    assert_eq!(classify_status(429), StatusClass::RateLimited);
}

#[test]
fn classify_status_treats_other_codes_as_failure() {
    assert_eq!(classify_status(403), StatusClass::Failure(403));
    assert_eq!(classify_status(502), StatusClass::Failure(502));
    assert_eq!(classify_status(302), StatusClass::Failure(302));
}

// =============================================================
// GatewayError
// =============================================================

#[test]
fn from_status_prefers_body_message() {
    let err = GatewayError::from_status(500, Some(r#"{"message":"upstream down","error":"e"}"#));
    assert_eq!(
        err,
        GatewayError::GatewayFailure { status: Some(500), message: "upstream down".to_owned() }
    );
}

#[test]
fn from_status_falls_back_to_status_text() {
    let err = GatewayError::from_status(503, Some("<html>bad gateway</html>"));
    assert_eq!(
        err,
        GatewayError::GatewayFailure { status: Some(503), message: "request failed: 503".to_owned() }
    );
}

#[test]
fn gateway_failure_display_includes_status() {
    let err = GatewayError::from_status(401, None);
    assert_eq!(err.to_string(), "identity gateway failure (401): request failed: 401");

    let err = GatewayError::GatewayFailure { status: None, message: "bad body".to_owned() };
    assert_eq!(err.to_string(), "identity gateway failure: bad body");
}

#[test]
fn transient_classification() {
    assert!(GatewayError::RateLimited.is_transient());
    assert!(GatewayError::NetworkFailure("offline".to_owned()).is_transient());
    assert!(!GatewayError::from_status(500, None).is_transient());
}

#[test]
fn gateway_error_message_skips_blank_values() {
    assert_eq!(
        gateway_error_message(r#"{"message":"  ","error_description":"expired"}"#),
        Some("expired".to_owned())
    );
    assert_eq!(gateway_error_message("not json"), None);
}

// =============================================================
// GatewayEndpoints
// =============================================================

#[test]
fn endpoints_trim_trailing_slash() {
    let endpoints = GatewayEndpoints::new("/auth/");
    assert_eq!(endpoints.base(), "/auth");
    assert_eq!(endpoints.session_url(), "/auth/session");
    assert_eq!(endpoints.csrf_url(), "/auth/csrf");
    assert_eq!(endpoints.refresh_url(), "/auth/refresh");
}

#[test]
fn login_url_encodes_return_target_and_prompt() {
    let endpoints = GatewayEndpoints::new("/auth");
    let url = endpoints.login_url(&LoginOptions {
        return_to: Some("/tenants?page=2".to_owned()),
        prompt: Some("login".to_owned()),
    });
    assert_eq!(url, "/auth/login?returnTo=%2Ftenants%3Fpage%3D2&prompt=login");
}

#[test]
fn login_url_without_options_has_no_query() {
    let endpoints = GatewayEndpoints::new("/auth");
    assert_eq!(endpoints.login_url(&LoginOptions::default()), "/auth/login");
}

#[test]
fn logout_url_optional_return_target() {
    let endpoints = GatewayEndpoints::new("https://id.example.com");
    assert_eq!(endpoints.logout_url(None), "https://id.example.com/logout");
    assert_eq!(
        endpoints.logout_url(Some("/")),
        "https://id.example.com/logout?returnTo=%2F"
    );
}
