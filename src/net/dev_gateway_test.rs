use super::*;
use futures::executor::block_on;

fn gateway_at(now: f64) -> DevBypassGateway {
    DevBypassGateway::new(GatewayEndpoints::new("/auth"), Rc::new(move || now))
}

#[test]
fn fetch_session_returns_static_operator() {
    let gateway = gateway_at(1_700_000_000.0);
    let session = block_on(gateway.fetch_session()).unwrap();
    assert!(session.authenticated);
    assert_eq!(session.user, Some(dev_user()));
    assert_eq!(session.expires_at, Some(1_700_003_600));
    assert!(session.csrf_token.is_some());
}

#[test]
fn ttl_override_moves_expiry() {
    let gateway = gateway_at(100.5).with_ttl(Duration::from_secs(10));
    let session = block_on(gateway.fetch_session()).unwrap();
    assert_eq!(session.expires_at, Some(110));
}

#[test]
fn refresh_always_succeeds() {
    let gateway = gateway_at(0.0);
    assert_eq!(block_on(gateway.request_refresh()), Ok(()));
}

#[test]
fn logout_echoes_return_target() {
    let gateway = gateway_at(0.0);
    assert_eq!(block_on(gateway.request_logout(Some("/bye"))), Ok(Some("/bye".to_owned())));
    assert_eq!(block_on(gateway.request_logout(None)), Ok(None));
}
