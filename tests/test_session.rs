use elastci::session::SessionRegistry;

#[test]
fn test_generated_token_shape() {
    let registry = SessionRegistry::new();
    let session = registry.generate();

    assert_eq!(session.token().len(), 128);
    assert!(session.token().chars().all(|c| c.is_ascii_alphanumeric()));
}

#[test]
fn test_generated_tokens_differ() {
    let registry = SessionRegistry::new();
    let a = registry.generate();
    let b = registry.generate();

    assert_ne!(a.token(), b.token());
}

#[test]
fn test_generate_does_not_insert() {
    let registry = SessionRegistry::new();
    let session = registry.generate();

    assert!(!registry.check(session.token()));
}

#[test]
fn test_login_logout_lifecycle() {
    let registry = SessionRegistry::new();
    let session = registry.generate();
    let token = session.token();

    assert!(registry.login(token));
    assert!(registry.check(token));

    assert!(registry.logout(token));
    assert!(!registry.check(token));
    assert!(!registry.logout(token));
}

#[test]
fn test_duplicate_login_rejected() {
    let registry = SessionRegistry::new();
    let session = registry.generate();
    let token = session.token();

    assert!(registry.login(token));
    assert!(!registry.login(token));

    // logging out frees the token for a fresh login
    assert!(registry.logout(token));
    assert!(registry.login(token));
}

#[test]
fn test_session_timestamps_render() {
    let registry = SessionRegistry::new();
    let session = registry.generate();

    let created = session.created_at();
    let expires = session.expires_at();

    // %FT%TZ renderings, e.g. 2026-08-07T12:00:00Z
    assert!(created.ends_with('Z'));
    assert!(expires.ends_with('Z'));
    assert_eq!(created.len(), "2026-08-07T12:00:00Z".len());

    // expiry is 8 hours after creation; same-width UTC strings compare
    // lexicographically
    assert!(expires > created);
}
