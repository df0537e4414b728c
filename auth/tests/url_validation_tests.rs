use midway_sso_auth::url_validation::is_safe_redirect_target;

#[test]
fn test_safe_redirect_target_valid_paths() {
    assert!(is_safe_redirect_target("/"));
    assert!(is_safe_redirect_target("/orders"));
    assert!(is_safe_redirect_target("/orders/123"));
    assert!(is_safe_redirect_target("/orders?x=1"));
    assert!(is_safe_redirect_target("/path?a=1&b=2"));
    assert!(is_safe_redirect_target("/path#anchor"));
}

#[test]
fn test_safe_redirect_target_allows_urls_in_query() {
    // the query only ever reaches this host
    assert!(is_safe_redirect_target("/callback?next=https://example.com/x"));
    assert!(is_safe_redirect_target("/search?q=a%5Cb"));
}

#[test]
fn test_safe_redirect_target_rejects_absolute_urls() {
    assert!(!is_safe_redirect_target("https://evil.com"));
    assert!(!is_safe_redirect_target("http://evil.com/path"));
    assert!(!is_safe_redirect_target("//evil.com/path"));
    assert!(!is_safe_redirect_target("javascript://alert(1)"));
}

#[test]
fn test_safe_redirect_target_rejects_non_slash_start() {
    assert!(!is_safe_redirect_target("orders"));
    assert!(!is_safe_redirect_target("?x=1"));
    assert!(!is_safe_redirect_target(""));
}

#[test]
fn test_safe_redirect_target_rejects_encoded_bypasses() {
    assert!(!is_safe_redirect_target("/%2F/evil.com"));
    assert!(!is_safe_redirect_target("/%2F%2Fevil.com"));
    assert!(!is_safe_redirect_target("/http%3A%2F%2Fevil.com"));
}

#[test]
fn test_safe_redirect_target_rejects_backslash_variants() {
    // Some browsers treat backslashes as forward slashes
    assert!(!is_safe_redirect_target("/\\evil.com"));
    assert!(!is_safe_redirect_target("/\\/evil.com"));
    assert!(!is_safe_redirect_target("/%5Cevil.com"));
}
