//! Redirect target validation
//!
//! The post-authentication redirect target travels through the identity
//! provider inside the `state` parameter. It is only followed when it is a
//! relative path on this host.

use url::Url;

/// Validate that a redirect target is a safe relative path plus optional query
///
/// The path component (before `?`) is percent-decoded, then must:
/// 1. start with exactly one `/` (no protocol-relative `//host`)
/// 2. contain no scheme marker (`://`)
/// 3. contain no backslash (some browsers treat `\` as `/`)
/// 4. parse as a relative URL
///
/// The query string is free-form: it only ever reaches this host.
///
/// # Examples
///
/// ```
/// use midway_sso_auth::url_validation::is_safe_redirect_target;
///
/// assert!(is_safe_redirect_target("/"));
/// assert!(is_safe_redirect_target("/orders?x=1"));
/// assert!(is_safe_redirect_target("/cb?next=https://example.com"));
///
/// assert!(!is_safe_redirect_target("https://evil.com"));
/// assert!(!is_safe_redirect_target("//evil.com"));
/// assert!(!is_safe_redirect_target("/%2F/evil.com"));
/// assert!(!is_safe_redirect_target("/\\evil.com"));
/// ```
pub fn is_safe_redirect_target(target: &str) -> bool {
    let path = target.split_once('?').map_or(target, |(path, _)| path);

    let decoded = match percent_encoding::percent_decode_str(path).decode_utf8() {
        Ok(s) => s.to_string(),
        Err(_) => return false,
    };

    if !decoded.starts_with('/') || decoded.starts_with("//") {
        return false;
    }
    if decoded.contains("://") || decoded.contains('\\') {
        return false;
    }

    let Ok(base) = Url::parse("https://localhost") else {
        return false;
    };
    Url::options().base_url(Some(&base)).parse(target).is_ok()
}
