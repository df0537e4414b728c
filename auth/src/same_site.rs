//! `SameSite=None` compatibility heuristics
//!
//! Some browsers either reject cookies carrying `SameSite=None` or treat the
//! attribute as `Strict`. For those clients the attribute must be omitted
//! altogether. The detection rules follow Chromium's published list of
//! incompatible clients: <https://www.chromium.org/updates/same-site/incompatible-clients>
//!
//! # Example
//!
//! ```rust
//! use midway_sso_auth::same_site::is_same_site_none_compatible;
//!
//! assert!(!is_same_site_none_compatible(
//!     "Mozilla/5.0 (iPhone; CPU iPhone OS 12_2 like Mac OS X) AppleWebKit/605.1.15"
//! ));
//! ```

use crate::types::SameSite;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref IOS_VERSION: Regex =
        Regex::new(r"\(iP.+; CPU .*OS (\d+)[_\d]*.*\) AppleWebKit/").expect("valid regex");
    static ref MACOS_VERSION: Regex =
        Regex::new(r"\(Macintosh;.*Mac OS X (\d+)_(\d+)[_\d]*.*\) AppleWebKit/")
            .expect("valid regex");
    static ref SAFARI: Regex = Regex::new(r"Version/.* Safari/").expect("valid regex");
    static ref MAC_EMBEDDED_BROWSER: Regex = Regex::new(
        r"^Mozilla/[\.\d]+ \(Macintosh;.*Mac OS X [_\d]+\) AppleWebKit/[\.\d]+ \(KHTML, like Gecko\)$"
    )
    .expect("valid regex");
    static ref CHROMIUM_VERSION: Regex =
        Regex::new(r"Chrom[^ /]+/(\d+)[\.\d]* ").expect("valid regex");
    static ref UC_BROWSER_VERSION: Regex =
        Regex::new(r"UCBrowser/(\d+)\.(\d+)\.(\d+)[\.\d]* ").expect("valid regex");
}

/// Returns the `SameSite` attribute to put on cookies for this client.
///
/// `None` means the attribute is omitted, which is the case for incompatible
/// clients and when no user agent is known.
pub fn same_site_for(user_agent: Option<&str>) -> Option<SameSite> {
    match user_agent {
        Some(ua) if is_same_site_none_compatible(ua) => Some(SameSite::None),
        _ => None,
    }
}

/// True when the client is known to handle `SameSite=None` correctly.
pub fn is_same_site_none_compatible(user_agent: &str) -> bool {
    !user_agent.is_empty() && !is_same_site_none_incompatible(user_agent)
}

fn is_same_site_none_incompatible(user_agent: &str) -> bool {
    has_webkit_same_site_bug(user_agent) || drops_unrecognized_same_site_cookies(user_agent)
}

fn has_webkit_same_site_bug(user_agent: &str) -> bool {
    is_ios_version(12, user_agent)
        || (is_macos_version(10, 14, user_agent)
            && (is_safari(user_agent) || is_mac_embedded_browser(user_agent)))
}

fn drops_unrecognized_same_site_cookies(user_agent: &str) -> bool {
    if is_uc_browser(user_agent) {
        return !is_uc_browser_version_at_least(12, 13, 2, user_agent);
    }
    is_chromium_based(user_agent)
        && is_chromium_version_at_least(51, user_agent)
        && !is_chromium_version_at_least(67, user_agent)
}

fn capture_u32(captures: &regex::Captures<'_>, group: usize) -> Option<u32> {
    captures.get(group)?.as_str().parse().ok()
}

fn is_ios_version(major: u32, user_agent: &str) -> bool {
    IOS_VERSION
        .captures(user_agent)
        .and_then(|c| capture_u32(&c, 1))
        .is_some_and(|v| v == major)
}

fn is_macos_version(major: u32, minor: u32, user_agent: &str) -> bool {
    MACOS_VERSION
        .captures(user_agent)
        .and_then(|c| Some((capture_u32(&c, 1)?, capture_u32(&c, 2)?)))
        .is_some_and(|version| version == (major, minor))
}

fn is_safari(user_agent: &str) -> bool {
    SAFARI.is_match(user_agent) && !is_chromium_based(user_agent)
}

/// Macintosh WebKit user agent with no product tokens after the WebKit revision
fn is_mac_embedded_browser(user_agent: &str) -> bool {
    MAC_EMBEDDED_BROWSER.is_match(user_agent)
}

fn is_chromium_based(user_agent: &str) -> bool {
    user_agent.contains("Chrome") || user_agent.contains("Chromium")
}

fn is_chromium_version_at_least(major: u32, user_agent: &str) -> bool {
    CHROMIUM_VERSION
        .captures(user_agent)
        .and_then(|c| capture_u32(&c, 1))
        .is_some_and(|v| v >= major)
}

fn is_uc_browser(user_agent: &str) -> bool {
    user_agent.contains("UCBrowser/")
}

fn is_uc_browser_version_at_least(major: u32, minor: u32, build: u32, user_agent: &str) -> bool {
    UC_BROWSER_VERSION
        .captures(user_agent)
        .and_then(|c| {
            Some((
                capture_u32(&c, 1)?,
                capture_u32(&c, 2)?,
                capture_u32(&c, 3)?,
            ))
        })
        .is_some_and(|version| version >= (major, minor, build))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ios_version_extraction() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 12_2 like Mac OS X) AppleWebKit/605.1.15";
        assert!(is_ios_version(12, ua));
        assert!(!is_ios_version(13, ua));
    }

    #[test]
    fn test_macos_version_extraction() {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_6) AppleWebKit/605.1.15 (KHTML, like Gecko)";
        assert!(is_macos_version(10, 14, ua));
        assert!(!is_macos_version(10, 15, ua));
        assert!(is_mac_embedded_browser(ua));
    }

    #[test]
    fn test_uc_browser_version_ordering() {
        let ua = "Mozilla/5.0 (Linux; U; Android 8.0.0) UCBrowser/12.13.2.1208 Mobile Safari/534.30";
        assert!(is_uc_browser_version_at_least(12, 13, 2, ua));
        assert!(is_uc_browser_version_at_least(11, 99, 99, ua));
        assert!(!is_uc_browser_version_at_least(12, 13, 3, ua));
        assert!(!is_uc_browser_version_at_least(12, 14, 0, ua));
    }

    #[test]
    fn test_chromium_version_requires_trailing_token() {
        assert!(!is_chromium_version_at_least(
            1,
            "Mozilla/5.0 AppleWebKit/537.36 (KHTML, like Gecko) Chrome/80.0.3987.132"
        ));
        assert!(is_chromium_version_at_least(
            80,
            "Mozilla/5.0 AppleWebKit/537.36 (KHTML, like Gecko) Chrome/80.0.3987.132 Safari/537.36"
        ));
    }
}
