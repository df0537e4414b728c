use midway_sso_auth::same_site::{is_same_site_none_compatible, same_site_for};
use midway_sso_auth::types::SameSite;

const CHROME_80: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/80.0.3987.132 Safari/537.36";

#[test]
fn test_ios_12_is_incompatible() {
    assert!(!is_same_site_none_compatible(
        "Mozilla/5.0 (iPhone; CPU iPhone OS 12_2 like Mac OS X) AppleWebKit/605.1.15"
    ));
    assert!(!is_same_site_none_compatible(
        "Mozilla/5.0 (iPad; CPU OS 12_4_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/12.1.2 Mobile/15E148 Safari/604.1"
    ));
}

#[test]
fn test_other_ios_versions_are_compatible() {
    assert!(is_same_site_none_compatible(
        "Mozilla/5.0 (iPhone; CPU iPhone OS 13_3 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/13.0.4 Mobile/15E148 Safari/604.1"
    ));
    assert!(is_same_site_none_compatible(
        "Mozilla/5.0 (iPhone; CPU iPhone OS 11_0 like Mac OS X) AppleWebKit/604.1.38"
    ));
}

#[test]
fn test_macos_10_14_safari_is_incompatible() {
    assert!(!is_same_site_none_compatible(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/12.1.2 Safari/605.1.15"
    ));
}

#[test]
fn test_macos_10_14_embedded_browser_is_incompatible() {
    assert!(!is_same_site_none_compatible(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_6) AppleWebKit/605.1.15 (KHTML, like Gecko)"
    ));
}

#[test]
fn test_macos_10_14_chrome_is_compatible() {
    assert!(is_same_site_none_compatible(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/79.0.3945.117 Safari/537.36"
    ));
}

#[test]
fn test_macos_10_15_safari_is_compatible() {
    assert!(is_same_site_none_compatible(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_3) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/13.0.5 Safari/605.1.15"
    ));
}

#[test]
fn test_chromium_range() {
    assert!(is_same_site_none_compatible(
        "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/80.0.3987.132"
    ));
    assert!(is_same_site_none_compatible(CHROME_80));
    assert!(!is_same_site_none_compatible(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/55.0 Safari/537.36"
    ));
    assert!(!is_same_site_none_compatible(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/51.0.2704.103 Safari/537.36"
    ));
    assert!(!is_same_site_none_compatible(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/66.0.3359.181 Safari/537.36"
    ));
    assert!(is_same_site_none_compatible(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/67.0.3396.99 Safari/537.36"
    ));
    assert!(is_same_site_none_compatible(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/50.0.2661.102 Safari/537.36"
    ));
    assert!(!is_same_site_none_compatible(
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chromium/60.0.3112.78 Safari/537.36"
    ));
}

#[test]
fn test_uc_browser_versions() {
    let ua = |version: &str| {
        format!(
            "Mozilla/5.0 (Linux; U; Android 8.0.0; en-US) AppleWebKit/534.30 (KHTML, like Gecko) Version/4.0 UCBrowser/{version} U3/0.8.0 Mobile Safari/534.30"
        )
    };
    assert!(!is_same_site_none_compatible(&ua("12.13.1.1189")));
    assert!(!is_same_site_none_compatible(&ua("11.9.4.974")));
    assert!(is_same_site_none_compatible(&ua("12.13.2.1208")));
    assert!(is_same_site_none_compatible(&ua("12.14.0.1221")));
    assert!(is_same_site_none_compatible(&ua("13.0.0.1288")));
}

#[test]
fn test_firefox_is_compatible() {
    assert!(is_same_site_none_compatible(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:72.0) Gecko/20100101 Firefox/72.0"
    ));
}

#[test]
fn test_same_site_attribute() {
    assert_eq!(same_site_for(Some(CHROME_80)), Some(SameSite::None));
    assert_eq!(
        same_site_for(Some(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 12_2 like Mac OS X) AppleWebKit/605.1.15"
        )),
        None
    );
    assert_eq!(same_site_for(Some("")), None);
    assert_eq!(same_site_for(None), None);
}
