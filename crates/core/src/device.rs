//! Device recognition from request headers.
//!
//! A [`DeviceSignal`] carries the raw header values the HTTP layer pulled off
//! a login request. [`DeviceInfo::from_signal`] parses the user agent into
//! browser / OS / device families and derives the stable fingerprint used to
//! recognise a returning device.
//!
//! User-agent parsing is a table-driven classifier over the browser, OS, and
//! Android brand markers seen in practice; unknown agents fall back to
//! `"Other"`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Family reported when a component cannot be classified.
pub const UNKNOWN_FAMILY: &str = "Other";

/// Name used when nothing about the device could be identified.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// Hex characters kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 16;

/// Lowercase substrings marking crawlers, previews, and scripted clients.
const BOT_MARKERS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "slurp",
    "headlesschrome",
    "facebookexternalhit",
    "bingpreview",
    "mediapartners-google",
    "lighthouse",
    "python-requests",
    "go-http-client",
    "curl/",
    "wget/",
];

/// Browser markers, most specific first: most agents also advertise Chrome
/// and Safari.
const BROWSER_RULES: &[(&str, &str)] = &[
    ("EdgA/", "Edge Mobile"),
    ("EdgiOS/", "Edge Mobile"),
    ("Edg/", "Edge"),
    ("Edge/", "Edge"),
    ("OPR/", "Opera"),
    ("OPiOS/", "Opera"),
    ("Opera Mini/", "Opera Mini"),
    ("Vivaldi/", "Vivaldi"),
    ("YaBrowser/", "Yandex Browser"),
    ("SamsungBrowser/", "Samsung Internet"),
    ("UCBrowser/", "UC Browser"),
    ("FxiOS/", "Firefox iOS"),
    ("Firefox/", "Firefox"),
    ("CriOS/", "Chrome Mobile iOS"),
    ("Chrome/", "Chrome"),
];

/// Android model prefixes and the brand they belong to.
const ANDROID_BRANDS: &[(&str, &str)] = &[
    ("SM-", "Samsung"),
    ("GT-", "Samsung"),
    ("Pixel", "Google"),
    ("Nexus", "Google"),
    ("moto", "Motorola"),
    ("Redmi", "Xiaomi"),
    ("Mi ", "Xiaomi"),
    ("HUAWEI", "Huawei"),
    ("ONEPLUS", "OnePlus"),
    ("LM-", "LG"),
];

/// Raw request-derived values used to identify a device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSignal {
    pub user_agent: String,
    pub accept_language: Option<String>,
    pub accept_encoding: Option<String>,
    pub screen_width: Option<String>,
    pub screen_height: Option<String>,
    /// Client address after proxy-header resolution, or `"unknown"`.
    pub ip_address: String,
}

/// Parsed device description persisted on a device session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub user_agent: String,
    pub ip_address: String,
    pub fingerprint: String,
    pub browser_family: String,
    pub browser_version: Option<String>,
    pub os_family: String,
    pub os_version: Option<String>,
    pub device_family: String,
    pub device_brand: Option<String>,
    pub device_model: Option<String>,
    pub device_type: String,
    pub language: Option<String>,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_pc: bool,
    pub is_bot: bool,
}

impl DeviceInfo {
    /// Parse the user agent and derive the fingerprint for `signal`.
    pub fn from_signal(signal: &DeviceSignal) -> Self {
        let ua = signal.user_agent.as_str();
        let (browser_family, browser_version) = parse_browser(ua);
        let (os_family, os_version) = parse_os(ua);
        let device = parse_device(ua);

        let lower = ua.to_lowercase();
        let is_bot = BOT_MARKERS.iter().any(|marker| lower.contains(*marker));
        let is_tablet = !is_bot
            && (ua.contains("iPad")
                || lower.contains("tablet")
                || (ua.contains("Android") && !ua.contains("Mobile")));
        let is_mobile = !is_bot
            && !is_tablet
            && (ua.contains("iPhone") || ua.contains("Mobile") || ua.contains("Opera Mini"));
        let is_pc = !is_bot
            && !is_mobile
            && !is_tablet
            && matches!(os_family.as_str(), "Windows" | "Mac OS X" | "Linux" | "Chrome OS");

        let fingerprint = fingerprint(&[
            Some(browser_family.as_str()),
            browser_version.as_deref(),
            Some(os_family.as_str()),
            os_version.as_deref(),
            Some(device.family.as_str()),
            signal.accept_language.as_deref(),
            signal.accept_encoding.as_deref(),
            signal.screen_width.as_deref(),
            signal.screen_height.as_deref(),
        ]);

        let device_type = device_type_label(
            is_mobile,
            is_tablet,
            is_pc,
            is_bot,
            &device.family,
            &os_family,
        );

        let language = signal
            .accept_language
            .as_deref()
            .and_then(|l| l.split(',').next())
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());

        Self {
            user_agent: signal.user_agent.clone(),
            ip_address: signal.ip_address.clone(),
            fingerprint,
            browser_family,
            browser_version,
            os_family,
            os_version,
            device_family: device.family,
            device_brand: device.brand,
            device_model: device.model,
            device_type: device_type.to_string(),
            language,
            is_mobile,
            is_tablet,
            is_pc,
            is_bot,
        }
    }

    /// Human-readable device name: brand and model, else OS, else browser,
    /// else [`UNKNOWN_DEVICE_NAME`].
    pub fn display_name(&self) -> String {
        if let (Some(brand), Some(model)) = (&self.device_brand, &self.device_model) {
            return format!("{brand} {model}");
        }
        if self.os_family != UNKNOWN_FAMILY {
            return join_version(&self.os_family, self.os_version.as_deref());
        }
        if self.browser_family != UNKNOWN_FAMILY {
            return join_version(&self.browser_family, self.browser_version.as_deref());
        }
        UNKNOWN_DEVICE_NAME.to_string()
    }
}

/// SHA-256 over the `|`-joined non-empty parts, truncated to 16 hex chars.
pub fn fingerprint(parts: &[Option<&str>]) -> String {
    let joined = parts
        .iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("|");
    let digest = Sha256::digest(joined.as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(FINGERPRINT_LEN);
    hex
}

fn join_version(family: &str, version: Option<&str>) -> String {
    match version {
        Some(v) if !v.is_empty() => format!("{family} {v}"),
        _ => family.to_string(),
    }
}

// ---------------------------------------------------------------------------
// User-agent parsing
// ---------------------------------------------------------------------------

/// Token following `marker` up to the next space, `;` or `)`.
fn token_after<'a>(ua: &'a str, marker: &str) -> Option<&'a str> {
    let start = ua.find(marker)? + marker.len();
    let rest = &ua[start..];
    let end = rest
        .find(|c: char| c == ' ' || c == ';' || c == ')')
        .unwrap_or(rest.len());
    let token = &rest[..end];
    (!token.is_empty()).then_some(token)
}

fn parse_browser(ua: &str) -> (String, Option<String>) {
    for (marker, family) in BROWSER_RULES {
        if let Some(version) = token_after(ua, marker) {
            let family = match *family {
                "Chrome" if ua.contains("; wv)") => "Chrome Mobile WebView",
                "Chrome" if ua.contains("Mobile") => "Chrome Mobile",
                "Firefox" if ua.contains("Mobile") || ua.contains("Tablet") => "Firefox Mobile",
                other => other,
            };
            return (family.to_string(), Some(version.to_string()));
        }
    }
    if let Some(version) = token_after(ua, "MSIE ") {
        return ("IE".to_string(), Some(version.to_string()));
    }
    if ua.contains("Trident/") {
        return ("IE".to_string(), token_after(ua, "rv:").map(str::to_string));
    }
    if ua.contains("Safari/") {
        let family = if ua.contains("iPhone") || ua.contains("iPad") {
            "Mobile Safari"
        } else {
            "Safari"
        };
        return (
            family.to_string(),
            token_after(ua, "Version/").map(str::to_string),
        );
    }
    (UNKNOWN_FAMILY.to_string(), None)
}

fn parse_os(ua: &str) -> (String, Option<String>) {
    if let Some(v) = token_after(ua, "iPhone OS ").or_else(|| token_after(ua, "CPU OS ")) {
        return ("iOS".to_string(), Some(v.replace('_', ".")));
    }
    if let Some(v) = token_after(ua, "Android ") {
        return ("Android".to_string(), Some(v.to_string()));
    }
    if ua.contains("Android") {
        return ("Android".to_string(), None);
    }
    if let Some(v) = token_after(ua, "Windows NT ") {
        let version = match v {
            "10.0" => "10",
            "6.3" => "8.1",
            "6.0" => "Vista",
            "5.1" => "XP",
            "6.2" => "8",
            "6.1" => "7",
            other => other,
        };
        return ("Windows".to_string(), Some(version.to_string()));
    }
    if let Some(v) = token_after(ua, "Mac OS X ") {
        return ("Mac OS X".to_string(), Some(v.replace('_', ".")));
    }
    if ua.contains("CrOS") {
        return ("Chrome OS".to_string(), None);
    }
    if ua.contains("Linux") {
        return ("Linux".to_string(), None);
    }
    (UNKNOWN_FAMILY.to_string(), None)
}

struct ParsedDevice {
    family: String,
    brand: Option<String>,
    model: Option<String>,
}

fn parse_device(ua: &str) -> ParsedDevice {
    for apple in ["iPhone", "iPad"] {
        if ua.contains(apple) {
            return ParsedDevice {
                family: apple.to_string(),
                brand: Some("Apple".to_string()),
                model: Some(apple.to_string()),
            };
        }
    }
    if let Some(model) = android_model(ua) {
        let brand = ANDROID_BRANDS
            .iter()
            .find(|(prefix, _)| model.starts_with(*prefix))
            .map(|(_, brand)| *brand);
        return ParsedDevice {
            family: model.clone(),
            brand: brand.map(str::to_string),
            model: Some(model),
        };
    }
    if ua.contains("Macintosh") {
        return ParsedDevice {
            family: "Mac".to_string(),
            brand: Some("Apple".to_string()),
            model: Some("Mac".to_string()),
        };
    }
    ParsedDevice {
        family: UNKNOWN_FAMILY.to_string(),
        brand: None,
        model: None,
    }
}

/// Model segment of an Android agent: `(Linux; Android 14; Pixel 8 Build/…)`.
fn android_model(ua: &str) -> Option<String> {
    let start = ua.find("Android")?;
    let inside = &ua[start..];
    let inside = &inside[..inside.find(')').unwrap_or(inside.len())];
    let model = inside.split(';').nth(1)?.trim();
    let model = model.split(" Build").next().unwrap_or(model).trim();
    (!model.is_empty() && model != "K" && model != "wv").then(|| model.to_string())
}

fn device_type_label(
    is_mobile: bool,
    is_tablet: bool,
    is_pc: bool,
    is_bot: bool,
    device_family: &str,
    os_family: &str,
) -> &'static str {
    if is_mobile {
        if device_family.contains("iPhone") {
            "iPhone"
        } else if os_family.contains("Android") {
            "Android Device"
        } else {
            "Mobile Device"
        }
    } else if is_tablet {
        "Tablet Device"
    } else if is_pc {
        match os_family {
            "Windows" => "Windows PC",
            "Mac OS X" => "Mac",
            "Linux" => "Linux PC",
            _ => "Desktop Device",
        }
    } else if is_bot {
        "Bot"
    } else {
        "Desktop Device"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.6099.109 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const CHROME_PIXEL: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.6099.144 Mobile Safari/537.36";
    const FIREFOX_MAC: &str =
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0";

    fn signal(ua: &str) -> DeviceSignal {
        DeviceSignal {
            user_agent: ua.to_string(),
            accept_language: Some("en-AU,en;q=0.9".to_string()),
            accept_encoding: Some("gzip, deflate, br".to_string()),
            screen_width: None,
            screen_height: None,
            ip_address: "203.0.113.7".to_string(),
        }
    }

    #[test]
    fn parses_desktop_chrome() {
        let info = DeviceInfo::from_signal(&signal(CHROME_WINDOWS));
        assert_eq!(info.browser_family, "Chrome");
        assert_eq!(info.browser_version.as_deref(), Some("120.0.6099.109"));
        assert_eq!(info.os_family, "Windows");
        assert_eq!(info.os_version.as_deref(), Some("10"));
        assert!(info.is_pc);
        assert!(!info.is_mobile);
        assert_eq!(info.device_type, "Windows PC");
        assert_eq!(info.language.as_deref(), Some("en-AU"));
        assert_eq!(info.display_name(), "Windows 10");
    }

    #[test]
    fn parses_iphone_safari() {
        let info = DeviceInfo::from_signal(&signal(SAFARI_IPHONE));
        assert_eq!(info.browser_family, "Mobile Safari");
        assert_eq!(info.os_family, "iOS");
        assert_eq!(info.os_version.as_deref(), Some("17.0"));
        assert!(info.is_mobile);
        assert_eq!(info.device_type, "iPhone");
        assert_eq!(info.display_name(), "Apple iPhone");
    }

    #[test]
    fn parses_android_model_and_brand() {
        let info = DeviceInfo::from_signal(&signal(CHROME_PIXEL));
        assert_eq!(info.browser_family, "Chrome Mobile");
        assert_eq!(info.os_family, "Android");
        assert_eq!(info.device_model.as_deref(), Some("Pixel 8"));
        assert_eq!(info.device_brand.as_deref(), Some("Google"));
        assert_eq!(info.device_type, "Android Device");
    }

    #[test]
    fn parses_firefox_on_mac() {
        let info = DeviceInfo::from_signal(&signal(FIREFOX_MAC));
        assert_eq!(info.browser_family, "Firefox");
        assert_eq!(info.os_family, "Mac OS X");
        assert_eq!(info.os_version.as_deref(), Some("10.15"));
        assert!(info.is_pc);
    }

    #[test]
    fn bots_are_flagged() {
        let info = DeviceInfo::from_signal(&signal(
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
        ));
        assert!(info.is_bot);
        assert!(!info.is_pc);
        assert_eq!(info.device_type, "Bot");
    }

    #[test]
    fn chromium_derivatives_win_over_chrome() {
        let cases = [
            (
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91",
                "Edge",
                "120.0.2210.91",
            ),
            (
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/120.0.0.0 Safari/537.36 OPR/106.0.0.0",
                "Opera",
                "106.0.0.0",
            ),
            (
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                 Chrome/120.0.0.0 Safari/537.36 Vivaldi/6.5.3206.53",
                "Vivaldi",
                "6.5.3206.53",
            ),
            (
                "Mozilla/5.0 (Linux; Android 13; SM-S918B) AppleWebKit/537.36 (KHTML, like Gecko) \
                 SamsungBrowser/23.0 Chrome/115.0.0.0 Mobile Safari/537.36",
                "Samsung Internet",
                "23.0",
            ),
        ];
        for (ua, family, version) in cases {
            let info = DeviceInfo::from_signal(&signal(ua));
            assert_eq!(info.browser_family, family, "{ua}");
            assert_eq!(info.browser_version.as_deref(), Some(version), "{ua}");
        }
    }

    #[test]
    fn android_webview_and_firefox_mobile() {
        let webview = DeviceInfo::from_signal(&signal(
            "Mozilla/5.0 (Linux; Android 12; moto g(60); wv) AppleWebKit/537.36 \
             (KHTML, like Gecko) Version/4.0 Chrome/119.0.6045.163 Mobile Safari/537.36",
        ));
        assert_eq!(webview.browser_family, "Chrome Mobile WebView");
        assert_eq!(webview.device_brand.as_deref(), Some("Motorola"));
        assert!(webview.is_mobile);

        let firefox = DeviceInfo::from_signal(&signal(
            "Mozilla/5.0 (Android 14; Mobile; rv:121.0) Gecko/121.0 Firefox/121.0",
        ));
        assert_eq!(firefox.browser_family, "Firefox Mobile");
        assert_eq!(firefox.os_family, "Android");
        assert!(firefox.is_mobile);
    }

    #[test]
    fn ipad_and_android_tablets_are_tablets() {
        let ipad = DeviceInfo::from_signal(&signal(
            "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1",
        ));
        assert!(ipad.is_tablet);
        assert!(!ipad.is_mobile);
        assert_eq!(ipad.os_version.as_deref(), Some("16.6"));
        assert_eq!(ipad.device_type, "Tablet Device");

        let galaxy_tab = DeviceInfo::from_signal(&signal(
            "Mozilla/5.0 (Linux; Android 13; SM-X710) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ));
        assert!(galaxy_tab.is_tablet);
        assert_eq!(galaxy_tab.browser_family, "Chrome");
        assert_eq!(galaxy_tab.display_name(), "Samsung SM-X710");
    }

    #[test]
    fn legacy_internet_explorer() {
        let ie11 = DeviceInfo::from_signal(&signal(
            "Mozilla/5.0 (Windows NT 6.1; Trident/7.0; rv:11.0) like Gecko",
        ));
        assert_eq!(ie11.browser_family, "IE");
        assert_eq!(ie11.browser_version.as_deref(), Some("11.0"));
        assert_eq!(ie11.os_version.as_deref(), Some("7"));
    }

    #[test]
    fn scripted_clients_and_previews_are_bots() {
        for ua in [
            "curl/8.4.0",
            "python-requests/2.31.0",
            "Go-http-client/1.1",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
             HeadlessChrome/120.0.0.0 Safari/537.36",
            "facebookexternalhit/1.1 (+http://www.facebook.com/externalhit_uatext.php)",
        ] {
            let info = DeviceInfo::from_signal(&signal(ua));
            assert!(info.is_bot, "{ua}");
            assert!(!info.is_pc, "{ua}");
            assert_eq!(info.device_type, "Bot", "{ua}");
        }
    }

    #[test]
    fn empty_agent_is_unknown_device() {
        let info = DeviceInfo::from_signal(&DeviceSignal::default());
        assert_eq!(info.browser_family, UNKNOWN_FAMILY);
        assert_eq!(info.display_name(), UNKNOWN_DEVICE_NAME);
    }

    #[test]
    fn fingerprint_is_stable_and_header_sensitive() {
        let a = DeviceInfo::from_signal(&signal(CHROME_WINDOWS));
        let b = DeviceInfo::from_signal(&signal(CHROME_WINDOWS));
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint.len(), 16);

        let mut other = signal(CHROME_WINDOWS);
        other.accept_language = Some("fr-FR".to_string());
        assert_ne!(DeviceInfo::from_signal(&other).fingerprint, a.fingerprint);

        let mut sized = signal(CHROME_WINDOWS);
        sized.screen_width = Some("1920".to_string());
        sized.screen_height = Some("1080".to_string());
        assert_ne!(DeviceInfo::from_signal(&sized).fingerprint, a.fingerprint);
    }

    #[test]
    fn fingerprint_ignores_ip_address() {
        let a = signal(CHROME_WINDOWS);
        let mut b = a.clone();
        b.ip_address = "198.51.100.1".to_string();
        assert_eq!(
            DeviceInfo::from_signal(&a).fingerprint,
            DeviceInfo::from_signal(&b).fingerprint
        );
    }

    #[test]
    fn fingerprint_skips_empty_parts() {
        assert_eq!(
            fingerprint(&[Some("a"), None, Some(""), Some("b")]),
            fingerprint(&[Some("a"), Some("b")])
        );
    }
}
