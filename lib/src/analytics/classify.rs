//! Pure classification of page visits: where the visitor came from, what
//! they browse with, and what the page is about.

use serde::Serialize;
use url::Url;

use crate::value::Value;
use crate::dict;

/// Where a visit came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficSource {
    pub source: String,
    pub medium: String,
    pub campaign: String,
    pub referrer: String,
}

/// Classifies a visit by its campaign parameters, or failing those, by its
/// referrer.
///
/// `utm_source` on `page_url` wins; a missing `utm_medium` or `utm_campaign`
/// is `"unknown"`. Otherwise well-known referrer hosts get a fixed source and
/// medium, other hosts are referrals, and a missing or unparseable referrer
/// is direct traffic.
///
/// ```rust
/// use gazette::analytics::traffic_source;
///
/// let source = traffic_source(Some("https://www.google.com.vn/"), None);
/// assert_eq!((&*source.source, &*source.medium), ("google", "organic"));
///
/// let source = traffic_source(None, Some("https://site.vn/?utm_source=zalo&utm_campaign=tet"));
/// assert_eq!((&*source.source, &*source.medium, &*source.campaign), ("zalo", "unknown", "tet"));
///
/// let source = traffic_source(None, None);
/// assert_eq!((&*source.source, &*source.medium, &*source.campaign), ("direct", "none", "none"));
/// ```
pub fn traffic_source(referrer: Option<&str>, page_url: Option<&str>) -> TrafficSource {
    let referrer = referrer.unwrap_or("");
    let mut source = TrafficSource {
        source: "direct".into(),
        medium: "none".into(),
        campaign: "none".into(),
        referrer: referrer.into(),
    };

    let utm = |key: &str| page_url.and_then(|url| query_param(url, key));
    if let Some(utm_source) = utm("utm_source") {
        source.source = utm_source;
        source.medium = utm("utm_medium").unwrap_or_else(|| "unknown".into());
        source.campaign = utm("utm_campaign").unwrap_or_else(|| "unknown".into());
        return source;
    }

    let host = Url::parse(referrer).ok()
        .and_then(|url| url.host_str().map(str::to_lowercase));

    let Some(host) = host else {
        return source;
    };

    let (name, medium) = match () {
        _ if host.contains("google") => ("google", "organic"),
        _ if host.contains("facebook") => ("facebook", "social"),
        _ if host.contains("zalo") => ("zalo", "social"),
        _ if host.contains("youtube") => ("youtube", "video"),
        _ => (host.as_str(), "referral"),
    };

    source.source = name.into();
    source.medium = medium.into();
    source
}

/// The first non-empty value of the query parameter `key` in `url`.
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let value = url.query_pairs()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.into_owned());

    value
}

/// Query parameters that carry a search term.
pub const SEARCH_PARAMS: &[&str] = &["q", "search", "keyword", "term"];

/// The search terms carried by `page_url`, one per parameter in
/// [`SEARCH_PARAMS`] that is present.
pub fn search_terms(page_url: &str) -> Vec<String> {
    SEARCH_PARAMS.iter()
        .filter_map(|param| query_param(page_url, param))
        .map(|term| term.trim().to_owned())
        .filter(|term| !term.is_empty())
        .collect()
}

/// The visitor's device, operating system, and browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub os: &'static str,
    pub browser: &'static str,
}

/// Classifies a user agent string.
///
/// ```rust
/// use gazette::analytics::device_info;
///
/// let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
///               (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
/// let device = device_info(iphone);
/// assert_eq!((device.kind, device.os, device.browser), ("mobile", "iOS", "Safari"));
/// ```
pub fn device_info(user_agent: &str) -> DeviceInfo {
    let ua = user_agent.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| ua.contains(n));

    let mobile = has(&["mobile", "android", "iphone", "ipad", "ipod", "blackberry", "windows phone"]);
    let kind = match mobile {
        true if has(&["ipad", "tablet"]) => "tablet",
        true => "mobile",
        false => "desktop",
    };

    let os = match () {
        _ if has(&["windows"]) => "Windows",
        _ if has(&["iphone", "ipad", "ipod", "ios"]) => "iOS",
        _ if has(&["android"]) => "Android",
        _ if has(&["mac"]) => "macOS",
        _ if has(&["linux"]) => "Linux",
        _ => "unknown",
    };

    let edge = has(&["edge", "edg/"]);
    let browser = match () {
        _ if edge => "Edge",
        _ if has(&["chrome", "crios"]) => "Chrome",
        _ if has(&["firefox", "fxios"]) => "Firefox",
        _ if has(&["safari"]) => "Safari",
        _ => "unknown",
    };

    DeviceInfo { kind, os, browser }
}

/// Labels a page by its URL path.
///
/// ```rust
/// use gazette::analytics::page_category;
///
/// assert_eq!(page_category("/bao-hiem-xe-may.html"), "Bảo hiểm xe");
/// assert_eq!(page_category("/tin-tuc/moi.html"), "Tin tức");
/// assert_eq!(page_category("/"), "Trang chủ");
/// assert_eq!(page_category("/lien-he"), "Khác");
/// ```
pub fn page_category(path: &str) -> &'static str {
    const CATEGORIES: &[(&[&str], &str)] = &[
        (&["bao-hiem-xe", "baohiemoto", "baohiemxemay"], "Bảo hiểm xe"),
        (&["bao-hiem-suc-khoe", "baohiemsuckhoe", "intercare"], "Bảo hiểm sức khỏe"),
        (&["chay-no", "baohiemchayno"], "Bảo hiểm cháy nổ"),
        (&["travel", "du-lich"], "Bảo hiểm du lịch"),
        (&["an-gia", "an-tam"], "Bảo hiểm nhân thọ"),
        (&["dang-ky", "tu-van"], "Đăng ký tư vấn"),
        (&["tin-tuc", "blog"], "Tin tức"),
    ];

    let path = path.to_lowercase();
    let category = CATEGORIES.iter()
        .find(|(needles, _)| needles.iter().any(|n| path.contains(n)))
        .map(|(_, label)| *label);

    match category {
        Some(label) => label,
        None if path == "/" || path == "/index.html" => "Trang chủ",
        None => "Khác",
    }
}

/// Words too common to describe a page.
pub const STOP_WORDS: &[&str] = &[
    "của", "và", "cho", "với", "tại", "trong", "trên", "từ", "về", "được",
    "có", "là", "một", "các", "này", "đó", "để", "như", "sẽ", "đã",
    "bảo", "hiểm", "the", "and", "for", "with", "this", "that",
];

/// The maximum number of keywords extracted from a page.
pub const MAX_KEYWORDS: usize = 20;

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word.to_lowercase().as_str())
}

/// Collects up to [`MAX_KEYWORDS`] distinct, lowercased keywords for a page,
/// in order of discovery: the comma-separated `meta_keywords`, then title
/// words longer than three characters, then path segments longer than three
/// characters (with `-` and `_` read as spaces), then heading words longer
/// than three characters that aren't [`STOP_WORDS`].
///
/// ```rust
/// use gazette::analytics::extract_keywords;
///
/// let keywords = extract_keywords(
///     Some("ô tô, Bảo Hiểm"),
///     "Bảo hiểm ô tô giá tốt",
///     "/tin-tuc/bao-hiem-o-to",
///     &["Quyền lợi của khách hàng"],
/// );
///
/// assert_eq!(keywords, ["ô tô", "bảo hiểm", "hiểm", "tin tuc", "bao hiem o to", "quyền", "khách", "hàng"]);
/// ```
pub fn extract_keywords<H: AsRef<str>>(
    meta_keywords: Option<&str>,
    title: &str,
    path: &str,
    headings: &[H],
) -> Vec<String> {
    let long = |word: &&str| word.chars().count() > 3;

    let meta = meta_keywords.into_iter()
        .flat_map(|k| k.split(','))
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty());

    let title = title.to_lowercase();
    let title = title.split_whitespace()
        .filter(long)
        .map(str::to_owned);

    let path = path.split('/')
        .filter(long)
        .map(|segment| segment.replace(['-', '_'], " ").to_lowercase());

    let headings = headings.iter()
        .flat_map(|heading| {
            let heading = heading.as_ref().to_lowercase();
            heading.split_whitespace()
                .filter(long)
                .filter(|word| !is_stop_word(word))
                .map(str::to_owned)
                .collect::<Vec<_>>()
        });

    let mut keywords: Vec<String> = vec![];
    for keyword in meta.chain(title).chain(path).chain(headings) {
        if keywords.len() == MAX_KEYWORDS {
            break;
        }

        if !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }

    keywords
}

impl From<TrafficSource> for Value {
    fn from(source: TrafficSource) -> Self {
        Value::from(dict! {
            "source" => source.source,
            "medium" => source.medium,
            "campaign" => source.campaign,
            "referrer" => source.referrer,
        })
    }
}

impl From<DeviceInfo> for Value {
    fn from(device: DeviceInfo) -> Self {
        Value::from(dict! {
            "type" => device.kind,
            "os" => device.os,
            "browser" => device.browser,
        })
    }
}
