use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use rustc_hash::FxHashMap;

use crate::config::{Locale, Options};
use crate::util::{slugify, strip_markup, truncate_chars};
use crate::value::Value;

/// The signature of a template helper: arguments in, text out.
pub type HelperFn = dyn Fn(&[Value]) -> String + Send + Sync;

/// A registry of named helpers callable as `{{name arg...}}`.
#[derive(Clone, Default)]
pub struct Helpers {
    helpers: FxHashMap<Arc<str>, Arc<HelperFn>>,
}

const ENGLISH_MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July",
    "August", "September", "October", "November", "December",
];

impl Helpers {
    /// An empty registry.
    pub fn new() -> Self {
        Helpers::default()
    }

    /// The built-in helpers, configured by `options`:
    ///
    ///   * `formatDate date`: a long-form date in the configured locale.
    ///   * `truncate text [length=100]`: plain text cut to `length` chars.
    ///   * `excerpt text [length=160]`: `truncate` with an excerpt length.
    ///   * `slugify text`, `deslug slug`.
    ///   * `capitalize text`, `upper text`, `lower text`.
    ///   * `default value fallback`.
    ///   * `canonical filename [domain]`.
    ///   * `now`: today's date in the locale's short numeric form.
    ///
    /// ```rust
    /// use gazette::Options;
    /// use gazette::templating::Helpers;
    /// use gazette::value::Value;
    ///
    /// let helpers = Helpers::builtin(&Options::default());
    /// let date = helpers.call("formatDate", &[Value::from("2026-10-16")]);
    /// assert_eq!(date.as_deref(), Some("16 tháng 10, 2026"));
    ///
    /// let slug = helpers.call("slugify", &[Value::from("Đà Nẵng Test")]);
    /// assert_eq!(slug.as_deref(), Some("da-nang-test"));
    /// assert!(helpers.call("shout", &[]).is_none());
    /// ```
    pub fn builtin(options: &Options) -> Self {
        let mut helpers = Helpers::new();
        let locale = options.locale;
        let base_url: Arc<str> = options.base_url.trim_end_matches('/').into();

        helpers.register("formatDate", move |args| {
            arg(args, 0).and_then(parse_date)
                .map(|date| long_date(date, locale))
                .unwrap_or_default()
        });

        helpers.register("truncate", |args| excerpt(args, 100));
        helpers.register("excerpt", |args| excerpt(args, 160));
        helpers.register("slugify", |args| slugify(&text(args, 0)));
        helpers.register("deslug", |args| text(args, 0).replace('-', " "));
        helpers.register("upper", |args| text(args, 0).to_uppercase());
        helpers.register("lower", |args| text(args, 0).to_lowercase());
        helpers.register("capitalize", |args| {
            let text = text(args, 0);
            let mut chars = text.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        });

        helpers.register("default", |args| match arg(args, 0) {
            Some(value) if value.is_truthy() => value.to_string(),
            _ => text(args, 1).into_owned(),
        });

        helpers.register("canonical", move |args| {
            let Some(filename) = arg(args, 0) else {
                return String::new();
            };

            match arg(args, 1) {
                Some(domain) => format!("{domain}/{filename}"),
                None => format!("{base_url}/{filename}"),
            }
        });

        helpers.register("now", move |_| {
            short_date(chrono::Local::now().date_naive(), locale)
        });

        helpers
    }

    /// Registers `helper` as `name`, returning the helper it replaced.
    pub fn register<N, F>(&mut self, name: N, helper: F) -> Option<Arc<HelperFn>>
        where N: Into<Arc<str>>, F: Fn(&[Value]) -> String + Send + Sync + 'static
    {
        self.helpers.insert(name.into(), Arc::new(helper))
    }

    pub fn get(&self, name: &str) -> Option<&HelperFn> {
        self.helpers.get(name).map(|helper| &**helper)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Calls the helper `name` with `args`, or returns `None` if there is no
    /// such helper.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<String> {
        self.get(name).map(|helper| helper(args))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.helpers.keys().map(|name| &**name)
    }
}

impl fmt::Debug for Helpers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Helpers").field("names", &names).finish()
    }
}

/// The `i`th argument if it is present and not `null`.
fn arg(args: &[Value], i: usize) -> Option<&Value> {
    args.get(i).filter(|v| !v.is_null())
}

/// The string form of the `i`th argument, empty if absent.
fn text(args: &[Value], i: usize) -> Cow<'_, str> {
    match arg(args, i) {
        Some(Value::String(s)) => Cow::Borrowed(&**s),
        Some(value) => Cow::Owned(value.to_string()),
        None => Cow::Borrowed(""),
    }
}

/// The `i`th argument as a character count: a number, or a string holding
/// one. Negative counts are zero.
fn count(args: &[Value], i: usize) -> Option<usize> {
    let n = match arg(args, i)? {
        Value::Num(n) => n.to_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    (!n.is_nan()).then(|| n.max(0.0) as usize)
}

fn excerpt(args: &[Value], default_length: usize) -> String {
    let text = text(args, 0);
    let length = count(args, 1).unwrap_or(default_length);
    truncate_chars(&strip_markup(&text), length).into_owned()
}

/// Interprets `value` as a calendar date: an RFC 3339 timestamp, a
/// `YYYY-MM-DD` date with an optional `HH:MM:SS` time, or a number of
/// milliseconds since the Unix epoch. Timestamps keep their own offset's
/// calendar date.
fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
                return Some(datetime.date_naive());
            }

            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Some(date);
            }

            ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"].into_iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|datetime| datetime.date())
        }
        Value::Num(n) => {
            let millis = n.to_f64();
            if !millis.is_finite() {
                return None;
            }

            DateTime::from_timestamp_millis(millis as i64).map(|dt| dt.date_naive())
        }
        _ => None,
    }
}

fn long_date(date: NaiveDate, locale: Locale) -> String {
    match locale {
        Locale::Vi => format!("{} tháng {}, {}", date.day(), date.month(), date.year()),
        Locale::En => {
            let month = ENGLISH_MONTHS[date.month0() as usize];
            format!("{} {}, {}", month, date.day(), date.year())
        }
    }
}

fn short_date(date: NaiveDate, locale: Locale) -> String {
    match locale {
        Locale::Vi => date.format("%d/%m/%Y").to_string(),
        Locale::En => date.format("%m/%d/%Y").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> String {
        Helpers::builtin(&Options::default())
            .call(name, args)
            .unwrap_or_else(|| panic!("missing helper {name}"))
    }

    #[test]
    fn format_date_is_locale_long_form() {
        assert_eq!(call("formatDate", &["2026-10-16".into()]), "16 tháng 10, 2026");
        assert_eq!(call("formatDate", &["2024-01-05T08:30:00+07:00".into()]), "5 tháng 1, 2024");
        assert_eq!(call("formatDate", &["2024-03-09 23:15:00".into()]), "9 tháng 3, 2024");
        assert_eq!(call("formatDate", &[Value::from(0)]), "1 tháng 1, 1970");

        let options = Options { locale: Locale::En, ..Options::default() };
        let helpers = Helpers::builtin(&options);
        let date = helpers.call("formatDate", &["2026-10-16T10:00:00".into()]);
        assert_eq!(date.as_deref(), Some("October 16, 2026"));
    }

    #[test]
    fn invalid_dates_are_empty() {
        assert_eq!(call("formatDate", &["not a date".into()]), "");
        assert_eq!(call("formatDate", &["".into()]), "");
        assert_eq!(call("formatDate", &[Value::Null]), "");
        assert_eq!(call("formatDate", &[Value::from(true)]), "");
        assert_eq!(call("formatDate", &[]), "");
    }

    #[test]
    fn truncate_strips_markup_first() {
        assert_eq!(call("truncate", &["<b>hello world</b>".into(), 5.into()]), "hello...");
        assert_eq!(call("truncate", &["<i>short</i>".into(), 5.into()]), "short");
        assert_eq!(call("truncate", &["abc".into(), "2".into()]), "ab...");
        assert_eq!(call("truncate", &[Value::Null, 5.into()]), "");

        let long = "x".repeat(120);
        assert_eq!(call("truncate", &[long.as_str().into()]).len(), 103);
        assert_eq!(call("excerpt", &[long.as_str().into()]), long);
    }

    #[test]
    fn text_helpers() {
        assert_eq!(call("slugify", &["Đà Nẵng Test".into()]), "da-nang-test");
        assert_eq!(call("deslug", &["bao-hiem-o-to".into()]), "bao hiem o to");
        assert_eq!(call("capitalize", &["đà nẵng".into()]), "Đà nẵng");
        assert_eq!(call("capitalize", &["".into()]), "");
        assert_eq!(call("upper", &["tin tức".into()]), "TIN TỨC");
        assert_eq!(call("lower", &["ABC".into()]), "abc");
        assert_eq!(call("upper", &[Value::Null]), "");
    }

    #[test]
    fn default_uses_truthiness() {
        assert_eq!(call("default", &["An".into(), "Khách".into()]), "An");
        assert_eq!(call("default", &["".into(), "Khách".into()]), "Khách");
        assert_eq!(call("default", &[0.into(), "none".into()]), "none");
        assert_eq!(call("default", &[Value::Null, "none".into()]), "none");
        assert_eq!(call("default", &[false.into()]), "");
    }

    #[test]
    fn canonical_joins_domain_and_filename() {
        assert_eq!(
            call("canonical", &["tin-tuc.html".into()]),
            "https://baohiembaovietdanang.vn/tin-tuc.html"
        );

        assert_eq!(
            call("canonical", &["a.html".into(), "https://example.vn".into()]),
            "https://example.vn/a.html"
        );

        assert_eq!(call("canonical", &[Value::Null]), "");
    }

    #[test]
    fn now_is_short_numeric_date() {
        let today = call("now", &[]);
        let parts: Vec<_> = today.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[2].len(), 4);
    }

    #[test]
    fn registered_helpers_replace_builtins() {
        let mut helpers = Helpers::builtin(&Options::default());
        assert!(helpers.register("upper", |_| "!".into()).is_some());
        assert!(helpers.register("shout", |args| format!("{}!", text(args, 0))).is_none());

        assert_eq!(helpers.call("upper", &["a".into()]).as_deref(), Some("!"));
        assert_eq!(helpers.call("shout", &["hi".into()]).as_deref(), Some("hi!"));
        assert!(helpers.names().any(|name| name == "formatDate"));
    }
}
