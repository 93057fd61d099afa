//! Article rows and the data record article templates render against.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::config::Options;
use crate::error::{Chainable, Result};
use crate::util::{strip_markup, truncate_chars};
use crate::value::{Format, Json, Value};
use crate::dict;

pub const SITE_NAME: &str = "Bảo Hiểm Bảo Việt Đà Nẵng";
pub const SHORT_SITE_NAME: &str = "Bảo Việt Đà Nẵng";
pub const DEFAULT_CATEGORY: &str = "Tin tức";
pub const DEFAULT_FILENAME: &str = "article.html";
pub const DEFAULT_AUTHOR_BIO: &str = "Chuyên gia tư vấn bảo hiểm";
pub const LOGO_PATH: &str = "/assets/logo.png";
pub const ROBOTS: &str = "index, follow, max-snippet:-1, max-image-preview:large, max-video-preview:-1";

/// Characters of plain text in an article excerpt.
pub const EXCERPT_LENGTH: usize = 160;

/// An article as stored in the `articles` table.
///
/// Every column but `title` may be missing or null.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Article {
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub keywords: Option<String>,
    pub published_date: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub filename: Option<String>,
    pub featured_image: Option<String>,
    pub is_featured: Option<bool>,
    /// Comma-separated.
    pub tags: Option<String>,
    pub author_name: Option<String>,
    pub author_bio: Option<String>,
    /// Comma-separated script URLs.
    pub custom_scripts: Option<String>,
}

/// `Some(s)` if `s` is present and not empty.
fn present(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

/// Strips markup from `text` and cuts it to `length` characters.
pub fn excerpt(text: &str, length: usize) -> String {
    truncate_chars(&strip_markup(text), length).into_owned()
}

impl Article {
    /// Parses an article row from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Json::from_str(json).chain(error!("invalid article row"))
    }

    /// The publish date, falling back to the creation time.
    pub fn publish_date(&self) -> Option<&str> {
        present(&self.published_date).or(present(&self.created_at))
    }

    /// The publish date as `YYYY-MM-DD`.
    pub fn publish_date_iso(&self) -> Option<&str> {
        present(&self.published_date).or_else(|| {
            present(&self.created_at).map(|at| at.split('T').next().unwrap_or(at))
        })
    }

    /// Minutes to read, at a thousand characters per minute, rounded up.
    pub fn read_time(&self) -> usize {
        let chars = self.content.as_deref().map_or(0, |c| c.chars().count());
        chars.div_ceil(1000)
    }

    pub fn tag_list(&self) -> Vec<&str> {
        split_list(present(&self.tags))
    }

    /// Builds the record consumed by article page templates.
    ///
    /// ```rust
    /// use gazette::{Options, article::Article};
    ///
    /// let article = Article {
    ///     title: "Bảo hiểm ô tô".into(),
    ///     content: Some("<p>Nội dung</p>".into()),
    ///     tags: Some("ô tô, bảo hiểm".into()),
    ///     ..Article::default()
    /// };
    ///
    /// let record = article.to_record(&Options::default());
    /// assert_eq!(record.lookup("category").unwrap().as_str(), Some("Tin tức"));
    /// assert_eq!(record.lookup("meta.description").unwrap().as_str(), Some("Nội dung"));
    /// assert_eq!(record.lookup("tags").unwrap().to_string(), "ô tô,bảo hiểm");
    /// ```
    pub fn to_record(&self, options: &Options) -> Value {
        let base_url = options.base_url.trim_end_matches('/');
        let content = self.content.as_deref().unwrap_or("");
        let description = present(&self.description);
        let logo = format!("{base_url}{LOGO_PATH}");

        let structured_data = serde_json::json!({
            "@context": "https://schema.org",
            "@type": "Article",
            "headline": self.title,
            "description": description,
            "datePublished": self.publish_date(),
            "author": { "@type": "Organization", "name": SHORT_SITE_NAME },
            "publisher": {
                "@type": "Organization",
                "name": SHORT_SITE_NAME,
                "logo": { "@type": "ImageObject", "url": logo },
            },
        });

        let meta = dict! {
            "description" => description.map_or_else(|| excerpt(content, EXCERPT_LENGTH), str::to_owned),
            "keywords" => present(&self.keywords).unwrap_or(""),
            "author" => SITE_NAME,
            "robots" => ROBOTS,
            "image" => present(&self.featured_image).map_or(logo, str::to_owned),
            "imageAlt" => self.title.as_str(),
            "featured" => self.is_featured.unwrap_or(false),
        };

        let author = dict! {
            "name" => present(&self.author_name).unwrap_or(SHORT_SITE_NAME),
            "bio" => present(&self.author_bio).unwrap_or(DEFAULT_AUTHOR_BIO),
        };

        let site = dict! { "name" => SITE_NAME, "url" => base_url };

        Value::from(dict! {
            "title" => self.title.as_str(),
            "description" => description,
            "content" => content,
            "category" => present(&self.category).unwrap_or(DEFAULT_CATEGORY),
            "keywords" => present(&self.keywords).unwrap_or(""),
            "publishDate" => self.publish_date(),
            "publishDateISO" => self.publish_date_iso(),
            "excerpt" => excerpt(description.unwrap_or(content), EXCERPT_LENGTH),
            "filename" => present(&self.filename).unwrap_or(DEFAULT_FILENAME),
            "meta" => meta,
            "site" => site,
            "tags" => self.tag_list(),
            "author" => author,
            "modifiedDate" => present(&self.updated_at).or(present(&self.created_at)),
            "readTime" => self.read_time(),
            "customScripts" => split_list(present(&self.custom_scripts)),
            "metaTitle" => self.title.as_str(),
            "metaDescription" => description,
            "metaKeywords" => present(&self.keywords),
            "structuredData" => structured_data.to_string(),
            "siteName" => SHORT_SITE_NAME,
            "siteUrl" => base_url,
            "logoUrl" => LOGO_PATH,
            "currentYear" => chrono::Local::now().year(),
        })
    }
}

fn split_list(list: Option<&str>) -> Vec<&str> {
    list.map(|list| list.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Article {
        Article::from_json(r#"{
            "id": 7,
            "title": "Bảo hiểm xe máy 2024",
            "description": "",
            "content": "<p>Xin chào</p>",
            "category": null,
            "created_at": "2024-05-01T09:00:00Z",
            "updated_at": "2024-05-03T10:00:00Z",
            "tags": "xe máy, bảo hiểm,",
            "is_featured": true,
            "custom_scripts": "/a.js,/b.js"
        }"#).unwrap()
    }

    fn text<'a>(record: &'a Value, path: &str) -> Option<&'a str> {
        record.lookup(path).and_then(Value::as_str)
    }

    #[test]
    fn defaults_missing_fields() {
        let record = row().to_record(&Options::default());
        assert_eq!(text(&record, "category"), Some("Tin tức"));
        assert_eq!(text(&record, "filename"), Some("article.html"));
        assert_eq!(text(&record, "author.name"), Some("Bảo Việt Đà Nẵng"));
        assert_eq!(text(&record, "author.bio"), Some("Chuyên gia tư vấn bảo hiểm"));
        assert_eq!(text(&record, "meta.image"), Some("https://baohiembaovietdanang.vn/assets/logo.png"));
        assert_eq!(text(&record, "site.url"), Some("https://baohiembaovietdanang.vn"));
        assert_eq!(record.lookup("meta.featured"), Some(&Value::Bool(true)));
        assert!(record.lookup("description").unwrap().is_null());
    }

    #[test]
    fn derives_dates_and_lists() {
        let record = row().to_record(&Options::default());
        assert_eq!(text(&record, "publishDate"), Some("2024-05-01T09:00:00Z"));
        assert_eq!(text(&record, "publishDateISO"), Some("2024-05-01"));
        assert_eq!(text(&record, "modifiedDate"), Some("2024-05-03T10:00:00Z"));
        assert_eq!(text(&record, "excerpt"), Some("Xin chào"));
        assert_eq!(record.lookup("readTime"), Some(&Value::from(1usize)));
        assert_eq!(record.lookup("tags").unwrap().to_string(), "xe máy,bảo hiểm");
        assert_eq!(record.lookup("customScripts").unwrap().to_string(), "/a.js,/b.js");
    }

    #[test]
    fn structured_data_is_json() {
        let record = row().to_record(&Options::default());
        let json: serde_json::Value = serde_json::from_str(text(&record, "structuredData").unwrap()).unwrap();
        assert_eq!(json["headline"], "Bảo hiểm xe máy 2024");
        assert_eq!(json["publisher"]["logo"]["url"], "https://baohiembaovietdanang.vn/assets/logo.png");
    }

    #[test]
    fn read_time_rounds_up() {
        let mut article = Article::default();
        assert_eq!(article.read_time(), 0);
        article.content = Some("a".repeat(1001));
        assert_eq!(article.read_time(), 2);
    }

    #[test]
    fn long_content_is_excerpted() {
        let article = Article { content: Some("x".repeat(200)), ..Article::default() };
        let record = article.to_record(&Options::default());
        assert_eq!(text(&record, "excerpt").map(|s| s.chars().count()), Some(163));
        assert_eq!(text(&record, "meta.description"), text(&record, "excerpt"));
    }
}
