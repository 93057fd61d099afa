use crate::value::Value;

impl Value {
    /// Resolves the dotted `path` against `self`, indexing one nested
    /// dictionary per segment.
    ///
    /// Returns `None` if `path` is empty, a segment is missing, or a
    /// non-dictionary value is reached before the path is exhausted.
    ///
    /// ```rust
    /// use gazette::{dict, value::Value};
    ///
    /// let record = Value::from(dict! {
    ///     "title" => "Tin tức",
    ///     "meta" => Value::from(dict! { "description" => "Mô tả" }),
    /// });
    ///
    /// assert_eq!(record.lookup("meta.description"), Some(&Value::from("Mô tả")));
    /// assert_eq!(record.lookup("meta.keywords"), None);
    /// assert_eq!(record.lookup("title.length"), None);
    /// assert_eq!(record.lookup(""), None);
    /// ```
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }

        path.split('.').try_fold(self, |value, key| value.as_dict()?.get(key))
    }
}

/// [`Value::lookup()`] on an optional record: a missing record resolves
/// nothing.
#[inline]
pub fn resolve<'v>(record: Option<&'v Value>, path: &str) -> Option<&'v Value> {
    record?.lookup(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict;

    fn record() -> Value {
        Value::from(dict! {
            "author" => Value::from(dict! {
                "name" => "An",
                "social" => Value::from(dict! { "zalo" => "0931909697" }),
            }),
            "tags" => Value::from(vec!["bao-hiem", "o-to"]),
            "draft" => Value::Null,
        })
    }

    #[test]
    fn resolves_nested_paths() {
        let record = record();
        assert_eq!(record.lookup("author.name").and_then(Value::as_str), Some("An"));
        assert_eq!(record.lookup("author.social.zalo").and_then(Value::as_str), Some("0931909697"));
        assert!(record.lookup("author").unwrap().as_dict().is_some());
    }

    #[test]
    fn non_dict_intermediate_is_absent() {
        let record = record();
        assert_eq!(record.lookup("author.name.first"), None);
        assert_eq!(record.lookup("tags.0"), None);
        assert_eq!(record.lookup("draft.reason"), None);
    }

    #[test]
    fn present_null_is_returned() {
        assert_eq!(record().lookup("draft"), Some(&Value::Null));
    }

    #[test]
    fn missing_record_or_path_is_absent() {
        assert_eq!(resolve(None, "author.name"), None);
        assert_eq!(resolve(Some(&record()), ""), None);
        assert_eq!(resolve(Some(&record()), "author..name"), None);
        assert_eq!(resolve(Some(&Value::from("text")), "author"), None);
    }
}
