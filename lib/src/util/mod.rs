mod macros;

pub use macros::*;

use std::borrow::Cow;

/// Lowercase, transliterate to ASCII (so `Đ` becomes `d`), drop characters
/// that aren't alphanumerics, underscores, hyphens, or whitespace, convert
/// each run of whitespace into a single hyphen, and strip leading and trailing
/// hyphens.
///
/// Every script is transliterated, not only accented Latin: CJK or Cyrillic
/// text becomes ASCII words (`"Москва"` slugs to `"moskva"`) instead of being
/// removed.
///
/// ```rust
/// use gazette::util::slugify;
///
/// assert_eq!(slugify("Đà Nẵng Test"), "da-nang-test");
/// ```
pub fn slugify(string: &str) -> String {
    let mut output = String::with_capacity(string.len());

    let mut need_dash = false;
    for ch in string.chars() {
        for b in deunicode::deunicode_char(ch).unwrap_or("").bytes() {
            match b {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' => {
                    if need_dash {
                        output.push('-');
                        need_dash = false;
                    }

                    output.push(b.to_ascii_lowercase() as char);
                }
                // Unlike punctuation, whitespace separates words.
                b if b.is_ascii_whitespace() => need_dash = true,
                _ => { }
            }
        }
    }

    let trimmed = output.trim_matches('-');
    if trimmed.len() != output.len() {
        return trimmed.to_owned();
    }

    output
}

/// Removes everything that looks like a markup tag (`<` up to the next `>`).
///
/// ```rust
/// use gazette::util::strip_markup;
///
/// assert_eq!(strip_markup("<p>Xin <b>chào</b></p>"), "Xin chào");
/// assert_eq!(strip_markup("1 < 2"), "1 < 2");
/// ```
pub fn strip_markup(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    let Some(mut start) = memchr::memchr(b'<', bytes) else {
        return Cow::Borrowed(input);
    };

    let mut output = String::with_capacity(input.len());
    let mut copied = 0;
    while let Some(len) = memchr::memchr(b'>', &bytes[start..]) {
        output.push_str(&input[copied..start]);
        copied = start + len + 1;
        match memchr::memchr(b'<', &bytes[copied..]) {
            Some(i) => start = copied + i,
            None => break,
        }
    }

    output.push_str(&input[copied..]);
    Cow::Owned(output)
}

/// Returns the first `max` characters of `string`.
pub fn cap_chars(string: &str, max: usize) -> &str {
    match string.char_indices().nth(max) {
        Some((i, _)) => &string[..i],
        None => string,
    }
}

/// Cuts `text` to `length` characters followed by `...` if it is longer than
/// `length` characters. Otherwise returns `text` as is.
pub fn truncate_chars(text: &str, length: usize) -> Cow<'_, str> {
    let capped = cap_chars(text, length);
    if capped.len() == text.len() {
        return Cow::Borrowed(text);
    }

    Cow::Owned(format!("{capped}..."))
}

/// Returns `true` if `input` is likely to contain a template tag.
pub fn is_template(input: &str) -> bool {
    memchr::memmem::find(input.as_bytes(), b"{{").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Đà Nẵng Test"), "da-nang-test");
        assert_eq!(slugify("đường Đồng Khởi"), "duong-dong-khoi");
        assert_eq!(slugify("You & Me"), "you-me");
        assert_eq!(slugify("test\nit   now!"), "test-it-now");
        assert_eq!(slugify("  --test_-_cool- -  "), "test_-_cool");
        assert_eq!(slugify("Bảo hiểm xe ô tô 2024?"), "bao-hiem-xe-o-to-2024");
        assert_eq!(slugify("a - b"), "a---b");
        assert_eq!(slugify("Москва"), "moskva");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("plain"), "plain");
        assert_eq!(strip_markup("<b>hello world</b>"), "hello world");
        assert_eq!(strip_markup("a <br/> b <i>c"), "a  b c");
        assert_eq!(strip_markup("x < y <z> w"), "x  w");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello world", 5), "hello...");
        assert_eq!(truncate_chars("hello", 5), "hello");
        assert_eq!(truncate_chars("Đà Nẵng", 2), "Đà...");
        assert_eq!(cap_chars("Đà Nẵng", 4), "Đà N");
    }

    #[test]
    fn test_is_template() {
        assert!(is_template("Hello {{name}}"));
        assert!(!is_template("Hello { name }"));
    }
}
