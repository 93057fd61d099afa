//! Tag scanning and block parsing.
//!
//! A tag is `{{`, followed by at least one character that isn't `}`, followed
//! by `}}`. Everything else is text. Block tags (`#if`, `#each`) are matched
//! with their closing tags into a tree; a block tag without a partner is kept
//! as a plain tag and later dropped as malformed.

use std::ops::Range;

use crate::value::Num;

/// A `{{...}}` tag found in template text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    /// The whole tag, braces included.
    pub raw: &'a str,
    /// The text between the braces, untrimmed.
    pub inner: &'a str,
    /// The byte range of `raw` in the scanned text.
    pub start: usize,
}

impl<'a> Tag<'a> {
    pub fn span(&self) -> Range<usize> {
        self.start..self.start + self.raw.len()
    }

    pub fn kind(&self) -> TagKind<'a> {
        TagKind::of(self.inner)
    }
}

/// An iterator over the tags in a string, in order.
///
/// ```rust
/// use gazette::templating::syntax::Tags;
///
/// let tags: Vec<_> = Tags::new("a {{b}} {{}} {c}} {{ d.e }}").map(|t| t.inner).collect();
/// assert_eq!(tags, ["b", " d.e "]);
/// ```
#[derive(Debug, Clone)]
pub struct Tags<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Tags<'a> {
    pub fn new(text: &'a str) -> Self {
        Tags { text, pos: 0 }
    }
}

impl<'a> Iterator for Tags<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.text.as_bytes();
        loop {
            let open = self.pos + memchr::memmem::find(&bytes[self.pos..], b"{{")?;
            let inner_start = open + 2;
            let Some(len) = memchr::memchr(b'}', &bytes[inner_start..]) else {
                self.pos = self.text.len();
                return None;
            };

            let close = inner_start + len;
            if len == 0 || bytes.get(close + 1) != Some(&b'}') {
                self.pos = open + 1;
                continue;
            }

            self.pos = close + 2;
            return Some(Tag {
                raw: &self.text[open..close + 2],
                inner: &self.text[inner_start..close],
                start: open,
            });
        }
    }
}

/// What a tag asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind<'a> {
    /// `include "path"`
    Include(&'a str),
    /// `#if condition`
    If(Condition<'a>),
    /// `#each path`
    Each(&'a str),
    EndIf,
    EndEach,
    /// `name arg...`
    Helper { name: &'a str, args: &'a str },
    /// `path`
    Variable(&'a str),
    /// A block-like tag that doesn't parse, such as `#if` with no condition.
    Malformed,
}

impl<'a> TagKind<'a> {
    pub fn of(inner: &'a str) -> TagKind<'a> {
        let inner = inner.trim();
        if let Some(directive) = inner.strip_prefix('#') {
            return match split_word(directive) {
                ("if", Some(condition)) => TagKind::If(Condition::parse(condition)),
                ("each", Some(path)) => TagKind::Each(path),
                _ => TagKind::Malformed,
            };
        }

        if let Some(closing) = inner.strip_prefix('/') {
            return match closing.trim() {
                "if" => TagKind::EndIf,
                "each" => TagKind::EndEach,
                _ => TagKind::Malformed,
            };
        }

        let (name, rest) = split_word(inner);
        if let ("include", Some(path)) = (name, rest.and_then(unquote)) {
            return TagKind::Include(path);
        }

        match rest {
            Some(args) if is_word(name) => TagKind::Helper { name, args },
            _ => TagKind::Variable(inner),
        }
    }
}

/// Splits `s` at its first whitespace into a word and the trimmed, non-empty
/// remainder.
fn split_word(s: &str) -> (&str, Option<&str>) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => {
            let rest = rest.trim();
            (word, (!rest.is_empty()).then_some(rest))
        }
        None => (s, None),
    }
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Returns the contents of `s` if it is a non-empty string wrapped in a
/// matching pair of `"` or `'`.
fn unquote(s: &str) -> Option<&str> {
    let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = s[1..].strip_suffix(quote)?;
    (!inner.is_empty() && !inner.contains(quote)).then_some(inner)
}

/// The condition of an `#if` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition<'a> {
    /// `path`: the value at `path` is truthy.
    Truthy(&'a str),
    /// `!path`: the value at `path` is falsy or absent.
    Not(&'a str),
    /// `path === "literal"`
    Eq(&'a str, &'a str),
    /// `path !== "literal"`
    Ne(&'a str, &'a str),
}

impl<'a> Condition<'a> {
    /// Parses a condition. Negation is recognized before comparison, so
    /// `!a === "b"` tests the path `a === "b"`.
    ///
    /// ```rust
    /// use gazette::templating::syntax::Condition;
    ///
    /// assert_eq!(Condition::parse("meta.featured"), Condition::Truthy("meta.featured"));
    /// assert_eq!(Condition::parse("! draft"), Condition::Not("draft"));
    /// assert_eq!(Condition::parse("category === 'Tin tức'"), Condition::Eq("category", "Tin tức"));
    /// assert_eq!(Condition::parse(r#"lang !== "vi""#), Condition::Ne("lang", "vi"));
    /// ```
    pub fn parse(condition: &'a str) -> Self {
        let condition = condition.trim();
        if let Some(path) = condition.strip_prefix('!') {
            return Condition::Not(path.trim());
        }

        if let Some((path, literal)) = condition.split_once("===") {
            return Condition::Eq(path.trim(), literal_text(literal));
        }

        if let Some((path, literal)) = condition.split_once("!==") {
            return Condition::Ne(path.trim(), literal_text(literal));
        }

        Condition::Truthy(condition)
    }
}

fn literal_text(literal: &str) -> &str {
    literal.trim().trim_matches(|c| c == '"' || c == '\'')
}

/// An argument to a helper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg<'a> {
    /// A quoted string literal, without its quotes.
    Str(&'a str),
    /// A bare numeric literal.
    Num(Num),
    /// Anything else: a path to look up.
    Path(&'a str),
}

/// Splits helper arguments on whitespace. Quoted literals may contain
/// whitespace; an unterminated quote is read as a bare word.
///
/// ```rust
/// use gazette::templating::syntax::{args, Arg};
/// use gazette::value::Num;
///
/// assert_eq!(args(r#"meta.title 'Tin tức mới' 20"#), [
///     Arg::Path("meta.title"),
///     Arg::Str("Tin tức mới"),
///     Arg::Num(Num::Int(20)),
/// ]);
/// ```
pub fn args(input: &str) -> Vec<Arg<'_>> {
    let mut args = vec![];
    let mut rest = input.trim_start();
    while let Some(first) = rest.chars().next() {
        if first == '"' || first == '\'' {
            if let Some(end) = rest[1..].find(first) {
                args.push(Arg::Str(&rest[1..1 + end]));
                rest = rest[end + 2..].trim_start();
                continue;
            }
        }

        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        args.push(bare_arg(&rest[..end]));
        rest = rest[end..].trim_start();
    }

    args
}

fn bare_arg(word: &str) -> Arg<'_> {
    if let Ok(int) = word.parse::<i64>() {
        return Arg::Num(Num::Int(int));
    }

    let numeric = word.bytes().all(|b| b.is_ascii_digit() || b"+-.eE".contains(&b));
    match word.parse::<f64>() {
        Ok(float) if numeric => Arg::Num(Num::Float(float)),
        _ => Arg::Path(word),
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<'a> {
    Text(&'a str),
    /// A non-block tag, or a block tag that is missing its partner.
    Tag(Tag<'a>, TagKind<'a>),
    If { condition: Condition<'a>, body: Vec<Node<'a>> },
    Each { path: &'a str, body: Vec<Node<'a>> },
}

struct OpenBlock<'a> {
    tag: Tag<'a>,
    kind: TagKind<'a>,
    body: Vec<Node<'a>>,
}

impl<'a> OpenBlock<'a> {
    fn close(self) -> Node<'a> {
        match self.kind {
            TagKind::If(condition) => Node::If { condition, body: self.body },
            TagKind::Each(path) => Node::Each { path, body: self.body },
            kind => Node::Tag(self.tag, kind),
        }
    }

    /// Flattens a block that was never closed: its opening tag becomes a
    /// plain tag followed by its body.
    fn abandon(self, into: &mut Vec<Node<'a>>) {
        into.push(Node::Tag(self.tag, self.kind));
        into.extend(self.body);
    }
}

/// Parses `text` into a tree of nodes, matching each block closer with the
/// innermost open block of the same kind.
///
/// ```rust
/// use gazette::templating::syntax::{parse, Node, Condition};
///
/// let nodes = parse("Hi {{#if vip}}VIP {{/if}}");
/// assert_eq!(nodes[0], Node::Text("Hi "));
/// assert!(matches!(nodes[1], Node::If { condition: Condition::Truthy("vip"), .. }));
/// ```
pub fn parse(text: &str) -> Vec<Node<'_>> {
    fn top<'t, 'a>(root: &'t mut Vec<Node<'a>>, stack: &'t mut [OpenBlock<'a>]) -> &'t mut Vec<Node<'a>> {
        match stack.last_mut() {
            Some(block) => &mut block.body,
            None => root,
        }
    }

    let mut root = vec![];
    let mut stack: Vec<OpenBlock<'_>> = vec![];
    let mut last = 0;
    for tag in Tags::new(text) {
        if tag.start > last {
            top(&mut root, &mut stack).push(Node::Text(&text[last..tag.start]));
        }

        last = tag.start + tag.raw.len();
        let kind = tag.kind();
        let closes_top = match (kind, stack.last().map(|b| b.kind)) {
            (TagKind::EndIf, Some(TagKind::If(_))) => true,
            (TagKind::EndEach, Some(TagKind::Each(_))) => true,
            _ => false,
        };

        match kind {
            TagKind::If(_) | TagKind::Each(_) => {
                stack.push(OpenBlock { tag, kind, body: vec![] });
            }
            _ if closes_top => {
                if let Some(block) = stack.pop() {
                    let node = block.close();
                    top(&mut root, &mut stack).push(node);
                }
            }
            _ => top(&mut root, &mut stack).push(Node::Tag(tag, kind)),
        }
    }

    if last < text.len() {
        top(&mut root, &mut stack).push(Node::Text(&text[last..]));
    }

    while let Some(block) = stack.pop() {
        block.abandon(top(&mut root, &mut stack));
    }

    root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inners(text: &str) -> Vec<&str> {
        Tags::new(text).map(|tag| tag.inner).collect()
    }

    #[test]
    fn scans_tags() {
        assert_eq!(inners("{{a}}{{b}}"), ["a", "b"]);
        assert_eq!(inners("{{{a}}"), ["{a"]);
        assert_eq!(inners("{{a}b}} {{c}}"), ["c"]);
        assert_eq!(inners("{{}} {{ }}"), [" "]);
        assert_eq!(inners("{{open"), Vec::<&str>::new());
        assert_eq!(inners("Đà {{ten}} Nẵng"), ["ten"]);

        let tag = Tags::new("ab{{c}}").next().unwrap();
        assert_eq!(tag.span(), 2..7);
        assert_eq!(tag.raw, "{{c}}");
    }

    #[test]
    fn classifies_tags() {
        assert_eq!(TagKind::of(r#"include "partials/footer.html""#), TagKind::Include("partials/footer.html"));
        assert_eq!(TagKind::of("include 'nav.html'"), TagKind::Include("nav.html"));
        assert_eq!(TagKind::of("#if a.b"), TagKind::If(Condition::Truthy("a.b")));
        assert_eq!(TagKind::of("#each tags"), TagKind::Each("tags"));
        assert_eq!(TagKind::of("/if"), TagKind::EndIf);
        assert_eq!(TagKind::of(" /each "), TagKind::EndEach);
        assert_eq!(TagKind::of("#if"), TagKind::Malformed);
        assert_eq!(TagKind::of("#unless x"), TagKind::Malformed);
        assert_eq!(TagKind::of("/for"), TagKind::Malformed);
        assert_eq!(TagKind::of(" title "), TagKind::Variable("title"));
        assert_eq!(TagKind::of("upper title"), TagKind::Helper { name: "upper", args: "title" });
        assert_eq!(TagKind::of("include partial"), TagKind::Helper { name: "include", args: "partial" });
        assert_eq!(TagKind::of("a.b c"), TagKind::Variable("a.b c"));
    }

    #[test]
    fn parses_conditions() {
        assert_eq!(Condition::parse("a === b"), Condition::Eq("a", "b"));
        assert_eq!(Condition::parse("!a"), Condition::Not("a"));
        assert_eq!(Condition::parse("a !== ''"), Condition::Ne("a", ""));
    }

    #[test]
    fn tokenizes_helper_args() {
        assert_eq!(args("content 100"), [Arg::Path("content"), Arg::Num(Num::Int(100))]);
        assert_eq!(args("x 2.5 -3"), [Arg::Path("x"), Arg::Num(Num::Float(2.5)), Arg::Num(Num::Int(-3))]);
        assert_eq!(args(r#"a "b c" 'd'"#), [Arg::Path("a"), Arg::Str("b c"), Arg::Str("d")]);
        assert_eq!(args(r#""unterminated x"#), [Arg::Path("\"unterminated"), Arg::Path("x")]);
        assert_eq!(args("inf NaN"), [Arg::Path("inf"), Arg::Path("NaN")]);
        assert!(args("   ").is_empty());
    }

    #[test]
    fn nests_blocks() {
        let nodes = parse("{{#each a}}{{#if b}}{{#each c}}x{{/each}}{{/if}}{{/each}}");
        let [Node::Each { path: "a", body }] = &nodes[..] else { panic!("{nodes:?}") };
        let [Node::If { body, .. }] = &body[..] else { panic!("{body:?}") };
        let [Node::Each { path: "c", body }] = &body[..] else { panic!("{body:?}") };
        assert_eq!(body, &[Node::Text("x")]);
    }

    #[test]
    fn unbalanced_blocks_become_tags() {
        let nodes = parse("a{{/if}}b");
        assert!(matches!(nodes[1], Node::Tag(_, TagKind::EndIf)));

        let nodes = parse("{{#if x}}kept");
        assert!(matches!(nodes[0], Node::Tag(_, TagKind::If(_))));
        assert_eq!(nodes[1], Node::Text("kept"));

        let nodes = parse("{{#each xs}}{{/if}}{{/each}}");
        let [Node::Each { body, .. }] = &nodes[..] else { panic!("{nodes:?}") };
        assert!(matches!(body[0], Node::Tag(_, TagKind::EndIf)));
    }
}
