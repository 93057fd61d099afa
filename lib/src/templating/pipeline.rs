use std::fmt::Write;
use std::sync::Arc;

use crate::templating::{Diagnostic, Helpers};
use crate::templating::syntax::{self, Arg, Condition, Node, Tag, TagKind, Tags};
use crate::util::is_template;
use crate::value::{Dict, Value};

/// Runs the post-include stages over already-expanded template text.
///
/// Loops, conditionals, helpers, and variables are evaluated in a single
/// walk over the parsed block tree: blocks are resolved before the tags in
/// their bodies, and a loop body sees its [`frame()`] as the record. Cleanup
/// runs last over the complete output.
pub(crate) struct Renderer<'e> {
    helpers: &'e Helpers,
    diagnostics: Vec<Diagnostic>,
}

impl<'e> Renderer<'e> {
    pub fn new(helpers: &'e Helpers) -> Self {
        Renderer { helpers, diagnostics: vec![] }
    }

    pub fn render(&mut self, text: &str, record: &Value) -> String {
        if !is_template(text) {
            return cleanup(text);
        }

        let nodes = syntax::parse(text);
        let mut output = String::with_capacity(text.len());
        self.render_nodes(&nodes, record, &mut output);
        cleanup(&output)
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn render_nodes(&mut self, nodes: &[Node<'_>], scope: &Value, out: &mut String) {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Each { path, body } => self.render_each(path, body, scope, out),
                Node::If { condition, body } => {
                    if holds(condition, scope) {
                        self.render_nodes(body, scope, out);
                    }
                }
                Node::Tag(tag, kind) => self.render_tag(tag, kind, scope, out),
            }
        }
    }

    fn render_each(&mut self, path: &str, body: &[Node<'_>], scope: &Value, out: &mut String) {
        let Some(items) = scope.lookup(path).and_then(Value::as_slice) else {
            return;
        };

        for (i, item) in items.iter().enumerate() {
            let frame = frame(scope, item, i, items.len());
            self.render_nodes(body, &frame, out);
        }
    }

    fn render_tag(&mut self, tag: &Tag<'_>, kind: &TagKind<'_>, scope: &Value, out: &mut String) {
        match *kind {
            TagKind::Variable(path) => {
                if let Some(value) = scope.lookup(path) {
                    let _ = write!(out, "{value}");
                }
            }
            TagKind::Helper { name, args } => match self.helpers.get(name) {
                Some(helper) => {
                    let args: Vec<Value> = syntax::args(args).into_iter()
                        .map(|arg| resolve_arg(arg, scope))
                        .collect();

                    out.push_str(&helper(&args));
                }
                None => {
                    tracing::warn!(helper = name, tag = tag.raw, "unknown template helper");
                    self.diagnostics.push(Diagnostic::UnknownHelper { name: name.into() });
                    out.push_str(tag.raw);
                }
            },
            TagKind::Include(path) => {
                tracing::debug!(include = path, "nested include not expanded");
                self.diagnostics.push(Diagnostic::NestedInclude { path: path.into() });
                out.push_str(tag.raw);
            }
            TagKind::If(_) | TagKind::Each(_) | TagKind::EndIf | TagKind::EndEach
                | TagKind::Malformed =>
            {
                tracing::debug!(tag = tag.raw, "dropping malformed tag");
                self.diagnostics.push(Diagnostic::MalformedTag { tag: tag.raw.into() });
            }
        }
    }
}

fn holds(condition: &Condition<'_>, scope: &Value) -> bool {
    match *condition {
        Condition::Truthy(path) => scope.lookup(path).map_or(false, Value::is_truthy),
        Condition::Not(path) => !scope.lookup(path).map_or(false, Value::is_truthy),
        Condition::Eq(path, literal) => scope.lookup(path).and_then(Value::as_str) == Some(literal),
        Condition::Ne(path, literal) => scope.lookup(path).and_then(Value::as_str) != Some(literal),
    }
}

fn resolve_arg(arg: Arg<'_>, scope: &Value) -> Value {
    match arg {
        Arg::Str(s) => Value::from(s),
        Arg::Num(n) => Value::Num(n),
        Arg::Path(path) => scope.lookup(path).cloned().unwrap_or_default(),
    }
}

/// The record seen by one iteration of an `#each` loop: the fields of
/// `outer`, overlaid by the fields of `item` if it is a dictionary, plus
/// `this` (the item itself), `__index`, `__first`, `__last`, and `__length`.
pub(crate) fn frame(outer: &Value, item: &Value, index: usize, length: usize) -> Value {
    let mut dict: Dict = outer.as_dict().cloned().unwrap_or_default();
    if let Some(fields) = item.as_dict() {
        dict.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    dict.insert("this".into(), item.clone());
    dict.insert("__index".into(), index.into());
    dict.insert("__first".into(), (index == 0).into());
    dict.insert("__last".into(), (index + 1 == length).into());
    dict.insert("__length".into(), length.into());
    Value::Dict(Arc::new(dict))
}

/// Removes every remaining tag, collapses runs of three or more line breaks
/// (with any whitespace between them) into one blank line, and trims the
/// result.
pub(crate) fn cleanup(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut last = 0;
    for tag in Tags::new(text) {
        stripped.push_str(&text[last..tag.start]);
        last = tag.span().end;
    }

    stripped.push_str(&text[last..]);
    collapse_blank_lines(&stripped).trim().to_owned()
}

/// Within each whitespace run holding at least three `\n`, replaces
/// everything from the first to the last `\n` with `\n\n`.
fn collapse_blank_lines(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    while let Some((start, ch)) = chars.next() {
        if !ch.is_whitespace() {
            output.push(ch);
            continue;
        }

        let mut end = start + ch.len_utf8();
        while let Some(&(i, c)) = chars.peek() {
            if !c.is_whitespace() {
                break;
            }

            end = i + c.len_utf8();
            chars.next();
        }

        let run = &text[start..end];
        let newlines = run.bytes().filter(|b| *b == b'\n').count();
        match (run.find('\n'), run.rfind('\n')) {
            (Some(first), Some(last)) if newlines >= 3 => {
                output.push_str(&run[..first]);
                output.push_str("\n\n");
                output.push_str(&run[last + 1..]);
            }
            _ => output.push_str(run),
        }
    }

    output
}
