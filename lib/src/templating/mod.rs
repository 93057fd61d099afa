mod cache;
mod helpers;
mod loader;
mod pipeline;
pub mod syntax;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::config::Options;
use crate::error::{Chainable, ErrorKind, Result};
use crate::value::Value;
use crate::util::is_template;
use syntax::{TagKind, Tags};

pub use cache::{TemplateCache, CacheStats};
pub use helpers::{Helpers, HelperFn};
pub use loader::{Loader, FileLoader, MemoryLoader};

/// Renders templates fetched through a [`Loader`], caching what it loads.
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use gazette::{dict, Options};
/// use gazette::templating::{Engine, MemoryLoader};
/// use gazette::value::Value;
///
/// let loader = MemoryLoader::new()
///     .with("page.html", "{{include \"header.html\"}}<p>{{body}}</p>")
///     .with("header.html", "<h1>{{upper title}}</h1>");
///
/// let engine = Engine::new(loader, &Options::default());
/// let data = Value::from(dict! { "title" => "tin tức", "body" => "Xin chào" });
/// let html = engine.render("page.html", &data).await.unwrap();
/// assert_eq!(html, "<h1>TIN TỨC</h1><p>Xin chào</p>");
/// # }
/// ```
#[derive(derive_more::Debug)]
pub struct Engine {
    loader: Arc<dyn Loader>,
    #[debug(ignore)]
    cache: Mutex<TemplateCache>,
    helpers: Helpers,
}

/// The output of a render along with everything that degraded on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// A problem encountered while rendering that did not stop the render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An include could not be loaded and was replaced by a comment.
    IncludeFailed { path: String, reason: String },
    /// An include tag appeared in included text. Includes are expanded once,
    /// so the tag was removed instead.
    NestedInclude { path: String },
    /// A helper tag named a helper that isn't registered.
    UnknownHelper { name: String },
    /// A tag that could not be interpreted, such as an unpaired `{{/if}}`.
    MalformedTag { tag: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::IncludeFailed { path, reason } => {
                write!(f, "include failed: {path}: {reason}")
            }
            Diagnostic::NestedInclude { path } => write!(f, "nested include not expanded: {path}"),
            Diagnostic::UnknownHelper { name } => write!(f, "unknown helper: {name}"),
            Diagnostic::MalformedTag { tag } => write!(f, "malformed tag: {tag}"),
        }
    }
}

impl Engine {
    /// An engine loading through `loader` with the built-in helpers and a
    /// cache of `options.max_cache_entries` templates.
    pub fn new<L: Loader + 'static>(loader: L, options: &Options) -> Self {
        Engine::with_loader(Arc::new(loader), options)
    }

    pub fn with_loader(loader: Arc<dyn Loader>, options: &Options) -> Self {
        Engine {
            loader,
            cache: Mutex::new(TemplateCache::new(options.max_cache_entries)),
            helpers: Helpers::builtin(options),
        }
    }

    pub fn helpers(&self) -> &Helpers {
        &self.helpers
    }

    /// Registers an additional helper, replacing any with the same `name`.
    pub fn register_helper<N, F>(&mut self, name: N, helper: F)
        where N: Into<Arc<str>>, F: Fn(&[Value]) -> String + Send + Sync + 'static
    {
        self.helpers.register(name, helper);
    }

    /// Renders the template at `key` against `data`.
    ///
    /// Fails only if the template itself cannot be loaded, in which case the
    /// error is of kind [`ErrorKind::TemplateLoad`].
    pub async fn render(&self, key: &str, data: &Value) -> Result<String> {
        self.render_report(key, data).await.map(|rendered| rendered.html)
    }

    /// Like [`Engine::render()`] but also returns the diagnostics.
    pub async fn render_report(&self, key: &str, data: &Value) -> Result<Rendered> {
        let template = self.load(key).await
            .map_err(|e| e.with_kind(ErrorKind::TemplateLoad))
            .chain_with(|| error!("failed to render template", "template" => key))?;

        let rendered = self.process(&template, data).await;
        tracing::debug!(
            template = key,
            bytes = rendered.html.len(),
            diagnostics = rendered.diagnostics.len(),
            "rendered template"
        );

        Ok(rendered)
    }

    /// Renders inline template text. Includes are loaded as usual.
    pub async fn render_str(&self, template: &str, data: &Value) -> Rendered {
        self.process(template, data).await
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
        tracing::debug!("template cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Fetches `key` from the cache, or from the loader on a miss.
    async fn load(&self, key: &str) -> Result<Arc<str>> {
        let cached = self.cache.lock().get(key);
        if let Some(template) = cached {
            tracing::trace!(template = key, "template cache hit");
            return Ok(template);
        }

        let template = self.loader.load(key).await?;
        self.cache.lock().put(key, template.clone());
        Ok(template)
    }

    async fn process(&self, template: &str, data: &Value) -> Rendered {
        let mut diagnostics = vec![];
        let expanded = self.expand_includes(template, &mut diagnostics).await;

        let mut renderer = pipeline::Renderer::new(&self.helpers);
        let html = renderer.render(&expanded, data);
        diagnostics.extend(renderer.into_diagnostics());
        Rendered { html, diagnostics }
    }

    /// Replaces each include tag in `template` with the text it names. The
    /// included text is spliced in as is: include tags inside it stay
    /// unexpanded.
    async fn expand_includes(&self, template: &str, diagnostics: &mut Vec<Diagnostic>) -> String {
        if !is_template(template) {
            return template.to_owned();
        }

        let includes: Vec<_> = Tags::new(template)
            .filter_map(|tag| match tag.kind() {
                TagKind::Include(path) => Some((tag.span(), path)),
                _ => None,
            })
            .collect();

        if includes.is_empty() {
            return template.to_owned();
        }

        let mut loaded: FxHashMap<&str, Arc<str>> = FxHashMap::default();
        for &(_, path) in &includes {
            if loaded.contains_key(path) {
                continue;
            }

            let text = match self.load(path).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(include = path, error = %e.message(), "include failed");
                    diagnostics.push(Diagnostic::IncludeFailed {
                        path: path.into(),
                        reason: e.message(),
                    });

                    format!("<!-- Include failed: {path} -->").into()
                }
            };

            loaded.insert(path, text);
        }

        let mut output = String::with_capacity(template.len());
        let mut last = 0;
        for (span, path) in includes {
            output.push_str(&template[last..span.start]);
            if let Some(text) = loaded.get(path) {
                output.push_str(text);
            }

            last = span.end;
        }

        output.push_str(&template[last..]);
        output
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::dict;

    static_assertions::assert_impl_all!(Engine: Send, Sync);

    /// Counts loads so tests can observe the cache.
    #[derive(Debug)]
    struct Counting {
        inner: MemoryLoader,
        loads: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Loader for Counting {
        async fn load(&self, path: &str) -> Result<Arc<str>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(path).await
        }
    }

    fn engine(templates: &[(&str, &str)]) -> (Engine, Arc<Counting>) {
        let inner = templates.iter().map(|(k, v)| (*k, *v)).collect();
        let loader = Arc::new(Counting { inner, loads: AtomicUsize::new(0) });
        let engine = Engine::with_loader(loader.clone(), &Options::default());
        (engine, loader)
    }

    #[tokio::test]
    async fn renders_simple_fields() {
        let (engine, _) = engine(&[("a.html", "<title>{{title}}</title>\n<p>{{count}}</p>")]);
        let data = Value::from(dict! { "title" => "Tin tức", "count" => 3 });
        let html = engine.render("a.html", &data).await.unwrap();
        assert_eq!(html, "<title>Tin tức</title>\n<p>3</p>");
    }

    #[tokio::test]
    async fn top_level_load_failure_is_an_error() {
        let (engine, _) = engine(&[]);
        let error = engine.render("missing.html", &Value::Null).await.unwrap_err();
        assert!(error.is(ErrorKind::TemplateLoad));
        assert!(error.to_string().contains("missing.html"));
    }

    #[tokio::test]
    async fn failed_includes_leave_a_comment() {
        let (engine, _) = engine(&[("page.html", "a{{include \"gone.html\"}}b")]);
        let rendered = engine.render_report("page.html", &Value::Null).await.unwrap();
        assert_eq!(rendered.html, "a<!-- Include failed: gone.html -->b");
        assert!(matches!(
            &rendered.diagnostics[..],
            [Diagnostic::IncludeFailed { path, .. }] if path == "gone.html"
        ));
    }

    #[tokio::test]
    async fn includes_are_not_recursive() {
        let (engine, _) = engine(&[
            ("page.html", "[{{include 'outer.html'}}]"),
            ("outer.html", "outer {{include 'inner.html'}}{{name}}"),
            ("inner.html", "inner"),
        ]);

        let data = Value::from(dict! { "name" => "An" });
        let rendered = engine.render_report("page.html", &data).await.unwrap();
        assert_eq!(rendered.html, "[outer An]");
        assert_eq!(rendered.diagnostics, [Diagnostic::NestedInclude { path: "inner.html".into() }]);
    }

    #[tokio::test]
    async fn included_blocks_are_processed() {
        let (engine, _) = engine(&[
            ("page.html", "{{include \"list.html\"}}{{include \"list.html\"}}"),
            ("list.html", "{{#each tags}}<li>{{this}}</li>{{/each}}"),
        ]);

        let data = Value::from(dict! { "tags" => Value::from(vec!["a", "b"]) });
        let html = engine.render("page.html", &data).await.unwrap();
        assert_eq!(html, "<li>a</li><li>b</li><li>a</li><li>b</li>");
    }

    #[tokio::test]
    async fn loaded_templates_are_cached() {
        let (engine, loader) = engine(&[("a.html", "A{{include 'b.html'}}"), ("b.html", "B")]);
        for _ in 0..3 {
            assert_eq!(engine.render("a.html", &Value::Null).await.unwrap(), "AB");
        }

        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
        let stats = engine.cache_stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.max_size, 50);
        assert_eq!(&*stats.keys[0], "a.html");

        engine.clear_cache();
        assert_eq!(engine.cache_stats().size, 0);
        engine.render("a.html", &Value::Null).await.unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn custom_helpers_are_callable() {
        let (mut engine, _) = engine(&[]);
        engine.register_helper("stars", |args| {
            let n = args.first().and_then(|v| v.to_num()).and_then(|n| n.to_i64()).unwrap_or(0);
            "★".repeat(n.max(0) as usize)
        });

        let data = Value::from(dict! { "rating" => 3 });
        let rendered = engine.render_str("{{stars rating}}{{unknown rating}}", &data).await;
        assert_eq!(rendered.html, "★★★");
        assert_eq!(rendered.diagnostics, [Diagnostic::UnknownHelper { name: "unknown".into() }]);
    }

    #[tokio::test]
    async fn collapses_blank_lines_and_trims() {
        let (engine, _) = engine(&[]);
        let template = "\n  <main>\n{{#if no}}x{{/if}}\n\n\n{{#each none}}{{/each}}\n</main>\n\n";
        let rendered = engine.render_str(template, &Value::Null).await;
        assert_eq!(rendered.html, "<main>\n\n</main>");
    }
}
