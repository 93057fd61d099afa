use std::fmt::Debug;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{Chainable, Result};

/// Fetches raw template text by key.
///
/// The engine calls this both for top-level templates and for
/// `{{include "..."}}` targets, in each case only after a cache miss.
#[async_trait]
pub trait Loader: Send + Sync + Debug {
    async fn load(&self, path: &str) -> Result<Arc<str>>;
}

/// Loads templates from files beneath a root directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        FileLoader { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `path` onto the root. Leading `./` and `/` are ignored, and `..`
    /// components are rejected.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir | Component::RootDir => continue,
                Component::ParentDir | Component::Prefix(_) => return err! {
                    "template path escapes the template root",
                    "path" => path,
                    "root" => self.root.display(),
                },
            }
        }

        Ok(resolved)
    }
}

#[async_trait]
impl Loader for FileLoader {
    async fn load(&self, path: &str) -> Result<Arc<str>> {
        let file = self.resolve(path)?;
        let text = tokio::fs::read_to_string(&file).await.chain_with(|| error! {
            "failed to read template file",
            "template" => path,
            "file path" => file.display(),
        })?;

        Ok(text.into())
    }
}

/// Serves templates from memory. Useful for embedded templates and tests.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    templates: RwLock<FxHashMap<String, Arc<str>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        MemoryLoader::default()
    }

    /// Adds or replaces the template at `path`.
    pub fn insert<K: Into<String>, V: Into<Arc<str>>>(&self, path: K, text: V) {
        self.templates.write().insert(path.into(), text.into());
    }

    pub fn remove(&self, path: &str) -> Option<Arc<str>> {
        self.templates.write().remove(path)
    }

    pub fn with<K: Into<String>, V: Into<Arc<str>>>(self, path: K, text: V) -> Self {
        self.insert(path, text);
        self
    }
}

impl<K: Into<String>, V: Into<Arc<str>>> FromIterator<(K, V)> for MemoryLoader {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let templates = iter.into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        MemoryLoader { templates: RwLock::new(templates) }
    }
}

#[async_trait]
impl Loader for MemoryLoader {
    async fn load(&self, path: &str) -> Result<Arc<str>> {
        match self.templates.read().get(path) {
            Some(text) => Ok(text.clone()),
            None => err!("template not found", "template" => path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_loader_serves_inserted_templates() {
        let loader: MemoryLoader = [("page.html", "<h1>{{title}}</h1>")].into_iter().collect();
        assert_eq!(&*loader.load("page.html").await.unwrap(), "<h1>{{title}}</h1>");

        loader.remove("page.html");
        let error = loader.load("page.html").await.unwrap_err();
        assert!(error.to_string().contains("page.html"));
    }

    #[tokio::test]
    async fn file_loader_reads_beneath_root() {
        let root = std::env::temp_dir().join(format!("gazette-loader-{}", std::process::id()));
        tokio::fs::create_dir_all(root.join("partials")).await.unwrap();
        tokio::fs::write(root.join("partials/footer.html"), "<footer/>").await.unwrap();

        let loader = FileLoader::new(&root);
        assert_eq!(&*loader.load("partials/footer.html").await.unwrap(), "<footer/>");
        assert_eq!(&*loader.load("./partials/footer.html").await.unwrap(), "<footer/>");
        assert!(loader.load("partials/missing.html").await.is_err());
        assert!(loader.load("../etc/passwd").await.is_err());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
