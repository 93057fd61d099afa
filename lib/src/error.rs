use std::{fmt, io};
use std::panic::Location;
use std::convert::Infallible;
use std::error::Error as StdError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification of an [`Error`].
///
/// Most errors are [`ErrorKind::Other`]. The remaining kinds mark failures a
/// caller is expected to branch on, such as a page whose template could not be
/// loaded at all.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The top-level template of a render call could not be loaded.
    TemplateLoad,
    /// An analytics batch could not be delivered.
    Transport,
    /// Options could not be read or parsed.
    Config,
    /// Anything else.
    Other,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    detail: Box<dyn ErrorDetail>,
    prev: Option<Box<Error>>,
    location: &'static Location<'static>,
}

pub trait ErrorDetail: fmt::Display + fmt::Debug + Send + Sync {
    fn context(&self) -> Vec<(Option<String>, String)> { vec![] }
}

impl Error {
    #[track_caller]
    pub fn from_std<E>(error: E) -> Self
        where E: StdError + Send + Sync + 'static
    {
        Error::from(Box::new(error) as Box<dyn StdError + Send + Sync>)
    }

    /// Returns `self` tagged as `kind`.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// The kind of the outermost error in the chain that isn't
    /// [`ErrorKind::Other`], or `Other` if there is none.
    pub fn kind(&self) -> ErrorKind {
        match (self.kind, &self.prev) {
            (ErrorKind::Other, Some(prev)) => prev.kind(),
            (kind, _) => kind,
        }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }

    /// The message of the outermost error, without context.
    pub fn message(&self) -> String {
        self.detail.to_string()
    }

    /// Places `self` behind `other`: `other` becomes the outer error.
    pub fn chain(self, mut other: Error) -> Self {
        fn _chain(error: Error, behind: &mut Error) {
            match behind.prev.as_mut() {
                Some(prev) => _chain(error, prev),
                None => behind.prev = Some(Box::new(error)),
            }
        }

        _chain(self, &mut other);
        other
    }
}

impl ErrorDetail for &(dyn StdError + Send + Sync) {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let mut ctxt = vec![];
        let mut error = self.source();
        while let Some(e) = error {
            ctxt.push((None, e.to_string()));
            error = e.source();
        }

        ctxt
    }
}

impl ErrorDetail for Box<dyn StdError + Send + Sync> {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let error: &(dyn StdError + Send + Sync) = &**self;
        error.context()
    }
}

macro_rules! impl_error_detail_with_std_error {
    ($T:ty) => {
        impl $crate::error::ErrorDetail for $T {
            fn context(&self) -> Vec<(Option<String>, String)> {
                let error: &(dyn std::error::Error + Send + Sync) = self;
                error.context()
            }
        }
    }
}

impl_error_detail_with_std_error!(io::Error);
impl_error_detail_with_std_error!(toml::de::Error);
impl_error_detail_with_std_error!(serde_json::Error);
impl_error_detail_with_std_error!(tokio::task::JoinError);
impl_error_detail_with_std_error!(url::ParseError);

#[cfg(feature = "http")]
impl_error_detail_with_std_error!(reqwest::Error);

impl ErrorDetail for String { }
impl ErrorDetail for &str { }

impl ErrorDetail for Infallible { }

impl<T: ErrorDetail + 'static> From<T> for Error {
    #[track_caller]
    fn from(detail: T) -> Self {
        Error {
            kind: ErrorKind::Other,
            detail: Box::new(detail),
            prev: None,
            location: Location::caller(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Copy, Clone)] struct Indent(usize);

        impl fmt::Display for Indent {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for _ in 0..(self.0 * 4) { write!(f, " ")? }
                Ok(())
            }
        }

        struct NestedError<'a>(Indent, &'a Error);

        impl fmt::Display for NestedError<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let NestedError(indent, e) = self;
                let indent_line = format!("\n{indent}");

                writeln!(f, "{indent}{}", e.detail.to_string().replace('\n', &indent_line))?;
                for (key, value) in e.detail.context() {
                    let value = value.replace('\n', &indent_line);
                    match key {
                        Some(key) => writeln!(f, "{indent}{key}: {value}")?,
                        None => writeln!(f, "{indent}{value}")?,
                    }
                }

                if std::env::var_os("RUST_BACKTRACE").is_some() {
                    writeln!(f, "{indent}[{}]", e.location)?;
                }

                if let Some(prev) = &e.prev {
                    NestedError(Indent(indent.0 + 1), prev).fmt(f)?;
                }

                Ok(())
            }
        }

        NestedError(Indent(0), self).fmt(f)
    }
}

#[derive(Debug)]
pub struct MakeshiftError {
    pub message: String,
    pub parameters: Vec<(Option<String>, String)>,
}

#[doc(hidden)]
#[macro_export]
macro_rules! err {
    ($($token:tt)*) => (Err($crate::error!($($token)*)));
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    (@param $v:ident $key:expr => $value:expr, $($rest:tt)*) => {
        $crate::error!(@param $v $key => $value);
        $crate::error!(@param $v $($rest)*);
    };

    (@param $v:ident $key:expr => $value:expr) => {
        $v.push((Some($key.to_string()), $value.to_string()));
    };

    (@param $v:ident $value:expr, $($rest:tt)*) => {
        $crate::error!(@param $v $value);
        $crate::error!(@param $v $($rest)*);
    };

    (@param $v:ident $value:expr) => {
        $v.push((None, $value.to_string()));
    };

    (@param $v:ident $(,)?) => { };

    ($msg:expr, $($rest:tt)*) => (
        $crate::error::Error::from($crate::error::MakeshiftError {
            message: $msg.to_string(),
            parameters: {
                #[allow(unused_mut)]
                let mut v: Vec<(Option<String>, String)> = Vec::new();
                $crate::error!(@param v $($rest)*);
                v
            },
        })
    );

    ($msg:expr) => ( $crate::error!($msg,) );
}

impl fmt::Display for MakeshiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

impl ErrorDetail for MakeshiftError {
    fn context(&self) -> Vec<(Option<String>, String)> {
        self.parameters.clone()
    }
}

pub trait Chainable<T> {
    fn chain(self, other: impl Into<Error>) -> Result<T>;

    fn chain_with<F, E>(self, f: F) -> Result<T>
        where F: FnOnce() -> E, E: Into<Error>;
}

impl<T, E: Into<Error>> Chainable<T> for Result<T, E> {
    #[track_caller]
    fn chain(self, other: impl Into<Error>) -> Result<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().chain(other.into()))
        }
    }

    #[track_caller]
    fn chain_with<F, Err>(self, f: F) -> Result<T>
        where F: FnOnce() -> Err, Err: Into<Error>,
    {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(e.into().chain(f().into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_inherited_through_chain() {
        let inner = error!("file not found", "path" => "templates/page.html")
            .with_kind(ErrorKind::TemplateLoad);

        let outer: Result<()> = Err(inner).chain(error!("render failed"));
        let outer = outer.unwrap_err();
        assert!(outer.is(ErrorKind::TemplateLoad));
        assert_eq!(outer.message(), "render failed");
    }

    #[test]
    fn outer_kind_wins() {
        let inner = error!("bad toml").with_kind(ErrorKind::Config);
        let outer = inner.chain(error!("send failed").with_kind(ErrorKind::Transport));
        assert_eq!(outer.kind(), ErrorKind::Transport);
    }

    #[test]
    fn display_includes_parameters_and_previous() {
        let e: Result<()> = err!("could not load", "path" => "a.html", "permission denied");
        let e = e.chain(error!("render of a.html failed")).unwrap_err();
        let rendered = e.to_string();
        assert!(rendered.starts_with("render of a.html failed\n"));
        assert!(rendered.contains("    could not load\n"));
        assert!(rendered.contains("    path: a.html\n"));
        assert!(rendered.contains("    permission denied\n"));
    }
}
