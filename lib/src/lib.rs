#![doc = svgbobdoc::transform!(
//! Server-side page rendering and client analytics batching for a news site.
//!
//! # Overview
//!
//! Gazette has two independent halves. The first turns stored article
//! records into static HTML pages through a small templating engine. The
//! second collects analytics events, buffers them, and delivers them to a
//! remote collector in batches.
//!
//! ## Rendering
//!
//! ```svgbob
//!   +--------+   key   +--------+  miss   +--------+
//!   | caller |-------->| Engine |-------->| Loader |
//!   +--------+         +---+----+         +--------+
//!       |                  |  ^
//!       | data             |  | hit
//!       v                  v  |
//!  +----------+       +-------+-------+
//!  |  Value   |       | TemplateCache |
//!  +----+-----+       +---------------+
//!       |
//!       v
//!  include -> each -> if -> helper -> variable -> cleanup -> HTML
//! ```
//!
//! A template is fetched through the [`templating::Engine`], which consults
//! its bounded FIFO cache before asking its [`templating::Loader`]. The text
//! then passes through a fixed sequence of stages:
//!
//!   1. `{{include "path"}}` tags are replaced by the included text. Includes
//!      inside included text are not expanded.
//!   2. `{{#each path}}...{{/each}}` blocks repeat their body per element.
//!   3. `{{#if cond}}...{{/if}}` blocks keep or drop their body.
//!   4. `{{helper arg...}}` tags call a registered [`templating::Helpers`]
//!      function.
//!   5. `{{path}}` tags are replaced by the [`value::Value`] at `path`.
//!   6. Anything left that looks like a tag is removed, runs of blank lines
//!      are collapsed, and the output is trimmed.
//!
//! Only the failure to load the top-level template is an error. Everything
//! else degrades and is reported as a [`templating::Diagnostic`].
//!
//! ## Analytics
//!
//! ```svgbob
//!  +---------+ emit  +---------+ track  +------------+ send  +-----------+
//!  | browser |------>| Tracker |------->| Dispatcher |------>| Transport |
//!  +---------+       +---------+        +-----+------+       +-----------+
//!                                             |
//!                                             v
//!                                       +-------------+
//!                                       | EventBuffer |
//!                                       +-------------+
//! ```
//!
//! The [`analytics::Dispatcher`] buffers [`analytics::AnalyticsEvent`]s and
//! flushes them either when the buffer reaches the batch size or after a
//! quiet period. Failed batches are put back at the front of the buffer and
//! retried with a growing delay until the retry budget is spent.
)]

#[macro_use]
pub mod error;
pub mod util;
pub mod value;
pub mod config;
pub mod templating;
pub mod article;
pub mod analytics;

pub use config::{Options, Locale};
pub use error::{Error, ErrorKind, Result};

pub use async_trait::async_trait;
