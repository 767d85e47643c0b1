//! Lightweight handlebars-style template interpolation.
//!
//! A template is compiled once into a flat token stream and can then be
//! rendered any number of times against different data:
//!
//! ```
//! use easybars::{Easybars, Options};
//!
//! let engine = Easybars::new(Options::default());
//! let template = engine.compile("Hello {{user.name}}!");
//!
//! #[derive(serde::Serialize)]
//! struct Data {
//!     user: User,
//! }
//! #[derive(serde::Serialize)]
//! struct User {
//!     name: String,
//! }
//!
//! let out = template.render(&Data {
//!     user: User { name: "Ada".to_string() },
//! });
//! assert_eq!(out, "Hello Ada!");
//! ```
//!
//! Supported tags: `{{path}}` interpolation, `{{{path}}}` HTML-encoding
//! interpolation, `{{#if [!]path}}...{{/if}}`, `{{#each path}}...{{/each}}`,
//! `{{#for [n] path}}...{{/for}}` and `{{#component name[:path]}}`.
//!
//! The engine never fails at render time: missing keys echo the tag back
//! (or nothing, with `remove_unmatched`), unknown sections and stray close
//! tags are dropped, and unterminated tags render as literal text.

pub mod error;
mod lexer;
mod options;
mod render;
mod ser;
mod value;

pub use error::Error;
pub use options::{Options, Tags};
pub use ser::to_value;
pub use value::Value;

use indexmap::IndexMap;
use lexer::Token;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

/// Named sub-templates available to `{{#component name}}` tags. Names may
/// contain dots and are looked up verbatim.
pub type Components = IndexMap<String, String>;

/// Template factory carrying the compile-time configuration.
pub struct Easybars {
    options: Options,
}

impl Easybars {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// Tokenize a template. The result owns its token stream and can be
    /// rendered repeatedly and concurrently.
    pub fn compile(&self, template: &str) -> Template {
        self.compile_with_components(template, Components::new())
    }

    pub fn compile_with_components(&self, template: &str, components: Components) -> Template {
        let tokens = lexer::tokenize(template, &self.options);
        debug!(tokens = tokens.len(), components = components.len(), "compiled template");
        Template {
            escapes: render::compile_escapes(&self.options.escape),
            options: self.options.clone(),
            tokens,
            components,
        }
    }
}

impl Default for Easybars {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

/// A compiled template: the token stream plus everything needed to render
/// it. Rendering walks the stream through an index cursor and never mutates
/// it, so `&Template` is freely shared across threads and renders.
pub struct Template {
    tokens: Vec<Token>,
    options: Options,
    escapes: Vec<Regex>,
    components: Components,
}

impl Template {
    /// Render against any serializable data. Serialization problems degrade
    /// to an empty context rather than failing the render; use [`to_value`]
    /// plus [`Template::render_value`] to observe them.
    pub fn render<T: Serialize>(&self, data: &T) -> String {
        let value = to_value(data).unwrap_or_else(|_| Value::Map(IndexMap::new()));
        self.render_value(&value)
    }

    pub fn render_value(&self, data: &Value) -> String {
        render::Renderer::new(&self.options, &self.escapes, &self.components)
            .render(&self.tokens, data)
    }
}

/// One-shot form: compile and render in a single call.
pub fn render<T: Serialize>(template: &str, data: &T, options: Options) -> String {
    Easybars::new(options).compile(template).render(data)
}

/// One-shot form with components.
pub fn render_with_components<T: Serialize>(
    template: &str,
    data: &T,
    options: Options,
    components: Components,
) -> String {
    Easybars::new(options)
        .compile_with_components(template, components)
        .render(data)
}
