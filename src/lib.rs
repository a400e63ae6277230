//! Stencil, a server side HTML template engine.
//!
//! Stencil renders templates written with a Jinja like syntax (`{{ value }}`, `{% if %}`,
//! `{% for %}`, `{% raw %}` and `{% loadblock %}`) against a `serde_json::Value`. Along with the
//! body, a rendered `Page` carries what the HTTP layer sends with it: the status line, the content
//! type, the encoding, an optional redirect and the `Set-Cookie` headers.
//!
//! ```
//! let engine = stencil::Engine::with_root("./tests");
//!
//! let mut page = stencil::Page::new("{% for m in get_flashed_messages() %}<p>{{ m }}</p>{% endfor %}");
//! page.flash("Saved", "info");
//! engine.render(&mut page, &serde_json::json!({})).unwrap();
//!
//! assert_eq!(page.body(), "<p>Saved</p>");
//! ```
pub mod calc;
mod config;
pub mod context;
mod cookie;
mod engine;
mod error;
mod eval;
mod flash;
pub mod lexer;
mod loader;
mod page;
mod render;
mod scan;
mod status;

pub use crate::config::{LogLevel, RenderConfig};
pub use crate::cookie::{Cookie, CookieJar};
pub use crate::engine::Engine;
pub use crate::error::{Error, ErrorKind};
pub use crate::flash::{Flash, FlashQueue};
pub use crate::loader::{load_dir, FsLoader, Loader};
pub use crate::page::Page;
pub use crate::status::{mime, Status};
