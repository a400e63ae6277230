use crate::config::{LogLevel, RenderConfig};
use crate::context::Scope;
use crate::error::{Error, ErrorKind};
use crate::loader::{FsLoader, Loader};
use crate::page::Page;
use crate::render::Renderer;
use crate::scan::Source;
use serde_json::Value;

/// HTML template rendering engine that should be constructed for once.
///
/// The engine only holds the configuration and the loader, so one engine can render pages for
/// many requests at the same time.
pub struct Engine {
    config: RenderConfig,
    loader: Box<dyn Loader>,
}

impl Engine {
    /// Creates a template engine.
    ///
    /// # Arguments
    ///
    /// * `config` - Render options, e.g. the log level and the maximum nesting depth.
    /// * `loader` - Reads the template files used by `page` and `{% loadblock %}`.
    ///
    /// # Examples
    ///
    /// ```
    /// let engine = stencil::Engine::new(
    ///     stencil::RenderConfig::default(),
    ///     stencil::FsLoader::new("./tests"),
    /// );
    /// ```
    pub fn new(config: RenderConfig, loader: impl Loader + 'static) -> Self {
        Engine {
            config,
            loader: Box::new(loader),
        }
    }

    /// Creates an engine with the default configuration that reads templates from `root`.
    pub fn with_root(root: &str) -> Self {
        Engine::new(RenderConfig::default(), FsLoader::new(root))
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Loads the template file `file_name` into a new page.
    ///
    /// # Examples
    ///
    /// ```
    /// let engine = stencil::Engine::with_root("./tests");
    ///
    /// let page = engine.page("layout.html").unwrap();
    /// assert_eq!(page.file_name(), "layout.html");
    /// assert!(engine.page("missing.html").is_err());
    /// ```
    pub fn page(&self, file_name: &str) -> Result<Page, Error> {
        match self.loader.load(file_name) {
            Ok(html) if !html.is_empty() => Ok(Page::new(html).with_file_name(file_name)),
            Ok(_) => Err(Error::new(
                file_name,
                1,
                ErrorKind::FileNotFound(file_name.to_string()),
            )),
            Err(e) => {
                if self.config.log_level.allows(LogLevel::Info) {
                    tracing::info!(file = file_name, error = %e, "cannot load the template");
                }
                Err(Error::new(
                    file_name,
                    1,
                    ErrorKind::FileNotFound(file_name.to_string()),
                ))
            }
        }
    }

    /// Renders the page with the provided context.
    ///
    /// On success the body of the page is replaced by the rendered text and the flashed messages
    /// that were shown are removed. On failure nothing but the status changes: it becomes
    /// `500 Internal Server Error`.
    ///
    /// # Arguments
    ///
    /// * `page` : Page whose body is the template to render.
    /// * `context` : JSON value that is provided as a context. It is never modified.
    ///
    /// # Examples
    ///
    /// ```
    /// let engine = stencil::Engine::with_root("./tests");
    ///
    /// let mut page = stencil::Page::new("{% for x in list %}{{ x * 2 }},{% endfor %}");
    /// engine
    ///     .render(&mut page, &serde_json::json!({ "list" : [1, 2, 3] }))
    ///     .unwrap();
    /// assert_eq!(page.body(), "2,4,6,");
    /// ```
    pub fn render(&self, page: &mut Page, context: &Value) -> Result<(), Error> {
        let mut flashes = page.flashes().clone();

        let rendered = Renderer::new(self.loader.as_ref(), &self.config, &mut flashes)
            .render(Source::new(page.file_name(), page.body()), &Scope::new(context));

        match rendered {
            Ok(html) => {
                page.commit(html, flashes);
                Ok(())
            }
            Err(e) => {
                if self.config.log_level.allows(LogLevel::Error) {
                    tracing::error!("{}", e);
                    tracing::error!("no changes have been made");
                }
                page.fail();
                Err(e)
            }
        }
    }

    /// Renders template text that does not come from a file.
    ///
    /// # Examples
    ///
    /// ```
    /// let engine = stencil::Engine::with_root("./tests");
    ///
    /// let page = engine
    ///     .render_text("<p>{{ user.name }}</p>", &serde_json::json!({ "user" : { "name" : "Ann" } }))
    ///     .unwrap();
    /// assert_eq!(page.body(), "<p>Ann</p>");
    /// ```
    pub fn render_text(&self, text: &str, context: &Value) -> Result<Page, Error> {
        let mut page = Page::new(text);
        self.render(&mut page, context)?;
        Ok(page)
    }
}

#[cfg(test)]
fn engine() -> Engine {
    Engine::new(
        RenderConfig {
            log_level: LogLevel::None,
            ..RenderConfig::default()
        },
        FsLoader::new("./tests"),
    )
}

#[cfg(test)]
fn render(template: &str, context: &str) -> String {
    engine()
        .render_text(template, &serde_json::from_str(context).unwrap())
        .unwrap()
        .body()
        .to_string()
}

#[test]
fn render_without_directives() {
    let template = "<html>\n  <body>{ not a directive } % }</body>\n</html>\n";
    let page = engine()
        .render_text(template, &serde_json::json!({}))
        .unwrap();

    assert_eq!(page.body(), template);
    assert_eq!(page.status_line(), "HTTP/1.1 200 OK\r\n");
    assert_eq!(page.content_type(), "text/html");
    assert_eq!(page.encoding(), "utf-8");
}

#[test]
fn render_is_idempotent() {
    let context = serde_json::json!({ "items" : ["a", "b"], "title" : "T" });
    let first = engine()
        .render_text(
            "<h1>{{ title }}</h1>{% for i in items %}<i>{{ i }}</i>{% endfor %}",
            &context,
        )
        .unwrap();
    let second = engine().render_text(first.body(), &context).unwrap();

    assert_eq!(first.body(), "<h1>T</h1><i>a</i><i>b</i>");
    assert_eq!(second.body(), first.body());
}

#[test]
fn render_for() {
    assert_eq!(
        render(
            "{% for x in A %}{{x}}{% endfor %}",
            r#"{ "A" : [" a ", 1, "b", 2.5] }"#
        ),
        "a1b2.5"
    );
    assert_eq!(
        render(
            "{% for i, v in enumerate(A) %}{{i}}:{{v}};{% endfor %}",
            r#"{ "A" : ["a", "b", "c"] }"#
        ),
        "0:a;1:b;2:c;"
    );
    assert_eq!(render("{% for x in A %}{{x}}{% endfor %}", r#"{ "A" : [] }"#), "");
}

#[test]
fn render_if_comparison() {
    assert_eq!(render("{% if 3 > 10 %}Y{% else %}N{% endif %}", "{}"), "N");
    assert_eq!(
        render(r#"{% if "30" > "4" %}Y{% else %}N{% endif %}"#, "{}"),
        "Y"
    );
    assert_eq!(
        render(
            r#"{% if user.role == "admin" %}Y{% else %}N{% endif %}"#,
            r#"{ "user" : { "role" : "admin" } }"#
        ),
        "Y"
    );
    assert_eq!(
        render(
            r#"{% if name != "" %}Y{% else %}N{% endif %}"#,
            r#"{ "name" : "Ann" }"#
        ),
        "Y"
    );
    assert_eq!(
        render(
            r#"{% if nick == "x" %}Y{% else %}N{% endif %}"#,
            r#"{ "nick" : "" }"#
        ),
        "N"
    );
}

#[test]
fn render_safe_flag() {
    assert_eq!(render("{{x|safe}}", r#"{ "x" : "<b>" }"#), "&lt;b&gt;");
    assert_eq!(render("{{x}}", r#"{ "x" : "<b>" }"#), "<b>");
    assert_eq!(render("{{ 1 + 2 | str }}", "{}"), "1+2");
}

#[test]
fn render_raw() {
    assert_eq!(
        render("{% raw %}{{ x }} {% if %}{% endraw %}", "{}"),
        "{{ x }} {% if %}"
    );
}

#[test]
fn flashes_consumed_once() {
    let engine = engine();
    let mut page = Page::new(
        "{% for category, message in get_flashed_messages() %}[{{ category }}] {{ message }};{% endfor %}\
         {% for m in get_flashed_messages() %}{{ m }}{% endfor %}",
    );
    page.flash("Saved", "info");
    page.flash("Try again", "error");

    engine.render(&mut page, &serde_json::json!({})).unwrap();
    assert_eq!(page.body(), "[error] Try again;[info] Saved;");
    assert!(page.flashes().is_empty());
}

#[test]
fn failed_render_changes_nothing() {
    let engine = engine();
    let template = "<p>\n{% if a %}never closed";
    let mut page = Page::new(template);
    page.flash("kept", "info");

    let error = engine
        .render(&mut page, &serde_json::json!({ "a" : true }))
        .unwrap_err();
    assert_eq!(error.kind, ErrorKind::MissingEnd("endif"));
    assert_eq!(error.line, 2);
    assert_eq!(page.body(), template);
    assert_eq!(page.status_line(), "HTTP/1.1 500 Internal Server Error\r\n");
    assert_eq!(page.flashes().len(), 1);

    let mut page = Page::new("{% for m in get_flashed_messages() %}{{ m }}{% endfor %}{{ nope }}");
    page.flash("kept", "info");
    assert!(engine.render(&mut page, &serde_json::json!({})).is_err());
    assert_eq!(page.flashes().len(), 1);
}

#[test]
fn cookie_header() {
    let mut page = engine().render_text("", &serde_json::json!({})).unwrap();
    page.set_cookie("sid", "abc", 0, true);
    assert_eq!(page.cookie_headers(), "Set-Cookie: sid=abc; HttpOnly; Path=/\r\n");
}

#[test]
fn render_from_dir() {
    let engine = engine();
    let mut page = engine.page("index.html").unwrap();

    engine
        .render(
            &mut page,
            &serde_json::json!({
                "title" : "Home",
                "links" : [
                    { "href" : "/", "name" : "Home" },
                    { "href" : "/about", "name" : "About" }
                ],
                "user" : { "name" : "Ann", "admin" : true }
            }),
        )
        .unwrap();

    assert_eq!(
        page.body(),
        r#"<title>Home</title>
<h1>Home</h1>
<nav><a href="/">Home</a><a href="/about">About</a></nav>
<p>Welcome back, Ann</p>
"#
    );
}

#[test]
fn render_errors_name_the_file() {
    let engine = engine();

    let mut page = engine.page("broken.html").unwrap();
    let error = engine
        .render(&mut page, &serde_json::json!({ "x" : 1 }))
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "error in 'broken.html' on line 3: cannot find {% endfor %}"
    );

    assert_eq!(
        engine.page("missing.html").unwrap_err().kind,
        ErrorKind::FileNotFound("missing.html".to_string())
    );
}
