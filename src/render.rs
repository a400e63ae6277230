use crate::config::{LogLevel, RenderConfig};
use crate::context::Scope;
use crate::error::{Error, ErrorKind};
use crate::eval::{Evaluator, Outcome};
use crate::flash::FlashQueue;
use crate::loader::Loader;
use crate::scan::{find_block, line_offset, Node, Scanner, Source};
#[cfg(test)]
use serde_json::Value;

/// Renders a template by evaluating its directives and splicing the results.
///
/// Bodies picked by `if`, every loop iteration and every loaded block get a pass of their own
/// against the scope they need.
pub(crate) struct Renderer<'r> {
    loader: &'r dyn Loader,
    config: &'r RenderConfig,
    flashes: &'r mut FlashQueue,
    depth: usize,
}

impl<'r> Renderer<'r> {
    pub fn new(
        loader: &'r dyn Loader,
        config: &'r RenderConfig,
        flashes: &'r mut FlashQueue,
    ) -> Self {
        Renderer {
            loader,
            config,
            flashes,
            depth: 0,
        }
    }

    pub fn render(&mut self, source: Source, scope: &Scope) -> Result<String, Error> {
        if self.depth >= self.config.max_depth {
            return Err(source.error(0, ErrorKind::TooDeep(self.config.max_depth)));
        }

        self.depth += 1;
        let rendered = self.render_nodes(source, scope);
        self.depth -= 1;

        rendered
    }

    fn render_nodes(&mut self, source: Source, scope: &Scope) -> Result<String, Error> {
        let mut output = String::with_capacity(source.text.len());

        for node in Scanner::new(source) {
            match node? {
                Node::Text(text) | Node::Raw(text) => output.push_str(text),
                Node::Marker => {}
                Node::Directive { at, tokens } => {
                    let outcome = Evaluator::new(scope, self.flashes, self.config.log_level)
                        .evaluate(&tokens)
                        .map_err(|kind| source.error(at, kind))?;

                    match outcome {
                        Outcome::Text(text) => output.push_str(&text),
                        Outcome::Body(body) => {
                            output.push_str(&self.render(source.body(body), scope)?)
                        }
                        Outcome::Repeat(body, iterations) => {
                            for bindings in iterations {
                                let child =
                                    scope.child(bindings).map_err(|kind| source.error(at, kind))?;
                                output.push_str(self.render(source.body(body), &child)?.trim());
                            }
                        }
                    }
                }
                Node::LoadBlock { at, file, name } => {
                    output.push_str(&self.load_block(source, at, &file, &name, scope)?)
                }
            }
        }

        Ok(output)
    }

    fn load_block(
        &mut self,
        source: Source,
        at: usize,
        file: &str,
        name: &str,
        scope: &Scope,
    ) -> Result<String, Error> {
        let text = match self.loader.load(file) {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => return Err(source.error(at, ErrorKind::FileNotFound(file.to_string()))),
            Err(e) => {
                if self.config.log_level.allows(LogLevel::Info) {
                    tracing::info!(file, error = %e, "cannot load the template");
                }
                return Err(source.error(at, ErrorKind::FileNotFound(file.to_string())));
            }
        };

        let range = find_block(&text, file, name).map_err(|kind| source.error(at, kind))?;
        let block = &text[range.clone()];
        let leading = block.len() - block.trim_start().len();

        if self.config.log_level.allows(LogLevel::Info) {
            tracing::info!(file, block = name, "rendering loaded block");
        }
        self.render(
            Source {
                file,
                text: block.trim(),
                first_line: 1 + line_offset(&text, range.start + leading),
            },
            scope,
        )
    }
}

#[cfg(test)]
fn render_with(
    templates: &[(&str, &str)],
    config: &RenderConfig,
    flashes: &mut FlashQueue,
    text: &str,
    context: &Value,
) -> Result<String, Error> {
    let loader: std::collections::HashMap<String, String> = templates
        .iter()
        .map(|(name, content)| (name.to_string(), content.to_string()))
        .collect();

    Renderer::new(&loader, config, flashes).render(Source::new("test.html", text), &Scope::new(context))
}

#[cfg(test)]
fn render(text: &str, context: Value) -> Result<String, Error> {
    render_with(
        &[],
        &RenderConfig::default(),
        &mut FlashQueue::new(),
        text,
        &context,
    )
}

#[test]
fn render_nested_statements() {
    let data = serde_json::json!({
        "users" : [ { "name" : "a", "admin" : true }, { "name" : "b", "admin" : false } ]
    });

    assert_eq!(
        render(
            "<ul>{% for u in users %}\n  <li>{% if u.admin %}[{{ u.name }}]{% else %}{{ u.name }}{% endif %}</li>\n{% endfor %}</ul>",
            data
        )
        .unwrap(),
        "<ul><li>[a]</li><li>b</li></ul>"
    );
}

#[test]
fn render_loop_per_iteration() {
    let data = serde_json::json!({ "rows" : [[1, 2], [3]], "x" : "outer" });
    assert_eq!(
        render(
            "{% for row in rows %}({% for x in row %}{{ x }}{% endfor %}){% endfor %}{{ x }}",
            data
        )
        .unwrap(),
        "(12)(3)outer"
    );
}

#[test]
fn output_is_not_rescanned() {
    assert_eq!(
        render("{{ x }}", serde_json::json!({ "x" : "{{ y }}" })).unwrap(),
        "{{ y }}"
    );
    assert_eq!(
        render(
            "{% for x in l %}{% raw %}{{x}}{% endraw %}{% endfor %}",
            serde_json::json!({ "l" : [1, 2] })
        )
        .unwrap(),
        "{{x}}{{x}}"
    );
}

#[test]
fn render_loaded_block() {
    let templates = [(
        "base.html",
        "<html>\n{% block nav %}\n<a>{{ title }}</a>\n{% endblock %}\n</html>",
    )];

    assert_eq!(
        render_with(
            &templates,
            &RenderConfig::default(),
            &mut FlashQueue::new(),
            r#"<body>{% loadblock("base.html", nav) %}</body>"#,
            &serde_json::json!({ "title" : "T" })
        )
        .unwrap(),
        "<body><a>T</a></body>"
    );
}

#[test]
fn loaded_block_errors_point_into_loaded_file() {
    let templates = [(
        "base.html",
        "line1\n{% block b %}\n\n{{ missing }}\n{% endblock %}",
    )];

    let error = render_with(
        &templates,
        &RenderConfig::default(),
        &mut FlashQueue::new(),
        "\n{% loadblock(\"base.html\", b) %}",
        &serde_json::json!({}),
    )
    .unwrap_err();
    assert_eq!(error.file, "base.html");
    assert_eq!(error.line, 4);

    let error = render_with(
        &templates,
        &RenderConfig::default(),
        &mut FlashQueue::new(),
        "\n{% loadblock(\"nope.html\", b) %}",
        &serde_json::json!({}),
    )
    .unwrap_err();
    assert_eq!(error.file, "test.html");
    assert_eq!(error.line, 2);
    assert_eq!(error.kind, ErrorKind::FileNotFound("nope.html".to_string()));

    let error = render_with(
        &[("empty.html", "")],
        &RenderConfig::default(),
        &mut FlashQueue::new(),
        "{% loadblock(\"empty.html\", b) %}",
        &serde_json::json!({}),
    )
    .unwrap_err();
    assert_eq!(error.kind, ErrorKind::FileNotFound("empty.html".to_string()));
}

#[test]
fn self_loading_block_is_bounded() {
    let templates = [(
        "loop.html",
        r#"{% block a %}x{% loadblock("loop.html", a) %}{% endblock %}"#,
    )];
    let config = RenderConfig {
        max_depth: 8,
        ..RenderConfig::default()
    };

    let error = render_with(
        &templates,
        &config,
        &mut FlashQueue::new(),
        r#"{% loadblock("loop.html", a) %}"#,
        &serde_json::json!({}),
    )
    .unwrap_err();
    assert_eq!(error.kind, ErrorKind::TooDeep(8));
    assert_eq!(error.file, "loop.html");
}

#[test]
fn flashes_are_shown_once() {
    let mut flashes = FlashQueue::new();
    flashes.push("a", "info");
    flashes.push("b", "info");

    assert_eq!(
        render_with(
            &[],
            &RenderConfig::default(),
            &mut flashes,
            "{% for m in get_flashed_messages() %}{{ m }}{% endfor %}|{% for m in get_flashed_messages() %}{{ m }}{% endfor %}",
            &serde_json::json!({})
        )
        .unwrap(),
        "ba|"
    );
    assert!(flashes.is_empty());
}

#[test]
fn error_lines() {
    let error = render("a\nb\n{{ nope }}", serde_json::json!({})).unwrap_err();
    assert_eq!(error.line, 3);

    let error = render(
        "x\n{% if a %}\n  {{ nope }}\n{% endif %}",
        serde_json::json!({ "a" : true }),
    )
    .unwrap_err();
    assert_eq!(error.line, 3);
    assert_eq!(
        error.to_string(),
        "error in 'test.html' on line 3: cannot find the attribute \"nope\" of \"nope\""
    );
}

#[test]
fn loop_variables_shadow_context() {
    let data = serde_json::json!({
        "x" : "outer",
        "groups" : [ { "name" : "g", "items" : [1, 2] } ],
    });

    assert_eq!(
        render(
            "{% for x in groups %}{% for i in x.items %}{{ x.name }}{{ i }},{% endfor %}{% endfor %}{{ x }}",
            data
        )
        .unwrap(),
        "g1,g2,outer"
    );
}

#[test]
fn long_loops_render_every_element() {
    let data = serde_json::json!({
        "list" : (0..2000).collect::<Vec<i32>>(),
        "payload" : "p".repeat(10_000),
    });

    let rendered = render("{% for n in list %}{{ n }} {% endfor %}", data).unwrap();
    assert_eq!(rendered.len(), (0..2000).map(|n: i32| n.to_string().len()).sum::<usize>());
    assert!(rendered.starts_with("01"));
}
