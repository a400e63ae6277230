use crate::error::{Error, ErrorKind};
use crate::lexer::*;
use std::ops::Range;

/// Template text together with what is needed to point at a line in it.
#[derive(Debug, Clone, Copy)]
pub struct Source<'s> {
    pub file: &'s str,
    pub text: &'s str,
    /// Line of the template file on which `text` starts.
    pub first_line: usize,
}

impl<'s> Source<'s> {
    pub fn new(file: &'s str, text: &'s str) -> Self {
        Source {
            file,
            text,
            first_line: 1,
        }
    }

    /// The body of a statement, which lives in the same file.
    pub fn body<'b>(&self, body: &'b Body) -> Source<'b>
    where
        's: 'b,
    {
        Source {
            file: self.file,
            text: &body.text,
            first_line: body.line,
        }
    }

    pub fn line_at(&self, offset: usize) -> usize {
        self.first_line + line_offset(self.text, offset)
    }

    pub fn error(&self, offset: usize, kind: ErrorKind) -> Error {
        Error::new(self.file, self.line_at(offset), kind)
    }
}

/// Number of newlines before `offset`.
pub fn line_offset(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|b| **b == b'\n')
        .count()
}

/// One piece of a template.
#[derive(PartialEq, Debug)]
pub enum Node<'s> {
    Text(&'s str),
    // Content of {% raw %}, already stripped of the markers.
    Raw(&'s str),
    // {% block name %} or {% endblock %} met outside of a loadblock.
    Marker,
    // {{ ... }}, {% if %} or {% for %}; offset of the opener and the tokens.
    Directive { at: usize, tokens: Vec<Token> },
    LoadBlock { at: usize, file: String, name: String },
}

/// A `{% ... %}` tag.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Tag<'s> {
    pub start: usize,
    // Next of the closing %}.
    pub end: usize,
    // Trimmed payload.
    pub op: &'s str,
}

impl<'s> Tag<'s> {
    /// Splits "if a > 3" into ("if", "a > 3").
    pub fn split(&self) -> (&'s str, &'s str) {
        match self.op.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (self.op, ""),
        }
    }

    pub fn keyword(&self) -> &'s str {
        self.split().0
    }
}

/// Finds the next `{% ... %}` tag at or after `from`.
pub fn next_tag(text: &str, from: usize) -> Result<Option<Tag<'_>>, ErrorKind> {
    let start = match text[from..].find("{%") {
        Some(pos) => from + pos,
        None => return Ok(None),
    };

    match text[start + 2..].find("%}") {
        Some(pos) => Ok(Some(Tag {
            start,
            end: start + 2 + pos + 2,
            op: text[start + 2..start + 2 + pos].trim(),
        })),
        None => Err(ErrorKind::Unterminated("%}")),
    }
}

/// Finds the tag closing the statement whose opening tag ends at `from`.
///
/// Statements of the same kind nest, so every inner `open` must be closed before `close` counts.
/// Raw sections are skipped as a whole. When `with_else` is set, the `else` of this statement is
/// returned as well.
pub fn find_closing<'s>(
    text: &'s str,
    from: usize,
    open: &str,
    close: &'static str,
    with_else: bool,
) -> Result<(Option<Tag<'s>>, Tag<'s>), ErrorKind> {
    let mut depth = 0;
    let mut else_tag = None;
    let mut pos = from;

    loop {
        let tag = match next_tag(text, pos) {
            Ok(Some(tag)) => tag,
            Ok(None) | Err(ErrorKind::Unterminated(_)) => return Err(ErrorKind::MissingEnd(close)),
            Err(e) => return Err(e),
        };
        pos = tag.end;

        let keyword = tag.keyword();
        if keyword == "raw" && open != "raw" {
            let (_, endraw) = find_closing(text, tag.end, "raw", "endraw", false)?;
            pos = endraw.end;
        } else if keyword == open {
            depth += 1;
        } else if keyword == close {
            if depth == 0 {
                return Ok((else_tag, tag));
            }
            depth -= 1;
        } else if with_else && depth == 0 && tag.op == "else" {
            if else_tag.is_some() {
                return Err(ErrorKind::StrayStatement("else".to_string()));
            }
            else_tag = Some(tag);
        }
    }
}

/// Locates `{% block name %}` ... `{% endblock %}` in a loaded file and returns the range of the
/// text in between.
pub fn find_block(text: &str, file: &str, name: &str) -> Result<Range<usize>, ErrorKind> {
    let mut pos = 0;
    let block = loop {
        match next_tag(text, pos) {
            Ok(Some(tag)) => {
                if tag.split() == ("block", name) {
                    break tag;
                }
                pos = tag.end;
            }
            Ok(None) | Err(_) => {
                return Err(ErrorKind::BlockNotFound {
                    name: name.to_string(),
                    file: file.to_string(),
                })
            }
        }
    };

    match find_closing(text, block.end, "block", "endblock", false) {
        Ok((_, endblock)) => Ok(block.end..endblock.start),
        Err(_) => Err(ErrorKind::EndBlockNotFound(name.to_string())),
    }
}

/// Parses `loadblock("file", name)` into the file and the block name.
pub fn parse_loadblock(op: &str) -> Result<(String, String), ErrorKind> {
    let open = op.find('(').ok_or(ErrorKind::LoadBlockSyntax)?;
    if op[..open].trim() != "loadblock" {
        return Err(ErrorKind::LoadBlockSyntax);
    }

    let close = open + 1 + op[open + 1..].find(')').ok_or(ErrorKind::LoadBlockSyntax)?;
    let args = &op[open + 1..close];

    let quote_start = args.find('"').ok_or(ErrorKind::LoadBlockSyntax)?;
    let quote_end = quote_start
        + 1
        + args[quote_start + 1..]
            .find('"')
            .ok_or(ErrorKind::LoadBlockSyntax)?;
    let file = &args[quote_start + 1..quote_end];

    let comma = quote_end + 1 + args[quote_end + 1..].find(',').ok_or(ErrorKind::LoadBlockSyntax)?;
    let name = args[comma + 1..].trim();

    if file.is_empty() || name.is_empty() {
        return Err(ErrorKind::LoadBlockSyntax);
    }

    Ok((file.to_string(), name.to_string()))
}

/// Trimmed text of `range` and the line it starts on.
fn body(source: &Source, range: Range<usize>) -> Body {
    let raw = &source.text[range.clone()];
    let leading = raw.len() - raw.trim_start().len();
    Body {
        text: raw.trim().to_string(),
        line: source.line_at(range.start + leading),
    }
}

/// Walks a template one directive at a time.
pub struct Scanner<'s> {
    source: Source<'s>,
    pos: usize,
}

impl<'s> Scanner<'s> {
    pub fn new(source: Source<'s>) -> Self {
        Scanner { source, pos: 0 }
    }

    fn expression(&mut self, at: usize) -> Result<Node<'s>, ErrorKind> {
        let text = self.source.text;
        let close = at + 2 + text[at + 2..].find("}}").ok_or(ErrorKind::Unterminated("}}"))?;
        let tokens = tokenize(&text[at + 2..close])?;

        self.pos = close + 2;
        Ok(Node::Directive { at, tokens })
    }

    fn statement(&mut self, at: usize) -> Result<Node<'s>, ErrorKind> {
        let text = self.source.text;
        let tag = next_tag(text, at)?.ok_or(ErrorKind::Unterminated("%}"))?;
        let (keyword, rest) = tag.split();

        if keyword.starts_with("loadblock") {
            let (file, name) = parse_loadblock(tag.op)?;
            self.pos = tag.end;
            return Ok(Node::LoadBlock { at, file, name });
        }

        let node = match (keyword, rest.is_empty()) {
            ("raw", true) => {
                let (_, endraw) = find_closing(text, tag.end, "raw", "endraw", false)?;
                self.pos = endraw.end;
                return Ok(Node::Raw(&text[tag.end..endraw.start]));
            }
            ("if", false) => {
                let mut tokens = vec![Token::If];
                tokens.append(&mut tokenize(rest)?);

                let (else_tag, endif) = find_closing(text, tag.end, "if", "endif", true)?;
                match else_tag {
                    Some(else_tag) => {
                        tokens.push(Token::IfBody(body(&self.source, tag.end..else_tag.start)));
                        tokens.push(Token::ElseBody(body(&self.source, else_tag.end..endif.start)));
                    }
                    None => tokens.push(Token::IfBody(body(&self.source, tag.end..endif.start))),
                }
                tokens.push(Token::EndIf);

                self.pos = endif.end;
                Node::Directive { at, tokens }
            }
            ("for", false) => {
                let mut tokens = vec![Token::For];
                tokens.append(&mut tokenize_for(rest)?);

                let (_, endfor) = find_closing(text, tag.end, "for", "endfor", false)?;
                tokens.push(Token::ForBody(body(&self.source, tag.end..endfor.start)));
                tokens.push(Token::EndFor);

                self.pos = endfor.end;
                Node::Directive { at, tokens }
            }
            ("if", true) => return Err(ErrorKind::UnexpectedEnd("if")),
            ("for", true) => return Err(ErrorKind::UnexpectedEnd("for")),
            ("block", false) | ("endblock", true) => {
                self.pos = tag.end;
                Node::Marker
            }
            ("else" | "endif" | "endfor" | "endraw", true) => {
                return Err(ErrorKind::StrayStatement(keyword.to_string()))
            }
            _ => return Err(ErrorKind::UnknownStatement(tag.op.to_string())),
        };

        Ok(node)
    }
}

impl<'s> Iterator for Scanner<'s> {
    type Item = Result<Node<'s>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.source.text;
        if self.pos >= text.len() {
            return None;
        }

        let rest = &text[self.pos..];
        let opener = match (rest.find("{%"), rest.find("{{")) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        match opener {
            None => {
                self.pos = text.len();
                Some(Ok(Node::Text(rest)))
            }
            Some(0) => {
                let at = self.pos;
                let node = if rest.starts_with("{{") {
                    self.expression(at)
                } else {
                    self.statement(at)
                };

                // Nothing after a broken directive is scanned.
                if node.is_err() {
                    self.pos = text.len();
                }
                Some(node.map_err(|kind| self.source.error(at, kind)))
            }
            Some(offset) => {
                self.pos += offset;
                Some(Ok(Node::Text(&rest[..offset])))
            }
        }
    }
}

#[cfg(test)]
fn scan(text: &str) -> Result<Vec<Node<'_>>, Error> {
    Scanner::new(Source::new("test.html", text)).collect()
}

#[test]
fn scan_text_only() {
    assert_eq!(scan("<p>hello</p>").unwrap(), vec![Node::Text("<p>hello</p>")]);
    assert_eq!(scan("").unwrap(), vec![]);
}

#[test]
fn scan_expression() {
    assert_eq!(
        scan("a {{ x }} b").unwrap(),
        vec![
            Node::Text("a "),
            Node::Directive {
                at: 2,
                tokens: vec![Token::Variable("x".to_string())]
            },
            Node::Text(" b"),
        ]
    );
}

#[test]
fn scan_if_else() {
    let nodes = scan("{% if a %}\n yes {% else %} no\n{% endif %}!").unwrap();
    assert_eq!(
        nodes,
        vec![
            Node::Directive {
                at: 0,
                tokens: vec![
                    Token::If,
                    Token::Variable("a".to_string()),
                    Token::IfBody(Body {
                        text: "yes".to_string(),
                        line: 2
                    }),
                    Token::ElseBody(Body {
                        text: "no".to_string(),
                        line: 2
                    }),
                    Token::EndIf,
                ]
            },
            Node::Text("!"),
        ]
    );
}

#[test]
fn scan_nested_if() {
    let nodes = scan("{% if a %}{% if b %}x{% endif %}y{% else %}z{% endif %}").unwrap();
    assert_eq!(nodes.len(), 1);
    match &nodes[0] {
        Node::Directive { tokens, .. } => {
            assert_eq!(
                tokens[2],
                Token::IfBody(Body {
                    text: "{% if b %}x{% endif %}y".to_string(),
                    line: 1
                })
            );
            assert_eq!(
                tokens[3],
                Token::ElseBody(Body {
                    text: "z".to_string(),
                    line: 1
                })
            );
        }
        node => panic!("Unexpected node {:?}", node),
    }
}

#[test]
fn scan_nested_for() {
    let nodes =
        scan("{% for a in x %}{% for b in a %}{{b}}{% endfor %}{% endfor %}tail").unwrap();
    assert_eq!(nodes.len(), 2);
    match &nodes[0] {
        Node::Directive { tokens, .. } => assert_eq!(
            tokens[4],
            Token::ForBody(Body {
                text: "{% for b in a %}{{b}}{% endfor %}".to_string(),
                line: 1
            })
        ),
        node => panic!("Unexpected node {:?}", node),
    }
    assert_eq!(nodes[1], Node::Text("tail"));
}

#[test]
fn scan_raw() {
    assert_eq!(
        scan("{% raw %}{{ x }}{% raw %}{% endraw %}{% endraw %}.").unwrap(),
        vec![Node::Raw("{{ x }}{% raw %}{% endraw %}"), Node::Text(".")]
    );
}

#[test]
fn scan_raw_inside_if_hides_endif() {
    let nodes = scan("{% if a %}{% raw %}{% endif %}{% endraw %}{% endif %}").unwrap();
    match &nodes[0] {
        Node::Directive { tokens, .. } => assert_eq!(
            tokens[2],
            Token::IfBody(Body {
                text: "{% raw %}{% endif %}{% endraw %}".to_string(),
                line: 1
            })
        ),
        node => panic!("Unexpected node {:?}", node),
    }
}

#[test]
fn scan_block_markers_and_loadblock() {
    assert_eq!(
        scan(r#"{% block head %}h{% endblock %}{% loadblock("base.html", nav) %}"#).unwrap(),
        vec![
            Node::Marker,
            Node::Text("h"),
            Node::Marker,
            Node::LoadBlock {
                at: 31,
                file: "base.html".to_string(),
                name: "nav".to_string()
            },
        ]
    );
}

#[test]
fn scan_errors() {
    let error = scan("line\n{% if a %} never closed").unwrap_err();
    assert_eq!(error.kind, ErrorKind::MissingEnd("endif"));
    assert_eq!(error.line, 2);
    assert_eq!(error.file, "test.html");

    assert_eq!(
        scan("{{ x ").unwrap_err().kind,
        ErrorKind::Unterminated("}}")
    );
    assert_eq!(
        scan("{% if x ").unwrap_err().kind,
        ErrorKind::Unterminated("%}")
    );
    assert_eq!(
        scan("{% for x in y %}").unwrap_err().kind,
        ErrorKind::MissingEnd("endfor")
    );
    assert_eq!(
        scan("{% raw %}").unwrap_err().kind,
        ErrorKind::MissingEnd("endraw")
    );
    assert_eq!(
        scan("{% endif %}").unwrap_err().kind,
        ErrorKind::StrayStatement("endif".to_string())
    );
    assert_eq!(
        scan("{% include x %}").unwrap_err().kind,
        ErrorKind::UnknownStatement("include x".to_string())
    );
    assert_eq!(
        scan("{% if a %}1{% else %}2{% else %}3{% endif %}")
            .unwrap_err()
            .kind,
        ErrorKind::StrayStatement("else".to_string())
    );
}

#[test]
fn loadblock_syntax() {
    assert_eq!(
        parse_loadblock(r#"loadblock( "layout.html" ,  footer )"#).unwrap(),
        ("layout.html".to_string(), "footer".to_string())
    );
    for op in [
        r#"loadblock "a.html", b"#,
        r#"loadblock("a.html", b"#,
        r#"loadblock(a.html, b)"#,
        r#"loadblock("a.html b)"#,
        r#"loadblock("a.html")"#,
        r#"loadblock("a.html", )"#,
        r#"loadblocks("a.html", b)"#,
    ] {
        assert_eq!(parse_loadblock(op), Err(ErrorKind::LoadBlockSyntax), "{}", op);
    }
}

#[test]
fn locate_block() {
    let file = "<html>{% block nav %} <a>{% block inner %}i{% endblock %}</a> {% endblock %}</html>";
    let range = find_block(file, "base.html", "nav").unwrap();
    assert_eq!(&file[range], " <a>{% block inner %}i{% endblock %}</a> ");

    assert_eq!(
        find_block(file, "base.html", "footer"),
        Err(ErrorKind::BlockNotFound {
            name: "footer".to_string(),
            file: "base.html".to_string()
        })
    );
    assert_eq!(
        find_block("{% block nav %} open", "base.html", "nav"),
        Err(ErrorKind::EndBlockNotFound("nav".to_string()))
    );
}
