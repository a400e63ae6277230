use crate::calc;
use crate::config::LogLevel;
use crate::context::{is_truthy, parse_int_prefix, stringify, Scope};
use crate::error::ErrorKind;
use crate::flash::FlashQueue;
use crate::lexer::{Body, Token};
use serde_json::Value;
use std::borrow::Cow;

/// What a directive turns into.
#[derive(PartialEq, Debug)]
pub enum Outcome<'t, 'v> {
    /// Final text, spliced as is.
    Text(String),
    /// A body selected by `if`; it still has to be rendered.
    Body(&'t Body),
    /// A loop body and the loop variables of every iteration.
    Repeat(&'t Body, Vec<Bindings<'t, 'v>>),
}

/// Loop variables of one iteration. Values taken from the context are borrowed.
pub type Bindings<'t, 'v> = Vec<(&'t str, Cow<'v, Value>)>;

// Where a for loop takes its elements from.
enum LoopSource<'t> {
    Collection(&'t str),
    Call(&'t str, Vec<&'t str>),
}

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Cursor { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // Reads "a", "." "b", "." "c" into "a.b.c". Must start at a Variable.
    fn chain(&mut self, first: &str) -> String {
        let mut path = first.to_string();
        self.pos += 1;

        while let (Some(dot), Some(Token::Variable(name))) =
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
        {
            if !dot.is_dot() {
                break;
            }
            path.push('.');
            path.push_str(name);
            self.pos += 2;
        }

        path
    }

    fn unexpected(token: Option<&Token>, statement: &'static str) -> ErrorKind {
        match token {
            Some(token) => ErrorKind::UnexpectedToken {
                token: token.kind(),
                statement,
            },
            None => ErrorKind::UnexpectedEnd(statement),
        }
    }

    fn finish(&mut self, statement: &'static str) -> Result<(), ErrorKind> {
        match self.next() {
            None => Ok(()),
            token => Err(Self::unexpected(token, statement)),
        }
    }
}

/// Evaluates the token list of a single directive against a data context.
///
/// `if` and `for` do not render their bodies here; they tell the caller which body to render and
/// with which context, so nested directives are always evaluated with the right bindings.
pub struct Evaluator<'e, 'f> {
    scope: &'e Scope<'e>,
    flashes: &'f mut FlashQueue,
    log_level: LogLevel,
}

impl<'e, 'f> Evaluator<'e, 'f> {
    pub fn new(scope: &'e Scope<'e>, flashes: &'f mut FlashQueue, log_level: LogLevel) -> Self {
        Evaluator {
            scope,
            flashes,
            log_level,
        }
    }

    pub fn evaluate<'t>(&mut self, tokens: &'t [Token]) -> Result<Outcome<'t, 'e>, ErrorKind> {
        if let Some(Token::Subscript(subscript)) =
            tokens.iter().find(|t| matches!(t, Token::Subscript(_)))
        {
            return Err(ErrorKind::Subscript(subscript.clone()));
        }

        match tokens.first() {
            Some(Token::If) => {
                let mut cursor = Cursor::new(&tokens[1..]);
                if tokens.iter().any(|t| matches!(t, Token::Comparison(_))) {
                    self.compare(&mut cursor)
                } else {
                    self.truthiness(&mut cursor)
                }
            }
            Some(Token::For) => self.iterate(&mut Cursor::new(&tokens[1..])),
            Some(
                token @ (Token::EndIf
                | Token::EndFor
                | Token::IfBody(_)
                | Token::ElseBody(_)
                | Token::ForBody(_)
                | Token::Keyword(_)
                | Token::Iterator(_)
                | Token::Argument(_)),
            ) => Err(ErrorKind::UnexpectedToken {
                token: token.kind(),
                statement: "expression",
            }),
            _ => self.expression(&mut Cursor::new(tokens)),
        }
    }

    fn warn(&self, message: &str) {
        if self.log_level.allows(LogLevel::Warning) {
            tracing::warn!("{}", message);
        }
    }

    // Appends the text form of the value at `path`. Values without one only warn.
    fn push_value(&self, text: &mut String, path: &str) -> Result<(), ErrorKind> {
        match stringify(self.scope.lookup(path)?) {
            Ok(value) => text.push_str(&value),
            Err(found) => self.warn(&format!("cannot print \"{}\": it is {}", path, found)),
        }
        Ok(())
    }

    fn expression<'t>(&mut self, cursor: &mut Cursor<'t>) -> Result<Outcome<'t, 'e>, ErrorKind> {
        let mut text = String::new();
        let mut as_str = false;
        let mut safe = false;

        while let Some(token) = cursor.peek() {
            match token {
                Token::Variable(name) => {
                    let path = cursor.chain(name);
                    self.push_value(&mut text, &path)?;
                    continue;
                }
                Token::Math(literal)
                | Token::Operator(literal)
                | Token::Str(literal)
                | Token::Comparison(literal) => text.push_str(literal),
                Token::Flag(flag) => match flag.as_str() {
                    "str" => as_str = true,
                    "safe" => safe = true,
                    _ => self.warn(&format!("unknown flag \"{}\" is ignored", flag)),
                },
                token => {
                    return Err(ErrorKind::UnexpectedToken {
                        token: token.kind(),
                        statement: "expression",
                    })
                }
            }
            cursor.next();
        }

        if !as_str && !text.is_empty() {
            if let Some(number) = calc::evaluate(&text) {
                text = calc::format_number(number);
            }
        }

        if safe {
            text = text.replace('<', "&lt;").replace('>', "&gt;");
        }

        Ok(Outcome::Text(text))
    }

    fn truthiness<'t>(&mut self, cursor: &mut Cursor<'t>) -> Result<Outcome<'t, 'e>, ErrorKind> {
        let condition = match cursor.peek() {
            Some(Token::Variable(name)) => {
                let path = cursor.chain(name);
                // A value that does not exist is false.
                self.scope.lookup(&path).map(is_truthy).unwrap_or(false)
            }
            Some(Token::Math(literal)) => {
                cursor.next();
                match calc::evaluate(literal) {
                    Some(number) => number.trunc() != 0.,
                    None => {
                        return Err(ErrorKind::UnexpectedToken {
                            token: "MATH",
                            statement: "if",
                        })
                    }
                }
            }
            Some(Token::Str(literal)) => {
                cursor.next();
                is_truthy(&Value::String(literal.clone()))
            }
            token => return Err(Cursor::unexpected(token, "if")),
        };

        Self::branch(cursor, condition)
    }

    // Concatenates one side of a comparison up to the operator or the body.
    fn side(&self, cursor: &mut Cursor) -> Result<String, ErrorKind> {
        let first = cursor.peek();
        if matches!(first, None | Some(Token::Comparison(_) | Token::IfBody(_))) {
            return Err(Cursor::unexpected(first, "if"));
        }

        let mut text = String::new();

        while let Some(token) = cursor.peek() {
            match token {
                Token::Variable(name) => {
                    let path = cursor.chain(name);
                    self.push_value(&mut text, &path)?;
                    continue;
                }
                Token::Math(literal) | Token::Operator(literal) | Token::Str(literal) => {
                    text.push_str(literal)
                }
                Token::Comparison(_) | Token::IfBody(_) => break,
                token => return Err(Cursor::unexpected(Some(token), "if")),
            }
            cursor.next();
        }

        // "3*2" is compared as "6". An empty side such as "" stays empty.
        Ok(match calc::evaluate(&text) {
            Some(number) => calc::format_number(number),
            None => text,
        })
    }

    fn compare<'t>(&mut self, cursor: &mut Cursor<'t>) -> Result<Outcome<'t, 'e>, ErrorKind> {
        let left = self.side(cursor)?;

        let op = match cursor.next() {
            Some(Token::Comparison(op)) => op.as_str(),
            token => return Err(Cursor::unexpected(token, "if")),
        };
        if !matches!(op, "==" | "!=" | ">" | "<") {
            return Err(ErrorKind::UnknownOperator(op.to_string()));
        }

        let right = self.side(cursor)?;

        let condition = match (parse_int_prefix(&left), parse_int_prefix(&right)) {
            (Some(l), Some(r)) => match op {
                "==" => l == r,
                "!=" => l != r,
                ">" => l > r,
                _ => l < r,
            },
            _ => match op {
                "==" => left == right,
                "!=" => left != right,
                ">" => left.len() > right.len(),
                _ => left.len() < right.len(),
            },
        };

        Self::branch(cursor, condition)
    }

    // Reads the bodies of an if statement and picks one.
    fn branch<'t>(cursor: &mut Cursor<'t>, condition: bool) -> Result<Outcome<'t, 'e>, ErrorKind> {
        let if_body = match cursor.next() {
            Some(Token::IfBody(body)) => body,
            token => return Err(Cursor::unexpected(token, "if")),
        };

        let else_body = match cursor.peek() {
            Some(Token::ElseBody(body)) => {
                cursor.next();
                Some(body)
            }
            _ => None,
        };

        match cursor.next() {
            Some(Token::EndIf) => {}
            token => return Err(Cursor::unexpected(token, "if")),
        }
        cursor.finish("if")?;

        Ok(match (condition, else_body) {
            (true, _) => Outcome::Body(if_body),
            (false, Some(else_body)) => Outcome::Body(else_body),
            (false, None) => Outcome::Text(String::new()),
        })
    }

    fn iterate<'t>(&mut self, cursor: &mut Cursor<'t>) -> Result<Outcome<'t, 'e>, ErrorKind> {
        let mut variables = Vec::new();
        while let Some(Token::Variable(name)) = cursor.peek() {
            variables.push(name.as_str());
            cursor.next();
        }

        if variables.is_empty() {
            return Err(ErrorKind::MissingVariable);
        }

        match cursor.next() {
            Some(Token::Keyword(keyword)) if keyword == "in" => {}
            _ => return Err(ErrorKind::MissingIn),
        }

        let source = match cursor.next() {
            Some(Token::Variable(path)) => LoopSource::Collection(path),
            Some(Token::Iterator(name)) => {
                let mut arguments = Vec::new();
                while let Some(Token::Argument(argument)) = cursor.peek() {
                    arguments.push(argument.as_str());
                    cursor.next();
                }
                LoopSource::Call(name, arguments)
            }
            _ => return Err(ErrorKind::MissingSource),
        };

        let body = match cursor.next() {
            Some(Token::ForBody(body)) => body,
            token => return Err(Cursor::unexpected(token, "for")),
        };
        match cursor.next() {
            Some(Token::EndFor) => {}
            token => return Err(Cursor::unexpected(token, "for")),
        }
        cursor.finish("for")?;

        let iterations = match source {
            LoopSource::Collection("get_flashed_messages") => self.flashed(&variables, &[])?,
            LoopSource::Collection(path) => {
                if path == "enumerate" {
                    self.warn("\"enumerate\" is used without an argument list");
                }
                self.collection(&variables, path)?
            }
            LoopSource::Call("enumerate", arguments) => self.enumerate(&variables, &arguments)?,
            LoopSource::Call("get_flashed_messages", arguments) => {
                self.flashed(&variables, &arguments)?
            }
            LoopSource::Call(name, _) => return Err(ErrorKind::UnknownIterator(name.to_string())),
        };

        Ok(Outcome::Repeat(body, iterations))
    }

    fn array(&self, path: &str) -> Result<&'e Vec<Value>, ErrorKind> {
        self.scope
            .lookup(path)?
            .as_array()
            .ok_or_else(|| ErrorKind::NotArray(path.to_string()))
    }

    fn collection<'t>(
        &self,
        variables: &[&'t str],
        path: &str,
    ) -> Result<Vec<Bindings<'t, 'e>>, ErrorKind> {
        let [variable] = variables else {
            return Err(ErrorKind::VariableCount {
                iterator: path.to_string(),
                expected: "1",
                found: variables.len(),
            });
        };

        Ok(self
            .array(path)?
            .iter()
            .map(|element| vec![(*variable, Cow::Borrowed(element))])
            .collect())
    }

    fn enumerate<'t>(
        &self,
        variables: &[&'t str],
        arguments: &[&str],
    ) -> Result<Vec<Bindings<'t, 'e>>, ErrorKind> {
        let [index, variable] = variables else {
            return Err(ErrorKind::VariableCount {
                iterator: "enumerate".to_string(),
                expected: "2",
                found: variables.len(),
            });
        };
        let [path] = arguments else {
            return Err(ErrorKind::ArgumentCount {
                iterator: "enumerate".to_string(),
                expected: 1,
                found: arguments.len(),
            });
        };

        Ok(self
            .array(path)?
            .iter()
            .enumerate()
            .map(|(i, element)| {
                vec![
                    (*index, Cow::Owned(Value::String(i.to_string()))),
                    (*variable, Cow::Borrowed(element)),
                ]
            })
            .collect())
    }

    // Drains the flash queue. One variable binds the message, two bind the category and the
    // message.
    fn flashed<'t>(
        &mut self,
        variables: &[&'t str],
        arguments: &[&str],
    ) -> Result<Vec<Bindings<'t, 'e>>, ErrorKind> {
        if variables.len() > 2 {
            return Err(ErrorKind::VariableCount {
                iterator: "get_flashed_messages".to_string(),
                expected: "1 or 2",
                found: variables.len(),
            });
        }
        if !arguments.is_empty() {
            return Err(ErrorKind::ArgumentCount {
                iterator: "get_flashed_messages".to_string(),
                expected: 0,
                found: arguments.len(),
            });
        }

        let mut iterations = Vec::new();
        while let Some(flash) = self.flashes.pop() {
            iterations.push(match variables {
                [message] => vec![(*message, Cow::Owned(Value::String(flash.message)))],
                [category, message] => vec![
                    (*category, Cow::Owned(Value::String(flash.category))),
                    (*message, Cow::Owned(Value::String(flash.message))),
                ],
                _ => vec![],
            });
        }

        Ok(iterations)
    }
}

#[cfg(test)]
fn body(text: &str) -> Body {
    Body {
        text: text.to_string(),
        line: 1,
    }
}

#[cfg(test)]
fn if_tokens(condition: &str) -> Vec<Token> {
    let mut tokens = vec![Token::If];
    tokens.extend(crate::lexer::tokenize(condition).unwrap());
    tokens.push(Token::IfBody(body("Y")));
    tokens.push(Token::ElseBody(body("N")));
    tokens.push(Token::EndIf);
    tokens
}

#[cfg(test)]
fn for_tokens(header: &str) -> Vec<Token> {
    let mut tokens = vec![Token::For];
    tokens.extend(crate::lexer::tokenize_for(header).unwrap());
    tokens.push(Token::ForBody(body("{{ x }}")));
    tokens.push(Token::EndFor);
    tokens
}

#[cfg(test)]
fn run(context: &Value, tokens: &[Token]) -> Result<String, ErrorKind> {
    let scope = Scope::new(context);
    let mut flashes = FlashQueue::new();
    let mut evaluator = Evaluator::new(&scope, &mut flashes, LogLevel::None);
    Ok(match evaluator.evaluate(tokens)? {
        Outcome::Text(text) => text,
        Outcome::Body(body) => body.text.clone(),
        Outcome::Repeat(_, iterations) => format!("{} iterations", iterations.len()),
    })
}

#[cfg(test)]
fn expr(context: &Value, payload: &str) -> Result<String, ErrorKind> {
    run(context, &crate::lexer::tokenize(payload).unwrap())
}

#[test]
fn expression_values() {
    let data = serde_json::json!({
        "name" : "  John  ",
        "user" : { "age" : 31, "admin" : true },
        "price" : 2.5,
    });

    assert_eq!(expr(&data, "name").unwrap(), "John");
    assert_eq!(expr(&data, "user.age").unwrap(), "31");
    assert_eq!(expr(&data, "user.admin").unwrap(), "true");
    assert_eq!(expr(&data, "user.age + 1").unwrap(), "32");
    assert_eq!(expr(&data, "price * 2").unwrap(), "5");
    assert_eq!(expr(&data, "(1 + 2) * 3").unwrap(), "9");
    assert_eq!(expr(&data, "10 / 4").unwrap(), "2.5");
    assert_eq!(expr(&data, "user.age + 1 | str").unwrap(), "31+1");
    assert_eq!(expr(&data, r#""Hi " name"#).unwrap(), "Hi John");
    assert_eq!(expr(&data, "").unwrap(), "");
}

#[test]
fn expression_flags() {
    let data = serde_json::json!({ "x" : "<b>" });
    assert_eq!(expr(&data, "x | safe").unwrap(), "&lt;b&gt;");
    assert_eq!(expr(&data, "x").unwrap(), "<b>");
    assert_eq!(expr(&data, "x | bold").unwrap(), "<b>");
}

#[test]
fn expression_errors() {
    let data = serde_json::json!({ "list" : [1, 2], "obj" : { "a" : 1 } });
    assert_eq!(
        expr(&data, "missing"),
        Err(ErrorKind::Missing {
            path: "missing".to_string(),
            segment: "missing".to_string()
        })
    );
    assert_eq!(
        expr(&data, "list[0]"),
        Err(ErrorKind::Subscript("0".to_string()))
    );

    // Values without a text form are skipped.
    assert_eq!(expr(&data, "list").unwrap(), "");
    assert_eq!(expr(&data, r#""a" obj "b""#).unwrap(), "ab");
}

#[test]
fn if_truthiness() {
    let data = serde_json::json!({
        "yes" : true, "no" : false, "zero" : "0", "list" : [], "user" : { "name" : "x" }
    });

    assert_eq!(run(&data, &if_tokens("yes")).unwrap(), "Y");
    assert_eq!(run(&data, &if_tokens("no")).unwrap(), "N");
    assert_eq!(run(&data, &if_tokens("zero")).unwrap(), "N");
    assert_eq!(run(&data, &if_tokens("list")).unwrap(), "N");
    assert_eq!(run(&data, &if_tokens("user.name")).unwrap(), "Y");
    assert_eq!(run(&data, &if_tokens("user.email")).unwrap(), "N");
    assert_eq!(run(&data, &if_tokens("nothing")).unwrap(), "N");
    assert_eq!(run(&data, &if_tokens("1")).unwrap(), "Y");
    assert_eq!(run(&data, &if_tokens("0.5")).unwrap(), "N");
    assert_eq!(run(&data, &if_tokens(r#""text""#)).unwrap(), "Y");
    assert_eq!(run(&data, &if_tokens(r#""""#)).unwrap(), "N");

    assert_eq!(
        run(&data, &if_tokens("yes no")),
        Err(ErrorKind::UnexpectedToken {
            token: "VARIABLE",
            statement: "if"
        })
    );
}

#[test]
fn if_without_else() {
    let tokens = vec![
        Token::If,
        Token::Variable("a".to_string()),
        Token::IfBody(body("Y")),
        Token::EndIf,
    ];
    assert_eq!(run(&serde_json::json!({ "a" : 0 }), &tokens).unwrap(), "");
    assert_eq!(run(&serde_json::json!({ "a" : 1 }), &tokens).unwrap(), "Y");
}

#[test]
fn if_comparison() {
    let data = serde_json::json!({
        "count" : 3, "name" : "Ann", "nick" : "", "user" : { "age" : 20 }
    });

    assert_eq!(run(&data, &if_tokens("3 > 10")).unwrap(), "N");
    assert_eq!(run(&data, &if_tokens(r#""30" > "4""#)).unwrap(), "Y");
    assert_eq!(run(&data, &if_tokens("count == 3")).unwrap(), "Y");
    assert_eq!(run(&data, &if_tokens("count * 2 == 6")).unwrap(), "Y");
    assert_eq!(run(&data, &if_tokens("user.age < 18")).unwrap(), "N");
    assert_eq!(run(&data, &if_tokens(r#"name == "Ann""#)).unwrap(), "Y");
    assert_eq!(run(&data, &if_tokens(r#"name != "Bob""#)).unwrap(), "Y");
    // Strings compare by length.
    assert_eq!(run(&data, &if_tokens(r#"name > "Bo""#)).unwrap(), "Y");
    assert_eq!(run(&data, &if_tokens(r#"name < "Bo""#)).unwrap(), "N");

    // An empty side compares as an empty string.
    assert_eq!(run(&data, &if_tokens(r#"name != """#)).unwrap(), "Y");
    assert_eq!(run(&data, &if_tokens(r#"name == """#)).unwrap(), "N");
    assert_eq!(run(&data, &if_tokens(r#"nick == "x""#)).unwrap(), "N");
    assert_eq!(run(&data, &if_tokens(r#"nick == """#)).unwrap(), "Y");
    assert_eq!(run(&data, &if_tokens(r#""" < name"#)).unwrap(), "Y");
}

#[test]
fn if_comparison_errors() {
    let data = serde_json::json!({ "a" : 1 });
    assert_eq!(
        run(&data, &if_tokens("a >= 1")),
        Err(ErrorKind::UnknownOperator(">=".to_string()))
    );
    assert_eq!(
        run(&data, &if_tokens("b == 1")),
        Err(ErrorKind::Missing {
            path: "b".to_string(),
            segment: "b".to_string()
        })
    );
    assert_eq!(
        run(&data, &if_tokens("== 1")),
        Err(ErrorKind::UnexpectedToken {
            token: "COMPARISON_OPERATOR",
            statement: "if"
        })
    );
}

#[test]
fn for_sources() {
    let data = serde_json::json!({ "list" : ["a", "b"], "shop" : { "items" : [1, 2, 3] } });

    assert_eq!(run(&data, &for_tokens("x in list")).unwrap(), "2 iterations");
    assert_eq!(
        run(&data, &for_tokens("x in shop.items")).unwrap(),
        "3 iterations"
    );

    let tokens = for_tokens("i, x in enumerate(list)");
    let scope = Scope::new(&data);
    let mut flashes = FlashQueue::new();
    let mut evaluator = Evaluator::new(&scope, &mut flashes, LogLevel::None);
    match evaluator.evaluate(&tokens).unwrap() {
        Outcome::Repeat(body, iterations) => {
            assert_eq!(body.text, "{{ x }}");
            assert_eq!(
                iterations[1],
                vec![
                    ("i", Cow::Owned(Value::from("1"))),
                    ("x", Cow::Borrowed(&data["list"][1])),
                ]
            );
            // Elements are borrowed from the context.
            assert!(matches!(iterations[0][1].1, Cow::Borrowed(_)));
        }
        outcome => panic!("Unexpected outcome {:?}", outcome),
    }
}

#[test]
fn for_errors() {
    let data = serde_json::json!({ "list" : [1], "name" : "x" });

    assert_eq!(
        run(&data, &for_tokens("x in name")),
        Err(ErrorKind::NotArray("name".to_string()))
    );
    assert_eq!(
        run(&data, &for_tokens("a, b in list")),
        Err(ErrorKind::VariableCount {
            iterator: "list".to_string(),
            expected: "1",
            found: 2
        })
    );
    assert_eq!(
        run(&data, &for_tokens("x in enumerate(list)")),
        Err(ErrorKind::VariableCount {
            iterator: "enumerate".to_string(),
            expected: "2",
            found: 1
        })
    );
    assert_eq!(
        run(&data, &for_tokens("i, x in enumerate(list, list)")),
        Err(ErrorKind::ArgumentCount {
            iterator: "enumerate".to_string(),
            expected: 1,
            found: 2
        })
    );
    assert_eq!(
        run(&data, &for_tokens("x in reversed(list)")),
        Err(ErrorKind::UnknownIterator("reversed".to_string()))
    );
    assert_eq!(run(&data, &for_tokens("x list")), Err(ErrorKind::MissingIn));
    assert_eq!(run(&data, &for_tokens("x in")), Err(ErrorKind::MissingSource));
    assert_eq!(
        run(&data, &for_tokens("in list")),
        Err(ErrorKind::MissingVariable)
    );
    assert_eq!(
        run(&data, &for_tokens("a, b, c in get_flashed_messages()")),
        Err(ErrorKind::VariableCount {
            iterator: "get_flashed_messages".to_string(),
            expected: "1 or 2",
            found: 3
        })
    );
    assert_eq!(
        run(&data, &for_tokens("m in get_flashed_messages(x)")),
        Err(ErrorKind::ArgumentCount {
            iterator: "get_flashed_messages".to_string(),
            expected: 0,
            found: 1
        })
    );
}

#[test]
fn flashed_messages_are_drained() {
    let data = serde_json::json!({});
    let mut flashes = FlashQueue::new();
    flashes.push("saved", "info");
    flashes.push("failed", "error");

    let tokens = for_tokens("category, message in get_flashed_messages()");
    let scope = Scope::new(&data);
    let mut evaluator = Evaluator::new(&scope, &mut flashes, LogLevel::None);
    match evaluator.evaluate(&tokens).unwrap() {
        Outcome::Repeat(_, iterations) => assert_eq!(
            iterations,
            vec![
                vec![
                    ("category", Cow::Owned(Value::from("error"))),
                    ("message", Cow::Owned(Value::from("failed"))),
                ],
                vec![
                    ("category", Cow::Owned(Value::from("info"))),
                    ("message", Cow::Owned(Value::from("saved"))),
                ],
            ]
        ),
        outcome => panic!("Unexpected outcome {:?}", outcome),
    }

    assert_eq!(
        evaluator.evaluate(&for_tokens("m in get_flashed_messages")),
        Ok(Outcome::Repeat(&body("{{ x }}"), vec![]))
    );
    assert!(flashes.is_empty());
}
