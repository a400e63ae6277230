use crate::error::ErrorKind;

/// Literal text enclosed by a statement, e.g. everything between `{% if a %}` and `{% endif %}`.
#[derive(PartialEq, Debug, Clone)]
pub struct Body {
    pub text: String,
    /// 1-based line where the (trimmed) body starts in its template.
    pub line: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub enum Token {
    Variable(String),   // name
    Str(String),        // "text"
    Math(String),       // 3.5, 3-1 or the "." between attributes
    Operator(String),   // + - * / % ( )
    Comparison(String), // == != > <
    If,
    IfBody(Body),
    ElseBody(Body),
    EndIf,
    For,
    ForBody(Body),
    EndFor,
    Keyword(String),  // in
    Iterator(String), // enumerate, get_flashed_messages
    Argument(String),
    Flag(String),      // |safe
    Subscript(String), // [0]
}

impl Token {
    pub fn kind(&self) -> &'static str {
        match self {
            Token::Variable(_) => "VARIABLE",
            Token::Str(_) => "STRING",
            Token::Math(_) => "MATH",
            Token::Operator(_) => "OPERATOR",
            Token::Comparison(_) => "COMPARISON_OPERATOR",
            Token::If => "IF",
            Token::IfBody(_) => "IF_BODY",
            Token::ElseBody(_) => "ELSE_BODY",
            Token::EndIf => "ENDIF",
            Token::For => "FOR",
            Token::ForBody(_) => "FOR_BODY",
            Token::EndFor => "ENDFOR",
            Token::Keyword(_) => "KEYWORD",
            Token::Iterator(_) => "ITERATOR",
            Token::Argument(_) => "ARGUMENT",
            Token::Flag(_) => "FLAG",
            Token::Subscript(_) => "SUBSCRIPT",
        }
    }

    /// True for the "." that joins the names of an attribute chain.
    pub fn is_dot(&self) -> bool {
        matches!(self, Token::Math(m) if m == ".")
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
enum Run {
    Word,
    Number,
    Operator,
    Comparison,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_operator(c: char) -> bool {
    matches!(c, '*' | '-' | '+' | '/' | '%')
}

fn is_comparison(c: char) -> bool {
    matches!(c, '=' | '!' | '>' | '<')
}

fn run_of(c: char) -> Option<Run> {
    if c.is_alphabetic() || c == '_' {
        Some(Run::Word)
    } else if c.is_ascii_digit() || c == '.' {
        Some(Run::Number)
    } else if is_operator(c) {
        Some(Run::Operator)
    } else if is_comparison(c) {
        Some(Run::Comparison)
    } else {
        None
    }
}

fn continues(run: Run, c: char) -> bool {
    match run {
        Run::Word => is_word_char(c),
        Run::Number => c.is_ascii_digit() || c == '.' || c == '-',
        Run::Operator => is_operator(c),
        Run::Comparison => is_comparison(c),
    }
}

fn flush(run: &mut Option<(Run, String)>, tokens: &mut Vec<Token>) {
    if let Some((kind, mut text)) = run.take() {
        tokens.push(match kind {
            Run::Word => Token::Variable(text),
            Run::Number => {
                // "3." is "3.0" and ".5" is "0.5"; a lone "." joins attributes.
                if text.chars().any(|c| c.is_ascii_digit()) {
                    if text.ends_with('.') {
                        text.push('0');
                    }
                    if text.starts_with('.') {
                        text.insert(0, '0');
                    }
                }
                Token::Math(text)
            }
            Run::Operator => Token::Operator(text),
            Run::Comparison => Token::Comparison(text),
        });
    }
}

/// Tokenizes the payload of `{{ ... }}` or the condition of `{% if ... %}`.
///
/// # Examples
///
/// ```
/// use stencil::lexer::{tokenize, Token};
///
/// assert_eq!(
///     tokenize("user.age + 1 | str").unwrap(),
///     vec![
///         Token::Variable("user".to_string()),
///         Token::Math(".".to_string()),
///         Token::Variable("age".to_string()),
///         Token::Operator("+".to_string()),
///         Token::Math("1".to_string()),
///         Token::Flag("str".to_string()),
///     ]
/// );
/// ```
pub fn tokenize(payload: &str) -> Result<Vec<Token>, ErrorKind> {
    let mut tokens = Vec::new();
    let mut run: Option<(Run, String)> = None;
    let mut chars = payload.chars().peekable();

    while let Some(c) = chars.next() {
        if let Some((kind, text)) = run.as_mut() {
            if continues(*kind, c) {
                text.push(c);
                continue;
            }
        }

        flush(&mut run, &mut tokens);

        match c {
            c if c.is_whitespace() => {}
            '"' => {
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => literal.push(c),
                        None => return Err(ErrorKind::UnterminatedString),
                    }
                }
                tokens.push(Token::Str(literal));
            }
            '|' => {
                while chars.next_if(|c| c.is_whitespace()).is_some() {}

                let mut flag = String::new();
                while let Some(c) = chars.next_if(|c| is_word_char(*c)) {
                    flag.push(c);
                }
                tokens.push(Token::Flag(flag));
            }
            '[' => {
                let mut subscript = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) => subscript.push(c),
                        None => return Err(ErrorKind::Unterminated("]")),
                    }
                }
                tokens.push(Token::Subscript(subscript));
            }
            '(' | ')' => tokens.push(Token::Operator(c.to_string())),
            c => match run_of(c) {
                Some(kind) => run = Some((kind, c.to_string())),
                None => return Err(ErrorKind::UnexpectedChar(c)),
            },
        }
    }

    flush(&mut run, &mut tokens);
    Ok(tokens)
}

fn is_identifier(name: &str) -> bool {
    name.starts_with(|c: char| c.is_alphabetic() || c == '_') && name.chars().all(is_word_char)
}

/// Tokenizes the header of `{% for a, b in source %}`.
///
/// A missing `in` or source is not reported here; the evaluator rejects the token list.
pub fn tokenize_for(header: &str) -> Result<Vec<Token>, ErrorKind> {
    let mut tokens = Vec::new();
    let mut rest = header.trim();

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            return Ok(tokens);
        }

        let end = rest
            .find(|c: char| c.is_whitespace() || c == ',')
            .unwrap_or(rest.len());
        let name = &rest[..end];
        rest = &rest[end..];

        if name == "in" {
            tokens.push(Token::Keyword(name.to_string()));
            break;
        }

        if !is_identifier(name) {
            let bad = name
                .chars()
                .find(|c| !is_word_char(*c))
                .or_else(|| name.chars().next())
                .unwrap_or(' ');
            return Err(ErrorKind::UnexpectedChar(bad));
        }
        tokens.push(Token::Variable(name.to_string()));
    }

    let source = rest.trim();
    if source.is_empty() {
        return Ok(tokens);
    }

    match (source.find('('), source.find(')')) {
        (None, None) => tokens.push(Token::Variable(source.to_string())),
        (Some(_), None) => return Err(ErrorKind::Unterminated(")")),
        (None, Some(_)) => return Err(ErrorKind::ArgumentList),
        (Some(open), Some(close)) if close < open => return Err(ErrorKind::ArgumentList),
        (Some(open), Some(close)) => {
            tokens.push(Token::Iterator(source[..open].trim().to_string()));
            for argument in source[open + 1..close].split(',') {
                let argument = argument.trim();
                if !argument.is_empty() {
                    tokens.push(Token::Argument(argument.to_string()));
                }
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
fn var(name: &str) -> Token {
    Token::Variable(name.to_string())
}

#[cfg(test)]
fn math(text: &str) -> Token {
    Token::Math(text.to_string())
}

#[test]
fn tokenize_attribute_chain() {
    assert_eq!(
        tokenize("a.b.c").unwrap(),
        vec![var("a"), math("."), var("b"), math("."), var("c")]
    );
}

#[test]
fn tokenize_numbers() {
    assert_eq!(tokenize("3.").unwrap(), vec![math("3.0")]);
    assert_eq!(tokenize(".5").unwrap(), vec![math("0.5")]);
    assert_eq!(tokenize("12.25").unwrap(), vec![math("12.25")]);
    assert_eq!(tokenize("3-1").unwrap(), vec![math("3-1")]);
    assert_eq!(
        tokenize("a1 * 2").unwrap(),
        vec![var("a1"), Token::Operator("*".to_string()), math("2")]
    );
}

#[test]
fn tokenize_comparison() {
    assert_eq!(
        tokenize("count >= 10").unwrap(),
        vec![var("count"), Token::Comparison(">=".to_string()), math("10")]
    );
    assert_eq!(
        tokenize("a==b").unwrap(),
        vec![var("a"), Token::Comparison("==".to_string()), var("b")]
    );
}

#[test]
fn tokenize_strings_and_flags() {
    assert_eq!(
        tokenize(r#" "a  b" | safe |str "#).unwrap(),
        vec![
            Token::Str("a  b".to_string()),
            Token::Flag("safe".to_string()),
            Token::Flag("str".to_string())
        ]
    );
    assert_eq!(tokenize(r#""abc"#), Err(ErrorKind::UnterminatedString));
}

#[test]
fn tokenize_subscript_and_parens() {
    assert_eq!(
        tokenize("list[0]").unwrap(),
        vec![var("list"), Token::Subscript("0".to_string())]
    );
    assert_eq!(tokenize("list[0"), Err(ErrorKind::Unterminated("]")));
    assert_eq!(
        tokenize("(a)").unwrap(),
        vec![
            Token::Operator("(".to_string()),
            var("a"),
            Token::Operator(")".to_string())
        ]
    );
    assert_eq!(tokenize("a # b"), Err(ErrorKind::UnexpectedChar('#')));
}

#[test]
fn tokenize_for_collection() {
    assert_eq!(
        tokenize_for("item in shop.items").unwrap(),
        vec![
            var("item"),
            Token::Keyword("in".to_string()),
            var("shop.items")
        ]
    );
}

#[test]
fn tokenize_for_iterator() {
    assert_eq!(
        tokenize_for("i, v in enumerate( list )").unwrap(),
        vec![
            var("i"),
            var("v"),
            Token::Keyword("in".to_string()),
            Token::Iterator("enumerate".to_string()),
            Token::Argument("list".to_string())
        ]
    );
    assert_eq!(
        tokenize_for("category,message in get_flashed_messages()").unwrap(),
        vec![
            var("category"),
            var("message"),
            Token::Keyword("in".to_string()),
            Token::Iterator("get_flashed_messages".to_string())
        ]
    );
}

#[test]
fn tokenize_for_errors() {
    assert_eq!(tokenize_for("x in list)"), Err(ErrorKind::ArgumentList));
    assert_eq!(tokenize_for("x in f(list"), Err(ErrorKind::Unterminated(")")));
    assert_eq!(tokenize_for("1x in list"), Err(ErrorKind::UnexpectedChar('1')));
    assert_eq!(tokenize_for("x list").unwrap(), vec![var("x"), var("list")]);
}
