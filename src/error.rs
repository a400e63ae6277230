use thiserror::Error;

/// What went wrong while rendering a template.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    #[error("cannot find the closing `{0}`")]
    Unterminated(&'static str),
    #[error("cannot find {{% {0} %}}")]
    MissingEnd(&'static str),
    #[error("failed to parse string, cannot find string end")]
    UnterminatedString,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unrecognized statement \"{0}\"")]
    UnknownStatement(String),
    #[error("{{% {0} %}} without a matching opening statement")]
    StrayStatement(String),
    #[error("unexpected token {token} in the {statement} statement")]
    UnexpectedToken {
        token: &'static str,
        statement: &'static str,
    },
    #[error("unexpected end of input in the {0} statement")]
    UnexpectedEnd(&'static str),
    #[error("unknown operator \"{0}\" in the if statement")]
    UnknownOperator(String),
    #[error("subscript \"{0}\" is not supported")]
    Subscript(String),
    #[error("argument list must be started with '('")]
    ArgumentList,
    #[error("invalid \"loadblock\" syntax")]
    LoadBlockSyntax,
    #[error("cannot read the template file \"{0}\"")]
    FileNotFound(String),
    #[error("cannot find the block \"{name}\" in the file \"{file}\"")]
    BlockNotFound { name: String, file: String },
    #[error("cannot find \"endblock\" of the block \"{0}\"")]
    EndBlockNotFound(String),
    #[error("cannot find the attribute \"{segment}\" of \"{path}\"")]
    Missing { path: String, segment: String },
    #[error("\"{0}\" is not a json array")]
    NotArray(String),
    #[error("\"in\" keyword must separate variables and iterator")]
    MissingIn,
    #[error("an iterator or a variable must be present after \"in\" keyword")]
    MissingSource,
    #[error("for loop must start with variable declaration")]
    MissingVariable,
    #[error("unknown iterator function \"{0}\"")]
    UnknownIterator(String),
    #[error("\"{iterator}\" uses {expected} variables, {found} provided")]
    VariableCount {
        iterator: String,
        expected: &'static str,
        found: usize,
    },
    #[error("\"{iterator}\" takes {expected} positional arguments, {found} provided")]
    ArgumentCount {
        iterator: String,
        expected: usize,
        found: usize,
    },
    #[error("loop variables need an object context")]
    ContextNotObject,
    #[error("templates are nested deeper than {0} levels")]
    TooDeep(usize),
}

/// A fatal render error, located in the template it happened in.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("error in '{file}' on line {line}: {kind}")]
pub struct Error {
    pub file: String,
    /// 1-based line of the offending directive.
    pub line: usize,
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(file: impl Into<String>, line: usize, kind: ErrorKind) -> Self {
        Error {
            file: file.into(),
            line,
            kind,
        }
    }
}

#[test]
fn error_display() {
    let error = Error::new("index.html", 3, ErrorKind::MissingEnd("endif"));
    assert_eq!(
        error.to_string(),
        "error in 'index.html' on line 3: cannot find {% endif %}"
    );
}

#[test]
fn missing_display() {
    let kind = ErrorKind::Missing {
        path: "user.name".to_string(),
        segment: "name".to_string(),
    };
    assert_eq!(
        kind.to_string(),
        "cannot find the attribute \"name\" of \"user.name\""
    );
}
