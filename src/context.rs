use crate::error::ErrorKind;
use serde_json::Value;
use std::borrow::Cow;

/// Resolves a dotted attribute path such as `user.address.city` against `root`.
///
/// Every segment must name a key of an object. The first segment that cannot be found is
/// reported in the error.
///
/// # Examples
///
/// ```
/// let data = serde_json::json!({ "user" : { "name" : "Ann" } });
/// assert_eq!(stencil::context::lookup(&data, "user.name").unwrap(), "Ann");
/// assert!(stencil::context::lookup(&data, "user.age").is_err());
/// ```
pub fn lookup<'v>(root: &'v Value, path: &str) -> Result<&'v Value, ErrorKind> {
    descend(root, path, path.split('.'))
}

fn descend<'v, 's>(
    mut value: &'v Value,
    path: &str,
    segments: impl Iterator<Item = &'s str>,
) -> Result<&'v Value, ErrorKind> {
    for segment in segments {
        value = value.get(segment).ok_or_else(|| ErrorKind::Missing {
            path: path.to_string(),
            segment: segment.to_string(),
        })?;
    }

    Ok(value)
}

/// Variables visible while rendering: the data context plus the loop variables of every
/// enclosing loop.
///
/// A loop scope only holds its own bindings and borrows everything else, so entering an
/// iteration never copies the data context.
#[derive(Debug)]
pub struct Scope<'a> {
    root: &'a Value,
    parent: Option<&'a Scope<'a>>,
    bindings: Vec<(&'a str, Cow<'a, Value>)>,
}

impl<'a> Scope<'a> {
    pub fn new(root: &'a Value) -> Self {
        Scope {
            root,
            parent: None,
            bindings: Vec::new(),
        }
    }

    /// Scope of one loop iteration. Bindings shadow the variables of the same name outside.
    pub fn child(
        &'a self,
        bindings: Vec<(&'a str, Cow<'a, Value>)>,
    ) -> Result<Scope<'a>, ErrorKind> {
        if !matches!(self.root, Value::Object(_) | Value::Null) {
            return Err(ErrorKind::ContextNotObject);
        }

        Ok(Scope {
            root: self.root,
            parent: Some(self),
            bindings,
        })
    }

    /// Same as [`lookup`], with loop variables taking precedence over the data context.
    pub fn lookup(&self, path: &str) -> Result<&Value, ErrorKind> {
        let mut segments = path.split('.');
        let head = segments.next().unwrap_or_default();

        let mut scope = Some(self);
        while let Some(current) = scope {
            let binding = current.bindings.iter().rev().find(|(name, _)| *name == head);
            if let Some((_, value)) = binding {
                return descend(&**value, path, segments);
            }
            scope = current.parent;
        }

        lookup(self.root, path)
    }
}

/// Converts a scalar into the text that is written to the page.
///
/// Strings are trimmed. Values that have no textual form (null, arrays and objects) are returned
/// as an error describing what was found; callers treat this as a warning.
pub fn stringify(value: &Value) -> Result<String, &'static str> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err("empty json"),
        Value::Array(_) => Err("json array"),
        Value::Object(_) => Err("json object"),
    }
}

/// Truthiness used by `{% if value %}`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
        Value::String(s) => match parse_int_prefix(s) {
            Some(n) => n != 0,
            None => !s.trim().is_empty(),
        },
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i != 0
            } else if let Some(u) = n.as_u64() {
                u != 0
            } else {
                n.as_f64().map(|f| f.trunc() != 0.).unwrap_or(false)
            }
        }
    }
}

/// Parses the integer at the start of `text` the way `std::stoi` does: leading whitespace is
/// skipped, a sign is accepted and parsing stops at the first non digit. Returns `None` if there
/// are no digits or the number does not fit.
pub fn parse_int_prefix(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

#[test]
fn lookup_nested() {
    let data = serde_json::json!({ "a" : { "b" : { "c" : 3 } }, "list" : [1, 2] });
    assert_eq!(lookup(&data, "a.b.c").unwrap(), 3);
    assert_eq!(lookup(&data, "list").unwrap(), &serde_json::json!([1, 2]));
    assert_eq!(
        lookup(&data, "a.x.c"),
        Err(ErrorKind::Missing {
            path: "a.x.c".to_string(),
            segment: "x".to_string()
        })
    );
    assert!(lookup(&data, "list.0").is_err());
}

#[test]
fn stringify_scalars() {
    assert_eq!(stringify(&Value::from("  hi  ")), Ok("hi".to_string()));
    assert_eq!(stringify(&Value::from(42)), Ok("42".to_string()));
    assert_eq!(stringify(&Value::from(2.5)), Ok("2.5".to_string()));
    assert_eq!(stringify(&Value::from(true)), Ok("true".to_string()));
    assert!(stringify(&Value::Null).is_err());
    assert!(stringify(&serde_json::json!([1])).is_err());
    assert!(stringify(&serde_json::json!({})).is_err());
}

#[test]
fn truthiness() {
    assert!(!is_truthy(&Value::Null));
    assert!(!is_truthy(&serde_json::json!([])));
    assert!(is_truthy(&serde_json::json!([0])));
    assert!(!is_truthy(&serde_json::json!({})));
    assert!(is_truthy(&serde_json::json!({ "a" : 1 })));
    assert!(!is_truthy(&Value::from("0")));
    assert!(is_truthy(&Value::from("12")));
    assert!(is_truthy(&Value::from("abc")));
    assert!(!is_truthy(&Value::from("   ")));
    assert!(!is_truthy(&Value::from(0)));
    assert!(!is_truthy(&Value::from(0.5)));
    assert!(is_truthy(&Value::from(-2)));
    assert!(is_truthy(&Value::from(true)));
}

#[test]
fn int_prefix() {
    assert_eq!(parse_int_prefix("42"), Some(42));
    assert_eq!(parse_int_prefix("  -7"), Some(-7));
    assert_eq!(parse_int_prefix("3.5"), Some(3));
    assert_eq!(parse_int_prefix("12abc"), Some(12));
    assert_eq!(parse_int_prefix("abc"), None);
    assert_eq!(parse_int_prefix(""), None);
    assert_eq!(parse_int_prefix("-"), None);
    assert_eq!(parse_int_prefix("99999999999999999999"), None);
}

#[test]
fn scope_bindings_shadow_context() {
    let data = serde_json::json!({ "x" : 1, "y" : { "z" : 2 } });
    let root = Scope::new(&data);
    assert_eq!(root.lookup("y.z").unwrap(), 2);

    let outer = root
        .child(vec![("x", Cow::Owned(serde_json::json!({ "name" : "a" })))])
        .unwrap();
    assert_eq!(outer.lookup("x.name").unwrap(), "a");
    assert_eq!(outer.lookup("y.z").unwrap(), 2);

    let inner = outer.child(vec![("y", Cow::Borrowed(&data["x"]))]).unwrap();
    assert_eq!(inner.lookup("x.name").unwrap(), "a");
    assert_eq!(inner.lookup("y").unwrap(), 1);
    assert_eq!(
        inner.lookup("y.z"),
        Err(ErrorKind::Missing {
            path: "y.z".to_string(),
            segment: "z".to_string()
        })
    );

    // The data context is untouched.
    assert_eq!(data["x"], 1);
}

#[test]
fn scope_needs_object_context() {
    let null = Value::Null;
    let scope = Scope::new(&null);
    let child = scope.child(vec![("a", Cow::Owned(Value::from(1)))]).unwrap();
    assert_eq!(child.lookup("a").unwrap(), 1);

    let list = serde_json::json!([1]);
    assert_eq!(
        Scope::new(&list).child(vec![]).unwrap_err(),
        ErrorKind::ContextNotObject
    );
}
