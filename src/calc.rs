// Arithmetic over the text that templates fold together, e.g. "3*2+1".
//
// Malformed input is not an error: the caller falls back to rendering the text as is, so every
// failure simply returns None.

#[derive(PartialEq, Debug, Clone, Copy)]
enum Op {
    Plus,      // +
    Minus,     // -
    Multiply,  // *
    Divide,    // /
    Modulo,    // %
    Negate,    // unary -
    ParenOpen, // (
}

#[derive(PartialEq, Debug)]
enum Item {
    Number(f64),
    Op(Op),
    ParenClose,
}

// Lower number == Higher priority.
fn operator_priority(op: Op) -> u32 {
    match op {
        Op::Negate => 2,
        Op::Multiply | Op::Divide | Op::Modulo => 3,
        Op::Plus | Op::Minus => 4,
        Op::ParenOpen => 100,
    }
}

fn tokenize(expression: &str) -> Option<Vec<Item>> {
    let mut items = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let mut end = start + 1;
            while let Some(&(index, next)) = chars.peek() {
                if !(next.is_ascii_digit() || next == '.') {
                    break;
                }
                end = index + 1;
                chars.next();
            }

            items.push(Item::Number(expression[start..end].parse().ok()?));
            continue;
        }

        // '-' and '+' are unary when nothing that could be a left operand precedes them.
        let unary = matches!(items.last(), None | Some(Item::Op(_)));
        match c {
            '+' if unary => {}
            '-' if unary => items.push(Item::Op(Op::Negate)),
            '+' => items.push(Item::Op(Op::Plus)),
            '-' => items.push(Item::Op(Op::Minus)),
            '*' => items.push(Item::Op(Op::Multiply)),
            '/' => items.push(Item::Op(Op::Divide)),
            '%' => items.push(Item::Op(Op::Modulo)),
            '(' => items.push(Item::Op(Op::ParenOpen)),
            ')' => items.push(Item::ParenClose),
            _ => return None,
        }
    }

    Some(items)
}

fn apply(op: Op, operands: &mut Vec<f64>) -> Option<()> {
    let result = if op == Op::Negate {
        -operands.pop()?
    } else {
        let right = operands.pop()?;
        let left = operands.pop()?;
        match op {
            Op::Plus => left + right,
            Op::Minus => left - right,
            Op::Multiply => left * right,
            Op::Divide | Op::Modulo if right == 0. => return None,
            Op::Divide => left / right,
            Op::Modulo => left % right,
            Op::Negate | Op::ParenOpen => return None,
        }
    };

    operands.push(result);
    Some(())
}

/// Evaluates `expression` with the usual operator precedence.
///
/// Supports `+ - * / %`, parentheses, unary signs and decimal literals. Returns `None` when the
/// text is not a valid arithmetic expression, including division by zero.
///
/// # Examples
///
/// ```
/// assert_eq!(stencil::calc::evaluate("2 + 3 * (4 - 1)"), Some(11.));
/// assert_eq!(stencil::calc::evaluate("John"), None);
/// ```
pub fn evaluate(expression: &str) -> Option<f64> {
    let mut operands: Vec<f64> = Vec::new();
    let mut operators: Vec<Op> = Vec::new();
    let mut expect_operand = true;

    for item in tokenize(expression)? {
        match item {
            Item::Number(n) => {
                if !expect_operand {
                    return None;
                }
                operands.push(n);
                expect_operand = false;
            }
            Item::Op(op @ (Op::ParenOpen | Op::Negate)) => {
                if !expect_operand {
                    return None;
                }
                operators.push(op);
            }
            Item::Op(op) => {
                if expect_operand {
                    return None;
                }

                while let Some(&top) = operators.last() {
                    if top == Op::ParenOpen || operator_priority(top) > operator_priority(op) {
                        break;
                    }
                    operators.pop();
                    apply(top, &mut operands)?;
                }

                operators.push(op);
                expect_operand = true;
            }
            Item::ParenClose => {
                if expect_operand {
                    return None;
                }

                loop {
                    match operators.pop()? {
                        Op::ParenOpen => break,
                        top => apply(top, &mut operands)?,
                    }
                }
            }
        }
    }

    if expect_operand {
        return None;
    }

    while let Some(top) = operators.pop() {
        if top == Op::ParenOpen {
            return None;
        }
        apply(top, &mut operands)?;
    }

    match operands.as_slice() {
        [result] if result.is_finite() => Some(*result),
        _ => None,
    }
}

/// Formats a number the way a C++ stream does by default: at most 6 significant digits,
/// switching to scientific notation for very large or very small magnitudes.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0. { "inf" } else { "-inf" }.to_string();
    }
    if value == 0. {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Rounding to 6 significant digits first tells which notation to use.
    let scientific = format!("{:.5e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => return value.to_string(),
    };

    if (-4..6).contains(&exponent) {
        let decimals = (5 - exponent) as usize;
        strip_trailing_zeros(format!("{:.*}", decimals, value))
    } else {
        format!(
            "{}e{}{:02}",
            strip_trailing_zeros(mantissa.to_string()),
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        )
    }
}

fn strip_trailing_zeros(number: String) -> String {
    if !number.contains('.') {
        return number;
    }
    number
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[test]
fn precedence() {
    assert_eq!(evaluate("1+2*3"), Some(7.));
    assert_eq!(evaluate("(1+2)*3"), Some(9.));
    assert_eq!(evaluate("10-4-3"), Some(3.));
    assert_eq!(evaluate("8/4/2"), Some(1.));
    assert_eq!(evaluate("7%4+1"), Some(4.));
    assert_eq!(evaluate(" 2 * ( 3 + ( 4 - 1 ) ) "), Some(12.));
}

#[test]
fn unary_signs() {
    assert_eq!(evaluate("-3"), Some(-3.));
    assert_eq!(evaluate("2*-3"), Some(-6.));
    assert_eq!(evaluate("--3"), Some(3.));
    assert_eq!(evaluate("+4-1"), Some(3.));
    assert_eq!(evaluate("-(2+3)*2"), Some(-10.));
}

#[test]
fn decimals() {
    assert_eq!(evaluate("3.0"), Some(3.));
    assert_eq!(evaluate("0.5*4"), Some(2.));
    assert_eq!(evaluate(".5+.5"), Some(1.));
    assert_eq!(evaluate("1.2.3"), None);
}

#[test]
fn malformed_input() {
    assert_eq!(evaluate(""), None);
    assert_eq!(evaluate("abc"), None);
    assert_eq!(evaluate("2+"), None);
    assert_eq!(evaluate("2 3"), None);
    assert_eq!(evaluate("(2+3"), None);
    assert_eq!(evaluate("2+3)"), None);
    assert_eq!(evaluate("*2"), None);
    assert_eq!(evaluate("4/0"), None);
    assert_eq!(evaluate("4%0"), None);
    assert_eq!(evaluate("1+x"), None);
}

#[test]
fn format_like_stream() {
    assert_eq!(format_number(2.), "2");
    assert_eq!(format_number(-7.), "-7");
    assert_eq!(format_number(2.5), "2.5");
    assert_eq!(format_number(1. / 3.), "0.333333");
    assert_eq!(format_number(123456.7), "123457");
    assert_eq!(format_number(1234567.), "1.23457e+06");
    assert_eq!(format_number(0.0001), "0.0001");
    assert_eq!(format_number(0.00001), "1e-05");
    assert_eq!(format_number(0.1 + 0.2), "0.3");
    assert_eq!(format_number(0.), "0");
}
