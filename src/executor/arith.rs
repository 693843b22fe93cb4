//! Integer expressions for `SET /A`.

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Num(i64),
    Name(&'a str),
    Op(char),
    Open,
    Close,
}

fn tokenize(expr: &str) -> Result<Vec<Token<'_>>, String> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() {
            let mut end = start;
            while let Some(&(i, d)) = chars.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                end = i + d.len_utf8();
                chars.next();
            }
            let value = expr[start..end]
                .parse()
                .map_err(|_| format!("Invalid number: {}", &expr[start..end]))?;
            tokens.push(Token::Num(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut end = start;
            while let Some(&(i, d)) = chars.peek() {
                if !(d.is_alphanumeric() || d == '_') {
                    break;
                }
                end = i + d.len_utf8();
                chars.next();
            }
            tokens.push(Token::Name(&expr[start..end]));
        } else {
            chars.next();
            tokens.push(match c {
                '+' | '-' | '*' | '/' | '%' => Token::Op(c),
                '(' => Token::Open,
                ')' => Token::Close,
                _ => return Err(format!("Invalid operator: {c}")),
            });
        }
    }

    Ok(tokens)
}

/// Deepest nesting of parentheses and unary signs accepted.
const MAX_NESTING: usize = 256;

struct Parser<'t, 'a, F> {
    tokens: &'t [Token<'a>],
    pos: usize,
    depth: usize,
    lookup: F,
}

impl<'a, F> Parser<'_, 'a, F>
where
    F: Fn(&str) -> i64,
{
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<i64, String> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' {
                value.wrapping_add(rhs)
            } else {
                value.wrapping_sub(rhs)
            };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<i64, String> {
        let mut value = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                '*' => value.wrapping_mul(rhs),
                _ if rhs == 0 => return Err("Divide by zero error.".to_string()),
                '/' => value.wrapping_div(rhs),
                _ => value.wrapping_rem(rhs),
            };
        }
        Ok(value)
    }

    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Result<i64, String>) -> Result<i64, String> {
        if self.depth >= MAX_NESTING {
            return Err("Expression too complex.".to_string());
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn unary(&mut self) -> Result<i64, String> {
        match self.next() {
            Some(Token::Op('-')) => Ok(self.nested(Self::unary)?.wrapping_neg()),
            Some(Token::Op('+')) => self.nested(Self::unary),
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Name(name)) => Ok((self.lookup)(name)),
            Some(Token::Open) => {
                let value = self.nested(Self::expr)?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err("Unbalanced parentheses.".to_string()),
                }
            }
            _ => Err("Missing operand.".to_string()),
        }
    }
}

/// Evaluate `expr`. Names resolve through `lookup`; the error is a message
/// suitable for a runtime exception.
pub(crate) fn evaluate<F>(expr: &str, lookup: F) -> Result<i64, String>
where
    F: Fn(&str) -> i64,
{
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        lookup,
    };
    let value = parser.expr()?;
    if parser.pos < tokens.len() {
        return Err("Missing operator.".to_string());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(name: &str) -> i64 {
        match name {
            "COUNT" => 4,
            _ => 0,
        }
    }

    #[test]
    fn honours_precedence_and_parentheses() {
        assert_eq!(evaluate("1 + 2 * 3", vars), Ok(7));
        assert_eq!(evaluate("(1 + 2) * 3", vars), Ok(9));
        assert_eq!(evaluate("COUNT * -2 + 10 % 4", vars), Ok(-6));
        assert_eq!(evaluate("UNSET + 1", vars), Ok(1));
    }

    #[test]
    fn reports_errors() {
        assert_eq!(evaluate("10 / (COUNT - 4)", vars), Err("Divide by zero error.".to_string()));
        assert_eq!(evaluate("1 +", vars), Err("Missing operand.".to_string()));
        assert_eq!(evaluate("(1 + 2", vars), Err("Unbalanced parentheses.".to_string()));
        assert_eq!(evaluate("1 2", vars), Err("Missing operator.".to_string()));
        assert!(evaluate("1 & 2", vars).is_err());
    }

    #[test]
    fn caps_nesting_depth() {
        let deep = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(evaluate(&deep, vars), Err("Expression too complex.".to_string()));
        let signs = format!("{}1", "-".repeat(10_000));
        assert_eq!(evaluate(&signs, vars), Err("Expression too complex.".to_string()));

        let fine = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(evaluate(&fine, vars), Ok(1));
        assert_eq!(evaluate("--1", vars), Ok(1));
    }
}
