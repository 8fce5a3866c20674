//! Parameter expressions: `2 * l_ext + 1`, `n - 1`, `sqrt(a^2 + b^2)`.

use std::f64::consts::{E, PI};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected end of `{expr}`")]
    UnexpectedEnd { expr: String },

    #[error("unexpected `{found}` at {position} in `{expr}`")]
    Unexpected {
        expr: String,
        found: String,
        position: usize,
    },

    #[error("unknown variable {name}")]
    UnknownVariable { name: String },

    #[error("unknown function {name} with {arity} arguments")]
    UnknownFunction { name: String, arity: usize },

    #[error("`{expr}` does not evaluate to a finite number")]
    NotFinite { expr: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
}

#[derive(Debug, Clone, PartialEq)]
enum Ast {
    Number(f64),
    Var(String),
    Neg(Box<Ast>),
    Binary(char, Box<Ast>, Box<Ast>),
    Call(String, Vec<Ast>),
}

fn tokenize(expr: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let chars: Vec<(usize, char)> = expr.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            // exponent: 1e-3
            if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j].1, '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].1.is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].1.is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let end = chars.get(i).map(|(p, _)| *p).unwrap_or(expr.len());
            let text = &expr[chars[start].0..end];
            let value = text.parse().map_err(|_| ExprError::Unexpected {
                expr: expr.into(),
                found: text.into(),
                position: pos,
            })?;
            tokens.push((pos, Token::Number(value)));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let end = chars.get(i).map(|(p, _)| *p).unwrap_or(expr.len());
            tokens.push((pos, Token::Ident(expr[chars[start].0..end].to_string())));
        } else if "+-*/^(),".contains(c) {
            tokens.push((pos, Token::Op(c)));
            i += 1;
        } else {
            return Err(ExprError::Unexpected {
                expr: expr.into(),
                found: c.to_string(),
                position: pos,
            });
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    expr: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Result<Token, ExprError> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|(_, t)| t.clone())
            .ok_or_else(|| ExprError::UnexpectedEnd {
                expr: self.expr.into(),
            })?;
        self.pos += 1;
        Ok(token)
    }

    fn unexpected(&self) -> ExprError {
        match self.tokens.get(self.pos) {
            Some((position, token)) => ExprError::Unexpected {
                expr: self.expr.into(),
                found: match token {
                    Token::Number(v) => v.to_string(),
                    Token::Ident(s) => s.clone(),
                    Token::Op(c) => c.to_string(),
                },
                position: *position,
            },
            None => ExprError::UnexpectedEnd {
                expr: self.expr.into(),
            },
        }
    }

    fn expect(&mut self, op: char) -> Result<(), ExprError> {
        if self.peek() == Some(&Token::Op(op)) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    // sum := product (("+" | "-") product)*
    fn sum(&mut self) -> Result<Ast, ExprError> {
        let mut lhs = self.product()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(self.product()?));
        }
        Ok(lhs)
    }

    // product := unary (("*" | "/") unary)*
    fn product(&mut self) -> Result<Ast, ExprError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    // unary := ("-" | "+") unary | power
    fn unary(&mut self) -> Result<Ast, ExprError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(Ast::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power := atom ("^" unary)?   (right associative)
    fn power(&mut self) -> Result<Ast, ExprError> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Op('^')) {
            self.pos += 1;
            return Ok(Ast::Binary('^', Box::new(base), Box::new(self.unary()?)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Ast, ExprError> {
        if self.pos >= self.tokens.len() {
            return Err(self.unexpected());
        }
        match self.next()? {
            Token::Number(v) => Ok(Ast::Number(v)),
            Token::Ident(name) => {
                if self.peek() != Some(&Token::Op('(')) {
                    return Ok(Ast::Var(name));
                }
                self.pos += 1;
                let mut args = Vec::new();
                if self.peek() == Some(&Token::Op(')')) {
                    self.pos += 1;
                    return Ok(Ast::Call(name, args));
                }
                loop {
                    args.push(self.sum()?);
                    match self.next()? {
                        Token::Op(',') => continue,
                        Token::Op(')') => break,
                        _ => {
                            self.pos -= 1;
                            return Err(self.unexpected());
                        }
                    }
                }
                Ok(Ast::Call(name, args))
            }
            Token::Op('(') => {
                let inner = self.sum()?;
                self.expect(')')?;
                Ok(inner)
            }
            Token::Op(_) => {
                self.pos -= 1;
                Err(self.unexpected())
            }
        }
    }
}

fn parse(expr: &str) -> Result<Ast, ExprError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }
    let mut parser = Parser {
        expr,
        tokens,
        pos: 0,
    };
    let ast = parser.sum()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.unexpected());
    }
    Ok(ast)
}

fn eval(ast: &Ast, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<f64, ExprError> {
    Ok(match ast {
        Ast::Number(v) => *v,
        Ast::Var(name) => match lookup(name) {
            Some(v) => v,
            None => match name.as_str() {
                "pi" => PI,
                "e" => E,
                _ => return Err(ExprError::UnknownVariable { name: name.clone() }),
            },
        },
        Ast::Neg(inner) => -eval(inner, lookup)?,
        Ast::Binary(op, lhs, rhs) => {
            let (a, b) = (eval(lhs, lookup)?, eval(rhs, lookup)?);
            match op {
                '+' => a + b,
                '-' => a - b,
                '*' => a * b,
                '/' => a / b,
                _ => a.powf(b),
            }
        }
        Ast::Call(name, args) => {
            let values = args
                .iter()
                .map(|a| eval(a, lookup))
                .collect::<Result<Vec<_>, _>>()?;
            match (name.as_str(), values.as_slice()) {
                ("sin", [x]) => x.to_radians().sin(),
                ("cos", [x]) => x.to_radians().cos(),
                ("tan", [x]) => x.to_radians().tan(),
                ("sqrt", [x]) => x.sqrt(),
                ("abs", [x]) => x.abs(),
                ("round", [x]) => x.round(),
                ("floor", [x]) => x.floor(),
                ("min", [x, y]) => x.min(*y),
                ("max", [x, y]) => x.max(*y),
                ("pow", [x, y]) => x.powf(*y),
                _ => {
                    return Err(ExprError::UnknownFunction {
                        name: name.clone(),
                        arity: values.len(),
                    })
                }
            }
        }
    })
}

fn collect_vars(ast: &Ast, out: &mut Vec<String>) {
    match ast {
        Ast::Number(_) => {}
        Ast::Var(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Ast::Neg(inner) => collect_vars(inner, out),
        Ast::Binary(_, lhs, rhs) => {
            collect_vars(lhs, out);
            collect_vars(rhs, out);
        }
        Ast::Call(_, args) => args.iter().for_each(|a| collect_vars(a, out)),
    }
}

/// Evaluate `expr`, looking variables up through `lookup`.
/// Trigonometric functions take degrees.
pub fn evaluate(expr: &str, lookup: impl Fn(&str) -> Option<f64>) -> Result<f64, ExprError> {
    let value = eval(&parse(expr)?, &lookup)?;
    if !value.is_finite() {
        return Err(ExprError::NotFinite { expr: expr.into() });
    }
    Ok(value)
}

/// Variable names referenced by `expr`, in first-use order.
pub fn variables(expr: &str) -> Result<Vec<String>, ExprError> {
    let mut out = Vec::new();
    collect_vars(&parse(expr)?, &mut out);
    Ok(out)
}
