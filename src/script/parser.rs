// src/script/parser.rs

//! Recursive-descent parser producing a [`Program`].

use std::sync::Arc;

use super::ScriptError;
use super::ast::{BinOp, BoolOp, CmpOp, Expr, FunctionDef, Program, Stmt, StmtKind, Target, UnaryOp};
use super::lexer::{Tok, Token, tokenize};

const KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "in", "with", "as", "def", "return", "pass", "break",
    "continue", "and", "or", "not", "True", "False", "None", "class", "while", "lambda",
    "import", "from", "is",
];

/// Deepest syntax tree the parser will build. Nested brackets, unary
/// operators, operator chains and indented blocks all count.
pub const MAX_NESTING_DEPTH: usize = 200;

/// Parse script source into a program.
pub fn parse(source: &str) -> Result<Program, ScriptError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.pos)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ScriptError> {
        Err(ScriptError::Parse {
            line: self.line(),
            message: message.into(),
        })
    }

    fn descend(&mut self, levels: usize) -> Result<(), ScriptError> {
        self.depth += levels;
        if self.depth > MAX_NESTING_DEPTH {
            return self.error("expression nested too deeply");
        }
        Ok(())
    }

    fn ascend(&mut self, levels: usize) {
        self.depth = self.depth.saturating_sub(levels);
    }

    fn at_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Tok::Punct(q) if *q == p)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Name(n) if n == kw)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.at_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), ScriptError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            self.error(format!("expected '{p}', found {}", describe(self.peek())))
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), ScriptError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            self.error(format!("expected '{kw}', found {}", describe(self.peek())))
        }
    }

    fn expect_name(&mut self) -> Result<String, ScriptError> {
        match self.peek().clone() {
            Tok::Name(n) if !KEYWORDS.contains(&n.as_str()) => {
                self.pos += 1;
                Ok(n)
            }
            other => self.error(format!("expected a name, found {}", describe(&other))),
        }
    }

    fn expect_newline(&mut self) -> Result<(), ScriptError> {
        match self.peek().clone() {
            Tok::Newline => {
                self.pos += 1;
                Ok(())
            }
            Tok::Eof | Tok::Dedent => Ok(()),
            other => self.error(format!("expected end of line, found {}", describe(&other))),
        }
    }

    fn program(&mut self) -> Result<Program, ScriptError> {
        let mut body = Vec::new();
        loop {
            match self.peek().clone() {
                Tok::Eof => break,
                Tok::Newline => {
                    self.pos += 1;
                }
                Tok::Indent => return self.error("unexpected indent"),
                _ => body.push(self.statement()?),
            }
        }
        Ok(Program { body })
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        let line = self.line();
        let kind = match self.peek().clone() {
            Tok::Name(n) => match n.as_str() {
                "if" => self.if_statement()?,
                "for" => self.for_statement()?,
                "with" => self.with_statement()?,
                "def" => self.def_statement()?,
                "class" | "while" | "lambda" | "import" | "from" => {
                    return self.error(format!("'{n}' is not supported"));
                }
                _ => self.simple_statement()?,
            },
            _ => self.simple_statement()?,
        };
        Ok(Stmt { kind, line })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect_punct(":")?;
        self.descend(1)?;
        let body = self.block_body()?;
        self.ascend(1);
        Ok(body)
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, ScriptError> {

        if !matches!(self.peek(), Tok::Newline) {
            // Inline body: `if x: y = 1`
            let line = self.line();
            let kind = self.simple_statement()?;
            return Ok(vec![Stmt { kind, line }]);
        }

        self.pos += 1;
        if !matches!(self.peek(), Tok::Indent) {
            return self.error("expected an indented block");
        }
        self.pos += 1;

        let mut body = Vec::new();
        loop {
            match self.peek().clone() {
                Tok::Dedent => {
                    self.pos += 1;
                    break;
                }
                Tok::Eof => break,
                Tok::Newline => {
                    self.pos += 1;
                }
                _ => body.push(self.statement()?),
            }
        }
        Ok(body)
    }

    fn if_statement(&mut self) -> Result<StmtKind, ScriptError> {
        self.expect_keyword("if")?;
        let mut branches = Vec::new();
        let cond = self.expr()?;
        let body = self.block()?;
        branches.push((cond, body));

        let mut orelse = Vec::new();
        loop {
            if self.eat_keyword("elif") {
                let cond = self.expr()?;
                let body = self.block()?;
                branches.push((cond, body));
            } else if self.eat_keyword("else") {
                orelse = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(StmtKind::If { branches, orelse })
    }

    fn for_statement(&mut self) -> Result<StmtKind, ScriptError> {
        self.expect_keyword("for")?;
        let mut names = vec![self.expect_name()?];
        while self.eat_punct(",") {
            names.push(self.expect_name()?);
        }
        let target = if names.len() == 1 {
            Target::Name(names.remove(0))
        } else {
            Target::Tuple(names)
        };
        self.expect_keyword("in")?;
        let iter = self.expr_list()?;
        let body = self.block()?;
        Ok(StmtKind::For { target, iter, body })
    }

    fn with_statement(&mut self) -> Result<StmtKind, ScriptError> {
        self.expect_keyword("with")?;
        let context = self.expr()?;
        let binding = if self.eat_keyword("as") {
            Some(self.expect_name()?)
        } else {
            None
        };
        let body = self.block()?;
        Ok(StmtKind::With {
            context,
            binding,
            body,
        })
    }

    fn def_statement(&mut self) -> Result<StmtKind, ScriptError> {
        self.expect_keyword("def")?;
        let name = self.expect_name()?;
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.at_punct(")") {
            loop {
                params.push(self.expect_name()?);
                if !self.eat_punct(",") || self.at_punct(")") {
                    break;
                }
            }
        }
        self.expect_punct(")")?;
        let body = self.block()?;
        Ok(StmtKind::FunctionDef(Arc::new(FunctionDef { name, params, body })))
    }

    fn simple_statement(&mut self) -> Result<StmtKind, ScriptError> {
        let kind = if self.eat_keyword("pass") {
            StmtKind::Pass
        } else if self.eat_keyword("break") {
            StmtKind::Break
        } else if self.eat_keyword("continue") {
            StmtKind::Continue
        } else if self.eat_keyword("return") {
            if matches!(self.peek(), Tok::Newline | Tok::Eof | Tok::Dedent) {
                StmtKind::Return(None)
            } else {
                StmtKind::Return(Some(self.expr_list()?))
            }
        } else {
            let lhs = self.expr_list()?;
            if self.eat_punct("=") {
                let target = self.to_target(lhs)?;
                let value = self.expr_list()?;
                if self.at_punct("=") {
                    return self.error("chained assignment is not supported");
                }
                StmtKind::Assign { target, value }
            } else if let Some(op) = self.aug_op() {
                let Expr::Name(target) = lhs else {
                    return self.error("augmented assignment target must be a name");
                };
                let value = self.expr()?;
                StmtKind::AugAssign { target, op, value }
            } else {
                StmtKind::Expr(lhs)
            }
        };
        self.expect_newline()?;
        Ok(kind)
    }

    fn aug_op(&mut self) -> Option<BinOp> {
        let op = match self.peek().clone() {
            Tok::Punct("+=") => BinOp::Add,
            Tok::Punct("-=") => BinOp::Sub,
            Tok::Punct("*=") => BinOp::Mul,
            Tok::Punct("/=") => BinOp::Div,
            Tok::Punct("//=") => BinOp::FloorDiv,
            Tok::Punct("%=") => BinOp::Mod,
            Tok::Punct("**=") => BinOp::Pow,
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn to_target(&self, expr: Expr) -> Result<Target, ScriptError> {
        match expr {
            Expr::Name(n) => Ok(Target::Name(n)),
            Expr::Tuple(items) => {
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Expr::Name(n) => names.push(n),
                        _ => return self.error("cannot assign to expression"),
                    }
                }
                Ok(Target::Tuple(names))
            }
            Expr::Index { .. } => self.error("item assignment is not supported"),
            _ => self.error("cannot assign to expression"),
        }
    }

    /// `expr (',' expr)* [',']`, folded into a tuple when a comma is present.
    fn expr_list(&mut self) -> Result<Expr, ScriptError> {
        let first = self.expr()?;
        if !self.at_punct(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            if self.at_expr_end() {
                break;
            }
            items.push(self.expr()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn at_expr_end(&self) -> bool {
        matches!(
            self.peek(),
            Tok::Newline | Tok::Eof | Tok::Dedent | Tok::Punct("=") | Tok::Punct(")") | Tok::Punct(":")
        )
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        self.descend(1)?;
        let expr = self.or_expr()?;
        self.ascend(1);
        Ok(expr)
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.and_expr()?;
        let mut chain = 0;
        while self.eat_keyword("or") {
            chain += 1;
            self.descend(1)?;
            let right = self.and_expr()?;
            left = Expr::Logical {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.ascend(chain);
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.not_expr()?;
        let mut chain = 0;
        while self.eat_keyword("and") {
            chain += 1;
            self.descend(1)?;
            let right = self.not_expr()?;
            left = Expr::Logical {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.ascend(chain);
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ScriptError> {
        if self.eat_keyword("not") {
            self.descend(1)?;
            let operand = self.not_expr()?;
            self.ascend(1);
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let left = self.arith()?;
        let op = match self.peek().clone() {
            Tok::Punct("==") => CmpOp::Eq,
            Tok::Punct("!=") => CmpOp::NotEq,
            Tok::Punct("<") => CmpOp::Lt,
            Tok::Punct("<=") => CmpOp::LtE,
            Tok::Punct(">") => CmpOp::Gt,
            Tok::Punct(">=") => CmpOp::GtE,
            Tok::Name(n) if n == "in" => CmpOp::In,
            Tok::Name(n) if n == "not" => {
                let next_is_in = matches!(
                    self.tokens.get(self.pos + 1).map(|t| &t.tok),
                    Some(Tok::Name(n)) if n == "in"
                );
                if !next_is_in {
                    return Ok(left);
                }
                self.pos += 1;
                CmpOp::NotIn
            }
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.arith()?;
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn arith(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.term()?;
        let mut chain = 0;
        loop {
            let op = match self.peek().clone() {
                Tok::Punct("+") => BinOp::Add,
                Tok::Punct("-") => BinOp::Sub,
                _ => {
                    self.ascend(chain);
                    return Ok(left);
                }
            };
            self.pos += 1;
            chain += 1;
            self.descend(1)?;
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn term(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.factor()?;
        let mut chain = 0;
        loop {
            let op = match self.peek().clone() {
                Tok::Punct("*") => BinOp::Mul,
                Tok::Punct("/") => BinOp::Div,
                Tok::Punct("//") => BinOp::FloorDiv,
                Tok::Punct("%") => BinOp::Mod,
                _ => {
                    self.ascend(chain);
                    return Ok(left);
                }
            };
            self.pos += 1;
            chain += 1;
            self.descend(1)?;
            let right = self.factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn factor(&mut self) -> Result<Expr, ScriptError> {
        let op = match self.peek().clone() {
            Tok::Punct("-") => UnaryOp::Neg,
            Tok::Punct("+") => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.pos += 1;
        self.descend(1)?;
        let operand = self.factor()?;
        self.ascend(1);
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> Result<Expr, ScriptError> {
        let base = self.postfix()?;
        if self.eat_punct("**") {
            self.descend(1)?;
            let exponent = self.factor()?;
            self.ascend(1);
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.atom()?;
        let mut chain = 0;
        loop {
            if self.at_punct("(") || self.at_punct("[") || self.at_punct(".") {
                chain += 1;
                self.descend(1)?;
            }
            if self.eat_punct("(") {
                let args = self.call_args()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                };
            } else if self.eat_punct("[") {
                let index = self.expr()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    value: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat_punct(".") {
                let name = self.expect_name()?;
                if !self.eat_punct("(") {
                    return self.error(format!("attribute access '.{name}' is not supported"));
                }
                let args = self.call_args()?;
                expr = Expr::Method {
                    receiver: Box::new(expr),
                    name,
                    args,
                };
            } else {
                self.ascend(chain);
                return Ok(expr);
            }
        }
    }

    /// Arguments after an opening parenthesis, consuming the closing one.
    fn call_args(&mut self) -> Result<Vec<Expr>, ScriptError> {
        let mut args = Vec::new();
        while !self.at_punct(")") {
            args.push(self.expr()?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(args)
    }

    fn atom(&mut self) -> Result<Expr, ScriptError> {
        match self.advance() {
            Tok::Int(i) => Ok(Expr::Int(i)),
            Tok::Float(f) => Ok(Expr::Float(f)),
            Tok::Str(mut s) => {
                // Adjacent literals concatenate.
                while let Tok::Str(next) = self.peek().clone() {
                    self.pos += 1;
                    s.push_str(&next);
                }
                Ok(Expr::Str(s))
            }
            Tok::Name(n) => {
                if n == "True" {
                    Ok(Expr::Bool(true))
                } else if n == "False" {
                    Ok(Expr::Bool(false))
                } else if n == "None" {
                    Ok(Expr::None)
                } else if KEYWORDS.contains(&n.as_str()) {
                    self.pos -= 1;
                    self.error(format!("unexpected keyword '{n}'"))
                } else {
                    Ok(Expr::Name(n))
                }
            }
            Tok::Punct("(") => {
                if self.eat_punct(")") {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let inner = self.expr_list()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            Tok::Punct("[") => {
                let mut items = Vec::new();
                while !self.at_punct("]") {
                    items.push(self.expr()?);
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct("]")?;
                Ok(Expr::List(items))
            }
            Tok::Punct("{") => {
                let mut entries = Vec::new();
                while !self.at_punct("}") {
                    let key = self.expr()?;
                    self.expect_punct(":")?;
                    let value = self.expr()?;
                    entries.push((key, value));
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct("}")?;
                Ok(Expr::Dict(entries))
            }
            other => {
                self.pos = self.pos.saturating_sub(1);
                self.error(format!("unexpected {}", describe(&other)))
            }
        }
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Name(n) => format!("'{n}'"),
        Tok::Int(i) => format!("'{i}'"),
        Tok::Float(f) => format!("'{f}'"),
        Tok::Str(_) => "string literal".to_string(),
        Tok::Punct(p) => format!("'{p}'"),
        Tok::Newline => "end of line".to_string(),
        Tok::Indent => "indent".to_string(),
        Tok::Dedent => "dedent".to_string(),
        Tok::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignment_with_precedence() {
        let program = parse("y = x + 5 * 2").unwrap();
        let StmtKind::Assign { target, value } = &program.body[0].kind else {
            panic!("expected assignment");
        };
        assert_eq!(*target, Target::Name("y".into()));
        let Expr::Binary { op, right, .. } = value else {
            panic!("expected binary op");
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(**right, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn parses_blocks_and_trailing_expression() {
        let src = "total = 0\nfor i in range(3):\n    total += i\ntotal\n";
        let program = parse(src).unwrap();
        assert_eq!(program.body.len(), 3);
        assert!(matches!(program.body[1].kind, StmtKind::For { .. }));
        assert_eq!(program.trailing_expr(), Some(&Expr::Name("total".into())));
    }

    #[test]
    fn parses_function_definition() {
        let program = parse("def add(a, b):\n    return a + b\n").unwrap();
        let StmtKind::FunctionDef(def) = &program.body[0].kind else {
            panic!("expected def");
        };
        assert_eq!(def.name, "add");
        assert_eq!(def.params, vec!["a", "b"]);
    }

    #[test]
    fn parses_if_elif_else_and_not_in() {
        let src = "if x not in xs:\n    y = 1\nelif x > 2: y = 2\nelse:\n    y = 3\n";
        let program = parse(src).unwrap();
        let StmtKind::If { branches, orelse } = &program.body[0].kind else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(orelse.len(), 1);
        assert!(matches!(branches[0].0, Expr::Compare { op: CmpOp::NotIn, .. }));
    }

    #[test]
    fn tuple_assignment_and_with_binding() {
        let program = parse("a, b = 1, 2\nwith open_thing() as h:\n    pass\n").unwrap();
        assert!(matches!(
            &program.body[0].kind,
            StmtKind::Assign { target: Target::Tuple(names), .. } if names.len() == 2
        ));
        assert!(matches!(
            &program.body[1].kind,
            StmtKind::With { binding: Some(b), .. } if b == "h"
        ));
    }

    #[test]
    fn reports_line_of_syntax_error() {
        let err = parse("x = 1\ny = (2 +\n").unwrap_err();
        assert!(matches!(err, ScriptError::Parse { .. }));

        let err = parse("x = 1\ny = = 2\n").unwrap_err();
        assert!(matches!(err, ScriptError::Parse { line: 2, .. }));
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        let parens = format!("x = {}1{}", "(".repeat(3_000), ")".repeat(3_000));
        let err = parse(&parens).unwrap_err();
        assert!(
            matches!(&err, ScriptError::Parse { message, .. } if message.contains("nested too deeply")),
            "{err}"
        );

        let negations = format!("x = {}1", "-".repeat(3_000));
        assert!(parse(&negations).is_err());

        let chain = format!("x = 1{}", " + 1".repeat(3_000));
        assert!(parse(&chain).is_err());

        let lists = format!("x = {}{}", "[".repeat(3_000), "]".repeat(3_000));
        assert!(parse(&lists).is_err());
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let src = format!("x = {}1{}", "(".repeat(50), ")".repeat(50));
        assert!(parse(&src).is_ok());
        let chain = format!("x = 1{}", " + 1".repeat(100));
        assert!(parse(&chain).is_ok());
        assert!(parse("y = f(1)(2)[0]
").is_ok());
    }

    #[test]
    fn rejects_unsupported_statements() {
        assert!(parse("class A:\n    pass\n").is_err());
        assert!(parse("xs[0] = 1\n").is_err());
    }
}
