use crate::ast::{
    Assign, AugAssign, BinaryOp, BoolOp, ClassDef, CompareOp, Expression, ForLoop, FunctionDef,
    IfStatement, Literal, Program, Statement, UnaryOp, WhileLoop,
};
use crate::errors::ParseError;
use crate::lexer::{Lexer, SpannedToken, Token};

/// Parse source text into a [`Program`].
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].token
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].token.clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), ParseError> {
        if self.peek() == &token {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::new(
                self.line(),
                format!("expected {what}, found {:?}", self.peek()),
            ))
        }
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        while !matches!(self.peek(), Token::Eof) {
            if self.eat(&Token::Newline) {
                continue;
            }
            body.extend(self.parse_statement()?);
        }
        Ok(Program::new(body))
    }

    /// A statement line may hold several `;`-separated simple statements, so
    /// this returns a list.
    fn parse_statement(&mut self) -> Result<Vec<Statement>, ParseError> {
        match self.peek() {
            Token::If => Ok(vec![self.parse_if()?]),
            Token::While => Ok(vec![self.parse_while()?]),
            Token::For => Ok(vec![self.parse_for()?]),
            Token::Def => Ok(vec![self.parse_def()?]),
            Token::Class => Ok(vec![self.parse_class()?]),
            _ => self.parse_simple_line(),
        }
    }

    fn parse_simple_line(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut stmts = vec![self.parse_simple_statement()?];
        while self.eat(&Token::Semi) {
            if matches!(self.peek(), Token::Newline | Token::Eof) {
                break;
            }
            stmts.push(self.parse_simple_statement()?);
        }
        if !matches!(self.peek(), Token::Eof) {
            self.expect(Token::Newline, "end of line")?;
        }
        Ok(stmts)
    }

    fn parse_simple_statement(&mut self) -> Result<Statement, ParseError> {
        match self.peek() {
            Token::Return => {
                self.advance();
                if matches!(self.peek(), Token::Newline | Token::Semi | Token::Eof) {
                    Ok(Statement::Return(None))
                } else {
                    Ok(Statement::Return(Some(self.parse_expression()?)))
                }
            }
            Token::Pass => {
                self.advance();
                Ok(Statement::Pass)
            }
            Token::Break => {
                self.advance();
                Ok(Statement::Break)
            }
            Token::Continue => {
                self.advance();
                Ok(Statement::Continue)
            }
            Token::Name(_) => {
                if let Some(op) = self.assignment_op_ahead() {
                    let target = match self.advance() {
                        Token::Name(name) => name,
                        _ => unreachable!(),
                    };
                    self.advance(); // the assignment operator
                    let value = self.parse_expression()?;
                    Ok(match op {
                        None => Statement::Assign(Assign { target, value }),
                        Some(op) => Statement::AugAssign(AugAssign { target, op, value }),
                    })
                } else {
                    Ok(Statement::Expr(self.parse_expression()?))
                }
            }
            _ => Ok(Statement::Expr(self.parse_expression()?)),
        }
    }

    /// Looks one token past a leading name; `Some(None)` is plain `=`,
    /// `Some(Some(op))` an augmented assignment, `None` not an assignment.
    #[allow(clippy::option_option)]
    fn assignment_op_ahead(&self) -> Option<Option<BinaryOp>> {
        match self.peek_at(1) {
            Token::Assign => Some(None),
            Token::PlusAssign => Some(Some(BinaryOp::Add)),
            Token::MinusAssign => Some(Some(BinaryOp::Sub)),
            Token::StarAssign => Some(Some(BinaryOp::Mul)),
            Token::SlashSlashAssign => Some(Some(BinaryOp::FloorDiv)),
            Token::AmpAssign => Some(Some(BinaryOp::BitAnd)),
            Token::PipeAssign => Some(Some(BinaryOp::BitOr)),
            Token::CaretAssign => Some(Some(BinaryOp::BitXor)),
            Token::ShlAssign => Some(Some(BinaryOp::Shl)),
            Token::ShrAssign => Some(Some(BinaryOp::Shr)),
            _ => None,
        }
    }

    fn parse_suite(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.expect(Token::Colon, "':'")?;
        if self.eat(&Token::Newline) {
            self.expect(Token::Indent, "indented block")?;
            let mut body = Vec::new();
            while !self.eat(&Token::Dedent) {
                if self.eat(&Token::Newline) {
                    continue;
                }
                if matches!(self.peek(), Token::Eof) {
                    return Err(ParseError::new(self.line(), "unexpected end of input"));
                }
                body.extend(self.parse_statement()?);
            }
            Ok(body)
        } else {
            // Inline suite: `if x: y = 1`
            self.parse_simple_line()
        }
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        self.expect(Token::If, "'if'")?;
        let test = self.parse_expression()?;
        let body = self.parse_suite()?;
        let orelse = if matches!(self.peek(), Token::Elif) {
            // Desugar `elif` into a nested if in the else branch.
            self.tokens[self.pos].token = Token::If;
            vec![self.parse_if()?]
        } else if self.eat(&Token::Else) {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Statement::If(IfStatement { test, body, orelse }))
    }

    fn parse_while(&mut self) -> Result<Statement, ParseError> {
        self.expect(Token::While, "'while'")?;
        let test = self.parse_expression()?;
        let body = self.parse_suite()?;
        Ok(Statement::While(WhileLoop { test, body }))
    }

    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        self.expect(Token::For, "'for'")?;
        let target = self.parse_name("loop variable")?;
        self.expect(Token::In, "'in'")?;
        let iter = self.parse_expression()?;
        let body = self.parse_suite()?;
        Ok(Statement::For(ForLoop { target, iter, body }))
    }

    fn parse_def(&mut self) -> Result<Statement, ParseError> {
        self.expect(Token::Def, "'def'")?;
        let name = self.parse_name("function name")?;
        self.expect(Token::LParen, "'('")?;
        let mut params = Vec::new();
        if !matches!(self.peek(), Token::RParen) {
            loop {
                params.push(self.parse_name("parameter name")?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen, "')'")?;
        let body = self.parse_suite()?;
        Ok(Statement::FunctionDef(FunctionDef { name, params, body }))
    }

    fn parse_class(&mut self) -> Result<Statement, ParseError> {
        self.expect(Token::Class, "'class'")?;
        let name = self.parse_name("class name")?;
        // Optional empty parent list for familiarity: `class C():`
        if self.eat(&Token::LParen) {
            self.expect(Token::RParen, "')'")?;
        }
        let body = self.parse_suite()?;
        Ok(Statement::ClassDef(ClassDef { name, body }))
    }

    fn parse_name(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek().clone() {
            Token::Name(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(ParseError::new(
                self.line(),
                format!("expected {what}, found {other:?}"),
            )),
        }
    }

    // ------------------------------------------------------------------
    // Expressions, loosest binding first.
    // ------------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        if matches!(self.peek(), Token::Lambda) {
            return self.parse_lambda();
        }
        let body = self.parse_or()?;
        if self.eat(&Token::If) {
            let test = self.parse_or()?;
            self.expect(Token::Else, "'else'")?;
            let orelse = self.parse_expression()?;
            return Ok(Expression::conditional(test, body, orelse));
        }
        Ok(body)
    }

    fn parse_lambda(&mut self) -> Result<Expression, ParseError> {
        self.expect(Token::Lambda, "'lambda'")?;
        let mut params = Vec::new();
        if !matches!(self.peek(), Token::Colon) {
            loop {
                params.push(self.parse_name("lambda parameter")?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::Colon, "':'")?;
        let body = self.parse_expression()?;
        Ok(Expression::Lambda {
            params,
            body: Box::new(body),
        })
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let first = self.parse_and()?;
        if !matches!(self.peek(), Token::Or) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&Token::Or) {
            values.push(self.parse_and()?);
        }
        Ok(Expression::Bool {
            op: BoolOp::Or,
            values,
        })
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let first = self.parse_not()?;
        if !matches!(self.peek(), Token::And) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&Token::And) {
            values.push(self.parse_not()?);
        }
        Ok(Expression::Bool {
            op: BoolOp::And,
            values,
        })
    }

    fn parse_not(&mut self) -> Result<Expression, ParseError> {
        if self.eat(&Token::Not) {
            let operand = self.parse_not()?;
            return Ok(Expression::unary(UnaryOp::Not, operand));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_bitor()?;
        let op = match self.peek() {
            Token::EqEq => CompareOp::Eq,
            Token::NotEq => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_bitor()?;
        Ok(Expression::compare(op, left, right))
    }

    fn parse_bitor(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_bitxor()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_bitxor()?;
            left = Expression::binary(BinaryOp::BitOr, left, right);
        }
        Ok(left)
    }

    fn parse_bitxor(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_bitand()?;
        while self.eat(&Token::Caret) {
            let right = self.parse_bitand()?;
            left = Expression::binary(BinaryOp::BitXor, left, right);
        }
        Ok(left)
    }

    fn parse_bitand(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_shift()?;
        while self.eat(&Token::Amp) {
            let right = self.parse_shift()?;
            left = Expression::binary(BinaryOp::BitAnd, left, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Shl => BinaryOp::Shl,
                Token::Shr => BinaryOp::Shr,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expression::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expression::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::SlashSlash => BinaryOp::FloorDiv,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Expression::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expression, ParseError> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_factor()?;
            return Ok(Expression::unary(UnaryOp::Neg, operand));
        }
        if self.eat(&Token::Plus) {
            return self.parse_factor();
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.eat(&Token::LParen) {
                let mut args = Vec::new();
                if !matches!(self.peek(), Token::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen, "')'")?;
                expr = Expression::call(expr, args);
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_expression()?;
                self.expect(Token::RBracket, "']'")?;
                expr = Expression::index(expr, index);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expression, ParseError> {
        match self.peek().clone() {
            Token::Int(value) => {
                self.advance();
                Ok(Expression::Literal(Literal::Int(value)))
            }
            Token::Str(value) => {
                self.advance();
                Ok(Expression::Literal(Literal::Str(value)))
            }
            Token::True => {
                self.advance();
                Ok(Expression::Literal(Literal::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expression::Literal(Literal::Bool(false)))
            }
            Token::None => {
                self.advance();
                Ok(Expression::Literal(Literal::None))
            }
            Token::Name(name) => {
                self.advance();
                Ok(Expression::Name(name))
            }
            Token::Lambda => self.parse_lambda(),
            Token::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(Token::RParen, "')'")?;
                Ok(expr)
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !matches!(self.peek(), Token::RBracket) {
                    loop {
                        items.push(self.parse_expression()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Token::RBracket, "']'")?;
                Ok(Expression::List(items))
            }
            Token::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                if !matches!(self.peek(), Token::RBrace) {
                    loop {
                        let key = self.parse_expression()?;
                        self.expect(Token::Colon, "':'")?;
                        let value = self.parse_expression()?;
                        entries.push((key, value));
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Token::RBrace, "'}'")?;
                Ok(Expression::Dict(entries))
            }
            other => Err(ParseError::new(
                self.line(),
                format!("unexpected token in expression: {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn parses_assignment_and_aug_assignment() {
        let program = parse("x = 1\nx += 2\n").unwrap();
        assert_eq!(program.body.len(), 2);
        assert!(matches!(program.body[0], Statement::Assign(_)));
        assert!(matches!(program.body[1], Statement::AugAssign(_)));
    }

    #[test]
    fn parses_inline_suite() {
        let program = parse("for i in range(5): total += i\n").unwrap();
        match &program.body[0] {
            Statement::For(for_stmt) => {
                assert_eq!(for_stmt.target, "i");
                assert_eq!(for_stmt.body.len(), 1);
            }
            other => panic!("expected for loop, got {other:?}"),
        }
    }

    #[test]
    fn parses_nested_blocks() {
        let source = indoc! {"
            def f(a, b):
                if a < b:
                    return a
                else:
                    return b
        "};
        let program = parse(source).unwrap();
        match &program.body[0] {
            Statement::FunctionDef(func) => {
                assert_eq!(func.params, vec!["a", "b"]);
                assert!(matches!(func.body[0], Statement::If(_)));
            }
            other => panic!("expected def, got {other:?}"),
        }
    }

    #[test]
    fn elif_desugars_to_nested_if() {
        let source = indoc! {"
            if a:
                pass
            elif b:
                pass
            else:
                pass
        "};
        let program = parse(source).unwrap();
        match &program.body[0] {
            Statement::If(if_stmt) => {
                assert_eq!(if_stmt.orelse.len(), 1);
                assert!(matches!(if_stmt.orelse[0], Statement::If(_)));
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn boolean_chains_flatten() {
        let program = parse("x = a or b or c\n").unwrap();
        match &program.body[0] {
            Statement::Assign(assign) => match &assign.value {
                Expression::Bool { op: BoolOp::Or, values } => assert_eq!(values.len(), 3),
                other => panic!("expected or-chain, got {other:?}"),
            },
            _ => unreachable!(),
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("def f(:\n").is_err());
        assert!(parse("x = = 1\n").is_err());
    }
}
