//! Recursive-descent parser

use super::lexer::{Lexer, Token};
use super::{ParseError, ParseResult};
use crate::ir::printer::join_pieces;
use crate::ir::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::iter::Peekable;

/// Operand before names are resolved.
#[derive(Debug, Clone, PartialEq)]
enum RawValue {
    Local(String),
    Global(String),
    Const(Constant),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Local(name) => write!(f, "'%{}'", name),
            RawValue::Global(name) => write!(f, "'@{}'", name),
            RawValue::Const(c) => write!(f, "'{}'", c),
        }
    }
}

#[derive(Debug)]
struct RawInst {
    line: usize,
    name: Option<String>,
    ty: Type,
    kind: InstKind<RawValue>,
}

/// Flags that may follow an opcode; they carry no meaning here.
const IGNORED_FLAGS: &[&str] = &[
    "nsw", "nuw", "exact", "disjoint", "fast", "nnan", "ninf", "nsz", "arcp", "contract", "afn",
    "reassoc",
];

/// Opcodes whose result type cannot be written as a [`Type`].
const AGGREGATE_RESULTS: &[&str] = &["cmpxchg", "landingpad"];

/// Parse the type at the start of `tokens`; returns it with the number of
/// tokens it spans.
fn leading_type(tokens: &[Token]) -> Option<(Type, usize)> {
    let ty = match tokens.first()? {
        Token::Void => Type::Void,
        Token::IntType(bits) => Type::Int(*bits),
        Token::Float => Type::Float,
        Token::Double => Type::Double,
        Token::Ptr => Type::Ptr,
        Token::LAngle => {
            let lanes = match tokens.get(1)? {
                Token::Integer(n) if *n > 0 && *n <= u32::MAX as i128 => *n as u32,
                _ => return None,
            };
            if !matches!(tokens.get(2)?, Token::Word(w) if w == "x") {
                return None;
            }
            let (elem, used) = leading_type(&tokens[3..])?;
            if tokens.get(3 + used)? != &Token::RAngle {
                return None;
            }
            return Some((Type::vector(lanes, elem), 4 + used));
        }
        _ => return None,
    };
    Some((ty, 1))
}

/// Result type of an instruction kept as written, read off its tokens.
fn opaque_result_type(opcode: &str, tokens: &[Token]) -> Option<Type> {
    match opcode {
        "alloca" | "getelementptr" => return Some(Type::Ptr),
        op if AGGREGATE_RESULTS.contains(&op) => return None,
        // `va_arg ptr %ap, T` and `atomicrmw op ptr %p, T %v`
        "va_arg" | "atomicrmw" => {
            let comma = tokens.iter().position(|t| *t == Token::Comma)?;
            return leading_type(&tokens[comma + 1..]).map(|(ty, _)| ty);
        }
        _ => {}
    }
    // Conversions: `<op> T %v to U`
    let converted = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| matches!(t, Token::Word(w) if w == "to"))
        .find_map(|(i, _)| leading_type(&tokens[i + 1..]));
    if let Some((ty, _)) = converted {
        return Some(ty);
    }
    let start = tokens.iter().position(|t| !matches!(t, Token::Word(_)))?;
    leading_type(&tokens[start..]).map(|(ty, _)| ty)
}

pub struct Parser<'input> {
    lexer: Peekable<Lexer<'input>>,
    current_line: usize,
    /// Named struct types seen so far
    type_names: HashSet<String>,
}

impl<'input> Parser<'input> {
    pub fn new(input: &'input str) -> Self {
        Self {
            lexer: Lexer::new(input).peekable(),
            current_line: 1,
            type_names: HashSet::new(),
        }
    }

    fn peek(&mut self) -> ParseResult<&Token> {
        match self.lexer.peek() {
            Some(Ok((_, tok))) => Ok(tok),
            Some(Err((line, message))) => Err(ParseError::Lexer {
                line: *line,
                message: message.clone(),
            }),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn at_eof(&mut self) -> bool {
        self.lexer.peek().is_none()
    }

    /// Line of the next token.
    fn peek_line(&mut self) -> Option<usize> {
        match self.lexer.peek()? {
            Ok((line, _)) | Err((line, _)) => Some(*line),
        }
    }

    fn peek_is(&mut self, expected: &Token) -> bool {
        matches!(self.lexer.peek(), Some(Ok((_, tok))) if tok == expected)
    }

    fn peek_is_word(&mut self, word: &str) -> bool {
        matches!(self.lexer.peek(), Some(Ok((_, Token::Word(w)))) if w == word)
    }

    fn next(&mut self) -> ParseResult<Token> {
        match self.lexer.next() {
            Some(Ok((line, tok))) => {
                self.current_line = line;
                Ok(tok)
            }
            Some(Err((line, message))) => Err(ParseError::Lexer { line, message }),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            line: self.current_line,
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        let tok = self.next()?;
        if tok == expected {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, got {:?}", expected, tok)))
        }
    }

    fn expect_word(&mut self, word: &str) -> ParseResult<()> {
        match self.next()? {
            Token::Word(w) if w == word => Ok(()),
            tok => Err(self.error(format!("expected '{}', got {:?}", word, tok))),
        }
    }

    fn eat(&mut self, tok: &Token) -> ParseResult<bool> {
        if self.peek_is(tok) {
            self.next()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Skip attribute words (with an `align N` operand) and `#N` references.
    fn skip_attributes(&mut self) -> ParseResult<()> {
        while matches!(
            self.lexer.peek(),
            Some(Ok((_, Token::Word(_) | Token::AttrRef(_) | Token::Str(_))))
        ) {
            if let Token::Word(w) = self.next()? {
                if w == "align" && matches!(self.lexer.peek(), Some(Ok((_, Token::Integer(_))))) {
                    self.next()?;
                }
            }
        }
        Ok(())
    }

    /// Take the rest of the item that started on `line`: the remaining tokens
    /// of that line plus everything inside brackets opened on it. Stops at a
    /// closing `}` or a block label outside any bracket.
    fn take_item(&mut self, line: usize) -> ParseResult<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        while let Some(next_line) = self.peek_line() {
            if depth == 0
                && (next_line != line || matches!(self.peek()?, Token::RBrace | Token::LabelDef(_)))
            {
                break;
            }
            let tok = self.next()?;
            match tok {
                Token::LParen | Token::LBracket | Token::LBrace | Token::LAngle => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace | Token::RAngle => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            tokens.push(tok);
        }
        Ok(tokens)
    }

    fn skip_parenthesized(&mut self) -> ParseResult<()> {
        self.expect(Token::LParen)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.next()? {
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    fn skip_flags(&mut self) -> ParseResult<()> {
        while IGNORED_FLAGS.iter().any(|flag| self.peek_is_word(flag)) {
            self.next()?;
        }
        Ok(())
    }

    pub fn parse_module(&mut self) -> ParseResult<Module> {
        let mut module = Module::default();

        while !self.at_eof() {
            match self.peek()? {
                Token::Define => {
                    let func = self.parse_function()?;
                    if module.functions.contains_key(&func.name) {
                        return Err(self.error(format!("redefinition of function @{}", func.name)));
                    }
                    module.add_function(func);
                }
                Token::Declare => {
                    let (name, sig) = self.parse_declaration()?;
                    module.declare(name, sig);
                }
                Token::GlobalIdent(_) | Token::LocalIdent(_) => self.parse_binding(&mut module)?,
                _ => {
                    // Target triple, attribute groups, metadata
                    let line = self.peek_line().unwrap_or(self.current_line);
                    self.next()?;
                    self.take_item(line)?;
                }
            }
        }

        Ok(module)
    }

    /// `@name = ...` and `%name = type ...`, kept as written.
    fn parse_binding(&mut self, module: &mut Module) -> ParseResult<()> {
        let line = self.peek_line().unwrap_or(self.current_line);
        let target = self.next()?;
        if !self.eat(&Token::Equals)? {
            self.take_item(line)?;
            return Ok(());
        }
        let pieces: Vec<String> = self.take_item(line)?.iter().map(Token::to_string).collect();
        let body = join_pieces(&pieces);

        match target {
            Token::GlobalIdent(name) => {
                if module.has_symbol(&name) {
                    return Err(self.error(format!("redefinition of global @{}", name)));
                }
                module.globals.insert(name, body);
            }
            Token::LocalIdent(name) if pieces.first().map(String::as_str) == Some("type") => {
                self.type_names.insert(name.clone());
                module.type_defs.insert(name, body);
            }
            _ => {}
        }
        Ok(())
    }

    fn parse_global_name(&mut self, what: &str) -> ParseResult<String> {
        match self.next()? {
            Token::GlobalIdent(name) => Ok(name),
            tok => Err(self.error(format!("expected {} name, got {:?}", what, tok))),
        }
    }

    fn parse_declaration(&mut self) -> ParseResult<(String, Signature)> {
        self.expect(Token::Declare)?;
        self.skip_attributes()?;
        let ret = self.parse_type()?;
        let name = self.parse_global_name("function")?;

        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        let line = self.current_line;
        while !self.eat(&Token::RParen)? {
            if !params.is_empty() {
                self.expect(Token::Comma)?;
            }
            if self.peek_is_word("...") {
                self.next()?;
                continue;
            }
            params.push(self.parse_type()?);
            self.skip_attributes()?;
            if matches!(self.peek()?, Token::LocalIdent(_)) {
                self.next()?;
            }
        }
        while self.peek_line() == Some(line)
            && matches!(self.lexer.peek(), Some(Ok((_, Token::AttrRef(_) | Token::Word(_)))))
        {
            self.next()?;
        }

        Ok((name, Signature::new(ret, params)))
    }

    fn parse_function(&mut self) -> ParseResult<Function> {
        self.expect(Token::Define)?;
        self.skip_attributes()?;
        let ret_ty = self.parse_type()?;
        let name = self.parse_global_name("function")?;

        let mut func = Function::new(name, ret_ty);
        let mut names: HashMap<String, Value> = HashMap::new();

        self.expect(Token::LParen)?;
        while !self.eat(&Token::RParen)? {
            if !func.params.is_empty() {
                self.expect(Token::Comma)?;
            }
            let ty = self.parse_type()?;
            self.skip_attributes()?;
            let pname = match self.next()? {
                Token::LocalIdent(s) => s,
                tok => return Err(self.error(format!("expected parameter name, got {:?}", tok))),
            };
            if names.contains_key(&pname) {
                return Err(ParseError::Redefinition { line: self.current_line, name: pname });
            }
            let arg = func.add_param(pname.clone(), ty);
            names.insert(pname, arg);
        }

        self.skip_attributes()?;
        self.expect(Token::LBrace)?;
        let blocks = self.parse_body()?;

        // Ids are handed out sequentially by the arena, so every result can be
        // bound before any operand is resolved.
        let mut next_id = 0u32;
        for (_, insts) in &blocks {
            for raw in insts {
                if let Some(name) = &raw.name {
                    if names.insert(name.clone(), Value::Inst(InstId(next_id))).is_some() {
                        return Err(ParseError::Redefinition { line: raw.line, name: name.clone() });
                    }
                }
                next_id += 1;
            }
        }

        let labels: HashSet<String> = blocks.iter().map(|(label, _)| label.clone()).collect();
        for (label, insts) in blocks {
            func.add_block(label.clone());
            for raw in insts {
                let line = raw.line;
                let mut kind = raw.kind;
                if let InstKind::Opaque { fragments, .. } = &mut kind {
                    self.classify_locals(fragments, &names, &labels);
                }
                let kind = kind.try_map(|operand| match operand {
                    RawValue::Const(c) => Ok(Value::Const(c)),
                    RawValue::Global(name) => Ok(Value::Global(name)),
                    RawValue::Local(name) => names
                        .get(&name)
                        .cloned()
                        .ok_or(ParseError::UndefinedValue { line, name }),
                })?;
                func.append(&label, Instruction::new(raw.name, raw.ty, kind));
            }
        }

        Ok(func)
    }

    /// `%name` in a kept-as-written instruction may be a value, a block (phi
    /// incoming edges) or a named type.
    fn classify_locals(
        &self,
        fragments: &mut [Fragment<RawValue>],
        values: &HashMap<String, Value>,
        labels: &HashSet<String>,
    ) {
        for fragment in fragments {
            let Fragment::Operand(RawValue::Local(name)) = &*fragment else {
                continue;
            };
            if values.contains_key(name.as_str()) {
                continue;
            }
            let resolved = if labels.contains(name.as_str()) {
                Fragment::Label(name.clone())
            } else if self.type_names.contains(name.as_str()) {
                Fragment::Text(format!("%{}", name))
            } else {
                continue;
            };
            *fragment = resolved;
        }
    }

    fn parse_body(&mut self) -> ParseResult<Vec<(String, Vec<RawInst>)>> {
        let mut blocks: Vec<(String, Vec<RawInst>)> = Vec::new();

        loop {
            match self.peek()? {
                Token::RBrace => {
                    self.next()?;
                    break;
                }
                Token::LabelDef(_) => {
                    if let Token::LabelDef(label) = self.next()? {
                        if blocks.iter().any(|(l, _)| *l == label) {
                            return Err(self.error(format!("redefinition of block '{}'", label)));
                        }
                        blocks.push((label, Vec::new()));
                    }
                }
                _ => {
                    let inst = self.parse_instruction()?;
                    match blocks.last_mut() {
                        Some((_, insts)) => insts.push(inst),
                        None => blocks.push(("entry".to_string(), vec![inst])),
                    }
                }
            }
        }

        Ok(blocks)
    }

    fn parse_instruction(&mut self) -> ParseResult<RawInst> {
        let name = match self.peek()? {
            Token::LocalIdent(_) => match self.next()? {
                Token::LocalIdent(name) => {
                    self.expect(Token::Equals)?;
                    Some(name)
                }
                _ => None,
            },
            _ => None,
        };

        let mut opcode = match self.next()? {
            Token::Word(w) => w,
            tok => return Err(self.error(format!("expected instruction, got {:?}", tok))),
        };
        let line = self.current_line;
        if matches!(opcode.as_str(), "tail" | "musttail" | "notail") {
            self.expect_word("call")?;
            opcode = "call".to_string();
        }

        let (ty, kind) = self.parse_instruction_body(&opcode, line, name.is_some())?;
        // Trailing metadata attachments (`, !dbg !7`)
        if self.peek_line() == Some(line) && self.peek_is(&Token::Comma) {
            self.take_item(line)?;
        }

        match (&name, ty.is_void()) {
            (Some(n), true) => Err(ParseError::Syntax {
                line,
                message: format!("cannot assign a name to void value '%{}'", n),
            }),
            _ => Ok(RawInst { line, name, ty, kind }),
        }
    }

    fn parse_instruction_body(
        &mut self,
        opcode: &str,
        line: usize,
        named: bool,
    ) -> ParseResult<(Type, InstKind<RawValue>)> {
        if let Some(op) = BinOp::from_mnemonic(opcode) {
            self.skip_flags()?;
            let ty = self.parse_type()?;
            let lhs = self.parse_value(&ty)?;
            self.expect(Token::Comma)?;
            let rhs = self.parse_value(&ty)?;
            return Ok((ty, InstKind::Binary { op, lhs, rhs }));
        }
        if let Some(op) = CastOp::from_mnemonic(opcode) {
            let (_, value) = self.parse_typed_value()?;
            self.expect_word("to")?;
            let ty = self.parse_type()?;
            return Ok((ty, InstKind::Cast { op, value }));
        }

        match opcode {
            "icmp" => {
                let pred = match self.next()? {
                    Token::Word(w) => IntPredicate::from_mnemonic(&w)
                        .ok_or_else(|| self.error(format!("unknown icmp predicate '{}'", w)))?,
                    tok => return Err(self.error(format!("expected predicate, got {:?}", tok))),
                };
                let (ty, lhs) = self.parse_typed_value()?;
                self.expect(Token::Comma)?;
                let rhs = self.parse_value(&ty)?;
                Ok((ty.with_element(Type::i1()), InstKind::ICmp { pred, lhs, rhs }))
            }
            "fcmp" => {
                self.skip_flags()?;
                let pred = match self.next()? {
                    Token::Word(w) => FloatPredicate::from_mnemonic(&w)
                        .ok_or_else(|| self.error(format!("unknown fcmp predicate '{}'", w)))?,
                    Token::True => FloatPredicate::True,
                    Token::False => FloatPredicate::False,
                    tok => return Err(self.error(format!("expected predicate, got {:?}", tok))),
                };
                let (ty, lhs) = self.parse_typed_value()?;
                self.expect(Token::Comma)?;
                let rhs = self.parse_value(&ty)?;
                Ok((ty.with_element(Type::i1()), InstKind::FCmp { pred, lhs, rhs }))
            }
            "select" => {
                self.skip_flags()?;
                let (_, cond) = self.parse_typed_value()?;
                self.expect(Token::Comma)?;
                let (ty, on_true) = self.parse_typed_value()?;
                self.expect(Token::Comma)?;
                let (_, on_false) = self.parse_typed_value()?;
                Ok((ty, InstKind::Select { cond, on_true, on_false }))
            }
            "shufflevector" => {
                let (lhs_ty, lhs) = self.parse_typed_value()?;
                self.expect(Token::Comma)?;
                let (_, rhs) = self.parse_typed_value()?;
                self.expect(Token::Comma)?;
                let mask = self.parse_shuffle_mask()?;
                let ty = Type::vector(mask.len() as u32, lhs_ty.element().clone());
                Ok((ty, InstKind::ShuffleVector { lhs, rhs, mask }))
            }
            "extractelement" => {
                let (vec_ty, vector) = self.parse_typed_value()?;
                self.expect(Token::Comma)?;
                let (_, index) = self.parse_typed_value()?;
                Ok((vec_ty.element().clone(), InstKind::ExtractElement { vector, index }))
            }
            "insertelement" => {
                let (ty, vector) = self.parse_typed_value()?;
                self.expect(Token::Comma)?;
                let (_, element) = self.parse_typed_value()?;
                self.expect(Token::Comma)?;
                let (_, index) = self.parse_typed_value()?;
                Ok((ty, InstKind::InsertElement { vector, element, index }))
            }
            "call" => self.parse_call(),
            "br" => {
                if self.peek_is_word("label") {
                    let target = self.parse_label_ref()?;
                    return Ok((Type::Void, InstKind::Br { target }));
                }
                let (_, cond) = self.parse_typed_value()?;
                self.expect(Token::Comma)?;
                let then_dest = self.parse_label_ref()?;
                self.expect(Token::Comma)?;
                let else_dest = self.parse_label_ref()?;
                Ok((Type::Void, InstKind::CondBr { cond, then_dest, else_dest }))
            }
            "ret" => {
                if self.eat(&Token::Void)? {
                    return Ok((Type::Void, InstKind::Ret { value: None }));
                }
                let (_, value) = self.parse_typed_value()?;
                Ok((Type::Void, InstKind::Ret { value: Some(value) }))
            }
            other => self.parse_opaque(other, line, named),
        }
    }

    /// Any other instruction is kept as written; only its value and label
    /// references are resolved.
    fn parse_opaque(
        &mut self,
        opcode: &str,
        line: usize,
        named: bool,
    ) -> ParseResult<(Type, InstKind<RawValue>)> {
        let tokens = self.take_item(line)?;
        let ty = if named {
            opaque_result_type(opcode, &tokens).ok_or_else(|| ParseError::Syntax {
                line,
                message: format!("cannot determine the result type of '{}'", opcode),
            })?
        } else {
            Type::Void
        };

        let mut fragments = Vec::with_capacity(tokens.len());
        let mut after_label = false;
        for tok in tokens {
            let is_label_word = matches!(&tok, Token::Word(w) if w == "label");
            fragments.push(match tok {
                Token::LocalIdent(name) if after_label => Fragment::Label(name),
                Token::LocalIdent(name) => Fragment::Operand(RawValue::Local(name)),
                Token::GlobalIdent(name) => Fragment::Operand(RawValue::Global(name)),
                other => Fragment::Text(other.to_string()),
            });
            after_label = is_label_word;
        }

        Ok((ty, InstKind::Opaque { opcode: opcode.to_string(), fragments }))
    }

    fn parse_call(&mut self) -> ParseResult<(Type, InstKind<RawValue>)> {
        self.skip_flags()?;
        self.skip_attributes()?;
        let ty = self.parse_type()?;
        if self.peek_is(&Token::LParen) {
            // Explicit callee type of a varargs call: `call i32 (ptr, ...) @printf`
            self.skip_parenthesized()?;
        }
        let callee = match self.next()? {
            Token::GlobalIdent(name) => Callee::Direct(name),
            Token::LocalIdent(name) => Callee::Indirect(RawValue::Local(name)),
            tok => return Err(self.error(format!("expected callee, got {:?}", tok))),
        };

        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        while !self.eat(&Token::RParen)? {
            if !args.is_empty() {
                self.expect(Token::Comma)?;
            }
            let arg_ty = self.parse_type()?;
            self.skip_attributes()?;
            args.push(self.parse_value(&arg_ty)?);
        }
        while matches!(self.lexer.peek(), Some(Ok((_, Token::AttrRef(_))))) {
            self.next()?;
        }

        Ok((ty, InstKind::Call { callee, args }))
    }

    fn parse_label_ref(&mut self) -> ParseResult<String> {
        self.expect_word("label")?;
        match self.next()? {
            Token::LocalIdent(label) => Ok(label),
            tok => Err(self.error(format!("expected block label, got {:?}", tok))),
        }
    }

    fn parse_shuffle_mask(&mut self) -> ParseResult<Vec<Option<u32>>> {
        let ty = self.parse_type()?;
        let lanes = match &ty {
            Type::Vector(lanes, elem) if **elem == Type::i32() => *lanes,
            other => {
                return Err(ParseError::InvalidType {
                    line: self.current_line,
                    message: format!("shuffle mask must be a vector of i32, got {}", other),
                })
            }
        };
        let mask = match self.parse_value(&ty)? {
            RawValue::Const(c) => c,
            other => return Err(self.error(format!("shuffle mask must be constant, got {}", other))),
        };
        (0..lanes)
            .map(|i| match mask.lane(i) {
                Some(Constant::Int { value, .. }) => Ok(Some(value as u32)),
                Some(Constant::Undef(_)) => Ok(None),
                _ => Err(self.error("invalid shuffle mask element")),
            })
            .collect()
    }

    fn parse_type(&mut self) -> ParseResult<Type> {
        match self.next()? {
            Token::Void => Ok(Type::Void),
            Token::IntType(bits) => Ok(Type::Int(bits)),
            Token::Float => Ok(Type::Float),
            Token::Double => Ok(Type::Double),
            Token::Ptr => Ok(Type::Ptr),
            Token::LAngle => {
                // Vector type: <N x T>
                let lanes = match self.next()? {
                    Token::Integer(n) if n > 0 && n <= u32::MAX as i128 => n as u32,
                    tok => {
                        return Err(ParseError::InvalidType {
                            line: self.current_line,
                            message: format!("expected vector length, got {:?}", tok),
                        })
                    }
                };
                self.expect_word("x")?;
                let elem = self.parse_type()?;
                self.expect(Token::RAngle)?;
                Ok(Type::vector(lanes, elem))
            }
            tok => Err(ParseError::InvalidType {
                line: self.current_line,
                message: format!("{:?}", tok),
            }),
        }
    }

    fn parse_typed_value(&mut self) -> ParseResult<(Type, RawValue)> {
        let ty = self.parse_type()?;
        let value = self.parse_value(&ty)?;
        Ok((ty, value))
    }

    fn parse_value(&mut self, ty: &Type) -> ParseResult<RawValue> {
        let tok = self.next()?;
        let constant = match (tok, ty) {
            (Token::LocalIdent(name), _) => return Ok(RawValue::Local(name)),
            (Token::GlobalIdent(name), _) => return Ok(RawValue::Global(name)),
            (Token::Word(w), Type::Ptr) if w == "null" => Constant::Zero(Type::Ptr),
            (Token::Undef, _) => Constant::Undef(ty.clone()),
            (Token::Zeroinitializer, _) => Constant::Zero(ty.clone()),
            (Token::True, Type::Int(1)) => Constant::bool(true),
            (Token::False, Type::Int(1)) => Constant::bool(false),
            (Token::Integer(v), Type::Int(bits)) => Constant::int(*bits, v as u64),
            (Token::Integer(v), Type::Double) => Constant::double(v as f64),
            (Token::Integer(v), Type::Float) => Constant::float(v as f32),
            (Token::FloatLit(f), Type::Double) => Constant::double(f),
            (Token::FloatLit(f), Type::Float) => Constant::float(f as f32),
            (Token::HexFloat(bits), Type::Double) => Constant::Double(bits),
            // `float` hex literals spell the value as a double.
            (Token::HexFloat(bits), Type::Float) => Constant::float(f64::from_bits(bits) as f32),
            (Token::HexFloat(bits), Type::Int(width)) => Constant::int(*width, bits),
            (Token::LAngle, Type::Vector(lanes, elem)) => {
                let mut values = Vec::with_capacity(*lanes as usize);
                while !self.eat(&Token::RAngle)? {
                    if !values.is_empty() {
                        self.expect(Token::Comma)?;
                    }
                    let lane_ty = self.parse_type()?;
                    if lane_ty != **elem {
                        return Err(self.error(format!(
                            "vector constant lane has type {}, expected {}",
                            lane_ty, elem
                        )));
                    }
                    match self.parse_value(&lane_ty)? {
                        RawValue::Const(c) => values.push(c),
                        other => {
                            return Err(self.error(format!(
                                "vector constant lanes must be constants, got {}",
                                other
                            )))
                        }
                    }
                }
                if values.len() != *lanes as usize {
                    return Err(self.error(format!(
                        "vector constant has {} lanes, expected {}",
                        values.len(),
                        lanes
                    )));
                }
                Constant::Vector(values)
            }
            (tok, ty) => {
                return Err(self.error(format!("invalid value {:?} for type {}", tok, ty)));
            }
        };
        Ok(RawValue::Const(constant))
    }
}

/// Parse textual IR into a [`Module`].
pub fn parse(source: &str) -> ParseResult<Module> {
    let mut parser = Parser::new(source);
    parser.parse_module()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
; ModuleID = 'sample'
target triple = "x86_64-unknown-linux-gnu"

declare <8 x i16> @llvm.x86.sse2.pavg.w(<8 x i16>, <8 x i16>) #1

define <8 x i16> @avg(<8 x i16> noundef %a, <8 x i16> %b) #0 {
entry:
  %r = tail call <8 x i16> @llvm.x86.sse2.pavg.w(<8 x i16> %a, <8 x i16> %b)
  br label %exit

exit:
  %s = add nsw <8 x i16> %r, zeroinitializer
  ret <8 x i16> %s
}
"#;

    #[test]
    fn test_parse_sample() {
        let module = parse(SAMPLE).unwrap();
        assert_eq!(module.declarations.len(), 1);

        let func = module.function("avg").unwrap();
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.block_labels(), vec!["entry".to_string(), "exit".to_string()]);
        assert_eq!(func.num_insts(), 4);

        let entry = func.block("entry").unwrap();
        let call = func.inst(entry.insts()[0]).unwrap();
        assert_eq!(call.called_name(), Some("llvm.x86.sse2.pavg.w"));
        assert_eq!(call.ty, Type::vector(8, Type::i16()));
    }

    #[test]
    fn test_forward_reference() {
        let src = r#"
define i32 @f(i32 %x) {
entry:
  br label %next
next:
  ret i32 %y
late:
  %y = add i32 %x, 1
  br label %next
}
"#;
        let module = parse(src).unwrap();
        let func = module.function("f").unwrap();
        let ret = func.inst(func.block("next").unwrap().insts()[0]).unwrap();
        let y = func.block("late").unwrap().insts()[0];
        assert_eq!(ret.kind, InstKind::Ret { value: Some(Value::Inst(y)) });
    }

    #[test]
    fn test_constants() {
        let src = r#"
define <2 x double> @f() {
  %v = fadd <2 x double> <double 1.5, double 0x7FF8000000000000>, zeroinitializer
  %m = shufflevector <2 x double> %v, <2 x double> undef, <2 x i32> <i32 1, i32 undef>
  %n = select <2 x i1> <i1 true, i1 false>, <2 x double> %m, <2 x double> %v
  ret <2 x double> %n
}
"#;
        let module = parse(src).unwrap();
        let func = module.function("f").unwrap();
        let entry = func.block("entry").unwrap();

        let fadd = func.inst(entry.insts()[0]).unwrap();
        match &fadd.kind {
            InstKind::Binary { lhs: Value::Const(Constant::Vector(lanes)), .. } => {
                assert_eq!(lanes[0], Constant::double(1.5));
                assert_eq!(lanes[1], Constant::Double(0x7FF8_0000_0000_0000));
            }
            other => panic!("unexpected {:?}", other),
        }

        let shuffle = func.inst(entry.insts()[1]).unwrap();
        match &shuffle.kind {
            InstKind::ShuffleVector { mask, .. } => assert_eq!(mask, &vec![Some(1), None]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_negative_integers_are_masked() {
        let src = "define i8 @f() {\n  %a = add i8 -1, 0\n  ret i8 %a\n}\n";
        let module = parse(src).unwrap();
        let func = module.function("f").unwrap();
        let add = func.inst(func.entry_block().unwrap().insts()[0]).unwrap();
        match &add.kind {
            InstKind::Binary { lhs, .. } => assert_eq!(lhs, &Value::const_int(8, 0xFF)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_errors_carry_line() {
        let err = parse("define void @f() {\nentry:\n  %a = add i32 %nope, 1\n  ret void\n}\n")
            .unwrap_err();
        assert_eq!(err, ParseError::UndefinedValue { line: 3, name: "nope".into() });

        let err = parse("define void @f() {\n  store i32 1, ptr %nowhere\n  ret void\n}\n")
            .unwrap_err();
        assert_eq!(err, ParseError::UndefinedValue { line: 2, name: "nowhere".into() });

        let err = parse("define void @f(ptr %p) {\n  %pair = cmpxchg ptr %p, i32 0, i32 1 seq_cst seq_cst\n  ret void\n}\n")
            .unwrap_err();
        assert_eq!(err.line(), Some(2));

        let err = parse("define void @f() {\n  %a = add i32 1, 1\n  %a = add i32 1, 1\n  ret void\n}")
            .unwrap_err();
        assert!(matches!(err, ParseError::Redefinition { line: 3, .. }));
    }

    const MEMORY: &str = r#"
%struct.pair = type { i32, i32 }

@counter = dso_local global i32 0, align 4
@.str = private unnamed_addr constant [4 x i8] c"%d\0A\00", align 1

declare i32 @printf(ptr noundef, ...) #1

define dso_local i32 @count(i32 noundef %n) #0 {
  %slot = alloca i32, align 4
  store i32 %n, ptr %slot, align 4
  %field = getelementptr inbounds %struct.pair, ptr %slot, i32 0, i32 1
  br label %1

1:
  %i = phi i32 [ 0, %entry ], [ %next, %1 ]
  %next = add nsw i32 %i, 1
  %wide = sext i32 %next to i64, !dbg !12
  %done = icmp sge i32 %next, %n
  br i1 %done, label %2, label %1

2:
  %v = load volatile i32, ptr @counter, align 4
  %f = sitofp i32 %v to double
  %c = call i32 (ptr, ...) @printf(ptr noundef @.str, i32 noundef %v)
  switch i32 %v, label %3 [
    i32 0, label %2
    i32 1, label %3
  ]

3:
  ret i32 %next
}

attributes #0 = { noinline nounwind "target-cpu"="x86-64" }
!12 = !{}
"#;

    #[test]
    fn test_instructions_kept_as_written() {
        let module = parse(MEMORY).unwrap();
        assert_eq!(module.type_defs["struct.pair"], "type { i32, i32 }");
        assert_eq!(module.globals["counter"], "dso_local global i32 0, align 4");
        assert_eq!(
            module.globals[".str"],
            "private unnamed_addr constant [4 x i8] c\"%d\\0A\\00\", align 1"
        );

        let func = module.function("count").unwrap();
        assert_eq!(func.block_labels(), vec!["entry", "1", "2", "3"]);
        let inst = |label: &str, index: usize| {
            func.inst(func.block(label).unwrap().insts()[index]).unwrap()
        };

        let slot = inst("entry", 0);
        assert_eq!(slot.kind.mnemonic(), "alloca");
        assert_eq!(slot.ty, Type::Ptr);
        assert_eq!(inst("entry", 1).ty, Type::Void);
        assert_eq!(inst("entry", 1).kind.operands().len(), 2);
        // The named type is text, not an operand.
        assert_eq!(inst("entry", 2).kind.operands().len(), 1);

        let phi = inst("1", 0);
        assert_eq!(phi.ty, Type::i32());
        let next = func.block("1").unwrap().insts()[1];
        assert_eq!(phi.kind.operands(), vec![&Value::Inst(next)]);
        match &phi.kind {
            InstKind::Opaque { fragments, .. } => {
                assert!(fragments.contains(&Fragment::Label("entry".into())));
                assert!(fragments.contains(&Fragment::Label("1".into())));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(inst("1", 2).kind, InstKind::Cast { op: CastOp::SExt, .. }));

        let load = inst("2", 0);
        assert_eq!(load.ty, Type::i32());
        assert_eq!(load.kind.operands(), vec![&Value::Global("counter".into())]);
        assert_eq!(inst("2", 1).ty, Type::Double);
        let call = inst("2", 2);
        assert_eq!(call.called_name(), Some("printf"));
        assert_eq!(call.ty, Type::i32());

        let switch = inst("2", 3);
        assert!(switch.is_terminator());
        assert_eq!(switch.kind.successors(), vec!["3", "2", "3"]);
        assert!(crate::ir::verify::verify_module(&module).is_empty());
    }

    #[test]
    fn test_kept_instructions_roundtrip() {
        let printed = parse(MEMORY).unwrap().to_string();
        assert!(printed.contains("%struct.pair = type { i32, i32 }\n"));
        assert!(printed.contains("@counter = dso_local global i32 0, align 4\n"));
        assert!(printed.contains("  %slot = alloca i32, align 4\n"));
        assert!(printed.contains("  store i32 %n, ptr %slot, align 4\n"));
        assert!(printed.contains("  %i = phi i32 [0, %entry], [%next, %1]\n"));
        assert!(printed.contains("  %v = load volatile i32, ptr @counter, align 4\n"));
        assert!(printed.contains("  %c = call i32 @printf(ptr @.str, i32 %v)\n"));
        assert_eq!(parse(&printed).unwrap().to_string(), printed);
    }

    #[test]
    fn test_print_parse_roundtrip() {
        let module = parse(SAMPLE).unwrap();
        let printed = module.to_string();
        let reparsed = parse(&printed).unwrap();
        assert_eq!(reparsed.to_string(), printed);
    }
}
