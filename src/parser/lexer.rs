//! Tokenizer for the textual IR

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Define,
    Declare,
    Void,
    Float,
    Double,
    Ptr,
    IntType(u32),
    True,
    False,
    Undef,
    Zeroinitializer,
    /// Bare word: opcodes, predicates, flags, `x`, `to`, `label`, attributes
    Word(String),
    /// `%name` (sigil stripped)
    LocalIdent(String),
    /// `@name` (sigil stripped)
    GlobalIdent(String),
    /// `name:` at the start of a block
    LabelDef(String),
    /// `#N` attribute group reference
    AttrRef(u32),
    Integer(i128),
    /// Decimal floating-point literal
    FloatLit(f64),
    /// `0x` literal: raw bits of a double
    HexFloat(u64),
    Str(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LAngle,
    RAngle,
    LBracket,
    RBracket,
    Comma,
    Equals,
    Star,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Define => write!(f, "define"),
            Token::Declare => write!(f, "declare"),
            Token::Void => write!(f, "void"),
            Token::Float => write!(f, "float"),
            Token::Double => write!(f, "double"),
            Token::Ptr => write!(f, "ptr"),
            Token::IntType(bits) => write!(f, "i{}", bits),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Undef => write!(f, "undef"),
            Token::Zeroinitializer => write!(f, "zeroinitializer"),
            Token::Word(w) => write!(f, "{}", w),
            Token::LocalIdent(name) => write!(f, "%{}", name),
            Token::GlobalIdent(name) => write!(f, "@{}", name),
            Token::LabelDef(label) => write!(f, "{}:", label),
            Token::AttrRef(n) => write!(f, "#{}", n),
            Token::Integer(n) => write!(f, "{}", n),
            // Hex keeps the exact bits of a decimal literal.
            Token::FloatLit(x) => write!(f, "0x{:016X}", x.to_bits()),
            Token::HexFloat(bits) => write!(f, "0x{:016X}", bits),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LAngle => write!(f, "<"),
            Token::RAngle => write!(f, ">"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::Star => write!(f, "*"),
        }
    }
}

/// Item produced by the lexer: `(line, token)` or a message with its line.
pub type Spanned = Result<(usize, Token), (usize, String)>;

pub struct Lexer<'input> {
    input: &'input str,
    chars: Peekable<CharIndices<'input>>,
    line: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '$' | '.' | '_')
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
        }
    }

    /// Consume characters while `pred` holds; return the text from `start`
    /// up to the first character left unconsumed.
    ///
    /// `start` may point at a character the caller has already taken.
    fn take_while(&mut self, start: usize, pred: impl Fn(char) -> bool) -> &'input str {
        while self.chars.next_if(|&(_, c)| pred(c)).is_some() {}
        let end = self.chars.peek().map_or(self.input.len(), |&(i, _)| i);
        let input = self.input;
        &input[start..end]
    }

    fn skip_trivia(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            match c {
                '\n' => {
                    self.line += 1;
                    self.chars.next();
                }
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                ';' => {
                    while let Some(&(_, c)) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                _ => break,
            }
        }
    }

    fn ident_after_sigil(&mut self, sigil: char) -> Result<String, String> {
        match self.chars.peek() {
            Some(&(_, '"')) => {
                self.chars.next();
                self.string_body()
            }
            Some(&(i, c)) if is_ident_char(c) => Ok(self.take_while(i, is_ident_char).to_string()),
            _ => Err(format!("expected identifier after '{}'", sigil)),
        }
    }

    fn string_body(&mut self) -> Result<String, String> {
        let mut out = String::new();
        for (_, c) in self.chars.by_ref() {
            match c {
                '"' => return Ok(out),
                '\n' => return Err("unterminated string".to_string()),
                c => out.push(c),
            }
        }
        Err("unterminated string".to_string())
    }

    fn number(&mut self, start: usize) -> Result<Token, String> {
        let text = self.take_while(start, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+')
        });
        if let Some(hex) = text.strip_prefix("0x") {
            return u64::from_str_radix(hex, 16)
                .map(Token::HexFloat)
                .map_err(|_| format!("invalid hex literal '{}'", text));
        }
        if text.contains(['.', 'e', 'E']) {
            return text
                .parse::<f64>()
                .map(Token::FloatLit)
                .map_err(|_| format!("invalid floating-point literal '{}'", text));
        }
        text.parse::<i128>()
            .map(Token::Integer)
            .map_err(|_| format!("invalid integer literal '{}'", text))
    }

    fn word(&mut self, start: usize) -> Token {
        let text = self.take_while(start, is_ident_char);
        if self.chars.next_if(|&(_, c)| c == ':').is_some() {
            return Token::LabelDef(text.to_string());
        }
        match text {
            "define" => Token::Define,
            "declare" => Token::Declare,
            "void" => Token::Void,
            "float" => Token::Float,
            "double" => Token::Double,
            "ptr" => Token::Ptr,
            "true" => Token::True,
            "false" => Token::False,
            "undef" | "poison" => Token::Undef,
            "zeroinitializer" => Token::Zeroinitializer,
            _ => match text.strip_prefix('i').and_then(|bits| bits.parse::<u32>().ok()) {
                Some(bits) if bits > 0 => Token::IntType(bits),
                _ => Token::Word(text.to_string()),
            },
        }
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = Spanned;

    fn next(&mut self) -> Option<Spanned> {
        self.skip_trivia();
        let line = self.line;
        let (start, c) = self.chars.next()?;

        let token = match c {
            '(' => Ok(Token::LParen),
            ')' => Ok(Token::RParen),
            '{' => Ok(Token::LBrace),
            '}' => Ok(Token::RBrace),
            '<' => Ok(Token::LAngle),
            '>' => Ok(Token::RAngle),
            '[' => Ok(Token::LBracket),
            ']' => Ok(Token::RBracket),
            ',' => Ok(Token::Comma),
            '=' => Ok(Token::Equals),
            '*' => Ok(Token::Star),
            '%' => self.ident_after_sigil('%').map(Token::LocalIdent),
            '@' => self.ident_after_sigil('@').map(Token::GlobalIdent),
            '"' => self.string_body().map(Token::Str),
            '#' => {
                let digits = match self.chars.peek() {
                    Some(&(i, _)) => self.take_while(i, |c| c.is_ascii_digit()),
                    None => "",
                };
                digits
                    .parse::<u32>()
                    .map(Token::AttrRef)
                    .map_err(|_| "expected attribute group number after '#'".to_string())
            }
            '!' => {
                // Metadata reference (`!dbg`, `!0`) reads as a word.
                let rest = match self.chars.peek() {
                    Some(&(i, _)) => self.take_while(i, is_ident_char),
                    None => "",
                };
                Ok(Token::Word(format!("!{}", rest)))
            }
            c if c.is_ascii_digit() || c == '-' => match self.number(start) {
                Ok(Token::Integer(n)) if self.chars.next_if(|&(_, c)| c == ':').is_some() => {
                    Ok(Token::LabelDef(n.to_string()))
                }
                other => other,
            },
            c if is_ident_char(c) => Ok(self.word(start)),
            other => Err(format!("unexpected character '{}'", other)),
        };

        Some(token.map(|t| (line, t)).map_err(|msg| (line, msg)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        Lexer::new(src).map(|t| t.unwrap().1).collect()
    }

    #[test]
    fn test_call_line() {
        let toks = tokens("%r = call <2 x i64> @llvm.x86.sse2.psll.q(<2 x i64> %a, <2 x i64> %b)");
        assert_eq!(toks[0], Token::LocalIdent("r".into()));
        assert_eq!(toks[1], Token::Equals);
        assert_eq!(toks[2], Token::Word("call".into()));
        assert_eq!(toks[3], Token::LAngle);
        assert_eq!(toks[4], Token::Integer(2));
        assert_eq!(toks[5], Token::Word("x".into()));
        assert_eq!(toks[6], Token::IntType(64));
        assert_eq!(toks[8], Token::GlobalIdent("llvm.x86.sse2.psll.q".into()));
    }

    #[test]
    fn test_literals_and_labels() {
        let toks = tokens("entry:\n  -5 1.5 0x3FF0000000000000 ; comment\n 7: true undef");
        assert_eq!(
            toks,
            vec![
                Token::LabelDef("entry".into()),
                Token::Integer(-5),
                Token::FloatLit(1.5),
                Token::HexFloat(0x3FF0_0000_0000_0000),
                Token::LabelDef("7".into()),
                Token::True,
                Token::Undef,
            ]
        );
    }

    #[test]
    fn test_single_character_tokens() {
        assert_eq!(
            tokens("<8 x i16>"),
            vec![Token::LAngle, Token::Integer(8), Token::Word("x".into()), Token::IntType(16), Token::RAngle]
        );
        assert_eq!(tokens("ret i32 0"), vec![Token::Word("ret".into()), Token::IntType(32), Token::Integer(0)]);
        assert_eq!(tokens("1:\n  br label %2"), vec![
            Token::LabelDef("1".into()),
            Token::Word("br".into()),
            Token::Word("label".into()),
            Token::LocalIdent("2".into()),
        ]);
        assert_eq!(tokens("x"), vec![Token::Word("x".into())]);
    }

    #[test]
    fn test_display_relexes() {
        let src = r#"store double 1.5, ptr %p, align 8, !tbaa !3"#;
        let printed: Vec<String> = tokens(src).iter().map(Token::to_string).collect();
        assert_eq!(printed[1], "double");
        assert_eq!(printed[2], "0x3FF8000000000000");
        assert_eq!(printed[5], "%p");
        assert_eq!(printed[10], "!tbaa");
        let expected: Vec<Token> = tokens(src)
            .into_iter()
            .map(|t| match t {
                Token::FloatLit(x) => Token::HexFloat(x.to_bits()),
                other => other,
            })
            .collect();
        assert_eq!(tokens(&printed.join(" ")), expected);
    }

    #[test]
    fn test_line_numbers() {
        let lines: Vec<usize> = Lexer::new("a\n\n; c\nb").map(|t| t.unwrap().0).collect();
        assert_eq!(lines, vec![1, 4]);
    }

    #[test]
    fn test_bad_character() {
        let err = Lexer::new("\n ^").next().unwrap().unwrap_err();
        assert_eq!(err.0, 2);
    }
}
