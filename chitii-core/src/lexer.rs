//! Lexer for chitii source text.

use core::fmt;

use crate::error::LexError;

/// Kind of a token produced by the lexer.
///
/// Comments and whitespace are consumed by the lexer and never
/// reach the token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    Func,
    Return,
    Print,

    // Identifiers and literals
    Ident,
    IntLiteral,
    StringLiteral,

    // Operators
    Assign, // =
    Plus,   // +
    Minus,  // -
    Star,   // *
    Slash,  // /

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Semi,     // ;
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Func => "'func'",
            TokenKind::Return => "'return'",
            TokenKind::Print => "'print'",
            TokenKind::Ident => "identifier",
            TokenKind::IntLiteral => "integer literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::Assign => "'='",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Semi => "';'",
        };
        f.write_str(text)
    }
}

/// A single token.
///
/// `text` holds the lexeme; for string literals it is the content
/// between the quotes. `offset` is the byte offset of the first
/// character in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5}  {:<16} {:?}", self.offset, format!("{:?}", self.kind), self.text)
    }
}

/// Lex a source string into tokens, stopping at the first
/// character that starts no token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        source,
        bytes: source.as_bytes(),
        index: 0,
    };
    lexer.run()
}

struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    index: usize,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_byte() {
            if is_whitespace(ch) {
                self.index += 1;
                continue;
            }
            if ch == b'#' {
                self.skip_comment();
                continue;
            }

            let start = self.index;
            let token = match ch {
                b'"' => self.lex_string(start)?,
                b'0'..=b'9' => self.lex_while(start, TokenKind::IntLiteral, |c| c.is_ascii_digit()),
                _ if is_ident_start(ch) => self.lex_ident_or_keyword(start),
                _ => {
                    let kind = punctuation(ch).ok_or_else(|| self.unexpected_char(start))?;
                    self.index += 1;
                    self.token(kind, start, start, self.index)
                }
            };
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn token(&self, kind: TokenKind, offset: usize, text_start: usize, text_end: usize) -> Token {
        Token {
            kind,
            text: self.source[text_start..text_end].to_string(),
            offset,
        }
    }

    fn unexpected_char(&self, position: usize) -> LexError {
        let found = self.source[position..].chars().next().unwrap_or('\0');
        LexError { position, found }
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek_byte() {
            if ch == b'\n' {
                break;
            }
            self.index += 1;
        }
    }

    fn lex_string(&mut self, start: usize) -> Result<Token, LexError> {
        // No escape sequences: the literal ends at the next quote.
        let content_start = start + 1;
        match self.source[content_start..].find('"') {
            Some(len) => {
                let content_end = content_start + len;
                self.index = content_end + 1;
                Ok(self.token(TokenKind::StringLiteral, start, content_start, content_end))
            }
            None => Err(self.unexpected_char(start)),
        }
    }

    fn lex_while(&mut self, start: usize, kind: TokenKind, accept: impl Fn(u8) -> bool) -> Token {
        while self.peek_byte().is_some_and(&accept) {
            self.index += 1;
        }
        self.token(kind, start, start, self.index)
    }

    fn lex_ident_or_keyword(&mut self, start: usize) -> Token {
        let mut token = self.lex_while(start, TokenKind::Ident, is_ident_continue);
        token.kind = match token.text.as_str() {
            "func" => TokenKind::Func,
            "return" => TokenKind::Return,
            "print" => TokenKind::Print,
            _ => TokenKind::Ident,
        };
        token
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }
}

fn punctuation(ch: u8) -> Option<TokenKind> {
    let kind = match ch {
        b'=' => TokenKind::Assign,
        b'+' => TokenKind::Plus,
        b'-' => TokenKind::Minus,
        b'*' => TokenKind::Star,
        b'/' => TokenKind::Slash,
        b'(' => TokenKind::LParen,
        b')' => TokenKind::RParen,
        b'{' => TokenKind::LBrace,
        b'}' => TokenKind::RBrace,
        b'[' => TokenKind::LBracket,
        b']' => TokenKind::RBracket,
        b',' => TokenKind::Comma,
        b';' => TokenKind::Semi,
        _ => return None,
    };
    Some(kind)
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_assignment_statement() {
        use TokenKind::*;
        assert_eq!(
            kinds("x = 3 + 4 * 2;"),
            vec![Ident, Assign, IntLiteral, Plus, IntLiteral, Star, IntLiteral, Semi]
        );
    }

    #[test]
    fn keywords_need_a_word_boundary() {
        use TokenKind::*;
        assert_eq!(kinds("print printer _print func funcs return"), vec![
            Print, Ident, Ident, Func, Ident, Return
        ]);
    }

    #[test]
    fn strips_quotes_from_string_literals() {
        let tokens = tokenize("print \"hi there\"").expect("lex");
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[1].text, "hi there");
        assert_eq!(tokens[1].offset, 6);
    }

    #[test]
    fn discards_comments_and_whitespace() {
        let source = "# leading comment\r\n  a\t# trailing\n[1, 2]";
        use TokenKind::*;
        assert_eq!(
            kinds(source),
            vec![Ident, LBracket, IntLiteral, Comma, IntLiteral, RBracket]
        );
    }

    #[test]
    fn records_byte_offsets() {
        let tokens = tokenize("ab  12").expect("lex");
        assert_eq!(tokens[0].offset, 0);
        assert_eq!(tokens[1].offset, 4);
        assert_eq!(tokens[1].text, "12");
    }

    #[test]
    fn rejects_unknown_character() {
        let err = tokenize("x = 1 % 2").unwrap_err();
        assert_eq!(err, LexError { position: 6, found: '%' });
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = tokenize("print \"oops").unwrap_err();
        assert_eq!(err, LexError { position: 6, found: '"' });
    }

    #[test]
    fn reports_non_ascii_characters_whole() {
        let err = tokenize("a = λ").unwrap_err();
        assert_eq!(err.found, 'λ');
        assert_eq!(err.position, 4);
    }
}
