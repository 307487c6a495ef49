//! Bidirectional mapping between symbol strings and compact tokens.

use hashbrown::HashMap;
use smol_str::SmolStr;

use crate::types::Token;

/// Maps the symbols of one alphabet to dense tokens and back.
///
/// Token 0 is reserved for the empty symbol; real symbols get tokens from 1
/// upward in the order they are added. Machines are scanned in state then
/// transition order when building a tokenizer, so identical alphabets
/// produce identical numberings run to run.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    sym2tok: HashMap<SmolStr, Token>,
    tok2sym: Vec<SmolStr>,
}

impl Tokenizer {
    /// Build a tokenizer over the given symbols, preserving their order.
    /// Empty and repeated symbols are skipped.
    pub fn new<I>(symbols: I) -> Tokenizer
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut tokenizer = Tokenizer {
            sym2tok: HashMap::new(),
            tok2sym: vec![SmolStr::default()],
        };
        for sym in symbols {
            tokenizer.add_symbol(sym.as_ref());
        }
        tokenizer
    }

    /// Register a symbol, returning its token. Adding a symbol twice returns
    /// the token assigned the first time.
    pub fn add_symbol(&mut self, sym: &str) -> Token {
        if sym.is_empty() {
            return Token::EMPTY;
        }
        if let Some(&tok) = self.sym2tok.get(sym) {
            return tok;
        }
        let tok = Token(self.tok2sym.len() as u32);
        self.sym2tok.insert(sym.into(), tok);
        self.tok2sym.push(sym.into());
        tok
    }

    /// Token of a non-empty symbol, or `None` if the symbol is unknown.
    pub fn tok(&self, sym: &str) -> Option<Token> {
        self.sym2tok.get(sym).copied()
    }

    /// Symbol carried by a token. The empty token maps to the empty string.
    pub fn sym(&self, tok: Token) -> Option<&str> {
        self.tok2sym.get(tok.idx()).map(|s| s.as_str())
    }

    /// The reserved empty token.
    #[inline(always)]
    pub fn empty_token(&self) -> Token {
        Token::EMPTY
    }

    /// Number of symbols, the empty symbol included.
    pub fn len(&self) -> usize {
        self.tok2sym.len()
    }

    /// True for a tokenizer over an empty alphabet.
    pub fn is_empty(&self) -> bool {
        self.tok2sym.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_follow_insertion_order() {
        let t = Tokenizer::new(["A", "C", "G", "T"]);
        assert_eq!(t.tok("A"), Some(Token(1)));
        assert_eq!(t.tok("T"), Some(Token(4)));
        assert_eq!(t.sym(Token(2)), Some("C"));
        assert_eq!(t.len(), 5);
    }

    #[test]
    fn empty_symbol_is_token_zero() {
        let t = Tokenizer::new(["x"]);
        assert_eq!(t.empty_token(), Token::EMPTY);
        assert_eq!(t.sym(Token::EMPTY), Some(""));
    }

    #[test]
    fn unknown_symbol_is_none() {
        let t = Tokenizer::new(["A"]);
        assert_eq!(t.tok("B"), None);
    }

    #[test]
    fn duplicates_keep_their_first_token() {
        let t = Tokenizer::new(["A", "B", "A"]);
        assert_eq!(t.tok("A"), Some(Token(1)));
        assert_eq!(t.tok("B"), Some(Token(2)));
        assert_eq!(t.len(), 3);
    }
}
