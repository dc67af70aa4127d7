//! Syntax-rule tokens and argument matching.
//!
//! Rule source text is parsed into typed tokens once at registration,
//! so matching never re-splits strings. Source syntax: a bare word is a
//! literal, `[name]` is a parameter, `[...]` is the variadic tail.

use crate::error::RegistryError;

/// One token of a syntax rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Must equal the argument at this position exactly.
    Literal(String),
    /// Captures the argument at this position verbatim. The name is
    /// only used in rule source text and help rendering.
    Param(String),
    /// Captures all remaining arguments, including zero, as one list.
    /// Only legal as the final token.
    Variadic,
}

impl Token {
    fn parse(text: &str) -> Token {
        if text == "[...]" {
            Token::Variadic
        } else if text.len() > 2 && text.starts_with('[') && text.ends_with(']') {
            Token::Param(text[1..text.len() - 1].to_string())
        } else {
            Token::Literal(text.to_string())
        }
    }
}

/// Parse rule source text into tokens.
///
/// The empty source parses to zero tokens and matches only a
/// zero-argument invocation.
pub(crate) fn parse_rule(source: &str) -> Result<Vec<Token>, RegistryError> {
    if source.is_empty() {
        return Ok(Vec::new());
    }
    let tokens: Vec<Token> = source.split(' ').map(Token::parse).collect();
    if tokens[..tokens.len() - 1]
        .iter()
        .any(|t| matches!(t, Token::Variadic))
    {
        return Err(RegistryError::VariadicNotLast {
            rule: source.to_string(),
        });
    }
    Ok(tokens)
}

/// One captured argument position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    /// A single argument captured by a parameter token.
    One(String),
    /// The tail captured by a variadic token.
    Rest(Vec<String>),
}

/// Positional captures handed to a handler.
///
/// The accessors are forgiving on shape mismatches (empty string or
/// empty slice) since the matcher guarantees the shape a handler was
/// registered for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args(Vec<Capture>);

impl Args {
    /// Number of captures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the rule captured nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The parameter capture at position `i`.
    pub fn str(&self, i: usize) -> &str {
        match self.0.get(i) {
            Some(Capture::One(s)) => s,
            _ => "",
        }
    }

    /// The variadic capture at position `i`.
    pub fn rest(&self, i: usize) -> &[String] {
        match self.0.get(i) {
            Some(Capture::Rest(tail)) => tail,
            _ => &[],
        }
    }

    /// All captures in positional order.
    pub fn captures(&self) -> &[Capture] {
        &self.0
    }
}

/// Match `args` against `tokens`, producing captures on success.
///
/// A variadic rule accepts any argument list of length >= tokens - 1;
/// every other rule requires an exact length match. Tokens are walked
/// left to right; the first literal mismatch fails the rule.
pub(crate) fn match_rule(tokens: &[Token], args: &[String]) -> Option<Args> {
    let variadic = matches!(tokens.last(), Some(Token::Variadic));
    if variadic {
        if args.len() + 1 < tokens.len() {
            return None;
        }
    } else if args.len() != tokens.len() {
        return None;
    }

    let mut captures = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Literal(literal) => {
                if args[i] != *literal {
                    return None;
                }
            }
            Token::Param(_) => captures.push(Capture::One(args[i].clone())),
            Token::Variadic => {
                captures.push(Capture::Rest(args[i..].to_vec()));
                break;
            }
        }
    }
    Some(Args(captures))
}
