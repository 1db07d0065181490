//! Token classification and flag-token splitting.

/// What a single argv token is, given the scan state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Positional argument or subcommand name.
    Positional,
    /// `-x`, `-xyz`, `-x=value`.
    Short,
    /// `--name`, `--name=value`.
    Long,
    /// The first bare `--`.
    Terminator,
}

/// Classify `token`. After the terminator every token is positional.
///
/// A bare `-` is positional (conventionally "read from standard input").
pub fn classify(token: &str, after_terminator: bool) -> Token {
    if after_terminator {
        return Token::Positional;
    }
    if token == "--" {
        return Token::Terminator;
    }
    if token.len() > 2 && token.starts_with("--") {
        return Token::Long;
    }
    if token.len() > 1 && token.starts_with('-') {
        return Token::Short;
    }
    Token::Positional
}

/// A flag token split into its parts: `--name=value` -> (2, "name", Some("value")).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagToken<'t> {
    pub dashes: usize,
    pub name: &'t str,
    pub value: Option<&'t str>,
}

/// Split a flag-shaped token at its first `=`.
pub fn split_flag(token: &str) -> FlagToken<'_> {
    let dashes = token.bytes().take(2).take_while(|&b| b == b'-').count();
    let body = &token[dashes..];
    match body.split_once('=') {
        Some((name, value)) => FlagToken {
            dashes,
            name,
            value: Some(value),
        },
        None => FlagToken {
            dashes,
            name: body,
            value: None,
        },
    }
}
