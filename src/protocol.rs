//! Query protocol parser and response encoder.
//!
//! Two commands are understood:
//! - `lists\n`: return the whole lists file
//! - `values<d><t>` or `values<d><t1><t2>`: return segment `d` of the
//!   values file, where `d` is the character right after `values` and
//!   the trailing characters are normally `\n` or `\r\n`
//!
//! Every other message is ignored.

use bytes::BytesMut;

/// Exact text of a list query.
pub const LISTS_COMMAND: &str = "lists\n";

/// Prefix of a values query.
pub const VALUES_PREFIX: &str = "values";

/// Separator between segments of the values file.
pub const SEGMENT_DELIMITER: char = '#';

/// Parsed query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Return the lists file
    Lists,
    /// Return one segment of the values file; `index` is not yet validated
    Values { index: char },
    /// Anything else, silently ignored
    Unknown,
}

/// Index errors raised while resolving a values query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Index character is not a decimal digit
    InvalidIndex(char),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidIndex(c) => write!(f, "Invalid segment index: {:?}", c),
        }
    }
}

impl std::error::Error for ParseError {}

/// Classify one decoded message.
pub fn parse(message: &str) -> Command {
    if message == LISTS_COMMAND {
        return Command::Lists;
    }

    let Some(rest) = message.strip_prefix(VALUES_PREFIX) else {
        return Command::Unknown;
    };

    // Index followed by one or two trailing characters
    let mut chars = rest.chars();
    match (chars.next(), chars.count()) {
        (Some(index), 1 | 2) => Command::Values { index },
        _ => Command::Unknown,
    }
}

impl Command {
    /// Resolve the segment index of a values query.
    pub fn segment_index(index: char) -> Result<usize, ParseError> {
        index
            .to_digit(10)
            .map(|d| d as usize)
            .ok_or(ParseError::InvalidIndex(index))
    }
}

/// Response builder
pub struct Response;

impl Response {
    /// Encode `body` followed by a single newline.
    pub fn line(body: &str) -> BytesMut {
        let mut buf = BytesMut::with_capacity(body.len() + 1);
        buf.extend_from_slice(body.as_bytes());
        buf.extend_from_slice(b"\n");
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lists() {
        assert_eq!(parse("lists\n"), Command::Lists);
    }

    #[test]
    fn test_lists_must_match_exactly() {
        assert_eq!(parse("lists"), Command::Unknown);
        assert_eq!(parse("lists\r\n"), Command::Unknown);
        assert_eq!(parse("LISTS\n"), Command::Unknown);
        assert_eq!(parse(" lists\n"), Command::Unknown);
    }

    #[test]
    fn test_parse_values_one_trailing_char() {
        assert_eq!(parse("values2\n"), Command::Values { index: '2' });
    }

    #[test]
    fn test_parse_values_two_trailing_chars() {
        assert_eq!(parse("values2\r\n"), Command::Values { index: '2' });
        assert_eq!(parse("values2__"), Command::Values { index: '2' });
    }

    #[test]
    fn test_parse_values_keeps_non_digit_index() {
        assert_eq!(parse("valuesx\n"), Command::Values { index: 'x' });
        assert_eq!(parse("values\n\n"), Command::Values { index: '\n' });
    }

    #[test]
    fn test_parse_values_wrong_length() {
        assert_eq!(parse("values"), Command::Unknown);
        assert_eq!(parse("values\n"), Command::Unknown);
        assert_eq!(parse("values12\r\n"), Command::Unknown);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(parse("hello\n"), Command::Unknown);
        assert_eq!(parse(""), Command::Unknown);
    }

    #[test]
    fn test_segment_index() {
        assert_eq!(Command::segment_index('0'), Ok(0));
        assert_eq!(Command::segment_index('9'), Ok(9));
        assert_eq!(
            Command::segment_index('a'),
            Err(ParseError::InvalidIndex('a'))
        );
    }

    #[test]
    fn test_response_line() {
        assert_eq!(&Response::line("two")[..], b"two\n");
        assert_eq!(&Response::line("")[..], b"\n");
    }
}
