use std::borrow::Cow;

use nom::branch::alt;
use nom::bytes::complete::{is_not, take_while};
use nom::character::complete::{anychar, char, space0, space1};
use nom::combinator::map;
use nom::multi::{many1, separated_list0};
use nom::sequence::{delimited, preceded};

use crate::common::parser::{NomResult, consume_all};

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | ',' | '=' | '@' | '%' | '+')
}

/// Quotes `value` so that a POSIX shell reads it back as a single word.
pub fn quote(value: &str) -> Cow<'_, str> {
    if !value.is_empty() && value.chars().all(is_safe_char) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("'{}'", value.replace('\'', r"'\''")))
    }
}

pub fn join<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|word| quote(word.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A word of a command line with its quotes removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellWord {
    pub text: String,
    /// Some part of the word was quoted or escaped, so it cannot be an operator.
    pub quoted: bool,
}

fn p_word_part(input: &str) -> NomResult<(String, bool)> {
    alt((
        map(
            delimited(char('\''), take_while(|c| c != '\''), char('\'')),
            |part: &str| (part.to_string(), true),
        ),
        map(
            delimited(char('"'), take_while(|c| c != '"'), char('"')),
            |part: &str| (part.to_string(), true),
        ),
        map(preceded(char('\\'), anychar), |c| (String::from(c), true)),
        map(is_not(" \t'\"\\"), |part: &str| (part.to_string(), false)),
    ))(input)
}

fn p_word(input: &str) -> NomResult<ShellWord> {
    map(many1(p_word_part), |parts| ShellWord {
        quoted: parts.iter().any(|(_, quoted)| *quoted),
        text: parts.into_iter().map(|(text, _)| text).collect(),
    })(input)
}

/// Splits a shell command line into words, keeping track of which of them were quoted.
pub fn split_shell_words(input: &str) -> anyhow::Result<Vec<ShellWord>> {
    consume_all(
        delimited(space0, separated_list0(space1, p_word), space0),
        input,
    )
}

/// Splits a shell command line into words, removing quotes.
/// Variables and globs are kept as they are.
pub fn split_words(input: &str) -> anyhow::Result<Vec<String>> {
    Ok(split_shell_words(input)?
        .into_iter()
        .map(|word| word.text)
        .collect())
}
