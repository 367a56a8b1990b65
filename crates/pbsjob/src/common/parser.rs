use nom::{IResult, Parser};
use nom::character::complete::digit1;
use nom::combinator::{all_consuming, map_res};
use nom_supreme::ParserExt;
use nom_supreme::error::ErrorTree;

pub type NomResult<'a, Ret> = IResult<&'a str, Ret, ErrorTree<&'a str>>;

/// Runs `parser` and requires it to consume the whole `input`.
pub fn consume_all<'a, F, O>(parser: F, input: &'a str) -> anyhow::Result<O>
where
    F: FnMut(&'a str) -> NomResult<'a, O>,
{
    match all_consuming(parser)(input) {
        Ok((_, value)) => Ok(value),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(anyhow::anyhow!("Parse error\n{e}")),
        Err(nom::Err::Incomplete(_)) => Err(anyhow::anyhow!("Parse error\nincomplete input")),
    }
}

/// Decimal number. Leading zeros are allowed, PBS scripts use them in counts like `mpiprocs=02`.
pub fn p_u32(input: &str) -> NomResult<u32> {
    map_res(digit1, str::parse::<u32>)
        .context("unsigned integer")
        .parse(input)
}

#[cfg(test)]
mod tests {
    use super::{consume_all, p_u32};

    #[test]
    fn test_parse_u32() {
        assert_eq!(consume_all(p_u32, "0").unwrap(), 0);
        assert_eq!(consume_all(p_u32, "36").unwrap(), 36);
        assert_eq!(consume_all(p_u32, "02").unwrap(), 2);
    }

    #[test]
    fn test_parse_u32_invalid() {
        assert!(consume_all(p_u32, "").is_err());
        assert!(consume_all(p_u32, "x").is_err());
        assert!(consume_all(p_u32, "-1").is_err());
        assert!(consume_all(p_u32, "99999999999").is_err());
    }

    #[test]
    fn test_consume_all_trailing_input() {
        let error = consume_all(p_u32, "12x").unwrap_err();
        assert!(error.to_string().starts_with("Parse error"));
    }
}
