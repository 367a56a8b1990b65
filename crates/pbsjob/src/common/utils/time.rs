use std::time::Duration;

use anyhow::anyhow;
use nom::character::complete::char;
use nom::combinator::{map, opt};
use nom::sequence::{preceded, tuple};
use nom_supreme::ParserExt;

use crate::common::parser::{NomResult, consume_all, p_u32};

/// Parses either `[[HH:]MM:]SS` or a humantime string (`2h`, `30m`).
pub fn parse_hms_or_human_time(text: &str) -> anyhow::Result<Duration> {
    parse_hms_time(text)
        .or_else(|_| humantime::parse_duration(text))
        .map_err(|e| {
            anyhow!(
                "Could not parse PBS walltime. Use either `HH:MM:SS` or humantime format (2hours): {:?}",
                e
            )
        })
}

fn p_hms_time(input: &str) -> NomResult<Duration> {
    map(
        tuple((
            p_u32,
            opt(tuple((
                preceded(char(':'), p_u32),
                opt(preceded(char(':'), p_u32)),
            ))),
        ))
        .context("[[HH:]MM:]SS value"),
        |parsed| match parsed {
            (seconds, None) => Duration::from_secs(seconds as u64),
            (minutes, Some((seconds, None))) => {
                Duration::from_secs(minutes as u64 * 60 + seconds as u64)
            }
            (hours, Some((minutes, Some(seconds)))) => {
                Duration::from_secs(hours as u64 * 3600 + minutes as u64 * 60 + seconds as u64)
            }
        },
    )(input)
}

/// Parses time strings in the format [[hh:]mm:]ss.
/// Individual time values may be zero padded.
pub fn parse_hms_time(input: &str) -> anyhow::Result<Duration> {
    consume_all(p_hms_time, input)
}

/// Format a duration as a PBS walltime, e.g. 1:05:02.
/// Hours are not padded, which is how walltimes are usually written in job scripts.
pub fn format_walltime(duration: &Duration) -> String {
    let mut seconds = duration.as_secs();
    let hours = seconds / 3600;
    seconds %= 3600;
    let minutes = seconds / 60;
    seconds %= 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}
