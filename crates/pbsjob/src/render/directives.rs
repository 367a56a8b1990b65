use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use bstr::ByteSlice;

use crate::common::error::{JobError, spec_error};
use crate::job::resources::parse_resource_request;
use crate::job::{
    JobSpec, OutputSink, ResourceRequest, Toggle, Walltime, parse_output_sink, parse_walltime,
    parse_working_directory,
};
use crate::render::shell::{quote, split_shell_words, split_words};

pub const DIRECTIVE_PREFIX: &str = "#PBS";

const CAPTURE_OPERATORS: [&str; 2] = [">&", "&>"];

/// A single scheduler directive of a job script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Name(String),
    Account(String),
    Resources(ResourceRequest),
    Walltime(Walltime),
    Queue(String),
    Stdout(OutputSink),
    Stderr(OutputSink),
    Rerunnable(bool),
    PropagateEnvironment,
}

impl Directive {
    pub fn key(&self) -> &'static str {
        match self {
            Directive::Name(_) => "name",
            Directive::Account(_) => "account",
            Directive::Resources(_) => "resource_request",
            Directive::Walltime(_) => "walltime",
            Directive::Queue(_) => "queue",
            Directive::Stdout(_) => "stdout_sink",
            Directive::Stderr(_) => "stderr_sink",
            Directive::Rerunnable(_) => "rerunnable",
            Directive::PropagateEnvironment => "propagate_environment",
        }
    }

    pub fn value(&self) -> String {
        match self {
            Directive::Name(value) | Directive::Account(value) | Directive::Queue(value) => {
                value.clone()
            }
            Directive::Resources(request) => request.to_string(),
            Directive::Walltime(walltime) => walltime.to_string(),
            Directive::Stdout(sink) | Directive::Stderr(sink) => String::from(sink.clone()),
            Directive::Rerunnable(rerunnable) => rerunnable_flag(*rerunnable).to_string(),
            Directive::PropagateEnvironment => "true".to_string(),
        }
    }
}

fn rerunnable_flag(rerunnable: bool) -> &'static str {
    if rerunnable { "y" } else { "n" }
}

impl Display for Directive {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{DIRECTIVE_PREFIX} ")?;
        match self {
            Directive::Name(name) => write!(f, "-N {}", quote(name)),
            Directive::Account(account) => write!(f, "-A {}", quote(account)),
            Directive::Resources(request) => write!(f, "-l {request}"),
            Directive::Walltime(walltime) => write!(f, "-l walltime={walltime}"),
            Directive::Queue(queue) => write!(f, "-q {}", quote(queue)),
            Directive::Stdout(sink) => write!(f, "-o {}", quote(&String::from(sink.clone()))),
            Directive::Stderr(sink) => write!(f, "-e {}", quote(&String::from(sink.clone()))),
            Directive::Rerunnable(rerunnable) => write!(f, "-r {}", rerunnable_flag(*rerunnable)),
            Directive::PropagateEnvironment => f.write_str("-V"),
        }
    }
}

/// Directives describing `spec`, one per populated field, in rendering order.
pub fn job_directives(spec: &JobSpec) -> Vec<Directive> {
    let mut directives = vec![Directive::Name(spec.name.clone())];
    if let Some(account) = &spec.account {
        directives.push(Directive::Account(account.clone()));
    }
    directives.push(Directive::Resources(spec.resources.clone()));
    directives.push(Directive::Walltime(spec.walltime));
    directives.push(Directive::Queue(spec.queue.clone()));
    if let Some(sink) = &spec.stdout {
        directives.push(Directive::Stdout(sink.clone()));
    }
    if let Some(sink) = &spec.stderr {
        directives.push(Directive::Stderr(sink.clone()));
    }
    if let Some(rerunnable) = spec.rerunnable {
        directives.push(Directive::Rerunnable(rerunnable));
    }
    if spec.propagate_environment {
        directives.push(Directive::PropagateEnvironment);
    }
    directives
}

fn parse_error<E: Display>(context: &str, error: E) -> JobError {
    JobError::ParseError(format!("{context}: {error}"))
}

fn parse_resource_list(value: &str, directives: &mut Vec<Directive>) -> crate::Result<()> {
    for item in value.split(',') {
        if let Some(walltime) = item.strip_prefix("walltime=") {
            let walltime = parse_walltime(walltime)
                .map_err(|e| parse_error(&format!("Invalid walltime `{walltime}`"), e))?;
            directives.push(Directive::Walltime(walltime));
        } else if item.starts_with("select=") || item.starts_with("nodes=") {
            let request = parse_resource_request(item)
                .map_err(|e| parse_error(&format!("Invalid resource request `{item}`"), e))?;
            directives.push(Directive::Resources(request));
        } else {
            log::warn!("Ignoring unsupported resource `{item}`");
        }
    }
    Ok(())
}

/// Parses the arguments of a single `#PBS` line.
pub fn parse_directive_args(args: &[String]) -> crate::Result<Vec<Directive>> {
    let mut directives = Vec::new();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .ok_or_else(|| JobError::ParseError(format!("Directive `{flag}` requires a value")))
        };
        match flag.as_str() {
            "-N" => directives.push(Directive::Name(value()?.clone())),
            "-A" => directives.push(Directive::Account(value()?.clone())),
            "-q" => directives.push(Directive::Queue(value()?.clone())),
            "-l" => parse_resource_list(value()?, &mut directives)?,
            "-o" => directives.push(Directive::Stdout(
                parse_output_sink(value()?).map_err(|e| parse_error("Invalid -o", e))?,
            )),
            "-e" => directives.push(Directive::Stderr(
                parse_output_sink(value()?).map_err(|e| parse_error("Invalid -e", e))?,
            )),
            "-r" => {
                let rerunnable = match value()?.as_str() {
                    "y" => true,
                    "n" => false,
                    other => {
                        return Err(JobError::ParseError(format!(
                            "Invalid rerunnable flag `{other}`, expected `y` or `n`"
                        )));
                    }
                };
                directives.push(Directive::Rerunnable(rerunnable));
            }
            "-V" => directives.push(Directive::PropagateEnvironment),
            other => log::warn!("Ignoring unsupported PBS directive argument `{other}`"),
        }
    }
    Ok(directives)
}

/// Extracts directives from the header of a job script.
/// Scanning stops at the first line that is neither empty nor a comment.
pub fn extract_directives(data: &[u8]) -> crate::Result<Vec<Directive>> {
    let mut directives = Vec::new();
    for line in data.lines() {
        let line = line.trim();
        if let Some(args) = strip_directive_prefix(line) {
            let args = split_words(&args.to_str_lossy())
                .map_err(|e| parse_error("Invalid directive", e))?;
            directives.extend(parse_directive_args(&args)?);
            continue;
        }
        match line.first() {
            Some(b'#') | None => continue,
            _ => break,
        }
    }
    Ok(directives)
}

fn strip_directive_prefix(line: &[u8]) -> Option<&[u8]> {
    let rest = line.strip_prefix(DIRECTIVE_PREFIX.as_bytes())?;
    match rest.first() {
        None => Some(rest),
        Some(c) if c.is_ascii_whitespace() => Some(rest),
        Some(_) => None,
    }
}

fn parse_core_dump_line(line: &str) -> Option<Toggle<u64>> {
    let (enabled, command) = match line.strip_prefix('#') {
        Some(command) => (false, command.trim_start()),
        None => (true, line),
    };
    let limit = command.strip_prefix("ulimit")?.trim().strip_prefix("-c")?.trim();
    let limit = limit.parse().ok()?;
    Some(Toggle {
        value: limit,
        enabled,
    })
}

struct LaunchLine {
    launcher: String,
    process_count: u32,
    command: Vec<String>,
    capture: Option<PathBuf>,
}

fn parse_launch_line(line: &str) -> crate::Result<Option<LaunchLine>> {
    let Ok(words) = split_shell_words(line) else {
        return Ok(None);
    };
    if words.len() < 3 || words[1].text != "-np" {
        return Ok(None);
    }
    let Ok(process_count) = words[2].text.parse::<u32>() else {
        return Ok(None);
    };

    let mut command = words[3..].to_vec();
    let mut capture = None;
    if let Some(position) = command
        .iter()
        .position(|word| !word.quoted && CAPTURE_OPERATORS.contains(&word.text.as_str()))
    {
        let rest = command.split_off(position);
        match rest.as_slice() {
            [_, path] => capture = Some(PathBuf::from(&path.text)),
            _ => {
                return Err(JobError::ParseError(format!(
                    "Launch line `{line}` must end with `>& <file>`"
                )));
            }
        }
    }
    Ok(Some(LaunchLine {
        launcher: words[0].text.clone(),
        process_count,
        command: command.into_iter().map(|word| word.text).collect(),
        capture,
    }))
}

/// Rejects hooks that would be read back as another part of the script body:
/// comments, core dump limits, launch lines and a leading `cd`.
pub(crate) fn check_hooks(spec: &JobSpec) -> crate::Result<()> {
    let hooks = spec.pre_hooks.iter().chain(spec.post_hooks.iter());
    for hook in hooks {
        if hook.starts_with('#') || parse_core_dump_line(hook).is_some() {
            return spec_error(format!(
                "Hook `{hook}` would be read as a comment or a core dump limit"
            ));
        }
    }
    if let Some(hook) = spec.pre_hooks.first() {
        if spec.working_directory.is_none() && hook.starts_with("cd ") {
            return spec_error(format!(
                "First pre-launch hook `{hook}` would be read as the working directory"
            ));
        }
    }
    for hook in &spec.pre_hooks {
        if !matches!(parse_launch_line(hook), Ok(None)) {
            return spec_error(format!(
                "Pre-launch hook `{hook}` would be read as the launch line"
            ));
        }
    }
    Ok(())
}

/// Parses a job script back into the job it describes.
pub fn parse_script(data: &[u8]) -> crate::Result<JobSpec> {
    let mut name = None;
    let mut account = None;
    let mut resources = None;
    let mut walltime = None;
    let mut queue = None;
    let mut stdout = None;
    let mut stderr = None;
    let mut rerunnable = None;
    let mut propagate_environment = false;

    for directive in extract_directives(data)? {
        match directive {
            Directive::Name(value) => name = Some(value),
            Directive::Account(value) => account = Some(value),
            Directive::Resources(value) => resources = Some(value),
            Directive::Walltime(value) => walltime = Some(value),
            Directive::Queue(value) => queue = Some(value),
            Directive::Stdout(value) => stdout = Some(value),
            Directive::Stderr(value) => stderr = Some(value),
            Directive::Rerunnable(value) => rerunnable = Some(value),
            Directive::PropagateEnvironment => propagate_environment = true,
        }
    }

    let mut working_directory = None;
    let mut core_dump_limit = None;
    let mut launch: Option<LaunchLine> = None;
    let mut pre_hooks = Vec::new();
    let mut post_hooks = Vec::new();

    for line in data.lines() {
        let line = line.to_str_lossy();
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(limit) = parse_core_dump_line(line) {
            core_dump_limit = Some(limit);
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        if launch.is_some() {
            post_hooks.push(line.to_string());
            continue;
        }
        if working_directory.is_none() && pre_hooks.is_empty() {
            if let Some(dir) = line.strip_prefix("cd ") {
                let dir = split_words(dir.trim())
                    .ok()
                    .filter(|words| words.len() == 1)
                    .map(|mut words| words.remove(0))
                    .unwrap_or_else(|| dir.trim().to_string());
                working_directory = Some(
                    parse_working_directory(&dir)
                        .map_err(|e| parse_error("Invalid working directory", e))?,
                );
                continue;
            }
        }
        match parse_launch_line(line)? {
            Some(line) => launch = Some(line),
            None => pre_hooks.push(line.to_string()),
        }
    }

    let Some(launch) = launch else {
        return spec_error("Script does not contain a `<launcher> -np <count> ...` line");
    };
    let missing = |key: &str| JobError::Specification(format!("Script is missing the `{key}` directive"));
    let spec = JobSpec {
        name: name.ok_or_else(|| missing("name"))?,
        account,
        resources: resources.ok_or_else(|| missing("resource_request"))?,
        walltime: walltime.ok_or_else(|| missing("walltime"))?,
        queue: queue.ok_or_else(|| missing("queue"))?,
        stdout,
        stderr,
        rerunnable,
        propagate_environment,
        working_directory,
        core_dump_limit,
        launcher: launch.launcher,
        process_count: launch.process_count,
        command: launch.command,
        capture: launch.capture,
        pre_hooks,
        post_hooks,
    };
    spec.validate()?;
    Ok(spec)
}
