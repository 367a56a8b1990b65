pub mod jobfile;
pub mod resources;

use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::error::spec_error;
use crate::common::utils::time::{format_walltime, parse_hms_or_human_time};
use crate::render::directives::check_hooks;
pub use resources::ResourceRequest;

/// Launcher used when a job does not specify its own.
pub const DEFAULT_LAUNCHER: &str = "mpirun";

/// Environment variable in which PBS stores the directory `qsub` was invoked from.
pub const PBS_SUBMIT_DIR_ENV: &str = "PBS_O_WORKDIR";

const SUBMIT_DIR_PLACEHOLDER: &str = "%{SUBMIT_DIR}";
const DISCARD_PATH: &str = "/dev/null";

/// Maximum wall-clock duration of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Walltime(Duration);

impl Walltime {
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn from_secs(seconds: u64) -> Self {
        Self(Duration::from_secs(seconds))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl Display for Walltime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_walltime(&self.0))
    }
}

/// Parses a walltime. PBS counts walltimes in whole seconds, so fractions are rejected.
pub fn parse_walltime(input: &str) -> anyhow::Result<Walltime> {
    let duration = parse_hms_or_human_time(input)?;
    if duration.subsec_nanos() != 0 {
        anyhow::bail!("Walltime `{input}` is not a whole number of seconds");
    }
    Ok(Walltime(duration))
}

impl TryFrom<String> for Walltime {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_walltime(&value)
    }
}

impl From<Walltime> for String {
    fn from(walltime: Walltime) -> Self {
        walltime.to_string()
    }
}

/// Destination of one of the scheduler's own output channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputSink {
    Discard,
    File(PathBuf),
}

pub fn parse_output_sink(input: &str) -> anyhow::Result<OutputSink> {
    if input.is_empty() {
        anyhow::bail!("Output path cannot be empty");
    }
    Ok(OutputSink::from(input.to_string()))
}

impl From<String> for OutputSink {
    fn from(value: String) -> Self {
        match value.as_str() {
            "none" | DISCARD_PATH => OutputSink::Discard,
            _ => OutputSink::File(value.into()),
        }
    }
}

impl From<OutputSink> for String {
    fn from(sink: OutputSink) -> Self {
        match sink {
            OutputSink::Discard => DISCARD_PATH.to_string(),
            OutputSink::File(path) => path.display().to_string(),
        }
    }
}

/// Directory the job body runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WorkingDirectory {
    /// The directory from which the job was submitted, known to the job as `$PBS_O_WORKDIR`.
    SubmissionDirectory,
    Path(PathBuf),
}

impl WorkingDirectory {
    /// Returns the concrete directory for a launch on the current machine.
    pub fn resolve(&self) -> crate::Result<PathBuf> {
        self.resolve_with(|key| std::env::var_os(key))
    }

    pub(crate) fn resolve_with<F: Fn(&str) -> Option<OsString>>(
        &self,
        lookup: F,
    ) -> crate::Result<PathBuf> {
        match self {
            WorkingDirectory::Path(path) => Ok(path.clone()),
            WorkingDirectory::SubmissionDirectory => match lookup(PBS_SUBMIT_DIR_ENV) {
                Some(dir) if !dir.is_empty() => Ok(dir.into()),
                _ => {
                    log::debug!(
                        "{PBS_SUBMIT_DIR_ENV} is not set, using the current directory as the submission directory"
                    );
                    Ok(std::env::current_dir()?)
                }
            },
        }
    }
}

pub fn parse_working_directory(input: &str) -> anyhow::Result<WorkingDirectory> {
    match input {
        "" => anyhow::bail!("Working directory cannot be empty"),
        "$PBS_O_WORKDIR" | "${PBS_O_WORKDIR}" | "\"$PBS_O_WORKDIR\"" | SUBMIT_DIR_PLACEHOLDER => {
            Ok(WorkingDirectory::SubmissionDirectory)
        }
        path => Ok(WorkingDirectory::Path(path.into())),
    }
}

impl TryFrom<String> for WorkingDirectory {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_working_directory(&value)
    }
}

impl From<WorkingDirectory> for String {
    fn from(dir: WorkingDirectory) -> Self {
        match dir {
            WorkingDirectory::SubmissionDirectory => format!("${PBS_SUBMIT_DIR_ENV}"),
            WorkingDirectory::Path(path) => path.display().to_string(),
        }
    }
}

/// A setting that is kept in the job script but may be switched off.
/// A disabled setting is rendered as a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggle<T> {
    pub value: T,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl<T> Toggle<T> {
    pub fn enabled(value: T) -> Self {
        Self {
            value,
            enabled: true,
        }
    }

    pub fn disabled(value: T) -> Self {
        Self {
            value,
            enabled: false,
        }
    }
}

/// Complete description of a batch job: what the scheduler should reserve
/// and what should run inside the reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub account: Option<String>,
    pub resources: ResourceRequest,
    pub walltime: Walltime,
    /// Queue name, optionally with a server (`queue@server`).
    pub queue: String,
    pub stdout: Option<OutputSink>,
    pub stderr: Option<OutputSink>,
    pub rerunnable: Option<bool>,
    pub propagate_environment: bool,
    pub working_directory: Option<WorkingDirectory>,
    /// `ulimit -c` applied before the launch.
    pub core_dump_limit: Option<Toggle<u64>>,
    pub launcher: String,
    /// Number of ranks passed to the launcher. Never derived from `resources`.
    pub process_count: u32,
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// File receiving combined stdout and stderr of the launch.
    pub capture: Option<PathBuf>,
    pub pre_hooks: Vec<String>,
    pub post_hooks: Vec<String>,
}

impl JobSpec {
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return spec_error("Job name cannot be empty");
        }
        if let Some(c) = self
            .name
            .chars()
            .find(|c| c.is_whitespace() || matches!(c, '/' | ':' | '@'))
        {
            return spec_error(format!(
                "Job name `{}` contains an invalid character `{c}`",
                self.name
            ));
        }
        if let Some(account) = &self.account {
            if account.is_empty() || account.contains(char::is_whitespace) {
                return spec_error(format!("Invalid account `{account}`"));
            }
        }
        if self.queue.is_empty() || self.queue.contains(char::is_whitespace) {
            return spec_error(format!("Invalid queue `{}`", self.queue));
        }
        let walltime = self.walltime.duration();
        if walltime.as_secs() == 0 {
            return spec_error("Walltime must be a positive duration");
        }
        if walltime.subsec_nanos() != 0 {
            return spec_error(format!(
                "Walltime {walltime:?} is not a whole number of seconds"
            ));
        }
        self.resources.validate()?;
        if self.launcher.is_empty() {
            return spec_error("Launcher cannot be empty");
        }
        if self.command.first().is_none_or(|program| program.is_empty()) {
            return spec_error("Command cannot be empty");
        }
        if self.process_count == 0 {
            return spec_error("Process count must be at least 1");
        }
        if let Some(hook) = self
            .pre_hooks
            .iter()
            .chain(self.post_hooks.iter())
            .find(|hook| {
                hook.trim().is_empty() || hook.trim() != hook.as_str() || hook.contains('\n')
            })
        {
            return spec_error(format!("Invalid hook `{hook}`"));
        }
        check_hooks(self)?;

        let total_cores = self.resources.total_cores();
        if self.process_count as u64 > total_cores {
            log::warn!(
                "Job `{}` launches {} processes, but its resource request `{}` provides only {} cores",
                self.name,
                self.process_count,
                self.resources,
                total_cores
            );
        }
        Ok(())
    }

    /// Arguments passed to the launcher: `-np <count> <program> [args...]`.
    pub fn launcher_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.command.len() + 2);
        args.push("-np".to_string());
        args.push(self.process_count.to_string());
        args.extend(self.command.iter().cloned());
        args
    }
}
