use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::error::JobError;
use crate::job::{
    DEFAULT_LAUNCHER, JobSpec, OutputSink, ResourceRequest, Toggle, Walltime, WorkingDirectory,
};

/// Partial job definition, read from a TOML job file or assembled from command line flags.
///
/// ```toml
/// name = "Work04P"
/// resources = "nodes=1:ppn=4"
/// walltime = "0:20:00"
/// queue = "q64p48h@raptor"
/// command = ["project1", "hard_sample.dat", "sol_hard.04"]
/// pre_hooks = ["lamboot"]
/// post_hooks = ["lamhalt"]
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDef {
    pub name: Option<String>,
    pub account: Option<String>,
    pub resources: Option<ResourceRequest>,
    pub walltime: Option<Walltime>,
    pub queue: Option<String>,
    pub stdout: Option<OutputSink>,
    pub stderr: Option<OutputSink>,
    pub rerunnable: Option<bool>,
    pub propagate_environment: Option<bool>,
    pub working_directory: Option<WorkingDirectory>,
    pub core_dump_limit: Option<Toggle<u64>>,
    pub launcher: Option<String>,
    pub process_count: Option<u32>,
    #[serde(default)]
    pub command: Vec<String>,
    pub capture: Option<PathBuf>,
    #[serde(default)]
    pub pre_hooks: Vec<String>,
    #[serde(default)]
    pub post_hooks: Vec<String>,
}

impl JobDef {
    pub fn load(path: &Path) -> crate::Result<Self> {
        log::debug!("Loading job definition from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Returns a definition in which every value set in `other` replaces the one in `self`.
    pub fn overlay(self, other: JobDef) -> JobDef {
        fn pick<T>(base: Option<T>, other: Option<T>) -> Option<T> {
            other.or(base)
        }
        fn pick_list(base: Vec<String>, other: Vec<String>) -> Vec<String> {
            if other.is_empty() { base } else { other }
        }

        JobDef {
            name: pick(self.name, other.name),
            account: pick(self.account, other.account),
            resources: pick(self.resources, other.resources),
            walltime: pick(self.walltime, other.walltime),
            queue: pick(self.queue, other.queue),
            stdout: pick(self.stdout, other.stdout),
            stderr: pick(self.stderr, other.stderr),
            rerunnable: pick(self.rerunnable, other.rerunnable),
            propagate_environment: pick(self.propagate_environment, other.propagate_environment),
            working_directory: pick(self.working_directory, other.working_directory),
            core_dump_limit: pick(self.core_dump_limit, other.core_dump_limit),
            launcher: pick(self.launcher, other.launcher),
            process_count: pick(self.process_count, other.process_count),
            command: pick_list(self.command, other.command),
            capture: pick(self.capture, other.capture),
            pre_hooks: pick_list(self.pre_hooks, other.pre_hooks),
            post_hooks: pick_list(self.post_hooks, other.post_hooks),
        }
    }

    /// Builds a validated job. The process count defaults to the number of requested cores.
    pub fn into_job_spec(self) -> crate::Result<JobSpec> {
        let missing = |field: &str| JobError::Specification(format!("Missing required field `{field}`"));

        let resources = self.resources.ok_or_else(|| missing("resources"))?;
        let process_count = match self.process_count {
            Some(count) => count,
            None => u32::try_from(resources.total_cores()).map_err(|_| {
                JobError::Specification(format!(
                    "Resource request `{resources}` is too large to derive a process count"
                ))
            })?,
        };

        let spec = JobSpec {
            name: self.name.ok_or_else(|| missing("name"))?,
            account: self.account,
            resources,
            walltime: self.walltime.ok_or_else(|| missing("walltime"))?,
            queue: self.queue.ok_or_else(|| missing("queue"))?,
            stdout: self.stdout,
            stderr: self.stderr,
            rerunnable: self.rerunnable,
            propagate_environment: self.propagate_environment.unwrap_or(false),
            working_directory: self.working_directory,
            core_dump_limit: self.core_dump_limit,
            launcher: self
                .launcher
                .unwrap_or_else(|| DEFAULT_LAUNCHER.to_string()),
            process_count,
            command: self.command,
            capture: self.capture,
            pre_hooks: self.pre_hooks,
            post_hooks: self.post_hooks,
        };
        spec.validate()?;
        Ok(spec)
    }
}
