use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use clap::builder::BoolishValueParser;

use crate::job::jobfile::JobDef;
use crate::job::resources::parse_resource_request;
use crate::job::{
    JobSpec, OutputSink, ResourceRequest, Toggle, Walltime, WorkingDirectory, parse_output_sink,
    parse_walltime, parse_working_directory,
};

/// Options shared by all commands that build a job.
#[derive(Parser)]
pub struct JobSpecOpts {
    /// Path to a TOML file with the job definition.
    /// Options given on the command line override values from the file
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub job_file: Option<PathBuf>,

    /// Name of the job
    #[arg(long)]
    name: Option<String>,

    /// Account that will be charged for the job
    #[arg(long)]
    account: Option<String>,

    /// Resource request, e.g. `select=1:ncpus=36:mpiprocs=2` or `nodes=2:ppn=4`
    #[arg(long, value_parser = parse_resource_request)]
    resources: Option<ResourceRequest>,

    /// Maximum run time of the job, e.g. `0:20:00` or `20m`
    #[arg(long, value_parser = parse_walltime)]
    walltime: Option<Walltime>,

    /// Scheduler queue, optionally with a server (`queue@server`)
    #[arg(long)]
    queue: Option<String>,

    /// Where the scheduler stores the standard output of the job.
    /// Use `none` to discard it
    #[arg(long, value_parser = parse_output_sink)]
    stdout: Option<OutputSink>,

    /// Where the scheduler stores the standard error of the job.
    /// Use `none` to discard it
    #[arg(long, value_parser = parse_output_sink)]
    stderr: Option<OutputSink>,

    /// Whether the scheduler may rerun the job after a failure
    #[arg(long, value_parser = BoolishValueParser::new())]
    rerunnable: Option<bool>,

    /// Export the environment of the submitting shell to the job.
    /// Use `--propagate-env=no` to turn it off for a job file that enables it
    #[arg(
        long,
        value_parser = BoolishValueParser::new(),
        num_args(0..=1),
        require_equals(true),
        default_missing_value("true")
    )]
    propagate_env: Option<bool>,

    /// Working directory of the job.
    /// `$PBS_O_WORKDIR` or `%{SUBMIT_DIR}` stand for the submission directory
    #[arg(long, value_parser = parse_working_directory)]
    workdir: Option<WorkingDirectory>,

    /// Core dump size limit set before the launch
    #[arg(long)]
    core_dump_limit: Option<u64>,

    /// Keep the core dump limit line in the script, but commented out
    #[arg(long)]
    disable_core_dump_limit: bool,

    /// Parallel launcher used to start the command [default: mpirun]
    #[arg(long)]
    launcher: Option<String>,

    /// Number of processes to launch [default: number of requested cores]
    #[arg(long = "np", short = 'n')]
    process_count: Option<u32>,

    /// File that receives the combined output of the launched command
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    capture: Option<PathBuf>,

    /// Shell command executed before the launch.
    /// You can pass this flag multiple times
    #[arg(long, action = clap::ArgAction::Append)]
    pre_hook: Vec<String>,

    /// Shell command executed after the launch.
    /// You can pass this flag multiple times
    #[arg(long, action = clap::ArgAction::Append)]
    post_hook: Vec<String>,

    /// Command that is started by the launcher
    #[arg(trailing_var_arg(true), allow_hyphen_values(true))]
    command: Vec<String>,
}

impl JobSpecOpts {
    /// Job definition made only of the values given on the command line.
    pub fn into_job_def(self) -> JobDef {
        let core_dump_limit = match (self.core_dump_limit, self.disable_core_dump_limit) {
            (limit, true) => Some(Toggle::disabled(limit.unwrap_or(0))),
            (Some(limit), false) => Some(Toggle::enabled(limit)),
            (None, false) => None,
        };
        JobDef {
            name: self.name,
            account: self.account,
            resources: self.resources,
            walltime: self.walltime,
            queue: self.queue,
            stdout: self.stdout,
            stderr: self.stderr,
            rerunnable: self.rerunnable,
            propagate_environment: self.propagate_env,
            working_directory: self.workdir,
            core_dump_limit,
            launcher: self.launcher,
            process_count: self.process_count,
            command: self.command,
            capture: self.capture,
            pre_hooks: self.pre_hook,
            post_hooks: self.post_hook,
        }
    }

    /// Combines the job file (if any) with the command line options into a validated job.
    pub fn load_job_spec(mut self) -> anyhow::Result<JobSpec> {
        let base = match self.job_file.take() {
            Some(path) => JobDef::load(&path)
                .with_context(|| format!("Cannot load job file {}", path.display()))?,
            None => JobDef::default(),
        };
        Ok(base.overlay(self.into_job_def()).into_job_spec()?)
    }
}
