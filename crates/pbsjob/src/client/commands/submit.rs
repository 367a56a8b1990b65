use std::path::PathBuf;

use clap::Parser;

use crate::client::commands::job::JobSpecOpts;
use crate::common::utils::fs::absolute_path;
use crate::launch::submit::{DEFAULT_QSUB, SubmitMode, submit_job};

#[derive(Parser)]
pub struct SubmitOpts {
    /// Only write the submission script, do not call `qsub`
    #[arg(long)]
    pub dry_run: bool,

    /// Directory where the submission script is written
    #[arg(long, default_value = ".", value_hint = clap::ValueHint::DirPath)]
    pub script_dir: PathBuf,

    /// Program used to submit the script
    #[arg(long, default_value = DEFAULT_QSUB, env = "PBSJOB_QSUB")]
    pub qsub: String,

    #[clap(flatten)]
    pub job: JobSpecOpts,
}

pub async fn command_submit(opts: SubmitOpts) -> anyhow::Result<()> {
    let mode = if opts.dry_run {
        SubmitMode::DryRun
    } else {
        SubmitMode::Submit
    };
    let script_dir = absolute_path(opts.script_dir)?;
    let spec = opts.job.load_job_spec()?;
    let result = submit_job(&spec, &opts.qsub, &script_dir, mode).await?;
    match result.job_id {
        Some(job_id) => println!("{job_id}"),
        None => println!("{}", result.script_path.display()),
    }
    Ok(())
}
