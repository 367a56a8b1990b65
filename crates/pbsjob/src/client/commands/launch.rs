use clap::Parser;

use crate::client::commands::job::JobSpecOpts;
use crate::launch::launch_job;

#[derive(Parser)]
pub struct LaunchOpts {
    #[clap(flatten)]
    pub job: JobSpecOpts,
}

pub async fn command_launch(opts: LaunchOpts) -> anyhow::Result<()> {
    let spec = opts.job.load_job_spec()?;
    launch_job(&spec).await?;
    Ok(())
}
