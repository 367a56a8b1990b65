use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::job::JobSpec;
use crate::render::directives::parse_script;

#[derive(Parser)]
pub struct InspectOpts {
    /// Path to a PBS submission script
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub script: PathBuf,
}

pub fn inspect_script(opts: &InspectOpts) -> anyhow::Result<JobSpec> {
    let content = std::fs::read(&opts.script)
        .with_context(|| format!("Cannot read script {}", opts.script.display()))?;
    let spec = parse_script(&content)
        .with_context(|| format!("Cannot parse script {}", opts.script.display()))?;
    Ok(spec)
}

pub fn command_inspect(opts: InspectOpts) -> anyhow::Result<()> {
    let spec = inspect_script(&opts)?;
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}
