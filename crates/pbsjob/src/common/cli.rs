use clap::Parser;
use clap_complete::Shell;

use crate::client::commands::inspect::InspectOpts;
use crate::client::commands::launch::LaunchOpts;
use crate::client::commands::render::RenderOpts;
use crate::client::commands::submit::SubmitOpts;

// Common CLI options
#[derive(Parser)]
pub struct CommonOpts {
    /// Enables more detailed log output
    #[arg(
        long,
        env = "PBSJOB_DEBUG",
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub debug: bool,
}

// Root CLI options
#[derive(Parser)]
#[command(
    name = "pbsjob",
    about = "Describe MPI jobs once, then render, submit or launch them",
    version(crate::PBSJOB_VERSION),
    disable_help_subcommand(true),
    help_expected(true)
)]
pub struct RootOptions {
    #[clap(flatten)]
    pub common: CommonOpts,

    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

#[allow(clippy::large_enum_variant)]
#[derive(Parser)]
pub enum SubCommand {
    /// Print the PBS submission script of a job
    Render(RenderOpts),
    /// Render a job and submit it with `qsub`
    Submit(SubmitOpts),
    /// Run a job on the current machine
    Launch(LaunchOpts),
    /// Parse an existing PBS script and print the job it describes
    Inspect(InspectOpts),
    /// Generate shell completion script
    GenerateCompletion(GenerateCompletionOpts),
}

#[derive(Parser)]
pub struct GenerateCompletionOpts {
    /// Shell flavour for which the completion script should be generated
    #[arg(value_enum)]
    pub shell: Shell,
}
