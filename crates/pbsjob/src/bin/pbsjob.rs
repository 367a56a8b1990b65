use std::io;

use clap::{CommandFactory, FromArgMatches};
use clap_complete::generate;

use pbsjob::client::commands::inspect::command_inspect;
use pbsjob::client::commands::launch::command_launch;
use pbsjob::client::commands::render::command_render;
use pbsjob::client::commands::submit::command_submit;
use pbsjob::common::cli::{GenerateCompletionOpts, RootOptions, SubCommand};
use pbsjob::common::error::JobError;
use pbsjob::common::setup::setup_logging;

fn generate_completion(opts: GenerateCompletionOpts) -> anyhow::Result<()> {
    let generator = opts.shell;

    let mut app = RootOptions::command();
    eprintln!("Generating completion file for {generator}...");
    generate(generator, &mut app, "pbsjob".to_string(), &mut io::stdout());
    Ok(())
}

/// The launched application decides the exit code of `pbsjob launch`.
fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<JobError>()
        .map(JobError::exit_code)
        .unwrap_or(1)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let matches = RootOptions::command().get_matches();
    let top_opts = match RootOptions::from_arg_matches(&matches) {
        Ok(opts) => opts,
        Err(error) => error.exit(),
    };

    setup_logging(top_opts.common.debug);

    let result = match top_opts.subcmd {
        SubCommand::Render(opts) => command_render(opts),
        SubCommand::Submit(opts) => command_submit(opts).await,
        SubCommand::Launch(opts) => command_launch(opts).await,
        SubCommand::Inspect(opts) => command_inspect(opts),
        SubCommand::GenerateCompletion(opts) => generate_completion(opts),
    };

    if let Err(error) = result {
        log::error!("{error:#}");
        std::process::exit(exit_code(&error));
    }
}
