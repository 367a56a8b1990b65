use clap::Parser;

use crate::client::commands::job::JobSpecOpts;
use crate::render::{render_launch_command, render_script, render_submission_header};

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderPart {
    /// The complete submission script.
    #[default]
    Script,
    /// Only the `#PBS` directives.
    Header,
    /// Only the launch line.
    Launch,
}

#[derive(Parser)]
pub struct RenderOpts {
    /// Part of the script that should be printed
    #[arg(long, value_enum, default_value_t = RenderPart::Script)]
    pub part: RenderPart,

    #[clap(flatten)]
    pub job: JobSpecOpts,
}

pub fn render_output(opts: RenderOpts) -> anyhow::Result<String> {
    let spec = opts.job.load_job_spec()?;
    let output = match opts.part {
        RenderPart::Script => render_script(&spec)?,
        RenderPart::Header => render_submission_header(&spec)?,
        RenderPart::Launch => format!("{}\n", render_launch_command(&spec)?),
    };
    Ok(output)
}

pub fn command_render(opts: RenderOpts) -> anyhow::Result<()> {
    print!("{}", render_output(opts)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{RenderOpts, render_output};

    fn render(args: &[&str]) -> anyhow::Result<String> {
        let opts = RenderOpts::try_parse_from(std::iter::once("render").chain(args.iter().copied()))?;
        render_output(opts)
    }

    const RING_ARGS: [&str; 9] = [
        "--name",
        "Work08P",
        "--resources",
        "nodes=2:ppn=4",
        "--walltime",
        "20m",
        "--queue",
        "q64p48h@raptor",
        "ring",
    ];

    #[test]
    fn test_render_launch_part() {
        let mut args = vec!["--part", "launch"];
        args.extend(RING_ARGS);
        assert_eq!(render(&args).unwrap(), "mpirun -np 8 ring\n");
    }

    #[test]
    fn test_render_header_part() {
        let mut args = vec!["--part", "header"];
        args.extend(RING_ARGS);
        assert_eq!(
            render(&args).unwrap(),
            "#PBS -N Work08P\n#PBS -l nodes=2:ppn=4\n#PBS -l walltime=0:20:00\n#PBS -q q64p48h@raptor\n"
        );
    }

    #[test]
    fn test_render_script() {
        let script = render(&RING_ARGS).unwrap();
        assert!(script.starts_with("#!/bin/bash\n#PBS -N Work08P\n"));
        assert!(script.ends_with("\nmpirun -np 8 ring\n"));
    }

    #[test]
    fn test_render_without_queue() {
        assert!(render(&["--name", "x", "--resources", "nodes=1:ppn=1", "--walltime", "1m", "ring"]).is_err());
    }
}
