//! Rendering of jobs into PBS submission scripts.
//!
//! A rendered script consists of a header with one `#PBS` directive per populated field,
//! followed by a body that enters the working directory, runs the pre-launch hooks,
//! launches the parallel program and finally runs the post-launch hooks.

pub mod directives;
pub mod shell;

use crate::job::{JobSpec, PBS_SUBMIT_DIR_ENV, Toggle, WorkingDirectory};
use crate::render::directives::job_directives;
use crate::render::shell::{join, quote};

pub const SHEBANG: &str = "#!/bin/bash";

/// Renders the block of scheduler directives of `spec`.
pub fn render_submission_header(spec: &JobSpec) -> crate::Result<String> {
    spec.validate()?;
    let mut header = String::new();
    for directive in job_directives(spec) {
        header.push_str(&directive.to_string());
        header.push('\n');
    }
    Ok(header)
}

/// Renders the line that starts `spec.process_count` ranks of the job command.
pub fn render_launch_command(spec: &JobSpec) -> crate::Result<String> {
    spec.validate()?;
    Ok(launch_line(spec))
}

fn launch_line(spec: &JobSpec) -> String {
    let mut words = Vec::with_capacity(spec.command.len() + 3);
    words.push(spec.launcher.clone());
    words.extend(spec.launcher_args());
    join(&words)
}

fn working_directory_line(dir: &WorkingDirectory) -> String {
    match dir {
        WorkingDirectory::SubmissionDirectory => format!("cd ${PBS_SUBMIT_DIR_ENV}"),
        WorkingDirectory::Path(path) => format!("cd {}", quote(&path.display().to_string())),
    }
}

fn core_dump_line(limit: &Toggle<u64>) -> String {
    let line = format!("ulimit -c {}", limit.value);
    if limit.enabled { line } else { format!("#{line}") }
}

/// Renders the complete submission script of `spec`.
pub fn render_script(spec: &JobSpec) -> crate::Result<String> {
    let mut script = format!("{SHEBANG}\n");
    script.push_str(&render_submission_header(spec)?);
    script.push('\n');

    let mut body = Vec::new();
    if let Some(dir) = &spec.working_directory {
        body.push(working_directory_line(dir));
    }
    if let Some(limit) = &spec.core_dump_limit {
        body.push(core_dump_line(limit));
    }
    body.extend(spec.pre_hooks.iter().cloned());

    let mut launch = launch_line(spec);
    if let Some(capture) = &spec.capture {
        launch.push_str(" >& ");
        launch.push_str(&quote(&capture.display().to_string()));
    }
    body.push(launch);
    body.extend(spec.post_hooks.iter().cloned());

    for line in body {
        script.push_str(&line);
        script.push('\n');
    }
    Ok(script)
}
