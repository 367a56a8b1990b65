use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use tokio::process::Command;

use crate::common::error::JobError;
use crate::job::JobSpec;
use crate::render::render_script;

pub const DEFAULT_QSUB: &str = "qsub";

/// Extension of submission scripts written by [`submit_job`].
const SCRIPT_EXTENSION: &str = "pbs";

/// Extension of the file that stores the id of a submitted job.
const JOBID_EXTENSION: &str = "jobid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Submit,
    /// Only write the script, do not contact the scheduler.
    DryRun,
}

#[derive(Debug)]
pub struct SubmissionResult {
    pub script_path: PathBuf,
    pub job_id: Option<String>,
}

/// Reads the job id from the standard output of `qsub`.
pub fn parse_qsub_output(output: &str) -> crate::Result<String> {
    match output.split_whitespace().next() {
        Some(id) => Ok(id.to_string()),
        None => Err(JobError::SubmissionRejected(
            "The scheduler did not return a job id".to_string(),
        )),
    }
}

fn script_path(spec: &JobSpec, directory: &Path) -> PathBuf {
    directory.join(format!("{}.{SCRIPT_EXTENSION}", spec.name))
}

/// Renders `spec` into `<directory>/<name>.pbs` and hands the script to `qsub`.
///
/// A non-zero exit of `qsub` is reported as [`JobError::SubmissionRejected`] with the
/// diagnostic the scheduler printed. The job id is also written to `<directory>/<name>.jobid`.
pub async fn submit_job(
    spec: &JobSpec,
    qsub: &str,
    directory: &Path,
    mode: SubmitMode,
) -> crate::Result<SubmissionResult> {
    let script = render_script(spec)?;

    std::fs::create_dir_all(directory)?;
    let script_path = script_path(spec, directory);
    std::fs::write(&script_path, script)?;
    log::debug!("Submission script written to {}", script_path.display());

    if mode == SubmitMode::DryRun {
        return Ok(SubmissionResult {
            script_path,
            job_id: None,
        });
    }

    log::debug!("Running command `{qsub} {}`", script_path.display());
    let output = Command::new(qsub)
        .arg(&script_path)
        .current_dir(directory)
        .output()
        .await
        .map_err(|error| JobError::CommandError {
            command: qsub.to_string(),
            message: error.to_string(),
        })?;

    if !output.status.success() {
        let stderr = output.stderr.to_str_lossy();
        let message = if stderr.trim().is_empty() {
            output.stdout.to_str_lossy().trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        log::debug!(
            "{qsub} exited with {}",
            crate::common::error::describe_exit_code(&output.status.code())
        );
        return Err(JobError::SubmissionRejected(message));
    }

    let stdout = output
        .stdout
        .to_str()
        .map_err(|e| JobError::GenericError(format!("Invalid UTF-8 {qsub} output: {e:?}")))?;
    let job_id = parse_qsub_output(stdout)?;
    std::fs::write(
        directory.join(format!("{}.{JOBID_EXTENSION}", spec.name)),
        &job_id,
    )?;
    log::info!("Job `{}` submitted as {job_id}", spec.name);

    Ok(SubmissionResult {
        script_path,
        job_id: Some(job_id),
    })
}
