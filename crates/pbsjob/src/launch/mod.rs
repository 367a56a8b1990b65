pub mod submit;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tokio::process::Command;

use crate::common::error::{JobError, describe_exit_code};
use crate::common::utils::fs::{absolute_path, resolve_path};
use crate::job::JobSpec;

/// Keeps the process inside a working directory and returns to the previous one when dropped.
pub struct WorkdirGuard {
    directory: PathBuf,
    previous: PathBuf,
}

impl WorkdirGuard {
    /// Relative directories are resolved against the current directory before entering them.
    pub fn enter(directory: PathBuf) -> crate::Result<Self> {
        let previous = std::env::current_dir()?;
        let directory = absolute_path(directory)?;
        std::env::set_current_dir(&directory).map_err(|error| {
            JobError::LaunchFailure(format!(
                "Cannot enter working directory {}: {error}",
                directory.display()
            ))
        })?;
        log::debug!("Entered working directory {}", directory.display());
        Ok(Self {
            directory,
            previous,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Drop for WorkdirGuard {
    fn drop(&mut self) {
        if let Err(error) = std::env::set_current_dir(&self.previous) {
            log::error!(
                "Cannot return to directory {}: {error}",
                self.previous.display()
            );
        }
    }
}

/// Enters the working directory of `spec`, if it has one.
pub fn change_to_working_directory(spec: &JobSpec) -> crate::Result<Option<WorkdirGuard>> {
    spec.working_directory
        .as_ref()
        .map(|dir| WorkdirGuard::enter(dir.resolve()?))
        .transpose()
}

fn check_hook_status(hook: &str, status: ExitStatus) -> crate::Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(JobError::HookFailure {
            hook: hook.to_string(),
            message: describe_exit_code(&status.code()),
        })
    }
}

async fn run_hook(hook: &str, workdir: &Path) -> crate::Result<()> {
    log::debug!("Running hook `{hook}`");
    let status = Command::new("bash")
        .arg("-c")
        .arg(hook)
        .current_dir(workdir)
        .status()
        .await
        .map_err(|error| JobError::HookFailure {
            hook: hook.to_string(),
            message: format!("cannot start hook: {error}"),
        })?;
    check_hook_status(hook, status)
}

/// Runs the pre-launch hooks in order. The first failure stops the job.
pub async fn run_pre_hooks(spec: &JobSpec, workdir: &Path) -> crate::Result<()> {
    for hook in &spec.pre_hooks {
        run_hook(hook, workdir).await?;
    }
    Ok(())
}

/// Runs all post-launch hooks, even if some of them fail, and returns the first failure.
pub async fn run_post_hooks(spec: &JobSpec, workdir: &Path) -> crate::Result<()> {
    let mut result = Ok(());
    for hook in &spec.post_hooks {
        if let Err(error) = run_hook(hook, workdir).await {
            log::error!("{error}");
            if result.is_ok() {
                result = Err(error);
            }
        }
    }
    result
}

async fn run_launcher(spec: &JobSpec, workdir: &Path) -> crate::Result<ExitStatus> {
    let launcher = which::which(&spec.launcher).map_err(|error| {
        JobError::LaunchFailure(format!("Cannot find launcher `{}`: {error}", spec.launcher))
    })?;

    let mut command = match &spec.core_dump_limit {
        Some(limit) if limit.enabled => {
            log::debug!("Limiting core dumps of the launch to {}", limit.value);
            let mut command = Command::new("bash");
            command
                .arg("-c")
                .arg(r#"ulimit -c "$1" && shift && exec "$@""#)
                .arg("pbsjob")
                .arg(limit.value.to_string())
                .arg(&launcher);
            command
        }
        _ => Command::new(&launcher),
    };
    command.args(spec.launcher_args()).current_dir(workdir);
    if let Some(capture) = &spec.capture {
        let path = resolve_path(workdir, capture);
        let file = File::create(&path).map_err(|error| {
            JobError::LaunchFailure(format!(
                "Cannot create output file {}: {error}",
                path.display()
            ))
        })?;
        command.stdout(file.try_clone()?);
        command.stderr(file);
    }

    log::info!(
        "Launching {} with {} {}",
        launcher.display(),
        spec.process_count,
        if spec.process_count == 1 { "process" } else { "processes" }
    );
    command.status().await.map_err(|error| {
        JobError::LaunchFailure(format!("Cannot start `{}`: {error}", launcher.display()))
    })
}

/// Runs the job on the current machine: enters its working directory, runs the
/// pre-launch hooks, the launcher and the post-launch hooks, and restores the
/// original working directory afterwards.
pub async fn launch_job(spec: &JobSpec) -> crate::Result<()> {
    spec.validate()?;

    let guard = change_to_working_directory(spec)?;
    let workdir = match &guard {
        Some(guard) => guard.directory().to_path_buf(),
        None => std::env::current_dir()?,
    };

    run_pre_hooks(spec, &workdir).await?;
    let status = run_launcher(spec, &workdir).await;
    let post_hooks = run_post_hooks(spec, &workdir).await;
    drop(guard);

    let status = status?;
    if !status.success() {
        return Err(JobError::ApplicationFailure {
            code: status.code(),
        });
    }
    post_hooks?;
    log::info!("Job `{}` has finished", spec.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{WorkdirGuard, change_to_working_directory, launch_job};
    use crate::common::error::JobError;
    use crate::job::{JobSpec, Toggle, WorkingDirectory};
    use crate::tests::utils::{cwd_lock, minimal_job_spec, write_executable};
    use std::path::Path;

    /// A launcher that records its arguments into `order.log`.
    fn recording_spec(dir: &Path) -> JobSpec {
        let launcher = write_executable(dir, "fake-mpirun", r#"echo "launch $*" >> order.log"#);
        let mut spec = minimal_job_spec();
        spec.launcher = launcher.display().to_string();
        spec.working_directory = Some(WorkingDirectory::Path(dir.to_path_buf()));
        spec.process_count = 8;
        spec.command = vec!["ring".to_string()];
        spec
    }

    fn read_log(dir: &Path) -> String {
        std::fs::read_to_string(dir.join("order.log")).unwrap()
    }

    #[test]
    fn test_workdir_guard_restores_directory() {
        let _lock = cwd_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let original = std::env::current_dir().unwrap();
        {
            let guard = WorkdirGuard::enter(dir.path().to_path_buf()).unwrap();
            assert_eq!(
                std::env::current_dir().unwrap().canonicalize().unwrap(),
                guard.directory().canonicalize().unwrap()
            );
        }
        assert_eq!(std::env::current_dir().unwrap(), original);
    }

    #[test]
    fn test_missing_working_directory() {
        let _lock = cwd_lock();
        let mut spec = minimal_job_spec();
        spec.working_directory = Some(WorkingDirectory::Path("/nonexistent/pbsjob".into()));
        assert!(matches!(
            change_to_working_directory(&spec),
            Err(JobError::LaunchFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_launch_runs_hooks_in_order() {
        let _lock = cwd_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let mut spec = recording_spec(dir.path());
        spec.pre_hooks = vec!["echo lamboot >> order.log".to_string()];
        spec.post_hooks = vec!["echo lamhalt >> order.log".to_string()];

        let original = std::env::current_dir().unwrap();
        launch_job(&spec).await.unwrap();
        assert_eq!(std::env::current_dir().unwrap(), original);
        assert_eq!(read_log(dir.path()), "lamboot\nlaunch -np 8 ring\nlamhalt\n");
    }

    #[tokio::test]
    async fn test_launch_in_relative_working_directory() {
        let _lock = cwd_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let mut spec = recording_spec(dir.path());
        spec.working_directory = Some(WorkingDirectory::Path("sub".into()));
        spec.capture = Some("out.log".into());
        spec.pre_hooks = vec!["echo lamboot >> order.log".to_string()];

        let original = std::env::current_dir().unwrap();
        {
            let _guard = WorkdirGuard::enter(dir.path().to_path_buf()).unwrap();
            launch_job(&spec).await.unwrap();
        }
        assert_eq!(std::env::current_dir().unwrap(), original);
        assert_eq!(read_log(&sub), "lamboot\nlaunch -np 8 ring\n");
        assert!(sub.join("out.log").exists());
        assert!(!sub.join("sub").exists());
    }

    #[tokio::test]
    async fn test_launch_applies_core_dump_limit() {
        let _lock = cwd_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let launcher = write_executable(
            dir.path(),
            "fake-mpirun",
            r#"ulimit -c > limit.txt; echo "$*" >> limit.txt"#,
        );
        let mut spec = minimal_job_spec();
        spec.launcher = launcher.display().to_string();
        spec.working_directory = Some(WorkingDirectory::Path(dir.path().to_path_buf()));
        spec.core_dump_limit = Some(Toggle::enabled(0));

        launch_job(&spec).await.unwrap();
        let output = std::fs::read_to_string(dir.path().join("limit.txt")).unwrap();
        assert_eq!(output, "0\n-np 1 hostname\n");
    }

    #[tokio::test]
    async fn test_launch_captures_output() {
        let _lock = cwd_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let launcher = write_executable(dir.path(), "fake-mpirun", "echo \"ranks $2\"; echo oops >&2");
        let mut spec = minimal_job_spec();
        spec.launcher = launcher.display().to_string();
        spec.working_directory = Some(WorkingDirectory::Path(dir.path().to_path_buf()));
        spec.process_count = 2;
        spec.capture = Some("out.02p".into());

        launch_job(&spec).await.unwrap();
        let output = std::fs::read_to_string(dir.path().join("out.02p")).unwrap();
        assert_eq!(output, "ranks 2\noops\n");
    }

    #[tokio::test]
    async fn test_failing_pre_hook_stops_launch() {
        let _lock = cwd_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let mut spec = recording_spec(dir.path());
        spec.pre_hooks = vec!["exit 3".to_string()];
        spec.post_hooks = vec!["echo lamhalt >> order.log".to_string()];

        match launch_job(&spec).await {
            Err(JobError::HookFailure { hook, message }) => {
                assert_eq!(hook, "exit 3");
                assert_eq!(message, "exit code 3");
            }
            result => panic!("Unexpected result {result:?}"),
        }
        assert!(!dir.path().join("order.log").exists());
    }

    #[tokio::test]
    async fn test_application_failure_still_runs_post_hooks() {
        let _lock = cwd_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let launcher = write_executable(dir.path(), "fake-mpirun", "exit 5");
        let mut spec = minimal_job_spec();
        spec.launcher = launcher.display().to_string();
        spec.working_directory = Some(WorkingDirectory::Path(dir.path().to_path_buf()));
        spec.post_hooks = vec!["echo lamhalt >> order.log".to_string()];

        assert!(matches!(
            launch_job(&spec).await,
            Err(JobError::ApplicationFailure { code: Some(5) })
        ));
        assert_eq!(read_log(dir.path()), "lamhalt\n");
    }

    #[tokio::test]
    async fn test_failing_post_hooks_all_run() {
        let _lock = cwd_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let mut spec = recording_spec(dir.path());
        spec.post_hooks = vec![
            "exit 1".to_string(),
            "echo lamhalt >> order.log".to_string(),
        ];

        assert!(matches!(
            launch_job(&spec).await,
            Err(JobError::HookFailure { .. })
        ));
        assert_eq!(read_log(dir.path()), "launch -np 8 ring\nlamhalt\n");
    }

    #[tokio::test]
    async fn test_missing_launcher() {
        let _lock = cwd_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let mut spec = minimal_job_spec();
        spec.launcher = "pbsjob-missing-launcher".to_string();
        spec.working_directory = Some(WorkingDirectory::Path(dir.path().to_path_buf()));

        assert!(matches!(
            launch_job(&spec).await,
            Err(JobError::LaunchFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_spec_is_not_launched() {
        let mut spec = minimal_job_spec();
        spec.command = vec![];
        assert!(matches!(
            launch_job(&spec).await,
            Err(JobError::Specification(_))
        ));
    }
}
