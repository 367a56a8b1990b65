use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::job::{
    DEFAULT_LAUNCHER, JobSpec, OutputSink, ResourceRequest, Toggle, Walltime, WorkingDirectory,
};

static CWD_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that change or read the working directory of the test process.
pub fn cwd_lock() -> MutexGuard<'static, ()> {
    CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Writes an executable shell script into `dir`.
pub fn write_executable(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{content}\n")).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}

/// Two ranks of `project1` on a 36 core chunk of the debug queue.
pub fn debug_job_spec() -> JobSpec {
    JobSpec {
        name: "Debug02P".to_string(),
        account: Some("ERDCV00898NEW".to_string()),
        resources: ResourceRequest::Select {
            chunks: 1,
            ncpus: 36,
            mpiprocs: Some(2),
        },
        walltime: Walltime::from_secs(20),
        queue: "debug".to_string(),
        stdout: Some(OutputSink::Discard),
        stderr: Some(OutputSink::Discard),
        rerunnable: Some(false),
        propagate_environment: true,
        working_directory: Some(WorkingDirectory::Path("/p/home/dpa/project1".into())),
        core_dump_limit: Some(Toggle::disabled(0)),
        launcher: DEFAULT_LAUNCHER.to_string(),
        process_count: 2,
        command: vec![
            "./project1".to_string(),
            "./easy_sample.dat".to_string(),
            "./sol_easy.02".to_string(),
        ],
        capture: Some("./output/out.02p".into()),
        pre_hooks: vec![],
        post_hooks: vec![],
    }
}

/// Eight ranks of `ring` spread over two nodes with four processors each.
pub fn ring_job_spec() -> JobSpec {
    JobSpec {
        name: "Work08P".to_string(),
        account: None,
        resources: ResourceRequest::Nodes { nodes: 2, ppn: 4 },
        walltime: Walltime::from_secs(20 * 60),
        queue: "q64p48h@raptor".to_string(),
        stdout: Some(OutputSink::Discard),
        stderr: Some(OutputSink::Discard),
        rerunnable: Some(false),
        propagate_environment: true,
        working_directory: Some(WorkingDirectory::SubmissionDirectory),
        core_dump_limit: Some(Toggle::disabled(0)),
        launcher: DEFAULT_LAUNCHER.to_string(),
        process_count: 8,
        command: vec!["ring".to_string()],
        capture: Some("ring.out".into()),
        pre_hooks: vec![],
        post_hooks: vec![],
    }
}

/// A job with only the required fields filled in.
pub fn minimal_job_spec() -> JobSpec {
    JobSpec {
        name: "minimal".to_string(),
        account: None,
        resources: ResourceRequest::Nodes { nodes: 1, ppn: 1 },
        walltime: Walltime::from_secs(60),
        queue: "batch".to_string(),
        stdout: None,
        stderr: None,
        rerunnable: None,
        propagate_environment: false,
        working_directory: None,
        core_dump_limit: None,
        launcher: DEFAULT_LAUNCHER.to_string(),
        process_count: 1,
        command: vec!["hostname".to_string()],
        capture: None,
        pre_hooks: vec![],
        post_hooks: vec![],
    }
}
