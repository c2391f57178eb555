//! Asynchronous execution of resume launches.
//!
//! Building context and launching an external tool can be slow, so it runs
//! on a dedicated worker thread behind a channel. Whoever created the
//! triggering comment gets its acknowledgment without waiting on the
//! launch, and every job's lifecycle (started, completed, failed) is
//! visible through structured log events keyed by task ID.

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::tools::ResumeInvocation;

/// A queued resume launch for a single task.
#[derive(Debug, Clone)]
pub struct ResumeJob {
    /// Task UUID, used as the log correlation key
    pub task_id: String,

    /// Task display reference, for human-facing log lines
    pub reference: String,

    /// The external command to launch
    pub invocation: ResumeInvocation,
}

/// How resume invocations are actually launched.
///
/// Production uses [`ProcessLauncher`]; tests inject a recording fake.
pub trait ResumeLauncher: Send + 'static {
    fn launch(&self, invocation: &ResumeInvocation) -> std::io::Result<()>;
}

/// Launches the resume command as a detached child process.
///
/// Fire-and-forget: stdio is nulled and the child is never waited on. The
/// worst failure mode past a successful spawn is a stray resumed session,
/// not a tracker inconsistency.
pub struct ProcessLauncher;

impl ResumeLauncher for ProcessLauncher {
    fn launch(&self, invocation: &ResumeInvocation) -> std::io::Result<()> {
        let working_dir: &Path = &invocation.working_dir;
        Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }
}

/// Channel-backed worker that performs resume launches off the caller's
/// path.
///
/// `submit` only enqueues; `shutdown` closes the queue, drains any
/// outstanding jobs, and joins the worker thread.
pub struct TriggerExecutor {
    tx: Option<mpsc::Sender<ResumeJob>>,
    worker: Option<JoinHandle<()>>,
}

impl TriggerExecutor {
    /// Spawn the worker thread with the given launcher.
    pub fn spawn<L: ResumeLauncher>(launcher: L) -> Self {
        let (tx, rx) = mpsc::channel::<ResumeJob>();

        let worker = thread::spawn(move || {
            while let Ok(job) = rx.recv() {
                run_job(&launcher, &job);
            }
        });

        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Spawn with the production process launcher.
    pub fn spawn_default() -> Self {
        Self::spawn(ProcessLauncher)
    }

    /// Enqueue a resume launch. Never blocks on the launch itself.
    pub fn submit(&self, job: ResumeJob) {
        if let Some(tx) = &self.tx {
            if tx.send(job).is_err() {
                tracing::error!("trigger executor queue closed; resume dropped");
            }
        }
    }

    /// Close the queue, drain outstanding jobs, and join the worker.
    pub fn shutdown(mut self) {
        self.drain();
    }

    fn drain(&mut self) {
        // Dropping the sender ends the worker's recv loop after the queue
        // empties.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("trigger executor worker panicked");
            }
        }
    }
}

impl Drop for TriggerExecutor {
    fn drop(&mut self) {
        self.drain();
    }
}

fn run_job<L: ResumeLauncher>(launcher: &L, job: &ResumeJob) {
    tracing::info!(
        task_id = %job.task_id,
        reference = %job.reference,
        program = %job.invocation.program,
        status = "started",
        "launching resume command"
    );

    match launcher.launch(&job.invocation) {
        Ok(()) => {
            tracing::info!(
                task_id = %job.task_id,
                status = "completed",
                "resume command launched"
            );
        }
        Err(e) => {
            // Never propagated: the task stays in_progress and a human or
            // the next agent turn is expected to notice.
            tracing::error!(
                task_id = %job.task_id,
                status = "failed",
                error = %e,
                "resume command launch failed"
            );
        }
    }
}

/// Recording launcher shared by unit tests across the crate.
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Launcher that records invocations instead of spawning processes.
    #[derive(Clone, Default)]
    pub struct RecordingLauncher {
        pub launched: Arc<Mutex<Vec<ResumeInvocation>>>,
        pub fail: bool,
    }

    impl ResumeLauncher for RecordingLauncher {
        fn launch(&self, invocation: &ResumeInvocation) -> std::io::Result<()> {
            if self.fail {
                return Err(std::io::Error::other("launch refused"));
            }
            self.launched.lock().unwrap().push(invocation.clone());
            Ok(())
        }
    }
}
