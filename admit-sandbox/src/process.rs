//! Local [`ProcessRunner`] built on tokio processes and raw `libc` calls.
//!
//! Each child gets its own process group so a timeout can kill everything
//! it spawned. Stdout and stderr share one pipe, which keeps their relative
//! order. Confinement runs in the forked child before `exec`: chroot, chdir,
//! drop supplementary groups, setgid, setuid. If any step fails the child
//! never execs and the spawn reports the error.

use std::ffi::CString;
use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tokio::process::Command;

use crate::runner::{CommandSpec, ExitState, ProcessOutput, ProcessRunner};
use crate::SandboxError;

/// How long to keep draining the pipe after the group has been killed.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Read size when draining the output pipe.
const CHUNK_BYTES: usize = 8 * 1024;

/// Runs processes directly on the host.
///
/// # Cancel Safety
/// Dropping the future from [`ProcessRunner::run`] kills the whole process
/// group, not just the direct child.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProcessRunner;

impl LocalProcessRunner {
    /// Create a local runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for LocalProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, SandboxError> {
        let spawn_failed = |source: io::Error| SandboxError::SpawnFailed {
            program: spec.program.clone(),
            source,
        };

        let (reader, writer) = io::pipe().map_err(spawn_failed)?;
        let mut receiver =
            pipe::Receiver::from_owned_fd(OwnedFd::from(reader)).map_err(spawn_failed)?;
        let hooks = ChildHooks::prepare(spec).map_err(spawn_failed)?;

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(writer.try_clone().map_err(spawn_failed)?)
            .stderr(writer)
            .process_group(0)
            .kill_on_drop(true);
        if spec.clear_env {
            cmd.env_clear();
        }
        if spec.confinement.is_none() {
            if let Some(dir) = &spec.working_dir {
                cmd.current_dir(dir);
            }
        }
        // SAFETY: the hook only makes async-signal-safe libc calls on data
        // allocated before the fork.
        unsafe {
            cmd.pre_exec(move || hooks.apply());
        }

        tracing::debug!(
            program = %spec.program.display(),
            confined = spec.confinement.is_some(),
            "spawning process"
        );

        let started = Instant::now();
        let spawned = cmd.spawn();
        // Our copies of the pipe's write end live in `cmd`; EOF needs them gone.
        drop(cmd);
        let mut child = spawned.map_err(spawn_failed)?;
        let mut group = GroupGuard::new(child.id());

        let mut output = Capture::new(spec.max_output_bytes);
        let bounded = tokio::time::timeout(spec.wall_timeout, async {
            tokio::join!(drain(&mut receiver, &mut output), child.wait())
        })
        .await;

        let exit = match bounded {
            Ok((read, status)) => {
                // EOF plus a reaped leader: nothing is left holding the pipe,
                // and the pgid may already belong to someone else.
                group.disarm();
                if let Err(e) = read {
                    tracing::warn!(
                        program = %spec.program.display(),
                        error = %e,
                        "output capture failed"
                    );
                }
                exit_state(status?)
            }
            Err(_) => {
                // Either the leader is unreaped or a member still holds the
                // pipe, so the group exists and the pgid is still ours.
                group.kill();
                child.wait().await?;
                let _ = tokio::time::timeout(DRAIN_GRACE, drain(&mut receiver, &mut output)).await;
                ExitState::TimedOut
            }
        };
        let elapsed = started.elapsed();
        let Capture {
            bytes: combined,
            truncated,
            ..
        } = output;

        tracing::info!(
            program = %spec.program.display(),
            exit = ?exit,
            elapsed_ms = elapsed.as_millis(),
            bytes = combined.len(),
            truncated,
            "process finished"
        );

        Ok(ProcessOutput {
            combined,
            exit,
            elapsed,
            truncated,
        })
    }
}

/// Output kept from the pipe, at most `cap` bytes.
#[derive(Debug)]
struct Capture {
    bytes: Vec<u8>,
    cap: usize,
    truncated: bool,
}

impl Capture {
    fn new(cap: usize) -> Self {
        Self {
            bytes: Vec::new(),
            cap,
            truncated: false,
        }
    }

    /// Keep what fits under the cap and count the rest as truncated.
    fn push(&mut self, chunk: &[u8]) {
        let room = self.cap.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.truncated = true;
        }
        self.bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }
}

/// Read until EOF. Bytes past the cap are read and discarded so the writer
/// never blocks on a full pipe.
///
/// Cancel safe: everything read before cancellation is already in `out`.
async fn drain(receiver: &mut pipe::Receiver, out: &mut Capture) -> io::Result<()> {
    let mut chunk = [0u8; CHUNK_BYTES];
    loop {
        let n = receiver.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        out.push(&chunk[..n]);
    }
}

/// Kills the child's process group on drop unless disarmed.
///
/// Armed from spawn until the group leader has been reaped on the normal
/// path, so a cancelled `run` takes grandchildren down with it.
#[derive(Debug)]
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    fn kill(&mut self) {
        kill_group(self.pgid.take());
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

fn exit_state(status: ExitStatus) -> ExitState {
    match (status.code(), status.signal()) {
        (Some(code), _) => ExitState::Exited(code),
        (None, Some(signal)) => ExitState::Signaled(signal),
        (None, None) => ExitState::Exited(-1),
    }
}

/// SIGKILL the whole process group led by `pid`.
fn kill_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: killpg has no memory-safety preconditions.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(pgid, error = %err, "failed to kill process group");
        }
    }
}

/// Everything the forked child needs, allocated before `fork`.
struct ChildHooks {
    jail: Option<Jail>,
    cpu_limit: Option<libc::rlim_t>,
}

struct Jail {
    root: CString,
    uid: libc::uid_t,
    gid: libc::gid_t,
}

impl ChildHooks {
    fn prepare(spec: &CommandSpec) -> io::Result<Self> {
        let jail = match &spec.confinement {
            Some(c) => Some(Jail {
                root: CString::new(c.root.as_os_str().as_bytes())?,
                uid: c.uid,
                gid: c.gid,
            }),
            None => None,
        };
        let cpu_limit = spec
            .cpu_limit_secs
            .map(|secs| libc::rlim_t::try_from(secs).unwrap_or(libc::rlim_t::MAX));
        Ok(Self { jail, cpu_limit })
    }

    /// Runs in the child between `fork` and `exec`.
    fn apply(&self) -> io::Result<()> {
        // SAFETY: plain syscalls on valid, NUL-terminated or stack data.
        unsafe {
            let no_core = libc::rlimit { rlim_cur: 0, rlim_max: 0 };
            check(libc::setrlimit(libc::RLIMIT_CORE, &no_core))?;

            if let Some(secs) = self.cpu_limit {
                let cpu = libc::rlimit { rlim_cur: secs, rlim_max: secs };
                check(libc::setrlimit(libc::RLIMIT_CPU, &cpu))?;
            }

            if let Some(jail) = &self.jail {
                check(libc::chroot(jail.root.as_ptr()))?;
                check(libc::chdir(c"/".as_ptr()))?;
                check(libc::setgroups(0, std::ptr::null()))?;
                check(libc::setgid(jail.gid))?;
                check(libc::setuid(jail.uid))?;
            }
        }
        Ok(())
    }
}

fn check(rc: libc::c_int) -> io::Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> CommandSpec {
        CommandSpec::new("/bin/sh", timeout).arg("-c").arg(script)
    }

    async fn run(spec: CommandSpec) -> ProcessOutput {
        match LocalProcessRunner::new().run(&spec).await {
            Ok(out) => out,
            Err(e) => panic!("run failed: {e}"),
        }
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr_in_order() {
        let out = run(sh("echo one; echo two >&2; echo three", Duration::from_secs(5))).await;
        assert_eq!(out.exit, ExitState::Exited(0));
        assert_eq!(out.combined, b"one\ntwo\nthree\n");
        assert!(!out.truncated);
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_not_raised() {
        let out = run(sh("echo boom; exit 3", Duration::from_secs(5))).await;
        assert_eq!(out.exit, ExitState::Exited(3));
        assert_eq!(out.combined, b"boom\n");
    }

    #[tokio::test]
    async fn timeout_kills_whole_group_within_margin() {
        let started = Instant::now();
        let script = "echo started; sleep 30 & sleep 30; echo never";
        let out = run(sh(script, Duration::from_millis(300))).await;
        assert_eq!(out.exit, ExitState::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
        assert_eq!(out.combined, b"started\n", "output before the kill is kept");
    }

    #[tokio::test]
    async fn output_is_capped() {
        let spec = sh("printf 'abcdefghij'", Duration::from_secs(5)).max_output(4);
        let out = run(spec).await;
        assert_eq!(out.combined, b"abcd");
        assert!(out.truncated);
    }

    #[tokio::test]
    async fn output_past_the_cap_is_drained_not_blocked() {
        let script = "head -c 200000 /dev/zero; echo done >&2";
        let spec = sh(script, Duration::from_secs(5)).max_output(1024);
        let out = run(spec).await;
        assert_eq!(out.exit, ExitState::Exited(0));
        assert!(out.truncated);
        assert_eq!(out.combined.len(), 1024);
        assert!(out.elapsed < Duration::from_secs(2), "took {:?}", out.elapsed);
    }

    #[tokio::test]
    async fn dropping_the_run_kills_grandchildren() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("failed to create tempdir: {e}"),
        };
        let marker = dir.path().join("marker");
        let script = format!("(sleep 1; touch '{}') & sleep 30", marker.display());
        let spec = sh(&script, Duration::from_secs(30));

        let runner = LocalProcessRunner::new();
        let cut = tokio::time::timeout(Duration::from_millis(200), runner.run(&spec)).await;
        assert!(cut.is_err(), "run should still be pending");

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "background child outlived the cancelled run");
    }

    #[test]
    fn capture_keeps_prefix_and_flags_overflow() {
        let mut capture = Capture::new(5);
        capture.push(b"abc");
        assert!(!capture.truncated);
        capture.push(b"defg");
        capture.push(b"hij");
        assert_eq!(capture.bytes, b"abcde");
        assert!(capture.truncated);

        let mut exact = Capture::new(3);
        exact.push(b"abc");
        assert!(!exact.truncated);
    }

    #[tokio::test]
    async fn signal_death_is_distinguished_from_timeout() {
        let out = run(sh("kill -9 $$", Duration::from_secs(5))).await;
        assert_eq!(out.exit, ExitState::Signaled(libc::SIGKILL));
    }

    #[tokio::test]
    async fn cleared_environment_is_empty() {
        let mut spec = sh("echo \"home=$HOME user=$USER\"", Duration::from_secs(5));
        spec.clear_env = true;
        let out = run(spec).await;
        assert_eq!(out.combined, b"home= user=\n");
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let spec = CommandSpec::new("/nonexistent/program", Duration::from_secs(1));
        let result = LocalProcessRunner::new().run(&spec).await;
        assert!(matches!(result, Err(SandboxError::SpawnFailed { .. })));
    }
}
