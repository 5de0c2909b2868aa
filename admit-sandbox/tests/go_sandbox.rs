//! Integration tests: real `go build` plus a confined run.
//!
//! These tests need the Go toolchain on `PATH` and root (for chroot and the
//! uid switch). Run with: `sudo -E cargo test --test go_sandbox -- --ignored`

use std::path::Path;
use std::time::{Duration, Instant};

use admit_sandbox::{BuildPipeline, ExitState, LocalProcessRunner, ProgramOutcome, SandboxConfig};

struct Sandbox {
    _root: tempfile::TempDir,
    config: SandboxConfig,
}

fn sandbox() -> Sandbox {
    let root = tempfile::tempdir().expect("tempdir");
    let uploads = root.path().join("uploads");
    let jail = root.path().join("jail");
    let builds = jail.join("builds");
    std::fs::create_dir_all(&uploads).expect("mkdir uploads");
    std::fs::create_dir_all(&builds).expect("mkdir builds");
    // The jail user must be able to traverse into the build directory.
    for dir in [root.path(), jail.as_path(), builds.as_path()] {
        std::process::Command::new("chmod").arg("755").arg(dir).status().expect("chmod");
    }
    provision_loader(&jail);
    Sandbox {
        _root: root,
        config: SandboxConfig::new(uploads, jail, builds),
    }
}

/// PIE Go binaries name an ELF interpreter; give the jail a copy of it.
fn provision_loader(jail: &Path) {
    for loader in ["/lib64/ld-linux-x86-64.so.2", "/lib/ld-linux-aarch64.so.1"] {
        let host = Path::new(loader);
        if let Ok(resolved) = std::fs::canonicalize(host) {
            let target = jail.join(loader.trim_start_matches('/'));
            let dir = target.parent().expect("loader has a parent");
            std::fs::create_dir_all(dir).expect("mkdir lib");
            std::fs::copy(resolved, &target).expect("copy loader");
        }
    }
}

fn empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).expect("read_dir").next().is_none()
}

#[tokio::test]
#[ignore = "requires the Go toolchain and root"]
async fn hello_world_runs_inside_the_jail() {
    let sb = sandbox();
    let pipeline =
        BuildPipeline::new(LocalProcessRunner::new(), sb.config.clone()).expect("config");

    let src = b"package main\nfunc main() { println(\"hello from the jail\") }\n";
    let report = pipeline.execute(src).await.expect("pipeline");

    match report.outcome {
        ProgramOutcome::Ran(out) => {
            assert_eq!(out.exit, ExitState::Exited(0));
            // println writes to stderr; combined capture must include it.
            assert_eq!(String::from_utf8_lossy(&out.combined), "hello from the jail\n");
        }
        other => panic!("expected Ran, got {other:?}"),
    }
    assert!(empty(&sb.config.upload_dir));
    assert!(empty(&sb.config.build_dir));
}

#[tokio::test]
#[ignore = "requires the Go toolchain and root"]
async fn infinite_loop_is_killed_by_run_timeout() {
    let sb = sandbox();
    let pipeline =
        BuildPipeline::new(LocalProcessRunner::new(), sb.config.clone()).expect("config");

    let src = b"package main\nfunc main() { println(\"spinning\"); for {} }\n";
    let started = Instant::now();
    let report = pipeline.execute(src).await.expect("pipeline");
    let build_and_run = started.elapsed();

    match report.outcome {
        ProgramOutcome::Ran(out) => {
            assert!(
                matches!(out.exit, ExitState::TimedOut | ExitState::Signaled(_)),
                "loop must be killed, got {:?}",
                out.exit
            );
            assert!(out.elapsed < Duration::from_secs(3), "run took {:?}", out.elapsed);
        }
        other => panic!("expected Ran, got {other:?}"),
    }
    assert!(build_and_run < Duration::from_secs(10));
    assert!(empty(&sb.config.build_dir), "killed run must not leave its artifact");
}

#[tokio::test]
#[ignore = "requires the Go toolchain and root"]
async fn panic_text_reaches_the_caller_verbatim() {
    let sb = sandbox();
    let pipeline =
        BuildPipeline::new(LocalProcessRunner::new(), sb.config.clone()).expect("config");

    let src = b"package main\nfunc main() { panic(\"boom\") }\n";
    let report = pipeline.execute(src).await.expect("pipeline");

    match report.outcome {
        ProgramOutcome::Ran(out) => {
            assert_eq!(out.exit, ExitState::Exited(2));
            assert!(String::from_utf8_lossy(&out.combined).contains("panic: boom"));
        }
        other => panic!("expected Ran, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires the Go toolchain"]
async fn type_error_is_a_build_failure() {
    let sb = sandbox();
    let pipeline =
        BuildPipeline::new(LocalProcessRunner::new(), sb.config.clone()).expect("config");

    // Parses, but does not type-check.
    let src = b"package main\nfunc main() { var x int = \"s\"; println(x) }\n";
    let report = pipeline.execute(src).await.expect("pipeline");

    assert_eq!(report.outcome, ProgramOutcome::BuildFailed);
    assert!(empty(&sb.config.upload_dir));
    assert!(empty(&sb.config.build_dir));
}
