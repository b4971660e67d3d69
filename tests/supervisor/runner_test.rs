//! Tests for the process supervisor against real shell processes.

use std::path::Path;
use std::time::{Duration, Instant};

use clipseek::supervisor::{ExitState, ProcessSupervisor};
use clipseek::tool::ToolArgs;
use tokio_util::sync::CancellationToken;

/// Upper bound for any cancellation in these tests; far below the 30s sleeps.
const BOUND: Duration = Duration::from_secs(5);

fn sh(script: &str) -> ToolArgs {
    ToolArgs::new().arg("-c").arg(script)
}

fn supervisor() -> ProcessSupervisor {
    ProcessSupervisor::new().with_terminate_grace(Duration::from_millis(200))
}

#[tokio::test]
async fn natural_exit_delivers_both_streams() {
    let cancel = CancellationToken::new();
    let mut lines = Vec::new();

    let report = supervisor()
        .run(
            Path::new("sh"),
            &sh("echo out1; echo err1 >&2; echo out2"),
            |line| lines.push(line.to_string()),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.state, ExitState::NaturalExit);
    assert!(report.exited());
    assert_eq!(report.exit_code(), Some(0));
    assert_eq!(report.lines, 3);

    lines.sort();
    assert_eq!(lines, ["err1", "out1", "out2"]);
}

#[tokio::test]
async fn exit_code_is_reported_not_judged() {
    let cancel = CancellationToken::new();
    let report = tokio_test::assert_ok!(
        supervisor()
            .run(Path::new("sh"), &sh("echo bye; exit 7"), |_| {}, &cancel)
            .await
    );

    assert_eq!(report.state, ExitState::NaturalExit);
    assert_eq!(report.exit_code(), Some(7));
}

#[tokio::test]
async fn output_written_before_exit_is_drained() {
    let cancel = CancellationToken::new();
    let mut count = 0usize;

    let report = supervisor()
        .run(
            Path::new("sh"),
            &sh("i=0; while [ $i -lt 500 ]; do echo line$i; i=$((i+1)); done"),
            |_| count += 1,
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.state, ExitState::NaturalExit);
    assert_eq!(count, 500);
    assert_eq!(report.lines, 500);
}

#[tokio::test]
async fn external_cancel_stops_process_that_never_exits() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let report = tokio::time::timeout(
        BOUND,
        supervisor().run(Path::new("sleep"), &ToolArgs::new().arg("30"), |_| {}, &cancel),
    )
    .await
    .expect("run must not hang after cancellation")
    .unwrap();

    assert!(matches!(report.state, ExitState::Cancelled | ExitState::Killed));
    assert!(report.status.is_none());
    assert!(started.elapsed() < BOUND);
}

#[tokio::test]
async fn handler_can_cancel_its_own_run() {
    let cancel = CancellationToken::new();
    let own = cancel.clone();
    let mut seen = Vec::new();

    let report = tokio::time::timeout(
        BOUND,
        supervisor().run(
            Path::new("sh"),
            &sh("echo hit; exec sleep 30"),
            |line| {
                seen.push(line.to_string());
                if line == "hit" {
                    own.cancel();
                }
            },
            &cancel,
        ),
    )
    .await
    .expect("self-cancelled run must return")
    .unwrap();

    assert!(matches!(report.state, ExitState::Cancelled | ExitState::Killed));
    assert_eq!(seen, ["hit"]);
}

#[tokio::test]
async fn process_ignoring_sigterm_is_killed() {
    let cancel = CancellationToken::new();
    let own = cancel.clone();

    let report = tokio::time::timeout(
        BOUND,
        supervisor().run(
            Path::new("sh"),
            &sh("trap '' TERM; echo ready; while true; do sleep 0.05; done"),
            |line| {
                if line == "ready" {
                    own.cancel();
                }
            },
            &cancel,
        ),
    )
    .await
    .expect("kill escalation must not hang")
    .unwrap();

    assert_eq!(report.state, ExitState::Killed);
}

#[tokio::test]
async fn watchdog_stops_overlong_run() {
    let cancel = CancellationToken::new();
    let supervisor = supervisor().with_max_runtime(Some(Duration::from_millis(150)));

    let report = tokio::time::timeout(
        BOUND,
        supervisor.run(Path::new("sleep"), &ToolArgs::new().arg("30"), |_| {}, &cancel),
    )
    .await
    .expect("watchdog must fire")
    .unwrap();

    assert!(matches!(report.state, ExitState::Cancelled | ExitState::Killed));
    assert!(!cancel.is_cancelled());
}

#[tokio::test]
async fn cancel_after_natural_exit_is_harmless() {
    let cancel = CancellationToken::new();
    let report = supervisor()
        .run(Path::new("true"), &ToolArgs::new(), |_| {}, &cancel)
        .await
        .unwrap();
    cancel.cancel();

    assert_eq!(report.state, ExitState::NaturalExit);
}

#[tokio::test]
async fn background_child_holding_pipes_does_not_delay_exit() {
    let cancel = CancellationToken::new();
    let mut lines = Vec::new();

    let started = Instant::now();
    let report = tokio::time::timeout(
        BOUND,
        supervisor().run(
            Path::new("sh"),
            &sh("sleep 3 & echo done; exit 0"),
            |line| lines.push(line.to_string()),
            &cancel,
        ),
    )
    .await
    .expect("run must return once the tool exits")
    .unwrap();

    assert_eq!(report.state, ExitState::NaturalExit);
    assert_eq!(lines, ["done"]);
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn carriage_return_separates_lines() {
    let cancel = CancellationToken::new();
    let mut lines = Vec::new();

    supervisor()
        .run(
            Path::new("sh"),
            &sh(r"printf 'frame=   48 speed=3.8x    \rnext line\r\nlast\n' >&2"),
            |line| lines.push(line.to_string()),
            &cancel,
        )
        .await
        .unwrap();

    assert_eq!(lines, ["frame=   48 speed=3.8x    ", "next line", "last"]);
}
