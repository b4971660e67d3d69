//! Tests for the ffmpeg operations against a fake ffmpeg script.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clipseek::config::{DetectConfig, ToolConfig};
use clipseek::ffmpeg::{FfmpegTool, KeyframeMatch, OperationError, Timecode};
use clipseek::supervisor::{CancellationRegistry, ExitState, SupervisorError};
use clipseek::tool::SpawnError;

use crate::common::{fake_ffmpeg, fake_tool, tool_config};

const BOUND: Duration = Duration::from_secs(10);

#[tokio::test]
async fn find_stops_at_first_match() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_tool(dir.path());

    let started = Instant::now();
    let found = tokio::time::timeout(
        BOUND,
        ffmpeg.find_frame_by_image(Path::new("movie.ts"), Path::new("start.png")),
    )
    .await
    .expect("search must stop once the frame is found")
    .unwrap();

    assert_eq!(
        found,
        Some(KeyframeMatch {
            frame: 260,
            keyframe: 250
        })
    );
    assert!(started.elapsed() < BOUND);
    assert!(ffmpeg.registry().is_empty());
}

#[tokio::test]
async fn find_sees_match_written_after_progress_line() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_tool(dir.path());

    let found = ffmpeg
        .find_frame_by_image(Path::new("movie.ts"), Path::new("glued.png"))
        .await
        .unwrap();

    assert_eq!(
        found,
        Some(KeyframeMatch {
            frame: 49,
            keyframe: 0
        })
    );
}

#[tokio::test]
async fn find_without_match_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_tool(dir.path());

    let found = ffmpeg
        .find_frame_by_image(Path::new("movie.ts"), Path::new("unknown.png"))
        .await
        .unwrap();

    assert_eq!(found, None);
    assert!(ffmpeg.registry().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_finds_keep_their_own_result() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_tool(dir.path());

    for _ in 0..5 {
        let (a, b) = tokio::join!(
            ffmpeg.find_frame_by_image(Path::new("movie.ts"), Path::new("a.png")),
            ffmpeg.find_frame_by_image(Path::new("movie.ts"), Path::new("b.png")),
        );
        assert_eq!(
            a.unwrap(),
            Some(KeyframeMatch {
                frame: 10,
                keyframe: 9
            })
        );
        assert_eq!(
            b.unwrap(),
            Some(KeyframeMatch {
                frame: 20,
                keyframe: 19
            })
        );
    }
    assert!(ffmpeg.registry().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_all_stops_every_search() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = Arc::new(fake_tool(dir.path()));
    let mut tasks = tokio::task::JoinSet::new();

    for i in 0..4 {
        let ffmpeg = Arc::clone(&ffmpeg);
        tasks.spawn(async move {
            let image = PathBuf::from(format!("hang-{i}.png"));
            ffmpeg.find_frame_by_image(Path::new("movie.ts"), &image).await
        });
    }

    let deadline = Instant::now() + BOUND;
    while ffmpeg.registry().len() < 4 {
        assert!(Instant::now() < deadline, "searches never registered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(ffmpeg.cancel_all(), 4);

    let results = tokio::time::timeout(BOUND, async {
        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            results.push(joined.unwrap());
        }
        results
    })
    .await
    .expect("cancelled searches must finish");

    assert_eq!(results.len(), 4);
    for result in results {
        assert_eq!(result.unwrap(), None);
    }
    assert!(ffmpeg.registry().is_empty());
}

#[tokio::test]
async fn missing_tool_is_a_launch_failure() {
    let ffmpeg = FfmpegTool::new(
        tool_config(PathBuf::from("/nonexistent/ffmpeg")),
        DetectConfig::default(),
        Arc::new(CancellationRegistry::new()),
    );

    let result = ffmpeg
        .find_frame_by_image(Path::new("movie.ts"), Path::new("start.png"))
        .await;

    assert!(matches!(
        result,
        Err(OperationError::Supervisor(SupervisorError::Spawn(
            SpawnError::NotFound { .. }
        )))
    ));
    assert!(ffmpeg.registry().is_empty());
}

#[tokio::test]
async fn extract_passes_documented_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_tool(dir.path());
    let output = dir.path().join("thumb.jpg");

    let report = ffmpeg
        .extract_image(Path::new("movie.ts"), &output, Timecode::from_secs(10))
        .await
        .unwrap();

    assert_eq!(report.state, ExitState::NaturalExit);
    assert!(output.exists());
    let args = std::fs::read_to_string(dir.path().join("thumb.jpg.args")).unwrap();
    assert_eq!(
        args.trim_end(),
        format!("-ss 00:00:10 -i movie.ts -vframes 1 -q:v 2 {}", output.display())
    );
}

#[tokio::test]
async fn convert_passes_documented_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_tool(dir.path());
    let output = dir.path().join("clip.mp4");

    ffmpeg
        .convert(
            Path::new("movie.ts"),
            &output,
            Timecode::from_secs(83),
            Timecode::from_secs(162),
        )
        .await
        .unwrap();

    let args = std::fs::read_to_string(dir.path().join("clip.mp4.args")).unwrap();
    assert_eq!(
        args.trim_end(),
        format!(
            "-ss 00:01:23 -i movie.ts -t 00:02:42 -c:v h264_nvenc {}",
            output.display()
        )
    );
}

#[tokio::test]
async fn failing_exit_status_is_ignored_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let ffmpeg = fake_tool(dir.path());
    let output = dir.path().join("fail.mp4");

    let report = ffmpeg
        .convert(
            Path::new("movie.ts"),
            &output,
            Timecode::from_secs(0),
            Timecode::from_secs(5),
        )
        .await
        .unwrap();

    assert!(report.exited());
    assert_eq!(report.exit_code(), Some(3));
}

#[tokio::test]
async fn strict_mode_rejects_failing_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let tool = ToolConfig {
        strict_exit_status: true,
        ..tool_config(fake_ffmpeg(dir.path()))
    };
    let ffmpeg = FfmpegTool::new(tool, DetectConfig::default(), Arc::default());
    let output = dir.path().join("fail.mp4");

    let result = ffmpeg
        .convert(
            Path::new("movie.ts"),
            &output,
            Timecode::from_secs(0),
            Timecode::from_secs(5),
        )
        .await;

    assert!(matches!(
        result,
        Err(OperationError::ToolFailed { code: Some(3) })
    ));
}
