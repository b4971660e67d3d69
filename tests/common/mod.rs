//! Shared helpers: a shell script standing in for ffmpeg.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clipseek::config::{DetectConfig, ToolConfig};
use clipseek::ffmpeg::FfmpegTool;
use clipseek::supervisor::CancellationRegistry;

/// Behaviour keyed on argument shape and file names:
///
/// - frame search (`-filter_complex`): the still image name (`$6`) picks
///   the reported frame; after the match the script keeps "scanning"
///   forever, as ffmpeg would on a long recording. `glued` writes its
///   only match right after a `\r`-terminated progress line and exits.
///   `hang` never matches and never exits; any other image exits without
///   a match.
/// - extract (`-vframes`) and convert (`-c:v`): the arguments are written
///   to `<output>.args`, the output file is created, and the script exits
///   with status 3 if the output name contains `fail`.
const FAKE_FFMPEG: &str = r#"#!/bin/sh
mode=other
for arg in "$@"; do
  case "$arg" in
    -filter_complex) mode=find ;;
    -vframes) mode=extract ;;
    -c:v) mode=convert ;;
  esac
done
for last in "$@"; do :; done

case "$mode" in
  find)
    image="$6"
    echo "Input #0, mpegts, from '$2':" >&2
    echo "frame=    1 fps=0.0 q=-0.0 size=N/A time=00:00:00.04 bitrate=N/A" >&2
    case "$image" in
      *start*) echo "[Parsed_blackframe_1 @ 0x55d0] frame:260 pblack:99 pts:266240 t:10.400000 type:P last_keyframe:250" >&2 ;;
      *stop*) echo "[Parsed_blackframe_1 @ 0x55d0] frame:4300 pblack:99 pts:4403200 t:172.000000 type:P last_keyframe:4250" >&2 ;;
      *a.png) echo "[Parsed_blackframe_1 @ 0x1] frame:10 pblack:99 pts:1 t:0.4 type:P last_keyframe:9" >&2 ;;
      *b.png) echo "[Parsed_blackframe_1 @ 0x1] frame:20 pblack:99 pts:1 t:0.8 type:P last_keyframe:19" >&2 ;;
      *glued*)
        printf 'frame=   48 fps=0.0 q=-0.0 size=N/A time=00:00:01.92 bitrate=N/A speed=3.8x    \r[Parsed_blackframe_1 @ 0x1] frame:49 pblack:99 pts:25088 t:1.960000 type:P last_keyframe:0\n' >&2
        exit 0
        ;;
      *hang*) exec sleep 30 ;;
      *) exit 0 ;;
    esac
    echo "[Parsed_blackframe_1 @ 0x1] frame:999999 pblack:99 pts:1 t:1.0 type:P last_keyframe:999990" >&2
    exec sleep 30
    ;;
  extract|convert)
    printf '%s\n' "$*" > "$last.args"
    : > "$last"
    case "$last" in
      *fail*) exit 3 ;;
    esac
    ;;
esac
exit 0
"#;

/// Write an executable script named `name` into `dir` and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Write the fake ffmpeg into `dir` and return its path.
pub fn fake_ffmpeg(dir: &Path) -> PathBuf {
    write_script(dir, "fake-ffmpeg", FAKE_FFMPEG)
}

/// Tool settings pointing at `program` with a short grace period.
pub fn tool_config(program: PathBuf) -> ToolConfig {
    ToolConfig {
        path: program,
        terminate_grace_ms: 500,
        ..ToolConfig::default()
    }
}

/// Facade over the fake tool with its own registry.
pub fn fake_tool(dir: &Path) -> FfmpegTool {
    FfmpegTool::new(
        tool_config(fake_ffmpeg(dir)),
        DetectConfig::default(),
        Arc::new(CancellationRegistry::new()),
    )
}
