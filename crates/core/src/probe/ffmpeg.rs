//! ffprobe/ffmpeg toolchain adapter.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{MediaProbe, ProbeConfig, ProbeError, ProbeResult};

/// Protocol options applied to remote locators so a flaky upstream does not
/// hang or drop the invocation.
const NETWORK_ARGS: &[&str] = &[
    "-reconnect",
    "1",
    "-reconnect_streamed",
    "1",
    "-reconnect_delay_max",
    "10",
    "-timeout",
    "20000000",
    "-user_agent",
    "Mozilla/5.0",
];

/// ffprobe/ffmpeg implementation of [`MediaProbe`].
pub struct FfmpegProbe {
    config: ProbeConfig,
}

impl FfmpegProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Check that both tools are invocable.
    pub async fn validate(&self) -> Result<(), ProbeError> {
        for tool in [&self.config.ffprobe_path, &self.config.ffmpeg_path] {
            let status = Command::new(tool)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| ProbeError::NotAvailable(format!("{tool}: {e}")))?;
            if !status.success() {
                return Err(ProbeError::NotAvailable(format!(
                    "{tool} -version exited with {status}"
                )));
            }
        }
        Ok(())
    }

    fn is_remote(locator: &str) -> bool {
        locator.starts_with("http://") || locator.starts_with("https://")
    }

    /// Resolve local paths to absolute form; remote locators pass through.
    fn resolve_locator(locator: &str) -> String {
        if Self::is_remote(locator) {
            return locator.to_string();
        }
        std::fs::canonicalize(locator)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| locator.to_string())
    }

    fn network_args(locator: &str) -> Vec<String> {
        if Self::is_remote(locator) {
            NETWORK_ARGS.iter().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        }
    }

    fn build_probe_args(locator: &str) -> Vec<String> {
        let mut args = vec!["-v".to_string(), "error".to_string()];
        args.extend(Self::network_args(locator));
        args.extend(
            [
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,duration",
                "-of",
                "json",
                "-analyzeduration",
                "10000000",
                "-probesize",
                "10000000",
            ]
            .map(str::to_string),
        );
        args.push(locator.to_string());
        args
    }

    fn build_thumbnail_args(locator: &str, duration_hint: Option<f64>, output: &Path) -> Vec<String> {
        let mut args = vec!["-v".to_string(), "error".to_string()];

        // Long clips: seek 10% in for a representative frame. Very short or
        // unknown-length clips: let the thumbnail filter pick one.
        let filter = match duration_hint {
            Some(duration) if duration > 10.0 => {
                args.push("-ss".to_string());
                args.push(format!("{:.2}", duration * 0.1));
                "scale=640:-1"
            }
            _ => "thumbnail,scale=640:-1",
        };

        args.extend(Self::network_args(locator));
        args.push("-i".to_string());
        args.push(locator.to_string());
        args.extend(
            ["-vf", filter, "-vframes", "1", "-q:v", "5", "-y"].map(str::to_string),
        );
        args.push(output.display().to_string());
        args
    }

    fn build_preview_args(locator: &str, duration_seconds: f64, output: &Path) -> Vec<String> {
        let start = (duration_seconds * 0.2 - 1.0).max(0.0);
        let mut args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            format!("{start:.2}"),
        ];
        args.extend(Self::network_args(locator));
        args.push("-i".to_string());
        args.push(locator.to_string());
        args.extend(
            [
                "-t",
                "2",
                "-vf",
                "fps=10,scale=320:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse",
                "-loop",
                "0",
                "-y",
            ]
            .map(str::to_string),
        );
        args.push(output.display().to_string());
        args
    }

    fn parse_probe_output(stdout: &str) -> Result<ProbeResult, ProbeError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            width: Option<i64>,
            height: Option<i64>,
            // ffprobe reports duration as a decimal string
            duration: Option<String>,
        }

        let output: ProbeOutput =
            serde_json::from_str(stdout).map_err(|e| ProbeError::ParseError {
                tool: "ffprobe".to_string(),
                message: e.to_string(),
            })?;

        let stream = match output.streams.first() {
            Some(s) => s,
            None => return Ok(ProbeResult::default()),
        };

        Ok(ProbeResult {
            width: stream.width,
            height: stream.height,
            duration_seconds: stream
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok()),
        })
    }

    /// Run a tool with a hard timeout; the child is killed if the deadline
    /// expires or the caller goes away.
    async fn run_tool(
        &self,
        tool: &str,
        args: &[String],
        timeout_secs: u64,
    ) -> Result<std::process::Output, ProbeError> {
        debug!(tool, ?args, "invoking toolchain");

        let child = Command::new(tool)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProbeError::Io(e.to_string()))?;

        match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ProbeError::Io(e.to_string())),
            Err(_) => Err(ProbeError::Timeout {
                tool: tool.to_string(),
                seconds: timeout_secs,
            }),
        }
    }
}

#[async_trait]
impl MediaProbe for FfmpegProbe {
    async fn probe(&self, locator: &str) -> Result<ProbeResult, ProbeError> {
        let locator = Self::resolve_locator(locator);
        let args = Self::build_probe_args(&locator);

        let output = self
            .run_tool(&self.config.ffprobe_path, &args, self.config.probe_timeout_secs)
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(%locator, "ffprobe failed: {}", stderr.trim());
            return Err(ProbeError::ToolFailed {
                tool: "ffprobe".to_string(),
                message: stderr.trim().to_string(),
            });
        }

        Self::parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn generate_thumbnail(
        &self,
        locator: &str,
        duration_hint: Option<f64>,
        output: &Path,
    ) -> Result<(), ProbeError> {
        let locator = Self::resolve_locator(locator);
        let args = Self::build_thumbnail_args(&locator, duration_hint, output);

        // Short clips need the frame-selection filter, which decodes more
        // input; give those the longer budget.
        let timeout_secs = match duration_hint {
            Some(d) if d > 10.0 => self.config.thumbnail_timeout_secs,
            _ => self.config.thumbnail_timeout_secs.min(40),
        };

        let out = self
            .run_tool(&self.config.ffmpeg_path, &args, timeout_secs)
            .await?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(ProbeError::ToolFailed {
                tool: "ffmpeg".to_string(),
                message: stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    async fn generate_preview(
        &self,
        locator: &str,
        duration_seconds: f64,
        output: &Path,
    ) -> Result<(), ProbeError> {
        let locator = Self::resolve_locator(locator);
        let args = Self::build_preview_args(&locator, duration_seconds, output);

        let out = self
            .run_tool(
                &self.config.ffmpeg_path,
                &args,
                self.config.preview_timeout_secs,
            )
            .await?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(ProbeError::ToolFailed {
                tool: "ffmpeg".to_string(),
                message: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_probe_args_local_file() {
        let args = FfmpegProbe::build_probe_args("/videos/clip.mp4");
        assert!(!args.contains(&"-reconnect".to_string()));
        assert_eq!(args.last().unwrap(), "/videos/clip.mp4");
        assert!(args.contains(&"-select_streams".to_string()));
        assert!(args.contains(&"v:0".to_string()));
    }

    #[test]
    fn test_probe_args_remote_gets_network_flags() {
        let args = FfmpegProbe::build_probe_args("https://cdn.example.com/v.m3u8");
        assert!(args.contains(&"-reconnect".to_string()));
        assert!(args.contains(&"-user_agent".to_string()));
        assert!(args.contains(&"Mozilla/5.0".to_string()));
        // Network flags must come before the input locator
        let reconnect_pos = args.iter().position(|a| a == "-reconnect").unwrap();
        let input_pos = args
            .iter()
            .position(|a| a == "https://cdn.example.com/v.m3u8")
            .unwrap();
        assert!(reconnect_pos < input_pos);
    }

    #[test]
    fn test_thumbnail_args_long_clip_seeks() {
        let args = FfmpegProbe::build_thumbnail_args(
            "/videos/long.mp4",
            Some(600.0),
            &PathBuf::from("/previews/1.jpg"),
        );
        let ss_pos = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss_pos + 1], "60.00");
        assert!(args.contains(&"scale=640:-1".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("thumbnail")));
    }

    #[test]
    fn test_thumbnail_args_short_clip_uses_filter() {
        let args = FfmpegProbe::build_thumbnail_args(
            "/videos/short.mp4",
            Some(4.0),
            &PathBuf::from("/previews/2.jpg"),
        );
        assert!(!args.contains(&"-ss".to_string()));
        assert!(args.contains(&"thumbnail,scale=640:-1".to_string()));
    }

    #[test]
    fn test_thumbnail_args_unknown_duration_uses_filter() {
        let args = FfmpegProbe::build_thumbnail_args(
            "https://cdn.example.com/v.mp4",
            None,
            &PathBuf::from("/previews/3.jpg"),
        );
        assert!(!args.contains(&"-ss".to_string()));
        assert!(args.contains(&"thumbnail,scale=640:-1".to_string()));
    }

    #[test]
    fn test_preview_args_seek_offset() {
        let args = FfmpegProbe::build_preview_args(
            "/videos/clip.mp4",
            100.0,
            &PathBuf::from("/previews/4.gif"),
        );
        let ss_pos = args.iter().position(|a| a == "-ss").unwrap();
        // 20% in minus one second
        assert_eq!(args[ss_pos + 1], "19.00");
        assert!(args.contains(&"-t".to_string()));
        assert!(args.iter().any(|a| a.contains("palettegen")));
    }

    #[test]
    fn test_preview_args_short_clip_clamps_to_start() {
        let args = FfmpegProbe::build_preview_args(
            "/videos/tiny.mp4",
            3.0,
            &PathBuf::from("/previews/5.gif"),
        );
        let ss_pos = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss_pos + 1], "0.00");
    }

    #[test]
    fn test_parse_probe_output_full() {
        let json = r#"{"streams":[{"width":1920,"height":1080,"duration":"734.567000"}]}"#;
        let result = FfmpegProbe::parse_probe_output(json).unwrap();
        assert_eq!(result.width, Some(1920));
        assert_eq!(result.height, Some(1080));
        assert!((result.duration_seconds.unwrap() - 734.567).abs() < 0.001);
    }

    #[test]
    fn test_parse_probe_output_manifest_without_duration() {
        // Segmented manifests often report dimensions but no duration
        let json = r#"{"streams":[{"width":1280,"height":720}]}"#;
        let result = FfmpegProbe::parse_probe_output(json).unwrap();
        assert_eq!(result.width, Some(1280));
        assert_eq!(result.duration_seconds, None);
    }

    #[test]
    fn test_parse_probe_output_no_streams() {
        let result = FfmpegProbe::parse_probe_output(r#"{"streams":[]}"#).unwrap();
        assert_eq!(result, ProbeResult::default());
    }

    #[test]
    fn test_parse_probe_output_garbage() {
        assert!(FfmpegProbe::parse_probe_output("not json").is_err());
    }
}
