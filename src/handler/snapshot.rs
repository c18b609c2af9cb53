//! Self-contained HTML snapshots through an external converter.
//!
//! The page body is piped to the converter's stdin and the snapshot is read
//! from its stdout. The converter is expected to accept `monolith`'s
//! command line. If the executable cannot be found the handler declines;
//! once it is found, any failure to run it is fatal.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};
use url::Url;

use crate::config::SnapshotConfig;
use crate::network::media::HTML_MEDIA_TYPE;

use super::{
    DownloadHandler, DownloadResponse, HandleError, HandleStep, SourceContent, infer_file_name,
};

const HANDLER_NAME: &str = "snapshot";
const MAX_STDERR_CHARS: usize = 500;

/// Command-line arguments for one conversion.
///
/// Each disabled `include-*` option adds the matching `--no-*` flag.
#[must_use]
pub fn snapshot_args(config: &SnapshotConfig, user_agent: &str, base_url: &Url) -> Vec<String> {
    let mut args = vec!["--user-agent".to_string(), user_agent.to_string()];
    let flags = [
        (config.allow_insecure, "--insecure"),
        (!config.include_audio, "--no-audio"),
        (!config.include_css, "--no-css"),
        (!config.include_fonts, "--no-fonts"),
        (!config.include_frames, "--no-frames"),
        (!config.include_images, "--no-images"),
        (!config.include_js, "--no-js"),
        (!config.include_video, "--no-video"),
        (!config.include_metadata, "--no-metadata"),
    ];
    args.extend(
        flags
            .iter()
            .filter(|(enabled, _)| *enabled)
            .map(|(_, flag)| (*flag).to_string()),
    );
    args.extend([
        "--base-url".to_string(),
        base_url.to_string(),
        "-".to_string(),
    ]);
    args
}

/// Handler converting HTML pages into snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotHandler {
    config: SnapshotConfig,
    user_agent: String,
}

impl SnapshotHandler {
    /// Creates a handler using `config` and sending `user_agent` for
    /// the converter's own requests.
    #[must_use]
    pub fn new(config: SnapshotConfig, user_agent: impl Into<String>) -> Self {
        Self {
            config,
            user_agent: user_agent.into(),
        }
    }

    fn locate_program(&self) -> Option<PathBuf> {
        match which::which(&self.config.path) {
            Ok(program) => Some(program),
            Err(error) => {
                debug!(path = %self.config.path, error = %error, "Snapshot tool not found");
                None
            }
        }
    }
}

#[async_trait]
impl DownloadHandler for SnapshotHandler {
    fn name(&self) -> &'static str {
        HANDLER_NAME
    }

    #[instrument(skip(self, response), fields(handler = HANDLER_NAME, url = %response.url))]
    async fn handle(&self, response: &DownloadResponse) -> Result<HandleStep, HandleError> {
        if !self.config.enabled || response.media_type() != HTML_MEDIA_TYPE {
            return Ok(HandleStep::NotHandled);
        }
        let Some(program) = self.locate_program() else {
            return Ok(HandleStep::NotHandled);
        };

        let args = snapshot_args(&self.config, &self.user_agent, &response.url);
        let snapshot = run_converter(&program, &args, &response.body).await?;
        debug!(bytes = snapshot.len(), "Snapshot created");

        Ok(HandleStep::Handled(SourceContent {
            content: snapshot,
            media_type: HTML_MEDIA_TYPE.to_string(),
            file_name: infer_file_name(&response.url, &response.headers, HTML_MEDIA_TYPE),
        }))
    }
}

async fn run_converter(program: &Path, args: &[String], input: &[u8]) -> Result<Vec<u8>, HandleError> {
    let spawn_error = |source| HandleError::SnapshotSpawn {
        program: program.to_path_buf(),
        source,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(spawn_error)?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| spawn_error(std::io::Error::other("stdin was not captured")))?;
    let feed = async move {
        stdin.write_all(input).await?;
        stdin.shutdown().await
    };

    let (fed, output) = futures_util::future::join(feed, child.wait_with_output()).await;
    let output = output.map_err(spawn_error)?;

    if !output.status.success() {
        let stderr: String = String::from_utf8_lossy(&output.stderr)
            .trim()
            .chars()
            .take(MAX_STDERR_CHARS)
            .collect();
        return Err(HandleError::SnapshotFailed {
            program: program.to_path_buf(),
            status: output.status.to_string(),
            stderr,
        });
    }
    // A converter may legitimately stop reading early; only report a broken
    // feed when it also claims success without producing anything.
    if let Err(error) = fed
        && output.stdout.is_empty()
    {
        return Err(spawn_error(error));
    }

    Ok(output.stdout)
}
