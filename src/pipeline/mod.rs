use serde::Serialize;
use std::path::{Path, PathBuf};

pub mod reporter;

pub use reporter::{ConsoleReporter, Reporter};

use crate::fetcher::AudioFetcher;
use crate::uploader::{MediaUploader, UploadedAsset};
use crate::utils::extract_domain;
use crate::{RelayError, Result};

/// Where a relay run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Idle,
    Fetching,
    Uploading,
    Cleanup,
    Done,
    Failed,
}

/// Result of a successful relay
#[derive(Debug, Clone, Serialize)]
pub struct RelayOutcome {
    /// Asset as hosted by the upload service
    pub hosted: UploadedAsset,

    /// Where the audio was written locally
    pub local_path: PathBuf,

    /// Whether the local file was removed during cleanup
    pub local_deleted: bool,
}

impl RelayOutcome {
    pub fn hosted_url(&self) -> &str {
        &self.hosted.secure_url
    }
}

/// Fetch, upload, clean up. One run per call, strictly in that order.
pub struct RelayPipeline<F, U> {
    fetcher: F,
    uploader: U,
    keep_local: bool,
}

impl<F: AudioFetcher, U: MediaUploader> RelayPipeline<F, U> {
    pub fn new(fetcher: F, uploader: U) -> Self {
        Self {
            fetcher,
            uploader,
            keep_local: false,
        }
    }

    /// Leave the local file on disk after a successful upload
    pub fn keep_local(mut self, keep_local: bool) -> Self {
        self.keep_local = keep_local;
        self
    }

    /// Run the whole relay for `source_url`, writing the audio to `output_path` first.
    ///
    /// Any error moves the run to [`Stage::Failed`] and is returned as-is. Nothing is
    /// cleaned up on that path.
    pub async fn run(
        &self,
        source_url: &str,
        output_path: &Path,
        reporter: &dyn Reporter,
    ) -> Result<RelayOutcome> {
        reporter.stage(Stage::Idle);

        match self.run_stages(source_url, output_path, reporter).await {
            Ok(outcome) => {
                reporter.stage(Stage::Done);
                reporter.completed(&outcome);
                Ok(outcome)
            }
            Err(e) => {
                tracing::debug!("Relay failed during {:?}: {}", e.failed_stage(), e);
                reporter.stage(Stage::Failed);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        source_url: &str,
        output_path: &Path,
        reporter: &dyn Reporter,
    ) -> Result<RelayOutcome> {
        reporter.stage(Stage::Fetching);
        reporter.message("Downloading audio...");
        tracing::info!("Fetching audio from {} with {}", source_url, self.fetcher.engine_name());
        let local_path = self.fetcher.fetch_audio(source_url, output_path).await?;

        reporter.stage(Stage::Uploading);
        reporter.message(&format!("Uploading to {}...", self.uploader.service_name()));
        let hosted = self.uploader.upload(&local_path).await?;
        tracing::debug!(
            "Hosted on {}",
            extract_domain(&hosted.secure_url).unwrap_or_else(|| "unknown host".to_string())
        );

        reporter.stage(Stage::Cleanup);
        let local_deleted = if !self.keep_local && local_path.exists() {
            fs_err::remove_file(&local_path).map_err(|source| RelayError::Filesystem {
                path: local_path.clone(),
                source,
            })?;
            reporter.message("Local file deleted.");
            true
        } else {
            false
        };

        Ok(RelayOutcome {
            hosted,
            local_path,
            local_deleted,
        })
    }
}

/// Process exit status for a finished run.
///
/// Failures only change the status when `strict` is set; otherwise they are
/// reported on the console and the process still exits 0.
pub fn exit_status(failed: bool, strict: bool) -> u8 {
    if failed && strict {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::completion_line;
    use crate::uploader::MockMediaUploader;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Writes a small file where yt-dlp would, or fails like an unreachable URL
    struct ScriptedFetcher {
        reachable: bool,
    }

    #[async_trait]
    impl AudioFetcher for ScriptedFetcher {
        async fn fetch_audio(&self, source_url: &str, output_path: &Path) -> Result<PathBuf> {
            if !self.reachable {
                return Err(RelayError::Download(format!(
                    "Unable to download webpage: {}",
                    source_url
                )));
            }
            fs_err::write(output_path, b"ID3").map_err(|e| RelayError::Download(e.to_string()))?;
            Ok(output_path.to_path_buf())
        }

        fn engine_name(&self) -> &'static str {
            "scripted"
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        stages: Mutex<Vec<Stage>>,
        lines: Mutex<Vec<String>>,
    }

    impl RecordingReporter {
        fn stages(&self) -> Vec<Stage> {
            self.stages.lock().unwrap().clone()
        }

        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl Reporter for RecordingReporter {
        fn stage(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn message(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }

        fn completed(&self, outcome: &RelayOutcome) {
            self.lines.lock().unwrap().push(completion_line(&outcome.hosted));
        }
    }

    fn hosted_asset() -> UploadedAsset {
        UploadedAsset {
            secure_url: "https://res.cloudinary.com/demo/video/upload/v1/abc123.mp3".to_string(),
            public_id: Some("abc123".to_string()),
            resource_type: Some("video".to_string()),
            format: Some("mp3".to_string()),
            bytes: Some(3),
            created_at: None,
        }
    }

    fn working_uploader(times: usize) -> MockMediaUploader {
        let mut uploader = MockMediaUploader::new();
        uploader.expect_service_name().return_const("Cloudinary");
        uploader
            .expect_upload()
            .withf(|path: &Path| path.is_file())
            .times(times)
            .returning(|_| Ok(hosted_asset()));
        uploader
    }

    #[tokio::test]
    async fn successful_relay_removes_the_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output.mp3");
        let pipeline = RelayPipeline::new(ScriptedFetcher { reachable: true }, working_uploader(1));
        let reporter = RecordingReporter::default();

        let outcome = pipeline
            .run("https://example.com/watch?v=ABCDEFGHIJK", &output, &reporter)
            .await
            .unwrap();

        assert!(!output.exists());
        assert!(outcome.local_deleted);
        assert!(outcome.hosted_url().starts_with("https://"));
        assert_eq!(
            reporter.lines(),
            vec![
                "Downloading audio...".to_string(),
                "Uploading to Cloudinary...".to_string(),
                "Local file deleted.".to_string(),
                "Process completed. File URL: https://res.cloudinary.com/demo/video/upload/v1/abc123.mp3"
                    .to_string(),
            ]
        );
        assert_eq!(
            reporter.stages(),
            vec![Stage::Idle, Stage::Fetching, Stage::Uploading, Stage::Cleanup, Stage::Done]
        );
    }

    #[tokio::test]
    async fn upload_failure_leaves_the_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output.mp3");

        let mut uploader = MockMediaUploader::new();
        uploader.expect_service_name().return_const("Cloudinary");
        uploader
            .expect_upload()
            .times(1)
            .returning(|_| Err(RelayError::Upload("Must supply api_key".to_string())));

        let pipeline = RelayPipeline::new(ScriptedFetcher { reachable: true }, uploader);
        let reporter = RecordingReporter::default();

        let err = pipeline
            .run("https://example.com/watch?v=ABCDEFGHIJK", &output, &reporter)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Upload(_)));
        assert_eq!(err.failed_stage(), Stage::Uploading);
        assert!(output.exists());
        assert_eq!(
            reporter.lines(),
            vec!["Downloading audio...".to_string(), "Uploading to Cloudinary...".to_string()]
        );
        assert_eq!(reporter.stages().last(), Some(&Stage::Failed));
        assert_eq!(exit_status(true, false), 0);
    }

    #[tokio::test]
    async fn unreachable_source_never_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output.mp3");

        let mut uploader = MockMediaUploader::new();
        uploader.expect_service_name().return_const("Cloudinary");
        uploader.expect_upload().never();

        let pipeline = RelayPipeline::new(ScriptedFetcher { reachable: false }, uploader);
        let reporter = RecordingReporter::default();

        let err = pipeline
            .run("https://example.invalid/watch?v=nothing", &output, &reporter)
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Download(_)));
        assert!(!output.exists());
        assert_eq!(reporter.lines(), vec!["Downloading audio...".to_string()]);
        assert_eq!(
            reporter.stages(),
            vec![Stage::Idle, Stage::Fetching, Stage::Failed]
        );
    }

    #[tokio::test]
    async fn repeated_runs_upload_twice_and_leave_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = RelayPipeline::new(ScriptedFetcher { reachable: true }, working_uploader(2));

        for run in 0..2 {
            let output = dir.path().join(format!("run-{}.mp3", run));
            let reporter = RecordingReporter::default();
            pipeline
                .run("https://example.com/watch?v=ABCDEFGHIJK", &output, &reporter)
                .await
                .unwrap();
            assert!(!output.exists());
        }

        assert_eq!(fs_err::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn keep_local_skips_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output.mp3");
        let pipeline = RelayPipeline::new(ScriptedFetcher { reachable: true }, working_uploader(1))
            .keep_local(true);
        let reporter = RecordingReporter::default();

        let outcome = pipeline
            .run("https://example.com/watch?v=ABCDEFGHIJK", &output, &reporter)
            .await
            .unwrap();

        assert!(output.exists());
        assert!(!outcome.local_deleted);
        assert!(!reporter.lines().contains(&"Local file deleted.".to_string()));
    }

    /// Leaves a directory where the audio file should be
    struct DirectoryFetcher;

    #[async_trait]
    impl AudioFetcher for DirectoryFetcher {
        async fn fetch_audio(&self, _source_url: &str, output_path: &Path) -> Result<PathBuf> {
            fs_err::create_dir(output_path).map_err(|e| RelayError::Download(e.to_string()))?;
            Ok(output_path.to_path_buf())
        }

        fn engine_name(&self) -> &'static str {
            "directory"
        }
    }

    #[tokio::test]
    async fn failed_delete_is_a_cleanup_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output.mp3");

        let mut uploader = MockMediaUploader::new();
        uploader.expect_service_name().return_const("Cloudinary");
        uploader.expect_upload().times(1).returning(|_| Ok(hosted_asset()));

        let pipeline = RelayPipeline::new(DirectoryFetcher, uploader);
        let reporter = RecordingReporter::default();

        let err = pipeline
            .run("https://example.com/watch?v=ABCDEFGHIJK", &output, &reporter)
            .await
            .unwrap_err();

        assert!(matches!(&err, RelayError::Filesystem { path, .. } if path == &output));
        assert_eq!(err.failed_stage(), Stage::Cleanup);
        assert!(output.exists());
        assert!(!reporter.lines().contains(&"Local file deleted.".to_string()));
        assert_eq!(
            reporter.stages(),
            vec![Stage::Idle, Stage::Fetching, Stage::Uploading, Stage::Cleanup, Stage::Failed]
        );
    }

    #[test]
    fn exit_status_only_fails_in_strict_mode() {
        assert_eq!(exit_status(false, false), 0);
        assert_eq!(exit_status(false, true), 0);
        assert_eq!(exit_status(true, false), 0);
        assert_eq!(exit_status(true, true), 1);
    }
}
