use std::fmt;
use std::path::PathBuf;

use tracing::{debug, instrument};

use crate::grab::download::{DownloadError, ImageDownloader};
use crate::grab::path::compute_path;
use crate::grab::sink::{Field, ResultSink, Severity};
use crate::grab::target::Target;
use crate::grab::url::extract_image_file_name;
use crate::reddit::Post;

/// Why a post was never attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Nsfw,
    BadUrl(String),
    PathTooLong(String),
}

/// Why an attempted download did not produce a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    BadContentType(String),
    Network(String),
    Io(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Nsfw => write!(f, "NSFW"),
            SkipReason::BadUrl(detail) => write!(f, "bad URL: {}", detail),
            SkipReason::PathTooLong(detail) => write!(f, "path too long: {}", detail),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::BadContentType(detail) => write!(f, "bad content type: {}", detail),
            FailureReason::Network(detail) => write!(f, "network error: {}", detail),
            FailureReason::Io(detail) => write!(f, "I/O error: {}", detail),
        }
    }
}

/// What happened to a single post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded(PathBuf),
    AlreadyExists(PathBuf),
    Skipped(SkipReason),
    Failed(FailureReason),
}

impl DownloadOutcome {
    pub fn severity(&self) -> Severity {
        match self {
            DownloadOutcome::Downloaded(_) | DownloadOutcome::AlreadyExists(_) => Severity::Info,
            DownloadOutcome::Skipped(_) | DownloadOutcome::Failed(_) => Severity::Error,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            DownloadOutcome::Downloaded(_) => "downloaded file",
            DownloadOutcome::AlreadyExists(_) => "file exists!",
            DownloadOutcome::Skipped(SkipReason::Nsfw) => "Skipping NSFW post",
            DownloadOutcome::Skipped(SkipReason::BadUrl(_)) => "can't download image",
            DownloadOutcome::Skipped(SkipReason::PathTooLong(_)) => "can't build file path",
            DownloadOutcome::Failed(_) => "download file error",
        }
    }
}

impl From<DownloadError> for FailureReason {
    fn from(error: DownloadError) -> Self {
        let detail = error.to_string();
        match error {
            DownloadError::ContentType(_) | DownloadError::EmptyBody => FailureReason::BadContentType(detail),
            DownloadError::Request(_) | DownloadError::Read(_) => FailureReason::Network(detail),
            DownloadError::AlreadyExists(_) | DownloadError::Create { .. } | DownloadError::Write(_) => {
                FailureReason::Io(detail)
            }
        }
    }
}

/// Runs every post of one target through validation, naming and download.
pub struct TargetProcessor<'a> {
    downloader: &'a ImageDownloader,
    sink: &'a dyn ResultSink,
}

impl<'a> TargetProcessor<'a> {
    pub fn new(downloader: &'a ImageDownloader, sink: &'a dyn ResultSink) -> Self {
        Self { downloader, sink }
    }

    /// Processes `posts` in order and reports one event per post.
    ///
    /// A post can only ever affect its own outcome.
    #[instrument(skip_all, fields(subreddit = %target.name, posts = posts.len()))]
    pub fn process(&self, target: &Target, posts: &[Post]) -> Vec<DownloadOutcome> {
        posts
            .iter()
            .map(|post| {
                let outcome = self.process_post(target, post);
                self.report(target, post, &outcome);
                outcome
            })
            .collect()
    }

    fn process_post(&self, target: &Target, post: &Post) -> DownloadOutcome {
        if post.is_adult_content {
            return DownloadOutcome::Skipped(SkipReason::Nsfw);
        }

        let url_file_name = match extract_image_file_name(&post.url) {
            Ok(name) => name,
            Err(e) => return DownloadOutcome::Skipped(SkipReason::BadUrl(e.to_string())),
        };

        let file_path = match compute_path(&target.destination, &target.name, &post.title, &url_file_name) {
            Ok(path) => path,
            Err(e) => return DownloadOutcome::Skipped(SkipReason::PathTooLong(e.to_string())),
        };

        match self.downloader.download(&post.url, &file_path) {
            Ok(bytes) => {
                debug!("Wrote {} bytes to {}", bytes, file_path.display());
                DownloadOutcome::Downloaded(file_path)
            }
            Err(DownloadError::AlreadyExists(path)) => DownloadOutcome::AlreadyExists(path),
            Err(e) => DownloadOutcome::Failed(FailureReason::from(e)),
        }
    }

    fn report(&self, target: &Target, post: &Post, outcome: &DownloadOutcome) {
        let mut fields: Vec<Field<'_>> = vec![
            ("subreddit", target.name.clone()),
            ("post", post.title.clone()),
        ];
        match outcome {
            DownloadOutcome::Downloaded(path) | DownloadOutcome::AlreadyExists(path) => {
                fields.push(("filePath", path.display().to_string()));
                fields.push(("url", post.url.clone()));
            }
            DownloadOutcome::Skipped(SkipReason::Nsfw) => {
                fields.push(("url", post.url.clone()));
            }
            DownloadOutcome::Skipped(reason) => {
                fields.push(("url", post.url.clone()));
                fields.push(("err", reason.to_string()));
            }
            DownloadOutcome::Failed(reason) => {
                fields.push(("url", post.url.clone()));
                fields.push(("err", reason.to_string()));
            }
        }

        self.sink.record(outcome.severity(), outcome.message(), &fields);
    }
}
