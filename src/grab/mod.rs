//! The fetch, filter and download pipeline.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::reddit::{PostSource, SourceError};

pub(crate) mod download;
pub(crate) mod path;
pub(crate) mod processor;
pub(crate) mod sink;
pub(crate) mod target;
pub(crate) mod url;

#[cfg(test)]
pub(crate) mod test_support;

pub use download::ImageDownloader;
pub use processor::{DownloadOutcome, TargetProcessor};
pub use sink::ResultSink;
pub use target::{Target, TargetLists, Timeframe};

/// Errors that abort a whole run.
#[derive(Error, Debug)]
pub enum GrabError {
    #[error(
        "the subreddit lists must have equal lengths: names={names}, destinations={destinations}, timeframes={timeframes}, limits={limits}"
    )]
    LengthMismatch {
        names: usize,
        destinations: usize,
        timeframes: usize,
        limits: usize,
    },

    #[error("subreddit '{name}' has a limit of 0, it must be positive")]
    InvalidLimit { name: String },

    #[error("Cannot reach the post source: {0}")]
    SourceUnavailable(#[source] SourceError),
}

pub type GrabResult<T> = Result<T, GrabError>;

/// Tally of a finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub targets_processed: usize,
    pub targets_skipped: usize,
    pub downloaded: usize,
    pub already_existed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn add(&mut self, outcomes: &[DownloadOutcome]) {
        for outcome in outcomes {
            match outcome {
                DownloadOutcome::Downloaded(_) => self.downloaded += 1,
                DownloadOutcome::AlreadyExists(_) => self.already_existed += 1,
                DownloadOutcome::Skipped(_) => self.skipped += 1,
                DownloadOutcome::Failed(_) => self.failed += 1,
            }
        }
    }
}

/// Checks that `destination` exists and is a directory.
fn validate_directory(destination: &Path) -> Result<(), String> {
    match fs::metadata(destination) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err("not a directory".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Walks the configured targets in order, one at a time.
pub struct Grabber<'a> {
    source: &'a dyn PostSource,
    downloader: &'a ImageDownloader,
    sink: &'a dyn ResultSink,
}

impl<'a> Grabber<'a> {
    pub fn new(source: &'a dyn PostSource, downloader: &'a ImageDownloader, sink: &'a dyn ResultSink) -> Self {
        Self {
            source,
            downloader,
            sink,
        }
    }

    /// Runs the whole batch.
    ///
    /// Only malformed target lists and an unusable post source fail the run;
    /// anything that goes wrong with a single target or post is reported to
    /// the sink and the batch carries on.
    #[instrument(skip_all, fields(targets = lists.names.len()))]
    pub fn run(&self, lists: TargetLists) -> GrabResult<RunSummary> {
        let targets = match lists.into_targets() {
            Ok(targets) => targets,
            Err(e) => {
                if let GrabError::LengthMismatch {
                    names,
                    destinations,
                    timeframes,
                    limits,
                } = &e
                {
                    self.sink.error(
                        "the following lengths should be equal",
                        &[
                            ("len(subredditNames)", names.to_string()),
                            ("len(subredditDestinations)", destinations.to_string()),
                            ("len(subredditTimeframes)", timeframes.to_string()),
                            ("len(subredditLimits)", limits.to_string()),
                        ],
                    );
                } else {
                    self.sink.error("invalid subreddit configuration", &[("err", e.to_string())]);
                }
                return Err(e);
            }
        };

        if let Err(e) = self.source.prepare() {
            self.sink.error("Can't connect to the post source", &[("err", e.to_string())]);
            return Err(GrabError::SourceUnavailable(e));
        }

        let processor = TargetProcessor::new(self.downloader, self.sink);
        let mut summary = RunSummary::default();

        for target in &targets {
            if let Err(reason) = validate_directory(&target.destination) {
                self.sink.error(
                    "Directory error",
                    &[
                        ("subreddit", target.name.clone()),
                        ("directory", target.destination.display().to_string()),
                        ("err", reason),
                    ],
                );
                summary.targets_skipped += 1;
                continue;
            }

            let posts = match self.source.top_posts(&target.name, target.timeframe, target.limit) {
                Ok(posts) => posts,
                Err(e) => {
                    // Not fatal, the remaining subreddits can still be grabbed.
                    warn!("Skipping subreddit {}: {}", target.name, e);
                    self.sink.error(
                        "Can't use subreddit",
                        &[("subreddit", target.name.clone()), ("err", e.to_string())],
                    );
                    summary.targets_skipped += 1;
                    continue;
                }
            };

            let outcomes = processor.process(target, &posts);
            summary.add(&outcomes);
            summary.targets_processed += 1;
        }

        info!(
            targets_processed = summary.targets_processed,
            targets_skipped = summary.targets_skipped,
            downloaded = summary.downloaded,
            already_existed = summary.already_existed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Grab finished"
        );

        Ok(summary)
    }
}
