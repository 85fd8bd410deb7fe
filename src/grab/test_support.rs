//! Test doubles and fixtures shared by the grab tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use crate::grab::download::ImageDownloader;
use crate::grab::sink::{Field, ResultSink, Severity};
use crate::grab::Timeframe;
use crate::reddit::{http_client, Post, PostSource, SourceError, SourceResult};

/// Smallest prefix that sniffs as JPEG.
pub(crate) const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

/// A PNG signature followed by `len` filler bytes.
pub(crate) fn png_body(len: usize) -> Vec<u8> {
    let mut body = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    body.extend((0..len).map(|i| (i % 251) as u8));
    body
}

pub(crate) fn test_downloader() -> ImageDownloader {
    ImageDownloader::new(http_client(Duration::from_secs(5)).expect("http client"))
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedEvent {
    pub severity: Severity,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl RecordedEvent {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: RefCell<Vec<RecordedEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.borrow().clone()
    }

    pub fn errors(&self) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.severity == Severity::Error)
            .collect()
    }
}

impl ResultSink for RecordingSink {
    fn record(&self, severity: Severity, message: &str, fields: &[Field<'_>]) {
        self.events.borrow_mut().push(RecordedEvent {
            severity,
            message: message.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });
    }
}

/// Serves canned listings and remembers which communities were asked for.
#[derive(Default)]
pub(crate) struct StaticSource {
    listings: HashMap<String, Vec<Post>>,
    fail_prepare: bool,
    requests: RefCell<Vec<(String, Timeframe, u32)>>,
}

impl StaticSource {
    pub fn with(mut self, community: &str, posts: Vec<Post>) -> Self {
        self.listings.insert(community.to_string(), posts);
        self
    }

    /// Makes `prepare` fail, as if the host were down.
    pub fn unreachable(mut self) -> Self {
        self.fail_prepare = true;
        self
    }

    pub fn requests(&self) -> Vec<(String, Timeframe, u32)> {
        self.requests.borrow().clone()
    }
}

impl PostSource for StaticSource {
    fn prepare(&self) -> SourceResult<()> {
        if self.fail_prepare {
            return Err(SourceError::BaseUrl {
                url: "http://unreachable.invalid".to_string(),
                reason: "offline".to_string(),
            });
        }
        Ok(())
    }

    fn top_posts(&self, community: &str, timeframe: Timeframe, limit: u32) -> SourceResult<Vec<Post>> {
        self.requests
            .borrow_mut()
            .push((community.to_string(), timeframe, limit));
        match self.listings.get(community) {
            Some(posts) => Ok(posts.iter().take(limit as usize).cloned().collect()),
            None => Err(SourceError::Listing {
                name: community.to_string(),
                reason: "no such subreddit".to_string(),
            }),
        }
    }
}
