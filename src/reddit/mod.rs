//! Read-only access to subreddit listings.

use std::env::consts::OS;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, instrument, trace};
use url::Url;

use crate::grab::Timeframe;

pub(crate) mod entries;

use entries::Listing;

/// Where listings come from unless the config says otherwise.
pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Invalid base url '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Subreddit '{name}' returned HTTP {status}")]
    Status { name: String, status: StatusCode },

    #[error("Malformed listing for '{name}': {reason}")]
    Listing { name: String, reason: String },
}

pub type SourceResult<T> = Result<T, SourceError>;

/// One candidate post as returned by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub title: String,
    pub url: String,
    pub is_adult_content: bool,
}

/// Anything that can hand out a community's top posts.
pub trait PostSource {
    /// Called once before a batch starts. A failure here aborts the whole run.
    fn prepare(&self) -> SourceResult<()> {
        Ok(())
    }

    /// Top posts of `community` for `timeframe`, at most `limit` of them, in ranking order.
    fn top_posts(&self, community: &str, timeframe: Timeframe, limit: u32) -> SourceResult<Vec<Post>>;
}

/// User agent sent with every request, e.g. `linux:grabbit:0.1.0`.
pub fn user_agent() -> String {
    format!("{}:{}:{}", OS, env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Builds the HTTP client shared by listing fetches and image downloads.
///
/// `timeout` applies to every request made through it.
pub fn http_client(timeout: Duration) -> SourceResult<Client> {
    let client = Client::builder()
        .user_agent(user_agent())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(30)))
        .pool_idle_timeout(Duration::from_secs(90))
        .gzip(true)
        .build()?;
    Ok(client)
}

/// Read-only client for the public JSON listing endpoints.
#[derive(Debug, Clone)]
pub struct RedditClient {
    client: Client,
    base_url: Url,
}

impl RedditClient {
    pub fn new(client: Client, base_url: &str) -> SourceResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| SourceError::BaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::BaseUrl {
                url: base_url.to_string(),
                reason: "url cannot be used as a base".to_string(),
            });
        }

        Ok(Self { client, base_url })
    }

    fn top_url(&self, community: &str, timeframe: Timeframe, limit: u32) -> SourceResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::BaseUrl {
                url: self.base_url.to_string(),
                reason: "url cannot be used as a base".to_string(),
            })?
            .pop_if_empty()
            .extend(&["r", community, "top.json"]);
        url.query_pairs_mut()
            .append_pair("t", timeframe.as_str())
            .append_pair("limit", &limit.to_string())
            .append_pair("raw_json", "1");
        Ok(url)
    }
}

impl PostSource for RedditClient {
    /// Makes sure the listing host answers at all before any target is touched.
    fn prepare(&self) -> SourceResult<()> {
        let response = self.client.get(self.base_url.clone()).send()?;
        debug!(
            "Connection check against {} answered {}",
            self.base_url,
            response.status()
        );
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn top_posts(&self, community: &str, timeframe: Timeframe, limit: u32) -> SourceResult<Vec<Post>> {
        let url = self.top_url(community, timeframe, limit)?;
        trace!("Fetching listing {}", url);

        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                name: community.to_string(),
                status,
            });
        }

        let body = response.text()?;
        let listing: Listing = serde_json::from_str(&body).map_err(|e| SourceError::Listing {
            name: community.to_string(),
            reason: e.to_string(),
        })?;

        let posts = listing.into_posts();
        debug!("Received {} posts for {}", posts.len(), community);
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn listing_body() -> String {
        json!({
            "kind": "Listing",
            "data": {
                "after": "t3_zzz",
                "children": [
                    {"kind": "t3", "data": {"title": "Sunset", "url": "https://i.redd.it/a.jpg", "over_18": false}},
                    {"kind": "t5", "data": {"title": "Not a post"}},
                    {"kind": "t3", "data": {"title": "Spicy", "url": "https://i.redd.it/b.png", "over_18": true}},
                    {"kind": "t3", "data": {"title": "Gallery", "url": "https://www.reddit.com/gallery/x"}}
                ]
            }
        })
        .to_string()
    }

    fn client_for(server: &MockServer) -> RedditClient {
        let http = http_client(Duration::from_secs(5)).unwrap();
        RedditClient::new(http, &server.base_url()).unwrap()
    }

    #[test]
    fn test_top_posts_decodes_listing_in_order() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/r/wallpapers/top.json")
                .query_param("t", "day")
                .query_param("limit", "3")
                .query_param("raw_json", "1")
                .header("user-agent", user_agent());
            then.status(200)
                .header("content-type", "application/json")
                .body(listing_body());
        });

        let posts = client_for(&server)
            .top_posts("wallpapers", Timeframe::Day, 3)
            .unwrap();

        mock.assert();
        assert_eq!(
            posts,
            vec![
                Post {
                    title: "Sunset".to_string(),
                    url: "https://i.redd.it/a.jpg".to_string(),
                    is_adult_content: false,
                },
                Post {
                    title: "Spicy".to_string(),
                    url: "https://i.redd.it/b.png".to_string(),
                    is_adult_content: true,
                },
                Post {
                    title: "Gallery".to_string(),
                    url: "https://www.reddit.com/gallery/x".to_string(),
                    is_adult_content: false,
                },
            ]
        );
    }

    #[test]
    fn test_top_posts_reports_http_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/r/private/top.json");
            then.status(403).body("{}");
        });

        let result = client_for(&server).top_posts("private", Timeframe::Week, 5);

        match result {
            Err(SourceError::Status { name, status }) => {
                assert_eq!(name, "private");
                assert_eq!(status, StatusCode::FORBIDDEN);
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[test]
    fn test_top_posts_rejects_malformed_listing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/r/broken/top.json");
            then.status(200).body("<html>maintenance</html>");
        });

        let result = client_for(&server).top_posts("broken", Timeframe::All, 1);
        assert!(matches!(result, Err(SourceError::Listing { .. })));
    }

    #[test]
    fn test_top_url_encodes_community() {
        let http = http_client(Duration::from_secs(5)).unwrap();
        let client = RedditClient::new(http, "https://www.reddit.com").unwrap();

        let url = client.top_url("odd name", Timeframe::Month, 10).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.reddit.com/r/odd%20name/top.json?t=month&limit=10&raw_json=1"
        );
    }

    #[test]
    fn test_new_rejects_bad_base_url() {
        let http = http_client(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            RedditClient::new(http.clone(), "not a url"),
            Err(SourceError::BaseUrl { .. })
        ));
        assert!(matches!(
            RedditClient::new(http, "mailto:someone@example.com"),
            Err(SourceError::BaseUrl { .. })
        ));
    }

    #[test]
    fn test_prepare_succeeds_when_host_answers() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200);
        });

        assert!(client_for(&server).prepare().is_ok());
    }

    #[test]
    fn test_prepare_fails_when_host_is_unreachable() {
        let http = http_client(Duration::from_secs(2)).unwrap();
        // Port 9 on localhost is the discard service and is essentially never listening.
        let client = RedditClient::new(http, "http://127.0.0.1:9").unwrap();
        assert!(matches!(client.prepare(), Err(SourceError::Request(_))));
    }
}
