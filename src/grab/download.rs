//! Image downloader
//!
//! Downloads never overwrite anything. The destination is opened with exclusive
//! creation before any network traffic, the first bytes of the body are sniffed
//! to make sure the server really sent an image, and any failure after the file
//! was created removes it again so a later run can retry.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Number of leading body bytes inspected before anything is committed to disk.
pub const SNIFF_LEN: usize = 512;

/// Media types we accept after sniffing.
pub const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

const COPY_BUFFER_LEN: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("File already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Can't create {}: {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Could not read response body: {0}")]
    Read(io::Error),

    #[error("Response body is empty")]
    EmptyBody,

    #[error("contentType is not 'image/jpeg' or 'image/png': {0}")]
    ContentType(&'static str),

    #[error("Can't write to file: {0}")]
    Write(io::Error),
}

pub type DownloadResult<T> = Result<T, DownloadError>;

/// Determines the media type of a payload from its leading bytes.
///
/// Follows the signature table browsers use for sniffing, trimmed to what
/// image hosts realistically send back: images, HTML error pages and text.
pub fn sniff_content_type(prefix: &[u8]) -> &'static str {
    const SIGNATURES: [(&[u8], &str); 6] = [
        (&[0xFF, 0xD8, 0xFF], "image/jpeg"),
        (&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], "image/png"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
        (&[0x00, 0x00, 0x01, 0x00], "image/x-icon"),
    ];

    for (signature, content_type) in SIGNATURES {
        if prefix.starts_with(signature) {
            return content_type;
        }
    }

    if prefix.len() >= 14 && &prefix[..4] == b"RIFF" && &prefix[8..14] == b"WEBPVP" {
        return "image/webp";
    }

    let text_start = prefix
        .iter()
        .position(|&b| !matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' '))
        .unwrap_or(prefix.len());
    let trimmed = &prefix[text_start..];
    for tag in ["<!doctype html", "<html", "<head", "<body", "<!--", "<?xml"] {
        if trimmed.len() >= tag.len() && trimmed[..tag.len()].eq_ignore_ascii_case(tag.as_bytes()) {
            return if tag == "<?xml" { "text/xml; charset=utf-8" } else { "text/html; charset=utf-8" };
        }
    }

    let is_binary = prefix
        .iter()
        .any(|&b| b <= 0x08 || b == 0x0B || (0x0E..=0x1A).contains(&b) || (0x1C..=0x1F).contains(&b));
    if is_binary {
        "application/octet-stream"
    } else {
        "text/plain; charset=utf-8"
    }
}

/// Reads until `buf` is full or the reader is exhausted.
fn read_prefix<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Verifies the body is an accepted image and writes it to `file`, prefix first.
fn write_verified<R: Read>(mut body: R, file: &mut File) -> DownloadResult<u64> {
    let mut prefix = [0u8; SNIFF_LEN];
    let read = read_prefix(&mut body, &mut prefix).map_err(DownloadError::Read)?;
    if read == 0 {
        return Err(DownloadError::EmptyBody);
    }

    let content_type = sniff_content_type(&prefix[..read]);
    if !ACCEPTED_CONTENT_TYPES.contains(&content_type) {
        return Err(DownloadError::ContentType(content_type));
    }
    trace!("Sniffed content type {}", content_type);

    file.write_all(&prefix[..read]).map_err(DownloadError::Write)?;

    // Stream the remainder; read and write errors are reported separately.
    let mut buffer = vec![0u8; COPY_BUFFER_LEN];
    let mut rest = 0u64;
    loop {
        let n = match body.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DownloadError::Read(e)),
        };
        file.write_all(&buffer[..n]).map_err(DownloadError::Write)?;
        rest += n as u64;
    }
    file.flush().map_err(DownloadError::Write)?;

    Ok(read as u64 + rest)
}

/// Creates `path` exclusively, fills it from the body `open_body` produces and
/// removes it again if anything after creation fails.
///
/// `open_body` is only invoked once the file exists, so a pre-existing file
/// costs no network round trip.
pub fn save_exclusive<R, F>(path: &Path, open_body: F) -> DownloadResult<u64>
where
    R: Read,
    F: FnOnce() -> DownloadResult<R>,
{
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                DownloadError::AlreadyExists(path.to_path_buf())
            } else {
                DownloadError::Create {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

    let result = open_body().and_then(|body| write_verified(body, &mut file));

    if result.is_err() {
        drop(file);
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove partial file {}: {}", path.display(), e);
        } else {
            debug!("Removed partial file {}", path.display());
        }
    }

    result
}

/// Fetches images over a shared blocking HTTP client.
#[derive(Debug, Clone)]
pub struct ImageDownloader {
    client: Client,
}

impl ImageDownloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Downloads `url` to `destination`, returning the number of bytes written.
    ///
    /// Issues exactly one GET, and only when `destination` did not exist yet.
    pub fn download(&self, url: &str, destination: &Path) -> DownloadResult<u64> {
        save_exclusive(destination, || {
            let response = self.client.get(url).send()?.error_for_status()?;
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grab::test_support::{png_body, JPEG_BYTES};
    use httpmock::prelude::*;
    use tempfile::TempDir;

    /// Yields `data`, then fails instead of reporting end of stream.
    struct BrokenReader {
        data: Vec<u8>,
        pos: usize,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pos >= self.data.len() {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection dropped"));
            }
            let n = buf.len().min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_sniff_content_type() {
        assert_eq!(sniff_content_type(JPEG_BYTES), "image/jpeg");
        assert_eq!(sniff_content_type(&png_body(4)), "image/png");
        assert_eq!(sniff_content_type(b"GIF89a...."), "image/gif");
        assert_eq!(sniff_content_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(
            sniff_content_type(b"  <!DOCTYPE html><html></html>"),
            "text/html; charset=utf-8"
        );
        assert_eq!(sniff_content_type(b"just some words"), "text/plain; charset=utf-8");
        assert_eq!(sniff_content_type(&[0x01, 0x02, 0x03]), "application/octet-stream");
    }

    #[test]
    fn test_save_exclusive_writes_prefix_and_rest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.png");
        let body = png_body(4096);

        let written = save_exclusive(&path, || Ok(io::Cursor::new(body.clone()))).unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(fs::read(&path).unwrap(), body);
    }

    #[test]
    fn test_save_exclusive_small_image_under_sniff_len() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.jpg");

        let written = save_exclusive(&path, || Ok(JPEG_BYTES)).unwrap();

        assert_eq!(written, JPEG_BYTES.len() as u64);
        assert_eq!(fs::read(&path).unwrap(), JPEG_BYTES);
    }

    #[test]
    fn test_save_exclusive_refuses_existing_file_without_fetching() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.jpg");
        fs::write(&path, b"original").unwrap();

        let mut fetched = false;
        let result = save_exclusive(&path, || {
            fetched = true;
            Ok(JPEG_BYTES)
        });

        assert!(matches!(result, Err(DownloadError::AlreadyExists(ref p)) if p == &path));
        assert!(!fetched);
        assert_eq!(fs::read(&path).unwrap(), b"original");
    }

    #[test]
    fn test_wrong_content_type_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.jpg");

        let result = save_exclusive(&path, || Ok(&b"<html><body>not found</body></html>"[..]));

        assert!(matches!(result, Err(DownloadError::ContentType("text/html; charset=utf-8"))));
        assert!(!path.exists());
    }

    #[test]
    fn test_copy_failure_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.png");

        let result = save_exclusive(&path, || {
            Ok(BrokenReader {
                data: png_body(2048),
                pos: 0,
            })
        });

        assert!(matches!(result, Err(DownloadError::Read(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_body_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.png");

        let result = save_exclusive(&path, || Ok(io::empty()));

        assert!(matches!(result, Err(DownloadError::EmptyBody)));
        assert!(!path.exists());
    }

    #[test]
    fn test_download_over_http() {
        let server = MockServer::start();
        let body = png_body(10_000);
        let mock = server.mock(|when, then| {
            when.method(GET).path("/a/pic.png");
            then.status(200).body(body.clone());
        });

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pic.png");
        let downloader = ImageDownloader::new(Client::new());

        let written = downloader.download(&server.url("/a/pic.png"), &path).unwrap();

        mock.assert();
        assert_eq!(written, body.len() as u64);
        assert_eq!(fs::read(&path).unwrap(), body);

        // A second attempt must not hit the network at all.
        let again = downloader.download(&server.url("/a/pic.png"), &path);
        assert!(matches!(again, Err(DownloadError::AlreadyExists(_))));
        mock.assert_calls(1);
    }

    #[test]
    fn test_download_http_error_leaves_no_file() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/gone.jpg");
            then.status(404).body("missing");
        });

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.jpg");
        let downloader = ImageDownloader::new(Client::new());

        let result = downloader.download(&server.url("/gone.jpg"), &path);

        assert!(matches!(result, Err(DownloadError::Request(_))));
        assert!(!path.exists());
    }
}
