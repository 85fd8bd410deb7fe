//! Decides whether a post links straight to an image file.

use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

/// Extensions we are willing to download. Anything else is refused.
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("could not parse url: {0}")]
    Parse(#[from] url::ParseError),

    #[error("url file name '{file_name}' doesn't end in an allowed extension {:?}", ALLOWED_IMAGE_EXTENSIONS)]
    DisallowedExtension { file_name: String },

    #[error("url file name '{file_name}' is not valid UTF-8 once decoded")]
    Decode { file_name: String },
}

pub type UrlResult<T> = Result<T, UrlError>;

/// Pulls an image file name out of a URL, e.g. `https://bob.com/img.jpg?abc` -> `img.jpg`.
///
/// Only the last segment of the path is considered; the query string and
/// fragment never take part in the decision. The segment is percent-decoded,
/// so `my%20pic.jpg` comes back as `my pic.jpg`, and keeps its original case.
pub fn extract_image_file_name(full_url: &str) -> UrlResult<String> {
    let parsed = Url::parse(full_url)?;

    let raw = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let file_name = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| UrlError::Decode {
            file_name: raw.to_string(),
        })?
        .into_owned();
    let lowered = file_name.to_lowercase();

    if ALLOWED_IMAGE_EXTENSIONS
        .iter()
        .any(|suffix| lowered.ends_with(suffix))
    {
        Ok(file_name)
    } else {
        Err(UrlError::DisallowedExtension { file_name })
    }
}
