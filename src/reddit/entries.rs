use serde::Deserialize;

use crate::reddit::Post;

/// Kind tag the listing API gives link submissions.
pub(crate) const LINK_KIND: &str = "t3";

/// Top level of a `/r/<name>/top.json` response.
#[derive(Deserialize, Debug)]
pub(crate) struct Listing {
    pub data: ListingData,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ListingData {
    #[serde(default)]
    pub children: Vec<Child>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct Child {
    pub kind: String,
    pub data: PostEntry,
}

/// The fields of a link submission this tool cares about.
#[derive(Deserialize, Debug, Default, Clone)]
pub(crate) struct PostEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub over_18: bool,
}

impl From<PostEntry> for Post {
    fn from(entry: PostEntry) -> Self {
        Post {
            title: entry.title,
            url: entry.url,
            is_adult_content: entry.over_18,
        }
    }
}

impl Listing {
    /// Link posts in listing order; anything that isn't a submission is dropped.
    pub(crate) fn into_posts(self) -> Vec<Post> {
        self.data
            .children
            .into_iter()
            .filter(|child| child.kind == LINK_KIND)
            .map(|child| Post::from(child.data))
            .collect()
    }
}
