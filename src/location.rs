use url::Url;

use crate::store::PostId;

const FEED_HOSTS: &[&str] = &["twitter.com", "x.com", "mobile.twitter.com", "mobile.x.com"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLocation {
    pub href: String,
    pub post_id: Option<PostId>,
    pub author: Option<String>,
}

impl PageLocation {
    pub fn parse(href: &str) -> Self {
        let mut location = Self {
            href: href.to_string(),
            ..Self::default()
        };
        let Ok(url) = Url::parse(href.trim()) else {
            return location;
        };
        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let Some(status_at) = segments.iter().position(|seg| *seg == "status") else {
            return location;
        };
        let Some(digits) = segments.get(status_at + 1).map(|seg| leading_digits(seg)) else {
            return location;
        };
        if digits.is_empty() {
            return location;
        }
        location.post_id = PostId::parse(digits).ok();

        if status_at > 0 && url.host_str().is_some_and(is_feed_host) {
            location.author = Some(segments[status_at - 1].to_lowercase());
        }
        location
    }

    pub fn is_single_post_view(&self) -> bool {
        self.post_id.is_some()
    }
}

fn is_feed_host(host: &str) -> bool {
    let host = host.strip_prefix("www.").unwrap_or(host);
    FEED_HOSTS.iter().any(|known| host.eq_ignore_ascii_case(known))
}

fn leading_digits(segment: &str) -> &str {
    let end = segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(segment.len());
    &segment[..end]
}
