use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::media;
use crate::store::PostId;

const RESERVED_PATHS: &[&str] = &[
    "home",
    "explore",
    "notifications",
    "messages",
    "settings",
    "i",
    "search",
    "compose",
];

static PROFILE_HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([A-Za-z0-9_]+)$").expect("valid profile href regex"));
static STATUS_AUTHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([^/]+)/status/").expect("valid status author regex"));
static STATUS_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/status/(\d+)").expect("valid status id regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaElement {
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl MediaElement {
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.src
            .as_deref()
            .into_iter()
            .chain(self.sources.iter().map(String::as_str))
    }
}

pub trait DomScope {
    fn media_elements(&self) -> Vec<MediaElement>;
}

/// The whole document. Resource-load history only exists at this granularity.
pub trait PageDom: DomScope {
    fn resource_entries(&self) -> Vec<String>;
}

#[derive(Clone, Copy)]
pub enum Scope<'a> {
    Subtree(&'a dyn DomScope),
    Document(&'a dyn PageDom),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleSnapshot {
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub user_name_spans: Vec<String>,
    #[serde(default)]
    pub time_link: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaElement>,
}

impl ArticleSnapshot {
    pub fn author(&self) -> Option<String> {
        self.author_from_profile_link()
            .or_else(|| self.author_from_user_name())
            .or_else(|| self.author_from_time_link())
    }

    pub fn post_id(&self) -> Option<PostId> {
        self.time_link
            .iter()
            .chain(self.links.iter())
            .filter_map(|href| STATUS_ID_RE.captures(href))
            .find_map(|caps| PostId::parse(&caps[1]).ok())
    }

    fn author_from_profile_link(&self) -> Option<String> {
        self.links.iter().find_map(|href| {
            let caps = PROFILE_HREF_RE.captures(href)?;
            let handle = caps[1].to_lowercase();
            (!RESERVED_PATHS.contains(&handle.as_str())).then_some(handle)
        })
    }

    fn author_from_user_name(&self) -> Option<String> {
        self.user_name_spans.iter().find_map(|text| {
            let handle = text.strip_prefix('@')?;
            (!handle.is_empty()).then(|| handle.to_lowercase())
        })
    }

    fn author_from_time_link(&self) -> Option<String> {
        let href = self.time_link.as_deref()?;
        STATUS_AUTHOR_RE
            .captures(href)
            .map(|caps| caps[1].to_lowercase())
    }
}

impl DomScope for ArticleSnapshot {
    fn media_elements(&self) -> Vec<MediaElement> {
        self.media.clone()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub media: Vec<MediaElement>,
    #[serde(default)]
    pub resources: Vec<String>,
}

impl DomScope for PageSnapshot {
    fn media_elements(&self) -> Vec<MediaElement> {
        self.media.clone()
    }
}

impl PageDom for PageSnapshot {
    fn resource_entries(&self) -> Vec<String> {
        self.resources.clone()
    }
}

pub struct DomExtractor<'a> {
    pub extensions: &'a [String],
    pub media_host: &'a str,
}

impl DomExtractor<'_> {
    pub fn extract(&self, scope: Scope<'_>) -> Vec<String> {
        let mut urls = Vec::new();
        let elements = match scope {
            Scope::Subtree(dom) => dom.media_elements(),
            Scope::Document(page) => page.media_elements(),
        };
        for element in &elements {
            for address in element.addresses() {
                self.collect(&mut urls, address);
            }
        }

        if let Scope::Document(page) = scope {
            for entry in page.resource_entries() {
                if !self.media_host.is_empty() && entry.contains(self.media_host) {
                    self.collect(&mut urls, &entry);
                }
            }
        }

        let scope_name = match scope {
            Scope::Subtree(_) => "article",
            Scope::Document(_) => "page",
        };
        tracing::debug!(found = urls.len(), scope = scope_name, "dom fallback scan");
        urls
    }

    fn collect(&self, urls: &mut Vec<String>, address: &str) {
        if let Some(url) = media::accept_variant(address, self.extensions) {
            media::push_unique(urls, url);
        }
    }
}
