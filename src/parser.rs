use std::collections::HashSet;

use anyhow::{Context as _, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::config::CaptureConfig;
use crate::error::ParseFailure;
use crate::media;
use crate::store::{MediaFact, PostId, MIN_POST_ID_DIGITS};

static ID_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:id_str|rest_id)"\s*:\s*"(\d{15,})""#).expect("valid id field regex")
});

const AUTHOR_PATHS: &[&[&str]] = &[
    &["core", "user_results", "result", "legacy", "screen_name"],
    &["user_results", "result", "legacy", "screen_name"],
    &["result", "legacy", "screen_name"],
    &["legacy", "user", "screen_name"],
    &["user", "screen_name"],
    &["author", "screen_name"],
    &["screen_name"],
];

const ID_PATHS: &[&[&str]] = &[&["legacy", "id_str"], &["id_str"], &["rest_id"]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Structured,
    Proximity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub strategy: Strategy,
    pub facts: Vec<MediaFact>,
    pub unattributed: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Scope<'v> {
    post_id: Option<&'v str>,
    author: Option<&'v str>,
}

pub struct PayloadParser {
    extensions: Vec<String>,
    proximity_window: usize,
    max_body_bytes: usize,
    address_re: Regex,
}

impl PayloadParser {
    pub fn new(capture: &CaptureConfig) -> Result<Self> {
        let extensions: Vec<&str> = capture
            .media_extensions
            .iter()
            .map(|ext| ext.as_str())
            .filter(|ext| !ext.is_empty())
            .collect();
        let extension_alt = if extensions.is_empty() {
            r"\.mp4".to_string()
        } else {
            extensions
                .iter()
                .map(|ext| regex::escape(ext))
                .collect::<Vec<_>>()
                .join("|")
        };
        let pattern = format!(
            r#"https?://{}/[^"'\s\\]+(?:{})"#,
            regex::escape(&capture.media_host),
            extension_alt
        );
        let address_re = Regex::new(&pattern)
            .with_context(|| format!("parser: invalid media address pattern {pattern:?}"))?;

        Ok(Self {
            extensions: capture.media_extensions.clone(),
            proximity_window: capture.proximity_window,
            max_body_bytes: capture.max_body_bytes,
            address_re,
        })
    }

    pub fn parse_bytes(
        &self,
        body: &[u8],
        page_author: Option<&str>,
    ) -> Result<ParseOutcome, ParseFailure> {
        if self.max_body_bytes > 0 && body.len() > self.max_body_bytes {
            return Err(ParseFailure::TooLarge {
                size: body.len(),
                limit: self.max_body_bytes,
            });
        }
        let text = std::str::from_utf8(body).map_err(|_| ParseFailure::NotText)?;
        Ok(self.parse(text, page_author))
    }

    /// `page_author` is the lowercase handle of the single-post view, if any.
    pub fn parse(&self, body: &str, page_author: Option<&str>) -> ParseOutcome {
        match self.parse_structured(body, page_author) {
            Ok(facts) => ParseOutcome {
                strategy: Strategy::Structured,
                facts,
                unattributed: 0,
            },
            Err(err) => {
                trace!(error = %err, "structured parse failed, scanning by proximity");
                let (facts, unattributed) = self.parse_proximity(body);
                ParseOutcome {
                    strategy: Strategy::Proximity,
                    facts,
                    unattributed,
                }
            }
        }
    }

    fn parse_structured(
        &self,
        body: &str,
        page_author: Option<&str>,
    ) -> Result<Vec<MediaFact>, ParseFailure> {
        let root: Value = serde_json::from_str(body)?;
        let walker = Walker {
            extensions: &self.extensions,
            page_author,
        };
        let mut facts = Vec::new();
        walker.visit(&root, Scope::default(), &mut facts);
        Ok(facts)
    }

    fn parse_proximity(&self, body: &str) -> (Vec<MediaFact>, usize) {
        let ids: Vec<(usize, &str)> = ID_FIELD_RE
            .captures_iter(body)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let id = caps.get(1)?;
                Some((whole.start(), id.as_str()))
            })
            .collect();

        let mut facts: Vec<MediaFact> = Vec::new();
        let mut seen: HashSet<(PostId, String)> = HashSet::new();
        let mut unattributed = 0;
        for found in self.address_re.find_iter(body) {
            let Some(url) = media::accept_variant(found.as_str(), &self.extensions) else {
                continue;
            };
            let at = found.start();
            let preceding = ids.partition_point(|(offset, _)| *offset < at);
            let nearest = preceding.checked_sub(1).map(|slot| ids[slot]);
            let claimed = nearest.and_then(|(offset, id)| {
                let distance = char_distance(body, offset, at, self.proximity_window)?;
                Some((id, distance))
            });
            match claimed.and_then(|(id, distance)| Some((PostId::parse(id).ok()?, distance))) {
                Some((post_id, distance)) => {
                    trace!(post_id = %post_id, url = %url, distance, "proximity match");
                    if seen.insert((post_id.clone(), url.clone())) {
                        facts.push(MediaFact {
                            post_id,
                            author: None,
                            url,
                        });
                    }
                }
                None => {
                    debug!(url = %url, "variant dropped, no identifier within window");
                    unattributed += 1;
                }
            }
        }
        (facts, unattributed)
    }
}

// Characters between `from` and `to`, or `None` past `window`. A char spans 1..=4 bytes,
// so only byte gaps in (window, 4 * window] need counting, and never more than window + 1.
fn char_distance(body: &str, from: usize, to: usize, window: usize) -> Option<usize> {
    let bytes = to - from;
    if bytes <= window {
        return Some(body[from..to].chars().count());
    }
    if bytes > window.saturating_mul(4) {
        return None;
    }
    let distance = body[from..to].chars().take(window + 1).count();
    (distance <= window).then_some(distance)
}

struct Walker<'a> {
    extensions: &'a [String],
    page_author: Option<&'a str>,
}

impl Walker<'_> {
    fn visit<'v>(&self, value: &'v Value, scope: Scope<'v>, out: &mut Vec<MediaFact>) {
        match value {
            Value::Array(items) => {
                for item in items {
                    self.visit(item, scope, out);
                }
            }
            Value::Object(node) => self.visit_object(node, scope, out),
            _ => {}
        }
    }

    fn visit_object<'v>(
        &self,
        node: &'v Map<String, Value>,
        inherited: Scope<'v>,
        out: &mut Vec<MediaFact>,
    ) {
        let scope = Scope {
            post_id: node_post_id(node).or(inherited.post_id),
            author: inherited.author.or_else(|| node_author(node)),
        };

        if let (Some(variants), Some(post_id)) = (node_variants(node), scope.post_id) {
            if self.is_foreign_author(scope.author) {
                trace!(
                    post_id,
                    author = scope.author.unwrap_or_default(),
                    "variants belong to another author, rescanning subtree unscoped"
                );
                for child in node.values() {
                    self.visit(child, Scope::default(), out);
                }
                return;
            }
            self.collect_variants(post_id, scope.author, variants, out);
        }

        for child in node.values() {
            self.visit(child, scope, out);
        }
    }

    fn is_foreign_author(&self, author: Option<&str>) -> bool {
        match (self.page_author, author) {
            (Some(page), Some(author)) => author.to_lowercase() != page,
            _ => false,
        }
    }

    fn collect_variants(
        &self,
        post_id: &str,
        author: Option<&str>,
        variants: &[Value],
        out: &mut Vec<MediaFact>,
    ) {
        let Ok(post_id) = PostId::parse(post_id) else {
            return;
        };
        let mut urls = Vec::new();
        for variant in variants {
            let Some(raw) = variant.get("url").and_then(Value::as_str) else {
                continue;
            };
            if let Some(url) = media::accept_variant(raw, self.extensions) {
                media::push_unique(&mut urls, url);
            }
        }
        let author = author.map(str::to_lowercase);
        out.extend(urls.into_iter().map(|url| MediaFact {
            post_id: post_id.clone(),
            author: author.clone(),
            url,
        }));
    }
}

fn lookup<'v>(node: &'v Map<String, Value>, path: &[&str]) -> Option<&'v Value> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(node.get(*first)?, |value, key| value.get(*key))
}

fn is_post_id(raw: &str) -> bool {
    raw.len() >= MIN_POST_ID_DIGITS && raw.bytes().all(|b| b.is_ascii_digit())
}

fn node_post_id(node: &Map<String, Value>) -> Option<&str> {
    ID_PATHS.iter().find_map(|path| {
        lookup(node, path)
            .and_then(Value::as_str)
            .filter(|raw| is_post_id(raw))
    })
}

fn node_author(node: &Map<String, Value>) -> Option<&str> {
    AUTHOR_PATHS.iter().find_map(|path| {
        lookup(node, path)
            .and_then(Value::as_str)
            .filter(|handle| !handle.is_empty())
    })
}

fn node_variants(node: &Map<String, Value>) -> Option<&[Value]> {
    node.get("video_info")?
        .get("variants")?
        .as_array()
        .map(Vec::as_slice)
}
