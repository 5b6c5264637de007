use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

static RESOLUTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)x(\d+)$").expect("valid resolution tag regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u64,
    pub height: u64,
}

fn is_positive(digits: &str) -> bool {
    digits.bytes().any(|b| b != b'0')
}

fn resolution_tag(address: &str) -> Option<(&str, &str)> {
    let segments: Vec<&str> = address.split('/').collect();
    let inner = segments.get(1..segments.len().saturating_sub(1))?;
    inner.iter().copied().find_map(|segment| {
        let caps = RESOLUTION_RE.captures(segment)?;
        let width = caps.get(1)?.as_str();
        let height = caps.get(2)?.as_str();
        (is_positive(width) && is_positive(height)).then_some((width, height))
    })
}

impl Resolution {
    pub fn from_address(address: &str) -> Option<Self> {
        let (width, height) = resolution_tag(address)?;
        Some(Self {
            width: width.parse().ok()?,
            height: height.parse().ok()?,
        })
    }

    pub fn pixels(&self) -> u64 {
        self.width.saturating_mul(self.height)
    }

    pub fn label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

pub fn resolution_label(address: &str) -> String {
    match (Resolution::from_address(address), resolution_tag(address)) {
        (Some(res), _) => res.label(),
        (None, Some((width, height))) => format!("{width}x{height}"),
        (None, None) => "Unknown".to_string(),
    }
}

/// Tagged addresses whose numbers overflow still count; they just rank with the untagged.
pub fn has_resolution_tag(address: &str) -> bool {
    resolution_tag(address).is_some()
}

pub fn has_media_extension(address: &str, extensions: &[String]) -> bool {
    extensions
        .iter()
        .any(|ext| !ext.is_empty() && address.contains(ext.as_str()))
}

pub fn normalize_address(raw: &str) -> String {
    let unescaped = raw.replace("\\u002F", "/").replace('\\', "");
    match unescaped.split_once('?') {
        Some((head, _)) => head.to_string(),
        None => unescaped,
    }
}

pub fn accept_variant(raw: &str, extensions: &[String]) -> Option<String> {
    if !has_media_extension(raw, extensions) {
        return None;
    }
    let cleaned = normalize_address(raw);
    if cleaned.is_empty() || !has_resolution_tag(&cleaned) {
        return None;
    }
    Some(cleaned)
}

pub fn push_unique(urls: &mut Vec<String>, url: String) -> bool {
    if urls.iter().any(|existing| existing == &url) {
        return false;
    }
    urls.push(url);
    true
}

pub fn sort_for_display(urls: &mut [String]) {
    urls.sort_by_key(|url| {
        std::cmp::Reverse(Resolution::from_address(url).map(|res| res.pixels()).unwrap_or(0))
    });
}

pub fn sorted_for_display(urls: &[String]) -> Vec<String> {
    let mut sorted = urls.to_vec();
    sort_for_display(&mut sorted);
    sorted
}

pub fn playable_address<'a>(
    address: &'a str,
    media_host: &str,
    playable_host: Option<&str>,
) -> Cow<'a, str> {
    match playable_host {
        Some(host) if !media_host.is_empty() && address.contains(media_host) => {
            Cow::Owned(address.replacen(media_host, host, 1))
        }
        _ => Cow::Borrowed(address),
    }
}
