use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::dom::{DomExtractor, DomScope, PageDom, Scope};
use crate::location::PageLocation;
use crate::media;
use crate::store::{MediaRecord, PostId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionHints {
    pub page_post_id: Option<PostId>,
    pub page_author: Option<String>,
    pub article_author: Option<String>,
}

impl InteractionHints {
    pub fn new(location: &PageLocation, article_author: Option<String>) -> Self {
        Self {
            page_post_id: location.post_id.clone(),
            page_author: location.author.clone(),
            article_author: article_author
                .map(|author| author.to_lowercase())
                .filter(|author| !author.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    PageAuthor,
    MostRecent,
    ArticleAuthor,
    ArticleDom,
    PageDom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedMedia {
    pub source: MatchSource,
    pub post_id: Option<PostId>,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub post_id: PostId,
    pub author: Option<String>,
    pub best_resolution: String,
    pub urls: Vec<String>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Matched(MatchedMedia),
    Ambiguous(Vec<Candidate>),
    NoMatch,
}

impl Resolution {
    pub fn urls(&self) -> &[String] {
        match self {
            Resolution::Matched(matched) => &matched.urls,
            _ => &[],
        }
    }
}

pub struct ResolveInput<'a> {
    pub hints: &'a InteractionHints,
    pub records: &'a [(PostId, MediaRecord)],
    pub article: Option<&'a dyn DomScope>,
    pub page: &'a dyn PageDom,
    pub extractor: DomExtractor<'a>,
}

type Tier = fn(&ResolveInput<'_>) -> Option<MatchedMedia>;

const TIERS: &[Tier] = &[
    page_author_match,
    most_recent_match,
    article_author_match,
    article_dom_match,
    page_dom_match,
];

pub fn resolve(input: &ResolveInput<'_>) -> Resolution {
    for tier in TIERS {
        if let Some(mut matched) = tier(input).filter(|m| !m.urls.is_empty()) {
            media::sort_for_display(&mut matched.urls);
            info!(
                source = ?matched.source,
                post_id = matched.post_id.as_ref().map(PostId::as_str).unwrap_or("none"),
                count = matched.urls.len(),
                "resolved media"
            );
            return Resolution::Matched(matched);
        }
    }

    if input.records.is_empty() {
        info!("no media found for interaction");
        return Resolution::NoMatch;
    }
    let candidates = candidates(input.records);
    debug!(count = candidates.len(), "no tier matched, offering candidates");
    if candidates.is_empty() {
        Resolution::NoMatch
    } else {
        Resolution::Ambiguous(candidates)
    }
}

pub fn candidates(records: &[(PostId, MediaRecord)]) -> Vec<Candidate> {
    let mut with_media: Vec<&(PostId, MediaRecord)> = records
        .iter()
        .filter(|(_, record)| !record.urls.is_empty())
        .collect();
    with_media.sort_by(|(_, a), (_, b)| {
        (b.captured_at, b.sequence).cmp(&(a.captured_at, a.sequence))
    });
    with_media
        .into_iter()
        .map(|(post_id, record)| {
            let urls = media::sorted_for_display(&record.urls);
            let best_resolution = urls
                .first()
                .map(|url| media::resolution_label(url))
                .unwrap_or_else(|| "Unknown".to_string());
            Candidate {
                post_id: post_id.clone(),
                author: record.author.clone(),
                best_resolution,
                urls,
                captured_at: record.captured_at,
            }
        })
        .collect()
}

fn from_record(source: MatchSource, post_id: &PostId, record: &MediaRecord) -> MatchedMedia {
    MatchedMedia {
        source,
        post_id: Some(post_id.clone()),
        urls: record.urls.clone(),
    }
}

fn most_recent<'r>(
    records: impl Iterator<Item = &'r (PostId, MediaRecord)>,
) -> Option<&'r (PostId, MediaRecord)> {
    let mut best: Option<&'r (PostId, MediaRecord)> = None;
    for entry in records {
        if best.map_or(true, |current| entry.1.is_more_recent_than(&current.1)) {
            best = Some(entry);
        }
    }
    best
}

/// Single-post view: the record written by the page author. With no explicit author
/// match, the first record holding any media is taken instead.
fn page_author_match(input: &ResolveInput<'_>) -> Option<MatchedMedia> {
    input.hints.page_post_id.as_ref()?;
    let page_author = input.hints.page_author.as_deref()?;
    if input.records.is_empty() {
        return None;
    }

    let mut chosen: Option<&(PostId, MediaRecord)> = None;
    for entry in input.records {
        let record = &entry.1;
        if record.authored_by(page_author) || (chosen.is_none() && !record.urls.is_empty()) {
            chosen = Some(entry);
        }
    }
    let (post_id, record) = chosen?;
    if !record.authored_by(page_author) {
        debug!(
            post_id = %post_id,
            page_author,
            "no record by page author, taking first with media"
        );
    }
    Some(from_record(MatchSource::PageAuthor, post_id, record))
}

fn most_recent_match(input: &ResolveInput<'_>) -> Option<MatchedMedia> {
    input.hints.page_post_id.as_ref()?;
    let (post_id, record) = most_recent(
        input
            .records
            .iter()
            .filter(|(_, record)| !record.urls.is_empty()),
    )?;
    Some(from_record(MatchSource::MostRecent, post_id, record))
}

fn article_author_match(input: &ResolveInput<'_>) -> Option<MatchedMedia> {
    let author = input.hints.article_author.as_deref()?;
    let (post_id, record) = most_recent(
        input
            .records
            .iter()
            .filter(|(_, record)| record.authored_by(author)),
    )?;
    Some(from_record(MatchSource::ArticleAuthor, post_id, record))
}

fn article_dom_match(input: &ResolveInput<'_>) -> Option<MatchedMedia> {
    let article = input.article?;
    Some(MatchedMedia {
        source: MatchSource::ArticleDom,
        post_id: None,
        urls: input.extractor.extract(Scope::Subtree(article)),
    })
}

fn page_dom_match(input: &ResolveInput<'_>) -> Option<MatchedMedia> {
    Some(MatchedMedia {
        source: MatchSource::PageDom,
        post_id: None,
        urls: input.extractor.extract(Scope::Document(input.page)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ArticleSnapshot, MediaElement, PageSnapshot};
    use chrono::Duration;

    const EXT: &[&str] = &[".mp4"];

    fn record(author: Option<&str>, urls: &[&str], age_secs: i64, sequence: u64) -> MediaRecord {
        MediaRecord {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            author: author.map(str::to_string),
            captured_at: Utc::now() - Duration::seconds(age_secs),
            sequence,
        }
    }

    fn pid(raw: &str) -> PostId {
        PostId::parse(raw).unwrap()
    }

    fn single_post(author: &str) -> InteractionHints {
        InteractionHints {
            page_post_id: Some(pid("900000000000000")),
            page_author: Some(author.into()),
            article_author: None,
        }
    }

    fn run(
        hints: &InteractionHints,
        records: &[(PostId, MediaRecord)],
        article: Option<&ArticleSnapshot>,
        page: &PageSnapshot,
    ) -> Resolution {
        let extensions: Vec<String> = EXT.iter().map(|e| e.to_string()).collect();
        let input = ResolveInput {
            hints,
            records,
            article: article.map(|a| a as &dyn DomScope),
            page,
            extractor: DomExtractor {
                extensions: &extensions,
                media_host: "video.twimg.com",
            },
        };
        resolve(&input)
    }

    fn matched(resolution: Resolution) -> MatchedMedia {
        match resolution {
            Resolution::Matched(m) => m,
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn page_author_beats_more_recent_unrelated_record() {
        let records = vec![
            (pid("111111111111111"), record(Some("bob"), &["https://v/640x360/bob.mp4"], 60, 0)),
            (pid("222222222222222"), record(Some("zed"), &["https://v/1280x720/zed.mp4"], 1, 1)),
        ];
        let m = matched(run(&single_post("bob"), &records, None, &PageSnapshot::default()));
        assert_eq!(m.source, MatchSource::PageAuthor);
        assert_eq!(m.post_id, Some(pid("111111111111111")));
        assert_eq!(m.urls, vec!["https://v/640x360/bob.mp4"]);
    }

    #[test]
    fn page_author_tier_is_permissive_without_explicit_match() {
        let records = vec![
            (pid("111111111111111"), record(Some("carol"), &["https://v/640x360/c.mp4"], 60, 0)),
            (pid("222222222222222"), record(Some("erin"), &["https://v/640x360/e.mp4"], 1, 1)),
        ];
        let m = matched(run(&single_post("bob"), &records, None, &PageSnapshot::default()));
        assert_eq!(m.source, MatchSource::PageAuthor);
        assert_eq!(m.post_id, Some(pid("111111111111111")));
    }

    #[test]
    fn page_author_tier_prefers_explicit_match_over_earlier_record() {
        let records = vec![
            (pid("111111111111111"), record(None, &["https://v/640x360/a.mp4"], 60, 0)),
            (pid("222222222222222"), record(Some("bob"), &["https://v/640x360/b.mp4"], 30, 1)),
        ];
        let m = matched(run(&single_post("bob"), &records, None, &PageSnapshot::default()));
        assert_eq!(m.post_id, Some(pid("222222222222222")));
    }

    #[test]
    fn single_post_without_page_author_takes_most_recent() {
        let hints = InteractionHints {
            page_post_id: Some(pid("900000000000000")),
            ..InteractionHints::default()
        };
        let records = vec![
            (pid("111111111111111"), record(None, &["https://v/640x360/old.mp4"], 60, 0)),
            (pid("222222222222222"), record(None, &["https://v/640x360/new.mp4"], 1, 1)),
            (pid("333333333333333"), record(None, &[], 0, 2)),
        ];
        let m = matched(run(&hints, &records, None, &PageSnapshot::default()));
        assert_eq!(m.source, MatchSource::MostRecent);
        assert_eq!(m.post_id, Some(pid("222222222222222")));
    }

    #[test]
    fn feed_view_matches_article_author_most_recent() {
        let hints = InteractionHints {
            article_author: Some("dana".into()),
            ..InteractionHints::default()
        };
        let records = vec![
            (pid("111111111111111"), record(Some("dana"), &["https://v/640x360/old.mp4"], 60, 0)),
            (pid("222222222222222"), record(Some("dana"), &["https://v/640x360/new.mp4"], 5, 1)),
            (pid("333333333333333"), record(Some("erin"), &["https://v/640x360/e.mp4"], 1, 2)),
        ];
        let m = matched(run(&hints, &records, None, &PageSnapshot::default()));
        assert_eq!(m.source, MatchSource::ArticleAuthor);
        assert_eq!(m.post_id, Some(pid("222222222222222")));
    }

    #[test]
    fn falls_back_to_article_dom_then_page_dom() {
        let hints = InteractionHints {
            article_author: Some("nobody".into()),
            ..InteractionHints::default()
        };
        let article = ArticleSnapshot {
            media: vec![MediaElement {
                src: Some("https://video.twimg.com/v/480x270/art.mp4?x=1".into()),
                sources: vec![],
            }],
            ..ArticleSnapshot::default()
        };
        let page = PageSnapshot {
            media: vec![],
            resources: vec!["https://video.twimg.com/v/720x720/page.mp4".into()],
        };

        let m = matched(run(&hints, &[], Some(&article), &page));
        assert_eq!(m.source, MatchSource::ArticleDom);
        assert_eq!(m.urls, vec!["https://video.twimg.com/v/480x270/art.mp4"]);
        assert!(m.post_id.is_none());

        let m = matched(run(&hints, &[], Some(&ArticleSnapshot::default()), &page));
        assert_eq!(m.source, MatchSource::PageDom);
        assert_eq!(m.urls, vec!["https://video.twimg.com/v/720x720/page.mp4"]);
    }

    #[test]
    fn unmatched_store_offers_candidates_most_recent_first() {
        let hints = InteractionHints {
            article_author: Some("nobody".into()),
            ..InteractionHints::default()
        };
        let records = vec![
            (
                pid("111111111111111"),
                record(Some("a"), &["https://v/640x360/a.mp4", "https://v/1280x720/a.mp4"], 60, 0),
            ),
            (pid("222222222222222"), record(Some("b"), &["https://v/480x270/b.mp4"], 5, 1)),
        ];
        match run(&hints, &records, None, &PageSnapshot::default()) {
            Resolution::Ambiguous(candidates) => {
                assert_eq!(candidates.len(), 2);
                assert_eq!(candidates[0].post_id, pid("222222222222222"));
                assert_eq!(candidates[1].best_resolution, "1280x720");
                assert_eq!(candidates[1].urls[0], "https://v/1280x720/a.mp4");
            }
            other => panic!("expected candidates, got {other:?}"),
        }
    }

    #[test]
    fn empty_store_and_page_is_no_match() {
        let resolution = run(
            &InteractionHints::default(),
            &[],
            None,
            &PageSnapshot::default(),
        );
        assert_eq!(resolution, Resolution::NoMatch);
        assert!(resolution.urls().is_empty());
    }

    #[test]
    fn matched_urls_are_in_display_order() {
        let records = vec![(
            pid("111111111111111"),
            record(
                Some("bob"),
                &[
                    "https://v/480x270/s.mp4",
                    "https://v/1920x1080/l.mp4",
                    "https://v/1280x720/m.mp4",
                ],
                1,
                0,
            ),
        )];
        let m = matched(run(&single_post("bob"), &records, None, &PageSnapshot::default()));
        assert_eq!(
            m.urls,
            vec![
                "https://v/1920x1080/l.mp4",
                "https://v/1280x720/m.mp4",
                "https://v/480x270/s.mp4",
            ]
        );
    }

    #[test]
    fn hints_lowercase_article_author() {
        let location = PageLocation::parse("https://x.com/home");
        let hints = InteractionHints::new(&location, Some("Dana".into()));
        assert_eq!(hints.article_author.as_deref(), Some("dana"));
        assert!(hints.page_post_id.is_none());
    }
}
