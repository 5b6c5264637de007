use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::{debug, info, trace};

use crate::config::Config;
use crate::dom::{ArticleSnapshot, DomExtractor, DomScope, PageDom, Scope};
use crate::location::PageLocation;
use crate::media;
use crate::parser::{ParseOutcome, PayloadParser};
use crate::resolver::{self, Candidate, InteractionHints, ResolveInput, Resolution};
use crate::store::CorrelationStore;

#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    pub method: &'a str,
    pub url: &'a str,
}

pub trait ResponseSink: Send + Sync {
    fn on_response(&self, request: &RequestInfo<'_>, body: &[u8]);
}

pub struct Engine {
    config: Config,
    parser: PayloadParser,
    store: Arc<CorrelationStore>,
    location: RwLock<PageLocation>,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_store(config, Arc::new(CorrelationStore::new()))
    }

    pub fn with_store(config: Config, store: Arc<CorrelationStore>) -> Result<Self> {
        let parser = PayloadParser::new(&config.capture)?;
        Ok(Self {
            config,
            parser,
            store,
            location: RwLock::new(PageLocation::default()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> Arc<CorrelationStore> {
        self.store.clone()
    }

    pub fn location(&self) -> PageLocation {
        self.location.read().clone()
    }

    pub fn navigate(&self, href: &str) -> bool {
        let mut location = self.location.write();
        if location.href == href {
            return false;
        }
        *location = PageLocation::parse(href);
        drop(location);
        self.store.clear();
        info!(location = href, "location changed, correlation state reset");
        true
    }

    pub fn ingest(&self, body: &str) -> ParseOutcome {
        let page_author = self.location.read().author.clone();
        let outcome = self.parser.parse(body, page_author.as_deref());
        self.record(&outcome);
        outcome
    }

    fn record(&self, outcome: &ParseOutcome) {
        let added = self.store.apply(&outcome.facts);
        debug!(
            strategy = ?outcome.strategy,
            facts = outcome.facts.len(),
            added,
            unattributed = outcome.unattributed,
            "payload ingested"
        );
    }

    pub fn hints(&self, article_author: Option<String>) -> InteractionHints {
        InteractionHints::new(&self.location.read(), article_author)
    }

    pub fn resolve(
        &self,
        hints: &InteractionHints,
        article: Option<&dyn DomScope>,
        page: &dyn PageDom,
    ) -> Resolution {
        let records = self.store.all();
        debug!(
            page_post_id = hints.page_post_id.as_ref().map(|id| id.as_str()).unwrap_or("none"),
            page_author = hints.page_author.as_deref().unwrap_or("none"),
            article_author = hints.article_author.as_deref().unwrap_or("none"),
            records = records.len(),
            "resolving interaction"
        );
        let input = ResolveInput {
            hints,
            records: &records,
            article,
            page,
            extractor: self.dom_extractor(),
        };
        resolver::resolve(&input)
    }

    pub fn resolve_click(
        &self,
        article: Option<&ArticleSnapshot>,
        page: &dyn PageDom,
    ) -> Resolution {
        let hints = self.hints(article.and_then(ArticleSnapshot::author));
        self.resolve(&hints, article.map(|a| a as &dyn DomScope), page)
    }

    pub fn extract_from_page(&self, page: &dyn PageDom) -> Vec<String> {
        self.dom_extractor().extract(Scope::Document(page))
    }

    pub fn candidates(&self) -> Vec<Candidate> {
        resolver::candidates(&self.store.all())
    }

    pub fn playable_urls(&self, urls: &[String]) -> Vec<String> {
        urls.iter()
            .map(|url| {
                media::playable_address(
                    url,
                    &self.config.capture.media_host,
                    self.config.display.playable_host.as_deref(),
                )
                .into_owned()
            })
            .collect()
    }

    fn dom_extractor(&self) -> DomExtractor<'_> {
        DomExtractor {
            extensions: &self.config.capture.media_extensions,
            media_host: &self.config.capture.media_host,
        }
    }
}

impl ResponseSink for Engine {
    fn on_response(&self, request: &RequestInfo<'_>, body: &[u8]) {
        if !self.config.capture.is_api_request(request.url) {
            return;
        }
        let page_author = self.location.read().author.clone();
        match self.parser.parse_bytes(body, page_author.as_deref()) {
            Ok(outcome) => self.record(&outcome),
            Err(err) => trace!(
                method = request.method,
                url = request.url,
                error = %err,
                "response ignored"
            ),
        }
    }
}
