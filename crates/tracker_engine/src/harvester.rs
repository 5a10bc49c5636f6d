use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracker_core::{
    CycleVerdict, DiscoverySet, HarvestOutcome, HarvestStats, HarvestStop, IdentityResolver,
    StagnationTracker, DEFAULT_STAGNATION_THRESHOLD,
};
use tracker_logging::{track_debug, track_info, track_trace, track_warn};

use crate::collector::{CollectorError, PageCollector};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    pub max_pages: u32,
    pub stagnation_threshold: u32,
    pub max_cycles_per_page: u32,
    pub stop_on_empty_page: bool,
    /// Upper bound for every single collector call.
    pub call_timeout: Duration,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            max_pages: 100,
            stagnation_threshold: DEFAULT_STAGNATION_THRESHOLD,
            max_cycles_per_page: 50,
            stop_on_empty_page: true,
            call_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Default)]
struct Counters {
    pages_visited: u32,
    cycles: u32,
    interaction_failures: u32,
}

/// Drives a [`PageCollector`] through the result pages of one query.
///
/// Each page is polled until it stagnates; collector errors and timeouts
/// count as idle cycles and never abort the run. The seen-set lives only for
/// the duration of one [`Harvester::harvest`] call.
pub struct Harvester {
    resolver: IdentityResolver,
    settings: HarvestSettings,
    cancel: CancellationToken,
}

impl Harvester {
    pub fn new(resolver: IdentityResolver, settings: HarvestSettings) -> Self {
        Self {
            resolver,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    pub async fn harvest(&self, collector: &mut dyn PageCollector, query: &str) -> HarvestOutcome {
        let mut seen = DiscoverySet::new();
        let mut counters = Counters::default();
        let stop = self.run(collector, query, &mut seen, &mut counters).await;

        track_info!(
            "harvest `{query}` stopped ({stop}): {} urls, {} pages, {} cycles, {} failed interactions",
            seen.len(),
            counters.pages_visited,
            counters.cycles,
            counters.interaction_failures
        );
        seen.into_outcome(HarvestStats {
            pages_visited: counters.pages_visited,
            cycles: counters.cycles,
            interaction_failures: counters.interaction_failures,
            stop,
        })
    }

    async fn run(
        &self,
        collector: &mut dyn PageCollector,
        query: &str,
        seen: &mut DiscoverySet,
        counters: &mut Counters,
    ) -> HarvestStop {
        if self.cancel.is_cancelled() {
            return HarvestStop::Cancelled;
        }
        if let Err(err) = self.call("open", collector.open(query)).await {
            track_warn!("could not open results for `{query}`: {err}");
            counters.interaction_failures += 1;
            return HarvestStop::OpenFailed;
        }

        loop {
            counters.pages_visited += 1;
            let page_new = self.drain_page(collector, seen, counters).await;
            track_debug!("page {}: {page_new} new urls", counters.pages_visited);

            if self.cancel.is_cancelled() {
                return HarvestStop::Cancelled;
            }
            if page_new == 0 && self.settings.stop_on_empty_page {
                return HarvestStop::EmptyPage;
            }
            if counters.pages_visited >= self.settings.max_pages {
                return HarvestStop::MaxPages;
            }
            match self.call("advance", collector.advance_to_next_page()).await {
                Ok(true) => {}
                Ok(false) => return HarvestStop::NoNextPage,
                Err(err) => {
                    track_warn!("page advancement failed: {err}");
                    counters.interaction_failures += 1;
                    return HarvestStop::NoNextPage;
                }
            }
        }
    }

    /// Polls the open page until it stagnates and returns how many new URLs it gave.
    async fn drain_page(
        &self,
        collector: &mut dyn PageCollector,
        seen: &mut DiscoverySet,
        counters: &mut Counters,
    ) -> usize {
        let mut tracker = StagnationTracker::new(self.settings.stagnation_threshold);
        let mut page_new = 0;
        let mut page_cycles = 0;

        while !self.cancel.is_cancelled() {
            page_cycles += 1;
            counters.cycles += 1;

            let new_urls = match self
                .call("collect", collector.collect_visible_candidate_links())
                .await
            {
                Ok(links) => seen.absorb(&self.resolver, links),
                Err(err) => {
                    track_warn!("link collection failed: {err}");
                    counters.interaction_failures += 1;
                    0
                }
            };
            let rendered_more = match self
                .call("render", collector.trigger_further_rendering())
                .await
            {
                Ok(rendered) => rendered,
                Err(err) => {
                    track_warn!("rendering trigger failed: {err}");
                    counters.interaction_failures += 1;
                    false
                }
            };
            page_new += new_urls;
            track_trace!("cycle {page_cycles}: {new_urls} new, rendered more: {rendered_more}");

            if tracker.observe(new_urls, rendered_more) == CycleVerdict::Exhausted {
                break;
            }
            if page_cycles >= self.settings.max_cycles_per_page.max(1) {
                track_debug!("page cycle limit reached");
                break;
            }
        }
        page_new
    }

    async fn call<T, F>(&self, what: &'static str, fut: F) -> Result<T, CollectorError>
    where
        F: Future<Output = Result<T, CollectorError>>,
    {
        match tokio::time::timeout(self.settings.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CollectorError::Timeout(what)),
        }
    }
}
