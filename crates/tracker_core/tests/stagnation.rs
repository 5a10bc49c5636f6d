use tracker_core::{
    CycleVerdict, DiscoverySet, HarvestStats, HarvestStop, IdentityResolver, ResourceId,
    StagnationTracker, DEFAULT_IDENTIFIER_PATTERN,
};

fn resolver() -> IdentityResolver {
    IdentityResolver::new(DEFAULT_IDENTIFIER_PATTERN).unwrap()
}

#[test]
fn two_idle_cycles_exhaust_the_page() {
    let mut tracker = StagnationTracker::default();
    assert_eq!(tracker.observe(0, false), CycleVerdict::Continue);
    assert_eq!(tracker.observe(0, false), CycleVerdict::Exhausted);
}

#[test]
fn new_links_or_rendering_reset_the_counter() {
    let mut tracker = StagnationTracker::new(2);
    assert_eq!(tracker.observe(0, false), CycleVerdict::Continue);
    assert_eq!(tracker.observe(3, false), CycleVerdict::Continue);
    assert_eq!(tracker.idle_cycles(), 0);
    assert_eq!(tracker.observe(0, false), CycleVerdict::Continue);
    assert_eq!(tracker.observe(0, true), CycleVerdict::Continue);
    assert_eq!(tracker.idle_cycles(), 0);
    assert_eq!(tracker.observe(0, false), CycleVerdict::Continue);
    assert_eq!(tracker.observe(0, false), CycleVerdict::Exhausted);
}

#[test]
fn zero_threshold_is_clamped_to_one() {
    let mut tracker = StagnationTracker::new(0);
    assert_eq!(tracker.observe(0, false), CycleVerdict::Exhausted);
}

#[test]
fn discovery_set_dedupes_by_identifier_then_raw_url() {
    let resolver = resolver();
    let mut set = DiscoverySet::new();

    let first = set.absorb(
        &resolver,
        ["https://x/a/id-1", "https://x/b/id-1", "https://x/faq", "https://x/faq"],
    );
    let second = set.absorb(&resolver, ["https://x/a/id-1", "https://x/id-2", " https://x/faq "]);

    assert_eq!(first, 2);
    assert_eq!(second, 1);
    assert_eq!(set.len(), 3);

    let outcome = set.into_outcome(HarvestStats {
        pages_visited: 1,
        cycles: 2,
        interaction_failures: 0,
        stop: HarvestStop::NoNextPage,
    });
    let urls: Vec<&str> = outcome.urls().collect();
    assert_eq!(urls, vec!["https://x/a/id-1", "https://x/faq", "https://x/id-2"]);
    assert_eq!(outcome.variants, vec!["https://x/b/id-1"]);
    assert_eq!(outcome.discovered[0].identifier, Some(ResourceId::new("1")));
    assert_eq!(outcome.discovered[1].identifier, None);
    assert_eq!(outcome.all_urls().count(), 4);
}
