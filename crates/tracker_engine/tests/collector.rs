use std::sync::Arc;

use pretty_assertions::assert_eq;
use tracker_core::{HarvestStop, IdentityResolver, DEFAULT_IDENTIFIER_PATTERN};
use tracker_engine::{
    CollectorError, FetchSettings, HarvestSettings, Harvester, HttpPageCollector, Pacer,
    PageCollector, ReqwestFetcher,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver() -> IdentityResolver {
    IdentityResolver::new(DEFAULT_IDENTIFIER_PATTERN).unwrap()
}

fn collector(server: &MockServer) -> HttpPageCollector {
    let fetcher = Arc::new(
        ReqwestFetcher::new(FetchSettings::default(), Arc::new(Pacer::disabled())).unwrap(),
    );
    HttpPageCollector::new(
        fetcher,
        resolver(),
        format!("{}/lejligheder/{{query}}/?page=1", server.uri()),
    )
}

fn results_page(ids: &[u32]) -> String {
    let mut html = String::from("<html><body><a href=\"/om-os\">Om os</a>");
    for id in ids {
        html.push_str(&format!(
            "<a href=\"/lejligheder/horsens/lejlighed-id-{id}\">Bolig {id}</a>"
        ));
    }
    html.push_str("</body></html>");
    html
}

async fn mount_page(server: &MockServer, page: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/lejligheder/horsens/"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn open_collects_identified_links_only() {
    let server = MockServer::start().await;
    mount_page(&server, "1", results_page(&[1, 2])).await;

    let mut collector = collector(&server);
    collector.open("  Horsens ").await.expect("open");
    let links = collector.collect_visible_candidate_links().await.unwrap();

    assert_eq!(
        links,
        vec![
            format!("{}/lejligheder/horsens/lejlighed-id-1", server.uri()),
            format!("{}/lejligheder/horsens/lejlighed-id-2", server.uri()),
        ]
    );
    assert!(!collector.trigger_further_rendering().await.unwrap());
}

#[tokio::test]
async fn collecting_before_open_fails() {
    let server = MockServer::start().await;
    let mut collector = collector(&server);
    assert!(matches!(
        collector.collect_visible_candidate_links().await,
        Err(CollectorError::NotOpened)
    ));
}

#[tokio::test]
async fn open_reports_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut collector = collector(&server);
    let err = collector.open("horsens").await.unwrap_err();
    assert!(matches!(err, CollectorError::Status { status: 503, .. }));
}

#[tokio::test]
async fn advancing_follows_page_parameter_until_missing_page() {
    let server = MockServer::start().await;
    mount_page(&server, "1", results_page(&[1])).await;
    mount_page(&server, "2", results_page(&[2])).await;

    let mut collector = collector(&server);
    collector.open("horsens").await.unwrap();
    assert!(collector.advance_to_next_page().await.unwrap());
    let links = collector.collect_visible_candidate_links().await.unwrap();
    assert_eq!(
        links,
        vec![format!("{}/lejligheder/horsens/lejlighed-id-2", server.uri())]
    );
    // Page 3 is not mounted and answers 404.
    assert!(!collector.advance_to_next_page().await.unwrap());
}

#[tokio::test]
async fn harvest_over_http_stops_on_first_empty_page() {
    let server = MockServer::start().await;
    mount_page(&server, "1", results_page(&[1, 2, 3])).await;
    mount_page(&server, "2", results_page(&[3, 4])).await;
    mount_page(&server, "3", results_page(&[4])).await;

    let harvester = Harvester::new(resolver(), HarvestSettings::default());
    let mut collector = collector(&server);
    let outcome = harvester.harvest(&mut collector, "horsens").await;

    let ids: Vec<String> = outcome
        .discovered
        .iter()
        .filter_map(|found| found.identifier.as_ref().map(ToString::to_string))
        .collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
    assert_eq!(outcome.stats.pages_visited, 3);
    assert_eq!(outcome.stats.stop, HarvestStop::EmptyPage);
    assert_eq!(outcome.stats.interaction_failures, 0);
}
