use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tracker_core::{FieldValue, ListingStatus, ResourceId, TransportKind};
use tracker_engine::{
    decode_body, FetchSettings, FieldExtractor, HttpSnapshotExtractor, LabelValueExtractor, Pacer,
    ReqwestFetcher, SnapshotExtractor, StatusRules,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIVE_PAGE: &str = r#"
<html><body>
  <h1>3 værelses lejlighed</h1>
  <h2>Detaljer om udlejning</h2>
  <dl>
    <dt>Lejeperiode</dt><dd>Ubegrænset</dd>
    <dt>Ledig fra</dt><dd> 1. november 2025 </dd>
    <dt>Månedlig leje</dt><dd>9.500 <span>kr.</span></dd>
    <dt>Sagsnr.</dt><dd>4962343</dd>
    <dt>Aconto</dt><dd></dd>
  </dl>
  <table>
    <tr><th>Etage</th><td>2. sal</td></tr>
    <tr><td>Møbleret</td><td>Nej</td></tr>
    <tr><td>a</td><td>b</td><td>c</td></tr>
  </table>
</body></html>
"#;

#[test]
fn live_page_is_active() {
    let rules = StatusRules::default();
    assert_eq!(rules.classify(200, LIVE_PAGE), ListingStatus::Active);
}

#[test]
fn inactive_marker_wins_over_labels() {
    let page = LIVE_PAGE.replace("<h1>", "<h1>UDLEJET ");
    assert_eq!(StatusRules::default().classify(200, &page), ListingStatus::Inactive);
}

#[test]
fn marker_spanning_whitespace_is_found() {
    let page = "<p>Annoncen er\n    fjernet</p>";
    assert_eq!(StatusRules::default().classify(200, page), ListingStatus::Inactive);
}

#[test]
fn non_200_is_inactive_and_too_few_labels_is_unknown() {
    let rules = StatusRules::default();
    assert_eq!(rules.classify(404, LIVE_PAGE), ListingStatus::Inactive);
    assert_eq!(rules.classify(200, "<p>Sagsnr. 1, Ledig fra i dag</p>"), ListingStatus::Unknown);
}

#[test]
fn label_value_pairs_are_extracted_in_page_order() {
    let fields = LabelValueExtractor::new().extract(LIVE_PAGE);
    let pairs: Vec<(&str, Option<&FieldValue>)> = fields.iter().collect();
    let text = |s: &str| FieldValue::Text(s.to_string());

    assert_eq!(
        pairs,
        vec![
            ("Lejeperiode", Some(&text("Ubegrænset"))),
            ("Ledig fra", Some(&text("1. november 2025"))),
            ("Månedlig leje", Some(&text("9.500 kr."))),
            ("Sagsnr.", Some(&text("4962343"))),
            ("Aconto", None),
            ("Etage", Some(&text("2. sal"))),
            ("Møbleret", Some(&text("Nej"))),
        ]
    );
}

#[test]
fn label_filter_keeps_only_named_fields() {
    let fields = LabelValueExtractor::with_labels(["Månedlig leje", "Etage"]).extract(LIVE_PAGE);
    let names: Vec<&str> = fields.iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["Månedlig leje", "Etage"]);
}

#[test]
fn latin1_body_is_decoded_from_header_charset() {
    let decoded = decode_body(b"M\xe5nedlig leje", Some("text/html; charset=ISO-8859-1"));
    assert_eq!(decoded.text, "Månedlig leje");
    assert!(!decoded.had_errors);
}

#[test]
fn utf8_bom_is_honoured() {
    let decoded = decode_body(b"\xEF\xBB\xBFhej", Some("text/html"));
    assert_eq!(decoded.text, "hej");
    assert_eq!(decoded.encoding_label, "UTF-8");
}

fn extractor() -> HttpSnapshotExtractor {
    let fetcher = Arc::new(
        ReqwestFetcher::new(FetchSettings::default(), Arc::new(Pacer::disabled())).unwrap(),
    );
    let observed = Utc.with_ymd_and_hms(2025, 10, 2, 6, 0, 0).unwrap();
    HttpSnapshotExtractor::new(fetcher, StatusRules::default()).with_clock(Arc::new(move || observed))
}

#[tokio::test]
async fn snapshot_of_live_listing_carries_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lejligheder/horsens/id-42"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(LIVE_PAGE, "text/html; charset=utf-8"))
        .mount(&server)
        .await;

    let url = format!("{}/lejligheder/horsens/id-42", server.uri());
    let snapshot = extractor()
        .fetch_snapshot(&ResourceId::new("42"), &url)
        .await
        .expect("snapshot");

    assert_eq!(snapshot.identifier(), &ResourceId::new("42"));
    assert_eq!(snapshot.status(), ListingStatus::Active);
    assert_eq!(snapshot.meta.url, url);
    assert_eq!(snapshot.meta.http_status, Some(200));
    assert_eq!(
        snapshot.meta.observed_at,
        Utc.with_ymd_and_hms(2025, 10, 2, 6, 0, 0).unwrap()
    );
    assert_eq!(
        snapshot.field("Månedlig leje"),
        Some(&FieldValue::Text("9.500 kr.".into()))
    );
}

#[tokio::test]
async fn removed_listing_is_inactive_without_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(410).set_body_raw(LIVE_PAGE, "text/html"))
        .mount(&server)
        .await;

    let url = format!("{}/lejligheder/horsens/id-43", server.uri());
    let snapshot = extractor()
        .fetch_snapshot(&ResourceId::new("43"), &url)
        .await
        .expect("snapshot");

    assert_eq!(snapshot.status(), ListingStatus::Inactive);
    assert_eq!(snapshot.meta.http_status, Some(410));
    assert!(snapshot.fields().is_empty());
}

#[tokio::test]
async fn not_found_listing_is_inactive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("<h1>Not found</h1>", "text/html"))
        .mount(&server)
        .await;

    let url = format!("{}/lejligheder/horsens/id-45", server.uri());
    let snapshot = extractor()
        .fetch_snapshot(&ResourceId::new("45"), &url)
        .await
        .expect("snapshot");

    assert_eq!(snapshot.status(), ListingStatus::Inactive);
    assert_eq!(snapshot.meta.http_status, Some(404));
}

#[tokio::test]
async fn overloaded_server_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/id-46"))
        .respond_with(ResponseTemplate::new(503).set_body_raw("maintenance", "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/id-47"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let extractor = extractor();
    let err = extractor
        .fetch_snapshot(&ResourceId::new("46"), &format!("{}/id-46", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, TransportKind::ServerUnavailable { status: 503 });

    let err = extractor
        .fetch_snapshot(&ResourceId::new("47"), &format!("{}/id-47", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, TransportKind::ServerUnavailable { status: 429 });
}

#[tokio::test]
async fn metadata_named_labels_are_not_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<dl><dt>status</dt><dd>hacked</dd><dt>Værelser</dt><dd>3</dd></dl>",
            "text/html",
        ))
        .mount(&server)
        .await;

    let url = format!("{}/id-44", server.uri());
    let snapshot = extractor()
        .fetch_snapshot(&ResourceId::new("44"), &url)
        .await
        .expect("snapshot");

    assert_eq!(snapshot.status(), ListingStatus::Unknown);
    let names: Vec<&str> = snapshot.fields().iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["Værelser"]);
}
