//! Plain-text rendering of run results for the terminal.

use std::fmt::Write;

use tracker_core::{Canonicalization, ListingStatus, RunReport, Snapshot};

pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "query: {}", report.query);
    if report.first_run {
        let _ = writeln!(out, "first run: no stored records");
    } else {
        let _ = writeln!(out, "stored records: {}", report.prior_records);
    }
    let _ = writeln!(
        out,
        "rechecked: {} ({} failed)",
        report.rechecked, report.recheck_failures
    );
    if let Some(stats) = &report.harvest {
        let _ = writeln!(
            out,
            "harvest: {} urls, {} identifiers, {} pages, stopped: {}",
            report.discovered_urls, report.unique_identifiers, stats.pages_visited, stats.stop
        );
    }
    let _ = writeln!(
        out,
        "new: {}  revived: {}  discovery failures: {}  carried forward: {}",
        report.new_records,
        report.revived_records,
        report.discovery_failures,
        report.carried_forward
    );
    for url in &report.off_host_urls {
        let _ = writeln!(out, "  off host, skipped: {url}");
    }
    for event in &report.events {
        let _ = writeln!(
            out,
            "  {} {} -> {} at {}",
            event.identifier,
            event.previous_status.as_str(),
            event.new_status.as_str(),
            event.timestamp.to_rfc3339()
        );
    }
    if report.persisted {
        let _ = writeln!(
            out,
            "wrote {} records, logged {} status checks",
            report.written_records, report.status_checks
        );
    } else {
        let _ = writeln!(out, "nothing written");
    }
    if !report.failures.is_empty() {
        let _ = writeln!(out, "{} soft failures:", report.failures.len());
        for failure in &report.failures {
            let _ = writeln!(out, "  {failure}");
        }
    }
    out
}

pub fn render_canonical(result: &Canonicalization) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} urls -> {} identifiers",
        result.input_count,
        result.len()
    );
    for (identifier, url) in &result.canonical {
        let _ = writeln!(out, "{identifier}\t{url}");
    }
    for (identifier, urls) in &result.duplicates {
        let _ = writeln!(out, "duplicate {identifier}: {}", urls.join(", "));
    }
    for url in &result.unidentified {
        let _ = writeln!(out, "unidentified: {url}");
    }
    for url in &result.off_host {
        let _ = writeln!(out, "off host: {url}");
    }
    out
}

pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let meta = &snapshot.meta;
    let _ = writeln!(out, "identifier: {}", meta.identifier);
    let _ = writeln!(out, "url: {}", meta.url);
    let _ = writeln!(out, "status: {}", meta.status.as_str());
    if let Some(code) = meta.http_status {
        let _ = writeln!(out, "http status: {code}");
    }
    if meta.status == ListingStatus::Unknown {
        let _ = writeln!(out, "warning: page content was inconclusive");
    }
    for (name, value) in snapshot.fields().iter() {
        match value {
            Some(value) => {
                let _ = writeln!(out, "{name}: {value}");
            }
            None => {
                let _ = writeln!(out, "{name}: (null)");
            }
        }
    }
    out
}
