use scraper::{ElementRef, Html, Selector};
use tracker_core::{FieldMap, FieldValue};

/// Pulls raw label/value pairs out of a listing page.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, html: &str) -> FieldMap;
}

/// Reads `<dt>`/`<dd>` pairs and two-cell table rows (`<th>`/`<td>` or
/// `<td>`/`<td>`). Values are kept as trimmed text with collapsed whitespace;
/// an empty value is recorded as null.
///
/// When `labels` is non-empty only those labels are kept, in page order.
#[derive(Debug, Clone, Default)]
pub struct LabelValueExtractor {
    labels: Vec<String>,
}

impl LabelValueExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    fn wanted(&self, label: &str) -> bool {
        self.labels.is_empty() || self.labels.iter().any(|wanted| wanted == label)
    }

    fn push(&self, fields: &mut FieldMap, label: String, value: String) {
        // First occurrence wins; pages often repeat a summary further down.
        if label.is_empty() || fields.contains(&label) || !self.wanted(&label) {
            return;
        }
        let value = (!value.is_empty()).then_some(FieldValue::Text(value));
        fields.insert(label, value);
    }
}

impl FieldExtractor for LabelValueExtractor {
    fn extract(&self, html: &str) -> FieldMap {
        let document = Html::parse_document(html);
        let mut fields = FieldMap::new();

        if let Ok(terms) = Selector::parse("dt") {
            for term in document.select(&terms) {
                let definition = term
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .next()
                    .filter(|sibling| sibling.value().name() == "dd");
                if let Some(definition) = definition {
                    self.push(&mut fields, clean_text(term), clean_text(definition));
                }
            }
        }

        if let Ok(rows) = Selector::parse("tr") {
            for row in document.select(&rows) {
                let cells: Vec<ElementRef> = row
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|cell| matches!(cell.value().name(), "th" | "td"))
                    .collect();
                if let [label, value] = cells.as_slice() {
                    if value.value().name() == "td" {
                        self.push(&mut fields, clean_text(*label), clean_text(*value));
                    }
                }
            }
        }

        fields
    }
}

fn clean_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
