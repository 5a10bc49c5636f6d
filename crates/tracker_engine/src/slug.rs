/// Lower-cased, path-safe form of a query: `"Aarhus C"` becomes `"aarhus-c"`.
///
/// Used both for the search URL and for the store's file names, so the same
/// query always maps to the same table.
pub fn query_slug(query: &str) -> String {
    let mut slug = String::with_capacity(query.len());
    let mut prev_dash = false;
    for c in query.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' {
            slug.push(c);
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "default".to_string()
    } else {
        slug.to_string()
    }
}
