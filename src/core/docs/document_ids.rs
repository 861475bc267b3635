use url::Url;

/// Extracts the document ID from a Google Docs URL, or accepts a bare ID.
pub fn extract_doc_id(url_or_id: &str) -> Option<String> {
    if url_or_id.contains("docs.google.com") {
        if let Some(start) = url_or_id.find("/document/d/") {
            let after_d = &url_or_id[start + 12..];
            let end = after_d
                .find(|c| c == '/' || c == '?' || c == '#')
                .unwrap_or(after_d.len());
            let id = &after_d[..end];
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    } else if !url_or_id.is_empty() && !url_or_id.contains('/') && !url_or_id.contains(' ') {
        return Some(url_or_id.to_string());
    }
    None
}

/// The document tab selected in a Docs URL (`?tab=t.xyz`). Empty means none.
pub fn extract_tab_id(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "tab")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
