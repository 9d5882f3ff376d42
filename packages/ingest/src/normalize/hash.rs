//! Identity hashes and text cleaning for canonical jobs.

use sha2::{Digest, Sha256};

/// SHA-256 of the cleaned URL: lowercased, query string and fragment
/// removed, trailing slashes stripped.
pub fn url_hash(url: &str) -> String {
    let cleaned = clean_url(url);
    let mut hasher = Sha256::new();
    hasher.update(cleaned.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The canonical form a URL is hashed over.
pub fn clean_url(url: &str) -> String {
    let mut cleaned = url.trim().to_lowercase();
    if let Some(pos) = cleaned.find(['?', '#']) {
        cleaned.truncate(pos);
    }
    while cleaned.ends_with('/') {
        cleaned.pop();
    }
    cleaned
}

/// SHA-256 of the posting body: HTML stripped, whitespace collapsed,
/// lowercased.
pub fn content_fingerprint(content: &str) -> String {
    let cleaned = clean_content(content).to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(cleaned.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether a fingerprint is the one every empty body hashes to.
///
/// Sources that expose no posting body all share this value, so it must
/// never be used to equate two postings.
pub fn is_empty_content_fingerprint(fingerprint: &str) -> bool {
    fingerprint == content_fingerprint("")
}

/// Strip HTML tags, decode common entities, and collapse whitespace.
pub fn clean_content(content: &str) -> String {
    let stripped = strip_tags(content);
    let decoded = decode_entities(&stripped);
    collapse_whitespace(&decoded)
}

/// Remove `<script>`/`<style>` bodies and all remaining tags.
pub fn strip_tags(html: &str) -> String {
    let without_script = remove_container(html, "script");
    let without_style = remove_container(&without_script, "style");

    let mut result = String::with_capacity(without_style.len());
    let mut in_tag = false;
    for ch in without_style.chars() {
        match ch {
            '<' => {
                in_tag = true;
                // Tags act as word separators
                result.push(' ');
            }
            '>' => in_tag = false,
            c if !in_tag => result.push(c),
            _ => {}
        }
    }
    result
}

/// Drop everything from `<tag` through `</tag>`, inclusive.
fn remove_container(input: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let lower = input.to_lowercase();

    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    while let Some(start) = lower[cursor..].find(&open) {
        let start = cursor + start;
        out.push_str(&input[cursor..start]);
        match lower[start..].find(&close) {
            Some(end) => cursor = start + end + close.len(),
            None => return out,
        }
    }
    out.push_str(&input[cursor..]);
    out
}

/// Decode the HTML entities that actually show up in job postings.
pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&rsquo;", "'")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
