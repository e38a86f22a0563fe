//! URL path helpers.
//!
//! Percent-encoding leaves RFC 3986 unreserved characters and `/` literal.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::path::{MAIN_SEPARATOR, PathBuf};

const PATH_PART: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

fn quote(part: &str) -> String {
    utf8_percent_encode(part, PATH_PART).to_string()
}

fn unquote(part: &str) -> String {
    percent_decode_str(part).decode_utf8_lossy().into_owned()
}

/// Join URL pieces into a relative URL without doubled slashes.
///
/// The leading `/` of the first piece and the trailing `/` of the last piece
/// are kept.
pub fn url_path_join<S: AsRef<str>>(pieces: &[S]) -> String {
    let (Some(first), Some(last)) = (pieces.first(), pieces.last()) else {
        return String::new();
    };
    let initial = first.as_ref().starts_with('/');
    let trailing = last.as_ref().ends_with('/');

    let mut result = pieces
        .iter()
        .map(|piece| piece.as_ref().trim_matches('/'))
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if initial {
        result.insert(0, '/');
    }
    if trailing {
        result.push('/');
    }
    if result == "//" {
        result = "/".to_string();
    }
    result
}

/// Path component of a URL: after an optional `scheme:` and `//netloc`,
/// before any query or fragment.
fn url_path(url: &str) -> &str {
    let mut rest = url;
    if let Some(colon) = rest.find(':') {
        let scheme = &rest[..colon];
        let valid = scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if valid {
            rest = &rest[colon + 1..];
        }
    }
    if let Some(after) = rest.strip_prefix("//") {
        rest = after.find(['/', '?', '#']).map_or("", |i| &after[i..]);
    }
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

/// Whether the URL's path is absolute.
pub fn url_is_absolute(url: &str) -> bool {
    url_path(url).starts_with('/')
}

/// Escape special characters in each `/`-separated part.
///
/// `/foo bar/` becomes `/foo%20bar/`.
pub fn url_escape(path: &str) -> String {
    path.split('/').map(quote).collect::<Vec<_>>().join("/")
}

/// Inverse of [`url_escape`]; invalid UTF-8 sequences are replaced.
pub fn url_unescape(path: &str) -> String {
    path.split('/').map(unquote).collect::<Vec<_>>().join("/")
}

/// Convert a local file path to a URL.
pub fn path2url(path: &str) -> String {
    let mut pieces: Vec<String> = path.split(MAIN_SEPARATOR).map(quote).collect();
    // keep the trailing separator
    if let Some(last) = pieces.last_mut()
        && last.is_empty()
    {
        *last = "/".to_string();
    }
    url_path_join(&pieces)
}

/// Convert a URL to a local file path.
pub fn url2path(url: &str) -> PathBuf {
    let mut path = PathBuf::new();
    for piece in url.split('/') {
        path.push(unquote(piece));
    }
    path
}
