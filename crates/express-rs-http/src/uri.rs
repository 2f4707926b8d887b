//! URL helpers used by the dispatch engine.
//!
//! The router works on a request's mutable URL, which is either origin-form
//! (`/path?query`) or fully qualified (`http://host/path?query`). The
//! scheme-and-host prefix of a fully qualified URL is never trimmed or matched;
//! [`protohost`] finds it and [`pathname`] returns the routable part.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;

/// Returns the `scheme://host` prefix of a fully qualified URL, if any.
///
/// Origin-form URLs (starting with `/`) have no prefix. The prefix ends at the
/// first `/` or `?` after the `://` separator.
///
/// ```
/// use express_rs_http::uri::protohost;
///
/// assert_eq!(protohost("http://example.com/blog?x=1"), Some("http://example.com"));
/// assert_eq!(protohost("/blog"), None);
/// ```
pub fn protohost(url: &str) -> Option<&str> {
    if url.is_empty() || url.starts_with('/') {
        return None;
    }

    let path_len = url.find('?').unwrap_or(url.len());
    let fqdn = url[..path_len].find("://")?;
    let host_start = fqdn + 3;
    let end = url[host_start..]
        .find(['/', '?'])
        .map_or(url.len(), |i| host_start + i);
    Some(&url[..end])
}

/// Returns the path portion of a request URL, without query string or fragment.
///
/// Returns `None` for a fully qualified URL that does not parse; the router
/// treats that as the end of the stack.
///
/// ```
/// use express_rs_http::uri::pathname;
///
/// assert_eq!(pathname("/users/42?tab=posts"), Some("/users/42"));
/// assert_eq!(pathname("http://example.com/users"), Some("/users"));
/// assert_eq!(pathname("http://example.com"), Some("/"));
/// ```
pub fn pathname(url: &str) -> Option<&str> {
    let rest = match protohost(url) {
        Some(host) => {
            ::url::Url::parse(url).ok()?;
            &url[host.len()..]
        }
        None => url,
    };

    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    let path = &rest[..end];
    if path.is_empty() && rest.len() != url.len() {
        Some("/")
    } else {
        Some(path)
    }
}

/// Returns the raw query string of a URL (without the leading `?`).
pub fn query_string(url: &str) -> &str {
    url.split_once('?').map_or("", |(_, q)| {
        q.split_once('#').map_or(q, |(q, _)| q)
    })
}

/// A parsed query string: each key maps to every value it appeared with.
pub type QueryMap = HashMap<String, Vec<String>>;

/// Parses the query string of a URL into a [`QueryMap`].
pub fn parse_query(url: &str) -> QueryMap {
    let mut map: QueryMap = HashMap::new();
    for (key, value) in ::url::form_urlencoded::parse(query_string(url).as_bytes()) {
        map.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    map
}

/// Percent-decodes a captured path parameter.
///
/// Returns `None` if the value contains a `%` not followed by two hex digits,
/// or if the decoded bytes are not valid UTF-8.
///
/// ```
/// use express_rs_http::uri::decode_param;
///
/// assert_eq!(decode_param("a%2Fb").as_deref(), Some("a/b"));
/// assert_eq!(decode_param("100%"), None);
/// ```
pub fn decode_param(value: &str) -> Option<String> {
    if value.is_empty() {
        return Some(String::new());
    }
    if !has_valid_escapes(value) {
        return None;
    }
    percent_decode_str(value)
        .decode_utf8()
        .ok()
        .map(std::borrow::Cow::into_owned)
}

fn has_valid_escapes(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}
