//! Query-string manipulation for service URLs.
//!
//! These helpers operate on raw URL strings rather than a parsed URL type:
//! capabilities endpoints in the wild carry pre-escaped values, stray `&`
//! separators and tokens that a strict parser would reject or re-encode.
//! Key comparison is case-insensitive throughout.

/// Percent-escape a query value (RFC 3986 unreserved set kept).
pub fn escape(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Look up a query parameter by case-insensitive key. Returns the raw value.
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    let lower_key = key.to_ascii_lowercase();
    for param in query.split('&') {
        let Some((k, v)) = param.split_once('=') else {
            continue;
        };
        if k.to_ascii_lowercase() == lower_key {
            return Some(v.to_string());
        }
    }
    None
}

/// All query parameters in order, keys lowercased.
pub fn query_params(url: &str) -> Vec<(String, String)> {
    let Some((_, query)) = url.split_once('?') else {
        return Vec::new();
    };
    query
        .split('&')
        .filter_map(|param| {
            let (k, v) = param.split_once('=')?;
            Some((k.to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

/// Append a query parameter, replacing the value when the key already exists
/// (case-insensitively). The value is inserted verbatim; escape beforehand.
pub fn add_query_param(url: &str, key: &str, value: &str) -> String {
    let Some((base, _)) = url.split_once('?') else {
        return format!("{url}?{key}={value}");
    };

    if query_param(url, key).is_none() {
        let mut result = url.to_string();
        if result.ends_with('&') {
            result.pop();
        }
        result.push('&');
        result.push_str(key);
        result.push('=');
        result.push_str(value);
        return result;
    }

    let lower_key = key.to_ascii_lowercase();
    let mut parts = Vec::new();
    for (k, v) in query_params(url) {
        if k == lower_key {
            parts.push(format!("{k}={value}"));
        } else {
            parts.push(format!("{k}={v}"));
        }
    }
    format!("{base}?{}", parts.join("&"))
}

/// Everything before the `?`, or the whole URL when it has no query part.
pub fn base_url(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}

/// Replace every occurrence of `placeholder` with `value`, matching the
/// placeholder case-insensitively. Repeats until no occurrence remains, so a
/// template may use the same placeholder several times.
pub fn replace_placeholder(template: &str, placeholder: &str, value: &str) -> String {
    if placeholder.is_empty() {
        return template.to_string();
    }

    let lower_template = template.to_ascii_lowercase();
    let lower_placeholder = placeholder.to_ascii_lowercase();

    let mut result = String::with_capacity(template.len());
    let mut pos = 0;
    while let Some(found) = lower_template[pos..].find(&lower_placeholder) {
        let at = pos + found;
        result.push_str(&template[pos..at]);
        result.push_str(value);
        pos = at + placeholder.len();
    }
    result.push_str(&template[pos..]);
    result
}

/// Split a string on ASCII whitespace, dropping empty tokens. WMS 1.1.1
/// allowed several CRS codes inside one element separated this way.
pub fn split_whitespace_tokens(input: &str) -> Vec<String> {
    input.split_whitespace().map(|s| s.to_string()).collect()
}

/// Extract the `token`/`tk` auth parameter some providers require.
pub fn extract_token(url: &str) -> Option<String> {
    query_param(url, "token").or_else(|| query_param(url, "tk"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_case_insensitive() {
        let url = "https://host/wmts?SERVICE=WMTS&Token=abc";
        assert_eq!(query_param(url, "service").as_deref(), Some("WMTS"));
        assert_eq!(query_param(url, "TOKEN").as_deref(), Some("abc"));
        assert_eq!(query_param(url, "missing"), None);
        assert_eq!(query_param("https://host/wmts", "service"), None);
    }

    #[test]
    fn test_add_query_param_no_query() {
        assert_eq!(
            add_query_param("https://host/wms", "SERVICE", "WMS"),
            "https://host/wms?SERVICE=WMS"
        );
    }

    #[test]
    fn test_add_query_param_append() {
        assert_eq!(
            add_query_param("https://host/wms?a=1", "b", "2"),
            "https://host/wms?a=1&b=2"
        );
        // trailing '&' is absorbed
        assert_eq!(
            add_query_param("https://host/wms?a=1&", "b", "2"),
            "https://host/wms?a=1&b=2"
        );
    }

    #[test]
    fn test_add_query_param_replace() {
        assert_eq!(
            add_query_param("https://host/wms?a=1&b=2", "B", "3"),
            "https://host/wms?a=1&b=3"
        );
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("https://host/wmts?a=1"), "https://host/wmts");
        assert_eq!(base_url("https://host/wmts"), "https://host/wmts");
    }

    #[test]
    fn test_replace_placeholder_case_insensitive_repeated() {
        let template = "https://t0/{Layer}/{TILEMATRIX}/{layer}.png";
        let step1 = replace_placeholder(template, "{layer}", "img");
        let step2 = replace_placeholder(&step1, "{tilematrix}", "7");
        assert_eq!(step2, "https://t0/img/7/img.png");
    }

    #[test]
    fn test_split_whitespace_tokens() {
        assert_eq!(
            split_whitespace_tokens(" EPSG:4326  EPSG:3857\nCRS:84 "),
            vec!["EPSG:4326", "EPSG:3857", "CRS:84"]
        );
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(
            extract_token("https://h/wmts?token=ABC").as_deref(),
            Some("ABC")
        );
        assert_eq!(extract_token("https://h/wmts?TK=xyz").as_deref(), Some("xyz"));
        assert_eq!(extract_token("https://h/wmts?q=1"), None);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("image/png"), "image%2Fpng");
        assert_eq!(escape("EPSG:3857"), "EPSG%3A3857");
        assert_eq!(escape("topp:states"), "topp%3Astates");
    }
}
