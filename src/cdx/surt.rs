use std::net::Ipv4Addr;

/// Canonical SURT form of a URI, used as the leading part of every sort key.
///
/// `http://www.Example.com:80/Index.html?b=1#top` becomes `com,example)/index.html?b=1`.
/// URIs without an authority (`dns:`, `urn:` and friends) are only lowercased.
pub fn canonicalize(uri: &str) -> String {
    let uri = uri.trim();
    let Some(scheme_end) = uri.find("://") else {
        return escape_whitespace(uri.to_ascii_lowercase());
    };

    let scheme = uri[..scheme_end].to_ascii_lowercase();
    let rest = &uri[scheme_end + 3..];
    let rest = rest.split('#').next().unwrap_or(rest);

    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    let path = &rest[authority_end..];

    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    let (host, port) = split_host_port(host_port);
    let host = host.to_ascii_lowercase();

    let mut surt = reverse_host(host.trim_end_matches('.'));
    if let Some(port) = port.filter(|port| !port.is_empty() && !is_default_port(&scheme, port)) {
        surt.push(':');
        surt.push_str(port);
    }
    surt.push(')');
    if path.is_empty() || path.starts_with('?') {
        surt.push('/');
    }
    surt.push_str(&path.to_ascii_lowercase());
    escape_whitespace(surt)
}

/// CDX lines are space separated, so whitespace inside a key is percent-encoded.
pub(crate) fn escape_whitespace(value: String) -> String {
    if !value.contains([' ', '\t', '\n', '\r']) {
        return value;
    }
    value
        .replace(' ', "%20")
        .replace('\t', "%09")
        .replace('\n', "%0A")
        .replace('\r', "%0D")
}

fn split_host_port(host_port: &str) -> (&str, Option<&str>) {
    // Bracketed IPv6 literals contain colons of their own.
    if host_port.starts_with('[') {
        return match host_port.find(']') {
            Some(end) => {
                let port = host_port[end + 1..].strip_prefix(':');
                (&host_port[..=end], port)
            }
            None => (host_port, None),
        };
    }

    match host_port.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (host_port, None),
    }
}

fn is_default_port(scheme: &str, port: &str) -> bool {
    matches!((scheme, port), ("http", "80") | ("https", "443") | ("ftp", "21"))
}

fn reverse_host(host: &str) -> String {
    if host.starts_with('[') || host.parse::<Ipv4Addr>().is_ok() {
        return host.to_string();
    }

    let host = host.strip_prefix("www.").unwrap_or(host);
    let labels: Vec<&str> = host.split('.').filter(|label| !label.is_empty()).collect();
    labels.into_iter().rev().collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_common_forms() {
        let cases = vec![
            ("http://www.example.com/", "com,example)/"),
            ("http://example.com", "com,example)/"),
            ("https://www.Example.com:443/Index.html?B=1#frag", "com,example)/index.html?b=1"),
            ("http://user:pw@sub.example.org:8080/a", "org,example,sub:8080)/a"),
            ("http://example.com?q=1", "com,example)/?q=1"),
            ("http://127.0.0.1/x", "127.0.0.1)/x"),
        ];

        for (input, expected) in cases {
            assert_eq!(canonicalize(input), expected, "Failed for input: {}", input);
        }
    }

    #[test]
    fn test_canonicalize_without_authority() {
        assert_eq!(canonicalize("dns:Example.COM"), "dns:example.com");
        assert_eq!(canonicalize("urn:uuid:ABC"), "urn:uuid:abc");
    }

    #[test]
    fn test_whitespace_is_escaped() {
        assert_eq!(canonicalize("http://example.com/a b"), "com,example)/a%20b");
    }

    #[test]
    fn test_host_order_sorts_by_domain() {
        let a = canonicalize("http://a.example.com/");
        let b = canonicalize("http://example.com/z");
        let c = canonicalize("http://example.net/");
        assert!(b < a, "{} should sort before {}", b, a);
        assert!(a < c);
    }
}
