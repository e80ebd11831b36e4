use wicket::http::headers::{HeaderMap, canonical};

#[test]
fn test_canonical_lowercases() {
    assert_eq!(canonical("Content-Length"), "content-length");
    assert_eq!(canonical("X-ÜBER"), "x-Über");
    assert_eq!(canonical(""), "");
}

#[test]
fn test_lookup_ignores_case() {
    let mut headers = HeaderMap::new();
    headers.add("Content-Type", "text/plain");

    assert_eq!(headers.get("content-type"), Some("text/plain"));
    assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
    assert_eq!(headers.get_all("Content-type"), headers.get_all("cOnTeNt-TyPe"));
}

#[test]
fn test_add_keeps_duplicates_in_order() {
    let mut headers = HeaderMap::new();
    headers.add("Accept", "text/html");
    headers.add("accept", "application/json");
    headers.add("ACCEPT", "*/*");

    assert_eq!(headers.get("Accept"), Some("text/html"));
    assert_eq!(
        headers.get_all("accept"),
        ["text/html", "application/json", "*/*"]
    );
    assert_eq!(headers.len(), 1);
}

#[test]
fn test_set_replaces_all_values() {
    let mut headers = HeaderMap::new();
    headers.add("Via", "a");
    headers.add("Via", "b");
    headers.set("VIA", "c");

    assert_eq!(headers.get_all("via"), ["c"]);
}

#[test]
fn test_missing_key() {
    let headers = HeaderMap::new();

    assert_eq!(headers.get("Host"), None);
    assert!(headers.get_all("Host").is_empty());
    assert!(!headers.contains_value("Host", "example.com"));
    assert!(headers.is_empty());
}

#[test]
fn test_contains_value_is_exact() {
    let mut headers = HeaderMap::new();
    headers.add("Connection", "keep-alive");

    assert!(headers.contains_value("connection", "keep-alive"));
    assert!(!headers.contains_value("connection", "Keep-Alive"));
    assert!(!headers.contains_value("connection", "keep"));
}

#[test]
fn test_has_token_splits_lists() {
    let mut headers = HeaderMap::new();
    headers.add("Connection", "Upgrade, Keep-Alive");

    assert!(headers.has_token("connection", "keep-alive"));
    assert!(headers.has_token("connection", "upgrade"));
    assert!(!headers.has_token("connection", "close"));
}

#[test]
fn test_for_each_visits_every_pair() {
    let mut headers = HeaderMap::new();
    headers.add("Set-Cookie", "a=1");
    headers.add("Set-Cookie", "b=2");
    headers.add("Host", "example.com");

    let mut seen = Vec::new();
    headers.for_each(|name, value| seen.push(format!("{name}={value}")));
    seen.sort();

    assert_eq!(seen, ["host=example.com", "set-cookie=a=1", "set-cookie=b=2"]);

    let cookies: Vec<_> = headers
        .iter()
        .filter(|(name, _)| *name == "set-cookie")
        .map(|(_, value)| value)
        .collect();
    assert_eq!(cookies, ["a=1", "b=2"]);
}

#[test]
fn test_remove() {
    let mut headers = HeaderMap::new();
    headers.add("Transfer-Encoding", "chunked");

    assert_eq!(headers.remove("transfer-encoding"), Some(vec!["chunked".to_string()]));
    assert!(!headers.contains_key("Transfer-Encoding"));
}
