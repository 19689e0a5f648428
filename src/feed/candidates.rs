/// Expands a possibly scheme-less feed address into the URLs to try, in order.
///
/// Anything containing `://` is used verbatim. Bare hosts and paths get an
/// `https://` candidate first and a plain `http://` fallback second. No
/// validation happens here; malformed URLs fail later at fetch time.
///
/// # Examples
///
/// ```
/// use siphon::feed::resolve_candidates;
///
/// assert_eq!(
///     resolve_candidates("example.com/rss"),
///     vec!["https://example.com/rss", "http://example.com/rss"]
/// );
/// assert_eq!(resolve_candidates("ftp://x/feed"), vec!["ftp://x/feed"]);
/// ```
pub fn resolve_candidates(url: &str) -> Vec<String> {
    if url.contains("://") {
        vec![url.to_string()]
    } else {
        vec![format!("https://{url}"), format!("http://{url}")]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_url_used_verbatim() {
        assert_eq!(
            resolve_candidates("http://example.com/feed.xml"),
            vec!["http://example.com/feed.xml"]
        );
    }

    #[test]
    fn test_bare_host_gets_https_then_http() {
        assert_eq!(
            resolve_candidates("news.example.org/atom"),
            vec!["https://news.example.org/atom", "http://news.example.org/atom"]
        );
    }

    proptest! {
        #[test]
        fn prop_schemeless_yields_two_candidates(url in "[a-z0-9./:-]{1,40}") {
            prop_assume!(!url.contains("://"));
            prop_assert_eq!(
                resolve_candidates(&url),
                vec![format!("https://{url}"), format!("http://{url}")]
            );
        }
    }
}
