use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, REFERER, USER_AGENT,
};
use url::Url;

/// Desktop Chrome on Windows, the identity tried first.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Desktop Safari on macOS, used for the second direct attempt and the proxy attempt.
pub const SAFARI_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15";

const ACCEPT_FEEDS: &str = "application/rss+xml, application/xml, text/xml, */*";

/// Default `Accept-Language` sent with every attempt.
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

/// How an attempt reaches the origin server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Direct,
    Proxy,
}

/// The HTTP clients attempts are planned over.
///
/// `proxy` is `None` when no proxy is configured or its client could not be built.
#[derive(Debug, Clone)]
pub struct HttpClients {
    pub direct: reqwest::Client,
    pub proxy: Option<reqwest::Client>,
}

/// One way of retrieving a URL: a client and the headers to send with it.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub transport: Transport,
    pub client: reqwest::Client,
    pub headers: HeaderMap,
}

/// Plans the ordered attempts for one resolved URL.
///
/// Two direct attempts rotate the browser identity; when a proxy client is
/// available a third attempt reuses the second identity through the proxy.
pub fn plan_attempts(url: &str, clients: &HttpClients, accept_language: &str) -> Vec<FetchAttempt> {
    let referer = referer_for(url);
    let chrome = build_headers(CHROME_USER_AGENT, accept_language, referer.as_deref());
    let safari = build_headers(SAFARI_USER_AGENT, accept_language, referer.as_deref());

    let mut attempts = vec![
        FetchAttempt {
            transport: Transport::Direct,
            client: clients.direct.clone(),
            headers: chrome,
        },
        FetchAttempt {
            transport: Transport::Direct,
            client: clients.direct.clone(),
            headers: safari.clone(),
        },
    ];

    if let Some(proxy) = &clients.proxy {
        attempts.push(FetchAttempt {
            transport: Transport::Proxy,
            client: proxy.clone(),
            headers: safari,
        });
    }

    attempts
}

/// Builds the browser-like header set for one identity.
pub fn build_headers(user_agent: &str, accept_language: &str, referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert_header(&mut headers, USER_AGENT, user_agent);
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_FEEDS));
    insert_header(&mut headers, ACCEPT_LANGUAGE, accept_language);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Some(referer) = referer {
        insert_header(&mut headers, REFERER, referer);
    }
    headers
}

fn insert_header(headers: &mut HeaderMap, name: reqwest::header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(e) => {
            tracing::warn!(header = %name, error = %e, "Skipping invalid header value");
        }
    }
}

/// Site root of `url` (`scheme://host[:port]/`), or `None` when it has no host.
pub fn referer_for(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str().filter(|h| !h.is_empty())?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}/", parsed.scheme(), host, port),
        None => format!("{}://{}/", parsed.scheme(), host),
    })
}
