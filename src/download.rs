use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HeaderMap,
    HeaderValue, PRAGMA, REFERER, USER_AGENT,
};
use std::time::Duration;

use crate::error::{Result, TuneGrabError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_TIMEOUT: Duration = Duration::from_secs(15);
pub const WEB_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";

/// Initialize HTTP client with default configuration
fn get_http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .cookie_store(true)
        .build()?;
    Ok(client)
}

/// Get default headers for requests
fn get_default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(WEB_USER_AGENT));
    headers
}

/// Headers of a top-level navigation in a desktop browser.
/// Upstream pages reject requests that do not look like this.
/// Accept-Encoding is left to reqwest so bodies are still decompressed.
pub fn browser_headers() -> HeaderMap {
    let mut headers = get_default_headers();
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

/// Browser headers plus a YouTube referer, used for media requests
pub fn youtube_headers() -> HeaderMap {
    let mut headers = browser_headers();
    headers.insert(REFERER, HeaderValue::from_static("https://www.youtube.com/"));
    headers
}

/// Create custom headers with additional values
fn create_custom_headers(additional_headers: HeaderMap) -> HeaderMap {
    let mut headers = get_default_headers();
    headers.extend(additional_headers);
    headers
}

fn map_send_error(url: &str, e: reqwest::Error) -> TuneGrabError {
    if e.is_timeout() {
        TuneGrabError::RequestTimeout(url.to_string())
    } else {
        TuneGrabError::NetworkError(e)
    }
}

fn check_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(TuneGrabError::HttpError {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

/// Execute HTTP request with error handling
async fn execute_request(
    method: reqwest::Method,
    url: &str,
    headers: HeaderMap,
    timeout: Option<Duration>,
) -> Result<reqwest::Response> {
    let client = get_http_client()?;
    let mut request = client.request(method, url).headers(create_custom_headers(headers));
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await.map_err(|e| map_send_error(url, e))?;
    check_status(url, response)
}

/// Download text content from URL with custom headers
pub async fn download_text(url: &str, headers: HeaderMap) -> Result<String> {
    let response = execute_request(reqwest::Method::GET, url, headers, Some(PAGE_TIMEOUT)).await?;
    response.text().await.map_err(TuneGrabError::from)
}

/// Open a response without a body deadline; the caller owns the transfer budget
pub async fn get_response(url: &str, headers: HeaderMap) -> Result<reqwest::Response> {
    execute_request(reqwest::Method::GET, url, headers, None).await
}

/// POST an url-encoded form and return the body text
pub async fn post_form(url: &str, body: &str, headers: HeaderMap) -> Result<String> {
    let client = get_http_client()?;
    let mut request_headers = create_custom_headers(headers);
    request_headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    let response = client
        .post(url)
        .headers(request_headers)
        .timeout(PAGE_TIMEOUT)
        .body(body.to_string())
        .send()
        .await
        .map_err(|e| map_send_error(url, e))?;
    let response = check_status(url, response)?;
    response.text().await.map_err(TuneGrabError::from)
}

/// Text transport used by the resolvers; swapped for fixtures in tests
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn get_text(&self, url: &str, headers: HeaderMap) -> Result<String>;

    async fn post_form(&self, url: &str, body: &str, headers: HeaderMap) -> Result<String>;
}

/// `Fetch` over real HTTP
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher;

#[async_trait::async_trait]
impl Fetch for HttpFetcher {
    async fn get_text(&self, url: &str, headers: HeaderMap) -> Result<String> {
        download_text(url, headers).await
    }

    async fn post_form(&self, url: &str, body: &str, headers: HeaderMap) -> Result<String> {
        post_form(url, body, headers).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    type Reply = std::result::Result<String, u16>;

    /// Serves canned bodies by URL and records every request it sees.
    /// Replies queued for one URL are served in order; the last one repeats.
    #[derive(Default)]
    pub struct FixtureFetcher {
        replies: Mutex<HashMap<String, VecDeque<Reply>>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FixtureFetcher {
        fn push(self, url: &str, reply: Reply) -> Self {
            self.replies
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(reply);
            self
        }

        pub fn page(self, url: &str, body: &str) -> Self {
            self.push(url, Ok(body.to_string()))
        }

        pub fn status(self, url: &str, status: u16) -> Self {
            self.push(url, Err(status))
        }

        pub fn requested(&self, url: &str) -> bool {
            self.count(url) > 0
        }

        pub fn count(&self, url: &str) -> usize {
            self.requests.lock().unwrap().iter().filter(|u| *u == url).count()
        }

        fn reply(&self, url: &str) -> Result<String> {
            self.requests.lock().unwrap().push(url.to_string());
            let mut replies = self.replies.lock().unwrap();
            let queue = replies.get_mut(url);
            let reply = match queue {
                Some(q) if q.len() > 1 => q.pop_front(),
                Some(q) => q.front().cloned(),
                None => None,
            };
            match reply {
                Some(Ok(body)) => Ok(body),
                Some(Err(status)) => Err(TuneGrabError::HttpError {
                    status,
                    url: url.to_string(),
                }),
                None => Err(TuneGrabError::HttpError {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        }
    }

    #[async_trait::async_trait]
    impl Fetch for FixtureFetcher {
        async fn get_text(&self, url: &str, _headers: HeaderMap) -> Result<String> {
            self.reply(url)
        }

        async fn post_form(&self, url: &str, _body: &str, _headers: HeaderMap) -> Result<String> {
            self.reply(url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_headers_carry_fetch_metadata() {
        let headers = browser_headers();
        assert_eq!(headers.get(USER_AGENT).unwrap(), WEB_USER_AGENT);
        assert_eq!(headers.get("Sec-Fetch-Mode").unwrap(), "navigate");
        assert!(headers.contains_key(ACCEPT_LANGUAGE));
    }

    #[test]
    fn youtube_headers_add_referer() {
        let headers = youtube_headers();
        assert_eq!(headers.get(REFERER).unwrap(), "https://www.youtube.com/");
    }
}
