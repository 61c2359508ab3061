//! The fetch phase: request, verification and parsing of the response.

use crate::config::Config;
use crate::config::SequenceRequest;
use crate::event::RouterEventRequest;
use crate::events::DomEvent;
use crate::events::PJAX_FETCH;
use crate::host::FetchRequest;
use crate::host::FetchResponse;
use crate::host::Host;
use futures_util::FutureExt;
use futures_util::future::abortable;
use futures_util::future::join3;
use pj_core::Cancellation;
use pj_core::PjaxError;
use pj_core::PjaxResult;
use pj_dom::Document;
use pj_net::HttpMethod;
use pj_net::UrlParts;
use pj_net::standardize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const EXPECTED_CONTENT_TYPE: &str = "text/html";

/// Verified response of a navigation request.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Canonical final URL; empty when the transport could not report it.
    pub url: String,
    pub status: u16,
    /// Headers whose names are plain tokens.
    pub headers: Vec<(String, String)>,
    pub document: Document,
}

/// Memo of GET responses keyed by path and validated by the cache key.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    entries: Rc<RefCell<HashMap<String, (String, FetchResponse)>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, path: &str, key: &str) -> Option<FetchResponse> {
        self.entries
            .borrow()
            .get(path)
            .filter(|(stored, _)| stored == key)
            .map(|(_, response)| response.clone())
    }

    fn put(&self, path: &str, key: &str, response: &FetchResponse) {
        self.entries
            .borrow_mut()
            .insert(path.to_owned(), (key.to_owned(), response.clone()));
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

fn request_error(cause: &str) -> PjaxError {
    PjaxError::new(
        match cause {
            "abort" => "domain.fetch.abort",
            "timeout" => "domain.fetch.timeout",
            _ => "domain.fetch.error",
        },
        format!("Failed to request by {cause}."),
    )
}

fn status_error(status: u16) -> PjaxError {
    PjaxError::new(
        "domain.fetch.status",
        format!("Failed to validate a status of response: {status}."),
    )
}

fn content_type_error() -> PjaxError {
    PjaxError::new(
        "domain.fetch.content_type",
        "Failed to validate a content type of response.",
    )
}

/// Requests `request` and resolves with the parsed response and the token of
/// the `fetch` sequence hook.
///
/// The transport, the hook and the configured wait run concurrently; the
/// phase completes when all three have.
pub async fn fetch(
    request: &RouterEventRequest,
    config: &Config,
    cancellation: &Cancellation,
    host: &Host,
    cache: &ResponseCache,
) -> PjaxResult<(FetchResult, Value)> {
    let target = UrlParts::parse(&request.url)?;
    let path = target.path();
    let url = format!("{}{}", target.domain(), (config.fetch.rewrite)(&path));
    let headers = config.fetch.request_headers();
    let cache_key = match request.method {
        HttpMethod::Get => (config.fetch.cache)(&path, &headers),
        HttpMethod::Post => String::new(),
    };

    let cached = (!cache_key.is_empty())
        .then(|| cache.get(&path, &cache_key))
        .flatten();
    let transport = match cached {
        Some(response) => {
            log::debug!("serving {path} from the response memo");
            async move { Ok(response) }.boxed_local()
        }
        None => host.fetcher.fetch(FetchRequest {
            method: request.method,
            url,
            headers,
            body: request.data.clone(),
        }),
    };
    host.events.dispatch(DomEvent::window(PJAX_FETCH));

    let timeout = config.fetch.timeout;
    let (transport, abort) = abortable(transport);
    cancellation.register(move |_| abort.abort());
    let response = async move {
        let outcome = if timeout.is_zero() {
            transport.await
        } else {
            match tokio::time::timeout(timeout, transport).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(request_error("timeout")),
            }
        };
        match outcome {
            Ok(outcome) => outcome.map_err(|error| {
                log::debug!("navigation request failed: {error}");
                request_error("error")
            }),
            Err(_) => Err(request_error("abort")),
        }
    };
    let hook = config.sequence.fetch(
        None,
        SequenceRequest {
            host: String::new(),
            path: path.clone(),
            method: request.method,
            data: request.data.clone(),
        },
    );
    let (response, token, ()) = join3(response, hook, tokio::time::sleep(config.fetch.wait)).await;

    let response = response?;
    let token = token?;
    cancellation.either(())?;
    verify(&response)?;

    let final_url = if response.url.is_empty() {
        String::new()
    } else {
        standardize(&response.url, &request.url)?
    };
    if !final_url.is_empty() {
        let redirected = UrlParts::parse(&final_url)?;
        if redirected.domain() != target.domain() {
            return Err(PjaxError::new(
                "domain.fetch.redirect",
                format!(
                    "Request is redirected to the different domain url {}",
                    redirected.href()
                ),
            ));
        }
    }

    if !cache_key.is_empty() {
        cache.put(&path, &cache_key, &response);
    }

    let base = if final_url.is_empty() {
        request.url.as_str()
    } else {
        final_url.as_str()
    };
    let document =
        pj_html::parse(&response.body, base).map_err(|error| error.within("domain.fetch.parse"))?;
    Ok((
        FetchResult {
            url: final_url,
            status: response.status,
            headers: token_headers(&response.headers),
            document,
        },
        token,
    ))
}

fn verify(response: &FetchResponse) -> PjaxResult<()> {
    let status_ok = (200..300).contains(&response.status) || response.status == 304;
    if !status_ok {
        return Err(status_error(response.status));
    }
    let content_type = response.header("Content-Type").unwrap_or_default();
    let html = content_type
        .split(';')
        .map(str::trim)
        .any(|token| token == EXPECTED_CONTENT_TYPE);
    if !html {
        return Err(content_type_error());
    }
    Ok(())
}

fn token_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| {
            !name.is_empty()
                && name
                    .bytes()
                    .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-')
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::ResponseCache;
    use super::fetch;
    use crate::config::Config;
    use crate::config::FetchOptions;
    use crate::config::Options;
    use crate::event::RouterEventRequest;
    use crate::host::FetchResponse;
    use crate::memory::html_response;
    use crate::testing::TestHost;
    use pj_core::Cancellation;
    use pj_core::PjaxError;
    use pj_net::HttpMethod;
    use std::rc::Rc;
    use std::time::Duration;

    const PAGE: &str = "https://example.test/a";

    fn get(url: &str) -> RouterEventRequest {
        RouterEventRequest {
            method: HttpMethod::Get,
            url: url.to_owned(),
            data: None,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn parses_html_and_sends_pjax_headers() {
        let test = TestHost::new(PAGE, "");
        let fetcher = &test.fetcher;
        fetcher.html(
            "https://example.test/b",
            "<title>B</title><main>2</main>",
        );
        let host = &test.host;
        let config = Config::default();

        let result = fetch(
            &get("https://example.test/b"),
            &config,
            &Cancellation::new(),
            host,
            &ResponseCache::new(),
        )
        .await;
        assert!(result.is_ok());
        let (result, token) = match result {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(token, serde_json::json!("fetch"));
        assert_eq!(result.document.title(), "B");
        assert_eq!(result.url, "https://example.test/b");

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 1);
        assert!(
            requests[0]
                .headers
                .contains(&("X-Pjax".to_owned(), "1".to_owned()))
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejects_non_html_and_failed_statuses() {
        let test = TestHost::new(PAGE, "");
        let fetcher = &test.fetcher;
        let mut json = html_response("https://example.test/json", "{}");
        json.headers = vec![("Content-Type".to_owned(), "application/json".to_owned())];
        fetcher.respond("https://example.test/json", json);
        let mut missing = html_response("https://example.test/missing", "gone");
        missing.status = 404;
        fetcher.respond("https://example.test/missing", missing);
        let host = &test.host;
        let config = Config::default();

        for (url, code, message) in [
            (
                "https://example.test/json",
                "domain.fetch.content_type",
                "Failed to validate a content type of response.",
            ),
            (
                "https://example.test/missing",
                "domain.fetch.status",
                "Failed to validate a status of response: 404.",
            ),
        ] {
            let result = fetch(
                &get(url),
                &config,
                &Cancellation::new(),
                host,
                &ResponseCache::new(),
            )
            .await;
            let error = result.err();
            assert_eq!(error.as_ref().map(|error| error.code), Some(code));
            assert_eq!(error.map(|error| error.message).as_deref(), Some(message));
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejects_cross_domain_redirects() {
        let test = TestHost::new(PAGE, "");
        let fetcher = &test.fetcher;
        fetcher.respond(
            "https://example.test/r",
            html_response("https://elsewhere.test/landing", "<p>x</p>"),
        );
        let host = &test.host;

        let result = fetch(
            &get("https://example.test/r"),
            &Config::default(),
            &Cancellation::new(),
            host,
            &ResponseCache::new(),
        )
        .await;
        let error = result.err().map(|error| error.message);
        assert_eq!(
            error.as_deref(),
            Some("Request is redirected to the different domain url https://elsewhere.test/landing")
        );
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn times_out_slow_responses() {
        let test = TestHost::new(PAGE, "");
        let fetcher = &test.fetcher;
        fetcher.respond_after(
            "https://example.test/slow",
            html_response("https://example.test/slow", ""),
            Duration::from_secs(10),
        );
        let host = &test.host;
        let config = Config::new(&Options {
            fetch: FetchOptions {
                timeout: Some(Duration::from_millis(100)),
                ..FetchOptions::default()
            },
            ..Options::default()
        });

        let result = fetch(
            &get("https://example.test/slow"),
            &config,
            &Cancellation::new(),
            host,
            &ResponseCache::new(),
        )
        .await;
        let error = result.err().map(|error| error.message);
        assert_eq!(error.as_deref(), Some("Failed to request by timeout."));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn fast_responses_wait_for_the_latency_floor() {
        let test = TestHost::new(PAGE, "");
        test.fetcher.html("https://example.test/b", "<main>2</main>");
        let config = Config::new(&Options {
            fetch: FetchOptions {
                wait: Some(Duration::from_millis(200)),
                ..FetchOptions::default()
            },
            ..Options::default()
        });

        let started = tokio::time::Instant::now();
        let result = fetch(
            &get("https://example.test/b"),
            &config,
            &Cancellation::new(),
            &test.host,
            &ResponseCache::new(),
        )
        .await;
        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn cancellation_aborts_the_request() {
        let test = TestHost::new(PAGE, "");
        let fetcher = &test.fetcher;
        fetcher.respond_after(
            "https://example.test/slow",
            html_response("https://example.test/slow", ""),
            Duration::from_secs(1),
        );
        let host = &test.host;
        let config = Config::default();
        let cancellation = Cancellation::new();
        let trigger = cancellation.clone();
        let cache = ResponseCache::new();
        let request = get("https://example.test/slow");

        let (result, ()) = tokio::join!(
            fetch(&request, &config, &cancellation, host, &cache),
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                trigger.cancel(PjaxError::new("interface.navigation.abort", "Abort."));
            }
        );
        let error = result.err().map(|error| error.message);
        assert_eq!(error.as_deref(), Some("Failed to request by abort."));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn memoizes_get_responses_by_key() {
        let test = TestHost::new(PAGE, "");
        let fetcher = &test.fetcher;
        fetcher.html("https://example.test/b", "<main>2</main>");
        let host = &test.host;
        let config = Config::new(&Options {
            fetch: FetchOptions {
                cache: Some(Rc::new(|_: &str, _: &[(String, String)]| "v1".to_owned())),
                ..FetchOptions::default()
            },
            ..Options::default()
        });
        let cache = ResponseCache::new();

        for _ in 0..2 {
            let result = fetch(
                &get("https://example.test/b"),
                &config,
                &Cancellation::new(),
                host,
                &cache,
            )
            .await;
            assert!(result.is_ok());
        }
        assert_eq!(fetcher.requests().len(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rewrites_the_request_path() {
        let test = TestHost::new(PAGE, "");
        let fetcher = &test.fetcher;
        fetcher.respond(
            "https://example.test/partial/b",
            FetchResponse {
                url: String::new(),
                ..html_response("", "<main>2</main>")
            },
        );
        let host = &test.host;
        let config = Config::new(&Options {
            fetch: FetchOptions {
                rewrite: Some(Rc::new(|path: &str| format!("/partial{path}"))),
                ..FetchOptions::default()
            },
            ..Options::default()
        });

        let result = fetch(
            &get("https://example.test/b"),
            &config,
            &Cancellation::new(),
            host,
            &ResponseCache::new(),
        )
        .await;
        assert!(result.is_ok());
        let (result, _) = match result {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(result.url, "");
        assert_eq!(result.document.url(), "https://example.test/b");
        assert_eq!(
            fetcher.requested_urls(),
            vec!["https://example.test/partial/b".to_owned()]
        );
    }
}
