//! [`Fetcher`] backed by the blocking HTTP client of `pj-net`.

use crate::host::FetchRequest;
use crate::host::FetchResponse;
use crate::host::Fetcher;
use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use pj_core::PjaxError;
use pj_core::PjaxResult;
use pj_net::HttpClient;
use pj_net::HttpRequest;
use pj_net::decode_text;
use pj_net::prepare_request;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Runs each request on the blocking pool of the current Tokio runtime.
///
/// Dropping the returned future abandons the request; the blocking call
/// still runs to completion and its result is discarded.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: HttpClient,
}

impl HttpFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

fn build(request: &FetchRequest) -> PjaxResult<HttpRequest> {
    let mut builder = prepare_request(request.method, &request.url)?;
    for (name, value) in &request.headers {
        builder = builder.set_header(name, value)?;
    }
    if let Some(body) = &request.body {
        builder = builder
            .set_header("Content-Type", FORM_CONTENT_TYPE)?
            .body(body.as_bytes().to_vec());
    }
    builder.build()
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, request: FetchRequest) -> LocalBoxFuture<'static, PjaxResult<FetchResponse>> {
        let client = self.client.clone();
        let prepared = build(&request);
        async move {
            let prepared = prepared?;
            log::debug!("{} {}", request.method.as_str(), request.url);
            let fetched = tokio::task::spawn_blocking(move || client.fetch(prepared))
                .await
                .map_err(|error| PjaxError::new("net.fetch.join_failed", error.to_string()))??;
            let response = fetched.response;
            let content_type = response.header("content-type").unwrap_or_default().to_owned();
            Ok(FetchResponse {
                url: fetched.url,
                status: response.status.as_u16(),
                status_text: response.reason.clone(),
                headers: response
                    .headers
                    .iter()
                    .map(|header| (header.name.clone(), header.value.clone()))
                    .collect(),
                body: decode_text(&response.body, &content_type),
            })
        }
        .boxed_local()
    }
}
