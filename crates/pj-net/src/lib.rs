//! Networking: URL canonicalization, HTTP messages, the HTTP/1.1 client and
//! charset decoding.

pub mod charset;
pub mod client;
pub mod http;
pub mod tls;
pub mod url;

use pj_core::PjaxResult;

pub use charset::decode_text;
pub use client::FetchedResponse;
pub use client::HttpClient;
pub use http::Header;
pub use http::HttpMethod;
pub use http::HttpRequest;
pub use http::HttpRequestBuilder;
pub use http::HttpResponse;
pub use http::HttpStatusCode;
pub use tls::TlsPolicy;
pub use tls::TrustStoreMode;
pub use url::RequestUrl;
pub use url::UrlParts;
pub use url::standardize;

const DEFAULT_USER_AGENT: &str = concat!("pjax-shell/", env!("CARGO_PKG_VERSION"));
const DEFAULT_ACCEPT_HEADER: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Starts a request carrying the default navigation headers.
pub fn prepare_request(method: HttpMethod, raw_url: &str) -> PjaxResult<HttpRequestBuilder> {
    let url = RequestUrl::parse(raw_url)?;
    HttpRequest::builder(method, url)
        .header("User-Agent", DEFAULT_USER_AGENT)?
        .header("Accept", DEFAULT_ACCEPT_HEADER)?
        .header("Accept-Language", DEFAULT_ACCEPT_LANGUAGE)?
        .header("Accept-Encoding", "gzip, deflate, br")
}
