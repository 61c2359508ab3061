//! Blocking HTTP/1.1 client with TLS, content codings and redirects.

use crate::http::Header;
use crate::http::HttpMethod;
use crate::http::HttpRequest;
use crate::http::HttpResponse;
use crate::http::HttpStatusCode;
use crate::http::HttpVersion;
use crate::tls::BoxedIoStream;
use crate::tls::TlsPolicy;
use crate::tls::connect_tls;
use crate::url::RequestUrl;
use brotli::Decompressor;
use flate2::read::DeflateDecoder;
use flate2::read::GzDecoder;
use flate2::read::ZlibDecoder;
use pj_core::PjaxError;
use pj_core::PjaxResult;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::time::Duration;

const MAX_RESPONSE_HEAD_BYTES: usize = 128 * 1024;
const MAX_CHUNK_LINE_BYTES: usize = 8 * 1024;
const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Response together with the URL it was finally served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    pub url: String,
    pub response: HttpResponse,
}

/// One connection per request; connections are closed after the response.
#[derive(Debug, Clone)]
pub struct HttpClient {
    tls_policy: TlsPolicy,
    timeout: Duration,
    max_redirects: usize,
}

impl HttpClient {
    pub fn new(tls_policy: TlsPolicy) -> PjaxResult<Self> {
        tls_policy.validate()?;
        Ok(Self {
            tls_policy,
            timeout: Duration::from_secs(10),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        })
    }

    /// Connect, read and write timeout for every hop.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_max_redirects(&mut self, max_redirects: usize) {
        self.max_redirects = max_redirects;
    }

    /// Sends `request`, following redirects.
    ///
    /// 301, 302 and 303 turn a POST into a bodyless GET; 307 and 308 repeat
    /// the request as is.
    pub fn fetch(&self, request: HttpRequest) -> PjaxResult<FetchedResponse> {
        let mut request = request;
        let mut redirects_followed = 0_usize;

        loop {
            let response = self.execute(&request)?;
            let location = response
                .header("location")
                .filter(|_| response.status.is_redirect())
                .map(str::to_owned);

            let Some(location) = location else {
                return Ok(FetchedResponse {
                    url: request.url.as_str().to_owned(),
                    response,
                });
            };

            if redirects_followed >= self.max_redirects {
                return Err(PjaxError::new(
                    "net.http.too_many_redirects",
                    format!(
                        "too many redirects (>{}) while loading {}",
                        self.max_redirects,
                        request.url.as_str()
                    ),
                ));
            }

            let target = request.url.join(&location)?;
            log::debug!(
                "following {} redirect to {}",
                response.status.as_u16(),
                target.as_str()
            );
            request = redirected(&request, target, response.status)?;
            redirects_followed = redirects_followed.saturating_add(1);
        }
    }

    /// Sends `request` once and reads the full response.
    pub fn execute(&self, request: &HttpRequest) -> PjaxResult<HttpResponse> {
        let mut stream = self.open_stream(&request.url)?;
        write_request(&mut *stream, request)?;
        read_response(&mut *stream, request.method)
    }

    fn open_stream(&self, url: &RequestUrl) -> PjaxResult<BoxedIoStream> {
        let addresses = resolve(url.host(), url.port())?;
        let stream = connect_first_available(&addresses, self.timeout)?;
        if url.is_secure() {
            connect_tls(stream, url.host(), &self.tls_policy)
        } else {
            Ok(Box::new(stream))
        }
    }
}

fn redirected(
    request: &HttpRequest,
    target: RequestUrl,
    status: HttpStatusCode,
) -> PjaxResult<HttpRequest> {
    let to_get = matches!(status.as_u16(), 301..=303) && request.method == HttpMethod::Post;
    let method = if to_get { HttpMethod::Get } else { request.method };

    let mut builder = HttpRequest::builder(method, target);
    for header in &request.headers {
        let name = header.name.to_ascii_lowercase();
        let dropped = match name.as_str() {
            "host" => true,
            "content-length" | "content-type" => to_get,
            _ => false,
        };
        if !dropped {
            builder = builder.header(&header.name, &header.value)?;
        }
    }
    if !to_get {
        builder = builder.body(request.body.clone());
    }
    builder.build()
}

fn resolve(host: &str, port: u16) -> PjaxResult<Vec<SocketAddr>> {
    let query = format!("{host}:{port}");
    let addresses: Vec<SocketAddr> = query
        .to_socket_addrs()
        .map_err(|error| {
            PjaxError::new(
                "net.dns.resolve_failed",
                format!("failed to resolve `{query}`: {error}"),
            )
        })?
        .collect();

    if addresses.is_empty() {
        return Err(PjaxError::new(
            "net.dns.no_results",
            format!("resolver returned no addresses for `{query}`"),
        ));
    }

    Ok(addresses)
}

fn connect_first_available(addresses: &[SocketAddr], timeout: Duration) -> PjaxResult<TcpStream> {
    let mut last_error: Option<PjaxError> = None;

    for address in addresses {
        match connect(*address, timeout) {
            Ok(stream) => return Ok(stream),
            Err(error) => {
                last_error = Some(error);
            }
        }
    }

    match last_error {
        Some(error) => Err(error),
        None => Err(PjaxError::new(
            "net.transport.no_addresses",
            "no addresses available to open a connection",
        )),
    }
}

fn connect(address: SocketAddr, timeout: Duration) -> PjaxResult<TcpStream> {
    let stream = TcpStream::connect_timeout(&address, timeout).map_err(|error| {
        PjaxError::new(
            "net.transport.connect_failed",
            format!("failed to connect to `{address}`: {error}"),
        )
    })?;

    stream
        .set_nodelay(true)
        .and_then(|()| stream.set_read_timeout(Some(timeout)))
        .and_then(|()| stream.set_write_timeout(Some(timeout)))
        .map_err(|error| {
            PjaxError::new(
                "net.transport.configure_failed",
                format!("failed to configure socket for `{address}`: {error}"),
            )
        })?;

    Ok(stream)
}

fn write_request(stream: &mut dyn Write, request: &HttpRequest) -> PjaxResult<()> {
    let mut encoded = Vec::new();
    encoded.extend_from_slice(request.method.as_str().as_bytes());
    encoded.push(b' ');
    encoded.extend_from_slice(request.request_target().as_bytes());
    encoded.push(b' ');
    encoded.extend_from_slice(request.version.as_str().as_bytes());
    encoded.extend_from_slice(b"\r\n");

    for header in &request.headers {
        encoded.extend_from_slice(header.name.as_bytes());
        encoded.extend_from_slice(b": ");
        encoded.extend_from_slice(header.value.as_bytes());
        encoded.extend_from_slice(b"\r\n");
    }
    if request.header("connection").is_none() {
        encoded.extend_from_slice(b"Connection: close\r\n");
    }
    encoded.extend_from_slice(b"\r\n");
    encoded.extend_from_slice(&request.body);

    stream.write_all(&encoded).map_err(|error| {
        PjaxError::new(
            "net.http.write_failed",
            format!("failed to write HTTP request bytes: {error}"),
        )
    })?;
    stream.flush().map_err(|error| {
        PjaxError::new(
            "net.http.flush_failed",
            format!("failed to flush HTTP request bytes: {error}"),
        )
    })?;

    Ok(())
}

fn read_response(stream: &mut dyn Read, method: HttpMethod) -> PjaxResult<HttpResponse> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];

    let header_end = loop {
        if let Some(end) = find_header_end(&buffer) {
            break end;
        }

        let read = stream.read(&mut chunk).map_err(|error| {
            PjaxError::new(
                "net.http.read_head_failed",
                format!("failed while reading HTTP response head: {error}"),
            )
        })?;

        if read == 0 {
            return Err(PjaxError::new(
                "net.http.unexpected_eof",
                "unexpected EOF before response head completed",
            ));
        }

        buffer.extend_from_slice(&chunk[..read]);
        if buffer.len() > MAX_RESPONSE_HEAD_BYTES {
            return Err(PjaxError::new(
                "net.http.head_too_large",
                format!("HTTP response head exceeds {MAX_RESPONSE_HEAD_BYTES} bytes"),
            ));
        }
    };

    let head_text = String::from_utf8_lossy(&buffer[..header_end]).into_owned();
    let mut body_bytes = buffer[header_end..].to_vec();

    let mut lines = head_text.split("\r\n");
    let status_line = lines.next().ok_or_else(|| {
        PjaxError::new("net.http.status_line_missing", "missing HTTP status line")
    })?;
    let (version, status, reason) = parse_status_line(status_line)?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (name, value) = line.split_once(':').ok_or_else(|| {
            PjaxError::new(
                "net.http.header_invalid",
                format!("invalid HTTP header line `{line}`"),
            )
        })?;
        headers.push(Header::new(name.trim(), value.trim())?);
    }

    let has_transfer_encoding = headers
        .iter()
        .any(|header| header.name.eq_ignore_ascii_case("transfer-encoding"));
    let has_chunked_transfer = header_contains(&headers, "transfer-encoding", "chunked");
    if has_transfer_encoding && !has_chunked_transfer {
        return Err(PjaxError::new(
            "net.http.transfer_encoding_unsupported",
            "only chunked transfer encoding is currently supported",
        ));
    }

    let has_no_body = status_disallows_body(status.as_u16());
    if has_no_body {
        body_bytes.clear();
    } else if has_chunked_transfer {
        body_bytes = read_chunked_body(stream, body_bytes)?;
    } else if let Some(len) = parse_content_length(&headers)? {
        if body_bytes.len() < len {
            let mut rest = vec![0_u8; len.saturating_sub(body_bytes.len())];
            stream.read_exact(&mut rest).map_err(|error| {
                PjaxError::new(
                    "net.http.read_body_failed",
                    format!("failed to read HTTP body bytes: {error}"),
                )
            })?;
            body_bytes.extend_from_slice(&rest);
        } else {
            body_bytes.truncate(len);
        }
    } else {
        // Without a length the body runs until the server closes.
        stream.read_to_end(&mut body_bytes).map_err(|error| {
            PjaxError::new(
                "net.http.read_body_failed",
                format!("failed while draining connection-close response body: {error}"),
            )
        })?;
    }

    if !has_no_body {
        body_bytes = decode_content_encoding(&headers, &body_bytes)?;
    }

    log::trace!(
        "{} response {} with {} body bytes",
        method.as_str(),
        status.as_u16(),
        body_bytes.len()
    );

    Ok(HttpResponse {
        version,
        status,
        reason,
        headers,
        body: body_bytes,
    })
}

struct PrefixedStreamReader<'a> {
    prefetched: Vec<u8>,
    offset: usize,
    stream: &'a mut dyn Read,
}

impl<'a> PrefixedStreamReader<'a> {
    fn new(stream: &'a mut dyn Read, prefetched: Vec<u8>) -> Self {
        Self {
            prefetched,
            offset: 0,
            stream,
        }
    }

    fn read_exact_into(&mut self, out: &mut [u8], detail: &str) -> PjaxResult<()> {
        let available = self.prefetched.len().saturating_sub(self.offset);
        let prefix_take = available.min(out.len());

        if prefix_take > 0 {
            let end = self.offset.saturating_add(prefix_take);
            out[..prefix_take].copy_from_slice(&self.prefetched[self.offset..end]);
            self.offset = end;
        }

        if prefix_take < out.len() {
            self.stream
                .read_exact(&mut out[prefix_take..])
                .map_err(|error| {
                    PjaxError::new("net.http.read_body_failed", format!("{detail}: {error}"))
                })?;
        }

        Ok(())
    }
}

fn read_chunked_body(stream: &mut dyn Read, prefetched: Vec<u8>) -> PjaxResult<Vec<u8>> {
    let mut reader = PrefixedStreamReader::new(stream, prefetched);
    let mut decoded = Vec::new();

    loop {
        let size_line = read_crlf_line(&mut reader)?;
        if size_line.is_empty() {
            continue;
        }

        let size_token = size_line.split(';').next().unwrap_or_default().trim();
        let chunk_size = usize::from_str_radix(size_token, 16).map_err(|error| {
            PjaxError::new(
                "net.http.chunk_size_invalid",
                format!("invalid chunk size `{size_token}`: {error}"),
            )
        })?;

        if chunk_size == 0 {
            // Trailers are read and discarded.
            while !read_crlf_line(&mut reader)?.is_empty() {}
            break;
        }

        let start = decoded.len();
        decoded.resize(start.saturating_add(chunk_size), 0);
        reader.read_exact_into(
            &mut decoded[start..],
            "failed while reading chunked HTTP body bytes",
        )?;

        let mut terminator = [0_u8; 2];
        reader.read_exact_into(&mut terminator, "failed while reading chunked body terminator")?;
        if terminator != *b"\r\n" {
            return Err(PjaxError::new(
                "net.http.chunk_terminator_invalid",
                "chunk data is missing trailing CRLF",
            ));
        }
    }

    Ok(decoded)
}

fn read_crlf_line(reader: &mut PrefixedStreamReader<'_>) -> PjaxResult<String> {
    let mut line = Vec::new();

    loop {
        let mut byte = [0_u8; 1];
        reader.read_exact_into(&mut byte, "failed while reading chunked transfer line")?;
        line.push(byte[0]);

        if line.len() > MAX_CHUNK_LINE_BYTES {
            return Err(PjaxError::new(
                "net.http.chunk_line_too_large",
                format!("chunk metadata line exceeds {MAX_CHUNK_LINE_BYTES} bytes"),
            ));
        }

        if line.ends_with(b"\r\n") {
            line.truncate(line.len().saturating_sub(2));
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|idx| idx.saturating_add(4))
}

fn parse_status_line(line: &str) -> PjaxResult<(HttpVersion, HttpStatusCode, String)> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    let code_text = parts.next().ok_or_else(|| {
        PjaxError::new(
            "net.http.status_line_invalid",
            format!("missing status code in status line `{line}`"),
        )
    })?;
    let reason = parts.next().unwrap_or_default().trim().to_owned();

    let version = match version {
        "HTTP/1.0" => HttpVersion::Http10,
        "HTTP/1.1" => HttpVersion::Http11,
        other => {
            return Err(PjaxError::new(
                "net.http.version_unsupported",
                format!("unsupported response version `{other}`"),
            ));
        }
    };

    let code_value = code_text.parse::<u16>().map_err(|error| {
        PjaxError::new(
            "net.http.status_line_invalid",
            format!("invalid status code `{code_text}`: {error}"),
        )
    })?;

    Ok((version, HttpStatusCode::new(code_value)?, reason))
}

fn parse_content_length(headers: &[Header]) -> PjaxResult<Option<usize>> {
    let mut value: Option<usize> = None;
    for header in headers {
        if !header.name.eq_ignore_ascii_case("content-length") {
            continue;
        }

        let parsed = header.value.trim().parse::<usize>().map_err(|error| {
            PjaxError::new(
                "net.http.content_length_invalid",
                format!("invalid Content-Length `{}`: {error}", header.value),
            )
        })?;

        match value {
            Some(existing) if existing != parsed => {
                return Err(PjaxError::new(
                    "net.http.content_length_conflict",
                    "conflicting Content-Length headers in response",
                ));
            }
            _ => value = Some(parsed),
        }
    }

    Ok(value)
}

fn status_disallows_body(status_code: u16) -> bool {
    (100..200).contains(&status_code) || status_code == 204 || status_code == 304
}

fn header_contains(headers: &[Header], name: &str, value: &str) -> bool {
    headers.iter().any(|header| {
        header.name.eq_ignore_ascii_case(name)
            && header
                .value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case(value))
    })
}

fn decode_content_encoding(headers: &[Header], body: &[u8]) -> PjaxResult<Vec<u8>> {
    let encodings: Vec<String> = headers
        .iter()
        .filter(|header| header.name.eq_ignore_ascii_case("content-encoding"))
        .flat_map(|header| header.value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let mut decoded = body.to_vec();
    for encoding in encodings.iter().rev() {
        decoded = match encoding.as_str() {
            "identity" => decoded,
            "gzip" | "x-gzip" => read_all(GzDecoder::new(Cursor::new(&decoded)), "gzip")?,
            "deflate" => decode_deflate(&decoded)?,
            "br" => read_all(Decompressor::new(Cursor::new(&decoded), 4096), "brotli")?,
            _ => {
                return Err(PjaxError::new(
                    "net.http.content_encoding_unsupported",
                    format!("unsupported content encoding `{encoding}`"),
                ));
            }
        };
    }

    Ok(decoded)
}

fn decode_deflate(body: &[u8]) -> PjaxResult<Vec<u8>> {
    // Servers disagree on whether `deflate` carries a zlib header.
    if let Ok(decoded) = read_all(ZlibDecoder::new(Cursor::new(body)), "deflate") {
        return Ok(decoded);
    }
    read_all(DeflateDecoder::new(Cursor::new(body)), "deflate")
}

fn read_all(mut decoder: impl Read, name: &str) -> PjaxResult<Vec<u8>> {
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded).map_err(|error| {
        PjaxError::new(
            "net.http.decode_failed",
            format!("{name} decode failed: {error}"),
        )
    })?;
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::decode_content_encoding;
    use super::find_header_end;
    use super::parse_status_line;
    use super::read_chunked_body;
    use super::read_response;
    use super::redirected;
    use super::status_disallows_body;
    use super::write_request;
    use crate::http::Header;
    use crate::http::HttpMethod;
    use crate::http::HttpRequest;
    use crate::http::HttpStatusCode;
    use crate::url::RequestUrl;
    use brotli::CompressorWriter;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use flate2::write::ZlibEncoder;
    use std::io::Cursor;
    use std::io::Write;

    fn post(url: &str, body: &[u8]) -> HttpRequest {
        let url = RequestUrl::parse(url);
        assert!(url.is_ok());
        let url = match url {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let request = HttpRequest::builder(HttpMethod::Post, url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .and_then(|builder| builder.header("X-Pjax", "1"))
            .and_then(|builder| builder.body(body.to_vec()).build());
        assert!(request.is_ok());
        match request {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn status(code: u16) -> HttpStatusCode {
        match HttpStatusCode::new(code) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn header_terminator_is_detected() {
        let data = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n";
        let end = find_header_end(data);
        assert_eq!(end, Some(data.len()));
    }

    #[test]
    fn status_line_keeps_reason_phrase() {
        let parsed = parse_status_line("HTTP/1.1 404 Not Found");
        assert!(parsed.is_ok());
        let (_, code, reason) = match parsed {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(code.as_u16(), 404);
        assert_eq!(reason, "Not Found");
        assert!(parse_status_line("HTTP/1.0 200").is_ok());
        assert!(parse_status_line("SPDY/3 200 OK").is_err());
    }

    #[test]
    fn detects_bodyless_status_codes() {
        assert!(status_disallows_body(101));
        assert!(status_disallows_body(204));
        assert!(status_disallows_body(304));
        assert!(!status_disallows_body(200));
    }

    #[test]
    fn decodes_chunked_body() {
        let prefetched = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n".to_vec();
        let mut stream = Cursor::new(Vec::<u8>::new());
        let decoded = read_chunked_body(&mut stream, prefetched);
        assert_eq!(decoded, Ok(b"Wikipedia".to_vec()));
    }

    #[test]
    fn chunked_decode_reports_invalid_size() {
        let prefetched = b"Z\r\nx\r\n0\r\n\r\n".to_vec();
        let mut stream = Cursor::new(Vec::<u8>::new());
        let decoded = read_chunked_body(&mut stream, prefetched);
        assert!(decoded.is_err());
        if let Err(error) = decoded {
            assert_eq!(error.code, "net.http.chunk_size_invalid");
        }
    }

    #[test]
    fn reads_chunked_response_split_across_reads() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                    4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
        let mut stream = Cursor::new(raw.to_vec());
        let response = read_response(&mut stream, HttpMethod::Get);
        assert!(response.is_ok());
        let response = match response {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(response.body, b"Wikipedia");
        assert_eq!(response.reason, "OK");
    }

    #[test]
    fn reads_until_close_without_length() {
        let raw = b"HTTP/1.0 200 OK\r\nContent-Type: text/html\r\n\r\n<p>ok</p>";
        let mut stream = Cursor::new(raw.to_vec());
        let response = read_response(&mut stream, HttpMethod::Get);
        assert!(response.is_ok());
        let response = match response {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(response.body, b"<p>ok</p>");
        assert_eq!(response.header("content-type"), Some("text/html"));
    }

    #[test]
    fn rejects_unsupported_transfer_encoding() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip\r\nConnection: close\r\n\r\nbody";
        let mut stream = Cursor::new(raw.to_vec());
        let response = read_response(&mut stream, HttpMethod::Get);
        assert!(response.is_err());
        if let Err(error) = response {
            assert_eq!(error.code, "net.http.transfer_encoding_unsupported");
        }
    }

    #[test]
    fn writes_connection_close_and_body() {
        let request = post("https://example.com/s", b"x=1");
        let mut out = Vec::new();
        assert!(write_request(&mut out, &request).is_ok());
        let text = String::from_utf8_lossy(&out).into_owned();
        assert!(text.starts_with("POST /s HTTP/1.1\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\nx=1"));
    }

    #[test]
    fn see_other_turns_post_into_get() {
        let request = post("https://example.com/s", b"x=1");
        let target = request.url.join("/done");
        assert!(target.is_ok());
        let target = match target {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let next = redirected(&request, target.clone(), status(303));
        assert!(next.is_ok());
        let next = match next {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert_eq!(next.method, HttpMethod::Get);
        assert!(next.body.is_empty());
        assert_eq!(next.header("content-type"), None);
        assert_eq!(next.header("x-pjax"), Some("1"));
        assert_eq!(next.request_target(), "/done");

        let kept = redirected(&request, target, status(307));
        assert_eq!(kept.map(|r| (r.method, r.body)), Ok((HttpMethod::Post, b"x=1".to_vec())));
    }

    #[test]
    fn decodes_gzip_content_encoding() {
        let mut encoded = Vec::new();
        {
            let mut encoder = GzEncoder::new(&mut encoded, Compression::default());
            assert!(encoder.write_all(b"hello gzip").is_ok());
            assert!(encoder.finish().is_ok());
        }

        let header = Header::new("Content-Encoding", "gzip");
        assert!(header.is_ok());
        let header = match header {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let decoded = decode_content_encoding(&[header], &encoded);
        assert_eq!(decoded, Ok(b"hello gzip".to_vec()));
    }

    #[test]
    fn decodes_deflate_content_encoding() {
        let mut encoded = Vec::new();
        {
            let mut encoder = ZlibEncoder::new(&mut encoded, Compression::default());
            assert!(encoder.write_all(b"hello deflate").is_ok());
            assert!(encoder.finish().is_ok());
        }

        let header = Header::new("Content-Encoding", "deflate");
        assert!(header.is_ok());
        let header = match header {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let decoded = decode_content_encoding(&[header], &encoded);
        assert_eq!(decoded, Ok(b"hello deflate".to_vec()));
    }

    #[test]
    fn decodes_brotli_content_encoding() {
        let mut encoded = Vec::new();
        {
            let mut writer = CompressorWriter::new(&mut encoded, 4096, 5, 22);
            assert!(writer.write_all(b"hello br").is_ok());
            assert!(writer.flush().is_ok());
        }

        let header = Header::new("Content-Encoding", "br");
        assert!(header.is_ok());
        let header = match header {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        let decoded = decode_content_encoding(&[header], &encoded);
        assert_eq!(decoded, Ok(b"hello br".to_vec()));
    }
}
