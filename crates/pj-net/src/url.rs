//! URL canonicalization and request URL contracts.

use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;
use percent_encoding::utf8_percent_encode;
use pj_core::PjaxError;
use pj_core::PjaxResult;
use url::Url;

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Supported application-level URL schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Self::Https)
    }
}

/// Validated absolute URL a request can be sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl {
    parsed: Url,
    scheme: Scheme,
    host: String,
    port: u16,
}

impl RequestUrl {
    pub fn parse(input: &str) -> PjaxResult<Self> {
        let mut parsed = Url::parse(input).map_err(|error| {
            PjaxError::new(
                "net.url.invalid",
                format!("failed to parse URL `{input}`: {error}"),
            )
        })?;

        let scheme = match parsed.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(PjaxError::new(
                    "net.url.scheme_unsupported",
                    format!("unsupported scheme `{other}`"),
                ));
            }
        };

        let host = parsed
            .host_str()
            .ok_or_else(|| PjaxError::new("net.url.host_missing", "URL must include a host"))?
            .to_ascii_lowercase();

        let port = parsed.port_or_known_default().ok_or_else(|| {
            PjaxError::new(
                "net.url.port_missing",
                "unable to determine effective port for URL",
            )
        })?;

        // Fragments are client-side only and never sent on the wire.
        parsed.set_fragment(None);

        Ok(Self {
            parsed,
            scheme,
            host,
            port,
        })
    }

    pub fn as_str(&self) -> &str {
        self.parsed.as_str()
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.is_secure()
    }

    pub fn authority(&self) -> String {
        if self.port == default_port(self.scheme) {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme.as_str(), self.authority())
    }

    pub fn path_and_query(&self) -> String {
        let path = if self.parsed.path().is_empty() {
            "/"
        } else {
            self.parsed.path()
        };

        match self.parsed.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_owned(),
        }
    }

    /// Resolves a `Location` header against this URL.
    pub fn join(&self, location: &str) -> PjaxResult<Self> {
        let joined = self.parsed.join(location).map_err(|error| {
            PjaxError::new(
                "net.url.invalid",
                format!("failed to resolve `{location}` against `{}`: {error}", self.as_str()),
            )
        })?;
        Self::parse(joined.as_str())
    }
}

fn default_port(scheme: Scheme) -> u16 {
    match scheme {
        Scheme::Http => 80,
        Scheme::Https => 443,
    }
}

/// Canonical form of `input` resolved against `base`.
///
/// The default port is dropped, the path always starts with `/`, percent
/// escapes are upper-cased and characters outside the URI character set are
/// escaped. The query keeps only `=` and `&` unescaped and the fragment is
/// escaped as a URI component. Applying it twice yields the same string.
pub fn standardize(input: &str, base: &str) -> PjaxResult<String> {
    let base = Url::parse(base).map_err(|error| {
        PjaxError::new(
            "net.url.invalid",
            format!("failed to parse base URL `{base}`: {error}"),
        )
    })?;
    let trimmed = input.trim();
    let resolved = if trimmed.is_empty() {
        base
    } else {
        base.join(trimmed).map_err(|error| {
            PjaxError::new(
                "net.url.invalid",
                format!("failed to parse URL `{trimmed}`: {error}"),
            )
        })?
    };

    Ok(encode(resolved.as_str()))
}

fn encode(url: &str) -> String {
    let url = escape(url, is_uri_char, NON_ALPHANUMERIC);
    let (before_fragment, fragment) = match url.find('#') {
        Some(index) => (&url[..index], Some(&url[index.saturating_add(1)..])),
        None => (url.as_str(), None),
    };
    let (path, query) = match before_fragment.find('?') {
        Some(index) => (
            &before_fragment[..index],
            Some(&before_fragment[index.saturating_add(1)..]),
        ),
        None => (before_fragment, None),
    };

    let mut out = path.to_owned();
    if let Some(query) = query {
        out.push('?');
        out.push_str(&escape(query, |ch| matches!(ch, '=' | '&'), COMPONENT));
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(&escape(fragment, |_| false, COMPONENT));
    }
    out
}

/// Rewrites `input`, keeping existing `%XX` escapes (upper-cased) and
/// characters accepted by `keep`, and escaping everything else with `set`.
fn escape(input: &str, keep: impl Fn(char) -> bool, set: &'static AsciiSet) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(ch) = rest.chars().next() {
        if ch == '%' && is_escape(rest) {
            out.push_str(&rest[..3].to_ascii_uppercase());
            rest = &rest[3..];
            continue;
        }

        let width = ch.len_utf8();
        if keep(ch) {
            out.push(ch);
        } else {
            out.extend(utf8_percent_encode(&rest[..width], set));
        }
        rest = &rest[width..];
    }
    out
}

fn is_escape(input: &str) -> bool {
    let bytes = input.as_bytes();
    bytes.len() >= 3 && bytes[1].is_ascii_hexdigit() && bytes[2].is_ascii_hexdigit()
}

fn is_uri_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            ';' | '/'
                | '?'
                | ':'
                | '@'
                | '&'
                | '='
                | '+'
                | '$'
                | ','
                | '-'
                | '_'
                | '.'
                | '!'
                | '~'
                | '*'
                | '\''
                | '('
                | ')'
                | '['
                | ']'
                | '#'
        )
}

/// Read-only view over the components of a canonical URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    parsed: Url,
}

impl UrlParts {
    pub fn parse(href: &str) -> PjaxResult<Self> {
        let parsed = Url::parse(href).map_err(|error| {
            PjaxError::new(
                "net.url.invalid",
                format!("failed to parse URL `{href}`: {error}"),
            )
        })?;
        Ok(Self { parsed })
    }

    pub fn href(&self) -> &str {
        self.parsed.as_str()
    }

    /// Scheme, host and explicit port, e.g. `https://example.com:8443`.
    pub fn domain(&self) -> String {
        let host = self.parsed.host_str().unwrap_or_default();
        match self.parsed.port() {
            Some(port) => format!("{}://{host}:{port}", self.parsed.scheme()),
            None => format!("{}://{host}", self.parsed.scheme()),
        }
    }

    pub fn pathname(&self) -> &str {
        self.parsed.path()
    }

    /// `?`-prefixed query, or empty.
    pub fn query(&self) -> String {
        match self.parsed.query() {
            Some(query) if !query.is_empty() => format!("?{query}"),
            _ => String::new(),
        }
    }

    /// `#`-prefixed fragment, or empty.
    pub fn fragment(&self) -> String {
        match self.parsed.fragment() {
            Some(fragment) if !fragment.is_empty() => format!("#{fragment}"),
            _ => String::new(),
        }
    }

    /// Pathname followed by the query.
    pub fn path(&self) -> String {
        format!("{}{}", self.pathname(), self.query())
    }
}
