//! Normalized navigation triggers.

use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;
use percent_encoding::utf8_percent_encode;
use pj_core::PjaxError;
use pj_core::PjaxResult;
use pj_dom::Document;
use pj_dom::NodeId;
use pj_net::HttpMethod;
use pj_net::UrlParts;
use pj_net::standardize;

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterEventType {
    Click,
    Submit,
    Popstate,
}

impl RouterEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Submit => "submit",
            Self::Popstate => "popstate",
        }
    }
}

/// What the triggering event was dispatched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Element(NodeId),
    Window,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterEventRequest {
    pub method: HttpMethod,
    /// Canonical request URL.
    pub url: String,
    /// Urlencoded form body of a POST.
    pub data: Option<String>,
}

/// Canonical origin and destination of a navigation, always same-domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterEventLocation {
    pub orig: UrlParts,
    pub dest: UrlParts,
}

impl RouterEventLocation {
    /// Fails when `target` is on another domain than `current`.
    pub fn new(current: &str, target: &str) -> PjaxResult<Self> {
        let orig = UrlParts::parse(&standardize(current, current)?)?;
        let dest = UrlParts::parse(&standardize(target, current)?)?;
        if orig.domain() != dest.domain() {
            return Err(PjaxError::new(
                "domain.location.cross_domain",
                format!("Cannot go to the different domain url {}", dest.href()),
            ));
        }
        Ok(Self { orig, dest })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterEvent {
    pub kind: RouterEventType,
    pub source: EventSource,
    pub request: RouterEventRequest,
    pub location: RouterEventLocation,
}

impl RouterEvent {
    /// Builds the event for `source` while the history is at `location`.
    pub fn new(
        kind: RouterEventType,
        source: EventSource,
        document: &Document,
        location: &str,
    ) -> PjaxResult<Self> {
        let request = request(kind, source, document, location)?;
        let location = RouterEventLocation::new(location, &request.url)?;
        Ok(Self {
            kind,
            source,
            request,
            location,
        })
    }
}

fn request(
    kind: RouterEventType,
    source: EventSource,
    document: &Document,
    location: &str,
) -> PjaxResult<RouterEventRequest> {
    let base = document.url();
    match (kind, source) {
        (RouterEventType::Click, EventSource::Element(anchor)) => Ok(RouterEventRequest {
            method: HttpMethod::Get,
            url: standardize(&document.attribute(anchor, "href").unwrap_or_default(), &base)?,
            data: None,
        }),
        (RouterEventType::Submit, EventSource::Element(form)) => {
            let action = form_action(document, form)?;
            let data = serialize(document, form);
            if form_method(document, form) == HttpMethod::Post {
                Ok(RouterEventRequest {
                    method: HttpMethod::Post,
                    url: standardize(&action, &base)?,
                    data: Some(data),
                })
            } else {
                Ok(RouterEventRequest {
                    method: HttpMethod::Get,
                    url: standardize(&format!("{action}?{data}"), &base)?,
                    data: None,
                })
            }
        }
        (RouterEventType::Popstate, _) => Ok(RouterEventRequest {
            method: HttpMethod::Get,
            url: standardize(location, location)?,
            data: None,
        }),
        (kind, EventSource::Window) => Err(PjaxError::new(
            "application.event.source",
            format!("a {} event needs an element source", kind.as_str()),
        )),
    }
}

pub fn form_method(document: &Document, form: NodeId) -> HttpMethod {
    match document.attribute(form, "method") {
        Some(method) if method.trim().eq_ignore_ascii_case("post") => HttpMethod::Post,
        _ => HttpMethod::Get,
    }
}

/// Resolved `action` of `form` without its query and fragment.
pub fn form_action(document: &Document, form: NodeId) -> PjaxResult<String> {
    let action = document.attribute(form, "action").unwrap_or_default();
    let resolved = standardize(&action, &document.url())?;
    let end = resolved.find(['?', '#']).unwrap_or(resolved.len());
    Ok(resolved[..end].to_owned())
}

/// Urlencoded successful controls of `form`, in document order.
///
/// Disabled and nameless controls are skipped, as are checkboxes and radios
/// that are not checked and the button-like and file inputs.
pub fn serialize(document: &Document, form: NodeId) -> String {
    document
        .descendant_elements(form)
        .into_iter()
        .filter(|control| !document.has_attribute(*control, "disabled"))
        .filter_map(|control| {
            let name = document.attribute(control, "name").unwrap_or_default();
            if name.is_empty() {
                return None;
            }
            let value = control_value(document, control)?;
            Some(format!(
                "{}={}",
                utf8_percent_encode(&name, COMPONENT),
                utf8_percent_encode(&value, COMPONENT)
            ))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn control_value(document: &Document, control: NodeId) -> Option<String> {
    match document.tag_name(control)?.as_str() {
        "input" => {
            let kind = document
                .attribute(control, "type")
                .unwrap_or_default()
                .to_ascii_lowercase();
            match kind.as_str() {
                "checkbox" | "radio" => document
                    .has_attribute(control, "checked")
                    .then(|| document.attribute(control, "value").unwrap_or_else(|| "on".to_owned())),
                "submit" | "button" | "image" | "reset" | "file" => None,
                _ => Some(document.attribute(control, "value").unwrap_or_default()),
            }
        }
        "textarea" => Some(document.text_content(control)),
        "select" => Some(select_value(document, control)),
        _ => None,
    }
}

fn select_value(document: &Document, select: NodeId) -> String {
    let options = document
        .query_selector_all(select, "option")
        .unwrap_or_default();
    let chosen = options
        .iter()
        .find(|option| document.has_attribute(**option, "selected"))
        .or_else(|| options.first());
    let Some(option) = chosen else {
        return String::new();
    };
    document.attribute(*option, "value").unwrap_or_else(|| {
        document
            .text_content(*option)
            .split_ascii_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    })
}
