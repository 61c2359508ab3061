//! Script execution protocol.
//!
//! Scripts are selected from the fetched document, downloaded concurrently
//! and evaluated one at a time in document order against the live document.
//! External scripts whose canonical URL already ran on this page are skipped
//! unless they match the reload selector.
//!
//! When the script host binds `document.currentScript`, each evaluated
//! element carries a small preamble that restores its visible state while
//! it runs: an external script gets its `src` back and an empty body, an
//! inline script gets its original body. Hosts without `currentScript`
//! support get the final state written directly instead.

use crate::config::UpdateConfig;
use crate::config::selector_or_nothing;
use crate::entity::ScriptSet;
use crate::events::DomEvent;
use crate::host::FetchRequest;
use crate::host::Host;
use futures_util::future::join_all;
use pj_core::Cancellation;
use pj_core::PjaxError;
use pj_core::PjaxResult;
use pj_dom::Document;
use pj_dom::NodeId;
use pj_net::HttpMethod;
use pj_net::standardize;
use std::time::Duration;

/// A script evaluated in the live document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedScript {
    pub node: NodeId,
    /// Canonical URL of an external script.
    pub src: Option<String>,
}

/// A selected script and the code it runs.
struct Loaded {
    node: NodeId,
    src: Option<String>,
    code: String,
}

/// Whether `kind` names a classic JavaScript type.
fn is_javascript(kind: &str) -> bool {
    let kind = kind.to_ascii_lowercase();
    ["application/", "text/"].iter().any(|prefix| {
        ["javascript", "ecmascript"]
            .iter()
            .any(|language| kind.contains(&format!("{prefix}{language}")))
    })
}

/// Scripts of `src` to run, with the canonical URL of external ones.
pub fn select(
    src: &Document,
    skip: &ScriptSet,
    update: &UpdateConfig,
) -> PjaxResult<Vec<(NodeId, Option<String>)>> {
    let ignore = update.ignore();
    let ignore = selector_or_nothing(&ignore);
    let reload = selector_or_nothing(&update.reload);
    let mut selected = Vec::new();
    for node in src.query_selector_all(src.root(), "script")? {
        let kind = src.attribute(node, "type").unwrap_or_default();
        if !kind.is_empty() && !is_javascript(&kind) {
            continue;
        }
        if src.matches(node, ignore)? {
            continue;
        }
        let url = match src.attribute(node, "src") {
            Some(href) => Some(standardize(&href, &src.url())?),
            None => None,
        };
        if let Some(url) = &url {
            if skip.contains(url) && !src.matches(node, reload)? {
                log::debug!("skipping already evaluated script {url}");
                continue;
            }
        }
        selected.push((node, url));
    }
    Ok(selected)
}

async fn request(
    host: &Host,
    src: &Document,
    node: NodeId,
    url: Option<String>,
    timeout: Duration,
) -> PjaxResult<Loaded> {
    let Some(url) = url else {
        return Ok(Loaded {
            node,
            src: None,
            code: src.text_content(node),
        });
    };
    let failed = |reason: &str| PjaxError::new("domain.script.fetch", format!("{url}: {reason}"));
    let response = host.fetcher.fetch(FetchRequest {
        method: HttpMethod::Get,
        url: url.clone(),
        headers: Vec::new(),
        body: None,
    });
    let response = if timeout.is_zero() {
        response.await
    } else {
        match tokio::time::timeout(timeout, response).await {
            Ok(response) => response,
            Err(_) => return Err(failed("")),
        }
    };
    let response = response.map_err(|error| {
        log::debug!("script request failed: {error}");
        failed("")
    })?;
    if !(200..300).contains(&response.status) && response.status != 304 {
        return Err(failed(&response.status_text));
    }
    Ok(Loaded {
        node,
        src: Some(url),
        code: response.body,
    })
}

/// Runs the scripts of `src` in the live document of `host`.
pub async fn script(
    src: &Document,
    host: &Host,
    skip: &ScriptSet,
    update: &UpdateConfig,
    timeout: Duration,
    cancellation: &Cancellation,
) -> PjaxResult<Vec<ExecutedScript>> {
    let selected = select(src, skip, update)?;
    let downloads = join_all(
        selected
            .into_iter()
            .map(|(node, url)| request(host, src, node, url, timeout)),
    );
    let responses = tokio::select! {
        biased;
        reason = cancellation.cancelled() => return Err(reason),
        responses = downloads => responses,
    };

    let mut executed = Vec::new();
    for response in responses {
        cancellation.either(())?;
        executed.push(evaluate(src, host, response?, &update.logger)?);
    }
    Ok(executed)
}

fn container(src: &Document, live: &Document, parent: Option<NodeId>, logging: bool) -> NodeId {
    let selector = parent.filter(|_| logging).and_then(|parent| {
        match src.attribute(parent, "id").filter(|id| !id.is_empty()) {
            Some(id) => Some(format!("#{id}")),
            None => src.tag_name(parent),
        }
    });
    selector
        .and_then(|selector| live.query_selector(live.root(), &selector).ok().flatten())
        .or_else(|| live.body())
        .or_else(|| live.document_element())
        .unwrap_or_else(|| live.root())
}

fn evaluate(src: &Document, host: &Host, loaded: Loaded, logger: &str) -> PjaxResult<ExecutedScript> {
    let live = &host.document;
    let parent = src.parent_element(loaded.node);
    let logging = match parent {
        Some(parent) => src.matches(parent, selector_or_nothing(logger))?,
        None => false,
    };
    let container = container(src, live, parent, logging);
    let node = live.import_node(src, loaded.node).ok_or_else(|| {
        PjaxError::new("domain.script.import", "Failed to import a script element.")
    })?;

    let supported = host.scripts.borrow().supports_current_script();
    let body = match (&loaded.src, supported) {
        (Some(_), true) => {
            let attribute = live.attribute(node, "src").unwrap_or_default();
            live.remove_attribute(node, "src");
            let literal = serde_json::to_string(&attribute).map_err(|error| {
                PjaxError::new("domain.script.encode", error.to_string())
            })?;
            format!(
                "\ndocument.currentScript.innerHTML = '';\ndocument.currentScript.setAttribute('src', {literal});\n{}",
                loaded.code
            )
        }
        (None, true) => format!(
            "\ndocument.currentScript.innerHTML = document.currentScript.innerHTML.slice(-{});\n{}",
            loaded.code.encode_utf16().count(),
            loaded.code
        ),
        (Some(_), false) => String::new(),
        (None, false) => loaded.code.clone(),
    };
    live.set_text_content(node, &body);
    live.append_child(container, node);

    let code = if supported { body } else { loaded.code };
    let outcome = host.scripts.borrow_mut().evaluate(live, node, &code);
    if loaded.src.is_some() {
        let name = if outcome.is_ok() { "load" } else { "error" };
        host.events.dispatch(DomEvent::element(name, node));
    }
    if !logging {
        live.remove(node);
    }

    match outcome {
        Ok(()) => Ok(ExecutedScript {
            node,
            src: loaded.src,
        }),
        Err(error) => {
            log::warn!("script evaluation failed: {error}");
            Err(error.within("domain.script.eval"))
        }
    }
}
