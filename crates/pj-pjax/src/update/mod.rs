//! The document merger.
//!
//! Phases run strictly in order against the live document, and the
//! cancellation token is consulted after every suspension. A cancelled
//! merge stops where it is; nothing is rolled back.

pub mod content;
pub mod css;
pub mod focus;
pub mod head;
pub mod script;
pub mod scroll;
pub mod sync;
pub mod url;

use crate::entity::RouterEntity;
use crate::event::RouterEventLocation;
use crate::event::RouterEventType;
use crate::events::DomEvent;
use crate::events::PJAX_CONTENT;
use crate::events::PJAX_LOAD;
use crate::events::PJAX_READY;
use crate::events::PJAX_UNLOAD;
use crate::fetch::FetchResult;
use crate::host::Host;
use crate::store;
use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use futures_util::future::join_all;
use pj_core::PjaxError;
use pj_core::PjaxResult;
use pj_dom::Document;
use script::ExecutedScript;
use serde_json::Value;
use std::rc::Rc;

/// Fetched and live documents of one merge.
#[derive(Clone)]
pub struct UpdateSource {
    pub src: Document,
    pub dst: Document,
}

/// A completed merge.
pub struct UpdateOutcome {
    pub scripts: Vec<ExecutedScript>,
    /// Resolves after the swapped-in resources settled and `pjax:load` ran.
    pub load: LocalBoxFuture<'static, PjaxResult<()>>,
}

fn separate_error() -> PjaxError {
    PjaxError::new("domain.update.separate", "Failed to separate areas.")
}

fn content_error() -> PjaxError {
    PjaxError::new("domain.update.content", "Failed to update areas.")
}

/// Merges `response` into the live document of `host`.
///
/// `seq` is the token the `fetch` hook resolved with; each hook receives
/// the token of the one before it.
pub async fn update(
    entity: &RouterEntity,
    response: &FetchResult,
    seq: Value,
    host: &Host,
) -> PjaxResult<UpdateOutcome> {
    let config = &entity.config;
    let event = &entity.event;
    let cancellation = &entity.state.cancellation;
    let documents = UpdateSource {
        src: response.document.clone(),
        dst: host.document.clone(),
    };
    let (src, dst) = (&documents.src, &documents.dst);
    let seq = cancellation.either(seq)?;

    let (area, _) = content::separate(src, dst, &config.areas)
        .map_err(|error| error.within("domain.update.separate"))?
        .ok_or_else(separate_error)?;
    (config.update.rewrite)(src, &area);

    host.events.dispatch(DomEvent::window(PJAX_UNLOAD));
    let seq = config.sequence.unload(seq, response.clone()).await?;
    let seq = cancellation.either(seq)?;
    log::debug!("unloaded {}", event.location.orig.href());

    focus::blur(dst);
    let dest = if response.url.is_empty() {
        event.location.dest.href().to_owned()
    } else {
        response.url.clone()
    };
    let location = RouterEventLocation::new(&host.history.location(), &dest)?;
    let title = src.title();
    url::url(
        host.history.as_ref(),
        dst,
        &location,
        &title,
        event.kind,
        event.source,
        &config.replace,
    );
    dst.set_title(&title);
    store::save_title(host);
    head::head(src, dst, &config.update.head, &config.update.ignore())
        .map_err(|error| error.within("domain.update.head"))?;

    let swapped = match content::separate(src, dst, &config.areas) {
        Ok(Some((_, pairs))) => content::content(src, dst, &pairs, host.window.as_ref())
            .map_err(|error| error.within("domain.update.content"))?,
        Ok(None) | Err(_) => return Err(content_error()),
    };
    let swapped = cancellation.either(swapped)?;
    host.events.dispatch(DomEvent::window(PJAX_CONTENT));
    let seq = config
        .sequence
        .content(seq, swapped.areas.clone())
        .await?;
    let seq = cancellation.either(seq)?;
    log::debug!("swapped {} area(s) of `{area}`", swapped.areas.len());

    if config.update.css {
        css::css(src, dst, &config.update.ignore())
            .map_err(|error| error.within("domain.update.css"))?;
    }
    focus::focus(dst);
    let saved = match event.kind {
        RouterEventType::Popstate => store::saved_position(host),
        RouterEventType::Click | RouterEventType::Submit => None,
    };
    scroll::scroll(
        event.kind,
        dst,
        host.window.as_ref(),
        &event.location.dest.fragment(),
        saved,
    );
    store::save_position(host);

    let scripts = if config.update.script {
        script::script(
            src,
            host,
            &entity.state.scripts,
            &config.update,
            config.fetch.timeout,
            cancellation,
        )
        .await?
    } else {
        Vec::new()
    };
    let scripts = cancellation.either(scripts)?;

    host.events.dispatch(DomEvent::document(PJAX_READY));
    let seq = config.sequence.ready(seq, swapped.areas).await?;
    let seq = cancellation.either(seq)?;
    log::debug!("ready with {} script(s) evaluated", scripts.len());

    let waits = swapped.waits;
    let events = host.events.clone();
    let sequence = Rc::clone(&config.sequence);
    let cancellation = cancellation.clone();
    let load = async move {
        let settled = join_all(waits).await;
        let Some(settled) = cancellation.maybe(settled) else {
            return Ok(());
        };
        events.dispatch(DomEvent::window(PJAX_LOAD));
        sequence.load(seq, settled).await
    }
    .boxed_local();

    Ok(UpdateOutcome { scripts, load })
}

#[cfg(test)]
mod tests {
    use super::update;
    use crate::config::Config;
    use crate::config::Options;
    use crate::entity::RouterEntity;
    use crate::entity::RouterEntityState;
    use crate::entity::ScriptSet;
    use crate::event::EventSource;
    use crate::event::RouterEvent;
    use crate::event::RouterEventType;
    use crate::events::PJAX_CONTENT;
    use crate::events::PJAX_LOAD;
    use crate::events::PJAX_READY;
    use crate::events::PJAX_UNLOAD;
    use crate::fetch::FetchResult;
    use crate::host::History;
    use crate::testing::TestHost;
    use crate::testing::parse;
    use pj_core::Cancellation;
    use pj_core::PjaxError;
    use serde_json::json;
    use std::rc::Rc;

    const PAGE: &str = "https://example.test/a";

    fn entity(test: &TestHost, href: &str, options: &Options) -> RouterEntity {
        let document = test.document();
        let anchor = document.create_element("a");
        document.set_attribute(anchor, "href", href);
        let event = RouterEvent::new(
            RouterEventType::Click,
            EventSource::Element(anchor),
            document,
            PAGE,
        );
        assert!(event.is_ok());
        let event = match event {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        RouterEntity {
            config: Rc::new(Config::new(options)),
            event,
            state: RouterEntityState {
                scripts: ScriptSet::new(),
                cancellation: Cancellation::new(),
            },
        }
    }

    fn response(url: &str, html: &str) -> FetchResult {
        FetchResult {
            url: url.to_owned(),
            status: 200,
            headers: Vec::new(),
            document: parse(html, url),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn merges_in_phase_order() {
        let test = TestHost::new(
            PAGE,
            "<title>A</title><body><main>1</main><footer>f</footer></body>",
        );
        let seen = test.record(&[PJAX_UNLOAD, PJAX_CONTENT, PJAX_READY, PJAX_LOAD]);
        let entity = entity(&test, "/b", &Options::default().with_areas(["main"]));

        let outcome = update(
            &entity,
            &response(
                "https://example.test/b",
                "<title>B</title><body><main>2</main></body>",
            ),
            json!("fetch"),
            &test.host,
        )
        .await;
        assert!(outcome.is_ok());
        let outcome = match outcome {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        assert!(outcome.load.await.is_ok());

        assert_eq!(test.text("main"), "2");
        assert_eq!(test.text("footer"), "f");
        assert_eq!(test.document().title(), "B");
        assert_eq!(test.document().url(), "https://example.test/b");
        assert_eq!(test.history.len(), 2);
        assert_eq!(test.history.state()["title"], json!("B"));
        assert_eq!(
            *seen.borrow(),
            vec![PJAX_UNLOAD, PJAX_CONTENT, PJAX_READY, PJAX_LOAD]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unmatched_areas_fail_before_unload() {
        let test = TestHost::new(PAGE, "<body><main>1</main></body>");
        let seen = test.record(&[PJAX_UNLOAD]);
        let entity = entity(&test, "/b", &Options::default().with_areas(["#app"]));

        let outcome = update(
            &entity,
            &response("https://example.test/b", "<body><main>2</main></body>"),
            json!("fetch"),
            &test.host,
        )
        .await;
        let error = outcome.err().map(|error| error.message);
        assert_eq!(error.as_deref(), Some("Failed to separate areas."));
        assert!(seen.borrow().is_empty());
        assert_eq!(test.text("main"), "1");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancelled_merges_leave_the_document_alone() {
        let test = TestHost::new(PAGE, "<body><main>1</main></body>");
        let entity = entity(&test, "/b", &Options::default().with_areas(["main"]));
        entity
            .state
            .cancellation
            .cancel(PjaxError::new("interface.navigation.abort", "Abort."));

        let outcome = update(
            &entity,
            &response("https://example.test/b", "<body><main>2</main></body>"),
            json!("fetch"),
            &test.host,
        )
        .await;
        assert!(outcome.is_err());
        assert_eq!(test.text("main"), "1");
        assert_eq!(test.history.len(), 1);
    }
}
