//! Routing of one navigation: the scope gate, then fetch and merge.

use crate::config::Config;
use crate::entity::RouterEntity;
use crate::entity::RouterEntityState;
use crate::event::RouterEvent;
use crate::fetch::ResponseCache;
use crate::fetch::fetch;
use crate::host::Host;
use crate::scope::scope;
use crate::update::UpdateOutcome;
use crate::update::content::match_areas;
use crate::update::update;
use pj_core::PjaxError;
use pj_core::PjaxResult;
use std::rc::Rc;

/// Resolves the scoped configuration for `event` and runs the navigation.
pub async fn route(
    config: &Config,
    event: RouterEvent,
    state: RouterEntityState,
    host: &Host,
    cache: &ResponseCache,
) -> PjaxResult<UpdateOutcome> {
    let location = &event.location;
    let Some(config) = scope(config, location.orig.pathname(), location.dest.pathname()) else {
        return Err(PjaxError::new(
            "application.scope.disabled",
            "Disabled by config.",
        ));
    };
    let entity = RouterEntity {
        config: Rc::new(config),
        event,
        state,
    };
    navigate(&entity, host, cache).await
}

/// Fetches the destination of `entity` and merges it into the live document.
pub async fn navigate(
    entity: &RouterEntity,
    host: &Host,
    cache: &ResponseCache,
) -> PjaxResult<UpdateOutcome> {
    let cancellation = &entity.state.cancellation;
    cancellation.either(())?;
    let matched = match_areas(&host.document, &entity.config.areas)
        .map_err(|error| error.within("domain.route.areas"))?;
    if !matched {
        return Err(PjaxError::new(
            "domain.route.areas",
            "Failed to match areas.",
        ));
    }
    log::debug!(
        "{} {} for a {}",
        entity.event.request.method.as_str(),
        entity.event.request.url,
        entity.event.kind.as_str()
    );
    let (response, seq) = fetch(
        &entity.event.request,
        &entity.config,
        cancellation,
        host,
        cache,
    )
    .await?;
    update(entity, &response, seq, host).await
}

#[cfg(test)]
mod tests {
    use super::route;
    use crate::config::Config;
    use crate::config::Options;
    use crate::config::ScopeTable;
    use crate::entity::RouterEntityState;
    use crate::entity::ScriptSet;
    use crate::event::EventSource;
    use crate::event::RouterEvent;
    use crate::event::RouterEventType;
    use crate::fetch::ResponseCache;
    use crate::testing::TestHost;
    use pj_core::Cancellation;

    const PAGE: &str = "https://example.test/a";

    fn click(test: &TestHost, href: &str) -> RouterEvent {
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
        match event {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    fn state() -> RouterEntityState {
        RouterEntityState {
            scripts: ScriptSet::new(),
            cancellation: Cancellation::new(),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn disabled_scopes_issue_no_request() {
        let test = TestHost::new(PAGE, "<body><main>1</main></body>");
        let mut table = ScopeTable::new();
        table.insert("/".to_owned(), None);
        let config = Config::new(&Options {
            scope: Some(table),
            ..Options::default()
        });

        let outcome = route(
            &config,
            click(&test, "/b"),
            state(),
            &test.host,
            &ResponseCache::new(),
        )
        .await;
        let error = outcome.err().map(|error| error.message);
        assert_eq!(error.as_deref(), Some("Disabled by config."));
        assert!(test.fetcher.requests().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn live_documents_without_areas_issue_no_request() {
        let test = TestHost::new(PAGE, "<body><main>1</main></body>");
        let config = Config::new(&Options::default().with_areas(["#app"]));

        let outcome = route(
            &config,
            click(&test, "/b"),
            state(),
            &test.host,
            &ResponseCache::new(),
        )
        .await;
        let error = outcome.err().map(|error| error.message);
        assert_eq!(error.as_deref(), Some("Failed to match areas."));
        assert!(test.fetcher.requests().is_empty());
    }
}
