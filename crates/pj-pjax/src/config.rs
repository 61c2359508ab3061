//! Navigation configuration.
//!
//! [`Options`] is the partial, user-facing form; [`Config`] is the complete
//! snapshot a navigation runs with. Merging is a deep extend: nested `fetch`
//! and `update` groups merge field by field, while lists and selectors are
//! replaced wholesale. The ignore and scope maps merge key by key.

use crate::event::EventSource;
use crate::fetch::FetchResult;
use crate::host::ResourceEvent;
use crate::host::Window;
use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use pj_core::PjaxResult;
use pj_dom::Document;
use pj_dom::NodeId;
use pj_net::HttpMethod;
use pj_net::standardize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

pub type Filter = Rc<dyn Fn(&Document, NodeId) -> bool>;
pub type Fallback = Rc<dyn Fn(&FallbackContext<'_>) -> PjaxResult<()>>;
pub type PathRewrite = Rc<dyn Fn(&str) -> String>;
pub type CacheKey = Rc<dyn Fn(&str, &[(String, String)]) -> String>;
pub type DocumentRewrite = Rc<dyn Fn(&Document, &str)>;
pub type ScopeTable = BTreeMap<String, Option<Options>>;

const DEFAULT_PROGRESSBAR: &str = "display:none;position:absolute;bottom:0;left:0;width:0;height:2px;background:rgb(40, 105, 255);";
const IGNORE_OVERRIDE_KEY: &str = "_";

/// Selector that matches nothing when `selector` is blank.
pub(crate) fn selector_or_nothing(selector: &str) -> &str {
    let trimmed = selector.trim();
    if trimmed.is_empty() { "_" } else { trimmed }
}

/// Arguments handed to the fallback after a fatal navigation error.
pub struct FallbackContext<'a> {
    pub document: &'a Document,
    pub window: &'a dyn Window,
    pub target: EventSource,
    pub reason: &'a pj_core::PjaxError,
}

/// Native navigation towards whatever triggered the failed navigation.
pub fn default_fallback(context: &FallbackContext<'_>) -> PjaxResult<()> {
    let document = context.document;
    let node = match context.target {
        EventSource::Window => {
            context.window.reload();
            return Ok(());
        }
        EventSource::Element(node) => node,
    };

    let attribute = match document.tag_name(node).as_deref() {
        Some("a" | "area") => "href",
        Some("form") => "action",
        _ => return Err(context.reason.clone()),
    };
    let target = document.attribute(node, attribute).unwrap_or_default();
    let href = standardize(&target, &document.url())?;
    context.window.assign(&href);
    Ok(())
}

/// Request summary handed to [`Sequence::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRequest {
    pub host: String,
    pub path: String,
    pub method: HttpMethod,
    pub data: Option<String>,
}

/// Asynchronous hooks run between pipeline phases.
///
/// Each hook receives the value the previous hook resolved with.
pub trait Sequence {
    fn fetch(
        &self,
        _token: Option<Value>,
        _request: SequenceRequest,
    ) -> LocalBoxFuture<'static, PjaxResult<Value>> {
        resolved(Value::from("fetch"))
    }

    fn unload(
        &self,
        _token: Value,
        _response: FetchResult,
    ) -> LocalBoxFuture<'static, PjaxResult<Value>> {
        resolved(Value::from("unload"))
    }

    fn content(
        &self,
        _token: Value,
        _areas: Vec<NodeId>,
    ) -> LocalBoxFuture<'static, PjaxResult<Value>> {
        resolved(Value::from("content"))
    }

    fn ready(&self, _token: Value, _areas: Vec<NodeId>) -> LocalBoxFuture<'static, PjaxResult<Value>> {
        resolved(Value::from("ready"))
    }

    fn load(
        &self,
        _token: Value,
        _events: Vec<ResourceEvent>,
    ) -> LocalBoxFuture<'static, PjaxResult<()>> {
        async { Ok(()) }.boxed_local()
    }
}

fn resolved(value: Value) -> LocalBoxFuture<'static, PjaxResult<Value>> {
    async move { Ok(value) }.boxed_local()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSequence;

impl Sequence for DefaultSequence {}

#[derive(Clone)]
pub struct FetchConfig {
    /// Zero disables the timeout.
    pub timeout: Duration,
    /// Minimum time between issuing the request and using its response.
    pub wait: Duration,
    pub headers: Vec<(String, String)>,
    pub rewrite: PathRewrite,
    /// Returns a memo key for a GET path; empty disables the memo.
    pub cache: CacheKey,
}

impl FetchConfig {
    /// User headers followed by the two PJAX markers, which always win.
    pub fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case("X-Requested-With") && !name.eq_ignore_ascii_case("X-Pjax")
            })
            .cloned()
            .collect();
        headers.push(("X-Requested-With".to_owned(), "XMLHttpRequest".to_owned()));
        headers.push(("X-Pjax".to_owned(), "1".to_owned()));
        headers
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            wait: Duration::ZERO,
            headers: Vec::new(),
            rewrite: Rc::new(|path: &str| path.to_owned()),
            cache: Rc::new(|_: &str, _: &[(String, String)]| String::new()),
        }
    }
}

#[derive(Clone)]
pub struct UpdateConfig {
    pub head: String,
    pub css: bool,
    pub script: bool,
    /// Named ignore selectors, in insertion order.
    pub ignores: Vec<(String, String)>,
    pub reload: String,
    pub logger: String,
    pub rewrite: DocumentRewrite,
}

impl UpdateConfig {
    /// Comma-join of every non-blank ignore entry.
    pub fn ignore(&self) -> String {
        self.ignores
            .iter()
            .map(|(_, selector)| selector.trim())
            .filter(|selector| !selector.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn set_ignore(&mut self, selector: &str) {
        set_entry(&mut self.ignores, IGNORE_OVERRIDE_KEY, selector);
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            head: "base, meta, link".to_owned(),
            css: true,
            script: true,
            ignores: vec![
                (
                    "extension".to_owned(),
                    r#"[href^="chrome-extension://"]"#.to_owned(),
                ),
                (
                    "security".to_owned(),
                    r#"[src*=".scr.kaspersky-labs.com/"]"#.to_owned(),
                ),
            ],
            reload: String::new(),
            logger: String::new(),
            rewrite: Rc::new(|_: &Document, _: &str| {}),
        }
    }
}

fn set_entry(entries: &mut Vec<(String, String)>, key: &str, value: &str) {
    match entries.iter_mut().find(|(name, _)| name == key) {
        Some((_, existing)) => *existing = value.to_owned(),
        None => entries.push((key.to_owned(), value.to_owned())),
    }
}

/// Frozen configuration for one navigation.
#[derive(Clone)]
pub struct Config {
    pub areas: Vec<String>,
    pub link: String,
    pub filter: Filter,
    pub form: String,
    pub replace: String,
    pub fetch: FetchConfig,
    pub update: UpdateConfig,
    pub sequence: Rc<dyn Sequence>,
    pub progressbar: String,
    pub scope: ScopeTable,
    pub fallback: Fallback,
}

impl Default for Config {
    fn default() -> Self {
        let mut scope = ScopeTable::new();
        scope.insert("/".to_owned(), Some(Options::default()));
        Self {
            areas: vec!["body".to_owned()],
            link: "a, area".to_owned(),
            filter: Rc::new(|document: &Document, node: NodeId| {
                document
                    .matches(node, "[href]:not([target])")
                    .unwrap_or(false)
            }),
            form: "form:not([method])".to_owned(),
            replace: String::new(),
            fetch: FetchConfig::default(),
            update: UpdateConfig::default(),
            sequence: Rc::new(DefaultSequence),
            progressbar: DEFAULT_PROGRESSBAR.to_owned(),
            scope,
            fallback: Rc::new(default_fallback),
        }
    }
}

impl Config {
    pub fn new(options: &Options) -> Self {
        Self::default().merge(options)
    }

    /// Deep-extends a copy of `self` with `options`.
    pub fn merge(&self, options: &Options) -> Self {
        let mut config = self.clone();
        if let Some(areas) = &options.areas {
            config.areas = areas.clone();
        }
        if let Some(link) = &options.link {
            config.link = link.clone();
        }
        if let Some(filter) = &options.filter {
            config.filter = Rc::clone(filter);
        }
        if let Some(form) = &options.form {
            config.form = form.clone();
        }
        if let Some(replace) = &options.replace {
            config.replace = replace.clone();
        }
        options.fetch.apply(&mut config.fetch);
        options.update.apply(&mut config.update);
        if let Some(sequence) = &options.sequence {
            config.sequence = Rc::clone(sequence);
        }
        if let Some(progressbar) = &options.progressbar {
            config.progressbar = progressbar.clone();
        }
        if let Some(scope) = &options.scope {
            for (pattern, entry) in scope {
                config.scope.insert(pattern.clone(), entry.clone());
            }
        }
        if let Some(fallback) = &options.fallback {
            config.fallback = Rc::clone(fallback);
        }
        config
    }
}

/// Partial configuration. Unset fields keep the value being merged into.
#[derive(Clone, Default)]
pub struct Options {
    pub areas: Option<Vec<String>>,
    pub link: Option<String>,
    pub filter: Option<Filter>,
    pub form: Option<String>,
    pub replace: Option<String>,
    pub fetch: FetchOptions,
    pub update: UpdateOptions,
    pub sequence: Option<Rc<dyn Sequence>>,
    pub progressbar: Option<String>,
    pub scope: Option<ScopeTable>,
    pub fallback: Option<Fallback>,
}

impl Options {
    pub fn with_areas<I, S>(mut self, areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.areas = Some(areas.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Clone, Default)]
pub struct FetchOptions {
    pub timeout: Option<Duration>,
    pub wait: Option<Duration>,
    pub headers: Option<Vec<(String, String)>>,
    pub rewrite: Option<PathRewrite>,
    pub cache: Option<CacheKey>,
}

impl FetchOptions {
    fn apply(&self, target: &mut FetchConfig) {
        if let Some(timeout) = self.timeout {
            target.timeout = timeout;
        }
        if let Some(wait) = self.wait {
            target.wait = wait;
        }
        if let Some(headers) = &self.headers {
            target.headers = headers.clone();
        }
        if let Some(rewrite) = &self.rewrite {
            target.rewrite = Rc::clone(rewrite);
        }
        if let Some(cache) = &self.cache {
            target.cache = Rc::clone(cache);
        }
    }
}

#[derive(Clone, Default)]
pub struct UpdateOptions {
    pub head: Option<String>,
    pub css: Option<bool>,
    pub script: Option<bool>,
    pub ignores: Option<Vec<(String, String)>>,
    /// Shorthand that writes the `_` ignore entry.
    pub ignore: Option<String>,
    pub reload: Option<String>,
    pub logger: Option<String>,
    pub rewrite: Option<DocumentRewrite>,
}

impl UpdateOptions {
    fn apply(&self, target: &mut UpdateConfig) {
        if let Some(head) = &self.head {
            target.head = head.clone();
        }
        if let Some(css) = self.css {
            target.css = css;
        }
        if let Some(script) = self.script {
            target.script = script;
        }
        if let Some(ignores) = &self.ignores {
            for (key, selector) in ignores {
                set_entry(&mut target.ignores, key, selector);
            }
        }
        if let Some(ignore) = &self.ignore {
            target.set_ignore(ignore);
        }
        if let Some(reload) = &self.reload {
            target.reload = reload.clone();
        }
        if let Some(logger) = &self.logger {
            target.logger = logger.clone();
        }
        if let Some(rewrite) = &self.rewrite {
            target.rewrite = Rc::clone(rewrite);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use super::FallbackContext;
    use super::FetchOptions;
    use super::Options;
    use super::ScopeTable;
    use super::UpdateOptions;
    use super::default_fallback;
    use super::selector_or_nothing;
    use crate::event::EventSource;
    use crate::memory::MemoryWindow;
    use pj_core::PjaxError;
    use pj_dom::Document;
    use std::time::Duration;

    #[test]
    fn defaults_follow_the_documented_table() {
        let config = Config::default();
        assert_eq!(config.areas, vec!["body".to_owned()]);
        assert_eq!(config.link, "a, area");
        assert_eq!(config.form, "form:not([method])");
        assert_eq!(config.fetch.timeout, Duration::from_millis(3000));
        assert_eq!(config.fetch.wait, Duration::ZERO);
        assert_eq!(config.update.head, "base, meta, link");
        assert!(config.update.css && config.update.script);
        assert_eq!(
            config.update.ignore(),
            r#"[href^="chrome-extension://"], [src*=".scr.kaspersky-labs.com/"]"#
        );
        assert!(config.scope.contains_key("/"));
        assert!(config.progressbar.starts_with("display:none;"));
        assert_eq!((config.fetch.rewrite)("/a?b"), "/a?b");
        assert_eq!((config.fetch.cache)("/a", &[]), "");
    }

    #[test]
    fn merge_is_a_deep_extend() {
        let base = Config::new(&Options {
            replace: Some(".swap".to_owned()),
            fetch: FetchOptions {
                wait: Some(Duration::from_millis(50)),
                ..FetchOptions::default()
            },
            ..Options::default()
        });
        let merged = base.merge(&Options {
            fetch: FetchOptions {
                timeout: Some(Duration::from_millis(10)),
                ..FetchOptions::default()
            },
            update: UpdateOptions {
                ignore: Some("script.analytics".to_owned()),
                ..UpdateOptions::default()
            },
            ..Options::default().with_areas(["#main"])
        });

        assert_eq!(merged.areas, vec!["#main".to_owned()]);
        assert_eq!(merged.replace, ".swap");
        assert_eq!(merged.fetch.wait, Duration::from_millis(50));
        assert_eq!(merged.fetch.timeout, Duration::from_millis(10));
        assert!(merged.update.ignore().ends_with(", script.analytics"));
        assert_eq!(base.fetch.timeout, Duration::from_millis(3000));
    }

    #[test]
    fn ignore_entries_merge_by_key_and_skip_blanks() {
        let config = Config::new(&Options {
            update: UpdateOptions {
                ignores: Some(vec![
                    ("extension".to_owned(), " ".to_owned()),
                    ("ads".to_owned(), ".ad".to_owned()),
                ]),
                ..UpdateOptions::default()
            },
            ..Options::default()
        });
        assert_eq!(
            config.update.ignore(),
            r#"[src*=".scr.kaspersky-labs.com/"], .ad"#
        );
    }

    #[test]
    fn scope_entries_merge_by_pattern() {
        let mut scope = ScopeTable::new();
        scope.insert("/admin/".to_owned(), None);
        let config = Config::new(&Options {
            scope: Some(scope),
            ..Options::default()
        });
        assert_eq!(config.scope.len(), 2);
        assert!(matches!(config.scope.get("/admin/"), Some(None)));
    }

    #[test]
    fn pjax_markers_override_user_headers() {
        let config = Config::new(&Options {
            fetch: FetchOptions {
                headers: Some(vec![
                    ("X-Pjax".to_owned(), "0".to_owned()),
                    ("X-Custom".to_owned(), "yes".to_owned()),
                ]),
                ..FetchOptions::default()
            },
            ..Options::default()
        });
        assert_eq!(
            config.fetch.request_headers(),
            vec![
                ("X-Custom".to_owned(), "yes".to_owned()),
                ("X-Requested-With".to_owned(), "XMLHttpRequest".to_owned()),
                ("X-Pjax".to_owned(), "1".to_owned()),
            ]
        );
    }

    #[test]
    fn blank_selectors_match_nothing() {
        assert_eq!(selector_or_nothing("  "), "_");
        assert_eq!(selector_or_nothing(" .a "), ".a");
    }

    #[test]
    fn default_filter_rejects_targeted_links() {
        let document = Document::new("https://example.test/");
        let plain = document.create_element("a");
        document.set_attribute(plain, "href", "/b");
        let targeted = document.create_element("a");
        document.set_attribute(targeted, "href", "/b");
        document.set_attribute(targeted, "target", "_blank");

        let config = Config::default();
        assert!((config.filter)(&document, plain));
        assert!(!(config.filter)(&document, targeted));
    }

    #[test]
    fn default_fallback_follows_the_trigger() {
        let document = Document::new("https://example.test/dir/");
        let window = MemoryWindow::new();
        let reason = PjaxError::new("domain.fetch.error", "Failed to request by error.");

        let anchor = document.create_element("a");
        document.set_attribute(anchor, "href", "next");
        let form = document.create_element("form");
        let div = document.create_element("div");

        for target in [
            EventSource::Element(anchor),
            EventSource::Element(form),
            EventSource::Window,
        ] {
            let outcome = default_fallback(&FallbackContext {
                document: &document,
                window: &window,
                target,
                reason: &reason,
            });
            assert!(outcome.is_ok());
        }
        assert_eq!(
            window.assignments(),
            vec![
                "https://example.test/dir/next".to_owned(),
                "https://example.test/dir/".to_owned(),
            ]
        );
        assert_eq!(window.reloads(), 1);

        let outcome = default_fallback(&FallbackContext {
            document: &document,
            window: &window,
            target: EventSource::Element(div),
            reason: &reason,
        });
        assert_eq!(outcome, Err(reason));
    }
}
