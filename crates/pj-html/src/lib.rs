//! HTML parsing into detached documents.
//!
//! Two strategies exist: one that parses `<noscript>` content as markup and
//! repairs it afterwards, and one that treats it as raw text the way a
//! scripting-enabled document writer does. The first strategy that passes a
//! fixed self-test is chosen once per process.

mod tokenizer;
mod tree;

use pj_core::PjaxError;
use pj_core::PjaxResult;
use pj_dom::Document;
use pj_dom::NodeId;
use std::sync::OnceLock;
use tokenizer::TokenizerOptions;
use tokenizer::tokenize;
use url::Url;

const FIXTURE_URL: &str = "https://fixture.invalid/";
const FIXTURE: &str = "\n<html lang=\"en\" class=\"html\">\n  <head>\n    <link href=\"/\">\n    <title>&amp;</title>\n    <noscript><style>/**/</style></noscript>\n  </head>\n  <body>\n    <noscript>noscript</noscript>\n    <a href=\"/\"></a>\n    <script>document.head.remove();</script>\n  </body>\n</html>\n";

static STRATEGY: OnceLock<Option<ParseStrategy>> = OnceLock::new();

/// How a response body is turned into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// Markup parser without scripting; `<noscript>` bodies are repaired.
    Detached,
    /// Document writer with scripting; the title is cross-checked against
    /// the markup before the first `</title>`.
    Written,
}

impl ParseStrategy {
    pub const ALL: [Self; 2] = [Self::Detached, Self::Written];

    pub fn parse(self, html: &str, url: &str) -> Document {
        match self {
            Self::Detached => {
                let doc = build(html, url, false);
                fix_noscript(&doc);
                doc
            }
            Self::Written => {
                let title = prefix_title(html);
                let doc = build(html, url, true);
                if doc.title() != title {
                    let raw = doc
                        .query_selector(doc.root(), "title")
                        .ok()
                        .flatten()
                        .map(|node| doc.text_content(node))
                        .unwrap_or_default();
                    doc.set_title(&raw);
                }
                fix_noscript(&doc);
                doc
            }
        }
    }

    /// Runs the self-test document through this strategy.
    pub fn passes_self_test(self) -> bool {
        check_fixture(&self.parse(FIXTURE, FIXTURE_URL))
    }
}

/// The strategy selected for this process, if any passed the self-test.
pub fn strategy() -> Option<ParseStrategy> {
    *STRATEGY.get_or_init(|| {
        let chosen = ParseStrategy::ALL
            .into_iter()
            .find(|candidate| candidate.passes_self_test());
        match chosen {
            Some(strategy) => log::debug!("html parser strategy: {strategy:?}"),
            None => log::warn!("no html parser strategy passed the self-test"),
        }
        chosen
    })
}

/// Parses `html` into a detached document whose URL is `url`.
pub fn parse(html: &str, url: &str) -> PjaxResult<Document> {
    let strategy = strategy().ok_or_else(|| {
        PjaxError::new(
            "html.parser.unavailable",
            "no HTML parser passed the self-test",
        )
    })?;
    Ok(strategy.parse(html, url))
}

/// Rewrites `<noscript>` elements whose content was parsed as markup so that
/// their only child is the serialized markup as text.
pub fn fix_noscript(doc: &Document) {
    let Ok(noscripts) = doc.query_selector_all(doc.root(), "noscript") else {
        return;
    };
    for node in noscripts {
        if doc.element_children(node).is_empty() {
            continue;
        }
        let markup = doc.inner_html(node);
        doc.set_text_content(node, &markup);
    }
}

fn build(html: &str, url: &str, scripting: bool) -> Document {
    let doc = Document::new(url);
    tree::build_tree(&doc, tokenize(html, TokenizerOptions { scripting }));
    doc
}

fn prefix_title(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    let Some(end) = lower.find("</title>") else {
        return String::new();
    };
    let prefix = &html[..end.saturating_add("</title>".len())];
    let doc = build(prefix, FIXTURE_URL, true);
    doc.query_selector(doc.root(), "title")
        .ok()
        .flatten()
        .map(|node| doc.text_content(node))
        .unwrap_or_default()
}

fn check_fixture(doc: &Document) -> bool {
    let first = |selector: &str| doc.query_selector(doc.root(), selector).ok().flatten();
    let text_of = |selector: &str| first(selector).map(|node| doc.text_content(node));

    doc.url().starts_with(FIXTURE_URL.trim_end_matches('/'))
        && doc.title() == "&"
        && first(r#"html.html[lang="en"]"#).is_some()
        && first("head>link").is_some_and(|node| resolves(doc, node))
        && first("body>a").is_some_and(|node| resolves(doc, node))
        && first("head>noscript>*").is_none()
        && first("script").map(|node| doc.inner_html(node)).as_deref()
            == Some("document.head.remove();")
        && text_of("head>noscript").as_deref() == Some("<style>/**/</style>")
        && text_of("body>noscript").as_deref() == Some("noscript")
}

fn resolves(doc: &Document, node: NodeId) -> bool {
    let Some(href) = doc.attribute(node, "href") else {
        return false;
    };
    Url::parse(&doc.url())
        .and_then(|base| base.join(&href))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::FIXTURE;
    use super::FIXTURE_URL;
    use super::ParseStrategy;
    use super::fix_noscript;
    use super::parse;
    use super::strategy;
    use pj_dom::Document;

    fn parsed(html: &str) -> Document {
        let doc = parse(html, "https://example.test/a");
        assert!(doc.is_ok());
        match doc {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn both_strategies_pass_the_self_test() {
        assert!(ParseStrategy::Detached.passes_self_test());
        assert!(ParseStrategy::Written.passes_self_test());
        assert_eq!(strategy(), Some(ParseStrategy::Detached));
    }

    #[test]
    fn fixture_places_head_and_body_content() {
        let doc = ParseStrategy::Detached.parse(FIXTURE, FIXTURE_URL);
        let head = doc.head();
        assert!(head.is_some());
        let tags: Vec<String> = head
            .map(|head| doc.element_children(head))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|node| doc.tag_name(node))
            .collect();
        assert_eq!(tags, vec!["link", "title", "noscript"]);
    }

    #[test]
    fn implies_missing_structure() {
        let doc = parsed("<title>T</title><main>1</main>");
        assert_eq!(doc.title(), "T");
        let main = doc.query_selector(doc.root(), "html > body > main");
        assert!(matches!(main, Ok(Some(_))));
        assert_eq!(doc.url(), "https://example.test/a");
    }

    #[test]
    fn keeps_script_bodies_verbatim() {
        let doc = parsed("<body><script>if (a < b && c) { x('</div>'); }</script></body>");
        let script = doc.query_selector(doc.root(), "script");
        let script = match script {
            Ok(Some(node)) => node,
            other => panic!("{other:?}"),
        };
        assert_eq!(doc.inner_html(script), "if (a < b && c) { x('</div>'); }");
    }

    #[test]
    fn paragraphs_close_before_blocks() {
        let doc = parsed("<body><p>one<div>two</div></body>");
        let body = doc.body();
        assert!(body.is_some());
        let body = body.map(|node| doc.inner_html(node)).unwrap_or_default();
        assert_eq!(body, "<p>one</p><div>two</div>");
    }

    #[test]
    fn noscript_fix_only_touches_markup_children() {
        let doc = ParseStrategy::Detached.parse(
            "<body><noscript><img src=\"/x.png\"></noscript><noscript>plain</noscript></body>",
            FIXTURE_URL,
        );
        fix_noscript(&doc);
        let texts: Vec<String> = doc
            .query_selector_all(doc.root(), "noscript")
            .unwrap_or_default()
            .into_iter()
            .map(|node| doc.text_content(node))
            .collect();
        assert_eq!(texts, vec!["<img src=\"/x.png\">", "plain"]);
    }
}
