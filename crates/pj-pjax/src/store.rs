//! Title and scroll position kept in the history state object.
//!
//! Writes extend the current state instead of replacing it, so keys owned by
//! the embedding page survive.

use crate::host::Host;
use crate::host::Position;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

const TITLE: &str = "title";
const POSITION: &str = "position";

fn extend(state: Value, key: &str, value: Value) -> Value {
    let mut object = match state {
        Value::Object(object) => object,
        _ => Map::new(),
    };
    object.insert(key.to_owned(), value);
    Value::Object(object)
}

/// Replaces a non-object state with `{}`.
pub fn ensure_state(host: &Host) {
    if !host.history.state().is_object() {
        host.history
            .replace_state(json!({}), &host.document.title(), None);
    }
}

pub fn save_title(host: &Host) {
    let title = host.document.title();
    let state = extend(host.history.state(), TITLE, Value::from(title.clone()));
    host.history.replace_state(state, &title, None);
}

pub fn save_position(host: &Host) {
    let offset = host.window.page_offset();
    let state = extend(
        host.history.state(),
        POSITION,
        json!({ "top": offset.top, "left": offset.left }),
    );
    host.history
        .replace_state(state, &host.document.title(), None);
}

/// Title stored for the current entry, else the document title.
pub fn load_title(host: &Host) -> String {
    host.history
        .state()
        .get(TITLE)
        .and_then(Value::as_str)
        .filter(|title| !title.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| host.document.title())
}

pub fn saved_position(host: &Host) -> Option<Position> {
    let state = host.history.state();
    let position = state.get(POSITION)?;
    Some(Position {
        top: position.get("top").and_then(Value::as_i64)?,
        left: position.get("left").and_then(Value::as_i64)?,
    })
}

/// Position stored for the current entry, else the current offsets.
pub fn load_position(host: &Host) -> Position {
    saved_position(host).unwrap_or_else(|| host.window.page_offset())
}

#[cfg(test)]
mod tests {
    use super::ensure_state;
    use super::load_position;
    use super::load_title;
    use super::save_position;
    use super::save_title;
    use super::saved_position;
    use crate::host::History;
    use crate::host::Position;
    use crate::host::Window;
    use crate::testing::TestHost;
    use serde_json::json;

    #[test]
    fn writes_preserve_unrelated_keys() {
        let test = TestHost::new("https://example.test/a", "<title>A</title>");
        test.history
            .replace_state(json!({"app": 7}), "", None);
        test.window.scroll_to(3, 40);

        save_title(&test.host);
        save_position(&test.host);
        assert_eq!(
            test.history.state(),
            json!({"app": 7, "title": "A", "position": {"top": 40, "left": 3}})
        );
        assert_eq!(
            saved_position(&test.host),
            Some(Position { top: 40, left: 3 })
        );
    }

    #[test]
    fn non_object_state_is_reset() {
        let test = TestHost::new("https://example.test/a", "<title>A</title>");
        test.history.replace_state(json!("legacy"), "", None);
        ensure_state(&test.host);
        assert_eq!(test.history.state(), json!({}));
    }

    #[test]
    fn loads_fall_back_to_the_live_page() {
        let test = TestHost::new("https://example.test/a", "<title>Live</title>");
        test.window.scroll_to(0, 12);
        assert_eq!(load_title(&test.host), "Live");
        assert_eq!(load_position(&test.host), Position { top: 12, left: 0 });

        test.history
            .replace_state(json!({"title": "Saved"}), "", None);
        assert_eq!(load_title(&test.host), "Saved");
    }
}
