//! Script evaluation against the live document.
//!
//! [`ScriptHost`] is what the navigation pipeline talks to. [`PageRuntime`]
//! implements it on a persistent boa context: page scripts share globals
//! across navigations, see the document title and location, and get a
//! `document.currentScript` bound to the element being evaluated. Changes a
//! script makes to those are written back to the document after it runs.

use boa_engine::Context;
use boa_engine::Source;
use pj_core::PjaxError;
use pj_core::PjaxResult;
use pj_dom::Document;
use pj_dom::NodeId;
use serde::Deserialize;
use serde::Serialize;

const BOOTSTRAP_ENV: &str = r#"
globalThis.window = globalThis;
globalThis.self = globalThis;
globalThis.navigator = {
  userAgent: "pjax-shell",
  language: "en-US",
  languages: ["en-US", "en"]
};
globalThis.__pj_console = [];
globalThis.console = (function () {
  function record() {
    globalThis.__pj_console.push(Array.prototype.map.call(arguments, String).join(" "));
  }
  return { log: record, info: record, warn: record, error: record, debug: record };
})();
globalThis.__pj_timer_queue = [];
globalThis.__pj_timer_cancelled = {};
globalThis.__pj_next_timer_id = 1;
globalThis.setTimeout = function (callback, _delay) {
  var cb = callback;
  if (typeof cb !== "function") {
    var src = String(callback);
    cb = function () { (0, eval)(src); };
  }
  var id = globalThis.__pj_next_timer_id++;
  globalThis.__pj_timer_queue.push({ id: id, cb: cb });
  return id;
};
globalThis.clearTimeout = function (id) {
  globalThis.__pj_timer_cancelled[String(id)] = true;
};
globalThis.queueMicrotask = function (callback) {
  return globalThis.setTimeout(callback, 0);
};
globalThis.__pj_flush_timers = function (limit) {
  var runs = 0;
  while (globalThis.__pj_timer_queue.length > 0 && runs < limit) {
    var task = globalThis.__pj_timer_queue.shift();
    var cancelled = !!globalThis.__pj_timer_cancelled[String(task.id)];
    delete globalThis.__pj_timer_cancelled[String(task.id)];
    if (!cancelled) {
      task.cb();
    }
    runs++;
  }
  return runs;
};

(function () {
  function makeEventTarget(target) {
    var listeners = Object.create(null);
    target.addEventListener = function (type, handler) {
      var key = String(type || "");
      if (!key || typeof handler !== "function") {
        return;
      }
      (listeners[key] = listeners[key] || []).push(handler);
    };
    target.removeEventListener = function (type, handler) {
      var arr = listeners[String(type || "")];
      var index = arr ? arr.indexOf(handler) : -1;
      if (index >= 0) {
        arr.splice(index, 1);
      }
    };
    target.dispatchEvent = function (event) {
      var arr = (listeners[String((event && event.type) || "")] || []).slice();
      for (var i = 0; i < arr.length; i += 1) {
        arr[i].call(this, event);
      }
      return true;
    };
    return target;
  }

  function makeElement(seed) {
    var attrs = Object.create(null);
    for (var i = 0; i < seed.attributes.length; i += 1) {
      attrs[seed.attributes[i][0]] = seed.attributes[i][1];
    }
    var element = makeEventTarget({
      tagName: seed.tagName.toUpperCase(),
      innerHTML: seed.innerHTML,
      getAttribute: function (name) {
        var key = String(name).toLowerCase();
        return key in attrs ? attrs[key] : null;
      },
      hasAttribute: function (name) {
        return String(name).toLowerCase() in attrs;
      },
      setAttribute: function (name, value) {
        attrs[String(name).toLowerCase()] = String(value);
      },
      removeAttribute: function (name) {
        delete attrs[String(name).toLowerCase()];
      }
    });
    Object.defineProperty(element, "textContent", {
      get: function () { return this.innerHTML; },
      set: function (value) { this.innerHTML = String(value); }
    });
    Object.defineProperty(element, "id", {
      get: function () { return attrs.id || ""; }
    });
    Object.defineProperty(element, "src", {
      get: function () { return attrs.src || ""; }
    });
    Object.defineProperty(element, "__pj_attrs", { value: attrs });
    return element;
  }

  globalThis.location = makeEventTarget({
    href: "",
    assign: function (next) { this.href = String(next); },
    replace: function (next) { this.href = String(next); },
    reload: function () { globalThis.__pj_reload = true; },
    toString: function () { return this.href; }
  });
  globalThis.document = makeEventTarget({
    title: "",
    URL: "",
    readyState: "complete",
    currentScript: null,
    location: globalThis.location
  });
  globalThis.__pj_reload = false;

  globalThis.__pj_enter = function (state) {
    document.title = state.title;
    document.URL = state.href;
    location.href = state.href;
    document.currentScript = state.current ? makeElement(state.current) : null;
    globalThis.__pj_reload = false;
  };

  globalThis.__pj_leave = function () {
    var current = document.currentScript;
    var attrs = current && current.__pj_attrs;
    var out = {
      title: String(document.title),
      href: String(location.href),
      reload: !!globalThis.__pj_reload,
      console: globalThis.__pj_console.splice(0),
      current: attrs ? {
        tagName: String(current.tagName),
        innerHTML: String(current.innerHTML),
        attributes: Object.keys(attrs).map(function (key) { return [key, String(attrs[key])]; })
      } : null
    };
    document.currentScript = null;
    return JSON.stringify(out);
  };
})();
"#;

/// Evaluates script elements on behalf of the navigation pipeline.
pub trait ScriptHost {
    /// Whether `document.currentScript` is bound while a script runs.
    fn supports_current_script(&self) -> bool;

    /// Runs `code` as the body of `script`, which is attached to `document`.
    /// Uncaught exceptions are returned as errors.
    fn evaluate(&mut self, document: &Document, script: NodeId, code: &str) -> PjaxResult<()>;
}

/// Navigation requested by a script through `location`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageNavigation {
    Assign(String),
    Reload,
}

/// Runtime hardening knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsRuntimeConfig {
    /// Scripts larger than this are rejected without being evaluated.
    pub max_script_bytes: usize,
    pub recursion_limit: usize,
    pub stack_size_limit: usize,
    pub loop_iteration_limit: u64,
    /// Queued timer callbacks run after each script.
    pub timer_flush_limit: usize,
}

impl Default for JsRuntimeConfig {
    fn default() -> Self {
        Self {
            max_script_bytes: 8 * 1024 * 1024,
            recursion_limit: 64,
            stack_size_limit: 1024,
            loop_iteration_limit: 100_000,
            timer_flush_limit: 128,
        }
    }
}

#[derive(Debug, Serialize)]
struct EnterState<'a> {
    title: String,
    href: String,
    current: Option<ElementState<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ElementState<'a> {
    tag_name: &'a str,
    #[serde(rename = "innerHTML")]
    inner_html: String,
    attributes: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct LeaveState {
    title: String,
    href: String,
    reload: bool,
    console: Vec<String>,
    current: Option<LeftElement>,
}

#[derive(Debug, Deserialize)]
struct LeftElement {
    #[serde(rename = "innerHTML")]
    inner_html: String,
    attributes: Vec<(String, String)>,
}

/// Persistent boa context shared by every script of a page.
pub struct PageRuntime {
    context: Context,
    config: JsRuntimeConfig,
    navigation: Option<PageNavigation>,
}

impl PageRuntime {
    pub fn new(config: JsRuntimeConfig) -> PjaxResult<Self> {
        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_recursion_limit(config.recursion_limit);
        context
            .runtime_limits_mut()
            .set_stack_size_limit(config.stack_size_limit);
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(config.loop_iteration_limit);

        context
            .eval(Source::from_bytes(BOOTSTRAP_ENV.as_bytes()))
            .map_err(|error| {
                PjaxError::new("js.bootstrap.failed", format!("bootstrap failed: {error}"))
            })?;

        Ok(Self {
            context,
            config,
            navigation: None,
        })
    }

    /// Takes the last navigation a script requested through `location`.
    pub fn take_navigation(&mut self) -> Option<PageNavigation> {
        self.navigation.take()
    }

    /// Evaluates `code` with no current script, for embedders.
    pub fn eval(&mut self, code: &str) -> PjaxResult<String> {
        let value = self
            .context
            .eval(Source::from_bytes(code.as_bytes()))
            .map_err(|error| PjaxError::new("js.eval.failed", error.to_string()))?;
        let text = value
            .to_string(&mut self.context)
            .map_err(|error| PjaxError::new("js.eval.failed", error.to_string()))?;
        Ok(text.to_std_string_escaped())
    }

    fn enter(&mut self, document: &Document, script: NodeId) -> PjaxResult<()> {
        let tag_name = document.tag_name(script).unwrap_or_default();
        let state = EnterState {
            title: document.title(),
            href: document.url(),
            current: Some(ElementState {
                tag_name: &tag_name,
                inner_html: document.text_content(script),
                attributes: document.attributes(script),
            }),
        };
        let json = serde_json::to_string(&state)
            .map_err(|error| PjaxError::new("js.state.encode_failed", error.to_string()))?;
        self.eval(&format!("__pj_enter({json});")).map(|_| ())
    }

    fn leave(&mut self, document: &Document, script: NodeId) -> PjaxResult<()> {
        let json = self.eval("__pj_leave();")?;
        let state: LeaveState = serde_json::from_str(&json)
            .map_err(|error| PjaxError::new("js.state.decode_failed", error.to_string()))?;

        for line in &state.console {
            log::debug!("console: {line}");
        }

        if state.title != document.title() {
            document.set_title(&state.title);
        }

        if let Some(current) = state.current {
            if current.inner_html != document.text_content(script) {
                document.set_text_content(script, &current.inner_html);
            }
            for (name, _) in document.attributes(script) {
                if !current.attributes.iter().any(|(kept, _)| *kept == name) {
                    document.remove_attribute(script, &name);
                }
            }
            for (name, value) in &current.attributes {
                if document.attribute(script, name).as_deref() != Some(value.as_str()) {
                    document.set_attribute(script, name, value);
                }
            }
        }

        if state.reload {
            self.navigation = Some(PageNavigation::Reload);
        } else if state.href != document.url() {
            self.navigation = Some(PageNavigation::Assign(state.href));
        }

        Ok(())
    }

    fn flush_timers(&mut self) {
        let flush = format!("__pj_flush_timers({});", self.config.timer_flush_limit);
        if let Err(error) = self.eval(&flush) {
            log::warn!("timer callback failed: {error}");
        }
    }
}

impl ScriptHost for PageRuntime {
    fn supports_current_script(&self) -> bool {
        true
    }

    fn evaluate(&mut self, document: &Document, script: NodeId, code: &str) -> PjaxResult<()> {
        if code.len() > self.config.max_script_bytes {
            return Err(PjaxError::new(
                "js.eval.oversized",
                format!(
                    "script of {} bytes exceeds the {} byte limit",
                    code.len(),
                    self.config.max_script_bytes
                ),
            ));
        }

        self.enter(document, script)?;
        let outcome = self
            .context
            .eval(Source::from_bytes(code.as_bytes()))
            .map(|_| ())
            .map_err(|error| PjaxError::new("js.eval.failed", error.to_string()));
        if outcome.is_ok() {
            self.flush_timers();
        }
        self.leave(document, script)?;
        outcome
    }
}
