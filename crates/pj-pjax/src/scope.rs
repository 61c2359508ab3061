//! Scope resolution: the per-path configuration overrides.

use crate::config::Config;
use crate::pattern::compare;

/// Resolves the configuration for a navigation from `orig` to `dest`.
///
/// Patterns are tried from the highest-sorting down; the first one matching
/// either path decides. It must match both paths, and a `None` entry
/// disables navigation for the scope.
pub fn scope(config: &Config, orig: &str, dest: &str) -> Option<Config> {
    let (pattern, options) = config
        .scope
        .iter()
        .rev()
        .find(|(pattern, _)| compare(pattern, orig) || compare(pattern, dest))?;

    if !(compare(pattern, orig) && compare(pattern, dest)) {
        log::debug!("scope `{pattern}` does not cover both `{orig}` and `{dest}`");
        return None;
    }

    let Some(options) = options else {
        log::debug!("scope `{pattern}` is disabled");
        return None;
    };
    Some(config.merge(options))
}
