//! Minimal stderr logger.

use log::LevelFilter;
use log::Log;
use log::Metadata;
use log::Record;
use std::io::Write;

const LEVEL_VAR: &str = "PJAX_LOG";

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:<5} {}] {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: StderrLogger = StderrLogger;

pub fn level_from(value: Option<&str>) -> Result<LevelFilter, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(LevelFilter::Info),
        Some(value) => value
            .parse()
            .map_err(|_| format!("unsupported {LEVEL_VAR} level `{value}` (expected: error|warn|info|debug|trace)")),
    }
}

/// Installs the logger at the level named by `PJAX_LOG`.
pub fn install() -> Result<(), String> {
    let level = level_from(std::env::var(LEVEL_VAR).ok().as_deref())?;
    log::set_logger(&LOGGER).map_err(|error| error.to_string())?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::level_from;
    use log::LevelFilter;

    #[test]
    fn reads_levels_case_insensitively() {
        assert_eq!(level_from(None), Ok(LevelFilter::Info));
        assert_eq!(level_from(Some("DEBUG")), Ok(LevelFilter::Debug));
        assert_eq!(level_from(Some(" warn ")), Ok(LevelFilter::Warn));
        assert!(level_from(Some("loud")).is_err());
    }
}
