use std::collections::VecDeque;
use std::sync::Once;

use tracing::Level;

static INIT: Once = Once::new();

/// Prepends a stack of prefixes to every message it emits.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    prefixes: VecDeque<String>,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            prefixes: VecDeque::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: String) -> Self {
        self.prefixes.push_back(prefix);
        self
    }

    fn render(&self, message: &str) -> String {
        let prefix = self.prefixes.iter().map(|p| format!("{} ", p)).collect::<String>();
        format!("{}{}", prefix, message)
    }

    pub fn info(&self, message: &str) {
        tracing::info!("{}", self.render(message));
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{}", self.render(message));
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!("{}", self.render(message));
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!("{}", self.render(message));
    }
}

/// Installs the global fmt subscriber once; later calls only hand back a logger.
pub fn init_logging(level: Level) -> Logger {
    if !tracing::dispatcher::has_been_set() {
        INIT.call_once(|| {
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_target(false)
                .init();
        });
    }
    Logger::new()
}
