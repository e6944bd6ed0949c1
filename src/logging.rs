//! Injectable logging and secret-redaction port.
//!
//! Components never print directly; they call `log` and `register_secret`
//! against this port so callers control output and secret values never
//! reach a terminal or CI log.

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

pub trait Log {
    /// Registers a sensitive value so it is masked in every later message.
    fn register_secret(&self, value: &str);

    fn log(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

/// Stderr logger with a `[prefix] message` line format.
pub struct ConsoleLog {
    prefix: String,
    verbose: bool,
    secrets: Mutex<Vec<String>>,
}

impl ConsoleLog {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            verbose: false,
            secrets: Mutex::new(Vec::new()),
        }
    }

    /// Enables debug-level lines; they are suppressed otherwise.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn redact(&self, message: &str) -> String {
        let secrets = self.secrets.lock().unwrap_or_else(|e| e.into_inner());
        let mut redacted = message.to_string();
        for secret in secrets.iter() {
            if !secret.is_empty() {
                redacted = redacted.replace(secret.as_str(), "****");
            }
        }
        redacted
    }
}

impl Log for ConsoleLog {
    fn register_secret(&self, value: &str) {
        let mut secrets = self.secrets.lock().unwrap_or_else(|e| e.into_inner());
        if !value.is_empty() && !secrets.iter().any(|s| s == value) {
            secrets.push(value.to_string());
        }
    }

    fn log(&self, level: Level, message: &str) {
        if level == Level::Debug && !self.verbose {
            return;
        }
        eprintln!("[{}] {}: {}", self.prefix, level.as_str(), self.redact(message));
    }
}

/// Capturing logger for tests.
#[cfg(test)]
pub(crate) struct MemoryLog {
    pub entries: Mutex<Vec<(Level, String)>>,
    secrets: Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemoryLog {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            secrets: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn secrets(&self) -> Vec<String> {
        self.secrets.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Log for MemoryLog {
    fn register_secret(&self, value: &str) {
        self.secrets.lock().unwrap().push(value.to_string());
    }

    fn log(&self, level: Level, message: &str) {
        self.entries.lock().unwrap().push((level, message.to_string()));
    }
}
