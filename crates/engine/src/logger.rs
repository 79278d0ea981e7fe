//! Destinations for `message` output.

/// Receives the text of `message` calls made by rule bodies.
pub trait MessageLogger {
    fn log(&self, message: &str);
}

/// Discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl MessageLogger for NoopLogger {
    fn log(&self, _message: &str) {}
}

/// Forwards messages to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacadeLogger;

impl MessageLogger for LogFacadeLogger {
    fn log(&self, message: &str) {
        log::info!(target: "stencil::message", "{}", message);
    }
}
