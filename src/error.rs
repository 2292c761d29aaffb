//! Faults raised by user code while a request is dispatched.

use std::any::Any;
use std::fmt;

/// A middleware unit, handler or interceptor failed (returned an error or
/// panicked). Always contained to one connection and answered with a 500.
#[derive(Debug)]
pub struct HandlerFault {
    /// Name of the unit that failed, e.g. `middleware:auth` or `handler:/users`.
    pub origin: String,
    pub error: anyhow::Error,
}

impl HandlerFault {
    pub fn new(origin: impl Into<String>, error: anyhow::Error) -> Self {
        Self {
            origin: origin.into(),
            error,
        }
    }

    pub(crate) fn from_panic(origin: impl Into<String>, payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self::new(origin, anyhow::anyhow!("panicked: {}", message))
    }

    /// Full detail for development mode: origin, error chain and backtrace
    /// when one was captured.
    pub fn detail(&self) -> String {
        format!("origin: {}\n{:?}", self.origin, self.error)
    }
}

impl fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {:#}", self.origin, self.error)
    }
}

impl std::error::Error for HandlerFault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_includes_origin_and_cause_chain() {
        let error = anyhow::anyhow!("disk on fire").context("loading profile");
        let fault = HandlerFault::new("handler:/profile", error);
        let detail = fault.detail();
        assert!(detail.contains("handler:/profile"));
        assert!(detail.contains("loading profile"));
        assert!(detail.contains("disk on fire"));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload = std::panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        let fault = HandlerFault::from_panic("middleware:x", payload);
        assert!(fault.to_string().contains("boom 7"));
    }
}
