use std::fmt;

/// Request-scoped logger.
///
/// Obtained from [`Ctx::log`](crate::context::Ctx::log). Every event carries
/// the request id and, once a session has been resolved, the principal id.
/// Pass identifiers only; record payloads may hold personal data.
#[derive(Debug, Clone, Copy)]
pub struct RequestLog<'a> {
    request_id: &'a str,
    principal_id: Option<&'a str>,
}

impl<'a> RequestLog<'a> {
    pub(crate) fn new(request_id: &'a str, principal_id: Option<&'a str>) -> Self {
        Self {
            request_id,
            principal_id,
        }
    }

    /// Request id stamped on every event.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Principal id stamped on every event, if resolved.
    pub fn principal_id(&self) -> Option<&str> {
        self.principal_id
    }

    /// Logs at info.
    ///
    /// ```no_run
    /// # use compliance_core::RequestLog;
    /// # fn example(log: &RequestLog) {
    /// log.info(format_args!("dsr {} started", "DSR-2026-000001"));
    /// # }
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, principal_id = self.principal_id, "{}", args);
    }

    /// Logs at warn.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, principal_id = self.principal_id, "{}", args);
    }

    /// Logs at error.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(request_id = %self.request_id, principal_id = self.principal_id, "{}", args);
    }

    /// Logs at debug.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, principal_id = self.principal_id, "{}", args);
    }
}
