//! Classify curl failures into resumable interruptions and hard failures.

/// How a failed curl transfer should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// Connection dropped or stalled; the partial data can be resumed.
    Transient,
    /// Anything else; the transfer fails.
    Fatal,
}

/// Classify a curl error. Timeouts and connection-level errors are transient.
pub fn classify_curl_error(e: &::curl::Error) -> Interruption {
    if e.is_operation_timedout()
        || e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return Interruption::Transient;
    }
    Interruption::Fatal
}
