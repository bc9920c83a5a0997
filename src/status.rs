//! Status-code tables for HTTP (RFC 7231) and the WebDAV extension (RFC 4918).

pub const OK: u16 = 200;
pub const MULTI_STATUS: u16 = 207;
pub const BAD_REQUEST: u16 = 400;
pub const UNAUTHORIZED: u16 = 401;
pub const FORBIDDEN: u16 = 403;
pub const NOT_FOUND: u16 = 404;
pub const METHOD_NOT_ALLOWED: u16 = 405;
pub const CONFLICT: u16 = 409;
pub const PRECONDITION_FAILED: u16 = 412;
pub const UNSUPPORTED_MEDIA_TYPE: u16 = 415;
pub const LOCKED: u16 = 423;
pub const INTERNAL_SERVER_ERROR: u16 = 500;
pub const BAD_GATEWAY: u16 = 502;
pub const SERVICE_UNAVAILABLE: u16 = 503;
pub const GATEWAY_TIMEOUT: u16 = 504;
pub const INSUFFICIENT_STORAGE: u16 = 507;

fn http_table(status: u16) -> Option<&'static str> {
    match status {
        BAD_REQUEST => Some("bad request"),
        UNAUTHORIZED => Some("authentication failed: invalid credentials"),
        FORBIDDEN => Some("permission denied: access refused"),
        NOT_FOUND => Some("resource not found"),
        METHOD_NOT_ALLOWED => Some("method not allowed"),
        INTERNAL_SERVER_ERROR => Some("internal server error"),
        BAD_GATEWAY => Some("bad gateway"),
        SERVICE_UNAVAILABLE => Some("service temporarily unavailable"),
        GATEWAY_TIMEOUT => Some("gateway timeout"),
        _ => None,
    }
}

fn webdav_table(status: u16) -> Option<&'static str> {
    match status {
        MULTI_STATUS => Some("multi-status response"),
        CONFLICT => Some("conflict: parent directory may not exist"),
        PRECONDITION_FAILED => Some("precondition failed"),
        UNSUPPORTED_MEDIA_TYPE => Some("unsupported media type"),
        LOCKED => Some("resource is locked"),
        INSUFFICIENT_STORAGE => Some("insufficient storage"),
        _ => None,
    }
}

/// Human-readable message for an HTTP status.
pub fn http_message(status: u16) -> String {
    http_table(status)
        .map(str::to_string)
        .unwrap_or_else(|| format!("request failed: {status}"))
}

/// Human-readable message for a WebDAV response; WebDAV codes win, HTTP codes are the fallback.
pub fn webdav_message(status: u16) -> String {
    webdav_table(status)
        .map(str::to_string)
        .unwrap_or_else(|| http_message(status))
}

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
