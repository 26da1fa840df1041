//! Request/response start lines and status-code reason phrases.

/// The protocol version carried on every start line built by this engine.
pub const HTTP_VERSION: &str = "HTTP/2.0";

/// The first line of a message, reconstructed from (or translated into)
/// pseudo-headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    /// Server role receives these; client role sends them.
    Request { method: String, path: String },
    /// Client role receives these; server role sends them.
    Response { status: u16, reason: String },
}

impl StartLine {
    pub fn request(method: impl Into<String>, path: impl Into<String>) -> Self {
        StartLine::Request {
            method: method.into(),
            path: path.into(),
        }
    }

    pub fn response(status: u16) -> Self {
        StartLine::Response {
            status,
            reason: reason_phrase(status).to_string(),
        }
    }

    pub fn version(&self) -> &'static str {
        HTTP_VERSION
    }
}

/// Standard reason phrase for a status code, empty string if unknown.
/// Only used to fill in response start lines on the client side; the wire
/// carries the bare `:status` code.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        421 => "Misdirected Request",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "",
    }
}
