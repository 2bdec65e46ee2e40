use std::collections::HashMap;
use std::fmt;

/// HTTP request methods.
///
/// Only GET is routed by the server; other methods parse but are left
/// unhandled. Unrecognized tokens are preserved in `Other` so the request
/// can still be access-logged by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    OPTIONS,
    PATCH,
    Other(String),
}

impl Method {
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            other => Method::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Other(token) => token.as_str(),
        };
        f.write_str(name)
    }
}

/// A parsed HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// The HTTP method (GET, POST, ...)
    pub method: Method,
    /// Request path with the query string stripped (e.g. "/login")
    pub path: String,
    /// HTTP version token (typically "HTTP/1.1")
    pub version: String,
    /// Header fields, keys and values trimmed
    pub headers: HashMap<String, String>,
    /// Query-string parameters; later duplicate keys overwrote earlier ones
    pub params: HashMap<String, String>,
}

impl Request {
    /// Retrieves a header value by name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// Retrieves a query-string parameter by name.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|v| v.as_str())
    }

    /// Extracts the session token from the `Cookie` header, if any.
    pub fn session_cookie(&self) -> Option<&str> {
        self.header("Cookie").and_then(|cookie| {
            cookie
                .split(';')
                .find_map(|part| part.trim().strip_prefix("session="))
        })
    }
}
