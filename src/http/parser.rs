use std::collections::HashMap;

use crate::http::request::{Method, Request};

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The request line had fewer than three whitespace-separated tokens
    /// (or the request was empty).
    InvalidRequestLine,
}

/// Parses a complete request text into a [`Request`].
///
/// The first line splits on whitespace into method, target and version;
/// the target splits on the first `?` into path and query string. Query
/// pairs split on `&` and on the first `=`; pairs without `=` are skipped
/// and later duplicate keys overwrite earlier ones. Header lines are read
/// up to the first blank line with keys and values trimmed; lines without
/// a `:` are skipped. There is no body handling.
pub fn parse_request(text: &str) -> Result<Request, ParseError> {
    let mut lines = text.lines();

    let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
    let mut tokens = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ParseError::InvalidRequestLine);
    };

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };

    let mut params = HashMap::new();
    if let Some(query) = query {
        for pair in query.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            }
        }
    }

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    Ok(Request {
        method: Method::from_token(method),
        path: path.to_string(),
        version: version.to_string(),
        headers,
        params,
    })
}
