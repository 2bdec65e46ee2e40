use std::sync::Arc;

use tracing::{debug, warn};

use crate::http::connection::Connection;
use crate::http::parser::{self, ParseError};
use crate::http::request::{Method, Request};
use crate::session::SessionRegistry;
use crate::storage::Database;

/// Resource served for `/`.
const DEFAULT_RESOURCE: &str = "/resource/login/html";

/// Parses requests off a connection and dispatches them by path.
pub struct Router {
    db: Arc<Database>,
    sessions: SessionRegistry,
}

impl Router {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            sessions: SessionRegistry::new(),
        }
    }

    /// Processes one request/response cycle. Returns whether the request
    /// was handled; the connection is consumed either way.
    pub fn handle(&self, mut connection: Connection) -> bool {
        let text = match connection.read_request() {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "Failed to read request");
                return false;
            }
        };

        let request = match parser::parse_request(&text) {
            Ok(request) => request,
            Err(ParseError::InvalidRequestLine) => {
                let _ = connection.write_line("HTTP/1.1 300 Error");
                return false;
            }
        };

        // Access log before routing. A logging failure is not fatal to the
        // request.
        if let Err(e) = self
            .db
            .log_http(&format!("{} {}", request.method, request.path))
        {
            warn!(error = %e, "Failed to record access log");
        }

        match request.method {
            Method::GET => self.get(connection, request),
            // Preserved gap: non-GET requests produce no response at all.
            _ => false,
        }
    }

    fn get(&self, mut connection: Connection, request: Request) -> bool {
        if request.path == "/login" {
            self.do_login(&mut connection, &request)
        } else if request.path == "/logout" {
            self.do_logout(&mut connection, &request)
        } else if request.path.starts_with("/api") {
            connection
                .write_html(&format!("Content: {}", request.path))
                .is_ok()
        } else if request.path == "/" {
            connection.write_file(DEFAULT_RESOURCE).is_ok()
        } else {
            connection.write_file(&request.path).is_ok()
        }
    }

    /// Login is valid when both credential parameters are present; no
    /// credential verification happens at this layer. A fresh session is
    /// registered and handed back as a cookie on the valid path, and the
    /// response always refreshes to `/`.
    fn do_login(&self, connection: &mut Connection, request: &Request) -> bool {
        let valid = request.param("username").is_some() && request.param("password").is_some();

        if valid {
            let session = self.sessions.generate();
            if self.sessions.login(session.token()) {
                connection.write_cookie(&format!("session={}", session.token()));
            }
        }

        connection.write_field("Refresh: 0; url=/");
        if let Err(e) = connection.write_html("") {
            debug!(error = %e, "Failed to write login response");
        }

        valid
    }

    fn do_logout(&self, connection: &mut Connection, request: &Request) -> bool {
        if let Some(token) = request.session_cookie() {
            if !self.sessions.logout(token) {
                debug!("Logout for unknown session");
            }
        }

        connection.write_field("Refresh: 0; url=/");
        if let Err(e) = connection.write_html("") {
            debug!(error = %e, "Failed to write logout response");
        }

        true
    }
}
