//! HTTP protocol surface.
//!
//! A deliberately small HTTP/1.1 subset: one GET request per connection,
//! no keep-alive, no chunked transfer, no TLS.
//!
//! - **`connection`**: owns the accepted stream and the response-writing
//!   surface (status line, buffered header fields, HTML body)
//! - **`parser`**: turns the raw request text into a [`request::Request`]
//! - **`request`**: parsed request representation and accessors

pub mod connection;
pub mod parser;
pub mod request;
