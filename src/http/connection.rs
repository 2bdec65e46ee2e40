use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};

use bytes::BytesMut;

/// Receive chunk size; a read shorter than this ends the request.
const READ_CHUNK: usize = 512;

/// One accepted client connection.
///
/// Owns the stream for exactly one request/response cycle; dropping the
/// connection closes the socket. Header fields buffered with
/// [`write_field`] are flushed and cleared by the next [`write_html`].
///
/// [`write_field`]: Connection::write_field
/// [`write_html`]: Connection::write_html
pub struct Connection {
    stream: TcpStream,
    fields: Vec<String>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            fields: Vec::new(),
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    /// Reads the full request into memory.
    ///
    /// Receives in bounded chunks until a short read signals the end of
    /// the request. There is no body framing beyond the short read.
    pub fn read_request(&mut self) -> std::io::Result<String> {
        let mut buffer = BytesMut::with_capacity(4096);
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = self.stream.read(&mut chunk)?;
            buffer.extend_from_slice(&chunk[..n]);
            if n < chunk.len() {
                break;
            }
        }
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Writes `text` followed by CRLF.
    pub fn write_line(&mut self, text: &str) -> std::io::Result<()> {
        self.stream.write_all(text.as_bytes())?;
        self.stream.write_all(b"\r\n")
    }

    /// Buffers one header line for the next response. No I/O happens here.
    pub fn write_field(&mut self, text: impl Into<String>) {
        self.fields.push(text.into());
    }

    /// Buffers a `Set-Cookie` field for the next response.
    pub fn write_cookie(&mut self, cookie: &str) {
        self.write_field(format!("Set-Cookie: {cookie}"));
    }

    /// Writes a complete HTML response: status line, server banner, content
    /// headers, any buffered fields in insertion order, a blank line, then
    /// the body. The buffered fields are cleared as a side effect.
    pub fn write_html(&mut self, body: &str) -> std::io::Result<()> {
        self.write_line("HTTP/1.1 200 OK")?;
        self.write_line("Server: ElastCI")?;
        self.write_line("Content-Type: text/html; charset=utf-8")?;
        self.write_line(&format!("Content-Length: {}", body.len()))?;

        let fields = std::mem::take(&mut self.fields);
        for field in &fields {
            self.write_line(field)?;
        }

        self.write_line("")?;
        self.write_line(body)
    }

    /// Resource-serving placeholder: echoes the requested name as HTML.
    /// Actual resource lookup belongs to the surrounding system.
    pub fn write_file(&mut self, name: &str) -> std::io::Result<()> {
        self.write_html(&format!("Requested: {name}"))
    }
}
