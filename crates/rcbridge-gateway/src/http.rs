//! Just enough HTTP/1.1 for the bridge's three routes.
//!
//! One request per connection: the request line, headers up to a blank line,
//! then exactly `Content-Length` bytes of body.  Every response closes the
//! connection.

use rcbridge_types::BridgeError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Upper bound on the request line plus headers.
pub const MAX_HEAD_BYTES: usize = 8 * 1024;
/// Upper bound on a request body.  Commands are a few dozen bytes.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    /// Header names are lower-cased.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Read one request.
///
/// # Errors
///
/// [`BridgeError::Io`] when the connection fails or closes early, and
/// [`BridgeError::MalformedRequest`] for anything that is not a parseable
/// request within the size limits.
pub async fn read_request<R>(reader: &mut R) -> Result<HttpRequest, BridgeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut budget = MAX_HEAD_BYTES;

    let request_line = read_line(reader, &mut budget).await?;
    let mut parts = request_line.split_whitespace();
    let (method, path) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(p), Some(v)) if v.starts_with("HTTP/") => (m.to_string(), p.to_string()),
        _ => {
            return Err(BridgeError::MalformedRequest(format!(
                "bad request line: {request_line:?}"
            )));
        }
    };

    let mut headers = Vec::new();
    loop {
        let line = read_line(reader, &mut budget).await?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| BridgeError::MalformedRequest(format!("bad header: {line:?}")))?;
        headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
    }

    let mut request = HttpRequest {
        method,
        path,
        headers,
        body: Vec::new(),
    };

    let length = match request.header("content-length") {
        None => 0,
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            BridgeError::MalformedRequest(format!("bad Content-Length: {raw:?}"))
        })?,
    };
    if length > MAX_BODY_BYTES {
        return Err(BridgeError::MalformedRequest(format!(
            "body of {length} bytes exceeds {MAX_BODY_BYTES}"
        )));
    }
    if length > 0 {
        request.body = vec![0; length];
        reader.read_exact(&mut request.body).await?;
    }
    Ok(request)
}

/// Read one CRLF- or LF-terminated line, charging it against `budget`.
async fn read_line<R>(reader: &mut R, budget: &mut usize) -> Result<String, BridgeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = (&mut *reader)
        .take(*budget as u64)
        .read_until(b'\n', &mut line)
        .await?;
    if n == 0 {
        return Err(BridgeError::Io("connection closed before end of headers".to_string()));
    }
    if line.last() != Some(&b'\n') {
        return Err(BridgeError::MalformedRequest(
            "request head too large or truncated".to_string(),
        ));
    }
    *budget -= n;

    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    String::from_utf8(line)
        .map_err(|_| BridgeError::MalformedRequest("request head is not UTF-8".to_string()))
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotImplemented,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotImplemented => 501,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotImplemented => "Not Implemented",
        }
    }
}

/// Shape of the response body, which decides the content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Telemetry JSON served as `text/plain`.
    Telemetry,
    /// Camera frame bytes served as `image/jpeg`.
    Jpeg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: Status,
    pub kind: BodyKind,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn telemetry(status: Status, body: Vec<u8>) -> Self {
        Self {
            status,
            kind: BodyKind::Telemetry,
            body,
        }
    }

    pub fn jpeg(body: Vec<u8>) -> Self {
        Self {
            status: Status::Ok,
            kind: BodyKind::Jpeg,
            body,
        }
    }

    /// Serialise status line, headers, and body.
    pub fn to_bytes(&self, cors_origin: &str) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status.code(),
            self.status.reason()
        );
        head.push_str(match self.kind {
            BodyKind::Telemetry => "Content-Type: text/plain; charset=utf-8\r\n",
            BodyKind::Jpeg => "Content-Type: image/jpeg\r\n",
        });
        // The web client fetches frames with credentialed XHR too.
        head.push_str(&format!("Access-Control-Allow-Origin: {cors_origin}\r\n"));
        head.push_str("Access-Control-Allow-Methods: GET,POST,OPTIONS\r\n");
        head.push_str("Access-Control-Allow-Credentials: true\r\n");
        head.push_str("Access-Control-Allow-Headers: Content-Type,Accept\r\n");
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Connection: close\r\n\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}
