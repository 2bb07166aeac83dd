use std::fmt;

use crate::http::headers::Headers;

/// `<METHOD> <target> HTTP/<version>` as received.
///
/// `target` is kept verbatim (no percent-decoding) and `http_version` holds
/// only the part after `HTTP/`, which is always `1.1` once parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub http_version: String,
}

/// A fully parsed request.
///
/// Built by [`RequestParser`](crate::http::parser::RequestParser) and handed
/// out only once parsing reached its done state, so handlers never observe a
/// partially filled value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub request_line: RequestLine,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(&self) -> &str {
        &self.request_line.method
    }

    pub fn target(&self) -> &str {
        &self.request_line.target
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Request line:")?;
        writeln!(f, "- Method: {}", self.request_line.method)?;
        writeln!(f, "- Target: {}", self.request_line.target)?;
        writeln!(f, "- Version: {}", self.request_line.http_version)?;
        writeln!(f, "Headers:")?;
        for (name, value) in self.headers.iter() {
            writeln!(f, "- {}: {}", name, value)?;
        }
        writeln!(f, "Body:")?;
        write!(f, "{}", String::from_utf8_lossy(&self.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_dump_format() {
        let mut req = Request::new();
        req.request_line = RequestLine {
            method: "POST".to_string(),
            target: "/coffee".to_string(),
            http_version: "1.1".to_string(),
        };
        req.headers.set("Host", "localhost:42069");
        req.body = b"hello".to_vec();

        assert_eq!(
            req.to_string(),
            "Request line:\n- Method: POST\n- Target: /coffee\n- Version: 1.1\n\
             Headers:\n- host: localhost:42069\nBody:\nhello"
        );
    }
}
