//! Line protocol used by `/insert_points`.
//!
//! One point per line:
//!
//! ```text
//! <metric>,<k1>=<v1> <k2>=<v2>,<value> <timestamp>
//! ```
//!
//! Nothing is escaped. Metric names, tag keys and tag values containing `,`,
//! `=` or a space produce lines the server cannot split back apart. A newline
//! in any of them, or in a text value, splits the point across two lines.

pub mod reader;

pub use reader::{PointChunks, PointReader};

use crate::model::InsertPointRequest;
use std::io::Write;

pub const CONTENT_TYPE: &str = "application/x.simpletsdb.points";

/// Appends the encoded line for `request` to `buf`, without a terminator.
pub fn write_line(request: &InsertPointRequest, buf: &mut Vec<u8>) {
    buf.extend_from_slice(request.metric.as_bytes());
    buf.push(b',');
    for (i, (key, value)) in request.tags.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        buf.extend_from_slice(key.as_bytes());
        buf.push(b'=');
        buf.extend_from_slice(value.as_bytes());
    }
    buf.push(b',');
    // Writing into a Vec cannot fail.
    let _ = write!(buf, "{} {}", request.point.value, request.point.timestamp);
}

pub fn encode_line(request: &InsertPointRequest) -> String {
    let mut buf = Vec::with_capacity(encoded_len_hint(request));
    write_line(request, &mut buf);
    // Only UTF-8 strings and formatted numbers went in.
    String::from_utf8(buf).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Exact byte length of the encoded line, without the terminator.
pub fn encoded_len(request: &InsertPointRequest) -> usize {
    let mut buf = Vec::with_capacity(encoded_len_hint(request));
    write_line(request, &mut buf);
    buf.len()
}

/// Encodes every request as a newline-terminated line, in order.
pub fn encode_lines(requests: &[InsertPointRequest]) -> String {
    let mut out = String::new();
    for request in requests {
        out.push_str(&encode_line(request));
        out.push('\n');
    }
    out
}

fn encoded_len_hint(request: &InsertPointRequest) -> usize {
    let tags: usize = request.tags.iter().map(|(k, v)| k.len() + v.len() + 2).sum();
    request.metric.len() + tags + 48
}
