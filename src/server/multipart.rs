//! `multipart/x-mixed-replace` framing
//!
//! Each part carries one JPEG:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: <n>\r\n
//! \r\n
//! <n bytes of JPEG>\r\n
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::broadcast::Frame;

/// Part boundary
pub const BOUNDARY: &str = "frame";

/// Response `Content-Type` for the stream
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Closing delimiter written when the stream ends because the camera stopped
pub const TERMINATOR: &[u8] = b"--frame--\r\n";

/// Encode one frame as a multipart part
pub fn encode_part(frame: &Frame) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        frame.len()
    );

    let mut part = BytesMut::with_capacity(header.len() + frame.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(&frame.payload);
    part.put_slice(b"\r\n");
    part.freeze()
}
