//! Snapshot file format
//!
//! A snapshot is pretty-printed JSON holding the status, headers and body of
//! a captured response. Bodies that are valid UTF-8 are stored as text so the
//! files stay readable; anything else is hex-encoded.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::network::Response;
use crate::{GolderError, Result};

/// A persisted response together with the time it was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Captured response
    pub response: Response,
    /// File modification time
    pub written_at: SystemTime,
}

impl Snapshot {
    /// Captured status code
    #[must_use]
    pub fn status(&self) -> u16 {
        self.response.status
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    status: u16,
    headers: BTreeMap<String, String>,
    body: StoredBody,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoredBody {
    Text(String),
    Hex(String),
}

impl From<&Bytes> for StoredBody {
    fn from(body: &Bytes) -> Self {
        match std::str::from_utf8(body) {
            Ok(text) => Self::Text(text.to_string()),
            Err(_) => Self::Hex(hex::encode(body)),
        }
    }
}

/// Serialize a response for storage
///
/// # Errors
///
/// Returns error if the response cannot be serialized
pub fn encode(path: &Path, response: &Response) -> Result<Vec<u8>> {
    let file = SnapshotFile {
        status: response.status,
        headers: response.headers.clone(),
        body: StoredBody::from(&response.body),
    };

    let mut data = serde_json::to_vec_pretty(&file).map_err(|e| invalid(path, &e))?;
    data.push(b'\n');
    Ok(data)
}

/// Deserialize a response read from `path`
///
/// # Errors
///
/// Returns `GolderError::InvalidSnapshot` if the data is not a snapshot
pub fn decode(path: &Path, data: &[u8]) -> Result<Response> {
    let file: SnapshotFile = serde_json::from_slice(data).map_err(|e| invalid(path, &e))?;

    let body = match file.body {
        StoredBody::Text(text) => Bytes::from(text),
        StoredBody::Hex(encoded) => {
            Bytes::from(hex::decode(encoded).map_err(|e| invalid(path, &e))?)
        }
    };

    Ok(Response {
        status: file.status,
        headers: file.headers,
        body,
    })
}

fn invalid(path: &Path, err: &dyn std::fmt::Display) -> GolderError {
    GolderError::InvalidSnapshot {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &'static [u8]) -> Response {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());
        Response {
            status: 200,
            headers,
            body: Bytes::from_static(body),
        }
    }

    #[test]
    fn test_text_body_stays_readable() {
        let path = Path::new("homepage.json");
        let data = encode(path, &response(b"User-agent: *")).unwrap();
        let text = String::from_utf8(data.clone()).unwrap();

        assert!(text.contains("\"status\": 200"));
        assert!(text.contains("\"text\": \"User-agent: *\""));
        assert_eq!(decode(path, &data).unwrap(), response(b"User-agent: *"));
    }

    #[test]
    fn test_binary_body_is_lossless() {
        let path = Path::new("favicon.json");
        let original = response(&[0x89, 0x50, 0x4e, 0x47, 0xff, 0x00]);
        let data = encode(path, &original).unwrap();

        assert!(String::from_utf8(data.clone()).unwrap().contains("\"hex\""));
        assert_eq!(decode(path, &data).unwrap(), original);
    }

    #[test]
    fn test_decode_garbage() {
        let path = Path::new("broken.json");
        let err = decode(path, b"<html>not json</html>").unwrap_err();

        match err {
            GolderError::InvalidSnapshot { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_bad_hex() {
        let data = br#"{"status": 200, "headers": {}, "body": {"hex": "zz"}}"#;
        assert!(decode(Path::new("bad.json"), data).is_err());
    }
}
