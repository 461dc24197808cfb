//! Request/response schema carried inside the secure channel.
//!
//! The channel itself treats these as opaque bytes; this module only fixes a
//! deterministic, self-delimiting encoding (CBOR) so both ends agree.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Command carried by a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    /// Liveness check.
    Ping,
    /// Create an empty file.
    CreateFile,
    /// Read a whole file.
    ReadFile,
    /// Replace a file's contents.
    WriteFile,
    /// Append to a file.
    AppendFile,
    /// Delete a file.
    DeleteFile,
    /// File metadata.
    InfoFile,
    /// Create a directory.
    CreateDir,
    /// List a directory.
    ListDir,
    /// Change the working directory.
    ChangeDir,
    /// Delete a directory.
    DeleteDir,
    /// Last request of the session; both sides close after the reply.
    Terminate,
}

/// Kind of payload carried by a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseType {
    /// Reply to [`RequestType::Ping`].
    Pong,
    /// Operation completed without data.
    Success,
    /// File contents.
    FileContent,
    /// File metadata.
    FileInfo,
    /// Directory entries.
    DirListing,
    /// Operation failed; `data` holds the message.
    Error,
    /// Reply to [`RequestType::Terminate`].
    Terminated,
}

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Command to run.
    pub command: RequestType,
    /// Target path, empty when the command takes none.
    pub filename: String,
    /// Command-specific data.
    pub data: Vec<u8>,
}

impl Request {
    /// Create a request with no filename or data.
    pub fn new(command: RequestType) -> Self {
        Self {
            command,
            filename: String::new(),
            data: Vec::new(),
        }
    }

    /// Set the target path.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Set the data payload.
    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// A ping carrying `data`.
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(RequestType::Ping).with_data(data)
    }

    /// The end-of-session request.
    pub fn terminate() -> Self {
        Self::new(RequestType::Terminate)
    }

    /// Whether this request ends the session.
    pub fn is_terminate(&self) -> bool {
        self.command == RequestType::Terminate
    }
}

/// A server response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Whether the command succeeded.
    pub success: bool,
    /// Payload kind.
    pub response_type: ResponseType,
    /// Payload.
    pub data: Vec<u8>,
}

impl Response {
    /// Create a response.
    pub fn new(success: bool, response_type: ResponseType, data: impl Into<Vec<u8>>) -> Self {
        Self {
            success,
            response_type,
            data: data.into(),
        }
    }

    /// A successful pong.
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, ResponseType::Pong, data)
    }

    /// A failure carrying a human-readable message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(false, ResponseType::Error, message.into().into_bytes())
    }

    /// Acknowledgement of a terminate request.
    pub fn terminated() -> Self {
        Self::new(true, ResponseType::Terminated, Vec::new())
    }
}

/// Schema encoding errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The bytes are not a valid message.
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Encode a request as CBOR.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, CodecError> {
    encode(request)
}

/// Decode a CBOR request.
pub fn decode_request(bytes: &[u8]) -> Result<Request, CodecError> {
    decode(bytes)
}

/// Encode a response as CBOR.
pub fn encode_response(response: &Response) -> Result<Vec<u8>, CodecError> {
    encode(response)
}

/// Decode a CBOR response.
pub fn decode_response(bytes: &[u8]) -> Result<Response, CodecError> {
    decode(bytes)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(out)
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, CodecError> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}
