//! Request and response types for the file access protocol.
//!
//! A `Request` names one logical client invocation: its identifier stays
//! stable across retries so the server can filter duplicates. A `Response`
//! carries a status code, an optional payload, a human-readable message, and
//! the server-side mtime used by the client cache for reconciliation.

use std::fmt;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sentinel mtime for responses where no file timestamp applies.
pub const NO_MODIFIED_TIME: i64 = -1;

/// Operations supported by the server. Wire ordinals are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Shutdown,
    Read,
    WriteInsert,
    Monitor,
    WriteDelete,
    FileInfo,
}

impl Op {
    /// Wire ordinal of this operation.
    pub fn ordinal(self) -> u32 {
        match self {
            Op::Shutdown => 0,
            Op::Read => 1,
            Op::WriteInsert => 2,
            Op::Monitor => 3,
            Op::WriteDelete => 4,
            Op::FileInfo => 5,
        }
    }

    /// Decodes a wire ordinal, or `None` for an unrecognized value.
    pub fn from_ordinal(value: u32) -> Option<Self> {
        match value {
            0 => Some(Op::Shutdown),
            1 => Some(Op::Read),
            2 => Some(Op::WriteInsert),
            3 => Some(Op::Monitor),
            4 => Some(Op::WriteDelete),
            5 => Some(Op::FileInfo),
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Shutdown => "shutdown",
            Op::Read => "read",
            Op::WriteInsert => "write-insert",
            Op::Monitor => "monitor",
            Op::WriteDelete => "write-delete",
            Op::FileInfo => "file-info",
        };
        f.write_str(name)
    }
}

/// Response status codes. Wire values are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    GeneralError,
    InvalidOperation,
    Shutdown,
    ReadSuccess,
    ReadError,
    ReadIncomplete,
    WriteInsertSuccess,
    WriteInsertError,
    MonitorSuccess,
    MonitorError,
    WriteDeleteSuccess,
    WriteDeleteError,
    FileInfoSuccess,
    FileInfoError,
    /// Server-initiated monitor callback.
    Callback,
    /// Synthesized by the client when every retry round fails.
    NetworkError,
}

impl Status {
    /// Wire code of this status.
    pub fn code(self) -> u32 {
        match self {
            Status::Success => 0,
            Status::GeneralError => 1,
            Status::InvalidOperation => 2,
            Status::Shutdown => 3,
            Status::ReadSuccess => 100,
            Status::ReadError => 101,
            Status::ReadIncomplete => 102,
            Status::WriteInsertSuccess => 200,
            Status::WriteInsertError => 201,
            Status::MonitorSuccess => 300,
            Status::MonitorError => 301,
            Status::WriteDeleteSuccess => 400,
            Status::WriteDeleteError => 401,
            Status::FileInfoSuccess => 500,
            Status::FileInfoError => 501,
            Status::Callback => 600,
            Status::NetworkError => 700,
        }
    }

    /// Decodes a wire code, or `None` for an unrecognized value.
    pub fn from_code(value: u32) -> Option<Self> {
        match value {
            0 => Some(Status::Success),
            1 => Some(Status::GeneralError),
            2 => Some(Status::InvalidOperation),
            3 => Some(Status::Shutdown),
            100 => Some(Status::ReadSuccess),
            101 => Some(Status::ReadError),
            102 => Some(Status::ReadIncomplete),
            200 => Some(Status::WriteInsertSuccess),
            201 => Some(Status::WriteInsertError),
            300 => Some(Status::MonitorSuccess),
            301 => Some(Status::MonitorError),
            400 => Some(Status::WriteDeleteSuccess),
            401 => Some(Status::WriteDeleteError),
            500 => Some(Status::FileInfoSuccess),
            501 => Some(Status::FileInfoError),
            600 => Some(Status::Callback),
            700 => Some(Status::NetworkError),
            _ => None,
        }
    }

    /// True for the statuses a successful invocation can carry.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Status::Success
                | Status::ReadSuccess
                | Status::ReadIncomplete
                | Status::WriteInsertSuccess
                | Status::MonitorSuccess
                | Status::WriteDeleteSuccess
                | Status::FileInfoSuccess
        )
    }
}

/// One logical client invocation.
///
/// Only the fields an operation needs are meaningful; the rest stay zero or
/// empty on the wire. Use the per-operation constructors rather than building
/// requests by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Non-zero identifier, stable across retries of this invocation.
    pub request_id: u64,
    pub op: Op,
    pub path: String,
    /// Byte count for read and write-delete.
    pub length: u64,
    /// Byte offset for read and both writes.
    pub offset: u64,
    /// Bytes to insert for write-insert, otherwise empty.
    pub payload: Vec<u8>,
    /// Monitor duration in milliseconds for monitor requests.
    pub monitor_duration_ms: u64,
}

impl Request {
    pub fn read(path: impl Into<String>, offset: u64, length: u64) -> Self {
        Self {
            request_id: next_request_id(),
            op: Op::Read,
            path: path.into(),
            length,
            offset,
            payload: Vec::new(),
            monitor_duration_ms: 0,
        }
    }

    pub fn write_insert(path: impl Into<String>, offset: u64, payload: Vec<u8>) -> Self {
        Self {
            request_id: next_request_id(),
            op: Op::WriteInsert,
            path: path.into(),
            length: 0,
            offset,
            payload,
            monitor_duration_ms: 0,
        }
    }

    pub fn write_delete(path: impl Into<String>, offset: u64, length: u64) -> Self {
        Self {
            request_id: next_request_id(),
            op: Op::WriteDelete,
            path: path.into(),
            length,
            offset,
            payload: Vec::new(),
            monitor_duration_ms: 0,
        }
    }

    pub fn monitor(path: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            request_id: next_request_id(),
            op: Op::Monitor,
            path: path.into(),
            length: 0,
            offset: 0,
            payload: Vec::new(),
            monitor_duration_ms: duration_ms,
        }
    }

    pub fn file_info(path: impl Into<String>) -> Self {
        Self {
            request_id: next_request_id(),
            op: Op::FileInfo,
            path: path.into(),
            length: 0,
            offset: 0,
            payload: Vec::new(),
            monitor_duration_ms: 0,
        }
    }

    pub fn shutdown() -> Self {
        Self {
            request_id: next_request_id(),
            op: Op::Shutdown,
            path: String::new(),
            length: 0,
            offset: 0,
            payload: Vec::new(),
            monitor_duration_ms: 0,
        }
    }
}

/// A reply from the server, or a client-synthesized stand-in for one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub payload: Vec<u8>,
    pub message: String,
    /// Server-side mtime in milliseconds at reply time, or -1.
    pub modified_ms: i64,
}

impl Response {
    pub fn new(status: Status, payload: Vec<u8>, message: impl Into<String>, modified_ms: i64) -> Self {
        Self {
            status,
            payload,
            message: message.into(),
            modified_ms,
        }
    }

    /// A payload-free response with no applicable mtime.
    pub fn status_only(status: Status, message: impl Into<String>) -> Self {
        Self::new(status, Vec::new(), message, NO_MODIFIED_TIME)
    }

    /// The client-side stand-in when every retry round failed.
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::status_only(Status::NetworkError, message)
    }
}

/// Generates a request identifier: epoch nanoseconds XOR a per-process random
/// salt. Collisions are tolerated as rare anomalies, not a correctness
/// assumption. Never returns zero.
pub fn next_request_id() -> u64 {
    static SALT: OnceLock<u64> = OnceLock::new();
    let salt = *SALT.get_or_init(rand::random::<u64>);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    match nanos ^ salt {
        0 => 1,
        id => id,
    }
}
