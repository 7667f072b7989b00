//! Length-prefixed datagram codec for requests and responses.
//!
//! All integers are big-endian. Variable-length fields (path, payload,
//! message) carry a u32 length prefix. The codec does no I/O: marshalling is
//! infallible, unmarshalling fails with [`ServiceError::Malformed`] when a
//! prefix runs past the end of the datagram or an ordinal is unrecognized.
//!
//! Request layout: `request_id:u64, op:u32, length:u64, offset:u64,
//! monitor_duration_ms:u64, path_len:u32, path, payload_len:u32, payload`.
//!
//! Response layout: `status:u32, payload_len:u32, payload, message_len:u32,
//! message, modified_ms:i64`. The mtime slot is signed so the -1 sentinel
//! survives the round trip.

use crate::error::ServiceError;
use crate::protocol::{Op, Request, Response, Status};
use bytes::{Buf, BufMut, BytesMut};

/// Marshals a request into a datagram.
pub fn marshal_request(request: &Request) -> Vec<u8> {
    let mut buf =
        BytesMut::with_capacity(44 + request.path.len() + request.payload.len());

    buf.put_u64(request.request_id);
    buf.put_u32(request.op.ordinal());
    buf.put_u64(request.length);
    buf.put_u64(request.offset);
    buf.put_u64(request.monitor_duration_ms);

    buf.put_u32(request.path.len() as u32);
    buf.put_slice(request.path.as_bytes());

    buf.put_u32(request.payload.len() as u32);
    buf.put_slice(&request.payload);

    buf.to_vec()
}

/// Unmarshals a request datagram.
pub fn unmarshal_request(data: &[u8]) -> Result<Request, ServiceError> {
    let mut buf = data;

    let request_id = take_u64(&mut buf, "request id")?;
    let op_ordinal = take_u32(&mut buf, "op")?;
    let op = Op::from_ordinal(op_ordinal)
        .ok_or_else(|| ServiceError::Malformed(format!("unknown op ordinal {op_ordinal}")))?;
    let length = take_u64(&mut buf, "length")?;
    let offset = take_u64(&mut buf, "offset")?;
    let monitor_duration_ms = take_u64(&mut buf, "monitor duration")?;

    let path_bytes = take_prefixed(&mut buf, "path")?;
    let path = String::from_utf8(path_bytes)
        .map_err(|_| ServiceError::Malformed("path is not valid UTF-8".to_string()))?;

    let payload = take_prefixed(&mut buf, "payload")?;

    Ok(Request {
        request_id,
        op,
        path,
        length,
        offset,
        payload,
        monitor_duration_ms,
    })
}

/// Marshals a response into a datagram.
pub fn marshal_response(response: &Response) -> Vec<u8> {
    let mut buf =
        BytesMut::with_capacity(24 + response.payload.len() + response.message.len());

    buf.put_u32(response.status.code());

    buf.put_u32(response.payload.len() as u32);
    buf.put_slice(&response.payload);

    buf.put_u32(response.message.len() as u32);
    buf.put_slice(response.message.as_bytes());

    buf.put_i64(response.modified_ms);

    buf.to_vec()
}

/// Unmarshals a response datagram.
pub fn unmarshal_response(data: &[u8]) -> Result<Response, ServiceError> {
    let mut buf = data;

    let code = take_u32(&mut buf, "status")?;
    let status = Status::from_code(code)
        .ok_or_else(|| ServiceError::Malformed(format!("unknown status code {code}")))?;

    let payload = take_prefixed(&mut buf, "payload")?;

    let message_bytes = take_prefixed(&mut buf, "message")?;
    let message = String::from_utf8(message_bytes)
        .map_err(|_| ServiceError::Malformed("message is not valid UTF-8".to_string()))?;

    let modified_ms = take_i64(&mut buf, "modified time")?;

    Ok(Response {
        status,
        payload,
        message,
        modified_ms,
    })
}

fn take_u32(buf: &mut &[u8], field: &str) -> Result<u32, ServiceError> {
    if buf.remaining() < 4 {
        return Err(truncated(field));
    }
    Ok(buf.get_u32())
}

fn take_u64(buf: &mut &[u8], field: &str) -> Result<u64, ServiceError> {
    if buf.remaining() < 8 {
        return Err(truncated(field));
    }
    Ok(buf.get_u64())
}

fn take_i64(buf: &mut &[u8], field: &str) -> Result<i64, ServiceError> {
    if buf.remaining() < 8 {
        return Err(truncated(field));
    }
    Ok(buf.get_i64())
}

fn take_prefixed(buf: &mut &[u8], field: &str) -> Result<Vec<u8>, ServiceError> {
    let len = take_u32(buf, field)? as usize;
    if buf.remaining() < len {
        return Err(ServiceError::Malformed(format!(
            "{field} length {len} exceeds remaining {} bytes",
            buf.remaining()
        )));
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    Ok(bytes)
}

fn truncated(field: &str) -> ServiceError {
    ServiceError::Malformed(format!("datagram truncated in {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::NO_MODIFIED_TIME;

    #[test]
    fn test_request_round_trip() {
        let requests = vec![
            Request::read("/data/report.txt", 128, 512),
            Request::write_insert("/data/report.txt", 0, b"prefix".to_vec()),
            Request::write_delete("/data/report.txt", 7, 3),
            Request::monitor("/data/report.txt", 30_000),
            Request::file_info("/data/report.txt"),
            Request::shutdown(),
        ];

        for request in requests {
            let wire = marshal_request(&request);
            let decoded = unmarshal_request(&wire).unwrap();
            assert_eq!(decoded, request);
        }
    }

    #[test]
    fn test_response_round_trip() {
        let responses = vec![
            Response::new(
                Status::ReadSuccess,
                b"file content".to_vec(),
                "read successful",
                1_700_000_000_123,
            ),
            Response::new(Status::ReadIncomplete, b"tail".to_vec(), "hit EOF", 99),
            Response::status_only(Status::WriteDeleteError, "cannot delete past EOF"),
            Response::new(Status::Callback, b"updated".to_vec(), "file update", 5),
            Response::network_error("no reply after 3 attempts"),
            Response::new(Status::Success, Vec::new(), "", 0),
        ];

        for response in responses {
            let wire = marshal_response(&response);
            let decoded = unmarshal_response(&wire).unwrap();
            assert_eq!(decoded, response);
        }
    }

    #[test]
    fn test_negative_mtime_survives() {
        let response = Response::status_only(Status::ReadError, "missing");
        let decoded = unmarshal_response(&marshal_response(&response)).unwrap();
        assert_eq!(decoded.modified_ms, NO_MODIFIED_TIME);
    }

    #[test]
    fn test_empty_path_and_payload() {
        let request = Request::shutdown();
        assert!(request.path.is_empty());
        let decoded = unmarshal_request(&marshal_request(&request)).unwrap();
        assert!(decoded.path.is_empty());
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_truncated_request_rejected() {
        let wire = marshal_request(&Request::read("/a", 0, 10));
        // Every strict prefix must fail rather than panic or misparse.
        for cut in 0..wire.len() {
            assert!(
                unmarshal_request(&wire[..cut]).is_err(),
                "prefix of {cut} bytes decoded unexpectedly"
            );
        }
    }

    #[test]
    fn test_truncated_response_rejected() {
        let wire = marshal_response(&Response::new(
            Status::ReadSuccess,
            b"abc".to_vec(),
            "ok",
            42,
        ));
        for cut in 0..wire.len() {
            assert!(
                unmarshal_response(&wire[..cut]).is_err(),
                "prefix of {cut} bytes decoded unexpectedly"
            );
        }
    }

    #[test]
    fn test_unknown_op_rejected() {
        let mut wire = marshal_request(&Request::read("/a", 0, 1));
        // The op ordinal sits after the 8-byte request id.
        wire[8..12].copy_from_slice(&99u32.to_be_bytes());
        match unmarshal_request(&wire) {
            Err(ServiceError::Malformed(msg)) => assert!(msg.contains("op")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        let mut wire = marshal_response(&Response::status_only(Status::Success, "ok"));
        wire[0..4].copy_from_slice(&777u32.to_be_bytes());
        match unmarshal_response(&wire) {
            Err(ServiceError::Malformed(msg)) => assert!(msg.contains("status")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_length_prefix_overrun_rejected() {
        let mut wire = marshal_request(&Request::read("/abc", 0, 1));
        // Inflate the path length prefix past the end of the datagram.
        let path_len_at = 8 + 4 + 8 + 8 + 8;
        wire[path_len_at..path_len_at + 4].copy_from_slice(&10_000u32.to_be_bytes());
        assert!(unmarshal_request(&wire).is_err());
    }

    #[test]
    fn test_invalid_utf8_path_rejected() {
        let mut request = Request::read("/abc", 0, 1);
        request.path = String::from("/abc");
        let mut wire = marshal_request(&request);
        // Corrupt a path byte into an invalid UTF-8 sequence.
        let path_start = 8 + 4 + 8 + 8 + 8 + 4;
        wire[path_start] = 0xFF;
        assert!(unmarshal_request(&wire).is_err());
    }

    #[test]
    fn test_request_id_travels_first() {
        let request = Request::read("/a", 0, 1);
        let wire = marshal_request(&request);
        let id = u64::from_be_bytes(wire[..8].try_into().unwrap());
        assert_eq!(id, request.request_id);
    }
}
