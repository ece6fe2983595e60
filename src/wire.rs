// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Wire codec for the resource manager protocol.
//
// All integers are fixed-width little-endian with no padding. Four
// messages exist:
//
//   client → server   request      { action=0 } { resource_index: u32, data.. }
//   client → server   release      { action=1 } { resource_id: u32 }
//   server → client   connect ack  { status: i32 }
//   server → client   request ack  { action: u32, status: i32,
//                                    resource_id: u32, base_address: u32, data.. }
//
// `data` in the request ack echoes the request's trailing bytes
// verbatim on success and is always empty on failure.

use crate::error::{Error, Result};

/// Action value of a resource request.
pub const ACTION_REQUEST: u32 = 0;
/// Action value of a resource release.
pub const ACTION_RELEASE: u32 = 1;

/// Size of the leading `{ action: u32 }` header.
pub const MSG_HEADER_LEN: usize = 4;
/// Size of the request body before its variable payload.
pub const REQUEST_HEADER_LEN: usize = 4;
/// Size of the release body.
pub const RELEASE_LEN: usize = 4;
/// Fixed part of a request ack (action + status + resource_id + base_address).
pub const REQUEST_ACK_HEADER_LEN: usize = 16;
/// Size of a connect ack.
pub const CONNECT_ACK_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Decoded inbound messages
// ---------------------------------------------------------------------------

/// An inbound message after header validation.
///
/// `Unknown` carries the unrecognized action value so the session can
/// still answer with a negative ack instead of going silent.
#[derive(Debug, PartialEq, Eq)]
pub enum Message<'a> {
    Request { resource_index: u32, data: &'a [u8] },
    Release { resource_id: u32 },
    Unknown { action: u32 },
}

/// Parse an inbound message.
///
/// Fails with [`Error::Malformed`] whenever the buffer is shorter than
/// the headers its action claims.
pub fn decode(buf: &[u8]) -> Result<Message<'_>> {
    if buf.len() < MSG_HEADER_LEN {
        return Err(Error::Malformed);
    }
    let action = read_u32(buf, 0);
    let body = &buf[MSG_HEADER_LEN..];

    match action {
        ACTION_REQUEST => {
            if body.len() < REQUEST_HEADER_LEN {
                return Err(Error::Malformed);
            }
            Ok(Message::Request {
                resource_index: read_u32(body, 0),
                data: &body[REQUEST_HEADER_LEN..],
            })
        }
        ACTION_RELEASE => {
            if body.len() < RELEASE_LEN {
                return Err(Error::Malformed);
            }
            Ok(Message::Release {
                resource_id: read_u32(body, 0),
            })
        }
        other => Ok(Message::Unknown { action: other }),
    }
}

// ---------------------------------------------------------------------------
// Outbound encoders
// ---------------------------------------------------------------------------

/// Build the one-shot connect ack sent when a session binds (or fails
/// to bind) to a manager.
pub fn encode_connect_ack(status: i32) -> Vec<u8> {
    status.to_le_bytes().to_vec()
}

/// Build a request ack.
///
/// `data` must already be empty when `status` is nonzero; this encoder
/// enforces it by dropping the payload on any failure status, so a
/// failed operation can never leak request bytes back to the client.
pub fn encode_request_ack(status: i32, resource_id: u32, base_address: u32, data: &[u8]) -> Vec<u8> {
    let payload = if status == 0 { data } else { &[] };
    let mut buf = Vec::with_capacity(REQUEST_ACK_HEADER_LEN + payload.len());
    buf.extend_from_slice(&ACTION_REQUEST.to_le_bytes());
    buf.extend_from_slice(&status.to_le_bytes());
    buf.extend_from_slice(&resource_id.to_le_bytes());
    buf.extend_from_slice(&base_address.to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Build a request message (client side; used by the demo and tests).
pub fn encode_request(resource_index: u32, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MSG_HEADER_LEN + REQUEST_HEADER_LEN + data.len());
    buf.extend_from_slice(&ACTION_REQUEST.to_le_bytes());
    buf.extend_from_slice(&resource_index.to_le_bytes());
    buf.extend_from_slice(data);
    buf
}

/// Build a release message (client side; used by the demo and tests).
pub fn encode_release(resource_id: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MSG_HEADER_LEN + RELEASE_LEN);
    buf.extend_from_slice(&ACTION_RELEASE.to_le_bytes());
    buf.extend_from_slice(&resource_id.to_le_bytes());
    buf
}

// ---------------------------------------------------------------------------
// Ack views (client side / assertions)
// ---------------------------------------------------------------------------

/// Decoded view of a request ack.
#[derive(Debug, PartialEq, Eq)]
pub struct RequestAck<'a> {
    pub status: i32,
    pub resource_id: u32,
    pub base_address: u32,
    pub data: &'a [u8],
}

/// Parse a request ack. Used by clients of the protocol and by tests.
pub fn decode_request_ack(buf: &[u8]) -> Result<RequestAck<'_>> {
    if buf.len() < REQUEST_ACK_HEADER_LEN {
        return Err(Error::Malformed);
    }
    if read_u32(buf, 0) != ACTION_REQUEST {
        return Err(Error::Malformed);
    }
    Ok(RequestAck {
        status: read_i32(buf, 4),
        resource_id: read_u32(buf, 8),
        base_address: read_u32(buf, 12),
        data: &buf[REQUEST_ACK_HEADER_LEN..],
    })
}

/// Parse a connect ack status.
pub fn decode_connect_ack(buf: &[u8]) -> Result<i32> {
    if buf.len() < CONNECT_ACK_LEN {
        return Err(Error::Malformed);
    }
    Ok(read_i32(buf, 0))
}

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

pub(crate) fn read_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}
