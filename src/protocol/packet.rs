use zerocopy::byteorder::little_endian::{U32 as U32LE, U64 as U64LE};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::primitive::{
    read_bytes, read_optional_bytes, read_string, read_u128, read_u32, read_u8, write_bytes,
    write_optional_bytes, write_string, write_u128, write_u32, write_u8,
};
use crate::error::{Error, Result};

/// Upper bound on a single packet's encoded size, enforced on both sides of
/// the wire.
pub const MAX_PACKET_LEN: usize = 16 * 1024 * 1024;

/// Fixed-layout wire header (zero-copy).
///
/// `checksum` and `declared_length` are placeholders: the outer 4-byte
/// length prefix the transport reads off the socket is the authority on how
/// many bytes to read, so neither field is validated on decode.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct PacketHeader {
    pub checksum: U32LE,
    pub declared_length: U32LE,
    pub packet_id: U32LE,
    pub session_id: U32LE,
    pub correlation_id: U64LE,
    pub timestamp: U64LE,
}

impl PacketHeader {
    pub const ENCODED_LEN: usize = 32;

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_bytes(data)
            .map_err(|_| Error::InvalidResponse("truncated packet header".into()))
    }
}

/// Status carried by a `Reply` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    fn to_byte(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::Error => 1,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Status::Ok),
            1 => Ok(Status::Error),
            other => Err(Error::InvalidResponse(format!("unknown status byte {other}"))),
        }
    }
}

/// Request/response payload carried after the fixed header. Tag byte, then a
/// variant-specific body built with the hand-written primitives in
/// `protocol::primitive` — unlike the header, the body has no fixed C layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Insert { namespace: String, payload: Vec<u8> },
    Read { namespace: String, id: u128 },
    Update { namespace: String, payload: Vec<u8> },
    Delete { namespace: String, payload: Vec<u8> },
    Query { namespace: String, payload: Vec<u8> },
    Aggregate { namespace: String, payload: Vec<u8> },
    Scan { namespace: String, start_key: Option<u128>, count: u32 },
    Create { doc_type: String, name: String },
    Drop { doc_type: String, name: String },
    List { doc_type: String, namespace: Option<String> },
    Flush,
    Authenticate { username: String, password: String },
    AuthenticateApiKey { api_key: String },
    Logout,
    Reply { status: Status, payload: Option<Vec<u8>> },
}

impl Operation {
    fn tag(&self) -> u8 {
        match self {
            Operation::Insert { .. } => 1,
            Operation::Read { .. } => 2,
            Operation::Update { .. } => 3,
            Operation::Delete { .. } => 4,
            Operation::Query { .. } => 5,
            Operation::Aggregate { .. } => 6,
            Operation::Scan { .. } => 7,
            Operation::Create { .. } => 8,
            Operation::Drop { .. } => 9,
            Operation::List { .. } => 10,
            Operation::Flush => 11,
            Operation::Authenticate { .. } => 12,
            Operation::AuthenticateApiKey { .. } => 13,
            Operation::Logout => 14,
            Operation::Reply { .. } => 15,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        write_u8(out, self.tag());
        match self {
            Operation::Insert { namespace, payload }
            | Operation::Update { namespace, payload }
            | Operation::Delete { namespace, payload }
            | Operation::Query { namespace, payload }
            | Operation::Aggregate { namespace, payload } => {
                write_string(out, namespace);
                write_bytes(out, payload);
            }
            Operation::Read { namespace, id } => {
                write_string(out, namespace);
                write_u128(out, *id);
            }
            Operation::Scan { namespace, start_key, count } => {
                write_string(out, namespace);
                match start_key {
                    Some(key) => {
                        write_u8(out, 1);
                        write_u128(out, *key);
                    }
                    None => write_u8(out, 0),
                }
                write_u32(out, *count);
            }
            Operation::Create { doc_type, name } | Operation::Drop { doc_type, name } => {
                write_string(out, doc_type);
                write_string(out, name);
            }
            Operation::List { doc_type, namespace } => {
                write_string(out, doc_type);
                match namespace {
                    Some(ns) => {
                        write_u8(out, 1);
                        write_string(out, ns);
                    }
                    None => write_u8(out, 0),
                }
            }
            Operation::Flush | Operation::Logout => {}
            Operation::Authenticate { username, password } => {
                write_string(out, username);
                write_string(out, password);
            }
            Operation::AuthenticateApiKey { api_key } => {
                write_string(out, api_key);
            }
            Operation::Reply { status, payload } => {
                write_u8(out, status.to_byte());
                write_optional_bytes(out, payload.as_deref());
            }
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let (tag, rest) = read_u8(data)?;
        let op = match tag {
            1 => {
                let (namespace, rest) = read_string(rest)?;
                let (payload, _) = read_bytes(rest)?;
                Operation::Insert { namespace, payload: payload.to_vec() }
            }
            2 => {
                let (namespace, rest) = read_string(rest)?;
                let (id, _) = read_u128(rest)?;
                Operation::Read { namespace, id }
            }
            3 => {
                let (namespace, rest) = read_string(rest)?;
                let (payload, _) = read_bytes(rest)?;
                Operation::Update { namespace, payload: payload.to_vec() }
            }
            4 => {
                let (namespace, rest) = read_string(rest)?;
                let (payload, _) = read_bytes(rest)?;
                Operation::Delete { namespace, payload: payload.to_vec() }
            }
            5 => {
                let (namespace, rest) = read_string(rest)?;
                let (payload, _) = read_bytes(rest)?;
                Operation::Query { namespace, payload: payload.to_vec() }
            }
            6 => {
                let (namespace, rest) = read_string(rest)?;
                let (payload, _) = read_bytes(rest)?;
                Operation::Aggregate { namespace, payload: payload.to_vec() }
            }
            7 => {
                let (namespace, rest) = read_string(rest)?;
                let (present, rest) = read_u8(rest)?;
                let (start_key, rest) = if present == 1 {
                    let (key, rest) = read_u128(rest)?;
                    (Some(key), rest)
                } else {
                    (None, rest)
                };
                let (count, _) = read_u32(rest)?;
                Operation::Scan { namespace, start_key, count }
            }
            8 => {
                let (doc_type, rest) = read_string(rest)?;
                let (name, _) = read_string(rest)?;
                Operation::Create { doc_type, name }
            }
            9 => {
                let (doc_type, rest) = read_string(rest)?;
                let (name, _) = read_string(rest)?;
                Operation::Drop { doc_type, name }
            }
            10 => {
                let (doc_type, rest) = read_string(rest)?;
                let (present, rest) = read_u8(rest)?;
                let namespace = if present == 1 {
                    Some(read_string(rest)?.0)
                } else {
                    None
                };
                Operation::List { doc_type, namespace }
            }
            11 => Operation::Flush,
            12 => {
                let (username, rest) = read_string(rest)?;
                let (password, _) = read_string(rest)?;
                Operation::Authenticate { username, password }
            }
            13 => {
                let (api_key, _) = read_string(rest)?;
                Operation::AuthenticateApiKey { api_key }
            }
            14 => Operation::Logout,
            15 => {
                let (status_byte, rest) = read_u8(rest)?;
                let (payload, _) = read_optional_bytes(rest)?;
                Operation::Reply { status: Status::from_byte(status_byte)?, payload }
            }
            other => return Err(Error::InvalidResponse(format!("unknown operation tag {other}"))),
        };
        Ok(op)
    }
}

/// A full packet: fixed header plus the decoded operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub packet_id: u32,
    pub session_id: u32,
    pub correlation_id: u64,
    pub timestamp: u64,
    pub operation: Operation,
}

impl Packet {
    /// Encode header + operation into `out`, growing it in place. Does not
    /// write the outer 4-byte frame length prefix; the transport owns that.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut body = Vec::new();
        self.operation.encode(&mut body);

        let header = PacketHeader {
            checksum: U32LE::new(0),
            declared_length: U32LE::new(body.len() as u32),
            packet_id: U32LE::new(self.packet_id),
            session_id: U32LE::new(self.session_id),
            correlation_id: U64LE::new(self.correlation_id),
            timestamp: U64LE::new(self.timestamp),
        };
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&body);
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < PacketHeader::ENCODED_LEN {
            return Err(Error::InvalidResponse("truncated packet header".into()));
        }
        let header = PacketHeader::from_bytes(&data[..PacketHeader::ENCODED_LEN])?;
        let operation = Operation::decode(&data[PacketHeader::ENCODED_LEN..])?;
        Ok(Packet {
            packet_id: header.packet_id.get(),
            session_id: header.session_id.get(),
            correlation_id: header.correlation_id.get(),
            timestamp: header.timestamp.get(),
            operation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(operation: Operation) -> Packet {
        Packet {
            packet_id: 7,
            session_id: 42,
            correlation_id: 99,
            timestamp: 1_000,
            operation,
        }
    }

    #[test]
    fn header_round_trips() {
        let packet = sample(Operation::Flush);
        let mut buf = Vec::new();
        packet.encode(&mut buf);
        let decoded = Packet::decode(&buf).expect("decode");
        assert_eq!(decoded.packet_id, 7);
        assert_eq!(decoded.session_id, 42);
        assert_eq!(decoded.correlation_id, 99);
        assert_eq!(decoded.timestamp, 1_000);
    }

    #[test]
    fn insert_operation_round_trips() {
        let packet = sample(Operation::Insert {
            namespace: "space.store".into(),
            payload: b"{\"a\":1}".to_vec(),
        });
        let mut buf = Vec::new();
        packet.encode(&mut buf);
        let decoded = Packet::decode(&buf).expect("decode");
        assert_eq!(decoded.operation, packet.operation);
    }

    #[test]
    fn read_operation_round_trips() {
        let packet = sample(Operation::Read { namespace: "ns".into(), id: 12345 });
        let mut buf = Vec::new();
        packet.encode(&mut buf);
        let decoded = Packet::decode(&buf).expect("decode");
        assert_eq!(decoded.operation, packet.operation);
    }

    #[test]
    fn scan_with_no_start_key_round_trips() {
        let packet = sample(Operation::Scan { namespace: "ns".into(), start_key: None, count: 50 });
        let mut buf = Vec::new();
        packet.encode(&mut buf);
        let decoded = Packet::decode(&buf).expect("decode");
        assert_eq!(decoded.operation, packet.operation);
    }

    #[test]
    fn reply_with_error_status_round_trips() {
        let packet = sample(Operation::Reply { status: Status::Error, payload: Some(b"boom".to_vec()) });
        let mut buf = Vec::new();
        packet.encode(&mut buf);
        let decoded = Packet::decode(&buf).expect("decode");
        assert_eq!(decoded.operation, packet.operation);
    }

    #[test]
    fn truncated_header_is_rejected() {
        assert!(Packet::decode(&[0u8; 10]).is_err());
    }
}
