use crate::error::{Error, Result};

/// Read 1-byte integer.
pub fn read_u8(data: &[u8]) -> Result<(u8, &[u8])> {
    if data.is_empty() {
        return Err(Error::InvalidResponse("unexpected end of payload".into()));
    }
    Ok((data[0], &data[1..]))
}

pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Read 4-byte little-endian integer.
pub fn read_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    if data.len() < 4 {
        return Err(Error::InvalidResponse("unexpected end of payload".into()));
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[..4]);
    Ok((u32::from_le_bytes(buf), &data[4..]))
}

pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Read 8-byte little-endian integer.
pub fn read_u64(data: &[u8]) -> Result<(u64, &[u8])> {
    if data.len() < 8 {
        return Err(Error::InvalidResponse("unexpected end of payload".into()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[..8]);
    Ok((u64::from_le_bytes(buf), &data[8..]))
}

pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Read 16-byte little-endian integer (document ids).
pub fn read_u128(data: &[u8]) -> Result<(u128, &[u8])> {
    if data.len() < 16 {
        return Err(Error::InvalidResponse("unexpected end of payload".into()));
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&data[..16]);
    Ok((u128::from_le_bytes(buf), &data[16..]))
}

pub fn write_u128(out: &mut Vec<u8>, value: u128) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Read a length-prefixed (u32 LE) byte string.
pub fn read_bytes(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = read_u32(data)?;
    let len = len as usize;
    if rest.len() < len {
        return Err(Error::InvalidResponse("unexpected end of payload".into()));
    }
    Ok((&rest[..len], &rest[len..]))
}

pub fn write_bytes(out: &mut Vec<u8>, value: &[u8]) {
    write_u32(out, value.len() as u32);
    out.extend_from_slice(value);
}

/// Read a length-prefixed UTF-8 string.
pub fn read_string(data: &[u8]) -> Result<(String, &[u8])> {
    let (bytes, rest) = read_bytes(data)?;
    let s = String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::InvalidResponse(format!("invalid utf-8 in string field: {e}")))?;
    Ok((s, rest))
}

pub fn write_string(out: &mut Vec<u8>, value: &str) {
    write_bytes(out, value.as_bytes());
}

/// Read an optional length-prefixed byte string: a leading 0/1 presence
/// byte, followed by the bytes when present.
pub fn read_optional_bytes(data: &[u8]) -> Result<(Option<Vec<u8>>, &[u8])> {
    let (present, rest) = read_u8(data)?;
    if present == 0 {
        return Ok((None, rest));
    }
    let (bytes, rest) = read_bytes(rest)?;
    Ok((Some(bytes.to_vec()), rest))
}

pub fn write_optional_bytes(out: &mut Vec<u8>, value: Option<&[u8]>) {
    match value {
        Some(bytes) => {
            write_u8(out, 1);
            write_bytes(out, bytes);
        }
        None => write_u8(out, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_round_trips() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0xDEAD_BEEF);
        let (value, rest) = read_u32(&buf).expect("decode");
        assert_eq!(value, 0xDEAD_BEEF);
        assert!(rest.is_empty());
    }

    #[test]
    fn string_round_trips() {
        let mut buf = Vec::new();
        write_string(&mut buf, "hello");
        let (value, rest) = read_string(&buf).expect("decode");
        assert_eq!(value, "hello");
        assert!(rest.is_empty());
    }

    #[test]
    fn optional_bytes_round_trip_none() {
        let mut buf = Vec::new();
        write_optional_bytes(&mut buf, None);
        let (value, rest) = read_optional_bytes(&buf).expect("decode");
        assert_eq!(value, None);
        assert!(rest.is_empty());
    }

    #[test]
    fn optional_bytes_round_trip_some() {
        let mut buf = Vec::new();
        write_optional_bytes(&mut buf, Some(b"abc"));
        let (value, rest) = read_optional_bytes(&buf).expect("decode");
        assert_eq!(value, Some(b"abc".to_vec()));
        assert!(rest.is_empty());
    }
}
