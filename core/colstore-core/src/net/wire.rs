//! Wire framing for the client/server protocol (section 6's "Wire framing").
//!
//! Grounded in `original_source/include/message.h`'s `message`/`Status`/
//! `PrintPayload` structs. The reference sends these as raw C struct memory
//! (`send(socket, send_message, sizeof(message), 0)`), which only works
//! because client and server are built from the same header on the same
//! architecture; this crate instead writes the fields out explicitly and
//! portably, the same choice made for the `dbdump.bin` layout in
//! `engine::persistence`.

use std::io::{self, Read, Write};

use crate::error::StatusCode;
use crate::storage::ResultData;
use crate::types::ElementType;

fn status_from_u32(tag: u32) -> StatusCode {
    match tag {
        0 => StatusCode::OkDone,
        1 => StatusCode::OkWaitForResponse,
        3 => StatusCode::UnknownCommand,
        4 => StatusCode::ObjectDoesNotExist,
        5 => StatusCode::ObjectAlreadyExists,
        6 => StatusCode::TableAtCapacity,
        7 => StatusCode::QueryUnsupported,
        8 => StatusCode::IncorrectFormat,
        9 => StatusCode::FileNotFound,
        _ => StatusCode::Error,
    }
}

/// A message header: status code, payload length, and the `print_payload`
/// flag (`message.h`'s `status`/`length`/`print_payload`; the reference's
/// unused `payload` pointer field has no wire representation here since it
/// carries no information on the wire — the receiver reads only the
/// trailing `length` bytes, per section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub status: StatusCode,
    pub length: u32,
    pub print_payload: bool,
}

pub fn write_header(w: &mut impl Write, header: MessageHeader) -> io::Result<()> {
    w.write_all(&(header.status as i32).to_le_bytes())?;
    w.write_all(&header.length.to_le_bytes())?;
    w.write_all(&[header.print_payload as u8])
}

/// Reads a header, or `Ok(None)` on a clean EOF before any bytes are read
/// (the client disconnected between commands — not an error, mirrors
/// `handle_client`'s `length == 0` branch that sets `done = 1`).
pub fn read_header(r: &mut impl Read) -> io::Result<Option<MessageHeader>> {
    let mut status_buf = [0u8; 4];
    let first = r.read(&mut status_buf[..1])?;
    if first == 0 {
        return Ok(None);
    }
    r.read_exact(&mut status_buf[1..])?;
    let mut length_buf = [0u8; 4];
    r.read_exact(&mut length_buf)?;
    let mut flag_buf = [0u8; 1];
    r.read_exact(&mut flag_buf)?;
    Ok(Some(MessageHeader {
        status: status_from_u32(i32::from_le_bytes(status_buf) as u32),
        length: u32::from_le_bytes(length_buf),
        print_payload: flag_buf[0] != 0,
    }))
}

/// Reads a client request: a header followed by `length` bytes of UTF-8
/// command text. `Ok(None)` signals a clean disconnect.
pub fn read_request(r: &mut impl Read) -> io::Result<Option<String>> {
    let header = match read_header(r)? {
        None => return Ok(None),
        Some(h) => h,
    };
    let mut buf = vec![0u8; header.length as usize];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map(Some).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn write_request(w: &mut impl Write, command: &str) -> io::Result<()> {
    write_header(w, MessageHeader { status: StatusCode::OkDone, length: command.len() as u32, print_payload: false })?;
    w.write_all(command.as_bytes())
}

/// Writes a plain status response with no payload (the common case: every
/// non-`print` operator's success or failure).
pub fn write_status(w: &mut impl Write, status: StatusCode) -> io::Result<()> {
    write_header(w, MessageHeader { status, length: 0, print_payload: false })
}

/// `PrintPayload{num_results, num_cols}` (`message.h`).
fn write_print_payload(w: &mut impl Write, num_results: u32, num_cols: u32) -> io::Result<()> {
    w.write_all(&num_results.to_le_bytes())?;
    w.write_all(&num_cols.to_le_bytes())
}

/// Writes a `print` response: header with `print_payload` set, then
/// `PrintPayload{num_results, num_cols}`, then per column a 4-byte type tag
/// followed by the raw little-endian element payload (section 6). An empty
/// handle list is signalled by `num_cols == 0` and writes nothing further.
pub fn write_print_response(w: &mut impl Write, columns: &[ResultData]) -> io::Result<()> {
    write_header(w, MessageHeader { status: StatusCode::OkDone, length: 0, print_payload: true })?;
    let num_results = columns.first().map(|c| c.tuple_count()).unwrap_or(0) as u32;
    write_print_payload(w, num_results, columns.len() as u32)?;
    for col in columns {
        w.write_all(&col.element_type().wire_tag().to_le_bytes())?;
        match col {
            ResultData::Int32(values) => {
                for &v in values {
                    w.write_all(&v.to_le_bytes())?;
                }
            }
            ResultData::Int64(values) => {
                for &v in values {
                    w.write_all(&v.to_le_bytes())?;
                }
            }
            ResultData::Float64(values) => {
                for &v in values {
                    w.write_all(&v.to_le_bytes())?;
                }
            }
        }
    }
    Ok(())
}

/// Reads a `print` response back into typed columns; used by tests (and
/// would be used by a companion client binary) to verify
/// [`write_print_response`]'s framing round-trips.
pub fn read_print_response(r: &mut impl Read) -> io::Result<Vec<ResultData>> {
    let mut buf4 = [0u8; 4];
    r.read_exact(&mut buf4)?;
    let num_results = u32::from_le_bytes(buf4) as usize;
    r.read_exact(&mut buf4)?;
    let num_cols = u32::from_le_bytes(buf4) as usize;

    let mut out = Vec::with_capacity(num_cols);
    for _ in 0..num_cols {
        r.read_exact(&mut buf4)?;
        let tag = u32::from_le_bytes(buf4);
        let element = ElementType::from_wire_tag(tag)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown print element type tag"))?;
        out.push(match element {
            ElementType::Int32 => {
                let mut values = Vec::with_capacity(num_results);
                for _ in 0..num_results {
                    let mut b = [0u8; 4];
                    r.read_exact(&mut b)?;
                    values.push(i32::from_le_bytes(b));
                }
                ResultData::Int32(values)
            }
            ElementType::Int64 => {
                let mut values = Vec::with_capacity(num_results);
                for _ in 0..num_results {
                    let mut b = [0u8; 8];
                    r.read_exact(&mut b)?;
                    values.push(i64::from_le_bytes(b));
                }
                ResultData::Int64(values)
            }
            ElementType::Float64 => {
                let mut values = Vec::with_capacity(num_results);
                for _ in 0..num_results {
                    let mut b = [0u8; 8];
                    r.read_exact(&mut b)?;
                    values.push(f64::from_le_bytes(b));
                }
                ResultData::Float64(values)
            }
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_command_text() {
        let mut buf = Vec::new();
        write_request(&mut buf, "select(d.t.x,2,8)").unwrap();
        let got = read_request(&mut buf.as_slice()).unwrap().unwrap();
        assert_eq!(got, "select(d.t.x,2,8)");
    }

    #[test]
    fn read_request_reports_clean_disconnect() {
        let buf: Vec<u8> = Vec::new();
        assert!(read_request(&mut buf.as_slice()).unwrap().is_none());
    }

    #[test]
    fn status_round_trips_through_header() {
        let mut buf = Vec::new();
        write_status(&mut buf, StatusCode::ObjectDoesNotExist).unwrap();
        let header = read_header(&mut buf.as_slice()).unwrap().unwrap();
        assert_eq!(header.status, StatusCode::ObjectDoesNotExist);
        assert_eq!(header.length, 0);
        assert!(!header.print_payload);
    }

    #[test]
    fn print_response_round_trips_mixed_columns() {
        let columns = vec![ResultData::Int32(vec![1, 2, 3]), ResultData::Int64(vec![10, 20, 30])];
        let mut buf = Vec::new();
        write_print_response(&mut buf, &columns).unwrap();

        let header = read_header(&mut buf.as_slice()).unwrap().unwrap();
        assert!(header.print_payload);

        // the PrintPayload+columns sit right after the 9-byte header
        let mut body = &buf[9..];
        let restored = read_print_response(&mut body).unwrap();
        assert_eq!(restored, columns);
    }

    #[test]
    fn print_response_with_no_handles_has_zero_counts() {
        let mut buf = Vec::new();
        write_print_response(&mut buf, &[]).unwrap();
        let mut body = &buf[9..];
        let restored = read_print_response(&mut body).unwrap();
        assert!(restored.is_empty());
    }
}
