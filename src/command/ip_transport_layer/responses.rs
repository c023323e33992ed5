//! Parsers for the responses of Internet protocol transport layer Commands
use crate::{
    command::{params, strip_prefix},
    error::Error,
    ingress::response::Response,
};

/// 25.12 Read Socket Data +USORD
///
/// Returns the payload of a completed `+USORD` exchange. The first line
/// holds `+USORD: <socket>,<length>,`, the second one the raw bytes.
pub fn socket_data<const N: usize>(resp: &Response<N>) -> Result<&[u8], Error> {
    let header = resp
        .line_str(0)
        .and_then(|l| strip_prefix(l, "+USORD"))
        .ok_or(Error::Parse)?;

    let mut p = params(header);
    let _socket = p.next();
    let len = match p.next() {
        Some(l) if !l.is_empty() => l.parse::<usize>().map_err(|_| Error::Parse)?,
        // `+USORD: 0,""`: nothing to read.
        _ => return Ok(&[]),
    };
    if len == 0 {
        return Ok(&[]);
    }

    let data = resp.line(1).ok_or(Error::Parse)?;
    if data.len() != len {
        return Err(Error::Parse);
    }
    Ok(data)
}

/// 25.10 Write socket data +USOWR
///
/// Returns the number of bytes the modem accepted.
pub fn socket_written(line: &str) -> Result<usize, Error> {
    let mut p = params(strip_prefix(line, "+USOWR").ok_or(Error::Parse)?);
    let _socket = p.next();
    p.next()
        .and_then(|l| l.parse::<usize>().ok())
        .ok_or(Error::Parse)
}
