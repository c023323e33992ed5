//! ### 25 - Internet protocol transport layer
pub mod responses;

use crate::error::PktError;

use super::{Command, CommandType, DataPrefix};

/// Largest payload a single `+USORD` returns.
pub const MAX_RECV_DATA_LEN: usize = 1024;
/// Largest payload a single `+USOWR` accepts in binary mode.
pub const MAX_SEND_DATA_LEN: usize = 1024;
/// Prompt sent by the modem when it is ready for the `+USOWR` payload.
pub const SOCKET_SEND_PROMPT: &[u8] = b"@";

const SOCKET_DATA_PREFIX_TOKEN: &[u8] = b"+USORD: ";

/// 25.12 Read Socket Data +USORD
///
/// The response carries the payload inline:
/// `+USORD: <socket>,<length>,"<data>"`. The data may hold any byte,
/// including line terminators, so it is framed by [`socket_data_prefix`].
pub fn read_socket_data(socket: u8, len: usize) -> Result<Command, PktError> {
    Ok(Command::from_fmt(
        CommandType::MultiDataWithoutPrefix,
        format_args!("AT+USORD={},{}", socket, len),
    )?
    .with_prefix("+USORD")
    .with_data_prefix(socket_data_prefix))
}

/// 25.10 Write socket data +USOWR, binary extended syntax
///
/// The modem answers with the `@` prompt, then expects exactly `len` bytes
/// and reports `+USOWR: <socket>,<length>` followed by `OK`.
pub fn write_socket_data(socket: u8, len: usize) -> Result<Command, PktError> {
    Ok(Command::from_fmt(
        CommandType::WithPrefix,
        format_args!("AT+USOWR={},{}", socket, len),
    )?
    .with_prefix("+USOWR")
    .with_success_tokens(&["@"]))
}

/// Locates the payload of a `+USORD: <socket>,<length>,"` line.
///
/// Any announced length is framed, so an oversized payload is skipped as a
/// whole rather than read as lines.
pub fn socket_data_prefix(buf: &[u8]) -> Result<Option<DataPrefix>, PktError> {
    if buf.len() < SOCKET_DATA_PREFIX_TOKEN.len() {
        if SOCKET_DATA_PREFIX_TOKEN.starts_with(buf) {
            return Err(PktError::SizeMismatch);
        }
        return Ok(None);
    }
    if !buf.starts_with(SOCKET_DATA_PREFIX_TOKEN) {
        return Ok(None);
    }

    let Some(quote) = buf
        .iter()
        .position(|&b| b == b'"' || b == b'\r' || b == b'\n')
    else {
        return Err(PktError::SizeMismatch);
    };
    if buf[quote] != b'"' {
        return Ok(None);
    }

    let Ok(params) = core::str::from_utf8(&buf[SOCKET_DATA_PREFIX_TOKEN.len()..quote]) else {
        return Ok(None);
    };
    let mut params = params.split(',').map(str::trim);
    let _socket = params.next();
    // Length omitted: nothing was received, the line is an ordinary one.
    let Some(len) = params.next().and_then(|l| l.parse::<usize>().ok()) else {
        return Ok(None);
    };
    Ok(Some(DataPrefix {
        line_len: quote,
        data_offset: quote + 1,
        len,
    }))
}
