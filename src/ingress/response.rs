//! Accumulation of intermediate lines into a [`Response`].
use core::ops::Range;

use heapless::Vec;

use super::context::PendingCommand;
use crate::{command::CommandType, config::TokenTable, error::PktError};

/// Maximum number of intermediate lines kept for one command.
pub const MAX_RESPONSE_LINES: usize = 16;

/// Intermediate lines of a completed command, in arrival order.
///
/// Line bytes are stored back to back in a single buffer of `N` bytes,
/// without terminators. A raw payload announced by a data prefix is stored
/// as its own line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<const N: usize> {
    success: bool,
    buf: Vec<u8, N>,
    lines: Vec<Range<usize>, MAX_RESPONSE_LINES>,
}

impl<const N: usize> Default for Response<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Response<N> {
    pub const fn new() -> Self {
        Self {
            success: false,
            buf: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Whether the response ended with a success token.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Number of intermediate lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, i: usize) -> Option<&[u8]> {
        self.lines.get(i).map(|r| &self.buf[r.clone()])
    }

    /// Intermediate line `i`, if it is valid UTF-8.
    pub fn line_str(&self, i: usize) -> Option<&str> {
        self.line(i).and_then(|l| core::str::from_utf8(l).ok())
    }

    pub fn lines(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.lines.iter().map(|r| &self.buf[r.clone()])
    }

    pub(crate) fn clear(&mut self) {
        self.success = false;
        self.buf.clear();
        self.lines.clear();
    }

    pub(crate) fn set_success(&mut self) {
        self.success = true;
    }

    pub(crate) fn push_line(&mut self, line: &[u8]) -> Result<(), PktError> {
        let start = self.buf.len();
        self.buf
            .extend_from_slice(line)
            .map_err(|_| PktError::NoMemory)?;
        self.lines.push(start..self.buf.len()).map_err(|_| {
            self.buf.truncate(start);
            PktError::NoMemory
        })
    }

    /// Opens an empty line that raw payload bytes are appended to.
    pub(crate) fn begin_data(&mut self) -> Result<(), PktError> {
        let start = self.buf.len();
        self.lines
            .push(start..start)
            .map_err(|_| PktError::NoMemory)
    }

    pub(crate) fn extend_data(&mut self, data: &[u8]) -> Result<(), PktError> {
        self.buf
            .extend_from_slice(data)
            .map_err(|_| PktError::NoMemory)?;
        let end = self.buf.len();
        match self.lines.last_mut() {
            Some(last) => {
                last.end = end;
                Ok(())
            }
            None => Err(PktError::InvalidData),
        }
    }
}

/// Outcome of feeding one solicited line to the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    /// A success token ended the response.
    Complete,
    /// An error token ended the response.
    Rejected,
    /// The line was stored, more are expected.
    Pending,
    /// The line was stored and announces a raw payload.
    PendingData,
}

fn matches_any(line: &[u8], tokens: &[&str]) -> bool {
    tokens.iter().any(|t| line.starts_with(t.as_bytes()))
}

/// Applies the response policy of the pending command to `line`.
pub(crate) fn accept<const N: usize>(
    resp: &mut Response<N>,
    line: &[u8],
    pending: &PendingCommand,
    tokens: &TokenTable,
) -> Result<Progress, PktError> {
    if matches_any(line, pending.extra_success) || matches_any(line, tokens.success) {
        resp.set_success();
        return Ok(Progress::Complete);
    }
    if matches_any(line, tokens.error) {
        return Ok(Progress::Rejected);
    }

    let prefix_ok = || match pending.prefix {
        Some(p) => line.starts_with(p.as_bytes()),
        None => false,
    };

    match pending.ty {
        CommandType::NoResult => Err(PktError::InvalidData),
        CommandType::WithoutPrefix if !resp.is_empty() => Err(PktError::InvalidData),
        CommandType::WithPrefix if !resp.is_empty() => Err(PktError::InvalidData),
        CommandType::WithPrefix | CommandType::MultiWithPrefix if !prefix_ok() => {
            Err(PktError::PrefixMismatch)
        }
        CommandType::MultiDataWithoutPrefix => {
            resp.push_line(line)?;
            Ok(Progress::PendingData)
        }
        _ => {
            resp.push_line(line)?;
            Ok(Progress::Pending)
        }
    }
}
