//! AT commands understood by the packet engine.
//!
//! A [`Command`] carries everything the line classifier and response
//! accumulator need to attribute the modem's answer to it: the response
//! policy ([`CommandType`]), the expected prefix, extra success tokens and
//! an optional data-prefix parser for commands whose response embeds a raw
//! payload.

pub mod ip_transport_layer;
pub mod network_service;

use core::fmt::Write as _;

use embassy_time::Duration;
use heapless::String;

use crate::error::PktError;

/// Maximum length of a formatted command line, without the terminator.
pub const MAX_COMMAND_LEN: usize = 200;

/// How the intermediate lines of a command's response are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandType {
    /// Only a final result token is expected.
    NoResult,
    /// At most one intermediate line, any content.
    WithoutPrefix,
    /// At most one intermediate line, starting with the expected prefix.
    WithPrefix,
    /// Any number of intermediate lines, all starting with the expected prefix.
    MultiWithPrefix,
    /// Any number of intermediate lines, any content.
    MultiWithoutPrefix,
    /// Any number of intermediate lines, each possibly announcing a raw
    /// payload that follows it.
    MultiDataWithoutPrefix,
}

/// Location of a raw payload announced by a response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataPrefix {
    /// Length of the textual part of the line.
    pub line_len: usize,
    /// Offset of the first payload byte, counted from the line start.
    pub data_offset: usize,
    /// Number of payload bytes.
    pub len: usize,
}

/// Inspects the unconsumed bytes starting at a line.
///
/// Returns `Ok(Some(_))` if the bytes start with a line announcing a
/// payload, `Ok(None)` if they hold an ordinary line and
/// `Err(PktError::SizeMismatch)` if more bytes are needed to decide.
pub type DataPrefixFn = fn(&[u8]) -> Result<Option<DataPrefix>, PktError>;

#[derive(Debug, Clone)]
pub struct Command {
    pub(crate) text: String<MAX_COMMAND_LEN>,
    pub(crate) ty: CommandType,
    pub(crate) prefix: Option<&'static str>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) extra_success: &'static [&'static str],
    pub(crate) data_prefix: Option<DataPrefixFn>,
}

impl Command {
    pub fn new(text: &str, ty: CommandType) -> Result<Self, PktError> {
        let mut s = String::new();
        s.push_str(text).map_err(|_| PktError::BadParam)?;
        Ok(Self::from_text(s, ty))
    }

    /// Format a command in place, e.g.
    /// `Command::from_fmt(CommandType::NoResult, format_args!("AT+CFUN={}", 1))`.
    pub fn from_fmt(ty: CommandType, args: core::fmt::Arguments<'_>) -> Result<Self, PktError> {
        let mut s = String::new();
        s.write_fmt(args).map_err(|_| PktError::BadParam)?;
        Ok(Self::from_text(s, ty))
    }

    fn from_text(text: String<MAX_COMMAND_LEN>, ty: CommandType) -> Self {
        Self {
            text,
            ty,
            prefix: None,
            timeout: None,
            extra_success: &[],
            data_prefix: None,
        }
    }

    /// Expected prefix of the response lines, e.g. `"+CSQ"`.
    #[must_use]
    pub fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Tokens completing this command successfully, checked before the
    /// global success table.
    #[must_use]
    pub fn with_success_tokens(mut self, tokens: &'static [&'static str]) -> Self {
        self.extra_success = tokens;
        self
    }

    #[must_use]
    pub fn with_data_prefix(mut self, f: DataPrefixFn) -> Self {
        self.data_prefix = Some(f);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn command_type(&self) -> CommandType {
        self.ty
    }

    pub fn prefix(&self) -> Option<&'static str> {
        self.prefix
    }
}

/// Options of the raw data phase of
/// [`Client::send_with_data`](crate::asynch::client::Client::send_with_data).
#[derive(Debug, Clone, Copy, Default)]
pub struct DataSend {
    /// Prompt the modem sends, without line terminator, when it is ready
    /// for the data block.
    pub prompt: Option<&'static [u8]>,
    /// Bytes written right after the data block.
    pub end_marker: Option<&'static [u8]>,
    /// Overrides the configured data-send timeout.
    pub timeout: Option<Duration>,
    /// Overrides the configured pause before the data block.
    pub delay: Option<Duration>,
}

/// Returns the parameters of a `+NAME: params` line, if it carries `prefix`.
pub(crate) fn strip_prefix<'l>(line: &'l str, prefix: &str) -> Option<&'l str> {
    line.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(str::trim)
}

/// Splits comma separated parameters, dropping surrounding quotes and spaces.
pub(crate) fn params(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(|p| p.trim().trim_matches('"'))
}
