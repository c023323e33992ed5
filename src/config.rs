use embassy_time::Duration;

use crate::urc::{UrcEntry, DEFAULT_URC_TABLE};

/// Final result tokens marking a successful response.
pub const DEFAULT_SUCCESS_TOKENS: &[&str] = &["OK"];

/// Final result tokens marking a failed response. Matched as prefixes, so
/// `+CME ERROR` covers every `+CME ERROR: <err>` line.
pub const DEFAULT_ERROR_TOKENS: &[&str] = &[
    "ERROR",
    "BUSY",
    "NO CARRIER",
    "NO ANSWER",
    "NO DIALTONE",
    "ABORTED",
    "+CMS ERROR",
    "+CME ERROR",
    "SEND FAIL",
];

/// Unsolicited lines that carry no `+NAME:` prefix.
pub const DEFAULT_URC_TOKENS_WITHOUT_PREFIX: &[&str] =
    &["NORMAL POWER DOWN", "PSM POWER DOWN", "RDY"];

/// Token tables the line classifier and response accumulator work from.
#[derive(Debug, Clone, Copy)]
pub struct TokenTable {
    pub success: &'static [&'static str],
    pub error: &'static [&'static str],
    pub urc_without_prefix: &'static [&'static str],
}

impl TokenTable {
    pub const fn new() -> Self {
        Self {
            success: DEFAULT_SUCCESS_TOKENS,
            error: DEFAULT_ERROR_TOKENS,
            urc_without_prefix: DEFAULT_URC_TOKENS_WITHOUT_PREFIX,
        }
    }
}

impl Default for TokenTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine configuration, passed to [`crate::asynch::new`].
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub(crate) command_timeout: Duration,
    pub(crate) data_send_timeout: Duration,
    pub(crate) data_send_delay: Duration,
    pub(crate) tokens: TokenTable,
    pub(crate) urc_table: &'static [UrcEntry],
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            command_timeout: Duration::from_millis(5000),
            data_send_timeout: Duration::from_millis(10000),
            data_send_delay: Duration::from_millis(200),
            tokens: TokenTable::new(),
            urc_table: DEFAULT_URC_TABLE,
        }
    }

    /// Default time to wait for the final result of a command.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Default time to wait for the final result after a raw data block.
    #[must_use]
    pub const fn data_send_timeout(mut self, timeout: Duration) -> Self {
        self.data_send_timeout = timeout;
        self
    }

    /// Pause between the end of a command exchange and the raw data block.
    #[must_use]
    pub const fn data_send_delay(mut self, delay: Duration) -> Self {
        self.data_send_delay = delay;
        self
    }

    #[must_use]
    pub const fn tokens(mut self, tokens: TokenTable) -> Self {
        self.tokens = tokens;
        self
    }

    /// URC dispatch table. Must be sorted, see [`crate::urc::UrcRouter::new`].
    #[must_use]
    pub const fn urc_table(mut self, table: &'static [UrcEntry]) -> Self {
        self.urc_table = table;
        self
    }
}
