/// Status of the packet pipeline, as seen by the command dispatcher.
///
/// Every failure inside the line reader, classifier and accumulator is
/// reported to the waiting caller as one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PktError {
    /// The modem answered with a final error token.
    Failure,
    /// The command could not be formatted or sent as given.
    BadParam,
    /// An intermediate line did not start with the expected prefix.
    PrefixMismatch,
    /// More intermediate lines than the command type accepts.
    InvalidData,
    /// The response did not fit the response storage.
    NoMemory,
    /// No final token arrived within the command timeout.
    TimedOut,
    /// A data prefix needs more bytes before it can be parsed.
    SizeMismatch,
}

#[derive(Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    // Packet pipeline errors
    Pkt(PktError),

    // Configuration errors
    UnsortedUrcTable,

    // Response content errors
    Parse,
    BadParameter,

    // Network errors
    NotRegistered,

    Unknown,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self {
            Self::Pkt(e) => defmt::write!(f, "Pkt({:?})", e),
            Self::UnsortedUrcTable => defmt::write!(f, "UnsortedUrcTable"),
            Self::Parse => defmt::write!(f, "Parse"),
            Self::BadParameter => defmt::write!(f, "BadParameter"),
            Self::NotRegistered => defmt::write!(f, "NotRegistered"),
            Self::Unknown => defmt::write!(f, "Unknown"),
        }
    }
}

impl From<PktError> for Error {
    fn from(e: PktError) -> Self {
        Self::Pkt(e)
    }
}
