//! Sorting of received lines into solicited and unsolicited ones.
use super::context::PendingCommand;
use crate::{command::CommandType, config::TokenTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineKind {
    /// Part of the response to the command in flight.
    Solicited,
    /// An event the modem reported on its own.
    Unsolicited,
    /// Neither, and not attributable to anything.
    Undefined,
}

/// Returns the `+NAME` part of a `+NAME: ...` line.
///
/// A line has a prefix if it holds a `:` and everything before it is
/// alphanumeric, `+` or `_`.
pub fn prefix_of(line: &[u8]) -> Option<&[u8]> {
    let colon = line.iter().position(|&b| b == b':')?;
    let prefix = &line[..colon];
    if prefix.is_empty()
        || !prefix
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'_')
    {
        return None;
    }
    Some(prefix)
}

pub(crate) fn classify(
    line: &[u8],
    pending: Option<&PendingCommand>,
    tokens: &TokenTable,
) -> LineKind {
    if tokens
        .urc_without_prefix
        .iter()
        .any(|t| line == t.as_bytes())
    {
        return LineKind::Unsolicited;
    }

    if prefix_of(line).is_some() {
        return match pending.and_then(|p| p.prefix) {
            Some(prefix) if line.starts_with(prefix.as_bytes()) => LineKind::Solicited,
            _ => LineKind::Unsolicited,
        };
    }

    match pending {
        Some(p) if p.prefix.is_none() => LineKind::Solicited,
        Some(p)
            if matches!(
                p.ty,
                CommandType::MultiWithoutPrefix
                    | CommandType::MultiDataWithoutPrefix
                    | CommandType::WithPrefix
                    | CommandType::MultiWithPrefix
            ) =>
        {
            LineKind::Solicited
        }
        _ => LineKind::Undefined,
    }
}
