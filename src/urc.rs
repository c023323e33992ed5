//! Dispatch of unsolicited result codes.
use core::cmp::Ordering;

use crate::{
    command::{network_service::types::SignalInfo, params},
    error::Error,
    registration::{RegType, ServiceStatus},
};

/// What a URC table entry is parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UrcKind {
    NetworkRegistration(RegType),
    PdnEvent,
    SignalIndicator,
    PowerDown,
    PsmPowerDown,
    Ready,
}

#[derive(Debug, Clone, Copy)]
pub struct UrcEntry {
    /// Name of the URC, without the leading `+`. URCs without a `+NAME:`
    /// prefix are matched on the whole line.
    pub prefix: &'static str,
    pub kind: UrcKind,
}

/// URCs handled out of the box, in ascending byte order.
pub const DEFAULT_URC_TABLE: &[UrcEntry] = &[
    UrcEntry {
        prefix: "CEREG",
        kind: UrcKind::NetworkRegistration(RegType::Cereg),
    },
    UrcEntry {
        prefix: "CGEV",
        kind: UrcKind::PdnEvent,
    },
    UrcEntry {
        prefix: "CGREG",
        kind: UrcKind::NetworkRegistration(RegType::Cgreg),
    },
    UrcEntry {
        prefix: "CIEV",
        kind: UrcKind::SignalIndicator,
    },
    UrcEntry {
        prefix: "CREG",
        kind: UrcKind::NetworkRegistration(RegType::Creg),
    },
    UrcEntry {
        prefix: "NORMAL POWER DOWN",
        kind: UrcKind::PowerDown,
    },
    UrcEntry {
        prefix: "PSM POWER DOWN",
        kind: UrcKind::PsmPowerDown,
    },
    UrcEntry {
        prefix: "RDY",
        kind: UrcKind::Ready,
    },
];

/// Order of URC table entries.
///
/// Plain byte order: a name sorts before every longer name it is a prefix
/// of, and two names are equal only if they have the same length.
pub fn compare_prefix(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'l> {
    /// The line matched a table entry. Holds the text after the `:`.
    Handler(UrcKind, &'l str),
    /// No entry for this line.
    Generic,
}

#[derive(Debug, Clone, Copy)]
pub struct UrcRouter {
    table: &'static [UrcEntry],
}

impl UrcRouter {
    /// Lookups are binary searches, so `table` must be strictly ascending
    /// under [`compare_prefix`].
    pub fn new(table: &'static [UrcEntry]) -> Result<Self, Error> {
        if table
            .windows(2)
            .any(|w| compare_prefix(w[0].prefix, w[1].prefix) != Ordering::Less)
        {
            error!("URC table is not sorted");
            return Err(Error::UnsortedUrcTable);
        }
        Ok(Self { table })
    }

    pub fn route<'l>(&self, line: &'l str) -> Route<'l> {
        let (key, payload) = match line.strip_prefix('+') {
            Some(rest) => match rest.split_once(':') {
                Some((key, payload)) => (key, payload.trim()),
                None => (rest, ""),
            },
            None => (line, ""),
        };

        match self
            .table
            .binary_search_by(|e| compare_prefix(e.prefix, key))
        {
            Ok(i) => Route::Handler(self.table[i].kind, payload),
            Err(_) => Route::Generic,
        }
    }
}

/// Which registration domain changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationEvent {
    CsRegistration,
    PsRegistration,
}

impl From<RegType> for RegistrationEvent {
    fn from(reg_type: RegType) -> Self {
        match reg_type {
            RegType::Creg => Self::CsRegistration,
            RegType::Cgreg | RegType::Cereg => Self::PsRegistration,
        }
    }
}

/// PDP context activation reported by `+CGEV`, with its context id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PdnEvent {
    Activated(u8),
    Deactivated(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemEvent {
    PowerDown,
    PsmPowerDown,
    Ready,
}

/// Application callbacks for unsolicited events.
///
/// Called from the ingress task, so implementations must not wait on a
/// command response.
pub trait EventHandler {
    fn on_network_registration_changed(&self, _event: RegistrationEvent, _status: &ServiceStatus) {}

    fn on_pdn_event(&self, _event: PdnEvent) {}

    fn on_signal_changed(&self, _info: &SignalInfo) {}

    /// Lines that no table entry handles, including late responses of
    /// abandoned commands.
    fn on_generic_urc(&self, _line: &str) {}

    fn on_modem_event(&self, _event: ModemEvent) {}
}

impl EventHandler for () {}

/// Parses the payload of `+CGEV: ME PDN ACT 1`, `+CGEV: NW PDN DEACT 1` and
/// similar lines, where the context id comes last.
pub fn parse_cgev(payload: &str) -> Option<PdnEvent> {
    let mut activated = None;
    let mut last = None;
    for word in payload
        .split(|c: char| c == ' ' || c == ',')
        .filter(|w| !w.is_empty())
    {
        match word {
            "ACT" => activated = Some(true),
            "DEACT" => activated = Some(false),
            _ => {}
        }
        last = Some(word);
    }

    let cid = last?.trim_matches('"').parse::<u8>().ok()?;
    match activated? {
        true => Some(PdnEvent::Activated(cid)),
        false => Some(PdnEvent::Deactivated(cid)),
    }
}

/// Parses the payload of `+CIEV: <descr>,<value>`. Only the signal
/// quality indicator (`<descr>` 2) is understood.
pub fn parse_ciev(payload: &str) -> Option<SignalInfo> {
    let mut p = params(payload);
    let descr = p.next()?.parse::<u8>().ok()?;
    let value = p.next()?.parse::<u8>().ok()?;
    match descr {
        2 if value <= 5 => Some(SignalInfo {
            bars: Some(value),
            ..SignalInfo::default()
        }),
        _ => None,
    }
}
