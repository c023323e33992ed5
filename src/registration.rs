use embassy_time::{Duration, Instant};
use heapless::String;

use crate::{
    command::network_service::types::{Plmn, RadioAccessTechnology},
    error::Error,
};

/// Area code reported while the cell is unknown.
pub const INVALID_AREA_CODE: u16 = 0xFFFF;
/// Cell id reported while the cell is unknown.
pub const INVALID_CELL_ID: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Default)]
pub struct CellularRegistrationStatus {
    status: Status,
    updated: Option<Instant>,
    started: Option<Instant>,
}

impl CellularRegistrationStatus {
    pub const fn new() -> Self {
        Self {
            status: Status::Searching,
            updated: None,
            started: None,
        }
    }

    /// How long the current status has been held at `ts`.
    pub fn duration(&self, ts: Instant) -> Duration {
        self.started
            .and_then(|started| ts.checked_duration_since(started))
            .unwrap_or_else(|| Duration::from_millis(0))
    }

    pub fn started(&self) -> Option<Instant> {
        self.started
    }

    pub fn updated(&self) -> Option<Instant> {
        self.updated
    }

    pub fn reset(&mut self) {
        self.status = Status::Searching;
        self.updated = None;
        self.started = None;
    }

    pub fn get_status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, stat: Status) {
        let ts = Instant::now();
        if self.status != stat {
            self.status = stat;
            self.started = Some(ts);
        }
        self.updated = Some(ts);
    }

    pub fn registered(&self) -> bool {
        self.status.is_registered()
    }
}

/// 3GPP TS 27.007 `<stat>` of `+CREG`, `+CGREG` and `+CEREG`.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Status {
    NotRegistering = 0,
    Home = 1,
    #[default]
    Searching = 2,
    Denied = 3,
    OutOfCoverage = 4,
    Roaming = 5,
}

impl Status {
    pub fn is_registered(self) -> bool {
        matches!(self, Self::Home | Self::Roaming)
    }
}

impl TryFrom<u8> for Status {
    type Error = ();

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => Self::NotRegistering,
            1 => Self::Home,
            2 => Self::Searching,
            3 => Self::Denied,
            4 => Self::OutOfCoverage,
            5 => Self::Roaming,
            _ => return Err(()),
        })
    }
}

/// Registration domain, named after the command reporting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegType {
    /// Circuit switched
    Creg,
    /// GPRS packet switched
    Cgreg,
    /// EPS packet switched
    Cereg,
}

impl RegType {
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Creg => "+CREG",
            Self::Cgreg => "+CGREG",
            Self::Cereg => "+CEREG",
        }
    }

    fn is_packet_switched(self) -> bool {
        !matches!(self, Self::Creg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RejectInfo {
    pub reject_type: Option<u8>,
    pub cause: Option<u8>,
}

impl RejectInfo {
    pub const fn new() -> Self {
        Self {
            reject_type: None,
            cause: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CellularGlobalIdentity {
    /// Registered network operator Location Area Code.
    pub lac: u16,
    /// Registered network operator Tracking Area Code.
    pub tac: u16,
    /// Registered network operator cell Id.
    pub cell_id: u32,
}

impl Default for CellularGlobalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl CellularGlobalIdentity {
    pub const fn new() -> Self {
        Self {
            lac: INVALID_AREA_CODE,
            tac: INVALID_AREA_CODE,
            cell_id: INVALID_CELL_ID,
        }
    }
}

/// Snapshot of the network service state handed to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub rat: RadioAccessTechnology,
    pub cs_status: Status,
    pub ps_status: Status,
    pub cs_reject: RejectInfo,
    pub ps_reject: RejectInfo,
    pub cell_id: u32,
    pub lac: u16,
    pub tac: u16,
    /// Only known after an operator query, never set from a registration line.
    pub plmn: Option<Plmn>,
    pub operator_name: Option<String<32>>,
}

impl ServiceStatus {
    pub fn is_registered(&self) -> bool {
        self.ps_status.is_registered()
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// CSD (Circuit Switched Data) registration status (registered/searching/roaming etc.).
    pub(crate) csd: CellularRegistrationStatus,
    /// PSD (Packet Switched Data) registration status, fed by both CGREG and CEREG.
    pub(crate) psd: CellularRegistrationStatus,

    pub(crate) rat: RadioAccessTechnology,
    pub(crate) cs_reject: RejectInfo,
    pub(crate) ps_reject: RejectInfo,
    pub(crate) cgi: CellularGlobalIdentity,
}

impl Default for RegistrationState {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationState {
    pub const fn new() -> Self {
        Self {
            csd: CellularRegistrationStatus::new(),
            psd: CellularRegistrationStatus::new(),
            rat: RadioAccessTechnology::Invalid,
            cs_reject: RejectInfo::new(),
            ps_reject: RejectInfo::new(),
            cgi: CellularGlobalIdentity::new(),
        }
    }

    /// Determine if a given cellular network status value means that we're
    /// registered with the network.
    pub fn is_registered(&self) -> bool {
        self.psd.registered()
    }

    pub fn reset(&mut self) {
        self.csd.reset();
        self.psd.reset();
        self.forget_cell();
    }

    fn forget_cell(&mut self) {
        self.rat = RadioAccessTechnology::Invalid;
        self.cs_reject = RejectInfo::new();
        self.ps_reject = RejectInfo::new();
        self.cgi = CellularGlobalIdentity::new();
    }

    /// Applies the parameters of a registration line, e.g. `2,1,"1A2B","01A2B3C4",7`
    /// from `+CEREG?` or `1,"1A2B","01A2B3C4",7` from the `+CEREG` URC.
    ///
    /// Fields are parsed independently and only a bad `<stat>` fails the
    /// line. A status other than home or roaming resets the cell fields,
    /// whatever the line carried. Returns whether the CS or PS status changed.
    pub fn parse_line(
        &mut self,
        reg_type: RegType,
        payload: &str,
        is_urc: bool,
    ) -> Result<bool, Error> {
        let mut clean: String<64> = String::new();
        for c in payload
            .chars()
            .filter(|c| *c != '"' && !c.is_ascii_whitespace())
        {
            clean.push(c).map_err(|_| Error::Parse)?;
        }

        let before = (self.csd.get_status(), self.psd.get_status());
        let mut parsed = None;
        let mut reject = None;

        // The query form carries `<n>` in front of `<stat>`.
        let first = if is_urc { 2 } else { 1 };
        for (pos, field) in (first..).zip(clean.split(',')) {
            match pos {
                2 => {
                    let Some(stat) = field
                        .parse::<u8>()
                        .ok()
                        .and_then(|s| Status::try_from(s).ok())
                    else {
                        warn!("Invalid registration status {}", field);
                        continue;
                    };
                    parsed = Some(stat);
                    if reg_type.is_packet_switched() {
                        self.psd.set_status(stat);
                    } else {
                        self.csd.set_status(stat);
                    }
                }
                3 => match u16::from_str_radix(field, 16) {
                    Ok(code) if reg_type == RegType::Cereg => self.cgi.tac = code,
                    Ok(code) => self.cgi.lac = code,
                    Err(_) => debug!("Invalid area code {}", field),
                },
                4 => match u32::from_str_radix(field, 16) {
                    Ok(ci) => self.cgi.cell_id = ci,
                    Err(_) => debug!("Invalid cell id {}", field),
                },
                5 => match field
                    .parse::<u8>()
                    .ok()
                    .and_then(|r| RadioAccessTechnology::try_from(r).ok())
                {
                    Some(rat) => self.rat = rat,
                    None => debug!("Invalid access technology {}", field),
                },
                6 | 7 => {
                    let reject = reject.get_or_insert_with(RejectInfo::new);
                    let value = field.parse::<u8>().ok();
                    if pos == 6 {
                        reject.reject_type = value;
                    } else {
                        reject.cause = value;
                    }
                }
                _ => {}
            }
        }

        let stat = parsed.ok_or(Error::Parse)?;

        // Cell fields of a line without registration are stale, its reject
        // info is not.
        if !stat.is_registered() {
            self.forget_cell();
        }
        if let Some(reject) = reject {
            if reg_type.is_packet_switched() {
                self.ps_reject = reject;
            } else {
                self.cs_reject = reject;
            }
        }

        Ok(before != (self.csd.get_status(), self.psd.get_status()))
    }

    pub fn service_status(&self) -> ServiceStatus {
        ServiceStatus {
            rat: self.rat,
            cs_status: self.csd.get_status(),
            ps_status: self.psd.get_status(),
            cs_reject: self.cs_reject,
            ps_reject: self.ps_reject,
            cell_id: self.cgi.cell_id,
            lac: self.cgi.lac,
            tac: self.cgi.tac,
            plmn: None,
            operator_name: None,
        }
    }
}
