//! Argument and parameter types used by Network service Commands and Responses
use heapless::String;

/// Radio access technology, as reported in `<AcT>` fields.
///
/// Value 7 is E-UTRAN in 3GPP TS 27.007, but several LTE-M modules report
/// Cat-M1 with it. It is kept as [`RadioAccessTechnology::Lte`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RadioAccessTechnology {
    Gsm = 0,
    GsmCompact = 1,
    Utran = 2,
    GsmEgprs = 3,
    UtranHsdpa = 4,
    UtranHsupa = 5,
    UtranHsdpaHsupa = 6,
    Lte = 7,
    CatM1 = 8,
    NbIot = 9,
    #[default]
    Invalid = 0xFF,
}

impl TryFrom<u8> for RadioAccessTechnology {
    type Error = ();

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => Self::Gsm,
            1 => Self::GsmCompact,
            2 => Self::Utran,
            3 => Self::GsmEgprs,
            4 => Self::UtranHsdpa,
            5 => Self::UtranHsupa,
            6 => Self::UtranHsdpaHsupa,
            7 => Self::Lte,
            8 => Self::CatM1,
            9 => Self::NbIot,
            _ => return Err(()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OperatorFormat {
    Long = 0,
    Short = 1,
    Numeric = 2,
}

impl TryFrom<u8> for OperatorFormat {
    type Error = ();

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Long),
            1 => Ok(Self::Short),
            2 => Ok(Self::Numeric),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OperatorSelectionMode {
    Automatic = 0,
    Manual = 1,
    Deregister = 2,
    FormatOnly = 3,
    ManualAutomatic = 4,
}

impl TryFrom<u8> for OperatorSelectionMode {
    type Error = ();

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Automatic),
            1 => Ok(Self::Manual),
            2 => Ok(Self::Deregister),
            3 => Ok(Self::FormatOnly),
            4 => Ok(Self::ManualAutomatic),
            _ => Err(()),
        }
    }
}

/// Public land mobile network identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plmn {
    pub mcc: String<3>,
    pub mnc: String<3>,
}

/// Response of `AT+COPS?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorSelection {
    pub mode: OperatorSelectionMode,
    /// Operator name, when reported in long or short alphanumeric format.
    pub name: Option<String<32>>,
    /// Operator identity, when reported in numeric format.
    pub plmn: Option<Plmn>,
    pub rat: RadioAccessTechnology,
}

/// Signal information from `AT+CSQ` or a `+CIEV` signal indication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalInfo {
    /// Received signal strength in dBm.
    pub rssi: Option<i16>,
    /// Bit error rate, 0..=7.
    pub ber: Option<u8>,
    /// Signal bars, 0..=5.
    pub bars: Option<u8>,
}

/// Network the modem is registered on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredNetwork {
    pub plmn: Plmn,
    pub rat: RadioAccessTechnology,
}
