//! Parsers for the responses of Network service commands
use heapless::String;

use super::types::{
    OperatorFormat, OperatorSelection, OperatorSelectionMode, Plmn, RadioAccessTechnology,
    SignalInfo,
};
use crate::{
    command::{params, strip_prefix},
    error::Error,
};

/// Parse a `+COPS: <mode>[,<format>,<oper>[,<AcT>]]` line.
pub fn parse_operator_selection(line: &str) -> Result<OperatorSelection, Error> {
    let mut p = params(strip_prefix(line, "+COPS").ok_or(Error::Parse)?);

    let mode = p
        .next()
        .and_then(|m| m.parse::<u8>().ok())
        .and_then(|m| OperatorSelectionMode::try_from(m).ok())
        .ok_or(Error::Parse)?;

    let mut selection = OperatorSelection {
        mode,
        name: None,
        plmn: None,
        rat: RadioAccessTechnology::Invalid,
    };

    let Some(format) = p.next() else {
        // Not registered, only the mode is reported.
        return Ok(selection);
    };
    let format = format
        .parse::<u8>()
        .ok()
        .and_then(|f| OperatorFormat::try_from(f).ok())
        .ok_or(Error::Parse)?;

    let oper = p.next().ok_or(Error::Parse)?;
    match format {
        OperatorFormat::Numeric => selection.plmn = Some(parse_plmn(oper)?),
        OperatorFormat::Long | OperatorFormat::Short => {
            let mut name = String::new();
            // Names longer than the buffer are truncated.
            for c in oper.chars() {
                if name.push(c).is_err() {
                    break;
                }
            }
            selection.name = Some(name);
        }
    }

    if let Some(act) = p.next() {
        selection.rat = act
            .parse::<u8>()
            .ok()
            .and_then(|a| RadioAccessTechnology::try_from(a).ok())
            .unwrap_or(RadioAccessTechnology::Invalid);
    }

    Ok(selection)
}

/// Split a numeric operator (`"310410"`) into MCC and MNC.
pub fn parse_plmn(oper: &str) -> Result<Plmn, Error> {
    if !(5..=6).contains(&oper.len()) || !oper.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Parse);
    }

    let (mcc, mnc) = oper.split_at(3);
    let mut plmn = Plmn {
        mcc: String::new(),
        mnc: String::new(),
    };
    plmn.mcc.push_str(mcc).map_err(|_| Error::Parse)?;
    plmn.mnc.push_str(mnc).map_err(|_| Error::Parse)?;
    Ok(plmn)
}

/// Parse a `+CSQ: <rssi>,<ber>` line.
pub fn parse_signal_quality(line: &str) -> Result<SignalInfo, Error> {
    let mut p = params(strip_prefix(line, "+CSQ").ok_or(Error::Parse)?);

    let rssi = p
        .next()
        .and_then(|v| v.parse::<u8>().ok())
        .ok_or(Error::Parse)?;
    let ber = p
        .next()
        .and_then(|v| v.parse::<u8>().ok())
        .ok_or(Error::Parse)?;

    Ok(SignalInfo {
        rssi: match rssi {
            0..=31 => Some(-113 + 2 * i16::from(rssi)),
            _ => None,
        },
        ber: match ber {
            0..=7 => Some(ber),
            _ => None,
        },
        bars: None,
    })
}
