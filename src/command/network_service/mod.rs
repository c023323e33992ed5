//! ### 7 - Network service
pub mod responses;
pub mod types;

use crate::{error::PktError, registration::RegType};

use super::{Command, CommandType};
use types::OperatorFormat;

/// 7.14 Network registration status +CREG, 18.27 +CGREG, 18.36 +CEREG
///
/// Read command for the registration status of the given domain. The
/// response has the same layout as the URC, preceded by `<n>`.
pub fn get_network_registration(reg_type: RegType) -> Result<Command, PktError> {
    let prefix = reg_type.prefix();
    Ok(Command::from_fmt(CommandType::WithPrefix, format_args!("AT{}?", prefix))?.with_prefix(prefix))
}

/// 7.5 Operator selection +COPS
pub fn get_operator_selection() -> Result<Command, PktError> {
    Ok(Command::new("AT+COPS?", CommandType::WithPrefix)?.with_prefix("+COPS"))
}

/// 7.5 Operator selection +COPS, `<mode>` 3: only set the `<format>` used by
/// the read command.
pub fn set_operator_format(format: OperatorFormat) -> Result<Command, PktError> {
    Command::from_fmt(CommandType::NoResult, format_args!("AT+COPS=3,{}", format as u8))
}

/// 7.2 Signal quality +CSQ
pub fn get_signal_quality() -> Result<Command, PktError> {
    Ok(Command::new("AT+CSQ", CommandType::WithPrefix)?.with_prefix("+CSQ"))
}
