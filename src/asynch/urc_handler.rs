use crate::fmt::LossyStr;
use crate::registration::RegType;
use crate::urc::{
    parse_cgev, parse_ciev, EventHandler, ModemEvent, RegistrationEvent, Route, UrcKind, UrcRouter,
};

use super::state;

/// Routes unsolicited lines to the registration model and the application.
pub struct UrcHandler<'a, H: EventHandler> {
    ch: state::Runner<'a>,
    router: UrcRouter,
    handler: &'a H,
}

impl<'a, H: EventHandler> UrcHandler<'a, H> {
    pub fn new(ch: state::Runner<'a>, router: UrcRouter, handler: &'a H) -> Self {
        Self {
            ch,
            router,
            handler,
        }
    }

    pub fn handle(&mut self, line: &[u8]) {
        let Ok(line) = core::str::from_utf8(line) else {
            warn!("Dropping non UTF-8 URC: {:?}", LossyStr(line));
            return;
        };
        debug!("URC: {}", line);

        match self.router.route(line) {
            Route::Handler(kind, payload) => self.handle_urc(kind, payload, line),
            Route::Generic => self.handler.on_generic_urc(line),
        }
    }

    fn handle_urc(&mut self, kind: UrcKind, payload: &str, line: &str) {
        match kind {
            UrcKind::NetworkRegistration(reg_type) => {
                self.registration(reg_type, payload, line);
            }
            UrcKind::PdnEvent => match parse_cgev(payload) {
                Some(event) => self.handler.on_pdn_event(event),
                None => self.handler.on_generic_urc(line),
            },
            UrcKind::SignalIndicator => match parse_ciev(payload) {
                Some(info) => self.handler.on_signal_changed(&info),
                None => self.handler.on_generic_urc(line),
            },
            UrcKind::PowerDown => {
                warn!("Modem powered down");
                self.handler.on_modem_event(ModemEvent::PowerDown)
            }
            UrcKind::PsmPowerDown => {
                info!("Modem entered power saving mode");
                self.handler.on_modem_event(ModemEvent::PsmPowerDown)
            }
            UrcKind::Ready => self.handler.on_modem_event(ModemEvent::Ready),
        }
    }

    fn registration(&self, reg_type: RegType, payload: &str, line: &str) {
        match self.ch.apply_registration_line(reg_type, payload, true) {
            // The shared state lock is released here, so the handler may
            // read it.
            Ok(Some(status)) => self
                .handler
                .on_network_registration_changed(RegistrationEvent::from(reg_type), &status),
            Ok(None) => {}
            Err(_) => {
                warn!("Unparsable registration URC: {}", line);
                self.handler.on_generic_urc(line)
            }
        }
    }
}
