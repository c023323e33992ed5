use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::WakerRegistration;

use crate::error::Error;
use crate::registration::{RegType, RegistrationState, ServiceStatus};

pub struct State {
    shared: Mutex<NoopRawMutex, RefCell<Shared>>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub const fn new() -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared {
                registration_state: RegistrationState::new(),
                registration_waker: WakerRegistration::new(),
            })),
        }
    }
}

/// Network state shared by the ingress and the control handles.
pub struct Shared {
    registration_state: RegistrationState,
    registration_waker: WakerRegistration,
}

#[derive(Clone, Copy)]
pub struct Runner<'d> {
    pub(crate) shared: &'d Mutex<NoopRawMutex, RefCell<Shared>>,
}

impl<'d> Runner<'d> {
    pub fn new(state: &'d State) -> Self {
        Self {
            shared: &state.shared,
        }
    }

    pub fn update_registration_with<T>(&self, f: impl FnOnce(&mut RegistrationState) -> T) -> T {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            let res = f(&mut s.registration_state);
            s.registration_waker.wake();
            res
        })
    }

    /// Parses a registration line into the shared state. Returns the new
    /// service status if the CS or PS registration changed.
    pub fn apply_registration_line(
        &self,
        reg_type: RegType,
        payload: &str,
        is_urc: bool,
    ) -> Result<Option<ServiceStatus>, Error> {
        self.update_registration_with(|state| {
            let changed = state.parse_line(reg_type, payload, is_urc)?;
            if changed {
                info!(
                    "Registration status changed! Registered: {:?}",
                    state.is_registered()
                );
                Ok(Some(state.service_status()))
            } else {
                Ok(None)
            }
        })
    }

    pub fn service_status(&self) -> ServiceStatus {
        self.shared
            .lock(|s| s.borrow().registration_state.service_status())
    }

    pub fn is_registered(&self, cx: Option<&mut Context>) -> bool {
        self.shared.lock(|s| {
            let s = &mut *s.borrow_mut();
            if let Some(cx) = cx {
                s.registration_waker.register(cx.waker());
            }
            s.registration_state.is_registered()
        })
    }

    pub async fn wait_registration_change(&self) -> bool {
        let old_state = self.is_registered(None);

        poll_fn(|cx| {
            let current_state = self.is_registered(Some(cx));
            if current_state != old_state {
                return Poll::Ready(current_state);
            }
            Poll::Pending
        })
        .await
    }
}
