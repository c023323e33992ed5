//! State shared between the command dispatcher and the ingress.
use core::cell::RefCell;

use embassy_sync::{
    blocking_mutex::{raw::NoopRawMutex, Mutex},
    signal::Signal,
};

use super::response::Response;
use crate::{
    command::{Command, CommandType, DataPrefixFn},
    error::PktError,
};

/// What the ingress needs to know about the command currently in flight.
#[derive(Debug, Clone, Copy)]
pub struct PendingCommand {
    /// Distinguishes this exchange from any earlier, abandoned one.
    pub seq: u32,
    pub ty: CommandType,
    pub prefix: Option<&'static str>,
    pub extra_success: &'static [&'static str],
    pub data_prefix: Option<DataPrefixFn>,
    /// Prompt that ends a line without terminator, during a data send.
    pub data_send_prompt: Option<&'static [u8]>,
}

struct Inner {
    next_seq: u32,
    pending: Option<PendingCommand>,
}

pub struct PktContext {
    inner: Mutex<NoopRawMutex, RefCell<Inner>>,
}

impl Default for PktContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PktContext {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                next_seq: 0,
                pending: None,
            })),
        }
    }

    /// Publishes `cmd` as the command in flight and returns its sequence.
    pub(crate) fn begin(&self, cmd: &Command, prompt: Option<&'static [u8]>) -> u32 {
        self.inner.lock(|s| {
            let mut s = s.borrow_mut();
            let seq = s.next_seq;
            s.next_seq = s.next_seq.wrapping_add(1);
            s.pending = Some(PendingCommand {
                seq,
                ty: cmd.ty,
                prefix: cmd.prefix,
                extra_success: cmd.extra_success,
                data_prefix: cmd.data_prefix,
                data_send_prompt: prompt,
            });
            seq
        })
    }

    /// Starts a new exchange for the command in flight, for the final
    /// result that follows a raw data block. Neither the prompt nor the
    /// command's extra success tokens apply to it.
    pub(crate) fn rearm(&self) -> Option<u32> {
        self.inner.lock(|s| {
            let mut s = s.borrow_mut();
            let seq = s.next_seq;
            let pending = s.pending.as_mut()?;
            pending.seq = seq;
            pending.data_send_prompt = None;
            pending.extra_success = &[];
            s.next_seq = s.next_seq.wrapping_add(1);
            Some(seq)
        })
    }

    pub(crate) fn clear(&self) {
        self.inner.lock(|s| s.borrow_mut().pending = None);
    }

    pub(crate) fn pending(&self) -> Option<PendingCommand> {
        self.inner.lock(|s| s.borrow().pending)
    }
}

/// Hands the completed response of exchange `seq` to the waiting caller.
pub struct ResponseSlot<const N: usize> {
    signal: Signal<NoopRawMutex, (u32, Result<Response<N>, PktError>)>,
}

impl<const N: usize> Default for ResponseSlot<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ResponseSlot<N> {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    pub(crate) fn signal(&self, seq: u32, res: Result<Response<N>, PktError>) {
        self.signal.signal((seq, res));
    }

    pub(crate) fn reset(&self) {
        self.signal.reset();
    }

    /// Waits for the response of exchange `seq`, dropping any stale one.
    pub(crate) async fn wait_for(&self, seq: u32) -> Result<Response<N>, PktError> {
        loop {
            let (s, res) = self.signal.wait().await;
            if s == seq {
                return res;
            }
            warn!("Dropping stale response of exchange {}", s);
        }
    }

    #[cfg(test)]
    pub(crate) fn try_take(&self) -> Option<(u32, Result<Response<N>, PktError>)> {
        self.signal.try_take()
    }
}
