use embassy_sync::{blocking_mutex::raw::NoopRawMutex, mutex::Mutex};
use embedded_io_async::Write;

use crate::ingress::context::{PktContext, ResponseSlot};

use super::state;

/// Static storage of the engine, borrowed by [`super::new`].
///
/// `INGRESS_BUF_SIZE` bounds the longest line the modem may send, and
/// `RES_CAPACITY` the total size of one response.
pub struct Resources<W: Write, const INGRESS_BUF_SIZE: usize, const RES_CAPACITY: usize> {
    pub(crate) ch: state::State,

    pub(crate) ctx: PktContext,
    pub(crate) res_slot: ResponseSlot<RES_CAPACITY>,
    pub(crate) ingress_buf: [u8; INGRESS_BUF_SIZE],

    pub(crate) writer: Option<Mutex<NoopRawMutex, W>>,
}

impl<W: Write, const INGRESS_BUF_SIZE: usize, const RES_CAPACITY: usize> Default
    for Resources<W, INGRESS_BUF_SIZE, RES_CAPACITY>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write, const INGRESS_BUF_SIZE: usize, const RES_CAPACITY: usize>
    Resources<W, INGRESS_BUF_SIZE, RES_CAPACITY>
{
    pub const fn new() -> Self {
        Self {
            ch: state::State::new(),

            ctx: PktContext::new(),
            res_slot: ResponseSlot::new(),
            ingress_buf: [0; INGRESS_BUF_SIZE],

            writer: None,
        }
    }
}
