use embedded_io_async::Read;

use crate::ingress::Ingress;
use crate::urc::EventHandler;

/// Background runner of the engine.
///
/// You must call `.run()` in a background task for commands to complete
/// and URCs to be handled.
pub struct Runner<
    'a,
    R: Read,
    H: EventHandler,
    const INGRESS_BUF_SIZE: usize,
    const RES_CAPACITY: usize,
> {
    ingress: Ingress<'a, H, INGRESS_BUF_SIZE, RES_CAPACITY>,
    reader: R,
}

impl<'a, R: Read, H: EventHandler, const INGRESS_BUF_SIZE: usize, const RES_CAPACITY: usize>
    Runner<'a, R, H, INGRESS_BUF_SIZE, RES_CAPACITY>
{
    pub(crate) fn new(ingress: Ingress<'a, H, INGRESS_BUF_SIZE, RES_CAPACITY>, reader: R) -> Self {
        Self { ingress, reader }
    }

    pub async fn run(&mut self) -> ! {
        self.ingress.read_from(&mut self.reader).await
    }
}
