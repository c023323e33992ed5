use embassy_sync::{blocking_mutex::raw::NoopRawMutex, mutex::Mutex};
use embassy_time::{with_timeout, Duration, Timer};
use embedded_io_async::{Error as _, Write};

use crate::command::{Command, DataSend};
use crate::config::Config;
use crate::error::PktError;
use crate::ingress::context::{PktContext, ResponseSlot};
use crate::ingress::response::Response;

/// Sends commands and waits for their responses, one at a time.
///
/// Holding the writer lock for a whole exchange keeps a single command in
/// flight, however many clones of the client exist.
pub struct Client<'a, W: Write, const RES_CAPACITY: usize> {
    writer: &'a Mutex<NoopRawMutex, W>,
    ctx: &'a PktContext,
    slot: &'a ResponseSlot<RES_CAPACITY>,
    config: Config,
}

impl<'a, W: Write, const RES_CAPACITY: usize> Clone for Client<'a, W, RES_CAPACITY> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer,
            ctx: self.ctx,
            slot: self.slot,
            config: self.config,
        }
    }
}

impl<'a, W: Write, const RES_CAPACITY: usize> Client<'a, W, RES_CAPACITY> {
    pub(crate) fn new(
        writer: &'a Mutex<NoopRawMutex, W>,
        ctx: &'a PktContext,
        slot: &'a ResponseSlot<RES_CAPACITY>,
        config: Config,
    ) -> Self {
        Self {
            writer,
            ctx,
            slot,
            config,
        }
    }

    /// Sends `cmd` and waits for its final result.
    ///
    /// Returns the intermediate lines on success. An error token yields
    /// [`PktError::Failure`].
    pub async fn send(&self, cmd: &Command) -> Result<Response<RES_CAPACITY>, PktError> {
        let mut writer = self.writer.lock().await;

        self.slot.reset();
        let exchange = Exchange::begin(self.ctx, cmd, None);

        debug!("Sending command: {}", cmd.text());
        write_all(&mut *writer, &[cmd.text().as_bytes(), b"\r"]).await?;
        self.wait(exchange.seq, cmd.timeout.unwrap_or(self.config.command_timeout))
            .await
    }

    /// Sends `cmd`, then `data` once the command completed, e.g. on the
    /// modem's prompt, and waits for the final result of the data block.
    pub async fn send_with_data(
        &self,
        cmd: &Command,
        data: &[u8],
        opts: DataSend,
    ) -> Result<Response<RES_CAPACITY>, PktError> {
        let mut writer = self.writer.lock().await;

        self.slot.reset();
        let exchange = Exchange::begin(self.ctx, cmd, opts.prompt);

        debug!("Sending command: {}", cmd.text());
        write_all(&mut *writer, &[cmd.text().as_bytes(), b"\r"]).await?;
        self.wait(exchange.seq, cmd.timeout.unwrap_or(self.config.command_timeout))
            .await?;

        Timer::after(opts.delay.unwrap_or(self.config.data_send_delay)).await;

        self.slot.reset();
        let seq = self.ctx.rearm().ok_or(PktError::Failure)?;
        debug!("Sending {} data bytes", data.len());
        write_all(&mut *writer, &[data, opts.end_marker.unwrap_or(&[])]).await?;
        self.wait(seq, opts.timeout.unwrap_or(self.config.data_send_timeout))
            .await
    }

    async fn wait(&self, seq: u32, timeout: Duration) -> Result<Response<RES_CAPACITY>, PktError> {
        match with_timeout(timeout, self.slot.wait_for(seq)).await {
            Ok(res) => res,
            Err(_) => {
                warn!("Command timed out after {} ms", timeout.as_millis());
                Err(PktError::TimedOut)
            }
        }
    }
}

/// The command in flight, withdrawn from the ingress when dropped, also if
/// the caller abandons the send.
struct Exchange<'a> {
    ctx: &'a PktContext,
    seq: u32,
}

impl<'a> Exchange<'a> {
    fn begin(ctx: &'a PktContext, cmd: &Command, prompt: Option<&'static [u8]>) -> Self {
        let seq = ctx.begin(cmd, prompt);
        Self { ctx, seq }
    }
}

impl Drop for Exchange<'_> {
    fn drop(&mut self) {
        self.ctx.clear();
    }
}

async fn write_all<W: Write>(writer: &mut W, parts: &[&[u8]]) -> Result<(), PktError> {
    for part in parts.iter().filter(|p| !p.is_empty()) {
        writer.write_all(part).await.map_err(|e| {
            error!("Failed to write to serial port: {:?}", e.kind());
            PktError::Failure
        })?;
    }
    writer.flush().await.map_err(|e| {
        error!("Failed to flush serial port: {:?}", e.kind());
        PktError::Failure
    })
}
