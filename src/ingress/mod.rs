//! Receive side of the packet engine.
//!
//! The [`Ingress`] owns the receive buffer. It splits the byte stream into
//! lines, hands unsolicited ones to the URC handler and accumulates the
//! response of the command in flight until a final result token arrives.
//! Raw payloads announced by a data prefix are copied through verbatim.

pub mod classify;
pub mod context;
pub mod response;

use embassy_time::{Duration, Timer};
use embedded_io_async::{Error as _, Read};

use crate::asynch::urc_handler::UrcHandler;
use crate::config::TokenTable;
use crate::error::PktError;
use crate::fmt::LossyStr;
use crate::urc::EventHandler;

use classify::{classify, LineKind};
use context::{PktContext, ResponseSlot};
use response::{accept, Progress, Response};

enum Frame {
    /// More bytes are needed before anything can be delivered.
    Incomplete,
    /// A line of `end` bytes. The next unit starts at `next`, and `data_len`
    /// raw payload bytes follow there if the line announced them.
    Line {
        end: usize,
        next: usize,
        data_len: Option<usize>,
    },
    /// The data prefix of the command in flight could not be parsed, the
    /// framing of the buffered bytes is unknown.
    Invalid(PktError),
}

enum Flow {
    Continue,
    /// The rest of the buffered bytes belong to a response that failed.
    DropRest,
}

pub struct Ingress<'a, H: EventHandler, const INGRESS_BUF_SIZE: usize, const RES_CAPACITY: usize>
{
    buf: &'a mut [u8; INGRESS_BUF_SIZE],
    pos: usize,
    digester: Digester<'a, H, RES_CAPACITY>,
}

struct Digester<'a, H: EventHandler, const RES_CAPACITY: usize> {
    ctx: &'a PktContext,
    slot: &'a ResponseSlot<RES_CAPACITY>,
    urc: UrcHandler<'a, H>,
    tokens: TokenTable,
    response: Response<RES_CAPACITY>,
    /// Exchange the accumulated response belongs to.
    accum_seq: Option<u32>,
    /// Last exchange that was answered. Its stragglers are dropped.
    finished_seq: Option<u32>,
    data_remaining: usize,
}

impl<'a, H: EventHandler, const INGRESS_BUF_SIZE: usize, const RES_CAPACITY: usize>
    Ingress<'a, H, INGRESS_BUF_SIZE, RES_CAPACITY>
{
    pub(crate) fn new(
        buf: &'a mut [u8; INGRESS_BUF_SIZE],
        ctx: &'a PktContext,
        slot: &'a ResponseSlot<RES_CAPACITY>,
        urc: UrcHandler<'a, H>,
        tokens: TokenTable,
    ) -> Self {
        Self {
            buf,
            pos: 0,
            digester: Digester {
                ctx,
                slot,
                urc,
                tokens,
                response: Response::new(),
                accum_seq: None,
                finished_seq: None,
                data_remaining: 0,
            },
        }
    }

    /// The free part of the receive buffer. Fill it and call
    /// [`Ingress::advance`].
    pub fn write_buf(&mut self) -> &mut [u8] {
        &mut self.buf[self.pos..]
    }

    /// Commits `n` bytes written to [`Ingress::write_buf`] and processes
    /// everything that is complete.
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(INGRESS_BUF_SIZE);
        self.digest();
    }

    /// Copies `data` into the receive buffer and processes it.
    pub fn write(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let buf = self.write_buf();
            let n = buf.len().min(data.len());
            buf[..n].copy_from_slice(&data[..n]);
            data = &data[n..];
            self.advance(n);
        }
    }

    /// Reads from `serial` forever, processing bytes as they arrive.
    pub async fn read_from(&mut self, mut serial: impl Read) -> ! {
        loop {
            let buf = self.write_buf();
            match serial.read(buf).await {
                Ok(0) => {
                    warn!("Serial read returned no data");
                    Timer::after(Duration::from_millis(10)).await;
                }
                Ok(n) => self.advance(n),
                Err(e) => {
                    error!("Failed to read from serial port: {:?}", e.kind());
                    Timer::after(Duration::from_millis(10)).await;
                }
            }
        }
    }

    /// Whether a command is waiting for its response.
    pub fn command_pending(&self) -> bool {
        self.digester.ctx.pending().is_some()
    }

    fn digest(&mut self) {
        let Self { buf, pos, digester } = self;
        let mut start = 0;

        while start < *pos {
            let avail = &buf[start..*pos];

            if digester.data_remaining > 0 {
                let n = digester.data_remaining.min(avail.len());
                digester.take_data(&avail[..n]);
                start += n;
                continue;
            }

            let skip = avail
                .iter()
                .take_while(|&&b| b == b'\r' || b == b'\n')
                .count();
            if skip > 0 {
                start += skip;
                continue;
            }

            match digester.frame(avail) {
                Frame::Incomplete => break,
                Frame::Line {
                    end,
                    next,
                    data_len,
                } => match digester.handle_line(&avail[..end], data_len) {
                    Flow::Continue => start += next,
                    Flow::DropRest => start = *pos,
                },
                Frame::Invalid(e) => {
                    digester.reject(e);
                    start = *pos;
                }
            }
        }

        if start > 0 {
            buf.copy_within(start..*pos, 0);
            *pos -= start;
        }

        if *pos == INGRESS_BUF_SIZE {
            error!(
                "Ingress buffer full without a complete line, dropping {} bytes",
                *pos
            );
            *pos = 0;
        }
    }
}

impl<'a, H: EventHandler, const RES_CAPACITY: usize> Digester<'a, H, RES_CAPACITY> {
    fn frame(&self, avail: &[u8]) -> Frame {
        if let Some(pending) = self.ctx.pending() {
            if let Some(prompt) = pending.data_send_prompt.filter(|p| !p.is_empty()) {
                if avail.starts_with(prompt) {
                    return Frame::Line {
                        end: prompt.len(),
                        next: prompt.len(),
                        data_len: None,
                    };
                }
            }

            if let Some(data_prefix) = pending.data_prefix {
                match data_prefix(avail) {
                    Ok(Some(dp)) => {
                        return Frame::Line {
                            end: dp.line_len,
                            next: dp.data_offset,
                            data_len: Some(dp.len),
                        }
                    }
                    Ok(None) => {}
                    Err(PktError::SizeMismatch) => return Frame::Incomplete,
                    Err(e) => {
                        warn!("Invalid data prefix ({:?}): {:?}", e, LossyStr(avail));
                        return Frame::Invalid(e);
                    }
                }
            }
        }

        match avail.iter().position(|&b| b == b'\r' || b == b'\n') {
            Some(end) => Frame::Line {
                end,
                next: end,
                data_len: None,
            },
            None => Frame::Incomplete,
        }
    }

    fn handle_line(&mut self, line: &[u8], data_len: Option<usize>) -> Flow {
        trace!("Received line: {:?}", LossyStr(line));
        let pending = self.ctx.pending();

        match classify(line, pending.as_ref(), &self.tokens) {
            LineKind::Undefined => {
                warn!("Dropping line outside of any command: {:?}", LossyStr(line));
                Flow::Continue
            }
            LineKind::Unsolicited => {
                self.urc.handle(line);
                Flow::Continue
            }
            LineKind::Solicited => {
                let Some(pending) = pending else {
                    return Flow::Continue;
                };
                if self.finished_seq == Some(pending.seq) {
                    debug!("Dropping line of answered command: {:?}", LossyStr(line));
                    return Flow::Continue;
                }
                if self.accum_seq != Some(pending.seq) {
                    self.response.clear();
                    self.accum_seq = Some(pending.seq);
                }

                match accept(&mut self.response, line, &pending, &self.tokens) {
                    Ok(Progress::Complete) => {
                        self.accum_seq = None;
                        self.finished_seq = Some(pending.seq);
                        let response = core::mem::take(&mut self.response);
                        self.slot.signal(pending.seq, Ok(response));
                        Flow::Continue
                    }
                    Ok(Progress::Rejected) => {
                        debug!("Command failed: {:?}", LossyStr(line));
                        self.fail(PktError::Failure);
                        Flow::Continue
                    }
                    Ok(Progress::Pending) => Flow::Continue,
                    Ok(Progress::PendingData) => {
                        if let Some(len) = data_len.filter(|&len| len > 0) {
                            if let Err(e) = self.response.begin_data() {
                                self.fail(e);
                            }
                            // Consumed even after a failure, to stay in sync.
                            self.data_remaining = len;
                        }
                        Flow::Continue
                    }
                    Err(e) => {
                        warn!(
                            "Response line rejected ({:?}): {:?}",
                            e,
                            LossyStr(line)
                        );
                        self.fail(e);
                        Flow::DropRest
                    }
                }
            }
        }
    }

    fn take_data(&mut self, data: &[u8]) {
        self.data_remaining -= data.len();
        if self.accum_seq.is_none() {
            return;
        }
        if let Err(e) = self.response.extend_data(data) {
            self.fail(e);
        }
    }

    /// Ends the command in flight with `e`, whether or not a line of it was
    /// accepted yet.
    fn reject(&mut self, e: PktError) {
        let Some(pending) = self.ctx.pending() else {
            return;
        };
        if self.finished_seq == Some(pending.seq) {
            return;
        }
        self.accum_seq = None;
        self.finished_seq = Some(pending.seq);
        self.response.clear();
        self.slot.signal(pending.seq, Err(e));
    }

    /// Ends the exchange being accumulated with `e`.
    fn fail(&mut self, e: PktError) {
        if let Some(seq) = self.accum_seq.take() {
            self.finished_seq = Some(seq);
            self.response.clear();
            self.slot.signal(seq, Err(e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asynch::state::{self, State};
    use crate::asynch::urc_handler::tests::Recorder;
    use crate::command::ip_transport_layer::{read_socket_data, responses::socket_data};
    use crate::command::network_service::get_signal_quality;
    use crate::command::ip_transport_layer::write_socket_data;
    use crate::command::{Command, CommandType, DataPrefix};
    use crate::registration::Status;
    use crate::test_helpers::setup_logger;
    use crate::urc::{RegistrationEvent, UrcRouter, DEFAULT_URC_TABLE};

    const BUF: usize = 32;

    struct Fixture {
        state: State,
        ctx: PktContext,
        slot: ResponseSlot<256>,
        buf: [u8; BUF],
        recorder: Recorder,
    }

    impl Fixture {
        fn new() -> Self {
            setup_logger();
            Self {
                state: State::new(),
                ctx: PktContext::new(),
                slot: ResponseSlot::new(),
                buf: [0; BUF],
                recorder: Recorder::default(),
            }
        }

        fn ingress(&mut self) -> Ingress<'_, Recorder, BUF, 256> {
            let router = UrcRouter::new(DEFAULT_URC_TABLE).unwrap();
            let urc = UrcHandler::new(state::Runner::new(&self.state), router, &self.recorder);
            Ingress::new(&mut self.buf, &self.ctx, &self.slot, urc, TokenTable::new())
        }
    }

    #[test]
    fn fragmented_response() {
        let stream: &[u8] = b"\r\n+CSQ: 20,99\r\n\r\nOK\r\n";
        let cmd = get_signal_quality().unwrap();

        // Whole, byte by byte, and split at every position.
        let mut splits = std::vec![std::vec![stream.len()], std::vec![1; stream.len()]];
        splits.extend((1..stream.len()).map(|i| std::vec![i, stream.len() - i]));

        for split in splits {
            let mut f = Fixture::new();
            let seq = f.ctx.begin(&cmd, None);
            let mut ingress = f.ingress();
            let mut rest = stream;
            for n in split {
                let (chunk, tail) = rest.split_at(n);
                ingress.write(chunk);
                rest = tail;
            }
            drop(ingress);

            let (s, res) = f.slot.try_take().unwrap();
            assert_eq!(s, seq);
            let res = res.unwrap();
            assert!(res.is_success());
            assert_eq!(res.len(), 1);
            assert_eq!(res.line_str(0), Some("+CSQ: 20,99"));
            assert!(f.recorder.generic.borrow().is_empty());
        }
    }

    #[test]
    fn urc_inside_response() {
        let mut f = Fixture::new();
        let seq = f.ctx.begin(&get_signal_quality().unwrap(), None);
        let mut ingress = f.ingress();
        ingress.write(b"+CEREG: 1\r\n+CSQ: 5,0\r\nRDY\r\nOK\r\n");
        drop(ingress);

        let (s, res) = f.slot.try_take().unwrap();
        assert_eq!(s, seq);
        assert_eq!(res.unwrap().line_str(0), Some("+CSQ: 5,0"));
        assert_eq!(
            *f.recorder.registration.borrow(),
            [(RegistrationEvent::PsRegistration, Status::Home)]
        );
        assert_eq!(f.recorder.modem.borrow().len(), 1);
    }

    #[test]
    fn error_token() {
        let mut f = Fixture::new();
        let seq = f.ctx.begin(&get_signal_quality().unwrap(), None);
        let mut ingress = f.ingress();
        ingress.write(b"+CME ERROR: 3\r\n");
        drop(ingress);

        assert_eq!(f.slot.try_take(), Some((seq, Err(PktError::Failure))));
    }

    #[test]
    fn policy_violation_is_reported() {
        let mut f = Fixture::new();
        let cmd = Command::new("AT+CFUN=1", CommandType::NoResult).unwrap();
        let seq = f.ctx.begin(&cmd, None);
        let mut ingress = f.ingress();
        ingress.write(b"surprise\r\nOK\r\n");
        drop(ingress);

        assert_eq!(f.slot.try_take(), Some((seq, Err(PktError::InvalidData))));
    }

    #[test]
    fn idle_lines() {
        let mut f = Fixture::new();
        let mut ingress = f.ingress();
        ingress.write(b"OK\r\n+CSQ: 1,1\r\nNORMAL POWER DOWN\r\n");
        assert!(!ingress.command_pending());
        drop(ingress);

        assert!(f.slot.try_take().is_none());
        assert_eq!(*f.recorder.generic.borrow(), ["+CSQ: 1,1"]);
        assert_eq!(f.recorder.modem.borrow().len(), 1);
    }

    #[test]
    fn overlong_line_is_dropped() {
        let mut f = Fixture::new();
        let mut ingress = f.ingress();
        ingress.write(&[b'x'; BUF + 4]);
        ingress.write(b"\r\nRDY\r\n");
        drop(ingress);

        assert_eq!(f.recorder.modem.borrow().len(), 1);
    }

    #[test]
    fn data_prompt() {
        let mut f = Fixture::new();
        let cmd = write_socket_data(0, 3).unwrap();
        let seq = f.ctx.begin(&cmd, Some(b"@"));
        let mut ingress = f.ingress();
        ingress.write(b"\r\n@");
        drop(ingress);

        let (s, res) = f.slot.try_take().unwrap();
        assert_eq!(s, seq);
        assert!(res.unwrap().is_success());
    }

    fn receive(payload: &[u8], chunk: usize) -> std::vec::Vec<u8> {
        let mut stream = std::format!("\r\n+USORD: 0,{},\"", payload.len()).into_bytes();
        stream.extend_from_slice(payload);
        stream.extend_from_slice(b"\"\r\n\r\nOK\r\n");

        let mut f = Fixture::new();
        let seq = f.ctx.begin(&read_socket_data(0, 1024).unwrap(), None);
        let mut ingress = f.ingress();
        for c in stream.chunks(chunk) {
            ingress.write(c);
        }
        drop(ingress);

        let (s, res) = f.slot.try_take().unwrap();
        assert_eq!(s, seq);
        socket_data(&res.unwrap()).unwrap().to_vec()
    }

    #[test]
    fn data_lengths() {
        // Payloads shorter than, as long as and longer than the receive
        // buffer, full of line terminators and result tokens.
        for len in [0, 1, BUF - 1, BUF, BUF + 1] {
            let payload: std::vec::Vec<u8> = b"\r\nOK\r\nERROR\n\""
                .iter()
                .copied()
                .cycle()
                .take(len)
                .collect();
            for chunk in [1, 7, 64] {
                assert_eq!(receive(&payload, chunk), payload, "len {len}, chunk {chunk}");
            }
        }
    }

    #[test]
    fn payload_too_large_for_response() {
        let mut f = Fixture::new();
        let seq = f.ctx.begin(&read_socket_data(0, 1024).unwrap(), None);
        let mut ingress = f.ingress();
        ingress.write(b"+USORD: 0,300,\"");
        ingress.write(&[b'a'; 300]);
        ingress.write(b"\"\r\nOK\r\n");
        drop(ingress);

        assert_eq!(f.slot.try_take(), Some((seq, Err(PktError::NoMemory))));
    }

    #[test]
    fn oversized_payload_is_skipped() {
        let mut f = Fixture::new();
        let seq = f.ctx.begin(&read_socket_data(0, 1024).unwrap(), None);
        let mut ingress = f.ingress();
        ingress.write(b"\r\n+USORD: 0,1900,\"");
        for _ in 0..100 {
            ingress.write(b"\r\n+CEREG: 1\r\nRDY\r\n");
        }
        ingress.write(b"\"\r\n\r\nOK\r\n");
        drop(ingress);

        assert_eq!(f.slot.try_take(), Some((seq, Err(PktError::NoMemory))));
        assert!(f.recorder.registration.borrow().is_empty());
        assert!(f.recorder.modem.borrow().is_empty());
    }

    fn unparsable_prefix(buf: &[u8]) -> Result<Option<DataPrefix>, PktError> {
        if buf.starts_with(b"+UDATA: ") {
            Err(PktError::BadParam)
        } else {
            Ok(None)
        }
    }

    #[test]
    fn invalid_data_prefix_fails_command() {
        let mut f = Fixture::new();
        let cmd = Command::new("AT+UDATA", CommandType::MultiDataWithoutPrefix)
            .unwrap()
            .with_prefix("+UDATA")
            .with_data_prefix(unparsable_prefix);
        let seq = f.ctx.begin(&cmd, None);
        let mut ingress = f.ingress();
        ingress.write(b"+UDATA: 9\r\nRDY\r\n");
        drop(ingress);

        assert_eq!(f.slot.try_take(), Some((seq, Err(PktError::BadParam))));
        assert!(f.recorder.modem.borrow().is_empty());
    }

    #[test]
    fn prompt_token_only_ends_command_phase() {
        let mut f = Fixture::new();
        f.ctx.begin(&write_socket_data(0, 3).unwrap(), Some(b"@"));
        let seq = f.ctx.rearm().unwrap();
        let mut ingress = f.ingress();
        ingress.write(b"@\r\n");
        drop(ingress);

        assert_eq!(
            f.slot.try_take(),
            Some((seq, Err(PktError::PrefixMismatch)))
        );
    }
}
