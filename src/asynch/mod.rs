pub mod client;
pub mod control;
mod resources;
pub mod runner;
pub mod state;
pub mod urc_handler;

pub use resources::Resources;

use embassy_sync::mutex::Mutex;
use embedded_io_async::{Read, Write};

use crate::config::Config;
use crate::error::Error;
use crate::ingress::context::{PktContext, ResponseSlot};
use crate::ingress::Ingress;
use crate::urc::{EventHandler, UrcRouter};

use self::client::Client;
use self::control::Control;
use self::runner::Runner;
use self::urc_handler::UrcHandler;

/// Sets up the engine on a split serial port.
///
/// Fails with [`Error::UnsortedUrcTable`] if the configured URC table can
/// not be binary searched.
pub fn new<
    'a,
    R: Read,
    W: Write,
    H: EventHandler,
    const INGRESS_BUF_SIZE: usize,
    const RES_CAPACITY: usize,
>(
    reader: R,
    writer: W,
    resources: &'a mut Resources<W, INGRESS_BUF_SIZE, RES_CAPACITY>,
    handler: &'a H,
    config: Config,
) -> Result<
    (
        Control<'a, W, H, RES_CAPACITY>,
        Runner<'a, R, H, INGRESS_BUF_SIZE, RES_CAPACITY>,
    ),
    Error,
> {
    let router = UrcRouter::new(config.urc_table)?;

    let Resources {
        ch,
        ctx,
        res_slot,
        ingress_buf,
        writer: writer_slot,
    } = resources;
    let ch: &'a state::State = ch;
    let ctx: &'a PktContext = ctx;
    let res_slot: &'a ResponseSlot<RES_CAPACITY> = res_slot;
    let writer = &*writer_slot.insert(Mutex::new(writer));

    let state_ch = state::Runner::new(ch);
    let ingress = Ingress::new(
        ingress_buf,
        ctx,
        res_slot,
        UrcHandler::new(state_ch, router, handler),
        config.tokens,
    );
    let client = Client::new(writer, ctx, res_slot, config);

    Ok((
        Control::new(state_ch, client, handler),
        Runner::new(ingress, reader),
    ))
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use embassy_futures::join::join;
    use embassy_futures::select::{select, Either};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_sync::pipe::Pipe;
    use embassy_time::{Duration, Timer};

    use super::*;
    use crate::asynch::urc_handler::tests::Recorder;
    use crate::command::network_service::{get_network_registration, get_signal_quality};
    use crate::command::network_service::types::RadioAccessTechnology;
    use crate::error::PktError;
    use crate::registration::{RegType, Status};
    use crate::test_helpers::setup_logger;
    use crate::urc::{RegistrationEvent, UrcEntry, UrcKind};

    type TestPipe = Pipe<NoopRawMutex, 512>;

    /// One direction of the serial link.
    struct Serial<'p>(&'p TestPipe);

    impl embedded_io_async::ErrorType for Serial<'_> {
        type Error = Infallible;
    }

    impl embedded_io_async::Read for Serial<'_> {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            Ok(self.0.read(buf).await)
        }
    }

    impl embedded_io_async::Write for Serial<'_> {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            Ok(self.0.write(buf).await)
        }
    }

    /// Reads one command line, as the modem sees it.
    async fn read_command(to_modem: &TestPipe) -> std::string::String {
        let mut line = std::vec::Vec::new();
        loop {
            let mut b = [0u8; 1];
            to_modem.read(&mut b).await;
            if b[0] == b'\r' {
                return std::string::String::from_utf8(line).unwrap();
            }
            line.push(b[0]);
        }
    }

    async fn respond(to_modem: &TestPipe, from_modem: &TestPipe, expect: &str, reply: &[u8]) {
        assert_eq!(read_command(to_modem).await, expect);
        from_modem.write_all(reply).await;
    }

    fn config() -> Config {
        Config::new()
            .command_timeout(Duration::from_millis(100))
            .data_send_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn timeout_then_late_response() {
        setup_logger();
        let to_modem = TestPipe::new();
        let from_modem = TestPipe::new();
        let recorder = Recorder::default();
        let mut resources = Resources::<_, 128, 256>::new();
        let (control, mut runner) = new(
            Serial(&from_modem),
            Serial(&to_modem),
            &mut resources,
            &recorder,
            config(),
        )
        .unwrap();

        let test = async {
            let (res, cmd) = join(control.get_signal_quality(), read_command(&to_modem)).await;
            assert_eq!(cmd, "AT+CSQ");
            assert_eq!(res, Err(Error::Pkt(PktError::TimedOut)));

            // The answer arrives after the caller gave up.
            from_modem.write_all(b"\r\n+CSQ: 20,99\r\n\r\nOK\r\n").await;
            Timer::after(Duration::from_millis(20)).await;
            assert_eq!(*recorder.generic.borrow(), ["+CSQ: 20,99"]);

            let (res, _) = join(
                control.get_signal_quality(),
                respond(&to_modem, &from_modem, "AT+CSQ", b"\r\n+CSQ: 31,0\r\n\r\nOK\r\n"),
            )
            .await;
            assert_eq!(res.unwrap().rssi, Some(-51));
        };

        select(runner.run(), test).await;
    }

    #[tokio::test]
    async fn abandoned_command_is_withdrawn() {
        setup_logger();
        let to_modem = TestPipe::new();
        let from_modem = TestPipe::new();
        let recorder = Recorder::default();
        let mut resources = Resources::<_, 128, 256>::new();
        let (control, mut runner) = new(
            Serial(&from_modem),
            Serial(&to_modem),
            &mut resources,
            &recorder,
            config(),
        )
        .unwrap();

        let test = async {
            let cmd = get_network_registration(RegType::Creg).unwrap();
            let res = select(
                control.send_command(&cmd),
                Timer::after(Duration::from_millis(20)),
            )
            .await;
            assert!(matches!(res, Either::Second(())));
            assert_eq!(read_command(&to_modem).await, "AT+CREG?");

            // Once the send is dropped, a matching line is an event again.
            from_modem.write_all(b"\r\n+CREG: 1\r\n").await;
            Timer::after(Duration::from_millis(20)).await;
            assert_eq!(control.service_status().cs_status, Status::Home);
            assert_eq!(
                *recorder.registration.borrow(),
                [(RegistrationEvent::CsRegistration, Status::Searching)]
            );

            let (res, _) = join(
                control.get_signal_quality(),
                respond(&to_modem, &from_modem, "AT+CSQ", b"\r\n+CSQ: 31,0\r\n\r\nOK\r\n"),
            )
            .await;
            assert_eq!(res.unwrap().rssi, Some(-51));
        };

        select(runner.run(), test).await;
    }

    #[tokio::test]
    async fn single_command_in_flight() {
        setup_logger();
        let to_modem = TestPipe::new();
        let from_modem = TestPipe::new();
        let recorder = Recorder::default();
        let mut resources = Resources::<_, 128, 256>::new();
        let (control, mut runner) = new(
            Serial(&from_modem),
            Serial(&to_modem),
            &mut resources,
            &recorder,
            config(),
        )
        .unwrap();
        let other = control.clone();

        let modem = async {
            assert_eq!(read_command(&to_modem).await, "AT+CSQ");
            // Nothing else is sent until the first command is answered.
            Timer::after(Duration::from_millis(20)).await;
            assert!(to_modem.is_empty());
            from_modem.write_all(b"\r\n+CSQ: 10,0\r\n\r\nOK\r\n").await;

            respond(&to_modem, &from_modem, "AT+CSQ", b"\r\n+CSQ: 11,0\r\n\r\nOK\r\n").await;
        };

        let test = async {
            let ((a, b), _) = join(
                join(
                    control.send_command(&get_signal_quality().unwrap()),
                    other.send_command(&get_signal_quality().unwrap()),
                ),
                modem,
            )
            .await;
            assert_eq!(a.unwrap().line_str(0), Some("+CSQ: 10,0"));
            assert_eq!(b.unwrap().line_str(0), Some("+CSQ: 11,0"));
        };

        select(runner.run(), test).await;
    }

    #[tokio::test]
    async fn socket_exchange() {
        setup_logger();
        let to_modem = TestPipe::new();
        let from_modem = TestPipe::new();
        let recorder = Recorder::default();
        let mut resources = Resources::<_, 128, 256>::new();
        let (control, mut runner) = new(
            Serial(&from_modem),
            Serial(&to_modem),
            &mut resources,
            &recorder,
            config(),
        )
        .unwrap();

        let test = async {
            let mut buf = [0u8; 16];
            let (n, _) = join(
                control.socket_recv(0, &mut buf),
                respond(
                    &to_modem,
                    &from_modem,
                    "AT+USORD=0,16",
                    b"\r\n+USORD: 0,5,\"he\r\nl\"\r\n\r\nOK\r\n",
                ),
            )
            .await;
            assert_eq!(n, Ok(5));
            assert_eq!(&buf[..5], b"he\r\nl");

            let modem = async {
                respond(&to_modem, &from_modem, "AT+USOWR=0,5", b"\r\n@").await;
                let mut data = [0u8; 5];
                let mut got = 0;
                while got < data.len() {
                    got += to_modem.read(&mut data[got..]).await;
                }
                assert_eq!(&data, b"hello");
                from_modem
                    .write_all(b"\r\n+USOWR: 0,5\r\n\r\nOK\r\n")
                    .await;
            };
            let (n, _) = join(control.socket_send(0, b"hello"), modem).await;
            assert_eq!(n, Ok(5));

            assert_eq!(control.socket_recv(0, &mut []).await, Err(Error::BadParameter));
            assert_eq!(control.socket_send(0, &[]).await, Err(Error::BadParameter));
        };

        select(runner.run(), test).await;
    }

    #[tokio::test]
    async fn service_status_from_queries() {
        setup_logger();
        let to_modem = TestPipe::new();
        let from_modem = TestPipe::new();
        let recorder = Recorder::default();
        let mut resources = Resources::<_, 128, 256>::new();
        let (control, mut runner) = new(
            Serial(&from_modem),
            Serial(&to_modem),
            &mut resources,
            &recorder,
            config(),
        )
        .unwrap();

        let modem = async {
            respond(&to_modem, &from_modem, "AT+CREG?", b"\r\n+CREG: 0,1\r\n\r\nOK\r\n").await;
            respond(&to_modem, &from_modem, "AT+CGREG?", b"\r\nERROR\r\n").await;
            respond(
                &to_modem,
                &from_modem,
                "AT+CEREG?",
                b"\r\n+CEREG: 0,1,\"1A2B\",\"01A2B3C4\",7\r\n\r\nOK\r\n",
            )
            .await;
            respond(
                &to_modem,
                &from_modem,
                "AT+COPS?",
                b"\r\n+COPS: 0,2,\"310410\",7\r\n\r\nOK\r\n",
            )
            .await;
        };

        let test = async {
            let (status, _) = join(control.get_service_status(), modem).await;
            let status = status.unwrap();
            assert_eq!(status.cs_status, Status::Home);
            assert_eq!(status.ps_status, Status::Home);
            assert_eq!(status.tac, 0x1A2B);
            assert_eq!(status.cell_id, 0x01A2_B3C4);
            assert_eq!(status.rat, RadioAccessTechnology::Lte);
            let plmn = status.plmn.unwrap();
            assert_eq!(plmn.mcc.as_str(), "310");
            assert_eq!(plmn.mnc.as_str(), "410");
            assert!(control.is_registered());

            assert_eq!(
                *recorder.registration.borrow(),
                [
                    (RegistrationEvent::CsRegistration, Status::Searching),
                    (RegistrationEvent::PsRegistration, Status::Home)
                ]
            );
        };

        select(runner.run(), test).await;
    }

    #[tokio::test]
    async fn registration_urc_wakes_waiter() {
        setup_logger();
        let to_modem = TestPipe::new();
        let from_modem = TestPipe::new();
        let mut resources = Resources::<_, 128, 256>::new();
        let (control, mut runner) = new(
            Serial(&from_modem),
            Serial(&to_modem),
            &mut resources,
            &(),
            config(),
        )
        .unwrap();

        let test = async {
            let (registered, _) = join(
                control.wait_for_registration_change(),
                from_modem.write_all(b"\r\n+CEREG: 5,\"00C3\",\"0000A13F\",9\r\n"),
            )
            .await;
            assert!(registered);
            assert_eq!(control.service_status().rat, RadioAccessTechnology::NbIot);
        };

        select(runner.run(), test).await;
    }

    #[test]
    fn unsorted_urc_table() {
        static TABLE: &[UrcEntry] = &[
            UrcEntry {
                prefix: "RDY",
                kind: UrcKind::Ready,
            },
            UrcEntry {
                prefix: "CREG",
                kind: UrcKind::NetworkRegistration(RegType::Creg),
            },
        ];

        let to_modem = TestPipe::new();
        let from_modem = TestPipe::new();
        let mut resources = Resources::<_, 128, 256>::new();
        let res = new(
            Serial(&from_modem),
            Serial(&to_modem),
            &mut resources,
            &(),
            Config::new().urc_table(TABLE),
        );
        assert!(matches!(res, Err(Error::UnsortedUrcTable)));
    }
}
