use embedded_io_async::Write;

use crate::{
    command::{
        ip_transport_layer::{
            read_socket_data,
            responses::{socket_data, socket_written},
            write_socket_data, MAX_RECV_DATA_LEN, MAX_SEND_DATA_LEN, SOCKET_SEND_PROMPT,
        },
        network_service::{
            get_network_registration, get_operator_selection, get_signal_quality,
            responses::{parse_operator_selection, parse_signal_quality},
            set_operator_format,
            types::{OperatorFormat, RadioAccessTechnology, RegisteredNetwork, SignalInfo},
        },
        strip_prefix, Command, DataSend,
    },
    error::Error,
    ingress::response::Response,
    registration::{RegType, ServiceStatus},
    urc::{EventHandler, RegistrationEvent},
};

use super::{client::Client, state};

/// Application handle to the modem. Cheap to clone, commands issued from
/// several clones are serialized.
pub struct Control<'a, W: Write, H: EventHandler, const RES_CAPACITY: usize> {
    state_ch: state::Runner<'a>,
    client: Client<'a, W, RES_CAPACITY>,
    handler: &'a H,
}

impl<'a, W: Write, H: EventHandler, const RES_CAPACITY: usize> Clone
    for Control<'a, W, H, RES_CAPACITY>
{
    fn clone(&self) -> Self {
        Self {
            state_ch: self.state_ch,
            client: self.client.clone(),
            handler: self.handler,
        }
    }
}

impl<'a, W: Write, H: EventHandler, const RES_CAPACITY: usize> Control<'a, W, H, RES_CAPACITY> {
    pub(crate) fn new(
        state_ch: state::Runner<'a>,
        client: Client<'a, W, RES_CAPACITY>,
        handler: &'a H,
    ) -> Self {
        Self {
            state_ch,
            client,
            handler,
        }
    }

    /// Send an AT command to the modem. This is useful for commands the
    /// driver has no dedicated method for.
    pub async fn send_command(&self, cmd: &Command) -> Result<Response<RES_CAPACITY>, Error> {
        Ok(self.client.send(cmd).await?)
    }

    /// Send `cmd` and parse its response with `f`.
    pub async fn send_command_with<T>(
        &self,
        cmd: &Command,
        f: impl FnOnce(&Response<RES_CAPACITY>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let res = self.client.send(cmd).await?;
        f(&res)
    }

    /// Send `cmd` followed by a raw data block.
    pub async fn send_command_with_data(
        &self,
        cmd: &Command,
        data: &[u8],
        opts: DataSend,
    ) -> Result<Response<RES_CAPACITY>, Error> {
        Ok(self.client.send_with_data(cmd, data, opts).await?)
    }

    pub fn service_status(&self) -> ServiceStatus {
        self.state_ch.service_status()
    }

    pub fn is_registered(&self) -> bool {
        self.state_ch.is_registered(None)
    }

    /// Waits until the registration changes and returns whether the modem is
    /// registered now.
    pub async fn wait_for_registration_change(&self) -> bool {
        self.state_ch.wait_registration_change().await
    }

    /// Queries the registration of every domain and the current operator.
    ///
    /// Only a failed circuit switched query fails the call. The packet
    /// switched state comes from `+CGREG`, or from `+CEREG` when `+CGREG`
    /// does not report a registration.
    pub async fn get_service_status(&self) -> Result<ServiceStatus, Error> {
        self.query_registration(RegType::Creg).await?;

        if let Err(e) = self.query_registration(RegType::Cgreg).await {
            debug!("CGREG query failed: {:?}", e);
        }
        if !self.state_ch.is_registered(None) {
            if let Err(e) = self.query_registration(RegType::Cereg).await {
                debug!("CEREG query failed: {:?}", e);
            }
        }

        let mut status = self.state_ch.service_status();
        match self
            .send_command_with(&get_operator_selection()?, |res| {
                parse_operator_selection(res.line_str(0).ok_or(Error::Parse)?)
            })
            .await
        {
            Ok(op) => {
                status.plmn = op.plmn;
                status.operator_name = op.name;
            }
            Err(e) => debug!("COPS query failed: {:?}", e),
        }

        Ok(status)
    }

    async fn query_registration(&self, reg_type: RegType) -> Result<(), Error> {
        let res = self.send_command(&get_network_registration(reg_type)?).await?;
        let payload = res
            .line_str(0)
            .and_then(|l| strip_prefix(l, reg_type.prefix()))
            .ok_or(Error::Parse)?;

        if let Some(status) = self
            .state_ch
            .apply_registration_line(reg_type, payload, false)?
        {
            self.handler
                .on_network_registration_changed(RegistrationEvent::from(reg_type), &status);
        }
        Ok(())
    }

    /// Returns the network the modem is registered on.
    pub async fn get_registered_network(&self) -> Result<RegisteredNetwork, Error> {
        self.send_command(&set_operator_format(OperatorFormat::Numeric)?)
            .await?;
        let op = self
            .send_command_with(&get_operator_selection()?, |res| {
                parse_operator_selection(res.line_str(0).ok_or(Error::Parse)?)
            })
            .await?;

        let plmn = op.plmn.ok_or(Error::NotRegistered)?;
        if op.rat == RadioAccessTechnology::Invalid {
            return Err(Error::Unknown);
        }

        Ok(RegisteredNetwork { plmn, rat: op.rat })
    }

    pub async fn get_signal_quality(&self) -> Result<SignalInfo, Error> {
        self.send_command_with(&get_signal_quality()?, |res| {
            parse_signal_quality(res.line_str(0).ok_or(Error::Parse)?)
        })
        .await
    }

    /// Reads up to `buf.len()` bytes received on `socket`. Returns the number
    /// of bytes copied, which is 0 if nothing was pending.
    pub async fn socket_recv(&self, socket: u8, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Err(Error::BadParameter);
        }

        let len = buf.len().min(MAX_RECV_DATA_LEN);
        self.send_command_with(&read_socket_data(socket, len)?, |res| {
            let data = socket_data(res)?;
            if data.len() > buf.len() {
                warn!(
                    "Received {} bytes on socket {}, truncating to {}",
                    data.len(),
                    socket,
                    buf.len()
                );
            }
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            Ok(n)
        })
        .await
    }

    /// Writes `data` to `socket`. Returns the number of bytes the modem
    /// accepted, at most [`MAX_SEND_DATA_LEN`].
    pub async fn socket_send(&self, socket: u8, data: &[u8]) -> Result<usize, Error> {
        if data.is_empty() {
            return Err(Error::BadParameter);
        }

        let data = &data[..data.len().min(MAX_SEND_DATA_LEN)];
        let res = self
            .send_command_with_data(
                &write_socket_data(socket, data.len())?,
                data,
                DataSend {
                    prompt: Some(SOCKET_SEND_PROMPT),
                    ..DataSend::default()
                },
            )
            .await?;

        match res.line_str(0) {
            Some(line) => socket_written(line),
            None => Ok(data.len()),
        }
    }
}
