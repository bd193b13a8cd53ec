//! RFCOMM platform for Bluetooth connections via BlueZ
//!
//! The normal open asks BlueZ to connect the serial service by UUID, which
//! resolves the service channel from the device's SDP record. The fallback
//! skips the lookup and dials a fixed RFCOMM channel.

use crate::config::BluetoothConfig;
use crate::transport::traits::{BoxedStream, RfcommPlatform};
use anyhow::Context;
use async_trait::async_trait;
use bluer::rfcomm::{Profile, Role, SocketAddr as RfcommAddr, Stream as RfcommStream};
use bluer::{Address, Session, Uuid};
use futures::StreamExt;
use link_shared::RemoteEndpoint;
use std::io;
use tracing::{debug, info};

/// RFCOMM platform opening streams to paired serial devices
pub struct BluerPlatform {
    /// Serial service resolved by the normal open
    service_uuid: Uuid,
    /// Channel used by the fallback open
    fallback_channel: u8,
}

impl BluerPlatform {
    /// Create a platform from the Bluetooth configuration
    pub fn new(config: &BluetoothConfig) -> anyhow::Result<Self> {
        let service_uuid = Uuid::parse_str(&config.service_uuid)
            .with_context(|| format!("Invalid bluetooth.service_uuid: {}", config.service_uuid))?;

        Ok(Self {
            service_uuid,
            fallback_channel: config.fallback_channel,
        })
    }

    /// Connect the serial service through a client profile registration
    async fn open_service(&self, endpoint: &RemoteEndpoint) -> io::Result<BoxedStream> {
        let target = parse_address(&endpoint.address)?;
        info!("[BT] Connecting to {} service {}", endpoint, self.service_uuid);

        let session = Session::new().await.map_err(bt_error)?;
        let adapter = session.default_adapter().await.map_err(bt_error)?;
        let device = adapter.device(target).map_err(bt_error)?;

        let profile = Profile {
            uuid: self.service_uuid,
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let mut requests = session.register_profile(profile).await.map_err(bt_error)?;

        // BlueZ hands the socket to the profile handle once the connect succeeds
        let connect = device.connect_profile(&self.service_uuid);
        tokio::pin!(connect);
        let mut connected = false;

        loop {
            tokio::select! {
                result = &mut connect, if !connected => {
                    result.map_err(bt_error)?;
                    connected = true;
                }
                request = requests.next() => {
                    let request = request.ok_or_else(|| {
                        io::Error::new(io::ErrorKind::ConnectionAborted, "profile registration closed")
                    })?;
                    if request.device() != target {
                        // Dropping the request rejects it
                        debug!("[BT] Ignoring profile connection from {}", request.device());
                        continue;
                    }
                    let stream = request.accept().map_err(bt_error)?;
                    info!("[BT] Connected to {}", endpoint);
                    return Ok(Box::new(stream));
                }
            }
        }
    }

    /// Dial a fixed RFCOMM channel
    async fn open_channel(&self, endpoint: &RemoteEndpoint, channel: u8) -> io::Result<BoxedStream> {
        let target = parse_address(&endpoint.address)?;
        let socket_addr = RfcommAddr::new(target, channel);
        info!("[BT] Connecting to {} channel {}", endpoint, channel);

        let stream = RfcommStream::connect(socket_addr).await?;

        info!("[BT] Connected to {}", endpoint);
        Ok(Box::new(stream))
    }
}

/// Parse a MAC address string
pub fn parse_address(address: &str) -> io::Result<Address> {
    address
        .parse::<Address>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{address}: {e}")))
}

fn bt_error(e: bluer::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[async_trait]
impl RfcommPlatform for BluerPlatform {
    async fn open_normal(&self, endpoint: &RemoteEndpoint) -> io::Result<BoxedStream> {
        self.open_service(endpoint).await
    }

    async fn open_fallback(&self, endpoint: &RemoteEndpoint) -> io::Result<BoxedStream> {
        self.open_channel(endpoint, self.fallback_channel).await
    }

    fn cancel_discovery(&self) {
        // BlueZ ends a discovery session when its owning stream is dropped;
        // this platform never starts one.
        debug!("[BT] No discovery session owned by this platform");
    }

    fn name(&self) -> &'static str {
        "Bluetooth"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_shared::defaults;

    #[test]
    fn test_parse_address() {
        let addr = parse_address("00:11:22:33:44:55").unwrap();
        assert_eq!(addr, Address::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]));
    }

    #[test]
    fn test_parse_invalid_address() {
        let err = parse_address("not-a-mac").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_normal_open_targets_serial_service() {
        let platform = BluerPlatform::new(&BluetoothConfig::default()).unwrap();
        assert_eq!(
            platform.service_uuid,
            Uuid::parse_str(defaults::SPP_SERVICE_UUID).unwrap()
        );
        assert_eq!(platform.fallback_channel, defaults::FALLBACK_RFCOMM_CHANNEL);
    }

    #[test]
    fn test_rejects_malformed_service_uuid() {
        let config = BluetoothConfig {
            service_uuid: "not-a-uuid".into(),
            ..Default::default()
        };
        assert!(BluerPlatform::new(&config).is_err());
    }
}
