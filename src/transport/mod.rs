//! Platform transports for opening the serial link
//!
//! - `tcp`: TCP simulation for development, always available
//! - `rfcomm`: BlueZ RFCOMM, behind the `bluetooth` feature

#[cfg(feature = "bluetooth")]
pub mod rfcomm;
pub mod tcp;
pub mod traits;

#[cfg(feature = "bluetooth")]
pub use rfcomm::BluerPlatform;
pub use tcp::TcpPlatform;
pub use traits::{BoxedStream, RfcommPlatform, TransportStream};

use crate::config::{BluetoothConfig, BluetoothMode};
use std::sync::Arc;

/// Build the platform selected by the Bluetooth configuration
pub fn platform_from_config(config: &BluetoothConfig) -> anyhow::Result<Arc<dyn RfcommPlatform>> {
    match config.mode {
        BluetoothMode::TcpSimulation => {
            let platform = match &config.tcp_fallback_address {
                Some(address) => TcpPlatform::with_fallback(address.clone()),
                None => TcpPlatform::new(),
            };
            Ok(Arc::new(platform))
        }
        #[cfg(feature = "bluetooth")]
        BluetoothMode::Rfcomm => Ok(Arc::new(BluerPlatform::new(config)?)),
        #[cfg(not(feature = "bluetooth"))]
        BluetoothMode::Rfcomm => {
            anyhow::bail!("RFCOMM mode requires building with the `bluetooth` feature")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_simulation_platform() {
        let platform = platform_from_config(&BluetoothConfig::default()).unwrap();
        assert_eq!(platform.name(), "TCP simulation");
    }

    #[cfg(not(feature = "bluetooth"))]
    #[test]
    fn test_rfcomm_requires_feature() {
        let config = BluetoothConfig {
            mode: BluetoothMode::Rfcomm,
            ..Default::default()
        };
        assert!(platform_from_config(&config).is_err());
    }
}
