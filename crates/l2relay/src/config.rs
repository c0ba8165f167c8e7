//! Relay configuration

use crate::addr::BdAddr;
use crate::l2cap::PSM;
use std::time::Duration;

/// Class of device advertised by the local adapter: peripheral, gamepad
pub const DEFAULT_DEVICE_CLASS: u32 = 0x000508;

/// Largest single L2CAP frame read from either side
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Console address
    pub master: BdAddr,
    /// Adapter used for outgoing connects and HCI commands; any when `None`
    pub local: Option<BdAddr>,
    pub device_class: u32,
    pub psms: Vec<PSM>,
    pub buffer_size: usize,
    /// Upper bound on one readiness wait; forever when `None`
    pub poll_timeout: Option<Duration>,
    /// Hex-dump every relayed frame at debug level
    pub dump_payloads: bool,
}

impl RelayConfig {
    pub fn new(master: BdAddr) -> Self {
        Self {
            master,
            local: None,
            device_class: DEFAULT_DEVICE_CLASS,
            psms: PSM::ALL.to_vec(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            poll_timeout: None,
            dump_payloads: false,
        }
    }

    pub fn with_local(mut self, local: BdAddr) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_device_class(mut self, class: u32) -> Self {
        self.device_class = class;
        self
    }

    pub fn with_psms(mut self, psms: &[PSM]) -> Self {
        self.psms = psms.to_vec();
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    pub fn with_payload_dump(mut self, enabled: bool) -> Self {
        self.dump_payloads = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let master: BdAddr = "00:19:C1:5A:CB:10".parse().unwrap();
        let config = RelayConfig::new(master);

        assert_eq!(config.master, master);
        assert_eq!(config.local, None);
        assert_eq!(config.device_class, 0x508);
        assert_eq!(config.psms, PSM::ALL.to_vec());
        assert_eq!(config.buffer_size, 4096);
        assert_eq!(config.poll_timeout, None);
        assert!(!config.dump_payloads);
    }

    #[test]
    fn test_builder() {
        let master: BdAddr = "00:19:C1:5A:CB:10".parse().unwrap();
        let local: BdAddr = "00:1B:DC:0F:AA:58".parse().unwrap();
        let config = RelayConfig::new(master)
            .with_local(local)
            .with_device_class(0x2508)
            .with_psms(&[PSM::HID_CONTROL])
            .with_poll_timeout(Duration::from_millis(50))
            .with_payload_dump(true);

        assert_eq!(config.local, Some(local));
        assert_eq!(config.device_class, 0x2508);
        assert_eq!(config.psms, vec![PSM::HID_CONTROL]);
        assert_eq!(config.poll_timeout, Some(Duration::from_millis(50)));
        assert!(config.dump_payloads);
    }
}
