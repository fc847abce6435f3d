//! Wi-Fi Display information element encoding.
//!
//! The WFD IE is a sequence of length-tagged subelements carried in beacon
//! and probe frames. Only the Device Information subelement is published
//! today; the encoder takes any subelement so further ones can be added
//! without touching the wire format.

use crate::types::Capability;

/// TCP port peers use for WFD session management (RTSP).
pub const SESSION_CONTROL_PORT: u16 = 7236;

/// Throughput we advertise, in Mbps.
pub const MAXIMUM_THROUGHPUT_MBPS: u16 = 50;

const DEVICE_TYPE_MASK: u16 = 0x0003;
const SESSION_AVAILABLE: u16 = 1 << 4;

/// WFD subelement identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubelementId {
    DeviceInformation = 0,
    AssociatedBssid = 1,
    AudioFormats = 2,
    VideoFormats = 3,
    Video3dFormats = 4,
    ContentProtection = 5,
    CoupledSinkInformation = 6,
    ExtendedCapability = 7,
    LocalIpAddress = 8,
    SessionInformation = 9,
    AlternativeMac = 10,
}

/// Device type bits of the Device Information subelement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum WfdDeviceType {
    Source = 0b00,
    PrimarySink = 0b01,
    SecondarySink = 0b10,
    DualRole = 0b11,
}

impl WfdDeviceType {
    /// Device type advertised for a capability set. An endpoint without any
    /// capability still announces itself as a source.
    pub fn from_capabilities(capabilities: &[Capability]) -> Self {
        let has_source = capabilities.contains(&Capability::Source);
        let has_sink = capabilities.contains(&Capability::Sink);

        match (has_source, has_sink) {
            (true, true) => Self::DualRole,
            (false, true) => Self::PrimarySink,
            _ => Self::Source,
        }
    }
}

/// Payload of the Device Information subelement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInformation {
    pub device_type: WfdDeviceType,
    pub session_available: bool,
    pub control_port: u16,
    pub max_throughput: u16,
}

impl DeviceInformation {
    pub fn new(device_type: WfdDeviceType, session_available: bool) -> Self {
        Self {
            device_type,
            session_available,
            control_port: SESSION_CONTROL_PORT,
            max_throughput: MAXIMUM_THROUGHPUT_MBPS,
        }
    }

    fn field1(&self) -> u16 {
        let mut bits = self.device_type as u16 & DEVICE_TYPE_MASK;
        if self.session_available {
            bits |= SESSION_AVAILABLE;
        }
        bits
    }

    fn encode(&self) -> [u8; 6] {
        let field1 = self.field1().to_be_bytes();
        let port = self.control_port.to_be_bytes();
        let throughput = self.max_throughput.to_be_bytes();
        [
            field1[0],
            field1[1],
            port[0],
            port[1],
            throughput[0],
            throughput[1],
        ]
    }
}

/// A WFD information element under construction.
#[derive(Debug, Default)]
pub struct InformationElement {
    subelements: Vec<(SubelementId, Vec<u8>)>,
}

impl InformationElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device_information(&mut self, info: DeviceInformation) {
        self.add_subelement(SubelementId::DeviceInformation, info.encode().to_vec());
    }

    pub fn add_subelement(&mut self, id: SubelementId, payload: Vec<u8>) {
        self.subelements.push((id, payload));
    }

    /// Serializes all subelements: one id byte, big-endian u16 length, then
    /// the payload, concatenated in insertion order.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (id, payload) in &self.subelements {
            bytes.push(*id as u8);
            bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
            bytes.extend_from_slice(payload);
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_information_ie(device_type: WfdDeviceType, available: bool) -> Vec<u8> {
        let mut ie = InformationElement::new();
        ie.add_device_information(DeviceInformation::new(device_type, available));
        ie.serialize()
    }

    #[test]
    fn source_available_vector() {
        let bytes = device_information_ie(WfdDeviceType::Source, true);

        assert_eq!(
            bytes,
            [0x00, 0x00, 0x06, 0x00, 0x10, 0x1C, 0x44, 0x00, 0x32]
        );
    }

    #[test]
    fn connected_source_clears_availability() {
        let bytes = device_information_ie(WfdDeviceType::Source, false);

        assert_eq!(
            bytes,
            [0x00, 0x00, 0x06, 0x00, 0x00, 0x1C, 0x44, 0x00, 0x32]
        );
    }

    #[test]
    fn dual_role_sets_both_type_bits() {
        let bytes = device_information_ie(WfdDeviceType::DualRole, true);

        assert_eq!(bytes[3..5], [0x00, 0x13]);
    }

    #[test]
    fn serialization_is_deterministic() {
        let first = device_information_ie(WfdDeviceType::PrimarySink, true);
        let second = device_information_ie(WfdDeviceType::PrimarySink, true);

        assert_eq!(first, second);
    }

    #[test]
    fn capability_mapping() {
        use Capability::*;

        assert_eq!(
            WfdDeviceType::from_capabilities(&[Source]),
            WfdDeviceType::Source
        );
        assert_eq!(
            WfdDeviceType::from_capabilities(&[Sink]),
            WfdDeviceType::PrimarySink
        );
        assert_eq!(
            WfdDeviceType::from_capabilities(&[Source, Sink]),
            WfdDeviceType::DualRole
        );
        assert_eq!(WfdDeviceType::from_capabilities(&[]), WfdDeviceType::Source);
    }

    #[test]
    fn subelements_concatenate_in_order() {
        let mut ie = InformationElement::new();
        ie.add_subelement(SubelementId::ExtendedCapability, vec![0xAB, 0xCD]);
        ie.add_device_information(DeviceInformation::new(WfdDeviceType::Source, true));

        let bytes = ie.serialize();

        assert_eq!(bytes[0], SubelementId::ExtendedCapability as u8);
        assert_eq!(bytes[1..3], [0x00, 0x02]);
        assert_eq!(bytes[5], SubelementId::DeviceInformation as u8);
        assert_eq!(bytes.len(), 5 + 9);
    }
}
