//! WPS primary device type selection.
//!
//! The identifier sent through the supplicant's device configuration is the
//! 16 hex digit concatenation of category, OUI and subcategory. Categories
//! and subcategories follow the WPS registry; the chassis string reported by
//! hostname1 decides which entry we claim.

const WPS_OUI: &str = "0050F204";
const CATEGORY_COMPUTER: &str = "0001";
const CATEGORY_TELEPHONE: &str = "000A";

/// Primary device type for a hostname1 chassis string.
pub fn primary_device_type(chassis: &str) -> String {
    let (category, sub_category) = match chassis {
        "handset" => (CATEGORY_TELEPHONE, "0005"),
        "vm" | "container" => (CATEGORY_COMPUTER, "0001"),
        "server" => (CATEGORY_COMPUTER, "0002"),
        "laptop" => (CATEGORY_COMPUTER, "0005"),
        "desktop" => (CATEGORY_COMPUTER, "0006"),
        "tablet" => (CATEGORY_COMPUTER, "0009"),
        "watch" => (CATEGORY_COMPUTER, "00FF"),
        _ => (CATEGORY_COMPUTER, "0000"),
    };

    format!("{category}{WPS_OUI}{sub_category}")
}

/// Binary form of a primary device type, as the supplicant wants it on the
/// bus. `None` when the string is not 16 hex digits.
pub(crate) fn primary_device_type_bytes(device_type: &str) -> Option<[u8; 8]> {
    if device_type.len() != 16 {
        return None;
    }

    let mut bytes = [0u8; 8];
    for (index, chunk) in device_type.as_bytes().chunks_exact(2).enumerate() {
        let pair = std::str::from_utf8(chunk).ok()?;
        bytes[index] = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handset_is_a_telephone() {
        assert_eq!(primary_device_type("handset"), "000A0050F2040005");
    }

    #[test]
    fn computer_chassis_table() {
        assert_eq!(primary_device_type("vm"), "00010050F2040001");
        assert_eq!(primary_device_type("container"), "00010050F2040001");
        assert_eq!(primary_device_type("server"), "00010050F2040002");
        assert_eq!(primary_device_type("laptop"), "00010050F2040005");
        assert_eq!(primary_device_type("desktop"), "00010050F2040006");
        assert_eq!(primary_device_type("tablet"), "00010050F2040009");
        assert_eq!(primary_device_type("watch"), "00010050F20400FF");
    }

    #[test]
    fn unknown_chassis_has_no_subcategory() {
        assert_eq!(primary_device_type(""), "00010050F2040000");
        assert_eq!(primary_device_type("toaster"), "00010050F2040000");
    }

    #[test]
    fn binary_form_round_trips() {
        let bytes = primary_device_type_bytes("000A0050F2040005");

        assert_eq!(
            bytes,
            Some([0x00, 0x0A, 0x00, 0x50, 0xF2, 0x04, 0x00, 0x05])
        );
        assert_eq!(primary_device_type_bytes("000A"), None);
        assert_eq!(primary_device_type_bytes("zz0A0050F2040005"), None);
    }
}
