//! Extraction of VLAN and QoS assignments from backend acceptances.
//!
//! VLAN assignment follows RFC 2868/RFC 3580 tunnel attributes, QoS class
//! assignment follows the RFC 4675 User-Priority-Table attribute. Anything
//! that does not match the required shape exactly is ignored; a malformed
//! attribute never blocks the acceptance itself.

use nas_types::{PriorityClass, VlanId};
use tracing::debug;

pub const ATTR_USER_PRIORITY_TABLE: u8 = 59;
pub const ATTR_TUNNEL_TYPE: u8 = 64;
pub const ATTR_TUNNEL_MEDIUM_TYPE: u8 = 65;
pub const ATTR_TUNNEL_PRIVATE_GROUP_ID: u8 = 81;

const TUNNEL_TYPE_VLAN: u32 = 13;
const TUNNEL_MEDIUM_802: u32 = 6;

/// One attribute from a backend acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub kind: u8,
    pub value: Vec<u8>,
}

impl Attribute {
    pub fn new(kind: u8, value: impl Into<Vec<u8>>) -> Self {
        Attribute { kind, value: value.into() }
    }
}

/// Splits a leading tag octet (0x00-0x1f) from a tagged attribute value.
fn tag_and_rest(value: &[u8]) -> (u8, &[u8]) {
    match value.first() {
        Some(&t) if t <= 0x1f => (t, &value[1..]),
        _ => (0, value),
    }
}

/// A tunnel integer attribute: one tag octet followed by a 24-bit value.
fn tunnel_int(value: &[u8]) -> Option<(u8, u32)> {
    if value.len() != 4 || value[0] > 0x1f {
        return None;
    }
    let v = u32::from(value[1]) << 16 | u32::from(value[2]) << 8 | u32::from(value[3]);
    Some((value[0], v))
}

/// Extracts the QoS class from a User-Priority-Table attribute.
///
/// The attribute must be exactly eight octets, each the same ASCII digit
/// '0'..'7'. Any other shape yields no assignment.
pub fn extract_qos_class(attrs: &[Attribute]) -> Option<PriorityClass> {
    let attr = attrs.iter().find(|a| a.kind == ATTR_USER_PRIORITY_TABLE)?;
    let value = &attr.value;
    if value.len() != 8 {
        debug!(len = value.len(), "priority table attribute has wrong length");
        return None;
    }
    let first = value[0];
    if !(b'0'..=b'7').contains(&first) || value.iter().any(|&b| b != first) {
        debug!("priority table attribute is not eight identical digits");
        return None;
    }
    PriorityClass::new(first - b'0').ok()
}

/// Extracts a VLAN assignment from RFC 2868 tunnel attributes.
///
/// A complete assignment is a Tunnel-Type of VLAN, a Tunnel-Medium-Type of
/// IEEE-802, and a Tunnel-Private-Group-ID carrying the VLAN id in ASCII
/// digits, all three under the same tag. Group ids that are VLAN names
/// rather than numbers are skipped.
pub fn extract_vlan(attrs: &[Attribute]) -> Option<VlanId> {
    for tt in attrs.iter().filter(|a| a.kind == ATTR_TUNNEL_TYPE) {
        let Some((tag, value)) = tunnel_int(&tt.value) else { continue };
        if value != TUNNEL_TYPE_VLAN {
            continue;
        }
        let medium_ok = attrs
            .iter()
            .filter(|a| a.kind == ATTR_TUNNEL_MEDIUM_TYPE)
            .filter_map(|a| tunnel_int(&a.value))
            .any(|(t, v)| t == tag && v == TUNNEL_MEDIUM_802);
        if !medium_ok {
            continue;
        }
        for gid in attrs.iter().filter(|a| a.kind == ATTR_TUNNEL_PRIVATE_GROUP_ID) {
            let (gtag, digits) = tag_and_rest(&gid.value);
            if gtag != tag || digits.is_empty() {
                continue;
            }
            if !digits.iter().all(|b| b.is_ascii_digit()) {
                debug!("tunnel group id is not numeric, skipping");
                continue;
            }
            let Ok(text) = std::str::from_utf8(digits) else { continue };
            let Ok(num) = text.parse::<u16>() else { continue };
            if let Ok(vid) = VlanId::new(num) {
                return Some(vid);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tunnel(kind: u8, tag: u8, value: u32) -> Attribute {
        Attribute::new(
            kind,
            vec![tag, (value >> 16) as u8, (value >> 8) as u8, value as u8],
        )
    }

    fn group_id(tag: u8, text: &str) -> Attribute {
        let mut v = vec![tag];
        v.extend_from_slice(text.as_bytes());
        Attribute::new(ATTR_TUNNEL_PRIVATE_GROUP_ID, v)
    }

    #[test]
    fn test_vlan_complete_assignment() {
        let attrs = vec![
            tunnel(ATTR_TUNNEL_TYPE, 1, TUNNEL_TYPE_VLAN),
            tunnel(ATTR_TUNNEL_MEDIUM_TYPE, 1, TUNNEL_MEDIUM_802),
            group_id(1, "20"),
        ];
        assert_eq!(extract_vlan(&attrs), Some(VlanId::new(20).unwrap()));
    }

    #[test]
    fn test_vlan_untagged_group_id() {
        // Group id without a tag octet still matches tag 0 tunnel attrs.
        let attrs = vec![
            tunnel(ATTR_TUNNEL_TYPE, 0, TUNNEL_TYPE_VLAN),
            tunnel(ATTR_TUNNEL_MEDIUM_TYPE, 0, TUNNEL_MEDIUM_802),
            Attribute::new(ATTR_TUNNEL_PRIVATE_GROUP_ID, b"100".to_vec()),
        ];
        assert_eq!(extract_vlan(&attrs), Some(VlanId::new(100).unwrap()));
    }

    #[test]
    fn test_vlan_tag_mismatch() {
        let attrs = vec![
            tunnel(ATTR_TUNNEL_TYPE, 1, TUNNEL_TYPE_VLAN),
            tunnel(ATTR_TUNNEL_MEDIUM_TYPE, 2, TUNNEL_MEDIUM_802),
            group_id(1, "20"),
        ];
        assert_eq!(extract_vlan(&attrs), None);
    }

    #[test]
    fn test_vlan_wrong_tunnel_type() {
        let attrs = vec![
            tunnel(ATTR_TUNNEL_TYPE, 1, 7),
            tunnel(ATTR_TUNNEL_MEDIUM_TYPE, 1, TUNNEL_MEDIUM_802),
            group_id(1, "20"),
        ];
        assert_eq!(extract_vlan(&attrs), None);
    }

    #[test]
    fn test_vlan_name_skipped() {
        let attrs = vec![
            tunnel(ATTR_TUNNEL_TYPE, 1, TUNNEL_TYPE_VLAN),
            tunnel(ATTR_TUNNEL_MEDIUM_TYPE, 1, TUNNEL_MEDIUM_802),
            group_id(1, "engineering"),
        ];
        assert_eq!(extract_vlan(&attrs), None);
    }

    #[test]
    fn test_vlan_out_of_range() {
        let attrs = vec![
            tunnel(ATTR_TUNNEL_TYPE, 1, TUNNEL_TYPE_VLAN),
            tunnel(ATTR_TUNNEL_MEDIUM_TYPE, 1, TUNNEL_MEDIUM_802),
            group_id(1, "4095"),
        ];
        assert_eq!(extract_vlan(&attrs), None);
        let attrs = vec![
            tunnel(ATTR_TUNNEL_TYPE, 1, TUNNEL_TYPE_VLAN),
            tunnel(ATTR_TUNNEL_MEDIUM_TYPE, 1, TUNNEL_MEDIUM_802),
            group_id(1, "0"),
        ];
        assert_eq!(extract_vlan(&attrs), None);
    }

    #[test]
    fn test_vlan_second_group_id_wins_when_first_is_name() {
        let attrs = vec![
            tunnel(ATTR_TUNNEL_TYPE, 1, TUNNEL_TYPE_VLAN),
            tunnel(ATTR_TUNNEL_MEDIUM_TYPE, 1, TUNNEL_MEDIUM_802),
            group_id(1, "lab"),
            group_id(1, "30"),
        ];
        assert_eq!(extract_vlan(&attrs), Some(VlanId::new(30).unwrap()));
    }

    #[test]
    fn test_qos_valid() {
        let attrs = vec![Attribute::new(ATTR_USER_PRIORITY_TABLE, b"33333333".to_vec())];
        assert_eq!(extract_qos_class(&attrs), Some(PriorityClass::new(3).unwrap()));
    }

    #[test]
    fn test_qos_wrong_length() {
        let attrs = vec![Attribute::new(ATTR_USER_PRIORITY_TABLE, b"3333333".to_vec())];
        assert_eq!(extract_qos_class(&attrs), None);
    }

    #[test]
    fn test_qos_mixed_digits() {
        let attrs = vec![Attribute::new(ATTR_USER_PRIORITY_TABLE, b"33333334".to_vec())];
        assert_eq!(extract_qos_class(&attrs), None);
    }

    #[test]
    fn test_qos_out_of_range_digit() {
        let attrs = vec![Attribute::new(ATTR_USER_PRIORITY_TABLE, b"88888888".to_vec())];
        assert_eq!(extract_qos_class(&attrs), None);
    }

    #[test]
    fn test_qos_absent() {
        assert_eq!(extract_qos_class(&[]), None);
    }
}
