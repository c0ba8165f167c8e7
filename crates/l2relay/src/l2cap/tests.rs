//! Tests for the L2CAP implementation

#[cfg(test)]
mod tests {
    use super::super::constants::*;
    use super::super::packet::*;

    #[test]
    fn test_l2cap_header() {
        // Create a header
        let header = L2capHeader::new(10, 0x0040);

        // Check values
        assert_eq!(header.length, 10);
        assert_eq!(header.channel_id, 0x0040);

        // Serialize and parse
        let bytes = header.to_bytes();
        assert_eq!(bytes, [0x0A, 0x00, 0x40, 0x00]);
        let parsed = L2capHeader::parse(&bytes).unwrap();

        // Check parsed values
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_l2cap_header_too_short() {
        assert!(L2capHeader::parse(&[]).is_none());
        assert!(L2capHeader::parse(&[0x0A, 0x00, 0x40]).is_none());
        assert_eq!(L2CAP_BASIC_HEADER_SIZE, 4);
    }
}
