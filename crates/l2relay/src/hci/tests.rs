//! Unit tests for HCI packet parsing and serialization

use super::constants::*;
use super::packet::*;

#[test]
fn test_hci_command_serialization() {
    // Authentication Requested
    let command = HciCommand::AuthenticationRequested { handle: 0x002A };
    let packet = command.to_packet();

    assert_eq!(packet[0], HCI_COMMAND_PKT);

    let opcode = u16::from_le_bytes([packet[1], packet[2]]);
    assert_eq!(opcode, 0x0411); // OGF_LINK_CTL << 10 | OCF_AUTH_REQUESTED
    assert_eq!(packet[3], 2);
    assert_eq!(u16::from_le_bytes([packet[4], packet[5]]), 0x002A);

    // Set Connection Encryption
    let command = HciCommand::SetConnectionEncryption {
        handle: 0x002A,
        enable: true,
    };
    let packet = command.to_packet();

    assert_eq!(u16::from_le_bytes([packet[1], packet[2]]), 0x0413);
    assert_eq!(packet[3], 3);
    assert_eq!(&packet[4..], &[0x2A, 0x00, 0x01]);

    // Write Class of Device, 24 bits
    let command = HciCommand::WriteClassOfDevice { class: 0x000508 };
    let packet = command.to_packet();

    assert_eq!(u16::from_le_bytes([packet[1], packet[2]]), 0x0C24);
    assert_eq!(packet[3], 3);
    assert_eq!(&packet[4..], &[0x08, 0x05, 0x00]);
}

#[test]
fn test_link_key_commands() {
    let bd_addr = [0x58, 0xAA, 0x0F, 0xDC, 0x1B, 0x00];

    let command = HciCommand::WriteStoredLinkKey {
        bd_addr,
        key: [0u8; LINK_KEY_SIZE],
    };
    let packet = command.to_packet();

    assert_eq!(u16::from_le_bytes([packet[1], packet[2]]), 0x0C11);
    assert_eq!(packet[3] as usize, 1 + 6 + LINK_KEY_SIZE);
    assert_eq!(packet[4], 1); // Num_Keys_To_Write
    assert_eq!(&packet[5..11], &bd_addr);
    assert!(packet[11..].iter().all(|&b| b == 0));

    let command = HciCommand::DeleteStoredLinkKey {
        bd_addr,
        delete_all: false,
    };
    let packet = command.to_packet();

    assert_eq!(u16::from_le_bytes([packet[1], packet[2]]), 0x0C12);
    assert_eq!(packet[3], 7);
    assert_eq!(&packet[4..10], &bd_addr);
    assert_eq!(packet[10], 0);
}

#[test]
fn test_hci_event_parsing() {
    // Command Complete for Write Class of Device
    let data = [
        EVT_CMD_COMPLETE, // Event code
        4,                // Parameter length
        1,                // Num_HCI_Command_Packets
        0x24,             // Command_Opcode (low byte)
        0x0C,             // Command_Opcode (high byte)
        0x00,             // Status
    ];

    let event = HciEvent::parse(&data).unwrap();

    assert_eq!(event.event_code, EVT_CMD_COMPLETE);
    assert_eq!(event.parameter_total_length, 4);
    assert_eq!(event.parameters, vec![1, 0x24, 0x0C, 0x00]);
    assert_eq!(event.command_opcode(), Some(opcode_pack(OGF_HOST_CTL, OCF_WRITE_CLASS_OF_DEV)));
    assert_eq!(event.return_parameters(), Some(&[0x00][..]));
    assert_eq!(event.status(), Some(0x00));

    // Command Status rejecting Authentication Requested
    let data = [EVT_CMD_STATUS, 4, 0x12, 1, 0x11, 0x04];
    let event = HciEvent::parse(&data).unwrap();

    assert_eq!(event.command_opcode(), Some(0x0411));
    assert_eq!(event.status(), Some(0x12));
    assert!(event.return_parameters().is_none());

    // Authentication Complete
    let data = [EVT_AUTH_COMPLETE, 3, 0x00, 0x2A, 0x00];
    let event = HciEvent::parse(&data).unwrap();

    assert_eq!(event.status(), Some(0x00));
    assert_eq!(event.connection_handle(), Some(0x002A));
    assert!(event.command_opcode().is_none());

    // Invalid data tests
    assert!(HciEvent::parse(&[]).is_none()); // Empty data
    assert!(HciEvent::parse(&[EVT_CMD_COMPLETE, 10, 1, 2]).is_none()); // Too short for parameter length
}

#[test]
fn test_acl_header() {
    let header = AclHeader::new(0x0ABC, ACL_START, 0x0100);
    let bytes = header.to_bytes();

    // Handle in the low 12 bits, boundary flag above it
    assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), 0x2ABC);
    assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 0x0100);
    assert_eq!(AclHeader::parse(&bytes), Some(header));

    // Handles wider than 12 bits do not leak into the flags
    assert_eq!(acl_handle_pack(0xFFFF, ACL_CONT), 0x1FFF);

    assert!(AclHeader::parse(&bytes[..3]).is_none());
}
