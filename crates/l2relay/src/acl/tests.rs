//! Tests for ACL segmentation

use super::*;
use crate::l2cap::constants::L2CAP_BASIC_HEADER_SIZE;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn expected_continuations(len: usize, mtu: usize) -> usize {
    let first = first_capacity(mtu);
    if len > first {
        (len - first).div_ceil(continuation_capacity(mtu))
    } else {
        0
    }
}

#[test]
fn test_capacities() {
    assert_eq!(START_OVERHEAD, 9);
    assert_eq!(CONTINUATION_OVERHEAD, 5);
    assert_eq!(first_capacity(ACL_MTU), 1015);
    assert_eq!(continuation_capacity(ACL_MTU), 1019);
}

#[test]
fn test_reassembly() {
    for mtu in [ACL_MTU, 64, 27, 10] {
        let first = first_capacity(mtu);
        let cont = continuation_capacity(mtu);
        for len in [0, 1, first - 1, first, first + 1, first + cont, first + cont + 1, 4096] {
            let data = payload(len);
            let fragments: Vec<_> = Segmenter::new(0x0042, 0x0041, &data, mtu).unwrap().collect();

            // Start fragment first, then continuations only
            assert!(fragments[0].is_start());
            assert!(fragments[1..].iter().all(|f| !f.is_start()));
            assert_eq!(fragments.len() - 1, expected_continuations(len, mtu), "len {} mtu {}", len, mtu);

            let reassembled: Vec<u8> = fragments.iter().flat_map(|f| f.data.iter().copied()).collect();
            assert_eq!(reassembled, data, "len {} mtu {}", len, mtu);

            for fragment in &fragments {
                assert!(fragment.to_bytes().len() <= mtu);
                assert_eq!(fragment.acl.handle, 0x0042);
            }
        }
    }
}

#[test]
fn test_start_fragment_headers() {
    let data = payload(2000);
    let start = Segmenter::new(0x0042, 0x0041, &data, ACL_MTU).unwrap().next().unwrap();

    assert_eq!(start.acl.flags, ACL_START);
    assert_eq!(start.acl.dlen as usize, first_capacity(ACL_MTU) + L2CAP_BASIC_HEADER_SIZE);

    // The L2CAP header announces the whole frame
    let l2cap = start.l2cap.unwrap();
    assert_eq!(l2cap.length, 2000);
    assert_eq!(l2cap.channel_id, 0x0041);

    let bytes = start.to_bytes();
    assert_eq!(bytes.len(), ACL_MTU);
    assert_eq!(bytes[0], HCI_ACL_PKT);
    assert_eq!(&bytes[1..5], &[0x42, 0x20, 0xFB, 0x03]); // handle|START, dlen 1019
    assert_eq!(&bytes[5..9], &[0xD0, 0x07, 0x41, 0x00]); // len 2000, cid 0x0041
    assert_eq!(&bytes[9..], &data[..1015]);
}

#[test]
fn test_continuation_length_field() {
    let data = payload(3000);
    let fragments: Vec<_> = Segmenter::new(0x0001, 0x0040, &data, ACL_MTU).unwrap().collect();
    assert_eq!(fragments.len(), 3);

    // Outstanding length before each continuation chunk
    assert_eq!(fragments[1].acl.flags, ACL_CONT);
    assert_eq!(fragments[1].acl.dlen, 3000 - 1015);
    assert_eq!(fragments[1].data.len(), 1019);
    assert_eq!(fragments[2].acl.dlen, 3000 - 1015 - 1019);
    assert_eq!(fragments[2].data.len(), 3000 - 1015 - 1019);

    let bytes = fragments[1].to_bytes();
    assert_eq!(&bytes[..5], &[HCI_ACL_PKT, 0x01, 0x10, 0xC1, 0x07]);
}

#[test]
fn test_small_and_empty_payloads() {
    let data = payload(10);
    let fragments: Vec<_> = Segmenter::new(0x0001, 0x0040, &data, ACL_MTU).unwrap().collect();
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].acl.dlen, 14);
    assert_eq!(fragments[0].data, &data[..]);

    let fragments: Vec<_> = Segmenter::new(0x0001, 0x0040, &[], ACL_MTU).unwrap().collect();
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].acl.dlen as usize, L2CAP_BASIC_HEADER_SIZE);
    assert_eq!(fragments[0].l2cap.unwrap().length, 0);
    assert!(fragments[0].data.is_empty());
}

#[test]
fn test_rejects_bad_input() {
    let data = vec![0u8; u16::MAX as usize + 1];
    assert!(matches!(
        Segmenter::new(0x0001, 0x0040, &data, ACL_MTU),
        Err(Error::PayloadTooLarge(_))
    ));
    assert!(Segmenter::new(0x0001, 0x0040, &[1, 2, 3], START_OVERHEAD).is_err());
}

/// Records fragments, failing the scripted attempts first
#[derive(Default)]
struct ScriptedSink {
    failures: Vec<io::ErrorKind>,
    written: Vec<Vec<u8>>,
    attempts: usize,
}

impl FragmentSink for ScriptedSink {
    fn write_fragment(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        self.attempts += 1;
        if !self.failures.is_empty() {
            return Err(self.failures.remove(0).into());
        }
        let packet: Vec<u8> = bufs.iter().flat_map(|b| b.iter().copied()).collect();
        let n = packet.len();
        self.written.push(packet);
        Ok(n)
    }
}

#[test]
fn test_send_segmented_retries_transient_errors() {
    let data = payload(2500);
    let mut sink = ScriptedSink {
        failures: vec![io::ErrorKind::WouldBlock, io::ErrorKind::Interrupted],
        ..Default::default()
    };

    let count = send_segmented(&mut sink, 0x0042, 0x0041, &data, ACL_MTU).unwrap();

    assert_eq!(count, 3);
    assert_eq!(sink.attempts, 5);
    assert_eq!(sink.written.len(), 3);

    let expected: Vec<Vec<u8>> = Segmenter::new(0x0042, 0x0041, &data, ACL_MTU)
        .unwrap()
        .map(|f| f.to_bytes())
        .collect();
    assert_eq!(sink.written, expected);
}

#[test]
fn test_send_segmented_aborts_on_hard_error() {
    let data = payload(2500);
    let mut sink = ScriptedSink {
        failures: vec![io::ErrorKind::BrokenPipe],
        ..Default::default()
    };

    assert!(send_segmented(&mut sink, 0x0042, 0x0041, &data, ACL_MTU).is_err());
    // Nothing after the failed start fragment
    assert_eq!(sink.attempts, 1);
    assert!(sink.written.is_empty());
}

#[test]
fn test_send_segmented_empty_payload() {
    let mut sink = ScriptedSink::default();

    assert_eq!(send_segmented(&mut sink, 0x0042, 0x0041, &[], ACL_MTU).unwrap(), 1);
    assert_eq!(sink.written, vec![vec![HCI_ACL_PKT, 0x42, 0x20, 0x04, 0x00, 0x00, 0x00, 0x41, 0x00]]);
}
