//! Tests for the record codec
//!
//! These tests verify:
//! - CRC-32 matches the standard check value
//! - Header layout is little-endian at fixed offsets
//! - Payload size limits
//! - Decoding rejects bad magic and implausible sizes
//! - Sector classification

use flashblob::codec::{
    classify, crc32, decode_header, decode_record, encode_record, RecordHeader, RecordState,
    MAGIC, RECORD_HEADER_SIZE,
};
use flashblob::FlashBlobError;

// =============================================================================
// Helper Functions
// =============================================================================

const SECTOR: usize = 4096;

fn encode(payload: &[u8]) -> Vec<u8> {
    let header = RecordHeader::new(7, 1234, payload, 3);
    encode_record(&header, payload, SECTOR).unwrap().to_vec()
}

// =============================================================================
// CRC Tests
// =============================================================================

#[test]
fn test_crc32_check_value() {
    assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
}

#[test]
fn test_crc32_empty() {
    assert_eq!(crc32(b""), 0);
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_header_layout() {
    let sector = encode(b"abc");

    assert_eq!(sector.len(), SECTOR);
    assert_eq!(&sector[0..4], &MAGIC.to_le_bytes());
    assert_eq!(&sector[4..8], &1234u32.to_le_bytes());
    assert_eq!(&sector[8..12], &7u32.to_le_bytes());
    assert_eq!(&sector[12..16], &3u32.to_le_bytes());
    assert_eq!(&sector[16..20], &crc32(b"abc").to_le_bytes());
    assert_eq!(&sector[20..24], &3u32.to_le_bytes());
    assert_eq!(&sector[24..27], b"abc");
    assert!(sector[27..].iter().all(|&b| b == 0));
}

#[test]
fn test_max_payload_fits() {
    let payload = vec![0x5A; SECTOR - RECORD_HEADER_SIZE];

    let sector = encode(&payload);
    let (header, decoded) = decode_record(&sector).unwrap();

    assert_eq!(header.payload_size as usize, 4072);
    assert_eq!(decoded, payload.as_slice());
}

#[test]
fn test_oversized_payload_rejected() {
    let payload = vec![0u8; SECTOR - RECORD_HEADER_SIZE + 1];
    let header = RecordHeader::new(1, 0, &payload, 0);

    let result = encode_record(&header, &payload, SECTOR);

    assert!(matches!(
        result,
        Err(FlashBlobError::InvalidSize { size: 4073, max: 4072 })
    ));
}

#[test]
fn test_empty_payload_rejected() {
    let header = RecordHeader::new(1, 0, b"", 0);

    let result = encode_record(&header, b"", SECTOR);

    assert!(matches!(result, Err(FlashBlobError::InvalidSize { size: 0, .. })));
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_returns_exact_payload() {
    let sector = encode(b"Temp_Test");

    let (header, payload) = decode_record(&sector).unwrap();

    assert_eq!(payload, b"Temp_Test");
    assert_eq!(header.type_id, 7);
    assert_eq!(header.timestamp, 1234);
    assert_eq!(header.logical_index, 3);
    assert!(header.is_live());
}

#[test]
fn test_decode_rejects_tombstone() {
    let mut sector = encode(b"gone");
    sector[0..4].fill(0);

    assert!(decode_record(&sector).is_none());
    // The header itself still parses
    assert_eq!(decode_header(&sector).unwrap().magic, 0);
}

#[test]
fn test_decode_rejects_oversized_length() {
    let mut sector = encode(b"abc");
    sector[12..16].copy_from_slice(&5000u32.to_le_bytes());

    assert!(decode_record(&sector).is_none());
}

#[test]
fn test_decode_header_too_short() {
    assert!(decode_header(&[0u8; 10]).is_none());
}

// =============================================================================
// Classification Tests
// =============================================================================

#[test]
fn test_classify_states() {
    let max = SECTOR - RECORD_HEADER_SIZE;

    let live = encode(b"x");
    assert_eq!(classify(&live, max), RecordState::Live);

    let mut tomb = live.clone();
    tomb[0..4].fill(0);
    assert_eq!(classify(&tomb, max), RecordState::Tombstoned);

    let erased = vec![0xFF; SECTOR];
    assert_eq!(classify(&erased, max), RecordState::Erased);

    let mut garbage = live.clone();
    garbage[0..4].fill(0xAA);
    assert_eq!(classify(&garbage, max), RecordState::Corrupt);

    let mut zero_len = live;
    zero_len[12..16].fill(0);
    assert_eq!(classify(&zero_len, max), RecordState::Corrupt);
}
