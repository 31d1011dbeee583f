use crate::cd::SUBCODE_SIZE;
use crate::cd::error::{CdError, CdResult};
use crate::cd::msf::{Msf, from_bcd, to_bcd};
use crc::{CRC_16_GSM, Crc};
use serde::{Deserialize, Serialize};

const Q_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_GSM);

pub const CHANNEL_SIZE: usize = SUBCODE_SIZE / 8;
pub const LEAD_OUT_TRACK: u8 = 0xAA;

/// How the 96 subchannel bytes of a sector are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SubchannelType {
    #[default]
    None,
    /// Channel separated: 12 bytes of P, then Q, through W.
    Raw,
    /// As read from the drive: one byte per symbol, bit 7 is P through bit 0 for W.
    Interleaved,
}

fn check_length(data: &[u8]) -> CdResult<()> {
    if data.len() % SUBCODE_SIZE != 0 {
        return Err(CdError::InvalidSubchannelLength {
            expected: SUBCODE_SIZE,
            actual: data.len(),
        });
    }
    Ok(())
}

pub fn deinterleave(interleaved: &[u8]) -> CdResult<Vec<u8>> {
    check_length(interleaved)?;
    let mut raw = vec![0u8; interleaved.len()];
    for (src, dst) in interleaved
        .chunks_exact(SUBCODE_SIZE)
        .zip(raw.chunks_exact_mut(SUBCODE_SIZE))
    {
        for (symbol, byte) in src.iter().enumerate() {
            for channel in 0..8 {
                let bit = (byte >> (7 - channel)) & 1;
                dst[channel * CHANNEL_SIZE + symbol / 8] |= bit << (7 - (symbol % 8));
            }
        }
    }
    Ok(raw)
}

pub fn interleave(raw: &[u8]) -> CdResult<Vec<u8>> {
    check_length(raw)?;
    let mut interleaved = vec![0u8; raw.len()];
    for (src, dst) in raw
        .chunks_exact(SUBCODE_SIZE)
        .zip(interleaved.chunks_exact_mut(SUBCODE_SIZE))
    {
        for (symbol, byte) in dst.iter_mut().enumerate() {
            for channel in 0..8 {
                let bit = (src[channel * CHANNEL_SIZE + symbol / 8] >> (7 - (symbol % 8))) & 1;
                *byte |= bit << (7 - channel);
            }
        }
    }
    Ok(interleaved)
}

/// Re-lays subchannel data from one layout into another.
pub fn convert_subchannel(
    data: &[u8],
    from: SubchannelType,
    to: SubchannelType,
) -> CdResult<Vec<u8>> {
    match (from, to) {
        (SubchannelType::Raw, SubchannelType::Interleaved) => interleave(data),
        (SubchannelType::Interleaved, SubchannelType::Raw) => deinterleave(data),
        _ => {
            check_length(data)?;
            Ok(data.to_vec())
        }
    }
}

/// Q channel of one sector, taken from subchannel data in either layout.
pub fn q_channel(sector: &[u8], layout: SubchannelType) -> CdResult<[u8; CHANNEL_SIZE]> {
    let raw = match layout {
        SubchannelType::Interleaved => deinterleave(sector)?,
        _ => {
            check_length(sector)?;
            sector.to_vec()
        }
    };
    let mut q = [0u8; CHANNEL_SIZE];
    q.copy_from_slice(&raw[CHANNEL_SIZE..CHANNEL_SIZE * 2]);
    Ok(q)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QPayload {
    /// ADR 1.
    Position {
        track: u8,
        index: u8,
        relative: Msf,
        absolute: Msf,
    },
    /// ADR 2, media catalog number.
    Mcn(String),
    /// ADR 3.
    Isrc(String),
    Other(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QSubchannel {
    pub control: u8,
    pub payload: QPayload,
}

impl QSubchannel {
    pub fn crc_ok(q: &[u8; CHANNEL_SIZE]) -> bool {
        Q_CRC.checksum(&q[..10]) == u16::from_be_bytes([q[10], q[11]])
    }

    /// Decodes a Q channel, `None` when the CRC or any BCD field is bad.
    pub fn decode(q: &[u8; CHANNEL_SIZE]) -> Option<Self> {
        if !Self::crc_ok(q) {
            return None;
        }

        let control = q[0] >> 4;
        let payload = match q[0] & 0x0F {
            1 => QPayload::Position {
                track: if q[1] == LEAD_OUT_TRACK {
                    LEAD_OUT_TRACK
                } else {
                    from_bcd(q[1])
                },
                index: from_bcd(q[2]),
                relative: Msf::from_bcd([q[3], q[4], q[5]]).ok()?,
                absolute: Msf::from_bcd([q[7], q[8], q[9]]).ok()?,
            },
            2 => QPayload::Mcn(decode_mcn(q)?),
            3 => QPayload::Isrc(decode_isrc(q)?),
            adr => QPayload::Other(adr),
        };

        Some(Self { control, payload })
    }

    pub fn encode(&self) -> [u8; CHANNEL_SIZE] {
        let mut q = [0u8; CHANNEL_SIZE];
        let adr = match &self.payload {
            QPayload::Position {
                track,
                index,
                relative,
                absolute,
            } => {
                q[1] = if *track == LEAD_OUT_TRACK {
                    LEAD_OUT_TRACK
                } else {
                    to_bcd(*track)
                };
                q[2] = to_bcd(*index);
                q[3..6].copy_from_slice(&relative.to_bcd());
                q[7..10].copy_from_slice(&absolute.to_bcd());
                1
            }
            QPayload::Mcn(mcn) => {
                for (i, digit) in mcn.bytes().take(13).enumerate() {
                    let nibble = digit.wrapping_sub(b'0') & 0x0F;
                    q[1 + i / 2] |= if i % 2 == 0 { nibble << 4 } else { nibble };
                }
                2
            }
            QPayload::Isrc(isrc) => {
                encode_isrc(isrc, &mut q);
                3
            }
            QPayload::Other(adr) => *adr,
        };
        q[0] = (self.control << 4) | (adr & 0x0F);
        let crc = Q_CRC.checksum(&q[..10]);
        q[10..12].copy_from_slice(&crc.to_be_bytes());
        q
    }

    /// Builds a full 96 byte raw subchannel sector carrying this Q channel and an empty P..W.
    pub fn to_subchannel(&self, layout: SubchannelType) -> CdResult<Vec<u8>> {
        let mut raw = vec![0u8; SUBCODE_SIZE];
        raw[CHANNEL_SIZE..CHANNEL_SIZE * 2].copy_from_slice(&self.encode());
        match layout {
            SubchannelType::Interleaved => interleave(&raw),
            _ => Ok(raw),
        }
    }
}

fn decode_mcn(q: &[u8; CHANNEL_SIZE]) -> Option<String> {
    (0..13)
        .map(|i| {
            let byte = q[1 + i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
            (nibble < 10).then(|| (b'0' + nibble) as char)
        })
        .collect()
}

fn isrc_char(value: u8) -> Option<char> {
    match value {
        0..=9 => Some((b'0' + value) as char),
        0x11..=0x2A => Some((b'A' + value - 0x11) as char),
        _ => None,
    }
}

fn isrc_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'Z' => c - b'A' + 0x11,
        _ => 0,
    }
}

fn decode_isrc(q: &[u8; CHANNEL_SIZE]) -> Option<String> {
    let bits = u32::from_be_bytes([q[1], q[2], q[3], q[4]]);
    let mut isrc = String::with_capacity(12);
    for i in 0..5 {
        isrc.push(isrc_char(((bits >> (26 - i * 6)) & 0x3F) as u8)?);
    }
    for i in 0..7 {
        let byte = q[5 + i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0F };
        if nibble > 9 {
            return None;
        }
        isrc.push((b'0' + nibble) as char);
    }
    Some(isrc)
}

fn encode_isrc(isrc: &str, q: &mut [u8; CHANNEL_SIZE]) {
    let bytes = isrc.as_bytes();
    let mut bits = 0u32;
    for i in 0..5 {
        let value = bytes.get(i).copied().map(isrc_value).unwrap_or(0) as u32;
        bits |= value << (26 - i * 6);
    }
    q[1..5].copy_from_slice(&bits.to_be_bytes());
    for i in 0..7 {
        let digit = bytes.get(5 + i).copied().unwrap_or(b'0').wrapping_sub(b'0') & 0x0F;
        q[5 + i / 2] |= if i % 2 == 0 { digit << 4 } else { digit };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(track: u8, index: u8, relative: i64, absolute: i64) -> QSubchannel {
        QSubchannel {
            control: 4,
            payload: QPayload::Position {
                track,
                index,
                relative: Msf::from_frames(relative).unwrap(),
                absolute: Msf::from_lba(absolute).unwrap(),
            },
        }
    }

    #[test]
    fn interleave_round_trips() {
        let raw: Vec<u8> = (0..SUBCODE_SIZE * 2).map(|i| (i * 37) as u8).collect();
        let interleaved = interleave(&raw).unwrap();
        assert_ne!(interleaved, raw);
        assert_eq!(deinterleave(&interleaved).unwrap(), raw);
    }

    #[test]
    fn p_channel_lands_in_bit_seven() {
        let mut raw = vec![0u8; SUBCODE_SIZE];
        raw[..CHANNEL_SIZE].fill(0xFF);
        let interleaved = interleave(&raw).unwrap();
        assert!(interleaved.iter().all(|b| *b == 0x80));
    }

    #[test]
    fn rejects_partial_sectors() {
        assert!(deinterleave(&[0u8; 95]).is_err());
        assert!(convert_subchannel(&[0u8; 10], SubchannelType::Raw, SubchannelType::Raw).is_err());
    }

    #[test]
    fn position_round_trips_with_crc() {
        let q = position(2, 1, 75, 1000);
        let bytes = q.encode();
        assert!(QSubchannel::crc_ok(&bytes));
        assert_eq!(QSubchannel::decode(&bytes), Some(q));
    }

    #[test]
    fn bad_crc_is_rejected() {
        let mut bytes = position(1, 1, 0, 0).encode();
        bytes[11] ^= 1;
        assert_eq!(QSubchannel::decode(&bytes), None);
    }

    #[test]
    fn mcn_and_isrc_round_trip() {
        let mcn = QSubchannel {
            control: 0,
            payload: QPayload::Mcn("0123456789012".to_string()),
        };
        assert_eq!(QSubchannel::decode(&mcn.encode()), Some(mcn));

        let isrc = QSubchannel {
            control: 0,
            payload: QPayload::Isrc("USRC17607839".to_string()),
        };
        assert_eq!(QSubchannel::decode(&isrc.encode()), Some(isrc));
    }

    #[test]
    fn q_channel_reads_either_layout() {
        let q = position(3, 0, 10, 500);
        let raw = q.to_subchannel(SubchannelType::Raw).unwrap();
        let interleaved = q.to_subchannel(SubchannelType::Interleaved).unwrap();
        assert_eq!(q_channel(&raw, SubchannelType::Raw).unwrap(), q.encode());
        assert_eq!(
            q_channel(&interleaved, SubchannelType::Interleaved).unwrap(),
            q.encode()
        );
    }
}
