use crate::cd::ecc::{ECC_P_OFFSET, ECC_P_SIZE, ECC_Q_OFFSET, ECC_Q_SIZE, edc, write_ecc};
use crate::cd::error::{CdError, CdResult};
use crate::cd::msf::Msf;
use crate::cd::{SECTOR_SIZE, SUBCODE_SIZE, SYNC};
use binrw::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackType {
    Audio,
    Mode1,
    Mode2Form1,
    Mode2Form2,
    Mode2Formless,
    CdG,
    CdI,
}

impl TrackType {
    pub fn is_audio(self) -> bool {
        matches!(self, TrackType::Audio | TrackType::CdG)
    }

    pub fn is_mode2(self) -> bool {
        matches!(
            self,
            TrackType::Mode2Form1 | TrackType::Mode2Form2 | TrackType::Mode2Formless | TrackType::CdI
        )
    }
}

impl Display for TrackType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrackType::Audio => "audio",
            TrackType::Mode1 => "mode 1",
            TrackType::Mode2Form1 => "mode 2 form 1",
            TrackType::Mode2Form2 => "mode 2 form 2",
            TrackType::Mode2Formless => "mode 2",
            TrackType::CdG => "CD+G",
            TrackType::CdI => "CD-i",
        };
        f.write_str(name)
    }
}

/// Per-sector and per-track side channel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectorTagType {
    Sync,
    Header,
    Subheader,
    Edc,
    EccP,
    EccQ,
    Ecc,
    Subchannel,
    TrackIsrc,
    TrackFlags,
}

impl SectorTagType {
    /// Tags that live inside a long sector and are copied along with it.
    pub fn is_part_of_long_sector(self) -> bool {
        matches!(
            self,
            SectorTagType::Sync
                | SectorTagType::Header
                | SectorTagType::Subheader
                | SectorTagType::Edc
                | SectorTagType::EccP
                | SectorTagType::EccQ
                | SectorTagType::Ecc
        )
    }

    pub fn is_per_track(self) -> bool {
        matches!(self, SectorTagType::TrackIsrc | SectorTagType::TrackFlags)
    }
}

impl Display for SectorTagType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SectorTagType::Sync => "sync",
            SectorTagType::Header => "header",
            SectorTagType::Subheader => "subheader",
            SectorTagType::Edc => "EDC",
            SectorTagType::EccP => "ECC P",
            SectorTagType::EccQ => "ECC Q",
            SectorTagType::Ecc => "ECC",
            SectorTagType::Subchannel => "subchannel",
            SectorTagType::TrackIsrc => "ISRC",
            SectorTagType::TrackFlags => "track flags",
        };
        f.write_str(name)
    }
}

pub const fn sector_size_for(track_type: TrackType, raw: bool) -> u32 {
    match (track_type, raw) {
        (TrackType::Audio, _) => 2352,
        (TrackType::CdG, _) => (SECTOR_SIZE + SUBCODE_SIZE) as u32,
        (_, true) => SECTOR_SIZE as u32,
        (TrackType::Mode1 | TrackType::Mode2Form1, false) => 2048,
        (TrackType::Mode2Form2, false) => 2324,
        (TrackType::Mode2Formless | TrackType::CdI, false) => 2336,
    }
}

pub const fn tag_size_for(tag: SectorTagType) -> u32 {
    match tag {
        SectorTagType::Sync => 12,
        SectorTagType::Header => 4,
        SectorTagType::Subheader => 8,
        SectorTagType::Edc => 4,
        SectorTagType::EccP => ECC_P_SIZE as u32,
        SectorTagType::EccQ => ECC_Q_SIZE as u32,
        SectorTagType::Ecc => (ECC_P_SIZE + ECC_Q_SIZE) as u32,
        SectorTagType::Subchannel => SUBCODE_SIZE as u32,
        SectorTagType::TrackIsrc => 12,
        SectorTagType::TrackFlags => 1,
    }
}

/// Mode 1 sector layout.
#[derive(Debug, BinWrite)]
#[bw(big)]
pub struct CdSector {
    pub sync: [u8; 12],
    pub header: [u8; 4],
    pub data: [u8; 2048],
    #[bw(little)]
    pub edc: u32,
    pub intermediate: [u8; 8],
    pub ecc_p: [u8; 172],
    pub ecc_q: [u8; 104],
}

impl CdSector {
    fn mode1(lba: i64, user_data: &[u8]) -> CdResult<Self> {
        Ok(Self {
            sync: SYNC,
            header: header_for(lba, 1)?,
            data: user_data.try_into().map_err(|_| CdError::InvalidSectorLength {
                expected: 2048,
                actual: user_data.len(),
            })?,
            edc: 0,
            intermediate: [0; 8],
            ecc_p: [0; 172],
            ecc_q: [0; 104],
        })
    }

    fn to_bytes(&self) -> CdResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(SECTOR_SIZE));
        self.write(&mut cursor)
            .map_err(|err| CdError::Codec(err.to_string()))?;
        Ok(cursor.into_inner())
    }
}

fn check_length(data: &[u8], expected: usize) -> CdResult<()> {
    if data.len() != expected {
        return Err(CdError::InvalidSectorLength {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

fn header_for(lba: i64, mode: u8) -> CdResult<[u8; 4]> {
    let [m, s, f] = Msf::from_lba(lba)?.to_bcd();
    Ok([m, s, f, mode])
}

/// Byte range of the user data inside a long sector of the given track type.
fn user_data_range(track_type: TrackType) -> std::ops::Range<usize> {
    match track_type {
        TrackType::Audio => 0..SECTOR_SIZE,
        TrackType::CdG => 0..SECTOR_SIZE + SUBCODE_SIZE,
        TrackType::Mode1 => 16..2064,
        TrackType::Mode2Form1 => 24..2072,
        TrackType::Mode2Form2 => 24..2348,
        TrackType::Mode2Formless | TrackType::CdI => 16..SECTOR_SIZE,
    }
}

/// Returns the cooked bytes carried by one long sector.
pub fn extract_user_data(raw: &[u8], track_type: TrackType) -> CdResult<&[u8]> {
    check_length(raw, sector_size_for(track_type, true) as usize)?;
    Ok(&raw[user_data_range(track_type)])
}

/// Rebuilds a long sector from its cooked bytes: sync, header, subheader, EDC and ECC.
///
/// Mode 2 form 1 and form 2 sectors get a plain data subheader since cooked data carries none.
pub fn encode_sector(cooked: &[u8], lba: i64, track_type: TrackType) -> CdResult<Vec<u8>> {
    check_length(cooked, sector_size_for(track_type, false) as usize)?;

    match track_type {
        TrackType::Audio | TrackType::CdG => Ok(cooked.to_vec()),
        TrackType::Mode1 => {
            let mut sector = CdSector::mode1(lba, cooked)?;
            sector.edc = edc(&sector.to_bytes()?[..2064]);
            let mut bytes = sector.to_bytes()?;
            write_ecc(&mut bytes, false);
            Ok(bytes)
        }
        TrackType::Mode2Form1 | TrackType::Mode2Form2 => {
            let form2 = track_type == TrackType::Mode2Form2;
            let submode = if form2 { 0x20 } else { 0x08 };
            let mut bytes = vec![0u8; SECTOR_SIZE];
            bytes[..12].copy_from_slice(&SYNC);
            bytes[12..16].copy_from_slice(&header_for(lba, 2)?);
            bytes[16..24].copy_from_slice(&[0, 0, submode, 0, 0, 0, submode, 0]);
            let data = user_data_range(track_type);
            bytes[data.clone()].copy_from_slice(cooked);
            let edc_value = edc(&bytes[16..data.end]);
            bytes[data.end..data.end + 4].copy_from_slice(&edc_value.to_le_bytes());
            if !form2 {
                write_ecc(&mut bytes, true);
            }
            Ok(bytes)
        }
        TrackType::Mode2Formless | TrackType::CdI => {
            let mut bytes = vec![0u8; SECTOR_SIZE];
            bytes[..12].copy_from_slice(&SYNC);
            bytes[12..16].copy_from_slice(&header_for(lba, 2)?);
            bytes[16..].copy_from_slice(cooked);
            Ok(bytes)
        }
    }
}

/// Slices a structural tag out of a long sector.
pub fn extract_tag(raw: &[u8], track_type: TrackType, tag: SectorTagType) -> CdResult<&[u8]> {
    check_length(raw, sector_size_for(track_type, true) as usize)?;

    let unsupported = || CdError::UnsupportedTrackType(track_type.to_string(), tag.to_string());
    if track_type.is_audio() {
        return Err(unsupported());
    }

    let range = match (tag, track_type) {
        (SectorTagType::Sync, _) => 0..12,
        (SectorTagType::Header, _) => 12..16,
        (SectorTagType::Subheader, t) if t.is_mode2() => 16..24,
        (SectorTagType::Edc, TrackType::Mode1) => 2064..2068,
        (SectorTagType::Edc, TrackType::Mode2Form1) => 2072..2076,
        (SectorTagType::Edc, TrackType::Mode2Form2) => 2348..2352,
        (SectorTagType::EccP, TrackType::Mode1 | TrackType::Mode2Form1) => {
            ECC_P_OFFSET..ECC_P_OFFSET + ECC_P_SIZE
        }
        (SectorTagType::EccQ, TrackType::Mode1 | TrackType::Mode2Form1) => {
            ECC_Q_OFFSET..ECC_Q_OFFSET + ECC_Q_SIZE
        }
        (SectorTagType::Ecc, TrackType::Mode1 | TrackType::Mode2Form1) => {
            ECC_P_OFFSET..ECC_Q_OFFSET + ECC_Q_SIZE
        }
        _ => return Err(unsupported()),
    };

    Ok(&raw[range])
}

/// Structural tags a long sector of this type carries.
pub fn structural_tags(track_type: TrackType) -> &'static [SectorTagType] {
    match track_type {
        TrackType::Audio | TrackType::CdG => &[],
        TrackType::Mode1 => &[
            SectorTagType::Sync,
            SectorTagType::Header,
            SectorTagType::Edc,
            SectorTagType::EccP,
            SectorTagType::EccQ,
            SectorTagType::Ecc,
        ],
        TrackType::Mode2Form1 => &[
            SectorTagType::Sync,
            SectorTagType::Header,
            SectorTagType::Subheader,
            SectorTagType::Edc,
            SectorTagType::EccP,
            SectorTagType::EccQ,
            SectorTagType::Ecc,
        ],
        TrackType::Mode2Form2 => &[
            SectorTagType::Sync,
            SectorTagType::Header,
            SectorTagType::Subheader,
            SectorTagType::Edc,
        ],
        TrackType::Mode2Formless | TrackType::CdI => &[
            SectorTagType::Sync,
            SectorTagType::Header,
            SectorTagType::Subheader,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cd::ecc::check_ecc;

    const ALL_TYPES: [TrackType; 7] = [
        TrackType::Audio,
        TrackType::Mode1,
        TrackType::Mode2Form1,
        TrackType::Mode2Form2,
        TrackType::Mode2Formless,
        TrackType::CdG,
        TrackType::CdI,
    ];

    #[test]
    fn sector_sizes_follow_track_type() {
        assert_eq!(sector_size_for(TrackType::Audio, false), 2352);
        assert_eq!(sector_size_for(TrackType::Audio, true), 2352);
        assert_eq!(sector_size_for(TrackType::Mode1, false), 2048);
        assert_eq!(sector_size_for(TrackType::Mode1, true), 2352);
        assert_eq!(sector_size_for(TrackType::Mode2Form1, false), 2048);
        assert_eq!(sector_size_for(TrackType::Mode2Form2, false), 2324);
        assert_eq!(sector_size_for(TrackType::Mode2Formless, false), 2336);
        assert_eq!(sector_size_for(TrackType::Mode2Formless, true), 2352);
        assert_eq!(sector_size_for(TrackType::CdG, false), 2448);
        assert_eq!(sector_size_for(TrackType::CdI, false), 2336);
        assert_eq!(sector_size_for(TrackType::CdI, true), 2352);
    }

    #[test]
    fn sector_sizes_are_deterministic() {
        for track_type in ALL_TYPES {
            for raw in [false, true] {
                let first = sector_size_for(track_type, raw);
                assert!((0..10).all(|_| sector_size_for(track_type, raw) == first));
            }
        }
    }

    #[test]
    fn tag_sizes() {
        assert_eq!(tag_size_for(SectorTagType::Sync), 12);
        assert_eq!(tag_size_for(SectorTagType::Header), 4);
        assert_eq!(tag_size_for(SectorTagType::Subheader), 8);
        assert_eq!(tag_size_for(SectorTagType::Edc), 4);
        assert_eq!(tag_size_for(SectorTagType::EccP), 172);
        assert_eq!(tag_size_for(SectorTagType::EccQ), 104);
        assert_eq!(tag_size_for(SectorTagType::Ecc), 276);
        assert_eq!(tag_size_for(SectorTagType::Subchannel), 96);
    }

    #[test]
    fn encoded_sectors_give_back_their_user_data() {
        for track_type in ALL_TYPES {
            let size = sector_size_for(track_type, false) as usize;
            let cooked: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let raw = encode_sector(&cooked, 16, track_type).unwrap();
            assert_eq!(raw.len(), sector_size_for(track_type, true) as usize);
            assert_eq!(extract_user_data(&raw, track_type).unwrap(), cooked.as_slice());
        }
    }

    #[test]
    fn mode1_encoding_has_valid_header_and_parity() {
        let cooked = vec![0xA5u8; 2048];
        let raw = encode_sector(&cooked, 0, TrackType::Mode1).unwrap();

        let stored_edc = extract_tag(&raw, TrackType::Mode1, SectorTagType::Edc).unwrap();
        assert_eq!(&raw[..12], &SYNC);
        assert_eq!(
            extract_tag(&raw, TrackType::Mode1, SectorTagType::Header).unwrap(),
            &[0x00, 0x02, 0x00, 0x01]
        );
        assert_eq!(stored_edc, edc(&raw[..2064]).to_le_bytes());
        assert!(check_ecc(&raw, false));
    }

    #[test]
    fn mode2_form1_parity_uses_zero_address() {
        let cooked = vec![0x11u8; 2048];
        let raw = encode_sector(&cooked, 300, TrackType::Mode2Form1).unwrap();
        assert_eq!(raw[15], 2);
        assert_eq!(&raw[16..24], &[0, 0, 0x08, 0, 0, 0, 0x08, 0]);
        assert!(check_ecc(&raw, true));
    }

    #[test]
    fn rejects_wrong_cooked_length() {
        assert_eq!(
            encode_sector(&[0u8; 10], 0, TrackType::Mode1),
            Err(CdError::InvalidSectorLength {
                expected: 2048,
                actual: 10
            })
        );
    }

    #[test]
    fn extracts_structural_tags() {
        let raw = encode_sector(&[0u8; 2048], 0, TrackType::Mode1).unwrap();
        assert_eq!(extract_tag(&raw, TrackType::Mode1, SectorTagType::Sync).unwrap(), &SYNC);
        assert_eq!(
            extract_tag(&raw, TrackType::Mode1, SectorTagType::Ecc)
                .unwrap()
                .len(),
            276
        );
        assert!(extract_tag(&raw, TrackType::Mode1, SectorTagType::Subheader).is_err());
        assert!(extract_tag(&[0u8; 2352], TrackType::Audio, SectorTagType::Sync).is_err());
    }

    #[test]
    fn long_sector_tags_are_recognised() {
        assert!(SectorTagType::Ecc.is_part_of_long_sector());
        assert!(SectorTagType::Subheader.is_part_of_long_sector());
        assert!(!SectorTagType::Subchannel.is_part_of_long_sector());
        assert!(!SectorTagType::TrackIsrc.is_part_of_long_sector());
    }
}
