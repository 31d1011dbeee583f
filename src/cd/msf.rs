use crate::cd::error::{CdError, CdResult};
use crate::cd::{FRAMES_PER_SECOND, LEAD_IN_FRAMES};
use std::fmt::{Display, Formatter};

const FRAMES_PER_MINUTE: i64 = FRAMES_PER_SECOND as i64 * 60;

/// Red Book minute:second:frame address.
///
/// Absolute addresses carry the 150 frame lead-in offset, so sector 0 is `00:02:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Msf {
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
}

impl Msf {
    pub fn new(minutes: u8, seconds: u8, frames: u8) -> CdResult<Self> {
        if seconds > 59 || frames as u32 >= FRAMES_PER_SECOND {
            return Err(CdError::InvalidAddress {
                minutes,
                seconds,
                frames,
            });
        }

        Ok(Self {
            minutes,
            seconds,
            frames,
        })
    }

    /// Converts an absolute sector address, which may be negative inside the lead-in pregap.
    pub fn from_lba(lba: i64) -> CdResult<Self> {
        Self::from_frames(lba + LEAD_IN_FRAMES)
    }

    /// Converts a plain frame count with no lead-in offset, as used by CUE sheet positions and
    /// Q subchannel relative time.
    pub fn from_frames(frames: i64) -> CdResult<Self> {
        if !(0..100 * FRAMES_PER_MINUTE).contains(&frames) {
            return Err(CdError::AddressOutOfRange(frames - LEAD_IN_FRAMES));
        }

        Ok(Self {
            minutes: (frames / FRAMES_PER_MINUTE) as u8,
            seconds: ((frames / FRAMES_PER_SECOND as i64) % 60) as u8,
            frames: (frames % FRAMES_PER_SECOND as i64) as u8,
        })
    }

    pub fn to_frames(&self) -> i64 {
        self.minutes as i64 * FRAMES_PER_MINUTE
            + self.seconds as i64 * FRAMES_PER_SECOND as i64
            + self.frames as i64
    }

    pub fn to_lba(&self) -> i64 {
        self.to_frames() - LEAD_IN_FRAMES
    }

    pub fn to_bcd(&self) -> [u8; 3] {
        [
            to_bcd(self.minutes),
            to_bcd(self.seconds),
            to_bcd(self.frames),
        ]
    }

    pub fn from_bcd(bytes: [u8; 3]) -> CdResult<Self> {
        Self::new(
            from_bcd(bytes[0]),
            from_bcd(bytes[1]),
            from_bcd(bytes[2]),
        )
    }
}

impl Display for Msf {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.minutes, self.seconds, self.frames
        )
    }
}

pub fn to_msf(sector: i64) -> CdResult<(u8, u8, u8)> {
    let msf = Msf::from_lba(sector)?;
    Ok((msf.minutes, msf.seconds, msf.frames))
}

pub fn from_msf(minutes: u8, seconds: u8, frames: u8) -> CdResult<i64> {
    Ok(Msf::new(minutes, seconds, frames)?.to_lba())
}

pub fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

pub fn from_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_zero_is_two_seconds_in() {
        assert_eq!(to_msf(0).unwrap(), (0, 2, 0));
        assert_eq!(from_msf(0, 2, 0).unwrap(), 0);
    }

    #[test]
    fn lead_in_pregap_maps_to_negative_sectors() {
        assert_eq!(from_msf(0, 0, 0).unwrap(), -150);
        assert_eq!(to_msf(-150).unwrap(), (0, 0, 0));
        assert!(to_msf(-151).is_err());
    }

    #[test]
    fn round_trips_known_addresses() {
        assert_eq!(to_msf(4350).unwrap(), (1, 0, 0));
        assert_eq!(from_msf(74, 59, 74).unwrap(), 337_349);
        assert_eq!(to_msf(337_349).unwrap(), (74, 59, 74));
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert_eq!(
            from_msf(0, 0, 75),
            Err(CdError::InvalidAddress {
                minutes: 0,
                seconds: 0,
                frames: 75
            })
        );
        assert!(from_msf(0, 60, 0).is_err());
    }

    #[test]
    fn bcd_encoding() {
        assert_eq!(to_bcd(59), 0x59);
        assert_eq!(from_bcd(0x74), 74);
        let msf = Msf::new(12, 34, 56).unwrap();
        assert_eq!(msf.to_bcd(), [0x12, 0x34, 0x56]);
        assert_eq!(Msf::from_bcd(msf.to_bcd()).unwrap(), msf);
    }

    #[test]
    fn displays_as_colon_separated() {
        assert_eq!(Msf::new(1, 2, 3).unwrap().to_string(), "01:02:03");
    }
}
