use crate::cd::SUBCODE_SIZE;
use crate::cd::error::CdResult;
use crate::cd::subchannel::{LEAD_OUT_TRACK, QPayload, QSubchannel, SubchannelType, q_channel};
use crate::image::models::Track;
use log::debug;
use std::collections::BTreeMap;

/// What the subchannel pass has learned so far across chunks.
#[derive(Debug, Default, Clone)]
pub struct SubchannelAccumulator {
    pub mcn: Option<String>,
    pub isrcs: BTreeMap<u32, String>,
    /// Lowest sector seen in index 0, per track.
    pub pregap_starts: BTreeMap<u32, u64>,
    seen: SeenExtents,
}

/// Merged inclusive ranges of sectors whose Q channel was already decoded, keyed by start.
#[derive(Debug, Default, Clone)]
struct SeenExtents(BTreeMap<u64, u64>);

impl SeenExtents {
    fn contains(&self, sector: u64) -> bool {
        self.0
            .range(..=sector)
            .next_back()
            .is_some_and(|(_, &end)| end >= sector)
    }

    /// Adds `sector`, returning false when it was already covered.
    fn insert(&mut self, sector: u64) -> bool {
        if self.contains(sector) {
            return false;
        }
        let start = match self.0.range(..sector).next_back() {
            Some((&start, &end)) if end + 1 == sector => start,
            _ => sector,
        };
        let end = self.0.remove(&(sector + 1)).unwrap_or(sector);
        self.0.insert(start, end);
        true
    }
}

/// Decodes the Q channel of a chunk of subchannel data and checks the track layout against it.
///
/// `tracks` is left alone; when the Q channel places an index or a track boundary somewhere the
/// layout does not, the corrected layout is returned.
pub fn repair_tracks(
    subchannel: &[u8],
    layout: SubchannelType,
    start: u64,
    tracks: &[Track],
    acc: &mut SubchannelAccumulator,
) -> CdResult<Option<Vec<Track>>> {
    let mut working = tracks.to_vec();
    let mut changed = false;

    for (sector, data) in (start..).zip(subchannel.chunks_exact(SUBCODE_SIZE)) {
        if !acc.seen.insert(sector) {
            continue;
        }
        let Some(q) = QSubchannel::decode(&q_channel(data, layout)?) else {
            continue;
        };

        match q.payload {
            QPayload::Mcn(mcn) => {
                if acc.mcn.is_none() && mcn.bytes().any(|b| b != b'0') {
                    debug!("Found MCN {mcn} at sector {sector}");
                    acc.mcn = Some(mcn);
                }
            }
            QPayload::Isrc(isrc) => {
                if let Some(owner) = working.iter().find(|t| t.contains(sector)) {
                    if !acc.isrcs.contains_key(&owner.sequence) {
                        debug!("Found ISRC {isrc} for track {}", owner.sequence);
                        acc.isrcs.insert(owner.sequence, isrc);
                    }
                }
            }
            QPayload::Position { track, index, .. } if track != 0 && track != LEAD_OUT_TRACK => {
                let sequence = track as u32;
                let index = index as u16;
                if index == 0 {
                    let lowest = acc.pregap_starts.entry(sequence).or_insert(sector);
                    *lowest = (*lowest).min(sector);
                }
                changed |= place_index(&mut working, sequence, index, sector);
            }
            _ => {}
        }
    }

    Ok(changed.then_some(working))
}

/// Records that `sector` lies in `index` of track `sequence`, returning whether anything moved.
fn place_index(tracks: &mut [Track], sequence: u32, index: u16, sector: u64) -> bool {
    let Some(position) = tracks.iter().position(|t| t.sequence == sequence) else {
        return false;
    };

    let known = tracks[position].indexes.get(&index).copied();
    let earlier = match known {
        Some(at) => (sector as i64) < at,
        None => true,
    };
    if !earlier || (index > 1 && known.is_some()) {
        return false;
    }

    if sector < tracks[position].start {
        if position == 0 {
            return false;
        }
        let (before, after) = tracks.split_at_mut(position);
        let previous = &mut before[position - 1];
        let track = &mut after[0];
        if previous.session != track.session || sector <= previous.start {
            return false;
        }
        debug!(
            "Moving start of track {} from {} to {sector}",
            track.sequence, track.start
        );
        previous.end = sector - 1;
        previous.indexes.retain(|_, at| *at < sector as i64);
        track.start = sector;
    } else if sector > tracks[position].end {
        return false;
    }

    let track = &mut tracks[position];
    debug!("Track {} index {index} starts at {sector}", track.sequence);
    track.indexes.insert(index, sector as i64);
    if index <= 1 {
        let pregap_start = track
            .indexes
            .get(&0)
            .copied()
            .unwrap_or(track.start as i64);
        track.pregap = (track.index1() - pregap_start).max(0) as u64;
    }
    true
}
