use crate::image::error::{ImageError, ImageResult};
use crate::image::models::{Session, Track};
use log::debug;

/// Ordered, validated list of tracks and the sessions they form.
///
/// Tracks are kept sorted by start sector. Every successful mutation bumps `generation`, so
/// anything resolved against an older generation has to be resolved again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTable {
    tracks: Vec<Track>,
    sessions: Vec<Session>,
    generation: u64,
}

impl TrackTable {
    pub fn new(tracks: Vec<Track>) -> ImageResult<Self> {
        let mut table = Self::default();
        table.set_tracks(tracks)?;
        Ok(table)
    }

    pub fn set_tracks(&mut self, mut tracks: Vec<Track>) -> ImageResult<()> {
        tracks.sort_by_key(|t| (t.start, t.sequence));
        let sessions = validate(&tracks)?;

        debug!(
            "Track table now holds {} tracks in {} sessions",
            tracks.len(),
            sessions.len()
        );

        self.tracks = tracks;
        self.sessions = sessions;
        self.generation += 1;
        Ok(())
    }

    pub fn add_track(&mut self, track: Track) -> ImageResult<()> {
        let mut tracks = self.tracks.clone();
        tracks.push(track);
        self.set_tracks(tracks)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// One past the last addressable sector.
    pub fn total_sectors(&self) -> u64 {
        self.tracks.last().map(|t| t.end + 1).unwrap_or(0)
    }

    pub fn find_track(&self, sector: u64) -> ImageResult<&Track> {
        let idx = self.tracks.partition_point(|t| t.start <= sector);
        idx.checked_sub(1)
            .map(|i| &self.tracks[i])
            .filter(|t| t.end >= sector)
            .ok_or(ImageError::TrackNotFound(sector))
    }

    pub fn track(&self, sequence: u32) -> ImageResult<&Track> {
        self.tracks
            .iter()
            .find(|t| t.sequence == sequence)
            .ok_or(ImageError::NoSuchTrack(sequence))
    }

    pub fn tracks_in_session(&self, session: u16) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(move |t| t.session == session)
    }
}

fn validate(tracks: &[Track]) -> ImageResult<Vec<Session>> {
    for track in tracks {
        if track.start > track.end {
            return Err(ImageError::InvalidTrackRange {
                track: track.sequence,
                start: track.start,
                end: track.end,
            });
        }
    }

    // Sorted by start, so any intersection shows up between neighbours.
    for pair in tracks.windows(2) {
        if pair[1].start <= pair[0].end {
            return Err(ImageError::OverlappingTracks {
                first: pair[0].sequence,
                second: pair[1].sequence,
            });
        }
    }

    for pair in tracks.windows(2) {
        if pair[1].sequence <= pair[0].sequence {
            return Err(ImageError::NonMonotonicSequence {
                previous: pair[0].sequence,
                next: pair[1].sequence,
            });
        }
    }

    for pair in tracks.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let broken = if a.session == b.session {
            b.start != a.end + 1 || b.sequence != a.sequence + 1
        } else {
            b.session < a.session
        };
        if broken {
            return Err(ImageError::SessionGap { session: b.session });
        }
    }

    if let Some(first) = tracks.first() {
        if first.start != 0 {
            return Err(ImageError::FirstSessionNotAtZero(first.start));
        }
    }

    let mut sessions: Vec<Session> = Vec::new();
    for track in tracks {
        match sessions.last_mut() {
            Some(session) if session.sequence == track.session => {
                session.end_track = track.sequence;
                session.end_sector = track.end;
            }
            _ => sessions.push(Session {
                sequence: track.session,
                start_track: track.sequence,
                end_track: track.sequence,
                start_sector: track.start,
                end_sector: track.end,
            }),
        }
    }

    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cd::TrackType;

    fn track(sequence: u32, session: u16, start: u64, end: u64) -> Track {
        Track::new(sequence, session, TrackType::Mode1, start, end)
    }

    fn permutations(items: Vec<Track>) -> Vec<Vec<Track>> {
        if items.len() <= 1 {
            return vec![items];
        }
        let mut result = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.clone();
            let head = rest.remove(i);
            for mut tail in permutations(rest) {
                tail.insert(0, head.clone());
                result.push(tail);
            }
        }
        result
    }

    #[test]
    fn sorts_tracks_and_builds_sessions() {
        let table = TrackTable::new(vec![
            track(3, 2, 300, 399),
            track(1, 1, 0, 99),
            track(2, 1, 100, 199),
        ])
        .unwrap();

        let sequences: Vec<u32> = table.tracks().iter().map(|t| t.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(
            table.sessions(),
            &[
                Session {
                    sequence: 1,
                    start_track: 1,
                    end_track: 2,
                    start_sector: 0,
                    end_sector: 199,
                },
                Session {
                    sequence: 2,
                    start_track: 3,
                    end_track: 3,
                    start_sector: 300,
                    end_sector: 399,
                },
            ]
        );
        assert_eq!(table.total_sectors(), 400);
        assert_eq!(table.tracks_in_session(1).count(), 2);
    }

    #[test]
    fn rejects_overlap_in_every_order() {
        let tracks = vec![track(1, 1, 0, 99), track(2, 1, 90, 199), track(3, 1, 200, 299)];
        for order in permutations(tracks) {
            let err = TrackTable::new(order).unwrap_err();
            assert!(
                matches!(err, ImageError::OverlappingTracks { first: 1, second: 2 }),
                "{err}"
            );
        }
    }

    #[test]
    fn rejects_decreasing_sequence() {
        let err = TrackTable::new(vec![track(2, 1, 0, 99), track(1, 1, 100, 199)]).unwrap_err();
        assert!(matches!(
            err,
            ImageError::NonMonotonicSequence {
                previous: 2,
                next: 1
            }
        ));
    }

    #[test]
    fn rejects_holes_inside_a_session() {
        let err = TrackTable::new(vec![track(1, 1, 0, 99), track(2, 1, 150, 199)]).unwrap_err();
        assert!(matches!(err, ImageError::SessionGap { session: 1 }));

        let err = TrackTable::new(vec![
            track(1, 1, 0, 99),
            track(2, 2, 100, 199),
            track(3, 1, 200, 299),
        ])
        .unwrap_err();
        assert!(matches!(err, ImageError::SessionGap { session: 1 }));
    }

    #[test]
    fn allows_gaps_between_sessions() {
        assert!(TrackTable::new(vec![track(1, 1, 0, 99), track(2, 2, 11_500, 11_599)]).is_ok());
    }

    #[test]
    fn rejects_inverted_ranges_and_late_start() {
        assert!(matches!(
            TrackTable::new(vec![track(1, 1, 10, 5)]).unwrap_err(),
            ImageError::InvalidTrackRange { track: 1, .. }
        ));
        assert!(matches!(
            TrackTable::new(vec![track(1, 1, 10, 50)]).unwrap_err(),
            ImageError::FirstSessionNotAtZero(10)
        ));
    }

    #[test]
    fn failed_mutation_keeps_previous_table() {
        let mut table = TrackTable::new(vec![track(1, 1, 0, 99)]).unwrap();
        let generation = table.generation();
        assert!(table.add_track(track(2, 1, 50, 150)).is_err());
        assert_eq!(table.tracks().len(), 1);
        assert_eq!(table.generation(), generation);

        table.add_track(track(2, 1, 100, 150)).unwrap();
        assert_eq!(table.generation(), generation + 1);
    }

    #[test]
    fn every_sector_resolves_to_exactly_one_track() {
        let table = TrackTable::new(vec![
            track(1, 1, 0, 9),
            track(2, 1, 10, 10),
            track(3, 1, 11, 30),
            track(4, 2, 31, 44),
        ])
        .unwrap();

        for sector in 0..table.total_sectors() {
            let found = table.find_track(sector).unwrap();
            assert!(found.contains(sector));
            let owners = table.tracks().iter().filter(|t| t.contains(sector)).count();
            assert_eq!(owners, 1);
        }
        assert!(matches!(
            table.find_track(45),
            Err(ImageError::TrackNotFound(45))
        ));
    }

    #[test]
    fn sectors_between_sessions_have_no_track() {
        let table = TrackTable::new(vec![track(1, 1, 0, 99), track(2, 2, 500, 599)]).unwrap();
        assert!(table.find_track(300).is_err());
        assert_eq!(table.find_track(500).unwrap().sequence, 2);
    }
}
