mod common;

use common::{Faulty, data_disc, mixed_disc, multisession_tracks, pattern, q_position};
use disc_converto::cd::TrackType;
use disc_converto::cd::sector::SectorTagType;
use disc_converto::cd::subchannel::{QPayload, QSubchannel, SubchannelType};
use disc_converto::convert::error::ConvertError;
use disc_converto::convert::{ConversionEngine, ConversionState, ConvertOptions};
use disc_converto::formats::iso::{IsoImage, IsoWriter};
use disc_converto::image::error::ImageError;
use disc_converto::image::models::{DumpHardware, Extent, MediaTagType, MediaType, Track};
use disc_converto::verify::{file_md5, read_through};
use disc_converto::{ImageReader, ImageWriter, MemoryImage};
use std::path::Path;
use tempfile::tempdir;

fn long() -> ConvertOptions {
    ConvertOptions {
        long: true,
        ..ConvertOptions::default()
    }
}

#[test]
fn failing_long_reads_fall_back_to_the_same_user_data() {
    let mut broken = Faulty::no_long_reads(mixed_disc());
    let mut fallback = MemoryImage::new();
    let report = ConversionEngine::new(&mut broken, &mut fallback, Path::new("a"), long())
        .run()
        .unwrap();

    // 600, 400 and 300 sectors in chunks of 256.
    assert_eq!(report.cooked_fallbacks, 7);
    assert_eq!(report.long_chunks, 0);
    assert_eq!(report.sectors, 1300);

    let mut input = mixed_disc();
    let mut direct = MemoryImage::new();
    ConversionEngine::new(
        &mut input,
        &mut direct,
        Path::new("b"),
        ConvertOptions::default(),
    )
    .run()
    .unwrap();

    for track in direct.tracks().to_vec() {
        let count = track.len() as u32;
        assert_eq!(
            fallback.read_sectors(track.start, count).unwrap(),
            direct.read_sectors(track.start, count).unwrap(),
            "track {}",
            track.sequence
        );
    }
    assert_eq!(
        read_through(&mut fallback, None).unwrap().user_data_md5,
        read_through(&mut input, None).unwrap().user_data_md5
    );
}

#[test]
fn fallback_is_decided_per_chunk() {
    // Only the second 256 sector chunk of the data track has no long sectors.
    let mut input = Faulty::long_fails_within(mixed_disc(), 300..310);
    let mut output = MemoryImage::new();
    let report = ConversionEngine::new(&mut input, &mut output, Path::new("out"), long())
        .run()
        .unwrap();

    assert_eq!(report.cooked_fallbacks, 1);
    assert_eq!(report.long_chunks, 6);
    assert_eq!(report.sectors, 1300);

    let mut original = mixed_disc();
    for track in original.tracks().to_vec() {
        let count = track.len() as u32;
        assert_eq!(
            output.read_sectors(track.start, count).unwrap(),
            original.read_sectors(track.start, count).unwrap(),
            "track {}",
            track.sequence
        );
    }
    for (start, count) in [(0, 256), (512, 88), (600, 400)] {
        assert_eq!(
            output.read_sectors_long(start, count).unwrap(),
            original.read_sectors_long(start, count).unwrap(),
            "sectors {start} to {}",
            start + count as u64 - 1
        );
    }
}

#[test]
fn long_copy_into_a_cooked_format_falls_back_to_user_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.iso");
    let mut input = data_disc();
    let mut output = IsoWriter::new();

    let report = ConversionEngine::new(&mut input, &mut output, &path, long())
        .run()
        .unwrap();
    assert_eq!(report.cooked_fallbacks, 1);

    let mut iso = IsoImage::open(&path).unwrap();
    assert_eq!(iso.info().sectors, 255);
    assert_eq!(iso.read_sector(200).unwrap(), pattern(200, 2048));
}

#[test]
fn four_sessions_survive_a_conversion() {
    let mut input = MemoryImage::with_tracks(MediaType::CdPlus, multisession_tracks()).unwrap();
    let mut output = MemoryImage::new();
    let options = ConvertOptions {
        chunk_size: 4096,
        ..ConvertOptions::default()
    };
    let report = ConversionEngine::new(&mut input, &mut output, Path::new("out"), options)
        .run()
        .unwrap();

    assert_eq!(output.sessions().len(), 4);
    assert_eq!(output.sessions(), input.sessions());
    assert_eq!(output.tracks(), input.tracks());
    assert_eq!(
        report.sectors,
        input.tracks().iter().map(Track::len).sum::<u64>()
    );
}

#[test]
fn short_subchannel_reads_fail_the_conversion() {
    let mut input = Faulty::short_subchannel(data_disc(), 96);
    let mut output = MemoryImage::new();
    let mut engine = ConversionEngine::new(&mut input, &mut output, Path::new("out"), long());

    let err = engine.run().unwrap_err();
    assert!(matches!(
        err,
        ConvertError::TagCopyFailed {
            track: 1,
            tag: SectorTagType::Subchannel,
            source: ImageError::LengthMismatch {
                expected: 24_480,
                actual: 24_384,
            },
        }
    ));
    assert!(matches!(engine.state(), ConversionState::Failed(_)));
}

#[test]
fn subchannel_index_repair_redeclares_tracks_once() {
    let mut first = Track::new(1, 1, TrackType::Audio, 0, 99);
    first.pregap = 150;
    first.indexes.insert(0, -150);
    first.subchannel = SubchannelType::Raw;
    let mut second = Track::new(2, 1, TrackType::Audio, 100, 199);
    second.subchannel = SubchannelType::Raw;

    let mut input = MemoryImage::with_tracks(MediaType::CdDa, vec![first, second]).unwrap();
    for sector in 0..200u64 {
        let (track, index) = match sector {
            0..95 => (1, 1),
            95..100 => (2, 0),
            _ => (2, 1),
        };
        input
            .write_sectors_tag(&q_position(track, index, sector), sector, 1, SectorTagType::Subchannel)
            .unwrap();
    }

    let mut output = MemoryImage::new();
    let options = ConvertOptions {
        chunk_size: 40,
        ..long()
    };
    let report = ConversionEngine::new(&mut input, &mut output, Path::new("out"), options)
        .run()
        .unwrap();

    assert_eq!(report.table_repairs, 1);
    // Once for the declaration, once for the repair.
    assert_eq!(output.set_tracks_calls(), 2);

    let tracks = output.tracks();
    assert_eq!(tracks[0].end, 94);
    assert_eq!(tracks[1].start, 95);
    assert_eq!(tracks[1].pregap, 5);
    assert_eq!(tracks[1].indexes.get(&0), Some(&95));
    assert_eq!(tracks[1].indexes.get(&1), Some(&100));

    // Subchannel written after the repair sits in the corrected second track.
    let expected = [
        input
            .read_sectors_tag(95, 5, SectorTagType::Subchannel)
            .unwrap(),
        input
            .read_sectors_tag(100, 100, SectorTagType::Subchannel)
            .unwrap(),
    ]
    .concat();
    assert_eq!(
        output
            .read_sectors_tag(95, 105, SectorTagType::Subchannel)
            .unwrap(),
        expected
    );
    assert!(
        output
            .read_sectors_tag(90, 10, SectorTagType::Subchannel)
            .is_err()
    );
}

#[test]
fn mcn_found_in_subchannel_is_written_once_at_the_end() {
    let mut track = Track::new(1, 1, TrackType::Audio, 0, 49);
    track.subchannel = SubchannelType::Raw;
    let mut input = MemoryImage::with_tracks(MediaType::CdDa, vec![track]).unwrap();
    let mcn = QSubchannel {
        control: 0,
        payload: QPayload::Mcn("0724384960920".to_string()),
    }
    .to_subchannel(SubchannelType::Raw)
    .unwrap();
    input
        .write_sectors_tag(&mcn, 10, 1, SectorTagType::Subchannel)
        .unwrap();

    let mut output = MemoryImage::new();
    let report = ConversionEngine::new(&mut input, &mut output, Path::new("out"), long())
        .run()
        .unwrap();

    assert_eq!(report.mcn.as_deref(), Some("0724384960920"));
    assert_eq!(
        output.read_media_tag(MediaTagType::CdMcn).unwrap(),
        b"0724384960920".to_vec()
    );
    assert_eq!(output.set_tracks_calls(), 1);
}

#[test]
fn dump_hardware_is_dropped_by_formats_that_cannot_store_it() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.iso");
    let mut input = data_disc();
    input
        .set_dump_hardware(&[DumpHardware {
            model: Some("PX-760A".to_string()),
            extents: vec![Extent { start: 0, end: 254 }],
            ..DumpHardware::default()
        }])
        .unwrap();

    let mut output = IsoWriter::new();
    let mut engine =
        ConversionEngine::new(&mut input, &mut output, &path, ConvertOptions::default());
    engine.run().unwrap();
    assert_eq!(engine.state(), &ConversionState::Finalized);
}

#[test]
fn output_hash_is_reported_not_raised() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.iso");
    let expected = format!(
        "{:x}",
        md5::compute((0..255).flat_map(|s| pattern(s, 2048)).collect::<Vec<u8>>())
    );

    let mut input = data_disc();
    let mut output = IsoWriter::new();
    let options = ConvertOptions {
        expected_md5: Some(expected.clone()),
        ..ConvertOptions::default()
    };
    let report = ConversionEngine::new(&mut input, &mut output, &path, options)
        .run()
        .unwrap();
    assert_eq!(report.hash_matches, Some(true));
    assert_eq!(file_md5(&path).unwrap(), expected);

    let other = dir.path().join("other.iso");
    let mut input = data_disc();
    let mut output = IsoWriter::new();
    let options = ConvertOptions {
        expected_md5: Some("00000000000000000000000000000000".to_string()),
        ..ConvertOptions::default()
    };
    let report = ConversionEngine::new(&mut input, &mut output, &other, options)
        .run()
        .unwrap();
    assert_eq!(report.hash_matches, Some(false));
}

#[test]
fn a_failed_step_leaves_the_engine_failed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mixed.iso");
    let mut input = mixed_disc();
    let mut output = IsoWriter::new();

    let mut engine =
        ConversionEngine::new(&mut input, &mut output, &path, ConvertOptions::default());
    let err = engine.run().unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedMedia(MediaType::CdMixed)));
    assert!(matches!(engine.state(), ConversionState::Failed(_)));
    assert!(output.output_paths().is_empty());
}
