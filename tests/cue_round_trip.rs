mod common;

use common::{data_disc, layout, mixed_disc};
use disc_converto::cd::sector::SectorTagType;
use disc_converto::convert::{ConversionEngine, ConvertOptions};
use disc_converto::formats::cue::{CueImage, subchannel_path};
use disc_converto::image::models::{DumpHardware, Extent, MediaType};
use disc_converto::verify::read_through;
use disc_converto::{FormatRegistry, ImageReader, ImageWriter};
use tempfile::tempdir;

fn long() -> ConvertOptions {
    ConvertOptions {
        long: true,
        ..ConvertOptions::default()
    }
}

#[test]
fn data_disc_keeps_sectors_user_data_and_subchannel() {
    let dir = tempdir().unwrap();
    let cue = dir.path().join("disc.cue");
    let mut input = data_disc();

    ConversionEngine::new(&mut input, &mut disc_converto::formats::cue::CueWriter::new(), &cue, long())
        .run()
        .unwrap();
    assert!(subchannel_path(&cue).exists());

    let mut output = CueImage::open(&cue).unwrap();
    assert_eq!(output.info().sectors, 255);
    assert_eq!(layout(output.tracks()), layout(input.tracks()));

    let track = &output.tracks()[0];
    assert_eq!((track.start, track.end, track.pregap), (0, 254, 150));
    assert_eq!(track.flags.bits(), 4);

    let expected = read_through(&mut input, None).unwrap();
    let actual = read_through(&mut output, None).unwrap();
    assert_eq!(actual.sectors, 255);
    assert_eq!(actual.user_data_md5, expected.user_data_md5);
    assert_eq!(actual.long_md5, expected.long_md5);
    assert_eq!(actual.subchannel_md5, expected.subchannel_md5);
}

#[test]
fn mixed_disc_layout_survives_a_round_trip() {
    let dir = tempdir().unwrap();
    let cue = dir.path().join("mixed.cue");
    let registry = FormatRegistry::with_builtin();
    let mut input = mixed_disc();
    input
        .set_dump_hardware(&[DumpHardware {
            manufacturer: Some("PLEXTOR".to_string()),
            extents: vec![Extent { start: 0, end: 1299 }],
            ..DumpHardware::default()
        }])
        .unwrap();

    let mut writer = registry.writer_for(&cue, None).unwrap();
    let report = ConversionEngine::new(&mut input, writer.as_mut(), &cue, long())
        .run()
        .unwrap();
    assert_eq!(report.sectors, 1300);
    assert_eq!(report.cooked_fallbacks, 0);

    let mut output = registry.open(&cue).unwrap();
    assert_eq!(output.format_name(), "cue");
    assert_eq!(output.info().media_type, MediaType::CdMixed);
    assert_eq!(layout(output.tracks()), layout(input.tracks()));
    assert_eq!(output.sessions(), input.sessions());
    assert_eq!(
        output.dump_hardware().map(<[_]>::to_vec),
        input.dump_hardware().map(<[_]>::to_vec)
    );

    for sector in [0, 599, 600, 749, 750, 1000, 1299] {
        assert_eq!(
            output.read_sector_long(sector).unwrap(),
            input.read_sector_long(sector).unwrap(),
            "sector {sector}"
        );
    }
    assert_eq!(
        output.read_track_tag(2, SectorTagType::TrackFlags).unwrap(),
        vec![0]
    );
}

#[test]
fn cooked_copy_without_subchannel_writes_no_sub_file() {
    let dir = tempdir().unwrap();
    let cue = dir.path().join("cooked.cue");
    let mut input = data_disc();
    let mut writer = disc_converto::formats::cue::CueWriter::new();

    ConversionEngine::new(&mut input, &mut writer, &cue, ConvertOptions::default())
        .run()
        .unwrap();

    assert!(!subchannel_path(&cue).exists());
    assert_eq!(writer.output_paths(), vec![cue.clone(), cue.with_extension("bin")]);
    assert_eq!(
        std::fs::metadata(cue.with_extension("bin")).unwrap().len(),
        255 * 2352
    );
}

#[test]
fn long_copy_with_subchannel_switched_off_skips_it() {
    let dir = tempdir().unwrap();
    let cue = dir.path().join("nosub.cue");
    let mut input = data_disc();
    let mut writer = disc_converto::formats::cue::CueWriter::new();
    let options = ConvertOptions {
        options: [("subchannel".to_string(), "false".to_string())].into(),
        ..long()
    };

    let report = ConversionEngine::new(&mut input, &mut writer, &cue, options)
        .run()
        .unwrap();
    assert_eq!(report.long_chunks, 1);
    assert!(!subchannel_path(&cue).exists());

    let mut output = CueImage::open(&cue).unwrap();
    assert!(
        !output
            .info()
            .readable_sector_tags
            .contains(&SectorTagType::Subchannel)
    );
    assert_eq!(
        read_through(&mut output, None).unwrap().long_md5,
        read_through(&mut input, None).unwrap().long_md5
    );
}
