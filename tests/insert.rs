mod support;

use approx::assert_relative_eq;
use fmidi::host::{MemoryHost, META_DECODER, META_FILETYPE, META_TITLE, META_URI};
use fmidi::{estimate_duration, probe_file, FmidiError};
use support::{mock_decoder, tiny_midi, vlq, write_file, MockConfig, MockFactory};
use tempfile::tempdir;

#[test]
fn vlq_encodes_multi_byte_values() {
    assert_eq!(vlq(0), vec![0x00]);
    assert_eq!(vlq(0x7F), vec![0x7F]);
    assert_eq!(vlq(9600), vec![0xCB, 0x00]);
}

#[test]
fn duration_follows_ticks_tempo_and_division() {
    let dir = tempdir().unwrap();
    let fname = write_file(&dir, "song.mid", &tiny_midi(96, 9600, 500_000));
    let decoder = mock_decoder(MockConfig {
        ticks: 9600,
        bpm: 120.0,
        ..Default::default()
    });
    let host = MemoryHost::new();
    let playlist = host.new_playlist();

    let item = decoder.insert(&host, &playlist, None, &fname).unwrap();

    assert_relative_eq!(host.duration(&item).unwrap(), 50.0);
    assert_eq!(host.playlist_items(&playlist), vec![item]);
}

#[test]
fn probe_primes_engine_before_reading_timing() {
    let dir = tempdir().unwrap();
    let fname = write_file(&dir, "song.mid", &tiny_midi(480, 1920, 500_000));
    let factory = MockFactory::new(MockConfig {
        ticks: 1920,
        bpm: 60.0,
        ..Default::default()
    });

    let seconds = estimate_duration(&factory, fname.as_ref()).unwrap();

    assert_relative_eq!(seconds, 4.0);
    assert_eq!(
        factory.ledger.entries(),
        vec![
            "create",
            "add_file",
            "play",
            "write",
            "drop player",
            "drop synth",
            "drop settings"
        ]
    );
}

#[test]
fn metadata_matches_host_expectations() {
    let dir = tempdir().unwrap();
    let fname = write_file(&dir, "song.mid", &tiny_midi(96, 96, 500_000));
    let decoder = mock_decoder(MockConfig::default());
    let host = MemoryHost::new();
    let playlist = host.new_playlist();

    let item = decoder.insert(&host, &playlist, None, &fname).unwrap();

    assert_eq!(host.meta(&item, META_URI).as_deref(), Some(fname.as_str()));
    assert_eq!(host.meta(&item, META_DECODER).as_deref(), Some("fmidi"));
    assert_eq!(host.meta(&item, META_FILETYPE).as_deref(), Some("MID"));
    assert!(host.has_meta(&item, META_TITLE));
    assert_eq!(host.meta(&item, META_TITLE), None);
    // one reference held by the playlist, the allocation reference released
    assert_eq!(host.refs(&item), 1);
}

#[test]
fn non_midi_file_is_rejected_before_any_engine_exists() {
    let dir = tempdir().unwrap();
    let fname = write_file(&dir, "song.wav", b"RIFF\x24\x00\x00\x00WAVEfmt ");
    let decoder = mock_decoder(MockConfig::default());
    let host = MemoryHost::new();
    let playlist = host.new_playlist();

    assert_eq!(decoder.insert(&host, &playlist, None, &fname), None);
    assert_eq!(decoder.factory().created(), 0);
    assert_eq!(host.item_count(), 0);
    assert!(host.playlist_items(&playlist).is_empty());
}

#[test]
fn missing_file_is_rejected() {
    let decoder = mock_decoder(MockConfig::default());
    let host = MemoryHost::new();
    let playlist = host.new_playlist();

    assert_eq!(
        decoder.insert(&host, &playlist, None, "/nonexistent/song.mid"),
        None
    );
    assert_eq!(host.item_count(), 0);
}

#[test]
fn truncated_header_is_rejected_without_playlist_changes() {
    let dir = tempdir().unwrap();
    let fname = write_file(&dir, "short.mid", b"MThd\x00\x00\x00\x06\x00\x00");
    let decoder = mock_decoder(MockConfig::default());
    let host = MemoryHost::new();
    let playlist = host.new_playlist();

    assert_eq!(decoder.insert(&host, &playlist, None, &fname), None);
    assert_eq!(host.item_count(), 0);
    assert_eq!(decoder.factory().created(), 0);
}

#[test]
fn unusable_divisions_are_rejected() {
    let dir = tempdir().unwrap();
    let zero = write_file(&dir, "zero.mid", &tiny_midi(0, 96, 500_000));
    let smpte = write_file(&dir, "smpte.mid", &tiny_midi(0xE728, 96, 500_000));
    let factory = MockFactory::new(MockConfig::default());

    assert!(matches!(
        probe_file(&factory, zero.as_ref()),
        Err(FmidiError::Header(_))
    ));
    assert!(matches!(
        probe_file(&factory, smpte.as_ref()),
        Err(FmidiError::Header(_))
    ));
    assert_eq!(factory.created(), 0);
}

#[test]
fn engine_failure_inserts_without_duration() {
    let dir = tempdir().unwrap();
    let fname = write_file(&dir, "song.mid", &tiny_midi(96, 96, 500_000));
    let decoder = mock_decoder(MockConfig {
        create_fails: true,
        ..Default::default()
    });
    let host = MemoryHost::new();
    let playlist = host.new_playlist();

    let item = decoder.insert(&host, &playlist, None, &fname).unwrap();

    assert_eq!(host.duration(&item), None);
    assert_eq!(host.meta(&item, META_FILETYPE).as_deref(), Some("MID"));
}

#[test]
fn zero_tempo_inserts_without_duration() {
    let dir = tempdir().unwrap();
    let fname = write_file(&dir, "song.mid", &tiny_midi(96, 96, 500_000));
    let factory = MockFactory::new(MockConfig {
        bpm: 0.0,
        ..Default::default()
    });

    assert!(matches!(
        estimate_duration(&factory, fname.as_ref()),
        Err(FmidiError::InvalidTiming { divisions: 96, .. })
    ));
    assert_eq!(probe_file(&factory, fname.as_ref()).unwrap().duration_secs, None);
}

#[test]
fn insert_places_items_after_anchor() {
    let dir = tempdir().unwrap();
    let a = write_file(&dir, "a.mid", &tiny_midi(96, 96, 500_000));
    let b = write_file(&dir, "b.mid", &tiny_midi(96, 96, 500_000));
    let c = write_file(&dir, "c.mid", &tiny_midi(96, 96, 500_000));
    let decoder = mock_decoder(MockConfig::default());
    let host = MemoryHost::new();
    let playlist = host.new_playlist();

    let first = decoder.insert(&host, &playlist, None, &a).unwrap();
    let third = decoder.insert(&host, &playlist, Some(&first), &c).unwrap();
    let second = decoder.insert(&host, &playlist, Some(&first), &b).unwrap();

    assert_eq!(host.playlist_items(&playlist), vec![first, second, third]);
}

#[test]
fn refused_insert_returns_none() {
    let dir = tempdir().unwrap();
    let fname = write_file(&dir, "song.mid", &tiny_midi(96, 96, 500_000));
    let decoder = mock_decoder(MockConfig::default());
    let host = MemoryHost::new();
    let playlist = host.new_playlist();
    let elsewhere = host.new_playlist();
    let stranger = decoder.insert(&host, &elsewhere, None, &fname).unwrap();

    assert_eq!(
        decoder.insert(&host, &playlist, Some(&stranger), &fname),
        None
    );
    assert!(host.playlist_items(&playlist).is_empty());
}
