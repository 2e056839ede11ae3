use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use gb_app::{SegmentSettings, read_segment_store};
use gb_core::{ControlCommand, SensorReport};
use gb_results::{Sample, SegmentId, SegmentStore};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("{}_{}", prefix, nanos));
    dir
}

fn sample(timestamp: f64) -> Sample {
    Sample {
        report: SensorReport {
            moisture: 35,
            temp_inner: 22,
            humd_inner: 55,
            temp_outer: 16,
            humd_outer: 61,
            illumination: None,
        },
        command: ControlCommand::off(),
        timestamp,
    }
}

#[test]
fn listing_leaves_stale_partials_in_place() {
    let dir = unique_temp_dir("gb_app_listing");
    let writer = SegmentStore::new(dir.clone()).expect("store");
    let sealed = SegmentId::for_window_start(0.0).expect("id");
    let stale = SegmentId::for_window_start(1800.0).expect("id");
    let newest = SegmentId::for_window_start(3600.0).expect("id");
    writer.write_sealed(&sealed, &[sample(1.0)]).expect("seal");
    writer.append_partial(&stale, &sample(1801.0)).expect("append");
    writer.append_partial(&newest, &sample(3601.0)).expect("append");

    let settings = SegmentSettings {
        dir: dir.clone(),
        ..SegmentSettings::default()
    };
    let store = read_segment_store(&settings)
        .expect("read store")
        .expect("segments on disk");
    let ids = store.recent(50, true).expect("list");
    assert_eq!(ids, vec![newest.clone(), stale.clone(), sealed.clone()]);
    assert_eq!(store.load(&stale).expect("load").len(), 1);

    assert_eq!(writer.list_partial().expect("partials"), vec![stale, newest]);
    assert_eq!(writer.list_sealed().expect("sealed"), vec![sealed]);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn missing_or_in_memory_history_has_no_store() {
    let dir = unique_temp_dir("gb_app_listing_missing");
    let settings = SegmentSettings {
        dir: dir.clone(),
        ..SegmentSettings::default()
    };
    assert!(read_segment_store(&settings).expect("read").is_none());
    assert!(!dir.exists());

    let in_memory = SegmentSettings {
        in_memory: true,
        ..SegmentSettings::default()
    };
    assert!(read_segment_store(&in_memory).expect("read").is_none());
}
