//! Integration tests for fileplotter.
//!
//! These exercise the reader, store, session and watcher together against
//! real files on disk, plain and compressed.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use fileplotter::config::Config;
use fileplotter::polling::run_polling_loop;
use fileplotter::render::{NullSink, RenderSink, SeriesKey};
use fileplotter::session::Session;
use fileplotter::source::{DelimitedReader, Frame, SizeProbe};
use fileplotter::store::{ColumnBuffer, DataStore, Point, PollOutcome, Selection, StoreConfig};
use fileplotter::watch::Watcher;

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn append(path: &Path, text: &str) {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    f.write_all(text.as_bytes()).unwrap();
}

fn store(max_rows: usize) -> DataStore {
    DataStore::new(StoreConfig {
        max_rows,
        ..StoreConfig::default()
    })
}

fn values(store: &DataStore, path: &Path, column: &str) -> Vec<f64> {
    store.get(path).unwrap().buffer(column).unwrap().values()
}

/// A table of `rows` rows over columns `t,a,b`.
fn table(rows: usize) -> String {
    let mut text = String::from("t,a,b\n");
    for i in 0..rows {
        text.push_str(&format!("{},{},{}\n", i, i * 2, i as f64 / 4.0));
    }
    text
}

fn write_gzip(path: &Path, data: &[u8]) {
    let mut enc = flate2::write::GzEncoder::new(File::create(path).unwrap(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap();
}

fn write_bzip2(path: &Path, data: &[u8]) {
    let mut enc = bzip2::write::BzEncoder::new(File::create(path).unwrap(), bzip2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap();
}

fn write_zstd(path: &Path, data: &[u8]) {
    let mut enc = zstd::stream::write::Encoder::new(File::create(path).unwrap(), 3).unwrap();
    enc.write_all(data).unwrap();
    enc.finish().unwrap();
}

// ============ Store scenarios ============

#[test]
fn test_two_polls_accumulate_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("x.csv");
    append(&path, "A,B,C\n1,2,3\n11,12,13\n");

    let mut store = store(10);
    let outcome = store.poll(&path, &cols(&["A", "C"]), &mut NullSink).unwrap();
    assert_eq!(outcome, PollOutcome::Updated { rows: 2, added: 2 });
    assert_eq!(values(&store, &path, "A"), vec![1.0, 11.0]);
    assert_eq!(values(&store, &path, "C"), vec![3.0, 13.0]);

    append(&path, "21,22,23\n31,32,33\n");
    let outcome = store.poll(&path, &cols(&["A", "C"]), &mut NullSink).unwrap();
    assert_eq!(outcome, PollOutcome::Updated { rows: 4, added: 2 });
    assert_eq!(values(&store, &path, "A"), vec![1.0, 11.0, 21.0, 31.0]);
    assert_eq!(values(&store, &path, "C"), vec![3.0, 13.0, 23.0, 33.0]);
    assert!(store.get(&path).unwrap().buffer("B").is_none());
}

#[test]
fn test_buffers_roll_over_at_capacity() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("x.csv");
    append(&path, "A,B,C\n1,2,3\n11,12,13\n");

    let mut store = store(2);
    store.poll(&path, &cols(&["A", "C"]), &mut NullSink).unwrap();
    append(&path, "21,22,23\n31,32,33\n");
    store.poll(&path, &cols(&["A", "C"]), &mut NullSink).unwrap();

    assert_eq!(values(&store, &path, "A"), vec![21.0, 31.0]);
    assert_eq!(values(&store, &path, "C"), vec![23.0, 33.0]);
    let indices = store.get(&path).unwrap().buffer("A").unwrap().indices();
    assert_eq!(indices, vec![2, 3]);
    assert_eq!(store.get(&path).unwrap().rows(), 4);
}

#[test]
fn test_quoted_labels_keep_values_aligned() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("labels.csv.gz");
    write_gzip(&path, b"name,v\n\"a,b\",7\n\"c\",8\n");

    let mut store = store(10);
    store.poll(&path, &cols(&["v"]), &mut NullSink).unwrap();
    assert_eq!(values(&store, &path, "v"), vec![7.0, 8.0]);
}

#[test]
fn test_absent_column_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("x.csv");
    append(&path, "A,B,C\n1,2,3\n11,12,13\n");

    let mut store = store(10);
    store.poll(&path, &cols(&["A", "C", "X"]), &mut NullSink).unwrap();
    let entry = store.get(&path).unwrap();
    assert_eq!(entry.buffers().keys().collect::<Vec<_>>(), vec!["A", "C"]);
}

#[test]
fn test_capacity_holds_last_points_across_many_appends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("x.csv");
    append(&path, "v\n");

    let mut store = store(5);
    let mut next = 0;
    for batch in [1, 3, 0, 4, 2, 7] {
        for _ in 0..batch {
            append(&path, &format!("{next}\n"));
            next += 1;
        }
        store.poll(&path, &cols(&["v"]), &mut NullSink).unwrap();
    }

    let buffer = store.get(&path).unwrap().buffer("v").unwrap();
    assert_eq!(buffer.len(), 5);
    assert_eq!(buffer.values(), vec![12.0, 13.0, 14.0, 15.0, 16.0]);
    // the last batch of 7 was cut to 5 before buffering; indices stay contiguous
    assert_eq!(buffer.indices(), vec![10, 11, 12, 13, 14]);
    assert_eq!(store.get(&path).unwrap().rows(), 15);
}

// ============ Reader properties ============

#[test]
fn test_growing_plain_file_reads_without_gaps_or_duplicates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("grow.csv");
    append(&path, "n,sq\n");

    let reader = DelimitedReader::default();
    let (mut seen, mut cursor) = {
        let (inc, cursor) = reader.read_increment(&path, None, None, None).unwrap();
        (inc.frame.column("n").unwrap().to_vec(), cursor)
    };
    let schema = reader.read_schema(&path).unwrap();

    let mut n = 0;
    for chunk in 0..6 {
        for _ in 0..chunk {
            append(&path, &format!("{},{}\n", n, n * n));
            n += 1;
        }
        // half-written line, finished on the next round
        append(&path, &format!("{},", n));
        let (inc, next) = reader
            .read_increment(&path, Some(cursor), Some(&schema), None)
            .unwrap();
        seen.extend_from_slice(inc.frame.column("n").unwrap());
        cursor = next;
        append(&path, &format!("{}\n", n * n));
        n += 1;
    }
    let (inc, _) = reader
        .read_increment(&path, Some(cursor), Some(&schema), None)
        .unwrap();
    seen.extend_from_slice(inc.frame.column("n").unwrap());

    let expected: Vec<f64> = (0..n).map(|i| i as f64).collect();
    assert_eq!(seen, expected);
}

fn assert_incremental_matches_full(path: &Path) {
    let reader = DelimitedReader::default();
    let full: Frame = reader.load_full(path).unwrap();
    let (inc, cursor) = reader.read_increment(path, None, None, None).unwrap();

    assert_eq!(full.num_rows(), 50);
    assert_eq!(inc.frame, full);
    assert!(matches!(inc.probe, SizeProbe::Exact(_)));
    assert_eq!(cursor.position(), table(50).len() as u64);
}

#[test]
fn test_incremental_matches_full_plain() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.csv");
    std::fs::write(&path, table(50)).unwrap();
    assert_incremental_matches_full(&path);
}

#[test]
fn test_incremental_matches_full_gzip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.csv.gz");
    write_gzip(&path, table(50).as_bytes());
    assert_incremental_matches_full(&path);
}

#[test]
fn test_incremental_matches_full_bzip2() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.csv.bz2");
    write_bzip2(&path, table(50).as_bytes());
    assert_incremental_matches_full(&path);
}

#[test]
fn test_incremental_matches_full_zstd() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.csv.zst");
    write_zstd(&path, table(50).as_bytes());
    assert_incremental_matches_full(&path);
}

#[test]
fn test_growing_gzip_file_is_tailed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("live.csv.gz");
    let mut enc = flate2::write::GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::fast());

    enc.write_all(b"t,v\n0,10\n1,11\n").unwrap();
    enc.flush().unwrap();

    let mut store = store(100);
    let outcome = store.poll(&path, &cols(&["v"]), &mut NullSink).unwrap();
    assert_eq!(outcome, PollOutcome::Updated { rows: 2, added: 2 });
    let probe = store.get(&path).unwrap().cursor().unwrap().last_probe().unwrap();
    assert!(!probe.is_exact());

    // unchanged compressed length: nothing new
    let outcome = store.poll(&path, &cols(&["v"]), &mut NullSink).unwrap();
    assert_eq!(outcome, PollOutcome::Updated { rows: 2, added: 0 });

    enc.write_all(b"2,12\n3,13\n").unwrap();
    enc.flush().unwrap();
    let outcome = store.poll(&path, &cols(&["v"]), &mut NullSink).unwrap();
    assert_eq!(outcome, PollOutcome::Updated { rows: 4, added: 2 });

    enc.write_all(b"4,14\n").unwrap();
    enc.finish().unwrap();
    let outcome = store.poll(&path, &cols(&["v"]), &mut NullSink).unwrap();
    assert_eq!(outcome, PollOutcome::Updated { rows: 5, added: 1 });
    assert_eq!(
        values(&store, &path, "v"),
        vec![10.0, 11.0, 12.0, 13.0, 14.0]
    );
    let probe = store.get(&path).unwrap().cursor().unwrap().last_probe().unwrap();
    assert!(probe.is_exact());
}

#[test]
fn test_load_full_recovers_rows_from_cut_off_gzip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cut.csv.gz");
    let mut enc = flate2::write::GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
    enc.write_all(table(20).as_bytes()).unwrap();
    enc.flush().unwrap();
    // encoder dropped without finish: no trailer
    std::mem::forget(enc);

    let frame = DelimitedReader::default().load_full(&path).unwrap();
    assert_eq!(frame.num_rows(), 20);
    assert_eq!(frame.column("a").unwrap()[19], 38.0);
}

// ============ Eviction ============

#[derive(Default)]
struct Recorder {
    live: Vec<SeriesKey>,
    points: usize,
}

impl RenderSink for Recorder {
    fn series_created(&mut self, key: &SeriesKey, buffer: &ColumnBuffer) {
        self.live.push(key.clone());
        self.points += buffer.len();
    }

    fn series_updated(&mut self, _key: &SeriesKey, _buffer: &ColumnBuffer, new_points: &[Point]) {
        self.points += new_points.len();
    }

    fn series_detached(&mut self, key: &SeriesKey) {
        self.live.retain(|k| k != key);
    }
}

#[test]
fn test_selection_change_evicts_and_reselect_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.csv");
    let b = dir.path().join("b.csv.gz");
    append(&a, "x,y\n1,2\n3,4\n");
    write_gzip(&b, b"x,y\n5,6\n");

    let mut session = Session::new(StoreConfig::default(), Recorder::default());
    session.select(Selection::new(vec![a.clone(), b.clone()], cols(&["x", "y"])));
    session.poll_cycle();
    assert_eq!(session.sink().live.len(), 4);
    assert_eq!(session.sink().points, 6);

    assert_eq!(session.select(Selection::new(vec![b.clone()], cols(&["x", "y"]))), 1);
    assert_eq!(
        session.sink().live,
        vec![SeriesKey::new(&b, "x"), SeriesKey::new(&b, "y")]
    );
    assert!(session.store().get(&a).is_none());

    // evicting again is a no-op
    assert_eq!(session.select(Selection::new(vec![b.clone()], cols(&["y"]))), 0);

    session.select(Selection::new(vec![a.clone(), b.clone()], cols(&["x"])));
    session.poll_cycle();
    let entry = session.store().get(&a).unwrap();
    assert_eq!(entry.rows(), 2);
    assert_eq!(entry.buffer("x").unwrap().indices(), vec![0, 1]);
}

#[test]
fn test_unreadable_file_does_not_stop_cycle() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.csv");
    let broken = dir.path().join("broken.csv.gz");
    append(&good, "v\n1\n");
    std::fs::write(&broken, b"definitely not gzip").unwrap();

    let mut session = Session::new(StoreConfig::default(), NullSink);
    session.select(Selection::new(vec![broken.clone(), good.clone()], cols(&["v"])));
    let summary = session.poll_cycle();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.polled, 1);
    assert!(session.store().get(&broken).is_none());
    assert_eq!(session.store().get(&good).unwrap().rows(), 1);
}

// ============ Configuration and scheduler ============

#[tokio::test(start_paused = true)]
async fn test_configured_watcher_runs_until_cancelled() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    let path: PathBuf = data.join("run.csv");
    append(&path, "step;loss\n0;1.5\n1;1.25\n");

    let config_path = dir.path().join("fileplotter.yaml");
    std::fs::write(
        &config_path,
        format!(
            "source:\n  directory: {}\nstore:\n  max_rows: 100\n  delimiter: \";\"\npoll_interval_ms: 100\ncolumns: [loss]\n",
            data.display()
        ),
    )
    .unwrap();
    let config = Config::from_file(&config_path).unwrap();
    config.validate().unwrap();

    let session = Session::new(config.store_config().unwrap(), NullSink);
    let mut watcher = Watcher::new(session, config.source.clone(), config.columns.clone());

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(350)).await;
        trigger.cancel();
    });
    run_polling_loop(&mut watcher, config.poll_interval(), shutdown)
        .await
        .unwrap();

    let store = watcher.session().store();
    assert_eq!(values(store, &path, "loss"), vec![1.5, 1.25]);
    assert!(store.get(&path).unwrap().buffer("step").is_none());
}
