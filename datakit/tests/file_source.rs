#![cfg(feature = "test-utils")]

use std::io::Write;
use std::sync::Arc;

use config::shared::FileSourceConfig;
use datakit::assembler::{Binding, EventAssembler};
use datakit::cache::{CollisionPolicy, KeyNormalization, KeyedCache};
use datakit::error::ErrorKind;
use datakit::source::{CsvRowSource, RowSource};
use datakit::test_utils::row::row;
use datakit::types::{Cell, Row};
use futures::{StreamExt, TryStreamExt};
use telemetry::tracing::init_test_tracing;
use tempfile::NamedTempFile;

fn write_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

async fn read_all(source: &CsvRowSource) -> Vec<Row> {
    source.rows().await.unwrap().try_collect().await.unwrap()
}

#[tokio::test]
async fn rows_cross_chunk_boundaries() {
    init_test_tracing();

    let mut contents = String::from("id,score\n");
    for id in 0..25 {
        contents.push_str(&format!("{id},{}.5\n", id * 2));
    }
    let file = write_file(&contents);

    let source = CsvRowSource::new("scores", file.path()).with_chunk_size(4);
    let rows = read_all(&source).await;

    assert_eq!(rows.len(), 25);
    assert_eq!(
        rows[24],
        row([("id", Cell::I64(24)), ("score", Cell::F64(48.5))])
    );
    for (index, row) in rows.iter().enumerate() {
        assert_eq!(row.get("id"), Some(&Cell::I64(index as i64)));
    }
}

#[tokio::test]
async fn chunk_size_matching_row_count_ends_cleanly() {
    let file = write_file("id\n1\n2\n3\n4\n");

    let source = CsvRowSource::new("ids", file.path()).with_chunk_size(2);

    assert_eq!(read_all(&source).await.len(), 4);
}

#[tokio::test]
async fn fields_are_inferred_unless_kept_as_text() {
    let file = write_file("postcode,price,flag,note\n01234,10,TRUE,\n99,2.5,false,hi\n");

    let source = CsvRowSource::new("homes", file.path()).with_text_columns(["postcode"]);
    let rows = read_all(&source).await;

    assert_eq!(
        rows[0],
        row([
            ("postcode", Cell::from("01234")),
            ("price", Cell::F64(10.0)),
            ("flag", Cell::Bool(true)),
            ("note", Cell::Null),
        ])
    );
    assert_eq!(rows[1].get("price"), Some(&Cell::F64(2.5)));
    assert_eq!(rows[1].get("note"), Some(&Cell::from("hi")));
}

#[tokio::test]
async fn mixed_column_is_read_as_text() {
    let file = write_file("code,label\n1,one\nA,letter\n");

    let source = CsvRowSource::new("codes", file.path());
    let rows = read_all(&source).await;

    assert_eq!(rows[0].get("code"), Some(&Cell::from("1")));
    assert_eq!(rows[1].get("code"), Some(&Cell::from("A")));

    let mut cache = KeyedCache::new("codes", source, ["label"]);
    cache.build().await.unwrap();

    let assembler = EventAssembler::new(
        vec![Binding::new("label", Arc::new(cache))],
        CollisionPolicy::Reject,
    )
    .unwrap();
    let merged = assembler
        .assemble_one(row([("label", Cell::from("letter"))]))
        .unwrap();

    assert_eq!(merged.get("code"), Some(&Cell::from("A")));
}

#[tokio::test]
async fn column_kind_is_fixed_by_the_first_chunk() {
    let file = write_file("code\n1\n2\nA\n");

    let source = CsvRowSource::new("codes", file.path()).with_chunk_size(2);
    let mut cache = KeyedCache::new("codes", source, ["code"]);

    let err = cache.build().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedRow);
}

#[tokio::test]
async fn projection_and_delimiter_are_honoured() {
    let file = write_file("a;b;c\n1;2;3\n");

    let source = CsvRowSource::new("semi", file.path())
        .with_delimiter(b';')
        .with_columns(["c", "a"]);

    assert_eq!(
        read_all(&source).await,
        vec![row([("c", Cell::I64(3)), ("a", Cell::I64(1))])]
    );
}

#[tokio::test]
async fn unknown_projected_column_is_a_config_error() {
    let file = write_file("a,b\n1,2\n");

    let source = CsvRowSource::new("ab", file.path()).with_columns(["z"]);
    let err = source.rows().await.err().unwrap();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}

#[tokio::test]
async fn missing_file_is_a_source_io_error() {
    let source = CsvRowSource::new("missing", "/definitely/not/here.csv");

    let err = source.rows().await.err().unwrap();

    assert_eq!(err.kind(), ErrorKind::SourceIoError);
    assert!(err.detail().unwrap().contains("here.csv"));
}

#[tokio::test]
async fn short_record_is_propagated_as_malformed() {
    let file = write_file("id,genre\n1,x\n2\n3,z\n");

    let source = CsvRowSource::new("genres", file.path());
    let mut rows = source.rows().await.unwrap();

    assert!(rows.next().await.unwrap().is_ok());
    let err = rows.next().await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedRow);
}

#[tokio::test]
async fn dropping_the_stream_early_releases_the_reader() {
    let mut contents = String::from("id\n");
    for id in 0..1_000 {
        contents.push_str(&format!("{id}\n"));
    }
    let file = write_file(&contents);
    let source = CsvRowSource::new("ids", file.path()).with_chunk_size(10);

    let first: Vec<Row> = source.rows().await.unwrap().take(3).try_collect().await.unwrap();
    assert_eq!(first.len(), 3);

    // A fresh pass starts from the first row again.
    let again: Vec<Row> = source.rows().await.unwrap().take(1).try_collect().await.unwrap();
    assert_eq!(again[0].get("id"), Some(&Cell::I64(0)));
}

#[tokio::test]
async fn file_backed_cache_joins_normalized_postcodes() {
    let prices = write_file("postcode,price\nsw1a 1aa,100\nSW1A-1AA,300\ne1 6an,50\n");
    let config = FileSourceConfig {
        path: prices.path().to_path_buf(),
        chunk_size: 2,
        delimiter: ",".to_string(),
        columns: None,
        text_columns: vec!["postcode".to_string()],
    };

    let mut cache = KeyedCache::new(
        "prices",
        CsvRowSource::from_config("prices", &config).unwrap(),
        ["postcode"],
    )
    .with_key_normalization(KeyNormalization::Compact)
    .with_rename([("price", "area_price")]);
    cache.build().await.unwrap();

    let assembler = EventAssembler::new(
        vec![Binding::new("postcode", Arc::new(cache))],
        CollisionPolicy::Reject,
    )
    .unwrap();

    let merged = assembler
        .assemble_one(row([("postcode", Cell::from("Sw1A1aA"))]))
        .unwrap();

    assert_eq!(merged.get("area_price"), Some(&Cell::I64(300)));
}

#[test]
fn invalid_delimiter_is_rejected() {
    let config = FileSourceConfig {
        path: "events.csv".into(),
        chunk_size: 10,
        delimiter: "::".to_string(),
        columns: None,
        text_columns: vec![],
    };

    let err = CsvRowSource::from_config("events", &config).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}
