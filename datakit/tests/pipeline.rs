#![cfg(feature = "test-utils")]

use std::io::Write;
use std::path::Path;

use config::shared::AssemblyConfig;
use datakit::error::ErrorKind;
use datakit::pipeline::AssemblyPipeline;
use datakit::types::Cell;
use serde_json::json;
use telemetry::tracing::init_test_tracing;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path_string(&path)
}

fn path_string(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

fn file(path: &str) -> serde_json::Value {
    json!({"type": "file", "path": path, "chunk_size": 2})
}

fn config(value: serde_json::Value) -> AssemblyConfig {
    serde_json::from_value(value).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_pipeline_joins_and_shares_caches() {
    init_test_tracing();

    let dir = TempDir::new().unwrap();
    let genres = write(&dir, "genres.csv", "id,genre\n1,x\n2,y\n");
    let scores = write(&dir, "scores.csv", "id,score\n1,0.5\n2,0.75\n");
    let events = write(
        &dir,
        "events.csv",
        "user_id,opener_id,viewer_id\n1,1,2\n9,2,9\n",
    );

    let mut pipeline = AssemblyPipeline::from_config(&config(json!({
        "caches": [
            {"name": "genres", "source": file(&genres), "key": "id"},
            {"name": "opener", "source": file(&scores), "key": "id", "suffix": "a"},
            {"name": "viewer", "share_with": "opener", "key": "id", "suffix": "b"},
        ],
        "bindings": [
            {"key": "user_id", "cache": "genres"},
            {"key": "opener_id", "cache": "opener"},
            {"key": "viewer_id", "cache": "viewer"},
        ],
        "events": file(&events),
    })))
    .unwrap();

    let table = pipeline.run().await.unwrap();

    assert_eq!(
        table.column_names(),
        ["user_id", "opener_id", "viewer_id", "genre", "score_a", "score_b"]
    );
    assert_eq!(table.column("genre").unwrap(), [Cell::from("x"), Cell::Null]);
    assert_eq!(
        table.column("score_a").unwrap(),
        [Cell::F64(0.5), Cell::F64(0.75)]
    );
    assert_eq!(
        table.column("score_b").unwrap(),
        [Cell::F64(0.75), Cell::Null]
    );

    let stats = pipeline.cache_stats();
    let (_, genres_stats) = stats.iter().find(|(name, _)| *name == "genres").unwrap();
    assert_eq!(genres_stats.lookups, 2);
    assert_eq!(genres_stats.misses, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn parallel_workers_produce_the_same_table() {
    let dir = TempDir::new().unwrap();
    let genres = write(&dir, "genres.csv", "id,genre\n1,x\n2,y\n3,z\n");
    let mut events = String::from("user_id\n");
    for id in 0..40 {
        events.push_str(&format!("{}\n", id % 5));
    }
    let events = write(&dir, "events.csv", &events);

    let build = |workers: usize| {
        config(json!({
            "caches": [{"name": "genres", "source": file(&genres), "key": "id"}],
            "bindings": [{"key": "user_id", "cache": "genres"}],
            "events": file(&events),
            "workers": workers,
        }))
    };

    let sequential = AssemblyPipeline::from_config(&build(1))
        .unwrap()
        .run()
        .await
        .unwrap();
    let parallel = AssemblyPipeline::from_config(&build(4))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(sequential, parallel);
    assert_eq!(parallel.num_rows(), 40);
}

#[tokio::test]
async fn alias_of_an_alias_is_rejected() {
    let dir = TempDir::new().unwrap();
    let scores = write(&dir, "scores.csv", "id,score\n1,1\n");
    let events = write(&dir, "events.csv", "id\n1\n");

    let mut pipeline = AssemblyPipeline::from_config(&config(json!({
        "caches": [
            {"name": "a", "source": file(&scores), "key": "id", "suffix": "a"},
            {"name": "b", "share_with": "a", "key": "id", "suffix": "b"},
            {"name": "c", "share_with": "b", "key": "id", "suffix": "c"},
        ],
        "bindings": [{"key": "id", "cache": "c"}],
        "events": file(&events),
    })))
    .unwrap();

    let err = pipeline.build().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}

#[test]
fn invalid_configuration_is_a_config_error() {
    let err = AssemblyPipeline::from_config(&config(json!({
        "caches": [{"name": "genres", "source": file("genres.csv"), "key": "id"}],
        "bindings": [{"key": "user_id", "cache": "unknown"}],
        "events": file("events.csv"),
    })))
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}

#[tokio::test]
async fn missing_key_column_in_cache_source_names_the_cache() {
    let dir = TempDir::new().unwrap();
    let genres = write(&dir, "genres.csv", "movie,genre\n1,x\n");
    let events = write(&dir, "events.csv", "id\n1\n");

    let mut pipeline = AssemblyPipeline::from_config(&config(json!({
        "caches": [{"name": "genres", "source": file(&genres), "key": "id"}],
        "bindings": [{"key": "id", "cache": "genres"}],
        "events": file(&events),
    })))
    .unwrap();

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert!(err.detail().unwrap().contains("cache `genres`"));
}

#[tokio::test]
async fn failed_binding_check_repeats_on_the_next_build() {
    let dir = TempDir::new().unwrap();
    let genres = write(&dir, "genres.csv", "id,genre\n1,x\n");
    let events = write(&dir, "events.csv", "user_id,friend_id\n1,1\n");

    let mut pipeline = AssemblyPipeline::from_config(&config(json!({
        "caches": [{"name": "genres", "source": file(&genres), "key": "id"}],
        "bindings": [
            {"key": "user_id", "cache": "genres"},
            {"key": "friend_id", "cache": "genres"},
        ],
        "events": file(&events),
    })))
    .unwrap();

    let first = pipeline.build().await.unwrap_err();
    let second = pipeline.build().await.unwrap_err();

    assert_eq!(first.kind(), ErrorKind::ConfigError);
    assert_eq!(first.description(), "Two bindings write the same column");
    assert_eq!(second.kind(), first.kind());
    assert_eq!(second.description(), first.description());
    assert!(pipeline.cache_stats().is_empty());
}
