use reactmon_daemon::config::SourceConfig;
use reactmon_daemon::source::{self, DataSource, FileSource, RemoteSource, TransportError};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_file_source_reads_snapshot() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(br#"[{"id":"t1","actions":[]}]"#).unwrap();

    let source = FileSource::new(file.path().to_path_buf());
    let bytes = source.fetch_snapshot().await.unwrap();
    assert_eq!(bytes, br#"[{"id":"t1","actions":[]}]"#);
    assert!(!source.is_live());
    assert!(source.describe().starts_with("file:"));
}

#[tokio::test]
async fn test_missing_file_is_transport_error() {
    let source = FileSource::new(PathBuf::from("/nonexistent/reactmon/snapshot.json"));
    let err = source.fetch_snapshot().await.unwrap_err();
    assert!(matches!(err, TransportError::Io { .. }));
}

#[test]
fn test_remote_url() {
    let source = RemoteSource::new("localhost:20000", "call_tree", Duration::from_secs(1)).unwrap();
    assert_eq!(source.url(), "http://localhost:20000/call_tree");
    assert!(source.is_live());
}

#[test]
fn test_open_maps_config() {
    let remote = source::open(&SourceConfig::remote("127.0.0.1:8080")).unwrap();
    assert!(remote.is_live());
    assert!(remote.describe().contains("127.0.0.1:8080"));

    let file = source::open(&SourceConfig::file("/tmp/trees.json")).unwrap();
    assert!(!file.is_live());
    assert_eq!(file.describe(), "file:/tmp/trees.json");
}

#[tokio::test]
async fn test_unreachable_remote_fails() {
    // Port 9 (discard) is not expected to serve HTTP.
    let source = RemoteSource::new("127.0.0.1:9", "call_tree", Duration::from_millis(500)).unwrap();
    assert!(source.fetch_snapshot().await.is_err());
}
