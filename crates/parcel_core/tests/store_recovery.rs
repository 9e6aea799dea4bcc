use parcel_core::db::migrations::latest_version;
use parcel_core::{JsonFileStore, PackageStatus, RecordStore, Station};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn decoded(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

fn side_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(".corrupt-"))
        .collect()
}

const LEGACY_STORE: &str = r#"[
  {
    "trackingNumber": "PKG-1700000000000",
    "sender": "Dhaka Depot",
    "receiver": "Rahim",
    "destination": "Rangpur",
    "status": "Pending",
    "createdAt": "2024-05-01T10:00:00.000Z",
    "updatedAt": "2024-05-01T10:00:00.000Z",
    "ownerId": "user_1"
  },
  {
    "id": "pkg_1700000000001_abc1234",
    "trackingNumber": "PKG-1700000000001",
    "sender": "Dhaka Depot",
    "receiver": "Karim",
    "destination": "Bogura",
    "status": "SHIPPED",
    "history": [
      { "status": "PENDING", "date": "2024-05-01T10:00:00.000Z" },
      { "status": "SHIPPED", "date": "2024-05-02T09:30:00.000Z" }
    ],
    "createdAt": "2024-05-01T10:00:00.000Z",
    "updatedAt": "2024-05-02T09:30:00.000Z",
    "station": "BOGURA",
    "coordinates": { "lat": 0, "lng": 0 }
  }
]"#;

#[test]
fn missing_file_is_initialized_to_empty_collection() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("db.json"));

    assert!(store.load().unwrap().is_empty());
    assert_eq!(decoded(store.path()), Value::Array(Vec::new()));
}

#[test]
fn blank_file_is_reset_to_empty_collection() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("db.json"));
    fs::write(store.path(), "  \n\t").unwrap();

    assert!(store.load().unwrap().is_empty());
    assert_eq!(decoded(store.path()), Value::Array(Vec::new()));
    assert!(side_files(dir.path()).is_empty());
}

#[test]
fn undecodable_content_is_reset_and_preserved_aside() {
    let cases: [&[u8]; 3] = [
        b"{\"truncated\": [",
        b"{\"packages\": []}",
        &[0xff, 0xfe, 0x00, 0x5b],
    ];

    for raw in cases {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("db.json"));
        fs::write(store.path(), raw).unwrap();

        assert!(store.load().unwrap().is_empty());
        assert_eq!(decoded(store.path()), Value::Array(Vec::new()));

        let preserved = side_files(dir.path());
        assert_eq!(preserved.len(), 1);
        assert_eq!(fs::read(dir.path().join(&preserved[0])).unwrap(), raw);
    }
}

#[test]
fn load_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("db.json"));
    fs::write(store.path(), LEGACY_STORE).unwrap();

    let first = store.load().unwrap();
    let second = store.load().unwrap();
    assert_eq!(first, second);
}

#[test]
fn save_of_load_is_byte_stable() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("db.json"));
    fs::write(store.path(), LEGACY_STORE).unwrap();

    let records = store.load().unwrap();
    store.save(&records).unwrap();
    let first_save = fs::read(store.path()).unwrap();

    let reloaded = store.load().unwrap();
    store.save(&reloaded).unwrap();
    assert_eq!(fs::read(store.path()).unwrap(), first_save);
}

#[test]
fn legacy_records_are_migrated_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("db.json"));
    fs::write(store.path(), LEGACY_STORE).unwrap();

    let records = store.load().unwrap();
    assert_eq!(records.len(), 2);

    let backfilled = &records[0];
    assert!(!backfilled.id.is_empty());
    assert_eq!(backfilled.status, PackageStatus::Pending);
    assert!(backfilled.history.is_none());
    assert!(backfilled.station.is_none());
    assert!(backfilled.coordinates.is_none());

    let routed = &records[1];
    assert_eq!(routed.id, "pkg_1700000000001_abc1234");
    assert_eq!(routed.station, Some(Station::Bogura));
    assert_eq!(routed.coordinates, Some(Station::Bogura.coordinates()));
    assert_eq!(routed.history_len(), 2);

    let on_disk = decoded(store.path());
    assert_eq!(on_disk[0]["id"].as_str(), Some(backfilled.id.as_str()));
    assert_eq!(on_disk[0]["status"], "PENDING");
    assert_eq!(on_disk[1]["coordinates"]["lat"], 24.8465);
    assert!(latest_version() >= 3);
}

#[test]
fn backfilled_ids_are_unique_and_stable_across_loads() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("db.json"));
    let record = r#"{"trackingNumber":"T","sender":"A","receiver":"B","destination":"C","status":"PENDING","createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z"}"#;
    fs::write(store.path(), format!("[{record},{record},{record}]")).unwrap();

    let first: Vec<_> = store.load().unwrap().into_iter().map(|r| r.id).collect();
    let unique: HashSet<_> = first.iter().collect();
    assert_eq!(unique.len(), 3);

    let second: Vec<_> = store.load().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(first, second);
}

#[test]
fn undecodable_records_are_quarantined_and_the_rest_kept() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("db.json"));
    let record = |id: &str, status: &str| {
        serde_json::json!({
            "id": id,
            "trackingNumber": format!("TRK-{id}"),
            "sender": "A",
            "receiver": "B",
            "destination": "C",
            "status": status,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        })
    };
    let contents = Value::Array(vec![
        record("pkg_1", "PENDING"),
        record("pkg_2", "SHIPPED"),
        record("pkg_3", "IN_TRANSIT"),
        Value::from(42),
    ]);
    fs::write(store.path(), serde_json::to_vec(&contents).unwrap()).unwrap();

    let ids: Vec<_> = store.load().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["pkg_1".to_string(), "pkg_2".to_string()]);

    let on_disk = decoded(store.path());
    assert_eq!(on_disk.as_array().unwrap().len(), 2);

    let preserved = side_files(dir.path());
    assert_eq!(preserved.len(), 1);
    let rejected = decoded(&dir.path().join(&preserved[0]));
    assert_eq!(rejected[0]["id"], "pkg_3");
    assert_eq!(rejected[0]["status"], "IN_TRANSIT");
    assert_eq!(rejected[1], 42);

    let reloaded: Vec<_> = store.load().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(reloaded, ids);
    assert_eq!(side_files(dir.path()).len(), 1);
}
