mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ManualTransport;
use meshview_source::{
	ConfigError, DataSourceManager, Descriptor, MemoryStorage, SettingsStore, SourceError, SourceEvent, SourceSettings,
	SourceState,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn seeded_settings() -> Arc<SettingsStore<MemoryStorage>> {
	Arc::new(SettingsStore::new(MemoryStorage::seeded([(
		"consul:token",
		json!({ "AccessorID": "a1", "SecretID": "s3cr3t" }),
	)])))
}

#[test]
fn settings_source_delivers_first_message_inside_open() {
	let store = seeded_settings();
	let manager = DataSourceManager::builder().protocol("settings", store).build();

	let source = manager.open(&Descriptor::new("settings://consul:token")).unwrap();
	assert_eq!(source.state(), SourceState::Open);
	let current = source.current().expect("first message must be available synchronously");
	assert_eq!(current.payload(), Some(&json!({ "AccessorID": "a1", "SecretID": "s3cr3t" })));
}

#[tokio::test]
async fn settings_source_streams_later_writes() {
	let store = seeded_settings();
	let manager = DataSourceManager::builder().protocol("settings", Arc::clone(&store) as _).build();
	let source = manager.open(&Descriptor::new("settings://consul:{key}").param("key", "token")).unwrap();
	let mut events = source.subscribe();

	store.set("consul:token", json!({ "SecretID": "rotated" }));
	let event = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
	assert_eq!(event.payload(), Some(&json!({ "SecretID": "rotated" })));

	store.remove("consul:token");
	let event = tokio::time::timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap();
	assert_eq!(event.payload(), Some(&serde_json::Value::Null));
}

#[test]
fn configuration_errors_are_returned_before_any_read() {
	let (transport, _reads) = ManualTransport::new();
	let manager = DataSourceManager::builder().protocol("consul", Arc::clone(&transport) as _).build();

	let err = manager.open(&Descriptor::new("/{dc}/services")).unwrap_err();
	assert!(matches!(err, SourceError::Config(ConfigError::UnresolvedPlaceholder { ref name, .. }) if name == "dc"));

	let err = manager.open(&Descriptor::new("http://catalog/services")).unwrap_err();
	assert_eq!(err, SourceError::Config(ConfigError::UnknownProtocol("http".into())));

	assert_eq!(transport.total_reads(), 0);
	assert!(manager.snapshots().is_empty());
}

#[tokio::test(start_paused = true)]
async fn same_uri_shares_one_source() {
	let (transport, reads) = ManualTransport::new();
	let manager = DataSourceManager::builder().protocol("consul", Arc::clone(&transport) as _).build();
	let descriptor = Descriptor::new("/{dc}/nodes").param("dc", "dc1");

	let list = manager.open(&descriptor).unwrap();
	let badge = manager.open(&Descriptor::new("/dc1/nodes")).unwrap();
	let mut list_events = list.subscribe();
	let mut badge_events = badge.subscribe();

	reads.next_read().await.ok(json!(["node-1"]), 3);
	let _ = reads.next_read().await;
	assert_eq!(transport.total_reads(), 2, "both consumers ride on one read loop");
	assert_eq!(list_events.recv().await.unwrap(), badge_events.recv().await.unwrap());
	assert_eq!(manager.snapshots().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn closed_source_is_replaced_on_open() {
	let (transport, reads) = ManualTransport::new();
	let manager = DataSourceManager::builder().protocol("consul", transport as _).build();
	let descriptor = Descriptor::new("/dc1/services");

	let first = manager.open(&descriptor).unwrap();
	reads.next_read().await.ok(json!([]), 9);
	let _ = reads.next_read().await;
	first.close();

	let second = manager.open(&descriptor).unwrap();
	assert_eq!(reads.next_read().await.index(), None, "a fresh source starts without a cursor");
	assert_eq!(first.state(), SourceState::Closed);
	assert_eq!(second.state(), SourceState::Open);
}

#[tokio::test(start_paused = true)]
async fn close_all_reaches_a_superseded_source_reopened_by_its_holder() {
	let (transport, reads) = ManualTransport::new();
	let manager = DataSourceManager::builder().protocol("consul", transport as _).build();
	let descriptor = Descriptor::new("/dc1/services");

	let first = manager.open(&descriptor).unwrap();
	reads.next_read().await.ok(json!([]), 9);
	let _ = reads.next_read().await;
	first.close();

	let second = manager.open(&descriptor).unwrap();
	let _ = reads.next_read().await;
	first.reopen().unwrap();
	assert_eq!(reads.next_read().await.index(), Some(9));

	let records = manager.snapshots();
	assert_eq!(records.len(), 2);
	assert!(records.iter().all(|r| r.uri.to_string() == "consul:///dc1/services" && r.state == SourceState::Open));

	assert_eq!(manager.close_all(), 2);
	assert_eq!(first.state(), SourceState::Closed);
	assert_eq!(second.state(), SourceState::Closed);
	common::eventually(|| reads.in_flight() == 0).await;
	reads.assert_no_read(Duration::from_secs(60)).await;

	drop(first);
	assert_eq!(manager.snapshots().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn reads_carry_the_configured_wait() {
	let (transport, reads) = ManualTransport::new();
	let settings = SourceSettings::from_toml_str("wait_ms = 30000").unwrap();
	let manager = DataSourceManager::builder().settings(settings).protocol("consul", transport as _).build();
	let _source = manager.open(&Descriptor::new("/v1/catalog/services?dc={dc}").param("dc", "dc1")).unwrap();

	let first = reads.next_read().await;
	assert_eq!(first.target(), "/v1/catalog/services?dc=dc1");
	first.ok(json!({}), 10);
	let second = reads.next_read().await;
	assert_eq!(second.query.wait, Some(Duration::from_secs(30)));
	assert_eq!(second.target(), "/v1/catalog/services?dc=dc1&index=10&wait=30s");
}

#[tokio::test(start_paused = true)]
async fn snapshots_and_close_all() {
	let (transport, reads) = ManualTransport::new();
	let settings = SourceSettings::from_toml_str("[retry]\nbase_ms = 10\njitter = 0.0").unwrap();
	let manager = DataSourceManager::builder().settings(settings).protocol("consul", transport as _).build();

	let services = manager.open(&Descriptor::new("/dc1/services")).unwrap();
	let nodes = manager.open(&Descriptor::new("/dc1/nodes")).unwrap();
	let _listener = nodes.add_listener(|_| {});
	for _ in 0..2 {
		let read = reads.next_read().await;
		let index = if read.uri.path().ends_with("nodes") { 4 } else { 8 };
		read.ok(json!([]), index);
	}
	let _ = reads.next_read().await;
	let _ = reads.next_read().await;

	let records = manager.snapshots();
	let uris: Vec<_> = records.iter().map(|r| r.uri.to_string()).collect();
	assert_eq!(uris, vec!["consul:///dc1/nodes", "consul:///dc1/services"]);
	assert_eq!(records[0].cursor.map(|c| c.get()), Some(4));
	assert_eq!(records[0].listeners, 1);
	assert_eq!(records[1].cursor.map(|c| c.get()), Some(8));
	assert!(records.iter().all(|r| r.state == SourceState::Open && r.epoch == 1 && r.reads == 1));

	assert_eq!(manager.close_all(), 2);
	assert_eq!(services.state(), SourceState::Closed);
	assert_eq!(manager.close_all(), 0);

	drop(services);
	drop(nodes);
	assert!(manager.snapshots().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_stops_reading() {
	let (transport, reads) = ManualTransport::new();
	let manager = DataSourceManager::builder().protocol("consul", transport as _).build();
	let source = manager.open(&Descriptor::new("/dc1/services")).unwrap();
	let _ = reads.next_read().await;

	drop(source);
	common::eventually(|| reads.in_flight() == 0).await;
	reads.assert_no_read(Duration::from_secs(60)).await;
	assert!(manager.snapshots().is_empty());
}

#[test]
fn terminal_error_from_read_now_closes_inside_open() {
	struct Denied;

	#[async_trait::async_trait]
	impl meshview_source::Transport for Denied {
		async fn read(
			&self,
			_uri: &meshview_source::ResourceUri,
			_query: meshview_source::BlockingQuery,
			_cancel: meshview_source::CancellationToken,
		) -> Result<meshview_source::Page, meshview_source::TransportError> {
			unreachable!("read_now answers every read")
		}

		fn read_now(
			&self,
			_uri: &meshview_source::ResourceUri,
			_cursor: Option<meshview_source::Cursor>,
		) -> Option<Result<meshview_source::Page, meshview_source::TransportError>> {
			Some(Err(meshview_source::TransportError::Malformed("not json".into())))
		}
	}

	let manager = DataSourceManager::builder().protocol("settings", Arc::new(Denied)).build();
	let source = manager.open(&Descriptor::new("settings://ui:theme")).unwrap();
	assert_eq!(source.state(), SourceState::Closed);
	assert!(matches!(source.current(), Some(SourceEvent::Error { retrying: false, .. })));
}
