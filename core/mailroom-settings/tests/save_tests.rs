use mailroom_settings::backend::mock::MockBackend;
use mailroom_settings::{BatchAction, SettingEntry, SettingsConfig, SettingsEvent, SettingsModel};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn model(backend: &MockBackend) -> SettingsModel {
    let mut model = SettingsModel::new(
        SettingsConfig::default(),
        json!({"mail": {"theme": "light"}}),
        Arc::new(backend.clone()),
    );
    model.initialize(&json!({"mail": {"theme": "dark", "old": true}}));
    model
}

fn actions(backend: &MockBackend) -> Vec<BatchAction> {
    backend.requests().iter().map(|r| r.action).collect()
}

fn paths(backend: &MockBackend, action: BatchAction) -> Vec<Vec<String>> {
    backend
        .requests_for(action)
        .iter()
        .map(|r| r.paths().map(str::to_string).collect())
        .collect()
}

// ── Batching ────────────────────────────────────────────────────

#[tokio::test]
async fn batches_go_out_delete_set_reset() {
    let backend = MockBackend::new();
    let mut model = model(&backend);

    model.begin_edit();
    model.reset("calendar");
    model.set("mail/theme", "blue");
    model.remove("mail/old");
    model.end_edit();
    model.wait_idle().await;

    assert_eq!(
        actions(&backend),
        [BatchAction::Delete, BatchAction::Set, BatchAction::Reset]
    );
    assert!(model.pending().is_empty());
}

#[tokio::test]
async fn save_with_nothing_queued_sends_nothing() {
    let backend = MockBackend::new();
    let mut model = model(&backend);
    assert_eq!(model.save(), 0);
    model.wait_idle().await;
    assert_eq!(backend.request_count(), 0);
}

#[tokio::test]
async fn object_nodes_travel_without_value() {
    let backend = MockBackend::new();
    let mut model = model(&backend);
    model.set("mail/signature", json!({"html": false}));
    model.wait_idle().await;

    let sets = backend.requests_for(BatchAction::Set);
    assert_eq!(
        sets[0].setting,
        [
            SettingEntry::path("mail/signature"),
            SettingEntry::value("mail/signature/html", json!(false)),
        ]
    );
}

#[tokio::test]
async fn auto_save_can_be_disabled() {
    let backend = MockBackend::new();
    let config = SettingsConfig {
        auto_save: false,
        ..Default::default()
    };
    let mut model = SettingsModel::new(config, json!({}), Arc::new(backend.clone()));

    model.set("a", 1);
    model.wait_idle().await;
    assert_eq!(backend.request_count(), 0);

    assert_eq!(model.save(), 1);
    model.wait_idle().await;
    assert_eq!(backend.request_count(), 1);
}

#[test]
fn save_without_runtime_keeps_changes_queued() {
    let backend = MockBackend::new();
    let mut model = model(&backend);
    model.set("mail/theme", "blue");

    assert_eq!(model.save(), 0);
    assert_eq!(model.in_flight_count(), 0);
    assert_eq!(
        model.pending().modified,
        [SettingEntry::value("mail/theme", json!("blue"))]
    );
}

#[tokio::test]
async fn requires_reload_is_sent_and_cleared() {
    let backend = MockBackend::new();
    let mut model = model(&backend);
    model.set_requires_reload(true);
    model.set("mail/theme", "blue");
    model.wait_idle().await;

    assert!(backend.requests()[0].requires_reload);
    assert!(!model.pending().requires_reload);

    model.set("mail/theme", "green");
    model.wait_idle().await;
    assert!(!backend.requests()[1].requires_reload);
}

// ── Failures ────────────────────────────────────────────────────

#[tokio::test]
async fn failed_batch_stays_queued_and_is_reported() {
    let backend = MockBackend::new();
    backend.fail(BatchAction::Set);
    let mut model = model(&backend);
    let mut events = model.subscribe();

    model.set("mail/theme", "blue");
    model.wait_idle().await;

    assert_eq!(model.get("mail/theme"), Some(json!("blue")));
    assert_eq!(
        model.pending().modified,
        [SettingEntry::value("mail/theme", json!("blue"))]
    );

    let mut exception = None;
    while let Ok(event) = events.try_recv() {
        if let SettingsEvent::Exception {
            action,
            settings,
            message,
        } = event
        {
            exception = Some((action, settings, message));
        }
    }
    let (action, settings, message) = exception.expect("an exception event");
    assert_eq!(action, BatchAction::Set);
    assert_eq!(settings, [SettingEntry::value("mail/theme", json!("blue"))]);
    assert!(message.contains("mock refused set batch"));
}

#[tokio::test]
async fn failed_batch_is_sent_again_on_next_save() {
    let backend = MockBackend::new();
    backend.fail_times(BatchAction::Set, 1);
    let mut model = model(&backend);

    model.set("mail/theme", "blue");
    model.wait_idle().await;
    assert_eq!(model.save(), 1);
    model.wait_idle().await;

    assert_eq!(
        paths(&backend, BatchAction::Set),
        [vec!["mail/theme".to_string()], vec!["mail/theme".to_string()]]
    );
    assert!(model.pending().is_empty());
}

#[tokio::test]
async fn failed_set_does_not_undo_delete() {
    let backend = MockBackend::new();
    backend.fail(BatchAction::Set);
    let mut model = model(&backend);

    model.begin_edit();
    model.remove("mail/old");
    model.set("mail/theme", "blue");
    model.end_edit();
    model.wait_idle().await;

    let pending = model.pending();
    assert!(pending.deleted.is_empty());
    assert_eq!(pending.modified.len(), 1);
    assert_eq!(model.get("mail/old"), None);
}

#[tokio::test]
async fn next_edit_retries_failed_batch() {
    let backend = MockBackend::new();
    backend.fail_times(BatchAction::Set, 1);
    let mut model = model(&backend);

    model.set("mail/theme", "blue");
    model.wait_idle().await;
    model.set("mail/font", "mono");
    model.wait_idle().await;

    assert_eq!(
        paths(&backend, BatchAction::Set)[1],
        ["mail/theme".to_string(), "mail/font".to_string()]
    );
    assert!(model.pending().is_empty());
}

// ── In-flight batches ───────────────────────────────────────────

#[tokio::test]
async fn in_flight_entries_are_not_sent_twice() {
    let backend = MockBackend::gated();
    let mut model = model(&backend);

    model.set("mail/theme", "blue");
    assert_eq!(model.in_flight_count(), 1);
    assert_eq!(model.save(), 0);

    model.set("mail/font", "mono");
    backend.open(2);
    model.wait_idle().await;

    assert_eq!(
        paths(&backend, BatchAction::Set),
        [vec!["mail/theme".to_string()], vec!["mail/font".to_string()]]
    );
    assert!(model.pending().is_empty());
}

#[tokio::test]
async fn change_during_flight_goes_into_next_batch() {
    let backend = MockBackend::gated();
    let mut model = model(&backend);

    model.set("mail/theme", "blue");
    model.set("mail/theme", "green");
    backend.open(2);
    model.wait_idle().await;

    let sets = backend.requests_for(BatchAction::Set);
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[1].setting, [SettingEntry::value("mail/theme", json!("green"))]);
    assert!(model.pending().is_empty());
    assert_eq!(model.get("mail/theme"), Some(json!("green")));
}

#[tokio::test]
async fn before_save_precedes_save() {
    let backend = MockBackend::new();
    let mut model = model(&backend);
    let mut events = model.subscribe();

    model.set("mail/theme", "blue");
    model.wait_idle().await;

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(event.name());
    }
    assert_eq!(names, ["set", "beforesave", "save"]);
}
