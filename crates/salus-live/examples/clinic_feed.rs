//! End-to-end wiring demo: one patient thread, one notification recipient,
//! one shared change feed.
//!
//! Run with `cargo run --example clinic_feed` (set `RUST_LOG=debug` for the
//! full trace).

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use salus_files::{AttachmentRegistry, FileUpload, FsObjectStore, ObjectStore, StoreConfig};
use salus_live::{ChangeEvent, ChangeFeed, ConversationChannel, NotificationAggregator};
use salus_shared::{ActorRole, SessionContext};
use salus_store::{Database, Notification};
use serde_json::json;
use tokio::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("salus_live=debug,salus_files=debug,salus_store=info"));
    fmt().with_env_filter(filter).init();

    let workdir = tempfile::tempdir()?;
    let db = Arc::new(Mutex::new(Database::open_at(
        &workdir.path().join("salus.db"),
    )?));
    let store: Arc<dyn ObjectStore> = Arc::new(
        FsObjectStore::new(StoreConfig {
            root: workdir.path().join("attachments"),
            ..StoreConfig::default()
        })
        .await?,
    );

    let feed = ChangeFeed::new();
    let registry = AttachmentRegistry::new(db.clone(), store.clone());
    let channel = ConversationChannel::new(db.clone(), feed.clone());

    let patient_id = Uuid::new_v4();
    let doctor = SessionContext {
        user_id: Uuid::new_v4(),
        role: ActorRole::Doctor,
        tenant_id: None,
    };

    // The doctor's notification bell, refreshed by the change feed.
    let aggregator = NotificationAggregator::new(db.clone(), feed.clone(), doctor.user_id);
    aggregator.refresh().await?;
    let _subscription = aggregator.subscribe(|| println!("bell: feed changed, re-rendered"));

    // Upload an exam and send it into the thread.
    let attachment = registry
        .upload(
            patient_id,
            FileUpload {
                file_name: "exam.pdf".into(),
                media_type: "application/pdf".into(),
                bytes: vec![0x25; 4096],
            },
            doctor.actor(),
        )
        .await?;

    channel
        .send(
            patient_id,
            &doctor,
            "Anexamos um arquivo: exam.pdf".into(),
            Some(salus_store::AttachmentRef {
                storage_path: attachment.storage_path.clone(),
                media_type: attachment.media_type,
            }),
        )
        .await?;

    let preview = registry.preview_url(&attachment).await?;
    println!("preview URL (60s TTL): {preview}");

    // Server-side logic (out of scope here) would create this notification;
    // the demo plays that part by hand.
    {
        let db = db.lock().await;
        db.insert_notification(&Notification {
            id: Uuid::new_v4(),
            recipient_id: doctor.user_id,
            kind: "chat".into(),
            title: "New message".into(),
            body: "A patient replied".into(),
            context: json!({ "subjectId": patient_id.to_string() }),
            created_at: Utc::now(),
            read: false,
            deleted: false,
        })?;
    }
    feed.publish(ChangeEvent::notification(doctor.user_id));

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    println!("unread badge: {}", aggregator.current_unread());

    Ok(())
}
