use std::time::Duration;

use bytes::Bytes;
use midi_pe_core::{ChunkResult, DeviceId, ManagerConfig, TransactionManager, TransactionOutcome};

#[tokio::test]
async fn three_chunk_out_of_order_response_reaches_waiter() {
    let manager = TransactionManager::new(ManagerConfig::default());
    let dest = DeviceId::new(0x1234567);

    let id = manager
        .begin("DeviceInfo", dest, Some(Duration::from_secs(5)))
        .await
        .expect("fresh manager has free ids");

    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.wait_for_completion(id).await })
    };

    manager
        .process_chunk(id, 2, 3, Bytes::new(), Bytes::from_static(b"BB"))
        .await;
    manager
        .process_chunk(id, 3, 3, Bytes::new(), Bytes::from_static(b"CC"))
        .await;
    let result = manager
        .process_chunk(id, 1, 3, Bytes::from_static(b"H"), Bytes::from_static(b"AA"))
        .await;
    assert_eq!(
        result,
        ChunkResult::Complete {
            header: Bytes::from_static(b"H"),
            body: Bytes::from_static(b"AABBCC"),
        }
    );

    let outcome = waiter.await.expect("waiter task did not panic");
    assert_eq!(
        outcome,
        TransactionOutcome::Success {
            header: Bytes::from_static(b"H"),
            body: Bytes::from_static(b"AABBCC"),
        }
    );

    let diag = manager.diagnostics().await;
    assert_eq!(diag.active_count, 0);
    assert_eq!(diag.ids_available, 128);
}

#[tokio::test]
async fn protocol_error_status_is_delivered_as_error_outcome() {
    let manager = TransactionManager::new(ManagerConfig::default());
    let dest = DeviceId::new(1);
    let id = manager.begin("DeviceInfo", dest, None).await.unwrap();

    manager
        .complete_with_error(
            id,
            midi_pe_core::PeStatus(404),
            Some("resource not found".to_string()),
        )
        .await;

    let outcome = manager.wait_for_completion(id).await;
    assert_eq!(
        outcome,
        TransactionOutcome::Error {
            status: midi_pe_core::PeStatus(404),
            message: Some("resource not found".to_string()),
        }
    );
}

#[tokio::test]
async fn id_recycling_under_saturation() {
    let manager = TransactionManager::new(ManagerConfig::default());
    let dest = DeviceId::new(1);

    let mut ids = Vec::new();
    for _ in 0..128 {
        ids.push(manager.begin("r", dest, None).await.expect("id available"));
    }
    assert!(manager.begin("r", dest, None).await.is_none());

    manager.cancel(ids[0]).await;
    let recycled = manager.begin("r", dest, None).await;
    assert!(recycled.is_some());

    manager.cancel_all().await;
    let diag = manager.diagnostics().await;
    assert_eq!(diag.active_count, 0);
    assert_eq!(diag.ids_available, 128);
}
