use fieldgw::device::{ConnectionParams, DeviceConfig, ProtocolType};
use fieldgw::device_registry::DeviceRegistry;

fn config(id: &str) -> DeviceConfig {
    DeviceConfig {
        device_id: id.to_string(),
        name: format!("device {id}"),
        description: String::new(),
        protocol_type: ProtocolType::ModbusTcp,
        enabled: true,
        connection_params: ConnectionParams {
            host: Some("127.0.0.1".into()),
            port: Some(1502),
            ..ConnectionParams::default()
        },
    }
}

#[tokio::test]
async fn list_is_ordered_by_device_id() {
    let registry = DeviceRegistry::new();
    registry.add(config("zeta")).await.unwrap();
    registry.add(config("alpha")).await.unwrap();
    registry.add(config("mid")).await.unwrap();

    let ids: Vec<String> = registry
        .list()
        .await
        .into_iter()
        .map(|c| c.device_id)
        .collect();
    assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
    assert_eq!(registry.count().await, 3);
}

#[tokio::test]
async fn duplicate_add_fails_and_keeps_original() {
    let registry = DeviceRegistry::new();
    registry.add(config("d1")).await.unwrap();

    let mut second = config("d1");
    second.name = "impostor".into();
    let err = registry.add(second).await.unwrap_err();
    assert_eq!(err.kind(), "DuplicateDeviceError");

    let kept = registry.get("d1").await.unwrap();
    assert_eq!(kept.name, "device d1");
}

#[tokio::test]
async fn get_and_slot_fail_for_unknown_id() {
    let registry = DeviceRegistry::new();
    assert_eq!(
        registry.get("nope").await.unwrap_err().kind(),
        "DeviceNotFoundError"
    );
    let err = registry
        .slot("nope")
        .await
        .err()
        .expect("unknown id must fail");
    assert_eq!(err.kind(), "DeviceNotFoundError");
}

#[tokio::test]
async fn remove_frees_the_id() {
    let registry = DeviceRegistry::new();
    registry.add(config("d1")).await.unwrap();
    registry.remove("d1").await.unwrap();
    assert!(registry.list().await.is_empty());

    // the id can be reused after removal
    registry.add(config("d1")).await.unwrap();
    assert_eq!(registry.count().await, 1);

    let err = registry.remove("ghost").await.unwrap_err();
    assert_eq!(err.kind(), "DeviceNotFoundError");
}

#[tokio::test]
async fn connected_count_starts_at_zero() {
    let registry = DeviceRegistry::new();
    registry.add(config("d1")).await.unwrap();
    assert_eq!(registry.connected_count().await, 0);
}
