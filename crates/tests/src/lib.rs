//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置往返测试
//! - 端到端场景：连接器 → 同步循环 → 存储
//! - 快照导出/导入往返

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ConnectorKind, StorageKind, SyncDirection};

    const SAMPLE: &str = r#"
[twin]
sync_interval_ms = 250
significant_change_db = 3.0

[twin.history]
capacity = 16

[[connectors]]
name = "ran"
kind = "request_response"
endpoint = "127.0.0.1:9000"
direction = "both"
params = { codec = "bincode", timeout_ms = "200" }

[[connectors]]
name = "lab"
kind = "simulated"
endpoint = "lab"

[storage]
kind = "file"
params = { path = "/tmp/twin", format = "json" }
"#;

    #[test]
    fn test_blueprint_survives_toml_and_json() {
        let blueprint = ConfigLoader::load_from_str(SAMPLE, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.twin.history.capacity, 16);
        assert_eq!(blueprint.connectors[0].direction, SyncDirection::Both);
        assert_eq!(blueprint.connectors[1].kind, ConnectorKind::Simulated);

        let toml = ConfigLoader::to_toml(&blueprint).unwrap();
        let reloaded = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(reloaded.connectors.len(), 2);
        assert_eq!(reloaded.twin.significant_change_db, 3.0);

        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let reloaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(reloaded.storage.map(|s| s.kind), Some(StorageKind::File));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use connectors::{
        memory_pair, twin_topic, AnyConnector, BrokerMessage, PubSubBroker, PubSubConnector,
        RequestResponseConfig, RequestResponseConnector, SimulatorConfig, TelemetrySimulator,
        WireCodec, WireMessage, MAX_DATAGRAM,
    };
    use contracts::{
        AnomalyKind, AnomalyRecord, ComponentState, Connector, SnapshotStorage, SyncDirection, Timestamp,
        TwinEngineConfig,
    };
    use storage::{FileStorage, FileStorageConfig, SnapshotFormat};
    use tokio::net::UdpSocket;
    use twin_engine::{DigitalTwin, RegisteredConnector, SyncLoop};

    fn twin(interval_ms: u64) -> Arc<DigitalTwin> {
        let config = TwinEngineConfig {
            sync_interval_ms: interval_ms,
            ..Default::default()
        };
        Arc::new(DigitalTwin::new(config).unwrap())
    }

    fn record(id: &str, ms: i64, latency: f64) -> ComponentState {
        ComponentState::new(id, Timestamp::from_millis(ms))
            .with_signal_level(-80.0)
            .with_latency(latency)
            .with_packet_loss(0.01)
            .with_throughput(40.0)
    }

    /// End-to-end test: MemoryConnector -> SyncLoop -> FileStorage
    ///
    /// 验证完整的数据流：
    /// 1. 对端写入遥测记录
    /// 2. 同步周期拉取记录、检测异常
    /// 3. FileStorage 写入快照，可读回最新状态
    #[tokio::test]
    async fn test_e2e_loopback_to_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(
            "disk",
            FileStorageConfig {
                path: dir.path().to_path_buf(),
                format: SnapshotFormat::Json,
                max_files: Some(3),
            },
        )
        .unwrap();
        let storage_metrics = storage.metrics();

        let twin = twin(1000);
        let anomalies = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&anomalies);
        twin.on_anomaly(Arc::new(move |_: &AnomalyRecord| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let (connector, peer) = memory_pair("loop", 64);
        let sync = SyncLoop::with_storage(Arc::clone(&twin), storage);
        sync.register_connector(RegisteredConnector::new("loop", SyncDirection::Pull, connector))
            .await;
        assert_eq!(sync.connect_all().await, 1);

        peer.offer(record("ue-1", 1_000, 12.0));
        peer.offer(record("ue-2", 1_000, 150.0));
        let report = sync.run_cycle().await;

        assert_eq!(report.pulled, 2);
        assert_eq!(report.anomalies, 1);
        assert_eq!(report.persisted, Some(true));
        assert_eq!(anomalies.load(Ordering::SeqCst), 1);
        let detected = twin.anomalies();
        assert_eq!(detected.len(), 1);
        assert!(detected[0].has(AnomalyKind::HighLatency));

        for ms in 2..=5 {
            peer.offer(record("ue-1", ms * 1_000, 12.0));
            sync.run_cycle().await;
        }
        sync.shutdown().await;

        assert_eq!(storage_metrics.persisted(), 5);
        assert_eq!(storage_metrics.snapshot().pruned, 2);

        let mut reader = FileStorage::new(
            "reader",
            FileStorageConfig {
                path: dir.path().to_path_buf(),
                format: SnapshotFormat::Json,
                max_files: None,
            },
        )
        .unwrap();
        assert_eq!(reader.list_snapshots().await.unwrap().len(), 3);
        let latest = reader.load_latest().await.unwrap().unwrap();
        assert_eq!(latest.active_components, 2);
        assert_eq!(latest.components["ue-1"], twin.get_state("ue-1").unwrap());
    }

    /// Pub/sub: producer telemetry pulled in, twin records pushed out
    #[tokio::test]
    async fn test_e2e_pubsub_both_directions() {
        let broker = PubSubBroker::default();
        let mut outbound = broker.subscribe(&twin_topic("cell-3"));

        let twin = twin(1000);
        let sync: SyncLoop<PubSubConnector> = SyncLoop::new(Arc::clone(&twin));
        sync.register_connector(RegisteredConnector::new(
            "cell-3",
            SyncDirection::Both,
            PubSubConnector::new("bus", broker.clone()),
        ))
        .await;
        sync.connect_all().await;

        broker.publish_state("cell-3", record("ue-1", 1_000, 10.0));
        broker.publish_state("cell-3", record("ue-2", 1_000, 11.0));
        let report = sync.run_cycle().await;

        assert_eq!(report.pulled, 2);
        assert_eq!(report.pushed, 2);
        let mut pushed = Vec::new();
        while let Ok(BrokerMessage::State(state)) = outbound.try_recv() {
            pushed.push(state.id.to_string());
        }
        pushed.sort();
        assert_eq!(pushed, vec!["ue-1", "ue-2"]);
    }

    /// Request/response over UDP against a scripted peer
    #[tokio::test]
    async fn test_e2e_request_response_peer() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let mut pending = VecDeque::from([record("ue-9", 1_000, 20.0), record("ue-10", 1_000, 30.0)]);
        let peer = tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_DATAGRAM];
            let mut commands = Vec::new();
            while let Ok(Ok((len, from))) =
                tokio::time::timeout(Duration::from_millis(300), socket.recv_from(&mut buf)).await
            {
                match WireCodec::Bincode.decode("peer", &buf[..len]).unwrap() {
                    WireMessage::PullRequest { seq } => {
                        let reply = WireMessage::PullResponse {
                            seq,
                            state: pending.pop_front(),
                        };
                        let data = WireCodec::Bincode.encode("peer", &reply).unwrap();
                        socket.send_to(&data, from).await.unwrap();
                    }
                    WireMessage::Command(payload) => commands.push(payload),
                    _ => {}
                }
            }
            commands
        });

        let twin = twin(1000);
        let mut connector = RequestResponseConnector::new(
            "ran",
            RequestResponseConfig {
                codec: WireCodec::Bincode,
                timeout: Duration::from_millis(200),
                bind: "127.0.0.1:0".parse().unwrap(),
            },
        );
        assert!(connector.connect(&addr.to_string()).await);
        connector
            .send_command(Bytes::from_static(b"handover ue-9"))
            .await
            .unwrap();

        let sync: SyncLoop<AnyConnector> = SyncLoop::new(Arc::clone(&twin));
        sync.register_connector(RegisteredConnector::new(
            addr.to_string(),
            SyncDirection::Pull,
            connector.into(),
        ))
        .await;
        let report = sync.run_cycle().await;

        assert_eq!(report.pulled, 2);
        assert!(report.failed_connectors.is_empty());
        assert_eq!(twin.component_count(), 2);

        sync.shutdown().await;
        let commands = peer.await.unwrap();
        assert_eq!(commands, vec![Bytes::from_static(b"handover ue-9")]);
    }

    /// Export → import into a fresh twin reproduces every record
    #[tokio::test]
    async fn test_export_import_round_trip() {
        let source = twin(1000);
        for (i, id) in ["ue-1", "ue-2", "ue-3"].iter().enumerate() {
            source
                .update_state(
                    record(id, 1_000, 10.0 + i as f64)
                        .with_serving_cell(i as u32)
                        .with_custom_metric("rsrq", -10.5),
                )
                .unwrap();
        }

        let json = source.export_json().unwrap();
        let target = twin(1000);
        let report = target.import_json(&json).unwrap();

        assert_eq!(report.applied, 3);
        assert!(report.skipped.is_empty());
        assert_eq!(target.get_all_states(), source.get_all_states());

        assert!(target.import_json("{ truncated").is_err());
        assert_eq!(target.component_count(), 3);
    }

    /// Simulated telemetry drives the periodic loop
    #[tokio::test]
    async fn test_simulator_feeds_running_loop() {
        let twin = twin(10);
        let (connector, peer) = memory_pair("sim", 256);
        let simulator = TelemetrySimulator::new(SimulatorConfig {
            prefix: "lab".into(),
            components: 5,
            batch: 5,
            interval: Duration::from_millis(5),
            spike_probability: 0.0,
            seed: Some(42),
        });
        let feed = simulator.spawn(peer);

        let sync = SyncLoop::new(Arc::clone(&twin));
        sync.register_connector(RegisteredConnector::new("lab", SyncDirection::Pull, connector))
            .await;
        sync.connect_all().await;
        let mut reports = sync.subscribe();
        assert!(sync.start());

        let mut total_pulled = 0;
        while total_pulled < 20 {
            let report = tokio::time::timeout(Duration::from_secs(2), reports.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(report.rejected, 0);
            total_pulled += report.pulled;
        }

        sync.stop_and_wait().await;
        assert!(feed.stop().await >= 20);
        assert_eq!(twin.component_count(), 5);
        assert!(twin.get_state("lab-ue-0").is_some());
        assert!(twin.latest_metrics().unwrap().active_components == 5);
    }
}
