use relaynet::{NetConfig, NetError, Network, NodeId, Position, RelayMode};
use std::io::Write;

#[tokio::test(start_paused = true)]
async fn save_then_load_restores_population() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ring.dot");

    let mut net = Network::default();
    let ids: Vec<NodeId> = (0..4)
        .map(|i| net.spawn(Position::new(i * 50, -i * 10)).unwrap())
        .collect();
    for (i, &id) in ids.iter().enumerate() {
        net.add_or_remove_channel(id, ids[(i + 1) % ids.len()]).await.unwrap();
        net.set_relay_mode(id, RelayMode::Multicast).await.unwrap();
    }
    net.set_name(ids[2], "gateway").await.unwrap();
    net.set_send_interval(ids[0], 40).await.unwrap();
    net.save(&path).unwrap();

    net.clear().await.unwrap();
    assert!(net.is_empty());

    let (mut loaded, max_id) = Network::load(&path, NetConfig::default()).await.unwrap();
    assert_eq!(max_id, Some(NodeId(3)));
    assert_eq!(loaded.len(), 4);
    assert_eq!(loaded.node(ids[2]).unwrap().name, "gateway");
    assert_eq!(loaded.node(ids[0]).unwrap().send_interval_ms(), 40);
    for (i, &id) in ids.iter().enumerate() {
        let next = ids[(i + 1) % ids.len()];
        assert_eq!(loaded.usage(id, next), Some(0.0));
    }

    // the restored actors are live: the generated message travels the ring
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let summary = loaded.tick(0.0);
    assert!(summary.reports.len() >= ids.len());
    assert_eq!(loaded.usage(ids[3], ids[0]), Some(1.0));

    // new nodes continue after the largest loaded id
    assert_eq!(loaded.spawn(Position::default()).unwrap(), NodeId(4));

    loaded.stop_all_and_wait().await.unwrap();
    assert!(loaded.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_load_leaves_running_network_alone() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "digraph network {{\n0 [label=\"a\"] // \"t\" 0 0 false 0 0\n0 -> 7\n}}\n"
    )
    .unwrap();

    let mut net = Network::default();
    let a = net.spawn(Position::default()).unwrap();

    let err = Network::load(file.path(), NetConfig::default()).await.unwrap_err();
    assert!(matches!(err, NetError::Parse(_)));
    assert!(net.contains(a));

    let missing = Network::load(file.path().with_extension("nope"), NetConfig::default()).await;
    assert!(matches!(missing, Err(NetError::Io(_))));

    net.stop_all_and_wait().await.unwrap();
}
