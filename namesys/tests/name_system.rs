use std::sync::Arc;
use std::time::Duration;

use namesys::{
    lookup_key, Config, Error, FsKeystore, IdFormat, KeyBook, Keypair, Keystore, Multihash, Path,
    PeerId, ProvideQueue, PublisherSettings, ResolveOptions, RoutingError,
};
use namesys_testnet::Testnet;

fn content(data: &[u8]) -> Path {
    Path::from_content(&Multihash::blake3(data))
}

fn ipns(id: &PeerId) -> String {
    format!("/ipns/{id}")
}

#[tokio::test]
async fn cached_resolution_hits_routing_once() {
    let testnet = Testnet::default();
    let publisher = testnet.name_system_builder().build();
    let resolver = testnet.name_system_builder().build();
    let keypair = Keypair::random();
    let info = publisher.publish(&keypair, &content(b"cached")).await.unwrap();

    let before = testnet.get_value_calls();
    for _ in 0..3 {
        assert_eq!(
            resolver.resolve(&ipns(&info.id)).await.unwrap(),
            content(b"cached")
        );
    }
    assert_eq!(testnet.get_value_calls(), before + 1);

    // Bypassing the cache always asks the network.
    resolver
        .resolve_with_options(&ipns(&info.id), ResolveOptions::default().no_cache())
        .await
        .unwrap();
    assert_eq!(testnet.get_value_calls(), before + 2);
}

#[tokio::test]
async fn republish_is_seen_once_cache_is_bypassed() {
    let testnet = Testnet::default();
    let namesys = testnet.name_system_builder().build();
    let reader = testnet.name_system_builder().build();
    let keypair = Keypair::random();

    let info = namesys.publish(&keypair, &content(b"v1")).await.unwrap();
    assert_eq!(reader.resolve(&ipns(&info.id)).await.unwrap(), content(b"v1"));

    namesys.publish(&keypair, &content(b"v2")).await.unwrap();
    // The publisher's own cache follows its publishes.
    assert_eq!(namesys.resolve(&ipns(&info.id)).await.unwrap(), content(b"v2"));
    // Other readers see the old target until their entry expires.
    assert_eq!(reader.resolve(&ipns(&info.id)).await.unwrap(), content(b"v1"));
    assert_eq!(
        reader
            .resolve_with_options(&ipns(&info.id), ResolveOptions::default().no_cache())
            .await
            .unwrap(),
        content(b"v2")
    );
}

#[tokio::test]
async fn stale_replica_loses_to_newer_record() {
    let testnet = Testnet::new(3);
    let namesys = testnet.name_system_builder().build();
    let keypair = Keypair::random();

    namesys.publish(&keypair, &content(b"v1")).await.unwrap();
    testnet.set_offline(0, true);
    let info = namesys.publish(&keypair, &content(b"v2")).await.unwrap();
    testnet.set_offline(0, false);

    let reader = testnet.name_system_builder().build();
    let resolved = reader
        .resolve_with_options(&ipns(&info.id), ResolveOptions::default().no_cache())
        .await
        .unwrap();
    assert_eq!(resolved, content(b"v2"));

    // Only the stale replica is asked.
    let resolved = reader
        .resolve_with_options(
            &ipns(&info.id),
            ResolveOptions::default().no_cache().quorum(1),
        )
        .await
        .unwrap();
    assert_eq!(resolved, content(b"v1"));
}

#[tokio::test]
async fn hashed_identity_fetches_published_key() {
    let testnet = Testnet::default();
    let mut settings = PublisherSettings::new();
    settings.identity_format(IdFormat::Hashed);
    let publisher = testnet
        .name_system_builder()
        .key_book(KeyBook::default())
        .publisher_settings(settings)
        .build();
    let keypair = Keypair::random();

    let info = publisher.publish(&keypair, &content(b"hashed")).await.unwrap();
    assert_eq!(info.id.format(), IdFormat::Hashed);
    assert_eq!(testnet.put_value_calls(), 2);

    let key_book = KeyBook::default();
    let reader = testnet
        .name_system_builder()
        .key_book(key_book.clone())
        .build();
    assert_eq!(
        reader.resolve(&ipns(&info.id)).await.unwrap(),
        content(b"hashed")
    );
    assert!(key_book.public_key(&info.id).is_some());
}

#[tokio::test]
async fn failed_key_write_fails_hashed_publish() {
    let testnet = Testnet::default();
    testnet.fail_puts_with_prefix("/pk/");
    let mut settings = PublisherSettings::new();
    settings.identity_format(IdFormat::Hashed);
    let namesys = testnet
        .name_system_builder()
        .publisher_settings(settings)
        .build();

    let error = namesys
        .publish(&Keypair::random(), &content(b"lost"))
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Routing(RoutingError::Transport(_))));
    assert!(namesys.cache().is_empty());
}

#[tokio::test]
async fn recursive_names_and_residuals() {
    let testnet = Testnet::default();
    let namesys = testnet.name_system_builder().build();
    let site = Keypair::random();
    let alias = Keypair::random();

    let site_info = namesys.publish(&site, &content(b"site")).await.unwrap();
    let alias_target = Path::parse(&format!("{}/docs", ipns(&site_info.id))).unwrap();
    let alias_info = namesys.publish(&alias, &alias_target).await.unwrap();

    let reader = testnet.name_system_builder().build();
    let resolved = reader
        .resolve(&format!("{}/guide.html", ipns(&alias_info.id)))
        .await
        .unwrap();
    assert_eq!(resolved, content(b"site").join("docs/guide.html").unwrap());

    let one_step = reader
        .resolve_with_options(&ipns(&alias_info.id), ResolveOptions::default().non_recursive())
        .await
        .unwrap();
    assert_eq!(one_step, alias_target);
}

#[tokio::test]
async fn mutual_references_hit_the_depth_limit() {
    let testnet = Testnet::default();
    let namesys = testnet.name_system_builder().depth_limit(4).build();
    let a = Keypair::random();
    let b = Keypair::random();
    let a_id = namesys.identity(&a);
    let b_id = namesys.identity(&b);

    namesys
        .publish(&a, &Path::parse(&ipns(&b_id)).unwrap())
        .await
        .unwrap();
    namesys
        .publish(&b, &Path::parse(&ipns(&a_id)).unwrap())
        .await
        .unwrap();

    let error = namesys
        .resolve_with_options(&ipns(&a_id), ResolveOptions::default().no_cache())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::ResolveRecursion(_)));
}

#[tokio::test]
async fn resolve_async_ends_with_best_answer() {
    let testnet = Testnet::new(4);
    let namesys = testnet.name_system_builder().build();
    let keypair = Keypair::random();

    namesys.publish(&keypair, &content(b"old")).await.unwrap();
    testnet.set_offline(3, true);
    let info = namesys.publish(&keypair, &content(b"new")).await.unwrap();
    testnet.set_offline(3, false);

    let reader = testnet.name_system_builder().build();
    let mut rx = reader.resolve_async(&ipns(&info.id), ResolveOptions::default());
    let mut last = None;
    while let Some(result) = rx.recv().await {
        last = Some(result.unwrap());
    }
    assert_eq!(last, Some(content(b"new")));
    assert_eq!(reader.cache().get(&info.id.to_string()), Some(content(b"new")));
}

#[tokio::test]
async fn slow_routing_times_out() {
    let testnet = Testnet::default();
    let namesys = testnet.name_system_builder().build();
    let keypair = Keypair::random();
    let info = namesys.publish(&keypair, &content(b"slow")).await.unwrap();

    testnet.set_latency(Duration::from_millis(500));
    let error = namesys
        .resolve_with_options(
            &ipns(&info.id),
            ResolveOptions::default()
                .no_cache()
                .timeout(Some(Duration::from_millis(50))),
        )
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Timeout { .. }));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn provide_queue_announces_to_the_network() {
    let testnet = Testnet::default();
    let queue = ProvideQueue::start(
        Arc::new(testnet.clone()),
        Config::test().provide_settings(),
    );

    let keys: Vec<Multihash> = (0..10u8).map(|i| Multihash::blake3(&[i])).collect();
    for key in &keys {
        queue.provide(*key).unwrap();
    }
    queue.finish().await;

    assert!(keys.iter().all(|key| testnet.is_provided(key)));
}

#[tokio::test]
async fn publish_with_stored_key() {
    let dir = tempfile::tempdir().unwrap();
    let keystore = FsKeystore::open(dir.path().join("keys")).unwrap();
    keystore.put("site", &Keypair::random()).unwrap();

    let testnet = Testnet::default();
    let namesys = testnet.name_system_builder().build();

    let keypair = lookup_key(&keystore, "site", IdFormat::Inline).unwrap();
    let info = namesys.publish(&keypair, &content(b"stored")).await.unwrap();

    // The identity finds the same key.
    let again = lookup_key(&keystore, &info.id.to_string(), IdFormat::Inline).unwrap();
    assert_eq!(again.public_key(), keypair.public_key());

    let reader = testnet.name_system_builder().build();
    assert_eq!(
        reader.resolve(&ipns(&info.id)).await.unwrap(),
        content(b"stored")
    );
}

#[tokio::test]
async fn config_file_drives_the_builder() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[resolver]\ncache_size = 0\n\n[publisher]\nidentity_format = \"hashed\"\n",
    )
    .unwrap();
    let config = Config::from_file(&path).unwrap();

    let testnet = Testnet::default();
    let namesys = testnet.name_system_builder().config(&config).build();

    let info = namesys
        .publish(&Keypair::random(), &content(b"configured"))
        .await
        .unwrap();
    assert_eq!(info.id.format(), IdFormat::Hashed);
    assert!(!namesys.cache().is_enabled());

    let before = testnet.get_value_calls();
    namesys.resolve(&ipns(&info.id)).await.unwrap();
    namesys.resolve(&ipns(&info.id)).await.unwrap();
    assert_eq!(testnet.get_value_calls(), before + 2);
}
