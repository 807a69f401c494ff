//! End-to-end bridge behavior against a native engine that completes calls
//! from its own threads.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use hostbridge_engine::types::{ErrorCode, TaggedValue};
use hostbridge_engine::{Bridge, BridgeConfig, BridgeError, CallRequest};

use crate::common::{ScriptedEngine, collect_until_final, collector, config, start_bridge};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn echo_round_trips_payload_through_native_thread() -> anyhow::Result<()> {
    let (bridge, _engine) = start_bridge(ScriptedEngine::default(), &config(5));
    let payload = TaggedValue::object([
        ("name", TaggedValue::string("x")),
        ("n", TaggedValue::Int32(-5)),
        (
            "tags",
            TaggedValue::array([TaggedValue::string("a"), TaggedValue::string("b")]),
        ),
    ]);

    let (handler, mut rx) = collector();
    let handle = bridge
        .invoke(
            CallRequest::new("echo").with_payload(payload.clone()),
            handler,
            false,
        )
        .await?;

    let events = collect_until_final(&mut rx).await?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].handle, handle);
    assert_eq!(events[0].outcome, Ok(Some(payload)));
    assert_eq!(bridge.outstanding(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn streaming_events_arrive_in_emission_order() -> anyhow::Result<()> {
    let (bridge, _engine) = start_bridge(ScriptedEngine::default(), &config(5));
    let (handler, mut rx) = collector();
    bridge
        .invoke(
            CallRequest::new("count").with_payload(TaggedValue::UInt32(500)),
            handler,
            true,
        )
        .await?;

    let events = collect_until_final(&mut rx).await?;
    assert_eq!(events.len(), 501);
    for (i, event) in events[..500].iter().enumerate() {
        assert_eq!(event.outcome, Ok(Some(TaggedValue::UInt32(i as u32))));
        assert!(!event.is_final);
    }
    assert_eq!(events[500].outcome, Ok(None));
    assert_eq!(bridge.outstanding(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_streams_stay_separate() -> anyhow::Result<()> {
    let (bridge, _engine) = start_bridge(ScriptedEngine::default(), &config(5));
    let bridge = Arc::new(bridge);

    let streams = (1..=8u32).map(|n| {
        let bridge = Arc::clone(&bridge);
        async move {
            let (handler, mut rx) = collector();
            let handle = bridge
                .invoke(
                    CallRequest::new("count").with_payload(TaggedValue::UInt32(n * 10)),
                    handler,
                    true,
                )
                .await?;
            let events = collect_until_final(&mut rx).await?;
            anyhow::ensure!(events.iter().all(|e| e.handle == handle));
            anyhow::Ok((n, events.len()))
        }
    });

    for result in join_all(streams).await {
        let (n, len) = result?;
        assert_eq!(len, n as usize * 10 + 1);
    }
    assert_eq!(bridge.outstanding(), 0);
    Ok(())
}

#[tokio::test]
async fn native_failure_is_delivered_not_raised() -> anyhow::Result<()> {
    let (bridge, _engine) = start_bridge(ScriptedEngine::default(), &config(5));
    let (handler, mut rx) = collector();
    bridge.invoke(CallRequest::new("fail"), handler, false).await?;

    let events = collect_until_final(&mut rx).await?;
    let err = events[0].outcome.clone().unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert_eq!(err.message(), "bad property path");
    Ok(())
}

#[tokio::test]
async fn refused_call_leaves_nothing_registered() -> anyhow::Result<()> {
    let (bridge, engine) = start_bridge(ScriptedEngine::default(), &config(5));
    let (handler, _rx) = collector();
    let err = bridge
        .invoke(CallRequest::new("no_such_method"), handler, false)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Submit(_)));
    assert_eq!(bridge.outstanding(), 0);
    assert_eq!(engine.seen_methods(), vec!["no_such_method".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn submit_time_validation_failure_unregisters() -> anyhow::Result<()> {
    let (bridge, _engine) = start_bridge(ScriptedEngine::default(), &config(5));
    let (handler, _rx) = collector();
    let err = bridge
        .invoke(
            CallRequest::new("count").with_payload(TaggedValue::string("ten")),
            handler,
            true,
        )
        .await
        .unwrap_err();
    match err {
        BridgeError::Submit(native) => assert_eq!(native.code(), ErrorCode::InvalidType),
        other => anyhow::bail!("unexpected error: {other}"),
    }
    assert_eq!(bridge.outstanding(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn limiter_bounds_concurrent_native_calls() -> anyhow::Result<()> {
    let engine = ScriptedEngine::with_delay(Duration::from_millis(25));
    let (bridge, engine) = start_bridge(engine, &config(2));
    let bridge = Arc::new(bridge);

    let calls = (0..8u8).map(|n| {
        let bridge = Arc::clone(&bridge);
        async move {
            let (handler, mut rx) = collector();
            bridge
                .invoke(
                    CallRequest::new("slow").with_payload(TaggedValue::UInt8(n)),
                    handler,
                    false,
                )
                .await?;
            let events = collect_until_final(&mut rx).await?;
            anyhow::Ok(events[0].outcome.clone())
        }
    });

    let outcomes = join_all(calls).await;
    for (n, outcome) in outcomes.into_iter().enumerate() {
        assert_eq!(outcome?, Ok(Some(TaggedValue::UInt8(n as u8))));
    }
    assert!(engine.peak_concurrency() <= 2);
    assert_eq!(bridge.limiter().available(), 2);
    Ok(())
}

#[tokio::test]
async fn shutdown_abandons_calls_the_engine_never_finished() -> anyhow::Result<()> {
    let (bridge, _engine) = start_bridge(ScriptedEngine::default(), &config(5));

    let (done_handler, mut done_rx) = collector();
    bridge.invoke(CallRequest::new("fail"), done_handler, false).await?;
    collect_until_final(&mut done_rx).await?;

    let (held_handler, mut held_rx) = collector();
    let held = bridge
        .invoke(CallRequest::new("hold"), held_handler, true)
        .await?;
    assert_eq!(bridge.outstanding(), 1);

    assert_eq!(bridge.shutdown().await, vec![held]);
    assert!(held_rx.recv().await.is_none());

    // A late event from a native thread is dropped under the log policy.
    let sink = bridge.sink();
    std::thread::spawn(move || sink.on_completion(held, Ok(None), true))
        .join()
        .map_err(|_| anyhow::anyhow!("native thread panicked"))?;
    assert_eq!(bridge.outstanding(), 0);
    Ok(())
}

#[tokio::test]
async fn bridge_starts_from_config_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bridge.toml");
    std::fs::write(
        &path,
        "[limiter]\ncapacity = 1\n\n[codec]\nmax_depth = 2\n\n[handles]\nmiss_policy = \"log\"\n",
    )?;
    let config = BridgeConfig::load(&path)?;
    let (bridge, _engine) = start_bridge(ScriptedEngine::default(), &config);
    assert_eq!(bridge.limiter().capacity(), 1);

    let too_deep = TaggedValue::array([TaggedValue::array([TaggedValue::array([])])]);
    let (handler, _rx) = collector();
    let err = bridge
        .invoke(CallRequest::new("echo").with_payload(too_deep), handler, false)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Codec(_)));
    assert_eq!(bridge.outstanding(), 0);
    Ok(())
}

/// Wait until every limiter slot is taken.
async fn until_slots_taken(bridge: &Bridge) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while bridge.limiter().available() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_refuses_call_waiting_for_a_slot() -> anyhow::Result<()> {
    let engine = ScriptedEngine::with_delay(Duration::from_millis(200));
    let (bridge, engine) = start_bridge(engine, &config(1));
    let bridge = Arc::new(bridge);

    let (first_handler, _first_rx) = collector();
    let first = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move {
            bridge
                .invoke(CallRequest::new("slow"), first_handler, false)
                .await
        }
    });
    until_slots_taken(&bridge).await?;

    let (second_handler, mut second_rx) = collector();
    let second = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move {
            bridge
                .invoke(CallRequest::new("echo"), second_handler, false)
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let abandoned = bridge.shutdown().await;
    let first = first.await??;
    assert!(matches!(second.await?, Err(BridgeError::Closed)));

    // Only the call that reached the engine can be abandoned.
    assert!(abandoned.iter().all(|handle| *handle == first));
    assert_eq!(engine.seen_methods(), vec!["slow".to_string()]);
    assert!(second_rx.recv().await.is_none());
    assert_eq!(bridge.outstanding(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_call_waiting_for_a_slot_leaves_nothing_registered() -> anyhow::Result<()> {
    let engine = ScriptedEngine::with_delay(Duration::from_millis(100));
    let (bridge, engine) = start_bridge(engine, &config(1));
    let bridge = Arc::new(bridge);

    let (first_handler, mut first_rx) = collector();
    let first = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move {
            bridge
                .invoke(CallRequest::new("slow"), first_handler, false)
                .await
        }
    });
    until_slots_taken(&bridge).await?;

    let (second_handler, _second_rx) = collector();
    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        bridge.invoke(CallRequest::new("echo"), second_handler, false),
    )
    .await;
    assert!(cancelled.is_err());

    first.await??;
    collect_until_final(&mut first_rx).await?;
    assert_eq!(bridge.outstanding(), 0);
    assert_eq!(engine.seen_methods(), vec!["slow".to_string()]);
    assert!(bridge.shutdown().await.is_empty());
    Ok(())
}
