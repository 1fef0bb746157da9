//! Controller behaviour over real loopback sockets

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use netcmd_core::config::NetworkConfig;
use netcmd_core::{
    ChannelObserver, Controller, ControllerEvent, ControllerHandle, Endpoint, Error, ListenerError,
    ListenerState, LogEvent, LogKind, SendError, SendRequest, ServerStatus,
};

const WAIT: Duration = Duration::from_secs(5);

async fn controller() -> (ControllerHandle, UnboundedReceiver<ControllerEvent>) {
    let (observer, rx) = ChannelObserver::channel();
    let handle = Controller::spawn(&NetworkConfig::default(), Arc::new(observer))
        .await
        .unwrap();
    (handle, rx)
}

fn free_port() -> u16 {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").unwrap();
    socket.local_addr().unwrap().port()
}

fn drain(rx: &mut UnboundedReceiver<ControllerEvent>) -> Vec<ControllerEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

/// Collect events until one matches `done`, inclusive
async fn collect_until(
    rx: &mut UnboundedReceiver<ControllerEvent>,
    done: impl Fn(&ControllerEvent) -> bool,
) -> Vec<ControllerEvent> {
    let mut out = Vec::new();
    loop {
        let event = timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for controller event")
            .expect("observer channel closed");
        let finished = done(&event);
        out.push(event);
        if finished {
            return out;
        }
    }
}

fn logs(events: &[ControllerEvent], kind: LogKind) -> Vec<&LogEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            ControllerEvent::Log(log) if log.kind == kind => Some(log),
            _ => None,
        })
        .collect()
}

fn statuses(events: &[ControllerEvent]) -> Vec<ServerStatus> {
    events
        .iter()
        .filter_map(|e| match e {
            ControllerEvent::Status(status) => Some(*status),
            ControllerEvent::Log(_) => None,
        })
        .collect()
}

fn is_stopped_status(event: &ControllerEvent) -> bool {
    matches!(event, ControllerEvent::Status(s) if !s.running)
}

#[tokio::test]
async fn test_start_then_stop_emits_two_statuses_in_order() {
    let (handle, mut rx) = controller().await;
    let port = free_port();

    assert_eq!(handle.start(port).await.unwrap(), port);
    assert_eq!(handle.state().await.unwrap(), ListenerState::Bound(port));

    handle.stop().await.unwrap();
    let events = collect_until(&mut rx, is_stopped_status).await;

    assert_eq!(
        statuses(&events),
        vec![ServerStatus::running(port), ServerStatus::stopped()]
    );
    assert!(logs(&events, LogKind::Error).is_empty());
    assert_eq!(handle.state().await.unwrap(), ListenerState::Stopped);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_second_start_is_rejected_and_keeps_first_binding() {
    let (handle, mut rx) = controller().await;
    let first = free_port();
    handle.start(first).await.unwrap();
    let second = free_port();

    let result = handle.start(second).await;
    assert!(matches!(
        result,
        Err(Error::Listener(ListenerError::AlreadyRunning { port })) if port == first
    ));

    // Same port is rejected too
    let result = handle.start(first).await;
    assert!(matches!(
        result,
        Err(Error::Listener(ListenerError::AlreadyRunning { .. }))
    ));

    let events = drain(&mut rx);
    assert_eq!(statuses(&events), vec![ServerStatus::running(first)]);
    let errors = logs(&events, LogKind::Error);
    assert_eq!(errors.len(), 2);
    assert!(errors[0].message.contains(&first.to_string()));
    assert_eq!(handle.state().await.unwrap(), ListenerState::Bound(first));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stop_without_start_reports_not_running() {
    let (handle, mut rx) = controller().await;

    let result = handle.stop().await;
    assert!(matches!(
        result,
        Err(Error::Listener(ListenerError::NotRunning))
    ));

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(logs(&events, LogKind::Error).len(), 1);
    assert!(statuses(&events).is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bind_failure_returns_to_stopped() {
    let holder = std::net::UdpSocket::bind("0.0.0.0:0").unwrap();
    let port = holder.local_addr().unwrap().port();
    let (handle, mut rx) = controller().await;

    let result = handle.start(port).await;
    assert!(matches!(
        result,
        Err(Error::Listener(ListenerError::Bind { .. }))
    ));
    assert_eq!(handle.state().await.unwrap(), ListenerState::Stopped);

    let events = drain(&mut rx);
    assert_eq!(logs(&events, LogKind::Error).len(), 1);
    assert!(!statuses(&events).iter().any(|s| s.running));

    // The listener is usable again afterwards
    drop(holder);
    let port = free_port();
    assert_eq!(handle.start(port).await.unwrap(), port);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_loopback_send_is_logged_on_both_sides() {
    let (handle, mut rx) = controller().await;
    let port = free_port();
    handle.start(port).await.unwrap();
    drain(&mut rx);

    handle
        .send(SendRequest::new(Endpoint::new("127.0.0.1", port), "A0 B1 C2"))
        .await
        .unwrap();

    let events = collect_until(
        &mut rx,
        |e| matches!(e, ControllerEvent::Log(l) if l.kind == LogKind::Recv),
    )
    .await;

    // The sent log is emitted before send() returns, so it is already queued
    let sent = logs(&events, LogKind::Sent);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].message.contains(&format!("127.0.0.1:{}", port)));

    let recv = logs(&events, LogKind::Recv);
    assert_eq!(recv.len(), 1);
    assert!(recv[0].message.ends_with("a0 b1 c2"));
    assert!(recv[0].message.contains("127.0.0.1:"));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_empty_payload_is_a_valid_datagram() {
    let (handle, mut rx) = controller().await;
    let port = free_port();
    handle.start(port).await.unwrap();
    drain(&mut rx);

    handle
        .send(SendRequest::new(Endpoint::new("127.0.0.1", port), ""))
        .await
        .unwrap();

    let events = collect_until(
        &mut rx,
        |e| matches!(e, ControllerEvent::Log(l) if l.kind == LogKind::Recv),
    )
    .await;
    assert_eq!(logs(&events, LogKind::Sent).len(), 1);
    assert!(logs(&events, LogKind::Error).is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_hex_never_reaches_the_wire() {
    let (handle, mut rx) = controller().await;
    let port = free_port();
    handle.start(port).await.unwrap();
    drain(&mut rx);

    for bad in ["abc", "zz", "0x10"] {
        let result = handle
            .send(SendRequest::new(Endpoint::new("127.0.0.1", port), bad))
            .await;
        assert!(matches!(
            result,
            Err(Error::Send(SendError::InvalidPayload(_)))
        ));
    }

    // A valid send afterwards still works and is the only thing received
    handle
        .send(SendRequest::new(Endpoint::new("127.0.0.1", port), "01"))
        .await
        .unwrap();
    let events = collect_until(
        &mut rx,
        |e| matches!(e, ControllerEvent::Log(l) if l.kind == LogKind::Recv),
    )
    .await;

    assert_eq!(logs(&events, LogKind::Error).len(), 3);
    assert_eq!(logs(&events, LogKind::Sent).len(), 1);
    let recv = logs(&events, LogKind::Recv);
    assert_eq!(recv.len(), 1);
    assert!(recv[0].message.ends_with("01"));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_restart_after_stop_binds_again() {
    let (handle, mut rx) = controller().await;
    let port = free_port();

    handle.start(port).await.unwrap();
    handle.stop().await.unwrap();
    collect_until(&mut rx, is_stopped_status).await;

    assert_eq!(handle.start(port).await.unwrap(), port);
    assert_eq!(handle.state().await.unwrap(), ListenerState::Bound(port));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_listener_and_rejects_further_requests() {
    let (handle, mut rx) = controller().await;
    let port = free_port();
    handle.start(port).await.unwrap();

    handle.shutdown().await.unwrap();
    let events = drain(&mut rx);
    assert_eq!(statuses(&events).last(), Some(&ServerStatus::stopped()));

    assert!(matches!(
        handle.start(port).await,
        Err(Error::ControllerClosed)
    ));
    // Port is free again
    std::net::UdpSocket::bind(("0.0.0.0", port)).unwrap();
}
