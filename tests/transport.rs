mod common;

use common::{fast_options, next_event, reply, MockDevice};
use shelly_gen2::{ClientOptions, ConnectionState, ReconnectPolicy, RpcClient, TransportEvent};
use std::time::Duration;

fn is_disconnect(event: &TransportEvent) -> bool {
    matches!(event, TransportEvent::Disconnect { .. })
}

#[tokio::test]
async fn abnormal_drop_schedules_first_reconnect_interval() {
    let mock = MockDevice::start(|req| Some(reply(req, serde_json::json!({})))).await;
    let options = fast_options().with_reconnect(ReconnectPolicy::default());
    let client = RpcClient::for_host(&mock.hostname(), &options);
    let mut events = client.transport().subscribe();

    client.transport().connect().await.unwrap();
    next_event(&mut events, |e| matches!(e, TransportEvent::Connect)).await;

    mock.drop_connections();

    match next_event(&mut events, is_disconnect).await {
        TransportEvent::Disconnect {
            code, reconnect_in, ..
        } => {
            assert_eq!(code, 1006);
            assert_eq!(reconnect_in, Some(Duration::from_secs(5)));
        }
        _ => unreachable!(),
    }
    assert_eq!(client.transport().state(), ConnectionState::Disconnected);
    assert_eq!(client.transport().reconnect_attempt(), 1);

    client.destroy().await;
}

#[tokio::test]
async fn reconnects_after_drop() {
    let mock = MockDevice::start(|req| Some(reply(req, serde_json::json!({})))).await;
    let options = fast_options().with_reconnect(ReconnectPolicy::fixed(Duration::from_millis(50)));
    let client = RpcClient::for_host(&mock.hostname(), &options);
    let mut events = client.transport().subscribe();

    client.transport().connect().await.unwrap();
    next_event(&mut events, |e| matches!(e, TransportEvent::Connect)).await;
    let first_generation = client.transport().generation();

    mock.drop_connections();
    next_event(&mut events, is_disconnect).await;
    next_event(&mut events, |e| matches!(e, TransportEvent::Connect)).await;

    mock.wait_for_connections(2).await;
    assert_eq!(client.transport().reconnect_attempt(), 0);
    assert!(client.transport().generation() > first_generation);

    client.destroy().await;
}

#[tokio::test]
async fn server_normal_close_does_not_reconnect() {
    let mock = MockDevice::start(|req| Some(reply(req, serde_json::json!({})))).await;
    let options = fast_options().with_reconnect(ReconnectPolicy::default());
    let client = RpcClient::for_host(&mock.hostname(), &options);
    let mut events = client.transport().subscribe();

    client.transport().connect().await.unwrap();
    mock.close(1000);

    match next_event(&mut events, is_disconnect).await {
        TransportEvent::Disconnect {
            code, reconnect_in, ..
        } => {
            assert_eq!(code, 1000);
            assert_eq!(reconnect_in, None);
        }
        _ => unreachable!(),
    }

    client.destroy().await;
}

#[tokio::test]
async fn intentional_disconnect_does_not_reconnect() {
    let mock = MockDevice::start(|req| Some(reply(req, serde_json::json!({})))).await;
    let options = fast_options().with_reconnect(ReconnectPolicy::default());
    let client = RpcClient::for_host(&mock.hostname(), &options);
    let mut events = client.transport().subscribe();

    client.transport().connect().await.unwrap();
    client.transport().disconnect().await.unwrap();

    match next_event(&mut events, is_disconnect).await {
        TransportEvent::Disconnect { reconnect_in, .. } => assert_eq!(reconnect_in, None),
        _ => unreachable!(),
    }
    assert_eq!(client.transport().state(), ConnectionState::Disconnected);

    // Reconnecting on demand still works
    client.request("Shelly.GetStatus", None).await.unwrap();
    assert_eq!(mock.connections(), 2);

    client.destroy().await;
}

#[tokio::test]
async fn missing_pong_terminates_connection() {
    let mock = MockDevice::silent().await;
    let options = ClientOptions::default()
        .with_request_timeout(Duration::from_millis(200))
        .with_ping_interval(Duration::from_millis(100))
        .with_reconnect(ReconnectPolicy::disabled());
    let client = RpcClient::for_host(&mock.hostname(), &options);
    let mut events = client.transport().subscribe();

    client.transport().connect().await.unwrap();

    match next_event(&mut events, is_disconnect).await {
        TransportEvent::Disconnect {
            code, reconnect_in, ..
        } => {
            assert_eq!(code, 1006);
            assert_eq!(reconnect_in, None);
        }
        _ => unreachable!(),
    }

    client.destroy().await;
    mock.drop_connections();
}

#[tokio::test]
async fn answered_pings_keep_the_connection() {
    let mock = MockDevice::start(|req| Some(reply(req, serde_json::json!({})))).await;
    let options = ClientOptions::default()
        .with_request_timeout(Duration::from_millis(200))
        .with_ping_interval(Duration::from_millis(50))
        .with_reconnect(ReconnectPolicy::disabled());
    let client = RpcClient::for_host(&mock.hostname(), &options);

    client.transport().connect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(client.transport().state(), ConnectionState::Open);
    assert_eq!(mock.connections(), 1);

    client.destroy().await;
}

#[tokio::test]
async fn failed_connect_enters_reconnect_schedule() {
    // Bind and drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let hostname = listener.local_addr().unwrap().to_string();
    drop(listener);

    let options = fast_options().with_reconnect(ReconnectPolicy::new([Duration::from_secs(30)]));
    let client = RpcClient::for_host(&hostname, &options);
    let mut events = client.transport().subscribe();

    assert!(client.transport().connect().await.is_err());
    match next_event(&mut events, is_disconnect).await {
        TransportEvent::Disconnect {
            code, reconnect_in, ..
        } => {
            assert_eq!(code, 1006);
            assert_eq!(reconnect_in, Some(Duration::from_secs(30)));
        }
        _ => unreachable!(),
    }

    client.destroy().await;
}

#[tokio::test]
async fn outbound_requests_are_tagged_and_reported() {
    let mock = MockDevice::start(|req| Some(reply(req, serde_json::json!({})))).await;
    let options = fast_options().with_client_id("test-client");
    let client = RpcClient::for_host(&mock.hostname(), &options);
    let mut events = client.transport().subscribe();

    client.request("Sys.GetStatus", None).await.unwrap();

    match next_event(&mut events, |e| matches!(e, TransportEvent::Request(_))).await {
        TransportEvent::Request(request) => {
            assert_eq!(request.method, "Sys.GetStatus");
            assert_eq!(request.src, "test-client");
        }
        _ => unreachable!(),
    }
    assert_eq!(mock.requests()[0]["src"], "test-client");

    client.destroy().await;
}
