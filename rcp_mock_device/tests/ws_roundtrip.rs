use crossbeam_channel::bounded;
use rcp_mock_device::{demo, MainLoop, NetworkThread};
use rcp_protocol::{ClientCommand, ErrorCode, ParamDescriptor, ParamUpdate, ServerMessage};
use serde_json::json;
use std::net::TcpStream;
use std::time::{Duration, Instant};
use tungstenite::Message;

type Ws = tungstenite::WebSocket<TcpStream>;

fn start() -> (NetworkThread, MainLoop, Ws) {
    let (in_tx, in_rx) = bounded(rcp_mock_device::INBOUND_CAP);
    let (out_tx, out_rx) = bounded(rcp_mock_device::OUTBOUND_CAP);

    let net = NetworkThread::spawn_with_addr("127.0.0.1:0", in_tx, out_rx).expect("spawn net");
    let addr = net.listen_addr();
    let main_loop = MainLoop::new(in_rx, out_tx);

    let stream = TcpStream::connect(addr).expect("tcp connect");
    let (ws, _) = tungstenite::client(format!("ws://{addr}"), stream).expect("ws connect");
    // short reads so the test can tick the device between them
    let _ = ws.get_ref().set_read_timeout(Some(Duration::from_millis(50)));
    let _ = ws.get_ref().set_write_timeout(Some(Duration::from_millis(200)));
    (net, main_loop, ws)
}

fn send(ws: &mut Ws, cmd: &ClientCommand) {
    ws.send(Message::Text(serde_json::to_string(cmd).unwrap().into()))
        .unwrap();
}

/// Ticks the device until a server message arrives.
fn next_message(ws: &mut Ws, main_loop: &mut MainLoop) -> ServerMessage {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        main_loop.tick();
        match ws.read() {
            Ok(Message::Text(s)) => return serde_json::from_str(&s).expect("valid server json"),
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => panic!("ws read failed: {e:?}"),
        }
        if Instant::now() >= deadline {
            panic!("timeout waiting for server message");
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// A refusal is followed by the stored value so the client can revert.
fn expect_value(ws: &mut Ws, main_loop: &mut MainLoop, id: i32, value: serde_json::Value) {
    match next_message(ws, main_loop) {
        ServerMessage::ParamUpdated { update } => assert_eq!(update, ParamUpdate::value(id, value)),
        other => panic!("expected param_updated, got: {other:?}"),
    }
}

fn load_tree(ws: &mut Ws, main_loop: &mut MainLoop) -> Vec<ParamDescriptor> {
    send(ws, &ClientCommand::Init);
    let count = main_loop.store().len();
    (0..count)
        .map(|_| match next_message(ws, main_loop) {
            ServerMessage::ParamAdded { param } => param,
            other => panic!("expected param_added, got: {other:?}"),
        })
        .collect()
}

#[test]
fn init_sends_tree_parents_first() {
    let (net, mut main_loop, mut ws) = start();
    let tree = load_tree(&mut ws, &mut main_loop);

    let ids: Vec<i32> = tree.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    let freq = &tree[1];
    assert_eq!(freq.parent, Some(demo::OSCILLATOR));
    assert_eq!(freq.maximum, Some(20_000.0));

    net.shutdown();
}

#[test]
fn updates_are_validated_and_echoed() {
    let (net, mut main_loop, mut ws) = start();
    load_tree(&mut ws, &mut main_loop);

    send(
        &mut ws,
        &ClientCommand::UpdateValue {
            id: demo::GAIN,
            value: json!(0.75),
        },
    );
    match next_message(&mut ws, &mut main_loop) {
        ServerMessage::ParamUpdated { update } => {
            assert_eq!(update, ParamUpdate::value(demo::GAIN, json!(0.75)))
        }
        other => panic!("expected param_updated, got: {other:?}"),
    }

    send(
        &mut ws,
        &ClientCommand::Update {
            param: ParamUpdate::value(demo::GAIN, json!(3.0)),
        },
    );
    match next_message(&mut ws, &mut main_loop) {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::InvalidValue),
        other => panic!("expected error, got: {other:?}"),
    }
    expect_value(&mut ws, &mut main_loop, demo::GAIN, json!(0.75));

    send(
        &mut ws,
        &ClientCommand::UpdateValue {
            id: demo::STATUS,
            value: json!("stopped"),
        },
    );
    match next_message(&mut ws, &mut main_loop) {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::Readonly),
        other => panic!("expected error, got: {other:?}"),
    }
    expect_value(&mut ws, &mut main_loop, demo::STATUS, json!("running"));

    send(
        &mut ws,
        &ClientCommand::UpdateValue {
            id: 404,
            value: json!(1),
        },
    );
    match next_message(&mut ws, &mut main_loop) {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::UnknownParam),
        other => panic!("expected error, got: {other:?}"),
    }

    net.shutdown();
}

#[test]
fn reset_trigger_restores_defaults() {
    let (net, mut main_loop, mut ws) = start();
    load_tree(&mut ws, &mut main_loop);

    send(
        &mut ws,
        &ClientCommand::UpdateValue {
            id: demo::GAIN,
            value: json!(0.1),
        },
    );
    next_message(&mut ws, &mut main_loop);

    send(
        &mut ws,
        &ClientCommand::UpdateValue {
            id: demo::RESET,
            value: serde_json::Value::Null,
        },
    );
    match next_message(&mut ws, &mut main_loop) {
        ServerMessage::ParamUpdated { update } => {
            assert_eq!(update, ParamUpdate::value(demo::GAIN, json!(0.5)))
        }
        other => panic!("expected param_updated, got: {other:?}"),
    }

    net.shutdown();
}

#[test]
fn live_tree_changes_are_pushed() {
    let (net, mut main_loop, mut ws) = start();
    load_tree(&mut ws, &mut main_loop);

    let mut extra = ParamDescriptor::new(20, rcp_protocol::datatype::INT);
    extra.label = Some("voices".into());
    main_loop.add_param(extra.clone());
    match next_message(&mut ws, &mut main_loop) {
        ServerMessage::ParamAdded { param } => assert_eq!(param, extra),
        other => panic!("expected param_added, got: {other:?}"),
    }

    main_loop.remove_param(demo::OSCILLATOR);
    match next_message(&mut ws, &mut main_loop) {
        ServerMessage::ParamRemoved { id } => assert_eq!(id, demo::OSCILLATOR),
        other => panic!("expected param_removed, got: {other:?}"),
    }
    assert!(main_loop.store().get(demo::FREQUENCY).is_none());

    net.shutdown();
}
