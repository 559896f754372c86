use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value as JsonValue};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};

use fieldgw::device_registry::DeviceRegistry;
use fieldgw::dispatcher::Dispatcher;

async fn start_gateway() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().unwrap();
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(DeviceRegistry::new())));
    tokio::spawn(async move {
        let _ = fieldgw::serve(listener, dispatcher).await;
    });
    addr
}

struct Client {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect gateway");
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    /// Write one raw line and read one response line.
    async fn roundtrip_raw(&mut self, raw: &str) -> JsonValue {
        self.writer
            .write_all(format!("{raw}\n").as_bytes())
            .await
            .expect("write request");
        let mut line = String::new();
        self.reader.read_line(&mut line).await.expect("read response");
        serde_json::from_str(&line).expect("response is one JSON document per line")
    }

    async fn roundtrip(&mut self, request: JsonValue) -> JsonValue {
        self.roundtrip_raw(&request.to_string()).await
    }
}

fn rtu_device(id: &str) -> JsonValue {
    json!({
        "deviceId": id,
        "protocolType": "ModbusRtu",
        "connectionParams": { "serialPort": "/dev/ttyS0" }
    })
}

#[tokio::test]
async fn ping_roundtrip_preserves_message_id() {
    let addr = start_gateway().await;
    let mut client = Client::connect(addr).await;

    let resp = client
        .roundtrip(json!({"messageId": "m-42", "command": "ping", "version": "1.0"}))
        .await;
    assert_eq!(resp["messageId"], "m-42");
    assert_eq!(resp["success"], true);
    assert_eq!(resp["command"], "ping");
    assert_eq!(resp["data"]["message"], "pong");
    // UTC millisecond timestamp, fixed width
    let ts = resp["timestamp"].as_str().unwrap();
    assert_eq!(ts.len(), 24);
    assert!(ts.ends_with('Z'));
}

#[tokio::test]
async fn malformed_json_gets_error_envelope_and_keeps_connection() {
    let addr = start_gateway().await;
    let mut client = Client::connect(addr).await;

    let resp = client.roundtrip_raw("this is not json").await;
    assert_eq!(resp["success"], false);
    assert_eq!(resp["error"]["kind"], "ParseError");
    assert!(resp["messageId"].as_str().unwrap().starts_with("gw-"));

    // the socket must still be usable
    let resp = client
        .roundtrip(json!({"command": "ping", "version": "1.0"}))
        .await;
    assert_eq!(resp["success"], true);
}

#[tokio::test]
async fn message_id_is_salvaged_from_invalid_request() {
    let addr = start_gateway().await;
    let mut client = Client::connect(addr).await;

    // valid JSON object, but `command` has the wrong type
    let resp = client
        .roundtrip_raw(r#"{"messageId": "keep-me", "command": 7}"#)
        .await;
    assert_eq!(resp["success"], false);
    assert_eq!(resp["error"]["kind"], "ParseError");
    assert_eq!(resp["messageId"], "keep-me");
}

#[tokio::test]
async fn device_lifecycle_over_the_wire() {
    let addr = start_gateway().await;
    let mut client = Client::connect(addr).await;

    let resp = client
        .roundtrip(json!({"command": "add_device", "data": rtu_device("press-1"), "version": "1.0"}))
        .await;
    assert_eq!(resp["success"], true);

    let resp = client
        .roundtrip(json!({"command": "connect_device", "data": {"deviceId": "press-1"}, "version": "1.0"}))
        .await;
    assert_eq!(resp["success"], true);
    assert_eq!(resp["data"]["state"], "Connected");

    let resp = client
        .roundtrip(json!({
            "command": "write_data",
            "data": {"deviceId": "press-1", "dataPoints": [
                {"address": "10", "value": 1234},
                {"address": "oops", "value": 1}
            ]},
            "version": "1.0"
        }))
        .await;
    assert_eq!(resp["success"], true);
    let results = resp["data"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["success"], false);

    let resp = client
        .roundtrip(json!({
            "command": "read_data",
            "data": {"deviceId": "press-1", "addresses": ["10"]},
            "version": "1.0"
        }))
        .await;
    assert_eq!(resp["data"]["results"][0]["value"], 1234);

    let resp = client
        .roundtrip(json!({"command": "remove_device", "data": {"deviceId": "press-1"}, "version": "1.0"}))
        .await;
    assert_eq!(resp["success"], true);

    let resp = client
        .roundtrip(json!({"command": "device_list", "version": "1.0"}))
        .await;
    assert!(resp["data"]["devices"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn modbus_tcp_connect_against_local_peer() {
    let addr = start_gateway().await;
    let mut client = Client::connect(addr).await;

    // stand-in PLC: accept and hold connections
    let plc = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let plc_port = plc.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((sock, _)) = plc.accept().await {
            held.push(sock);
        }
    });

    let resp = client
        .roundtrip(json!({
            "command": "add_device",
            "data": {
                "deviceId": "plc-1",
                "protocolType": "ModbusTcp",
                "connectionParams": {"host": "127.0.0.1", "port": plc_port, "timeoutMs": 2000}
            },
            "version": "1.0"
        }))
        .await;
    assert_eq!(resp["success"], true);

    let resp = client
        .roundtrip(json!({"command": "connect_device", "data": {"deviceId": "plc-1"}, "version": "1.0"}))
        .await;
    assert_eq!(resp["success"], true);

    let resp = client
        .roundtrip(json!({"command": "device_status", "data": {"deviceId": "plc-1"}, "version": "1.0"}))
        .await;
    assert_eq!(resp["data"]["state"], "Connected");
    assert_eq!(resp["data"]["deviceId"], "plc-1");
}

#[tokio::test]
async fn device_state_is_shared_across_connections() {
    let addr = start_gateway().await;
    let mut first = Client::connect(addr).await;
    let mut second = Client::connect(addr).await;

    let resp = first
        .roundtrip(json!({"command": "add_device", "data": rtu_device("shared"), "version": "1.0"}))
        .await;
    assert_eq!(resp["success"], true);

    // a different socket sees and operates on the same device
    let resp = second
        .roundtrip(json!({"command": "connect_device", "data": {"deviceId": "shared"}, "version": "1.0"}))
        .await;
    assert_eq!(resp["success"], true);

    let resp = first
        .roundtrip(json!({"command": "device_status", "data": {"deviceId": "shared"}, "version": "1.0"}))
        .await;
    assert_eq!(resp["data"]["state"], "Connected");
}

#[tokio::test]
async fn blank_lines_are_ignored() {
    let addr = start_gateway().await;
    let mut client = Client::connect(addr).await;

    client.writer.write_all(b"\n\n").await.unwrap();
    let resp = client
        .roundtrip(json!({"command": "ping", "version": "1.0"}))
        .await;
    assert_eq!(resp["success"], true);
}
