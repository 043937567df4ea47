//! Integration tests for the MCP server.
//!
//! These tests drive the JSON-RPC 2.0 protocol handling and the tool session
//! end to end against a chip written to a temporary directory.

mod common;

use std::path::Path;

use interconnect_fixture::config::LayoutConfig;
use interconnect_fixture::mcp::protocol::{parse_message, IncomingMessage, RequestId};
use interconnect_fixture::mcp::server::{McpServer, ServerState};
use interconnect_fixture::mcp::Session;
use serde_json::{json, Value};

// =============================================================================
// Protocol Parsing Tests
// =============================================================================

#[test]
fn test_parse_initialize_request() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {
                "name": "test-client",
                "version": "1.0.0"
            }
        }
    }"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Request(req) = result.unwrap() {
        assert_eq!(req.method, "initialize");
        assert_eq!(req.id, RequestId::Number(1));
    } else {
        panic!("Expected Request");
    }
}

#[test]
fn test_parse_notification() {
    let json = r#"{
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Notification(notif) = result.unwrap() {
        assert_eq!(notif.method, "notifications/initialized");
    } else {
        panic!("Expected Notification");
    }
}

#[test]
fn test_parse_invalid_json() {
    assert!(parse_message("not valid json").is_err());
}

#[test]
fn test_parse_missing_jsonrpc_version() {
    let json = r#"{
        "id": 1,
        "method": "test"
    }"#;

    assert!(parse_message(json).is_err());
}

// =============================================================================
// Helpers
// =============================================================================

fn session_in(dir: &Path) -> Session {
    Session::new(vec![dir.to_path_buf()], LayoutConfig::default())
}

/// Calls a tool and parses its JSON text, asserting success.
fn call_ok(session: &mut Session, name: &str, arguments: Value) -> Value {
    let result = session.call(name, &arguments);
    assert!(!result.is_error, "{name} failed: {}", result.first_text());
    serde_json::from_str(result.first_text()).unwrap()
}

fn call_err(session: &mut Session, name: &str, arguments: Value) -> String {
    let result = session.call(name, &arguments);
    assert!(result.is_error, "{name} unexpectedly succeeded");
    result.first_text().to_string()
}

fn loaded_session(dir: &Path) -> Session {
    let chip = common::write_chip(dir);
    let mut session = session_in(dir);
    call_ok(
        &mut session,
        "load_chip",
        json!({ "filepath": chip.to_str().unwrap() }),
    );
    session
}

// =============================================================================
// Tool Session Tests
// =============================================================================

#[test]
fn test_load_chip_reports_counts() {
    let dir = tempfile::tempdir().unwrap();
    let chip = common::write_chip(dir.path());
    let mut session = session_in(dir.path());

    let loaded = call_ok(
        &mut session,
        "load_chip",
        json!({ "filepath": chip.to_str().unwrap() }),
    );
    assert_eq!(loaded["pins"], 100);
    assert_eq!(loaded["pads"], 100);
    assert_eq!(loaded["outer_pins"], 36);
    assert_eq!(loaded["net_groups"], 84);
}

#[test]
fn test_list_outer_pins_shows_partners() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    let listed = call_ok(&mut session, "list_outer_pins", json!({}));
    assert_eq!(listed["count"], 36);
    let pins = listed["outer_pins"].as_array().unwrap();
    let x1 = pins.iter().find(|p| p["display_name"] == "X1").unwrap();
    assert_eq!(x1["kind"], "X");
    assert_eq!(x1["partner"], "X10");
    let c1 = pins.iter().find(|p| p["display_name"] == "C1").unwrap();
    assert_eq!(c1["pin_count"], 2);
    assert!(c1["partner"].is_null());
}

#[test]
fn test_connection_editing_flow() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    let created = call_ok(&mut session, "create_connection", json!({ "name": "NET1" }));
    let id = created["connection"]["id"].as_str().unwrap().to_string();
    assert_eq!(id, "conn_0");
    assert!(created["connection"]["color"].as_str().unwrap().starts_with('#'));

    call_ok(&mut session, "add_pin", json!({ "id": id, "pin": "C1" }));
    let added = call_ok(&mut session, "add_pin", json!({ "id": id, "pin": "C2" }));
    assert_eq!(added["connection"]["outerPinNames"], json!(["C1", "C2"]));

    let resolved = call_ok(&mut session, "resolve_pin", json!({ "hint": "pin12" }));
    assert_eq!(resolved["outer_pins"], json!(["C1", "C2"]));

    let renamed = call_ok(
        &mut session,
        "rename_connection",
        json!({ "id": id, "name": "VCC" }),
    );
    assert_eq!(renamed["connection"]["name"], "VCC");

    let recoloured = call_ok(
        &mut session,
        "set_connection_color",
        json!({ "id": id, "color": "#000000" }),
    );
    assert_eq!(recoloured["connection"]["color"], "#000000");

    let removed = call_ok(&mut session, "remove_pin", json!({ "id": id, "pin": "C1" }));
    assert_eq!(removed["connection"]["outerPinNames"], json!(["C2"]));

    call_ok(&mut session, "delete_connection", json!({ "id": id }));
    let listed = call_ok(&mut session, "list_connections", json!({}));
    assert_eq!(listed["count"], 0);
}

#[test]
fn test_policy_errors_are_tool_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    call_ok(&mut session, "create_connection", json!({ "id": "a", "name": "A" }));
    call_ok(&mut session, "create_connection", json!({ "id": "b", "name": "B" }));
    call_ok(&mut session, "add_pin", json!({ "id": "a", "pin": "C1" }));

    let mixed = call_err(&mut session, "add_pin", json!({ "id": "a", "pin": "X1" }));
    assert!(mixed.contains("cannot mix"), "{mixed}");

    let taken = call_err(&mut session, "add_pin", json!({ "id": "b", "pin": "C1" }));
    assert!(taken.contains("already part of connection 'a'"), "{taken}");

    let unknown = call_err(&mut session, "add_pin", json!({ "id": "b", "pin": "C99" }));
    assert!(unknown.contains("C99"), "{unknown}");

    let duplicate = call_err(
        &mut session,
        "create_connection",
        json!({ "id": "a", "name": "again" }),
    );
    assert!(duplicate.contains("already exists"), "{duplicate}");
}

#[test]
fn test_find_bridge_between_neighbours() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    let found = call_ok(&mut session, "find_bridge", json!({ "from": "C1", "to": "C2" }));
    assert_eq!(found["found"], true);
    assert_eq!(found["from_pad"]["pcb_smtpad_id"], "pcb_smtpad_12");
    assert_eq!(found["to_pad"]["pcb_smtpad_id"], "pcb_smtpad_3");

    let missing = call_ok(&mut session, "find_bridge", json!({ "from": "C1", "to": "C3" }));
    assert_eq!(missing["found"], false);
}

#[test]
fn test_generate_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());
    call_ok(&mut session, "create_connection", json!({ "id": "a", "name": "NET1" }));
    call_ok(&mut session, "add_pin", json!({ "id": "a", "pin": "C1" }));
    call_ok(&mut session, "add_pin", json!({ "id": "a", "pin": "C2" }));

    let output = dir.path().join("fixture.json");
    let generated = call_ok(
        &mut session,
        "generate_fixture",
        json!({ "output_path": output.to_str().unwrap() }),
    );
    assert_eq!(generated["summary"]["variant"], "fixture");
    assert_eq!(generated["summary"]["bridges"], 1);

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written, generated["records"]);
    assert_eq!(written[0]["type"], "source_component");

    let footprint = call_ok(&mut session, "generate_footprint", json!({}));
    assert_eq!(footprint["summary"]["variant"], "footprint");
    assert!(footprint["summary"].get("board_size").is_none());
}

#[test]
fn test_connections_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());
    call_ok(&mut session, "create_connection", json!({ "id": "diag", "name": "DIAG" }));
    call_ok(&mut session, "add_pin", json!({ "id": "diag", "pin": "X3" }));

    let saved = dir.path().join("connections.json");
    call_ok(
        &mut session,
        "save_connections",
        json!({ "filepath": saved.to_str().unwrap() }),
    );

    // Reloading the chip drops the connections.
    let chip = dir.path().join("chip.json");
    call_ok(&mut session, "load_chip", json!({ "filepath": chip.to_str().unwrap() }));
    assert!(session.connections().is_empty());

    let loaded = call_ok(
        &mut session,
        "load_connections",
        json!({ "filepath": saved.to_str().unwrap() }),
    );
    assert_eq!(loaded["count"], 1);
    let connection = session.connections().get("diag").unwrap();
    assert_eq!(connection.outer_pin_names, ["X3", "X12"]);
}

#[test]
fn test_hand_edited_connections_are_checked() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = loaded_session(dir.path());

    let path = dir.path().join("bad.json");
    std::fs::write(
        &path,
        json!([{ "id": "a", "name": "A", "outerPinNames": ["C1", "X1"], "color": "#fff" }])
            .to_string(),
    )
    .unwrap();

    let error = call_err(
        &mut session,
        "load_connections",
        json!({ "filepath": path.to_str().unwrap() }),
    );
    assert!(error.contains("cannot mix"), "{error}");
    assert!(session.connections().is_empty());
}

#[test]
fn test_paths_outside_allowed_are_denied() {
    let allowed = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    let chip = common::write_chip(elsewhere.path());
    let mut session = session_in(allowed.path());

    let error = call_err(
        &mut session,
        "load_chip",
        json!({ "filepath": chip.to_str().unwrap() }),
    );
    assert!(error.contains("Access denied"), "{error}");
    assert!(session.chip().is_none());
}

// =============================================================================
// Server Lifecycle Tests
// =============================================================================

fn line(value: &Value) -> String {
    value.to_string()
}

#[test]
fn test_server_lifecycle_and_tool_call() {
    let dir = tempfile::tempdir().unwrap();
    let chip = common::write_chip(dir.path());
    let mut server = McpServer::new(vec![dir.path().to_path_buf()], LayoutConfig::default());
    assert_eq!(server.state(), ServerState::AwaitingInit);

    let early = server.handle_line(&line(&json!({
        "jsonrpc": "2.0", "id": 1, "method": "tools/list"
    })));
    assert!(matches!(early, Some(Err(_))));

    let init = server
        .handle_line(&line(&json!({
            "jsonrpc": "2.0", "id": 2, "method": "initialize",
            "params": { "protocolVersion": "2024-11-05", "capabilities": {} }
        })))
        .unwrap()
        .unwrap();
    assert_eq!(init.result["serverInfo"]["name"], "interconnect-fixture");
    assert_eq!(server.state(), ServerState::Initialising);

    let ack = server.handle_line(&line(&json!({
        "jsonrpc": "2.0", "method": "notifications/initialized"
    })));
    assert!(ack.is_none());
    assert_eq!(server.state(), ServerState::Running);
    assert_eq!(server.protocol_version(), Some("2024-11-05"));

    let tools = server
        .handle_line(&line(&json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/list" })))
        .unwrap()
        .unwrap();
    assert_eq!(tools.result["tools"].as_array().unwrap().len(), 15);

    let loaded = server
        .handle_line(&line(&json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": { "name": "load_chip", "arguments": { "filepath": chip.to_str().unwrap() } }
        })))
        .unwrap()
        .unwrap();
    assert!(loaded.result.get("isError").is_none());

    let generated = server
        .handle_line(&line(&json!({
            "jsonrpc": "2.0", "id": 5, "method": "tools/call",
            "params": { "name": "generate_footprint", "arguments": {} }
        })))
        .unwrap()
        .unwrap();
    let text = generated.result["content"][0]["text"].as_str().unwrap();
    let body: Value = serde_json::from_str(text).unwrap();
    assert_eq!(body["summary"]["by_type"]["pcb_smtpad"], 100);

    let unknown = server
        .handle_line(&line(&json!({ "jsonrpc": "2.0", "id": 6, "method": "resources/list" })))
        .unwrap();
    assert!(unknown.is_err());
}
