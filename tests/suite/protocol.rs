//! The JSON-lines host protocol driven line by line.

use jjgate_tools::testing::FakeDriver;
use serde_json::{Value, json};

use crate::common::host;

async fn exchange(host: &jjgate::Host, lines: &[Value]) -> Vec<Value> {
    let mut responses = Vec::new();
    for line in lines {
        let out = host.handle_line(&line.to_string()).await.unwrap();
        responses.push(serde_json::from_str(&out).unwrap());
    }
    responses
}

#[tokio::test]
async fn scripted_session_round_trip() {
    let (driver, host) = host(FakeDriver::repo());
    driver.add_bookmark("main");

    let responses = exchange(
        &host,
        &[
            json!({"id": 1, "type": "session.created", "info": {"id": "ses_a"}}),
            json!({"id": 2, "type": "tool.execute.before", "sessionID": "ses_a", "tool": "write"}),
            json!({"id": 3, "type": "tool.call", "sessionID": "ses_a", "tool": "jj",
                   "args": {"description": "Add retry to upload"}}),
            json!({"id": 4, "type": "tool.execute.before", "sessionID": "ses_a", "tool": "write"}),
            json!({"id": 5, "type": "tool.call", "sessionID": "ses_a", "tool": "jj_push",
                   "args": {"confirm": true}}),
            json!({"id": 6, "type": "tool.execute.before", "sessionID": "ses_a", "tool": "write"}),
            json!({"id": 7, "type": "session.deleted", "info": {"id": "ses_a"}}),
        ],
    )
    .await;

    for (index, response) in responses.iter().enumerate() {
        assert_eq!(response["id"], json!(index + 1));
    }
    assert_eq!(responses[0]["ok"], json!(true));
    assert_eq!(responses[1]["blocked"], json!(true));
    assert_eq!(responses[2]["ok"], json!(true));
    assert_eq!(responses[3], json!({"id": 4, "ok": true}));
    assert!(responses[4]["output"].as_str().unwrap().contains("Pushed"));
    assert_eq!(responses[5]["blocked"], json!(true));
    assert_eq!(responses[6]["ok"], json!(true));
    assert_eq!(driver.pushed(), ["main"]);
}

#[tokio::test]
async fn subagent_inherits_through_parent_id() {
    let (_driver, host) = host(FakeDriver::repo());
    let responses = exchange(
        &host,
        &[
            json!({"type": "session.created", "info": {"id": "ses_parent"}}),
            json!({"type": "tool.call", "sessionID": "ses_parent", "tool": "jj",
                   "args": {"description": "Split upload module"}}),
            json!({"type": "session.created", "info": {"id": "ses_child", "parentID": "ses_parent"}}),
        ],
    )
    .await;
    assert!(responses.iter().all(|r| r["ok"] == json!(true)));

    let state = host
        .gate()
        .state(&jjgate_types::SessionId::new("ses_child"))
        .await
        .unwrap();
    assert!(state.unlocked);
    assert_eq!(state.parent.as_ref().map(|p| p.as_str()), Some("ses_parent"));
}

#[tokio::test]
async fn bad_lines_do_not_stop_the_stream() {
    let (_driver, host) = host(FakeDriver::repo());
    for bad in ["[]", "{\"type\":\"nope\"}", "{\"type\":\"tool.call\"}"] {
        let out: Value = serde_json::from_str(&host.handle_line(bad).await.unwrap()).unwrap();
        assert_eq!(out["ok"], json!(false), "{bad}");
        assert!(out["error"].as_str().unwrap().starts_with("invalid request:"));
    }

    let listed: Value =
        serde_json::from_str(&host.handle_line(r#"{"type":"tools.list"}"#).await.unwrap()).unwrap();
    assert_eq!(listed["tools"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn bad_tool_arguments_are_reported() {
    let (_driver, host) = host(FakeDriver::repo());
    let out: Value = serde_json::from_str(
        &host
            .handle_line(r#"{"type":"tool.call","sessionID":"s","tool":"jj","args":{"description":5}}"#)
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(out["ok"], json!(false));
    assert!(out["error"].as_str().unwrap().contains("Bad tool args"));
}
