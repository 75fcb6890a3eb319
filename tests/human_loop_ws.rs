// tests/human_loop_ws.rs
//
// Operator WebSocket on a real listener: question push, answer ack, ping/pong.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use autopattern::config::settings::{Settings, SettingsHandle};
use autopattern::config::Config;
use autopattern::dispatch::CommandAgent;
use autopattern::hitl::HumanLoop;
use autopattern::{router, AppState};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve() -> (String, HumanLoop) {
    let config = Config::default();
    let settings = SettingsHandle::new(Settings::from_config(&config), vec![]);
    let agent = Arc::new(CommandAgent::new("unused-agent", vec![]));
    let state = AppState::new(config, settings, None, agent);
    let human = state.human.clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(state)).await;
    });
    (format!("ws://{addr}/ws/human-loop"), human)
}

async fn send(ws: &mut Client, v: Value) {
    ws.send(Message::text(v.to_string())).await.expect("send frame");
}

/// Next text frame as JSON, bounded so a protocol break fails instead of hanging.
async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame within 5s")
            .expect("socket open")
            .expect("valid frame");
        if let Message::Text(_) = msg {
            return serde_json::from_str(msg.to_text().unwrap()).expect("json frame");
        }
    }
}

#[tokio::test]
async fn ping_gets_pong() {
    let (url, _human) = serve().await;
    let (mut ws, _) = connect_async(url.as_str()).await.expect("connect");

    send(&mut ws, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut ws).await, json!({"type": "pong"}));
}

#[tokio::test]
async fn question_is_pushed_and_answer_resolves_ask() {
    let (url, human) = serve().await;
    let (mut ws, _) = connect_async(url.as_str()).await.expect("connect");

    // pong means the socket has subscribed to questions
    send(&mut ws, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut ws).await["type"], "pong");

    let asking = {
        let human = human.clone();
        tokio::spawn(async move { human.ask("Which account should I use?").await })
    };

    let q = next_json(&mut ws).await;
    assert_eq!(q["type"], "question");
    assert_eq!(q["question"], "Which account should I use?");
    assert!(q["timestamp"].as_i64().unwrap() > 0);
    let id = q["question_id"].as_str().unwrap().to_string();

    send(
        &mut ws,
        json!({"type": "answer", "question_id": id, "answer": "the work account"}),
    )
    .await;
    let ack = next_json(&mut ws).await;
    assert_eq!(ack, json!({"type": "ack", "question_id": id, "accepted": true}));

    let answer = tokio::time::timeout(Duration::from_secs(5), asking)
        .await
        .expect("ask resolves")
        .unwrap();
    assert_eq!(answer, "the work account");
    assert_eq!(human.pending_count(), 0);
}

#[tokio::test]
async fn answer_for_unknown_question_is_not_accepted() {
    let (url, _human) = serve().await;
    let (mut ws, _) = connect_async(url.as_str()).await.expect("connect");

    send(
        &mut ws,
        json!({"type": "answer", "question_id": "nope", "answer": "x"}),
    )
    .await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "ack", "question_id": "nope", "accepted": false})
    );
}
