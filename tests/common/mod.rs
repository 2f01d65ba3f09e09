use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use quiz_live_back::build_router;
use quiz_live_back::config::AppConfig;
use quiz_live_back::dao::quiz_store::MemoryQuizStore;
use quiz_live_back::state::AppState;

pub const HOST_ID: &str = "host-1";

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub http: reqwest::Client,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a server backed by the in-memory store.
    pub async fn new() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = AppState::with_store(AppConfig::default(), Arc::new(MemoryQuizStore::new()));
        let app = build_router(state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            http: reqwest::Client::new(),
            _shutdown: handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/ws?{}", self.addr, query)
    }

    /// Seed a quiz where option 0 of every question is the correct one.
    pub async fn create_quiz(&self, mode: &str, question_count: usize) -> Value {
        let questions = (0..question_count)
            .map(|n| {
                json!({
                    "text": format!("Question {n}"),
                    "timeLimit": 20,
                    "options": [
                        {"text": "right", "isCorrect": true},
                        {"text": "wrong"},
                        {"text": "also wrong"},
                    ],
                })
            })
            .collect::<Vec<_>>();

        let response = self
            .http
            .post(self.url("/quizzes"))
            .header("X-Host-Id", HOST_ID)
            .json(&json!({"title": "Trivia", "mode": mode, "questions": questions}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }

    /// Create a quiz and open a lobby for it. Returns the session creation payload.
    pub async fn open_session(&self, mode: &str, question_count: usize) -> Value {
        let quiz = self.create_quiz(mode, question_count).await;
        let response = self
            .http
            .post(self.url(&format!("/quizzes/{}/sessions", quiz["id"].as_str().unwrap())))
            .header("X-Host-Id", HOST_ID)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }

    pub async fn join(&self, code: &str, name: &str) -> reqwest::Response {
        self.http
            .post(self.url("/join"))
            .json(&json!({"joinCode": code, "name": name}))
            .send()
            .await
            .unwrap()
    }

    /// Join and return the participant id.
    pub async fn join_ok(&self, code: &str, name: &str) -> String {
        let response = self.join(code, name).await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        body["participantId"].as_str().unwrap().to_owned()
    }

    pub async fn host_command(&self, session: &Value, command: &str) -> reqwest::Response {
        self.http
            .post(self.url(&format!(
                "/sessions/{}/{command}",
                session["sessionId"].as_str().unwrap()
            )))
            .header("X-Host-Token", session["hostToken"].as_str().unwrap())
            .send()
            .await
            .unwrap()
    }

    pub async fn host_view(&self, session: &Value) -> Value {
        let response = self
            .http
            .get(self.url(&format!(
                "/sessions/{}/host-view",
                session["sessionId"].as_str().unwrap()
            )))
            .header("X-Host-Token", session["hostToken"].as_str().unwrap())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }

    /// Attach the host socket of `session`.
    pub async fn connect_host(&self, session: &Value) -> WsStream {
        let url = self.ws_url(&format!(
            "code={}&role=HOST&token={}",
            session["joinCode"].as_str().unwrap(),
            session["hostToken"].as_str().unwrap()
        ));
        let mut stream = ws_connect(&url).await;
        ws_sync(&mut stream).await;
        stream
    }

    /// Attach a participant socket and bind it with `JOIN`.
    pub async fn connect_participant(&self, code: &str, participant_id: &str) -> WsStream {
        let mut stream = ws_connect(&self.ws_url(&format!("code={code}"))).await;
        ws_send(
            &mut stream,
            json!({"type": "JOIN", "participantId": participant_id}),
        )
        .await;
        let joined = ws_read_until(&mut stream, "PLAYER_JOINED").await;
        assert_eq!(joined["participantId"], participant_id);
        stream
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Round-trip a ping so the server has finished attaching the connection.
pub async fn ws_sync(stream: &mut WsStream) {
    stream
        .send(Message::Ping(b"sync".to_vec().into()))
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Pong(_))) => return,
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
            }
        }
    })
    .await
    .expect("Timed out waiting for pong")
}

pub async fn ws_send(stream: &mut WsStream, message: Value) {
    stream
        .send(Message::Text(message.to_string().into()))
        .await
        .unwrap();
}

/// Read the next JSON text frame (5s timeout).
pub async fn ws_read_json(stream: &mut WsStream) -> Value {
    ws_try_read_json(stream, 5_000)
        .await
        .expect("Timed out waiting for WebSocket message")
}

/// Try to read the next JSON text frame, returning None on timeout.
pub async fn ws_try_read_json(stream: &mut WsStream, timeout_ms: u64) -> Option<Value> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Skip frames until one of type `kind` arrives.
pub async fn ws_read_until(stream: &mut WsStream, kind: &str) -> Value {
    loop {
        let frame = ws_read_json(stream).await;
        if frame["type"] == kind {
            return frame;
        }
    }
}

/// Read the next frame and assert its type.
pub async fn ws_expect(stream: &mut WsStream, kind: &str) -> Value {
    let frame = ws_read_json(stream).await;
    assert_eq!(frame["type"], kind, "unexpected frame {frame}");
    frame
}

/// Id of option `n` of the question carried by a `NEXT_QUESTION` frame.
pub fn option_id(frame: &Value, n: usize) -> String {
    frame["question"]["options"][n]["id"]
        .as_str()
        .unwrap()
        .to_owned()
}
