use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use estatebot_types::{AudioFrame, HistoryWindow, Role, TranscriptKind};
use estatebot_voice::{
    ConversationEngine, DeepgramConfig, DeepgramStt, DeepgramTts, EngineConfig,
    HttpConversationEngine, SpeechSynthesizer, SpeechToText, VoiceError,
};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ---------------------------------------------------------------------------
// Conversational engine
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct EngineState {
    last_body: Arc<Mutex<Option<Value>>>,
}

async fn generate(State(state): State<EngineState>, Json(body): Json<Value>) -> Json<Value> {
    *state.last_body.lock().unwrap() = Some(body);
    Json(json!({ "text": "Plots range 213 to 742 square yards.", "image_url": null }))
}

fn engine_for(addr: SocketAddr, path: &str) -> HttpConversationEngine {
    HttpConversationEngine::new(&EngineConfig {
        url: format!("http://{addr}{path}"),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn engine_posts_project_and_history() {
    let state = EngineState::default();
    let app = Router::new()
        .route("/voice_query", post(generate))
        .with_state(state.clone());
    let addr = serve(app).await;

    let window = HistoryWindow::build(Vec::new(), "What is the plot size?", 20);
    let reply = engine_for(addr, "/voice_query")
        .generate("Krupal Habitat", &window)
        .await
        .unwrap();
    assert_eq!(reply.text, "Plots range 213 to 742 square yards.");
    assert_eq!(reply.image_url, None);

    let body = state.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["project"], "Krupal Habitat");
    assert_eq!(body["voice_mode"], true);
    assert_eq!(
        body["history"],
        json!([{ "role": "user", "content": "What is the plot size?" }])
    );
}

#[tokio::test]
async fn engine_error_status_is_an_error() {
    let app = Router::new().route(
        "/voice_query",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "index not loaded") }),
    );
    let addr = serve(app).await;

    let window = HistoryWindow::build(Vec::new(), "hello", 20);
    let err = engine_for(addr, "/voice_query")
        .generate("Krupal Habitat", &window)
        .await
        .unwrap_err();
    match err {
        VoiceError::Engine(message) => assert!(message.contains("index not loaded")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn engine_empty_reply_is_an_error() {
    let app = Router::new().route(
        "/voice_query",
        post(|| async { Json(json!({ "text": "  " })) }),
    );
    let addr = serve(app).await;

    let window = HistoryWindow::build(Vec::new(), "hello", 20);
    let err = engine_for(addr, "/voice_query")
        .generate("Krupal Habitat", &window)
        .await
        .unwrap_err();
    assert!(matches!(err, VoiceError::Engine(_)));
}

// ---------------------------------------------------------------------------
// Speech synthesis
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpeakState {
    query: Arc<Mutex<Option<String>>>,
    auth: Arc<Mutex<Option<String>>>,
    text: Arc<Mutex<Option<String>>>,
}

async fn speak(
    State(state): State<SpeakState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    *state.query.lock().unwrap() = query;
    *state.auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.text.lock().unwrap() = body["text"].as_str().map(str::to_string);

    let samples: [i16; 4] = [1, 2, 3, -1];
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    bytes
}

fn deepgram_for(addr: SocketAddr) -> DeepgramConfig {
    DeepgramConfig {
        api_key: "dg-test".to_string(),
        listen_url: format!("ws://{addr}/v1/listen"),
        speak_url: format!("http://{addr}/v1/speak"),
        ..Default::default()
    }
}

#[tokio::test]
async fn tts_streams_linear16_frames() {
    let state = SpeakState::default();
    let app = Router::new()
        .route("/v1/speak", post(speak))
        .with_state(state.clone());
    let addr = serve(app).await;

    let tts = DeepgramTts::new(deepgram_for(addr)).unwrap();
    let frames: Vec<AudioFrame> = tts
        .synthesize("Plots range 213 to 742 square yards.")
        .await
        .unwrap()
        .map(|frame| frame.unwrap())
        .collect()
        .await;

    let samples: Vec<i16> = frames.iter().flat_map(|f| f.data.clone()).collect();
    assert_eq!(samples, vec![1, 2, 3, -1]);
    assert!(frames.iter().all(|f| f.sample_rate == 24_000 && f.num_channels == 1));

    let query = state.query.lock().unwrap().clone().unwrap();
    assert!(query.contains("model=aura-2-andromeda-en"));
    assert!(query.contains("encoding=linear16"));
    assert!(query.contains("sample_rate=24000"));
    assert_eq!(state.auth.lock().unwrap().as_deref(), Some("Token dg-test"));
    assert_eq!(
        state.text.lock().unwrap().as_deref(),
        Some("Plots range 213 to 742 square yards.")
    );
}

#[tokio::test]
async fn tts_rejects_oversized_text() {
    let tts = DeepgramTts::new(DeepgramConfig::default()).unwrap();
    let text = "a".repeat(2_001);
    let err = match tts.synthesize(&text).await {
        Ok(_) => panic!("oversized text was accepted"),
        Err(e) => e,
    };
    assert!(matches!(err, VoiceError::Tts(_)));
}

// ---------------------------------------------------------------------------
// Speech recognition
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct ListenState {
    auth: Arc<Mutex<Option<String>>>,
    bytes: Arc<Mutex<usize>>,
}

async fn listen(
    State(state): State<ListenState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    *state.auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    ws.on_upgrade(move |socket| recognize(socket, state))
}

/// Emits one interim result per audio message and a final result once the
/// client asks to close the stream.
async fn recognize(mut socket: WebSocket, state: ListenState) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Binary(audio) => {
                *state.bytes.lock().unwrap() += audio.len();
                let interim = json!({
                    "type": "Results",
                    "is_final": false,
                    "channel": { "alternatives": [{ "transcript": "what is" }] }
                });
                if socket
                    .send(Message::Text(interim.to_string().into()))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Message::Text(text) if text.as_str().contains("CloseStream") => {
                let metadata = json!({ "type": "Metadata", "request_id": "abc" });
                let result = json!({
                    "type": "Results",
                    "is_final": true,
                    "channel": { "alternatives": [{ "transcript": "What is the plot size?" }] }
                });
                let _ = socket.send(Message::Text(metadata.to_string().into())).await;
                let _ = socket.send(Message::Text(result.to_string().into())).await;
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn stt_relays_audio_and_reports_results() {
    let state = ListenState::default();
    let app = Router::new()
        .route("/v1/listen", get(listen))
        .with_state(state.clone());
    let addr = serve(app).await;

    let stt = DeepgramStt::new(deepgram_for(addr), 8, 8);
    let mut stream = stt.stream().await.unwrap();

    stream
        .input
        .send(AudioFrame::new(vec![0; 480], 48_000, 1))
        .await
        .unwrap();
    stream
        .input
        .send(AudioFrame::new(vec![0; 480], 48_000, 1))
        .await
        .unwrap();
    drop(stream.input);

    let mut events = Vec::new();
    while let Some(event) = stream.events.recv().await {
        events.push(event.unwrap());
    }

    assert_eq!(events.len(), 3);
    assert_eq!(events[0].kind, TranscriptKind::Partial);
    assert_eq!(events[2].kind, TranscriptKind::Final);
    assert_eq!(events[2].text, "What is the plot size?");
    assert_eq!(events[2].actionable_text(), Some("What is the plot size?"));

    assert_eq!(*state.bytes.lock().unwrap(), 2 * 480 * 2);
    assert_eq!(state.auth.lock().unwrap().as_deref(), Some("Token dg-test"));
}

#[test]
fn history_roles_serialize_lowercase() {
    let window = HistoryWindow::build(Vec::new(), "hi", 20);
    let value = serde_json::to_value(&window).unwrap();
    assert_eq!(value[0]["role"], Role::User.as_str());
}
