//! End-to-end tests: controller, HTTP client, and a local completion endpoint.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use tutorchat::protocol::{CHAT_PATH, TUTOR_SYSTEM_PROMPT};
    use tutorchat::render::{MessageView, RenderPipeline};
    use tutorchat::server::{ServerConfig, serve};
    use tutorchat::{
        CompletionClient, DirStore, ERROR_MARKER, MemoryStore, Message, SessionStore,
        SubmitOutcome, ViewController,
    };

    /// Serve `POST /api/chat` answering every request with `reply` and `status`.
    async fn fake_endpoint(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Vec<Value>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&requests);
        let app = Router::new().route(
            CHAT_PATH,
            post(move |Json(body): Json<Value>| {
                let recorder = Arc::clone(&recorder);
                let reply = reply.clone();
                async move {
                    recorder.lock().unwrap().push(body);
                    (status, Json(reply))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}{CHAT_PATH}"), requests)
    }

    #[tokio::test]
    async fn hi_gets_hello() {
        let (endpoint, requests) = fake_endpoint(StatusCode::OK, json!({"reply": "hello"})).await;
        let client = CompletionClient::new(&endpoint).unwrap();
        let mut ctl = ViewController::new(SessionStore::new(MemoryStore::new()), client);
        ctl.new_session();

        let outcome = ctl.submit("hi").await;
        assert!(matches!(outcome, SubmitOutcome::Succeeded), "{outcome:?}");
        assert_eq!(
            ctl.active_session().unwrap().messages,
            vec![Message::user("hi"), Message::assistant("hello")]
        );

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0],
            json!({"messages": [
                {"role": "system", "content": TUTOR_SYSTEM_PROMPT},
                {"role": "user", "content": "hi"}
            ]})
        );
    }

    #[tokio::test]
    async fn server_error_becomes_error_entry() {
        let (endpoint, _) = fake_endpoint(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "server error: upstream unavailable"}),
        )
        .await;
        let client = CompletionClient::new(&endpoint).unwrap();
        let mut ctl = ViewController::new(SessionStore::new(MemoryStore::new()), client);
        ctl.new_session();

        let outcome = ctl.submit("hi").await;
        assert!(matches!(outcome, SubmitOutcome::Failed(_)), "{outcome:?}");
        let messages = &ctl.active_session().unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert!(messages[1].is_assistant());
        assert!(messages[1].content.starts_with(ERROR_MARKER));
        assert!(messages[1].content.contains("upstream unavailable"));
        assert!(ctl.input_enabled());
    }

    #[tokio::test]
    async fn unreachable_endpoint_becomes_error_entry() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = CompletionClient::new(&format!("http://{addr}{CHAT_PATH}")).unwrap();
        let mut ctl = ViewController::new(SessionStore::new(MemoryStore::new()), client);
        ctl.new_session();

        let outcome = ctl.submit("hi").await;
        assert!(matches!(outcome, SubmitOutcome::Failed(_)), "{outcome:?}");
        let messages = &ctl.active_session().unwrap().messages;
        assert!(messages[1].content.starts_with(ERROR_MARKER));
    }

    #[tokio::test]
    async fn conversation_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let (endpoint, _) = fake_endpoint(StatusCode::OK, json!({"reply": "Half of 8 is **4**."})).await;

        let id = {
            let store = SessionStore::open(DirStore::open(dir.path()).unwrap());
            let client = CompletionClient::new(&endpoint).unwrap();
            let mut ctl = ViewController::new(store, client);
            let id = ctl.new_session();
            ctl.submit("what is half of 8?").await;
            id
        };

        let store = SessionStore::open(DirStore::open(dir.path()).unwrap());
        assert_eq!(store.active_id(), Some(&id));
        let session = store.active_session().unwrap();
        assert_eq!(session.title, "New chat 1");
        assert_eq!(session.messages.len(), 2);

        let views: Vec<_> = session.messages.iter().map(MessageView::settled).collect();
        let rendered = RenderPipeline::new().render(&views);
        assert!(rendered[1].html.contains("<strong>4</strong>"), "{}", rendered[1].html);
    }

    #[tokio::test]
    async fn client_against_server_without_key() {
        let handle = serve(ServerConfig::default().with_bind("127.0.0.1:0"))
            .await
            .unwrap();
        let client = CompletionClient::new(&handle.chat_url()).unwrap();
        let mut ctl = ViewController::new(SessionStore::new(MemoryStore::new()), client);
        ctl.new_session();

        let outcome = ctl.submit("hi").await;
        assert!(matches!(outcome, SubmitOutcome::Failed(_)), "{outcome:?}");
        let reply = &ctl.active_session().unwrap().messages[1];
        assert!(reply.content.starts_with(ERROR_MARKER), "{}", reply.content);
        assert!(reply.content.contains("server error"), "{}", reply.content);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let app = Router::new().route(
            CHAT_PATH,
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"reply": "too late"}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = CompletionClient::with_options(
            &format!("http://{addr}{CHAT_PATH}"),
            Some(Duration::from_millis(200)),
            None,
        )
        .unwrap();
        let mut ctl = ViewController::new(SessionStore::new(MemoryStore::new()), client);
        ctl.new_session();

        let outcome = ctl.submit("hi").await;
        assert!(
            matches!(&outcome, SubmitOutcome::Failed(err) if err.is_timeout()),
            "{outcome:?}"
        );
        let reply = &ctl.active_session().unwrap().messages[1];
        assert!(reply.is_assistant());
        assert!(reply.content.starts_with(ERROR_MARKER), "{}", reply.content);
        assert!(!ctl.is_loading());
    }
}
