//! A client widget driving a live server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::net::TcpListener;
use webterm_client::{
    Endpoint, FixedWorkspaceRoot, HttpTerminalBackend, TERMINATED_TITLE, TerminalEmulator,
    TerminalWidget, TerminalWidgetOptions, WidgetState,
};
use webterm_protocol::TerminalGeometry;
use webterm_server::config::TerminalConfig;
use webterm_server::{AppState, ServerConfig};

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct CapturingEmulator {
    output: Mutex<Vec<u8>>,
}

impl CapturingEmulator {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.output.lock().unwrap()).into_owned()
    }
}

impl TerminalEmulator for CapturingEmulator {
    fn write(&self, data: &[u8]) {
        self.output.lock().unwrap().extend_from_slice(data);
    }
}

async fn spawn_server(shell: &str, args: &[&str]) -> (Arc<AppState>, Endpoint) {
    let config = ServerConfig {
        terminal: TerminalConfig {
            shell: Some(shell.to_string()),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            ..Default::default()
        },
        ..Default::default()
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(AppState::new(config));
    tokio::spawn(webterm_server::serve(
        listener,
        Arc::clone(&state),
        std::future::pending::<()>(),
    ));
    let endpoint = Endpoint::parse(&format!("http://{addr}")).unwrap();
    (state, endpoint)
}

fn widget(endpoint: Endpoint, emulator: Arc<CapturingEmulator>) -> TerminalWidget {
    let options = TerminalWidgetOptions::new("terminal-0", "Terminal 0")
        .with_geometry(TerminalGeometry::new(100, 30).unwrap())
        .with_resize_debounce(Duration::from_millis(50));
    TerminalWidget::new(
        options,
        Arc::new(HttpTerminalBackend::new(endpoint).unwrap()),
        Arc::new(FixedWorkspaceRoot(None)),
        emulator,
    )
}

async fn eventually(mut check: impl AsyncFnMut() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_widget_round_trip_until_process_exits() {
    let (state, endpoint) =
        spawn_server("/bin/sh", &["-c", "read line; printf 'echo:%s' \"$line\""]).await;
    let emulator = Arc::new(CapturingEmulator::default());
    let widget = widget(endpoint, Arc::clone(&emulator));

    widget.start().await.unwrap();
    assert_eq!(widget.state(), WidgetState::Active);
    let id = widget.process_id().unwrap();
    let process = state.registry.get(&id).await.unwrap();
    assert_eq!(process.geometry(), TerminalGeometry::new(100, 30).unwrap());

    widget.send_input(&b"hello\r"[..]);
    tokio::time::timeout(TIMEOUT, widget.closed())
        .await
        .expect("stream should close when the process exits");

    assert!(emulator.text().contains("echo:hello"), "{:?}", emulator.text());
    assert_eq!(widget.title(), TERMINATED_TITLE);
    eventually(async || state.registry.get(&id).await.is_none()).await;
    widget.dispose();
    assert_eq!(widget.state(), WidgetState::Disposed);
}

#[tokio::test]
async fn test_widget_resize_reaches_server() {
    let (state, endpoint) = spawn_server("/bin/sh", &["-c", "sleep 30"]).await;
    let widget = widget(endpoint, Arc::new(CapturingEmulator::default()));
    widget.start().await.unwrap();
    let process = state.registry.get(&widget.process_id().unwrap()).await.unwrap();

    widget.on_viewport_resize(TerminalGeometry::new(90, 20).unwrap());
    widget.on_viewport_resize(TerminalGeometry::new(132, 43).unwrap());

    let expected = TerminalGeometry::new(132, 43).unwrap();
    eventually(async || process.geometry() == expected).await;
    widget.dispose();
}

#[tokio::test]
async fn test_widget_dispose_releases_server_process() {
    let (state, endpoint) = spawn_server("/bin/sh", &["-c", "sleep 30"]).await;
    let widget = widget(endpoint, Arc::new(CapturingEmulator::default()));
    widget.start().await.unwrap();
    assert_eq!(state.registry.len().await, 1);

    widget.dispose();
    widget.dispose();

    assert_eq!(widget.state(), WidgetState::Disposed);
    eventually(async || state.registry.len().await == 0).await;
}

#[tokio::test]
async fn test_widget_spawn_failure_marks_failed() {
    let (state, endpoint) = spawn_server("/definitely/not/a/shell", &[]).await;
    let widget = widget(endpoint, Arc::new(CapturingEmulator::default()));

    widget.start().await.unwrap();

    assert_eq!(widget.state(), WidgetState::Failed);
    assert_eq!(widget.process_id(), None);
    assert_eq!(state.registry.len().await, 0);
}

#[tokio::test]
async fn test_widget_unreachable_server_is_an_error() {
    let endpoint = Endpoint::parse("http://127.0.0.1:9").unwrap();
    let widget = widget(endpoint, Arc::new(CapturingEmulator::default()));

    assert!(widget.start().await.is_err());
    assert_eq!(widget.state(), WidgetState::Failed);
}
