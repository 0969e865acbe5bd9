//! `fastpack serve` command implementation.
//!
//! Builds once, then rebuilds on change and serves the output directory.
//!
//! ## Pieces
//!
//! - A `notify` watcher on a std thread sends debounced change batches.
//! - One rebuild task receives them; each build runs on the blocking pool and
//!   is awaited before the next batch is looked at, so builds never overlap.
//!   Batches that arrive during a build are merged into the next one.
//! - axum serves `output.path` under `output.publicPath`, plus a live-reload
//!   WebSocket at `/__fastpack/livereload` and its client script at
//!   `/__fastpack/client.js`.
//!
//! A failed rebuild leaves the previous bundle on disk and in service; the
//! error is logged and pushed to connected pages.

use crate::watch::{watch_files, ChangeFilter};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use fastpack_core::{BundleError, BundleOutput, Bundler, Config};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

/// WebSocket endpoint pages subscribe to.
pub const LIVERELOAD_PATH: &str = "/__fastpack/livereload";

/// Script that connects to [`LIVERELOAD_PATH`].
pub const CLIENT_PATH: &str = "/__fastpack/client.js";

const LIVERELOAD_CLIENT: &str = r#"(function () {
  var proto = location.protocol === "https:" ? "wss://" : "ws://";
  var socket = new WebSocket(proto + location.host + "/__fastpack/livereload");
  socket.onmessage = function (event) {
    var msg = JSON.parse(event.data);
    if (msg.type === "reload") {
      location.reload();
    } else if (msg.type === "error") {
      console.error("[fastpack] " + msg.message);
    }
  };
})();
"#;

/// Serve command action.
#[derive(Debug, Clone)]
pub struct ServeAction {
    /// Working directory.
    pub cwd: PathBuf,
    /// Explicit config file path (overrides discovery).
    pub config: Option<PathBuf>,
    /// Overrides `devServer.host`.
    pub host: Option<String>,
    /// Overrides `devServer.port`.
    pub port: Option<u16>,
}

/// Messages pushed to live-reload clients.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReloadMessage {
    /// A rebuild succeeded.
    Reload,
    /// A rebuild failed.
    Error { message: String },
}

impl ReloadMessage {
    fn to_json(&self) -> String {
        match self {
            ReloadMessage::Reload => serde_json::json!({ "type": "reload" }).to_string(),
            ReloadMessage::Error { message } => {
                serde_json::json!({ "type": "error", "message": message }).to_string()
            }
        }
    }
}

/// Shared server state.
struct ServeState {
    reload_tx: broadcast::Sender<ReloadMessage>,
}

/// Run the dev server until interrupted.
pub async fn run(action: ServeAction) -> Result<()> {
    let mut config = Config::discover(&action.cwd, action.config.as_deref())
        .into_diagnostic()?
        .with_dev_server(true);
    if let Some(host) = action.host {
        config.dev_server.host = host;
    }
    if let Some(port) = action.port {
        config.dev_server.port = port;
    }
    let config = Arc::new(config);
    let bundler = Arc::new(Bundler::new(Arc::clone(&config)).into_diagnostic()?);

    let (reload_tx, _) = broadcast::channel::<ReloadMessage>(16);

    // Initial build. A failure here is reported but the server still starts,
    // so fixing the source triggers the first good build.
    let mut filter = ChangeFilter::new();
    record_build(&mut filter, &reload_tx, build(Arc::clone(&bundler)).await);

    let (change_tx, change_rx) = mpsc::channel::<Vec<PathBuf>>(16);
    let watch_root = config.root.clone();
    let bundle_file = config.output_file();
    let debounce = config.dev_server.debounce;
    std::thread::spawn(move || {
        if let Err(e) = watch_files(watch_root, bundle_file, debounce, change_tx) {
            error!(error = %e, "File watcher stopped");
        }
    });

    tokio::spawn(rebuild_loop(
        Arc::clone(&bundler),
        change_rx,
        reload_tx.clone(),
        filter,
    ));

    let app = router(&config, Arc::new(ServeState { reload_tx }));

    let host = config.dev_server.host.as_str();
    let port = config.dev_server.port;
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .into_diagnostic()?;
    let addr = listener.local_addr().into_diagnostic()?;

    println!();
    println!("  Dev server running at http://{addr}");
    println!("  Bundle: http://{addr}{}", config.bundle_url());
    println!("  Live reload: <script src=\"{CLIENT_PATH}\"></script>");
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    Ok(())
}

/// Resolves on Ctrl+C. If the handler cannot be installed the server keeps
/// running and can only be stopped by killing the process.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Routes: live reload endpoints, then the output directory under the public
/// path.
fn router(config: &Config, state: Arc<ServeState>) -> Router {
    let files = ServeDir::new(&config.output_path);
    let app = Router::new()
        .route(LIVERELOAD_PATH, get(livereload_socket))
        .route(CLIENT_PATH, get(serve_client))
        .with_state(state);

    let public = config.output_public_path.trim_end_matches('/');
    let app = if public.is_empty() {
        app.fallback_service(files)
    } else {
        app.nest_service(public, files)
    };

    app.layer(CorsLayer::permissive())
}

/// Run one build on the blocking pool.
async fn build(bundler: Arc<Bundler>) -> Result<BundleOutput, BundleError> {
    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || bundler.bundle())
        .await
        .unwrap_or_else(|e| Err(BundleError::Internal(format!("build task failed: {e}"))));

    if let Ok(output) = &result {
        info!(
            modules = output.modules.len(),
            bytes = output.size_bytes,
            duration_ms = start.elapsed().as_millis() as u64,
            "Build complete"
        );
    }
    result
}

/// Update the change filter and notify clients about a finished build.
fn record_build(
    filter: &mut ChangeFilter,
    reload_tx: &broadcast::Sender<ReloadMessage>,
    result: Result<BundleOutput, BundleError>,
) {
    let message = match result {
        Ok(output) => {
            filter.on_success(output.modules, output.watch_paths);
            ReloadMessage::Reload
        }
        Err(e) => {
            error!(code = e.code(), path = ?e.path(), "{e}");
            filter.on_failure();
            ReloadMessage::Error {
                message: e.to_string(),
            }
        }
    };
    // No receivers just means no page is open.
    let _ = reload_tx.send(message);
}

/// Serialize rebuilds: one build at a time, queued batches merged.
async fn rebuild_loop(
    bundler: Arc<Bundler>,
    mut changes: mpsc::Receiver<Vec<PathBuf>>,
    reload_tx: broadcast::Sender<ReloadMessage>,
    mut filter: ChangeFilter,
) {
    while let Some(mut changed) = changes.recv().await {
        while let Ok(more) = changes.try_recv() {
            changed.extend(more);
        }

        if !filter.is_relevant(&changed) {
            debug!(files = changed.len(), "Ignoring changes outside the bundle");
            continue;
        }

        for path in &changed {
            info!("File changed: {}", path.display());
        }
        let result = build(Arc::clone(&bundler)).await;
        record_build(&mut filter, &reload_tx, result);
    }
}

// ============================================================================
// Live reload
// ============================================================================

async fn serve_client() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript")],
        LIVERELOAD_CLIENT,
    )
}

async fn livereload_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServeState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Forward reload messages until the page goes away.
async fn handle_socket(mut socket: WebSocket, state: Arc<ServeState>) {
    let mut rx = state.reload_tx.subscribe();

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(msg) => {
                    if socket.send(Message::Text(msg.to_json())).await.is_err() {
                        break;
                    }
                }
                // Missed messages collapse into a single reload.
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    let reload = ReloadMessage::Reload.to_json();
                    if socket.send(Message::Text(reload)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    /// Project with `dist/bundle.js` and `dist/style.css` already built.
    fn served_project(public_path: &str) -> (TempDir, Router) {
        let dir = tempdir().unwrap();
        let dist = dir.path().join("dist");
        std::fs::create_dir_all(&dist).unwrap();
        std::fs::write(dist.join("bundle.js"), "console.log(1);\n").unwrap();
        std::fs::write(dist.join("style.css"), "body {}\n").unwrap();

        let text = format!(
            r#"{{ "entry": "index.js", "output": {{ "path": "dist", "filename": "bundle.js", "publicPath": "{public_path}" }} }}"#
        );
        let config =
            Config::from_json(&text, dir.path(), &dir.path().join("fastpack.config.json"))
                .unwrap();
        let (reload_tx, _) = broadcast::channel(4);
        let app = router(&config, Arc::new(ServeState { reload_tx }));
        (dir, app)
    }

    async fn get_path(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    fn assert_javascript(content_type: Option<String>) {
        let content_type = content_type.unwrap();
        assert!(
            content_type.ends_with("javascript"),
            "unexpected content type {content_type}"
        );
    }

    #[tokio::test]
    async fn test_router_serves_bundle_under_public_path() {
        let (_dir, app) = served_project("/static/");

        let (status, content_type, body) = get_path(app, "/static/bundle.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_javascript(content_type);
        assert_eq!(body, "console.log(1);\n");
    }

    #[tokio::test]
    async fn test_router_passes_other_output_files_through() {
        let (_dir, app) = served_project("/static/");

        let (status, content_type, body) = get_path(app, "/static/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/css"));
        assert_eq!(body, "body {}\n");
    }

    #[tokio::test]
    async fn test_router_missing_files_are_not_found() {
        let (_dir, app) = served_project("/static/");
        let (status, _, _) = get_path(app.clone(), "/static/missing.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Outside the public path nothing from the output directory is served.
        let (status, _, _) = get_path(app, "/bundle.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_router_empty_public_path_serves_from_root() {
        let (_dir, app) = served_project("");

        let (status, content_type, body) = get_path(app.clone(), "/bundle.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_javascript(content_type);
        assert_eq!(body, "console.log(1);\n");

        let (status, _, _) = get_path(app.clone(), "/missing.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Live reload routes still win over the output directory.
        let (status, content_type, body) = get_path(app, CLIENT_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert_javascript(content_type);
        assert!(body.contains(LIVERELOAD_PATH));
    }

    #[test]
    fn test_reload_message_json() {
        assert_eq!(ReloadMessage::Reload.to_json(), r#"{"type":"reload"}"#);

        let json: serde_json::Value = serde_json::from_str(
            &ReloadMessage::Error {
                message: "Cannot resolve \"./Main\"".to_string(),
            }
            .to_json(),
        )
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "Cannot resolve \"./Main\"");
    }

    #[test]
    fn test_record_build_failure_broadcasts_error() {
        let (tx, mut rx) = broadcast::channel(4);
        let mut filter = ChangeFilter::new();
        filter.on_success([PathBuf::from("/p/index.js")], []);

        record_build(
            &mut filter,
            &tx,
            Err(BundleError::Internal("boom".to_string())),
        );

        match rx.try_recv().unwrap() {
            ReloadMessage::Error { message } => assert!(message.contains("boom")),
            other => panic!("expected error message, got {other:?}"),
        }
        assert!(filter.is_relevant(&[PathBuf::from("/p/README.md")]));
    }

    #[test]
    fn test_record_build_success_narrows_filter() {
        let (tx, mut rx) = broadcast::channel(4);
        let mut filter = ChangeFilter::new();
        let output = BundleOutput {
            path: PathBuf::from("/p/dist/bundle.js"),
            modules: vec![PathBuf::from("/p/Main.elm"), PathBuf::from("/p/index.js")],
            size_bytes: 0,
            hash: String::new(),
            watch_paths: vec![PathBuf::from("/p/elm")],
        };

        record_build(&mut filter, &tx, Ok(output));

        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Reload);
        assert!(filter.is_relevant(&[PathBuf::from("/p/Main.elm")]));
        assert!(filter.is_relevant(&[PathBuf::from("/p/elm/Page.elm")]));
        assert!(!filter.is_relevant(&[PathBuf::from("/p/README.md")]));
    }
}
