//! Development server: static files out of the project root, every HTML
//! page patched with the reload client, and a WebSocket that tells
//! connected browsers when to refresh.

mod live;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Request, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use colored::*;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::thread;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::services::ServeDir;

const RELOAD_SNIPPET: &str = "<script src=\"/__kiln/reload.js\"></script>";

pub(crate) struct ServeState {
    root: PathBuf,
    files: ServeDir,
    pub(crate) reload_tx: broadcast::Sender<String>,
}

/// Cheap clonable handle the pipeline uses to push reloads. Works whether
/// or not the server ever started; with nobody listening a notify is
/// simply dropped.
#[derive(Clone)]
pub struct ReloadHandle {
    tx: broadcast::Sender<String>,
}

impl ReloadHandle {
    pub fn notify(&self, reason: &'static str) {
        let _ = self
            .tx
            .send(live::ws_json("reload", serde_json::json!({ "reason": reason })));
    }
}

pub struct DevServer {
    reload_tx: broadcast::Sender<String>,
    bound: OnceLock<SocketAddr>,
}

impl DevServer {
    pub fn new() -> Self {
        let (reload_tx, _) = broadcast::channel(32);
        Self {
            reload_tx,
            bound: OnceLock::new(),
        }
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        ReloadHandle {
            tx: self.reload_tx.clone(),
        }
    }

    /// Binds the address and starts serving on a background thread.
    /// Starting an already-running server is a no-op that returns the
    /// original address. A taken port is a hard error, never a silent
    /// shift to a free one.
    pub fn start(&self, root: PathBuf, host: &str, port: u16) -> Result<SocketAddr> {
        if let Some(addr) = self.bound.get() {
            return Ok(*addr);
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("Failed to start the async runtime")?;

        let requested = format!("{host}:{port}");
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind(&requested))
            .with_context(|| {
                format!("Failed to bind {requested} - is another server running on that port?")
            })?;
        let addr = listener
            .local_addr()
            .context("Failed to read the bound address")?;

        let state = Arc::new(ServeState {
            root: root.clone(),
            files: ServeDir::new(root),
            reload_tx: self.reload_tx.clone(),
        });
        let app = router(state);

        thread::Builder::new()
            .name("kiln-serve".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    if let Err(e) = axum::serve(listener, app).await {
                        eprintln!("{} Dev server stopped: {e}", "x".red());
                    }
                });
            })
            .context("Failed to spawn the server thread")?;

        let _ = self.bound.set(addr);
        Ok(addr)
    }

    pub fn address(&self) -> Option<SocketAddr> {
        self.bound.get().copied()
    }
}

impl Default for DevServer {
    fn default() -> Self {
        Self::new()
    }
}

fn router(state: Arc<ServeState>) -> Router {
    Router::new()
        .route("/__kiln/ws", get(live::ws_upgrade))
        .route("/__kiln/reload.js", get(live::reload_js))
        .fallback(assets)
        .with_state(state)
}

/// HTML goes out through the injector so the browser always carries the
/// reload client; everything else is plain static file service.
async fn assets(State(state): State<Arc<ServeState>>, req: Request) -> Response {
    if let Some(page) = html_path(&state.root, req.uri().path())
        && let Ok(html) = tokio::fs::read_to_string(&page).await
    {
        return Html(inject_reload_script(&html)).into_response();
    }
    match state.files.clone().oneshot(req).await {
        Ok(res) => res.into_response(),
        Err(err) => match err {},
    }
}

/// Maps a request path to an HTML file under the root, if that is what it
/// is. Directory requests fall through to their `index.html`. Anything
/// trying to climb out of the root resolves to nothing.
fn html_path(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let rel = uri_path.trim_start_matches('/');
    // A `\` in a component would act as a separator once joined on Windows.
    if rel.split('/').any(|part| part == ".." || part.contains('\\')) {
        return None;
    }
    let mut path = root.join(rel);
    if path.is_dir() {
        path = path.join("index.html");
    }
    let is_html = path
        .extension()
        .is_some_and(|ext| ext == "html" || ext == "htm");
    (is_html && path.is_file()).then_some(path)
}

/// Splices the reload client in front of `</body>`, or appends it when
/// the page has no closing body tag. Matching is case-insensitive; the
/// last occurrence wins.
fn inject_reload_script(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(idx) => format!("{}{}\n{}", &html[..idx], RELOAD_SNIPPET, &html[idx..]),
        None => format!("{html}\n{RELOAD_SNIPPET}"),
    }
}
