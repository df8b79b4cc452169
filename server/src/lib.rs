use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use sift_core::error::QueryError;
use sift_core::persist::IndexStore;
use sift_core::query::{extract_search_field, url_decode, QueryEngine};
use sift_core::SearchHit;
use std::fmt::Write as _;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

const FORM_PAGE: &str = r#"<html>
<head><meta charset="UTF-8"><title>Search Engine</title></head>
<body>
<h1>Search Engine</h1>
<p>Welcome!</p>
<form action="/" method="post">
    <label for="search">Search:</label><br>
    <input type="text" id="search" name="search"><br>
    <input type="submit" value="Search">
</form>
</body>
</html>
"#;

#[derive(Clone)]
pub struct AppState {
    pub engine: QueryEngine,
}

pub fn build_app(store: Arc<dyn IndexStore>) -> Router {
    let app_state = AppState { engine: QueryEngine::new(store) };
    Router::new()
        .route("/", get(form_handler).post(search_handler).fallback(unsupported_method))
        .fallback(not_found)
        .with_state(app_state)
        .layer(SetResponseHeaderLayer::overriding(header::SERVER, HeaderValue::from_static("sift")))
        .layer(TraceLayer::new_for_http())
}

pub async fn form_handler() -> Html<&'static str> {
    Html(FORM_PAGE)
}

pub async fn search_handler(State(state): State<AppState>, body: String) -> Response {
    let Some(raw) = extract_search_field(&body) else {
        return plain(StatusCode::BAD_REQUEST, "Invalid search request");
    };
    let query = url_decode(raw);
    let raw = raw.to_string();
    let engine = state.engine.clone();

    // sled is blocking
    match tokio::task::spawn_blocking(move || engine.search(&raw)).await {
        Ok(Ok(hits)) => Html(render_results(&query, &hits)).into_response(),
        Ok(Err(QueryError::EmptyQuery)) => plain(StatusCode::BAD_REQUEST, "Query too short"),
        Ok(Err(QueryError::Store(e))) => {
            tracing::warn!(error = %e, "search failed");
            plain(StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {e}"))
        }
        Err(e) => plain(StatusCode::INTERNAL_SERVER_ERROR, format!("Search task failed: {e}")),
    }
}

async fn unsupported_method(method: Method) -> Response {
    plain(StatusCode::BAD_REQUEST, format!("Invalid request-method '{method}'"))
}

async fn not_found(method: Method) -> Response {
    match method {
        Method::GET => plain(StatusCode::NOT_FOUND, "File not found\r\n"),
        Method::POST => plain(StatusCode::NOT_FOUND, "Page not found"),
        other => unsupported_method(other).await,
    }
}

fn plain(status: StatusCode, message: impl Into<String>) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], message.into()).into_response()
}

/// Results page: ordered list of hits, or a notice when nothing matched.
pub fn render_results(query: &str, hits: &[SearchHit]) -> String {
    let mut page = String::from("<html><head><meta charset='UTF-8'><title>Results</title></head><body>");
    let _ = write!(page, "<h1>Results for \"{}\"</h1>", html_escape::encode_text(query));
    if hits.is_empty() {
        page.push_str("<p>No results found</p>");
    } else {
        page.push_str("<ol>");
        for hit in hits {
            let _ = write!(
                page,
                "<li><a href=\"{}\">{}</a> (relevance: {})</li>",
                html_escape::encode_double_quoted_attribute(&hit.url),
                html_escape::encode_text(&hit.title),
                hit.relevance
            );
        }
        page.push_str("</ol>");
    }
    page.push_str("</body></html>");
    page
}

/// Accept connections until `shutdown` resolves. Each connection gets its own task and
/// one request; if it has not finished within `deadline` the socket is dropped.
pub async fn serve<F>(listener: TcpListener, app: Router, deadline: Duration, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);
    loop {
        let accepted = tokio::select! {
            res = listener.accept() => res,
            _ = &mut shutdown => {
                tracing::info!("server shutting down");
                return Ok(());
            }
        };
        match accepted {
            Ok((stream, peer)) => {
                let app = app.clone();
                tokio::spawn(handle_connection(stream, peer, app, deadline));
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, app: Router, deadline: Duration) {
    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .keep_alive(false)
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(app));
    match tokio::time::timeout(deadline, conn).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(%peer, error = %e, "connection error"),
        Err(_) => tracing::warn!(%peer, "connection deadline expired, closing"),
    }
}
