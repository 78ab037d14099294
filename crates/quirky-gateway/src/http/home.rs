use axum::{extract::State, response::Html};
use serde_json::Value;
use std::sync::Arc;

use crate::app::AppState;

static INDEX_HTML: &str = include_str!("../../static/index.html");

/// Serve the viewer page at `GET /`, pointed at this server's stream endpoint.
pub async fn home_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_index(
        &state.config.server.public_host(),
        state.config.server.ws_scheme(),
    ))
}

/// The host comes from config (`FQDN`), so it is inserted as a JSON string
/// literal with `<`, `>` and `&` escaped; it can neither end the string nor
/// close the surrounding `<script>`.
fn render_index(host: &str, ws_scheme: &str) -> String {
    let url = Value::String(format!("{ws_scheme}://{host}/stream")).to_string();
    let literal = url
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026");
    INDEX_HTML.replace("{{stream_url}}", &literal)
}
