//! HTML rendering for `GET /status`.

use crate::request_log::LogSnapshot;

const MAX_MODELS_SHOWN: usize = 10;

/// Everything the status page shows, gathered by the handler.
pub struct StatusView<'a> {
    pub backend_connected: bool,
    pub backend_url: &'a str,
    pub default_model: &'a str,
    pub port: &'a str,
    pub models: &'a [String],
    pub snapshot: &'a LogSnapshot,
    pub masked_api_key: &'a str,
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_status_page(view: &StatusView<'_>) -> String {
    let (backend_class, backend_label) = if view.backend_connected {
        ("success", "Connected")
    } else {
        ("error", "Disconnected")
    };
    let seen = view.snapshot.recognized_requests > 0;
    let (seen_class, seen_label) = if seen { ("success", "YES") } else { ("error", "NO") };
    let last_seen = view
        .snapshot
        .last_recognized
        .as_ref()
        .map(|e| escape(&e.timestamp))
        .unwrap_or_else(|| "Never".to_string());

    let models: String = view
        .models
        .iter()
        .take(MAX_MODELS_SHOWN)
        .map(|m| format!("<li>{}</li>", escape(m)))
        .collect();

    let log_lines: String = view
        .snapshot
        .recent
        .iter()
        .map(|r| {
            format!(
                "<div class=\"log-entry\">[{}] {} - {} - Status: {}</div>",
                escape(&r.timestamp),
                escape(&r.endpoint),
                r.source.as_str(),
                r.status
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Ollama Bridge - Status</title>
    <style>
        body {{ font-family: monospace; margin: 40px; background: #1a1a1a; color: #fff; }}
        .status {{ padding: 20px; background: #2a2a2a; border-radius: 8px; margin: 20px 0; }}
        .success {{ color: #4ade80; }}
        .error {{ color: #f87171; }}
        .info {{ color: #60a5fa; }}
        h1 {{ color: #fbbf24; }}
        .log {{ max-height: 400px; overflow-y: auto; background: #000; padding: 10px; border-radius: 4px; }}
        .log-entry {{ margin: 5px 0; font-size: 12px; }}
    </style>
</head>
<body>
    <h1>Ollama Bridge</h1>

    <div class="status">
        <h2>Service Status</h2>
        <p>Bridge: <span class="success">Running on port {port}</span></p>
        <p>Ollama: <span class="{backend_class}">{backend_label}</span></p>
        <p>Ollama URL: <span class="info">{backend_url}</span></p>
        <p>Default Model: <span class="info">{default_model}</span></p>
    </div>

    <div class="status">
        <h2>Available Ollama Models</h2>
        <ul>
            {models}
        </ul>
    </div>

    <div class="status">
        <h2>Client Connection Status</h2>
        <p>Total Requests: <span class="info">{total}</span></p>
        <p>Cursor Requests Detected: <span class="{seen_class}">{seen_label}</span></p>
        <p>Last Cursor Request: <span class="info">{last_seen}</span></p>
    </div>

    <div class="status">
        <h2>Recent Requests (Last 10)</h2>
        <div class="log">
            {log_lines}
        </div>
    </div>

    <div class="status">
        <h2>Configuration</h2>
        <p>Endpoint: <code>http://localhost:{port}/api/cursor/filter</code></p>
        <p>API Key: <code>{api_key}</code></p>
    </div>
</body>
</html>
"#,
        port = escape(view.port),
        backend_class = backend_class,
        backend_label = backend_label,
        backend_url = escape(view.backend_url),
        default_model = escape(view.default_model),
        models = models,
        total = view.snapshot.total_requests,
        seen_class = seen_class,
        seen_label = seen_label,
        last_seen = last_seen,
        log_lines = log_lines,
        api_key = escape(view.masked_api_key),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_log::{LogEntry, RequestLog};

    fn view<'a>(snapshot: &'a LogSnapshot, models: &'a [String], connected: bool) -> StatusView<'a> {
        StatusView {
            backend_connected: connected,
            backend_url: "http://localhost:11434",
            default_model: "qwen2.5-coder:7b",
            port: "8080",
            models,
            snapshot,
            masked_api_key: "xiba****",
        }
    }

    #[test]
    fn renders_counts_models_and_recent_log() {
        let log = RequestLog::new();
        log.append(LogEntry::new("/api/cursor/filter", 200, Some("Cursor/1.0"), None));
        let snapshot = log.snapshot(10);
        let models: Vec<String> = (0..12).map(|i| format!("model-{i}")).collect();

        let html = render_status_page(&view(&snapshot, &models, true));
        assert!(html.contains("<span class=\"success\">Connected</span>"));
        assert!(html.contains("<li>model-9</li>"));
        assert!(!html.contains("<li>model-10</li>"));
        assert!(html.contains("Total Requests: <span class=\"info\">1</span>"));
        assert!(html.contains("<span class=\"success\">YES</span>"));
        assert!(html.contains("/api/cursor/filter - cursor - Status: 200"));
        assert!(html.contains("xiba****"));
    }

    #[test]
    fn renders_disconnected_backend_and_escapes_names() {
        let snapshot = RequestLog::new().snapshot(10);
        let models = vec!["<script>".to_string()];
        let html = render_status_page(&view(&snapshot, &models, false));
        assert!(html.contains("<span class=\"error\">Disconnected</span>"));
        assert!(html.contains("Never"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<li><script>"));
    }
}
