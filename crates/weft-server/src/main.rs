use clap::Parser;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Map};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use weft_contract::{
    generate_id, Agent, AgentEvent, AgentEventStream, AgentFactory, AgentRunRequest, SessionStore,
};
use weft_protocol_ag_ui::{EncodingMode, SseEncoder};
use weft_runtime::{
    ConfigContext, DefaultSessionLockHandler, HandlerSet, MemorySessionStore, RunPipeline,
    SessionLockConfig, ValueSource,
};
use weft_server::http;
use weft_server::service::AppState;

#[derive(Debug, Parser)]
#[command(name = "weft-server")]
struct Args {
    #[arg(long, env = "WEFT_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    http_addr: String,

    #[arg(long, env = "WEFT_APP_NAME", default_value = "weft")]
    app_name: String,

    #[arg(long, env = "WEFT_CONFIG")]
    config: Option<PathBuf>,

    /// Emit bare JSON frames instead of SSE framing.
    #[arg(long, env = "WEFT_PLAIN_TEXT")]
    plain_text: bool,
}

#[derive(Debug, Default, Deserialize)]
struct Config {
    /// Lock lease in seconds; 0 disables lease expiry.
    #[serde(default)]
    lock_timeout_secs: Option<u64>,
    #[serde(default)]
    lock_retry_times: Option<u32>,
    #[serde(default)]
    lock_retry_interval_secs: Option<u64>,
    #[serde(default)]
    snapshot_on_complete: bool,
    #[serde(default)]
    attach_raw_events: bool,
    /// When set, the user id is read from this request header; otherwise
    /// every request runs as `fallback_user_id`.
    #[serde(default)]
    user_id_header: Option<String>,
    #[serde(default = "default_fallback_user_id")]
    fallback_user_id: String,
}

fn default_fallback_user_id() -> String {
    "local".to_string()
}

fn lock_config(cfg: &Config) -> SessionLockConfig {
    let defaults = SessionLockConfig::default();
    SessionLockConfig {
        lock_timeout: match cfg.lock_timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.lock_timeout,
        },
        lock_retry_times: cfg.lock_retry_times.unwrap_or(defaults.lock_retry_times),
        lock_retry_interval: cfg
            .lock_retry_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.lock_retry_interval),
    }
}

/// Demo agent: streams the newest user message back word by word, reports
/// server info through a tool call, and records the prompt in state.
///
/// Stands in for a real agent when exercising the server end to end.
struct EchoAgent;

impl Agent for EchoAgent {
    fn run(self: Box<Self>, request: AgentRunRequest) -> AgentEventStream {
        let prompt = request
            .input
            .latest_user_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let mut events = Vec::new();
        let words: Vec<&str> = prompt.split_whitespace().collect();
        match words.split_last() {
            Some((last, init)) => {
                for word in init {
                    events.push(Ok(AgentEvent::text_partial("echo", format!("{word} "))));
                }
                events.push(Ok(AgentEvent::text("echo", (*last).to_string())));
            }
            None => events.push(Ok(AgentEvent::text("echo", "Nothing to echo."))),
        }

        let call_id = generate_id();
        events.push(Ok(AgentEvent::function_call(
            "echo",
            &call_id,
            "server_info",
            None,
        )));
        events.push(Ok(AgentEvent::function_response(
            "echo",
            &call_id,
            "server_info",
            json!({ "server": "weft", "echoed_words": words.len() }),
        )));

        let mut delta = Map::new();
        delta.insert("last_prompt".to_string(), json!(prompt));
        events.push(Ok(AgentEvent::state_delta("echo", delta)));
        events.push(Ok(AgentEvent::turn_complete("echo")));

        futures::stream::iter(events).boxed()
    }
}

struct EchoAgentFactory;

impl AgentFactory for EchoAgentFactory {
    fn create_agent(&self) -> Box<dyn Agent> {
        Box::new(EchoAgent)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let cfg = match args.config.as_ref() {
        Some(path) => {
            let raw = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("failed to read config {}: {e}", path.display());
                    std::process::exit(2);
                }
            };
            match serde_json::from_str::<Config>(&raw) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("failed to parse config (JSON): {e}");
                    std::process::exit(2);
                }
            }
        }
        None => Config::default(),
    };

    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let lock = Arc::new(DefaultSessionLockHandler::new(lock_config(&cfg)));
    let handlers = HandlerSet::new().with_lock(lock);
    let pipeline = RunPipeline::new(Arc::new(EchoAgentFactory), store.clone())
        .with_handlers(handlers)
        .with_snapshot_on_complete(cfg.snapshot_on_complete)
        .with_raw_events(cfg.attach_raw_events);

    let config_ctx = match &cfg.user_id_header {
        Some(name) => ConfigContext::with_user_id_header(name.clone()),
        None => ConfigContext::new(ValueSource::constant(cfg.fallback_user_id.clone())),
    }
    .with_app_name(ValueSource::constant(args.app_name.clone()));

    let mode = if args.plain_text {
        EncodingMode::Plain
    } else {
        EncodingMode::Sse
    };

    let app = axum::Router::new()
        .merge(http::health_routes())
        .merge(http::run_routes())
        .merge(http::session_routes())
        .with_state(AppState {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config_ctx),
            store,
            encoder: SseEncoder::new(mode),
            app_name: args.app_name,
        });

    let listener = tokio::net::TcpListener::bind(&args.http_addr)
        .await
        .expect("failed to bind http listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .expect("http server crashed");
}
