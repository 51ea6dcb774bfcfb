//! The `vilaw` binary: loads configuration and credentials, wires the
//! dispatcher, retriever, cache and safety gate together, and runs the
//! interactive question-answering loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::io::AsyncBufReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vilaw_dispatch::{
    BackendConfig, CredentialPool, DispatchPolicy, Dispatcher, GroqInvoker, RateLimitSpec,
};
use vilaw_memory::{Embedder, HashEmbedder, HttpEmbedder, HybridRetriever, SemanticCache};
use vilaw_rag::{Assistant, RetrievalLimits};

#[derive(Parser)]
#[command(name = "vilaw", about = "Vilaw — trợ lý hỏi đáp văn bản pháp luật")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "vilaw.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive question-answering loop
    Chat {
        /// JSONL file of pre-chunked corpus documents to load at startup
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Per-question deadline in seconds (waits indefinitely when absent)
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    /// Print the effective model, rate limits, and credential count
    Limits,
}

#[derive(Deserialize)]
struct VilawConfig {
    model: BackendConfig,
    #[serde(default)]
    credentials: CredentialsConfig,
    #[serde(default)]
    rate_limit: Option<RateLimitOverride>,
    #[serde(default)]
    dispatch: DispatchConfig,
    #[serde(default)]
    retrieval: RetrievalConfig,
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    safety: SafetyConfig,
}

#[derive(Deserialize)]
struct CredentialsConfig {
    /// Numbered env vars `{env_prefix}1`, `{env_prefix}2`, … hold the pool,
    /// in rotation order.
    #[serde(default = "default_env_prefix")]
    env_prefix: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            env_prefix: default_env_prefix(),
        }
    }
}

/// Explicit limits for models the built-in table does not know.
#[derive(Deserialize)]
struct RateLimitOverride {
    requests_per_window: u32,
    tokens_per_window: u64,
    #[serde(default = "default_window_secs")]
    window_secs: u64,
}

impl RateLimitOverride {
    fn to_spec(&self) -> RateLimitSpec {
        RateLimitSpec {
            requests_per_window: self.requests_per_window,
            tokens_per_window: self.tokens_per_window,
            window: Duration::from_secs(self.window_secs),
        }
    }
}

#[derive(Deserialize, Default)]
struct DispatchConfig {
    /// Fail with an error after this many consecutive all-error sweeps;
    /// absent means wait-and-retry forever.
    #[serde(default)]
    max_error_sweeps: Option<u32>,
}

#[derive(Deserialize)]
struct RetrievalConfig {
    #[serde(default = "default_alpha")]
    alpha: f32,
    #[serde(default = "default_num_retrieved")]
    num_retrieved: usize,
    #[serde(default = "default_num_final")]
    num_final: usize,
    #[serde(default = "default_embedding_dimension")]
    embedding_dimension: usize,
    /// Sentence-transformers style embedding service; the hashing embedder
    /// is used when absent.
    #[serde(default)]
    embedding_url: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            num_retrieved: default_num_retrieved(),
            num_final: default_num_final(),
            embedding_dimension: default_embedding_dimension(),
            embedding_url: None,
        }
    }
}

#[derive(Deserialize)]
struct CacheConfig {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_cache_path")]
    path: PathBuf,
    #[serde(default = "default_cache_threshold")]
    threshold: f32,
    #[serde(default = "default_cache_max_entries")]
    max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_cache_path(),
            threshold: default_cache_threshold(),
            max_entries: default_cache_max_entries(),
        }
    }
}

#[derive(Deserialize)]
struct SafetyConfig {
    #[serde(default = "default_true")]
    enabled: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

fn default_env_prefix() -> String {
    "LLM_API_".to_string()
}
fn default_window_secs() -> u64 {
    60
}
fn default_alpha() -> f32 {
    0.5
}
fn default_num_retrieved() -> usize {
    3
}
fn default_num_final() -> usize {
    5
}
fn default_embedding_dimension() -> usize {
    256
}
fn default_true() -> bool {
    true
}
fn default_cache_path() -> PathBuf {
    PathBuf::from("./data/cache_file.json")
}
fn default_cache_threshold() -> f32 {
    0.9
}
fn default_cache_max_entries() -> usize {
    100
}

/// One line of the JSONL corpus file.
#[derive(Deserialize)]
struct CorpusChunk {
    text: String,
    #[serde(default = "default_corpus_source")]
    source: String,
}

fn default_corpus_source() -> String {
    "corpus".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config_str = tokio::fs::read_to_string(&cli.config).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to read config file '{}': {}",
            cli.config.display(),
            e
        )
    })?;
    let config: VilawConfig = toml::from_str(&config_str)?;

    match cli.command {
        Commands::Chat {
            corpus,
            deadline_secs,
        } => run_chat(config, corpus, deadline_secs).await,
        Commands::Limits => print_limits(&config),
    }
}

fn load_credentials(prefix: &str) -> Vec<String> {
    let mut secrets = Vec::new();
    for i in 1.. {
        match std::env::var(format!("{prefix}{i}")) {
            Ok(value) if !value.trim().is_empty() => secrets.push(value),
            _ => break,
        }
    }
    secrets
}

fn resolve_spec(config: &VilawConfig) -> anyhow::Result<RateLimitSpec> {
    if let Some(over) = &config.rate_limit {
        return Ok(over.to_spec());
    }
    RateLimitSpec::builtin(&config.model.model_id).with_context(|| {
        format!(
            "no built-in rate limits for model '{}'; add a [rate_limit] section",
            config.model.model_id
        )
    })
}

fn build_dispatcher(config: &VilawConfig) -> anyhow::Result<Arc<Dispatcher>> {
    let prefix = &config.credentials.env_prefix;
    let secrets = load_credentials(prefix);
    if secrets.is_empty() {
        bail!("no credentials found: set {prefix}1, {prefix}2, … in the environment or .env");
    }
    let credential_count = secrets.len();

    let spec = resolve_spec(config)?;
    let pool = CredentialPool::new(secrets)?;
    let invoker = Arc::new(GroqInvoker::new(config.model.clone()));

    let mut dispatcher = Dispatcher::new(pool, spec, invoker);
    if config.dispatch.max_error_sweeps.is_some() {
        dispatcher = dispatcher.with_policy(DispatchPolicy {
            max_error_sweeps: config.dispatch.max_error_sweeps,
        });
    }

    info!(
        model = %config.model.model_id,
        credentials = credential_count,
        requests_per_window = spec.requests_per_window,
        tokens_per_window = spec.tokens_per_window,
        "dispatcher ready"
    );
    Ok(Arc::new(dispatcher))
}

fn build_embedder(config: &RetrievalConfig) -> Arc<dyn Embedder> {
    match &config.embedding_url {
        Some(url) => Arc::new(HttpEmbedder::new(url.clone(), config.embedding_dimension)),
        None => Arc::new(HashEmbedder::new(config.embedding_dimension)),
    }
}

async fn load_corpus(path: &PathBuf, retriever: &HybridRetriever) -> anyhow::Result<usize> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read corpus file '{}'", path.display()))?;

    let mut loaded = 0usize;
    for line in data.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let chunk: CorpusChunk = serde_json::from_str(line)
            .with_context(|| format!("Invalid corpus line: {line}"))?;
        retriever.add_chunk(chunk.text, chunk.source).await?;
        loaded += 1;
    }
    Ok(loaded)
}

async fn run_chat(
    config: VilawConfig,
    corpus: Option<PathBuf>,
    deadline_secs: Option<u64>,
) -> anyhow::Result<()> {
    let dispatcher = build_dispatcher(&config)?;
    let embedder = build_embedder(&config.retrieval);

    let retriever = Arc::new(
        HybridRetriever::new(embedder.clone()).with_alpha(config.retrieval.alpha),
    );
    if let Some(path) = &corpus {
        let loaded = load_corpus(path, &retriever).await?;
        info!(chunks = loaded, path = %path.display(), "corpus loaded");
    }

    let mut assistant = Assistant::new(dispatcher, retriever, embedder).with_limits(
        RetrievalLimits {
            num_retrieved: config.retrieval.num_retrieved,
            num_final: config.retrieval.num_final,
        },
    );
    if config.cache.enabled {
        if let Some(parent) = config.cache.path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        let cache = SemanticCache::with_file(
            config.cache.path.clone(),
            config.cache.threshold,
            config.cache.max_entries,
        )
        .await?;
        assistant = assistant.with_cache(Arc::new(cache));
    }
    if config.safety.enabled {
        assistant = assistant.with_safety();
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("Nhập câu hỏi: ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit" | "thoát") {
            break;
        }

        let started = std::time::Instant::now();
        let result = match deadline_secs {
            Some(secs) => {
                match tokio::time::timeout(
                    Duration::from_secs(secs),
                    assistant.answer(question),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        println!("Hết thời gian chờ, vui lòng thử lại sau.");
                        continue;
                    }
                }
            }
            None => assistant.answer(question).await,
        };

        match result {
            Ok(answer) => {
                println!("{}", answer.text);
                if !answer.sources.is_empty() {
                    println!("Nguồn: {}", answer.sources.join(", "));
                }
                let note = if answer.cached { " (từ cache)" } else { "" };
                println!("Thời gian: {:.2}s{note}", started.elapsed().as_secs_f64());
            }
            Err(err) => {
                eprintln!("Lỗi: {err}");
            }
        }
    }

    Ok(())
}

fn print_limits(config: &VilawConfig) -> anyhow::Result<()> {
    let spec = resolve_spec(config)?;
    let credentials = load_credentials(&config.credentials.env_prefix);
    println!("model:               {}", config.model.model_id);
    println!("base url:            {}", config.model.base_url());
    println!("credentials:         {}", credentials.len());
    println!("requests per window: {}", spec.requests_per_window);
    println!("tokens per window:   {}", spec.tokens_per_window);
    println!("window:              {}s", spec.window.as_secs());
    Ok(())
}
