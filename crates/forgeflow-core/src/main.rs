//! `forgeflow` — a minimal CLI front-end for the pipeline runner. Wires
//! configuration from the environment, a real or fail-closed LLM client
//! depending on credential presence, and prints the run outcome to
//! stdout. A stand-in for the external chat/UI surface, useful for
//! manual testing, not a product surface in its own right.

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use forgeflow_core::checkpoint::InMemoryCheckpointStore;
use forgeflow_core::config::Config;
use forgeflow_core::conversation::ConversationEngine;
use forgeflow_core::deploy::NullPackager;
use forgeflow_core::runner::{PipelineRunner, RunnerDeps};
use forgeflow_core::secrets::EnvSecretResolver;
use forgeflow_discovery::corpus::{Corpus, CredentialGate};
use forgeflow_discovery::discovery::Discoverer;
use forgeflow_discovery::index::VectorIndex;
use forgeflow_discovery::loader::default_corpus;
use forgeflow_events::sink::{BroadcastEventSink, EventSink};
use forgeflow_llm::client::{AgentTurn, LlmClient, ToolMessage};
use forgeflow_llm::embedding::EmbeddingClient;
use forgeflow_llm::error::LlmError;
use forgeflow_llm::http::{HttpClientConfig, HttpEmbeddingClient, HttpLlmClient};
use forgeflow_planner::mapper::Mapper;
use forgeflow_planner::planner::Planner;
use forgeflow_sandbox::debugger::SelfDebugger;
use forgeflow_sandbox::executor::{ContainerBackend, InProcessValidator};
use forgeflow_security::scanner::Scanner;
use forgeflow_types::ids::CorrelationId;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "forgeflow", about = "Turns a natural-language workflow description into a deployable artifact")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new pipeline run from a free-text workflow description.
    Run {
        /// The workflow description, e.g. "post to slack when a new order arrives".
        description: String,
    },
    /// Resume a run suspended awaiting clarification.
    Resume {
        /// The correlation id printed when the run suspended.
        correlation_id: String,
        /// The clarification answer.
        message: String,
    },
}

/// Refuses every call, reporting that no LLM credential is configured.
/// Used in place of a real client so an unconfigured deployment fails
/// loudly at the first LLM call instead of silently producing scripted
/// placeholder output.
#[derive(Debug, Default, Clone, Copy)]
struct UnconfiguredLlmClient;

#[async_trait]
impl LlmClient for UnconfiguredLlmClient {
    async fn complete_text(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Transport("LLM_API_KEY is not set".to_string()))
    }

    async fn complete_json(&self, _prompt: &str, _schema_hint: &str) -> Result<serde_json::Value, LlmError> {
        Err(LlmError::Transport("LLM_API_KEY is not set".to_string()))
    }

    async fn next_turn(&self, _transcript: &[ToolMessage]) -> Result<AgentTurn, LlmError> {
        Err(LlmError::Transport("LLM_API_KEY is not set".to_string()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct UnconfiguredEmbeddingClient;

#[async_trait]
impl EmbeddingClient for UnconfiguredEmbeddingClient {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Err(LlmError::Transport("LLM_API_KEY is not set".to_string()))
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn http_config(config: &Config, model: String) -> HttpClientConfig {
    HttpClientConfig {
        base_url: std::env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
        api_key: config.llm_api_key.clone().unwrap_or_default(),
        model,
        timeout: Duration::from_secs(60),
    }
}

async fn build_runner(config: Config) -> PipelineRunner {
    let llm: Arc<dyn LlmClient> = if config.has_live_llm_credential() {
        Arc::new(HttpLlmClient::new(http_config(&config, config.llm_model.clone())))
    } else {
        tracing::warn!("LLM_API_KEY not set; LLM-backed stages will fail until it is configured");
        Arc::new(UnconfiguredLlmClient)
    };

    let embedder: Arc<dyn EmbeddingClient> = if config.has_live_llm_credential() {
        Arc::new(HttpEmbeddingClient::new(http_config(&config, "text-embedding-3-small".to_string())))
    } else {
        Arc::new(UnconfiguredEmbeddingClient)
    };

    let documents = std::env::var("FORGEFLOW_CORPUS_PATH")
        .ok()
        .and_then(|path| forgeflow_discovery::loader::load_from_path(&path).ok())
        .unwrap_or_else(default_corpus);
    let corpus = Arc::new(Corpus::new(documents));
    let gate = CredentialGate::new(config.service_credentials.clone());

    let texts: Vec<String> = corpus.documents().iter().map(|d| d.embedding_text()).collect();
    let embeddings = embedder.embed_batch(&texts).await.unwrap_or_default();
    let index = Arc::new(VectorIndex::build(embeddings));
    let discoverer = Arc::new(Discoverer::new(
        Arc::clone(&corpus),
        index,
        Arc::clone(&llm),
        Arc::clone(&embedder),
        gate,
    ));

    let events: Arc<dyn EventSink> = Arc::new(BroadcastEventSink::default());

    let deps = RunnerDeps {
        conversation: Arc::new(ConversationEngine::new(Arc::clone(&llm))),
        discoverer,
        planner: Arc::new(Planner::new()),
        mapper: Arc::new(Mapper::new(Arc::clone(&llm))),
        generator: Arc::new(forgeflow_codegen::generator::CodeGenerator::new(
            Arc::clone(&llm),
            corpus.documents().to_vec(),
        )),
        scanner: Arc::new(Scanner::new("workflow_output")),
        sandbox_primary: Arc::new(ContainerBackend::new(vec!["sh".to_string(), "-c".to_string()])),
        sandbox_fallback: Arc::new(InProcessValidator::new()),
        debugger: Arc::new(SelfDebugger::new(Arc::clone(&llm), config.max_debug_attempts)),
        packager: Arc::new(NullPackager),
        secrets: Arc::new(EnvSecretResolver),
        checkpoints: Arc::new(InMemoryCheckpointStore::new()),
        events,
    };

    PipelineRunner::new(config, deps)
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env();
    let runner = build_runner(config).await;

    match cli.command {
        Command::Run { description } => match runner.start(&description).await {
            Ok(state) => print_outcome(&state),
            Err(err) => {
                tracing::error!(%err, "pipeline run failed");
                std::process::exit(1);
            }
        },
        Command::Resume { correlation_id, message } => {
            let Ok(id) = correlation_id.parse::<CorrelationId>() else {
                eprintln!("invalid correlation id: {correlation_id}");
                std::process::exit(2);
            };
            match runner.resume_with_clarification(id, &message).await {
                Ok(state) => print_outcome(&state),
                Err(err) => {
                    tracing::error!(%err, "resume failed");
                    std::process::exit(1);
                }
            }
        }
    }
}

fn print_outcome(state: &forgeflow_types::pipeline_state::PipelineState) {
    println!("correlation_id: {}", state.correlation_id);
    println!("stage: {:?}", state.stage);
    if let Some(failure) = &state.failure {
        println!("failed: {} ({})", failure.root_cause, failure.category);
    } else if let Some(artifact) = &state.artifact {
        println!("artifact:\n{}", artifact.source);
    }
}
