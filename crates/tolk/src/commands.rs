//! tolk command implementations

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use tolk_agent::tools::{default_registry, TextAnalyzer};
use tolk_agent::{
    AgentError, ApprovalGate, ApprovalRequest, ContextBuilder, LoopOptions, LoopSettings,
    PreferenceMemory, StepOutcome, StopHandle, TurnController,
};
use tolk_config::{self, Config, ProviderConfig, OPENROUTER_API_BASE};
use tolk_provider::{OpenRouterProvider, Provider};

use crate::render::render_record;
use crate::review::{format_request, parse_review, REVIEW_HELP};

/// Read line from stdin
fn read_line() -> Result<String> {
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Read password from stdin (masked input)
fn read_password() -> Result<String> {
    match rpassword::read_password() {
        Ok(key) => Ok(key.trim().to_string()),
        Err(_) => read_line(),
    }
}

/// Prompt with a default; an empty answer keeps it
fn prompt_with_default(label: &str, current: &str) -> Result<String> {
    print!("{} [{}]: ", label, current);
    std::io::stdout().flush()?;
    let answer = read_line()?;
    Ok(if answer.is_empty() {
        current.to_string()
    } else {
        answer
    })
}

fn mark(ok: bool, yes: &str, no: &str) -> String {
    if ok {
        format!("[{}]", yes)
    } else {
        format!("[{}]", no)
    }
}

/// Initialize config and data directory
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing tolk...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = tolk_config::init().await?;

    println!("Config:    {}", tolk_config::config_path().display());
    println!("Workspace: {}", config.workspace_path().display());
    println!("\n◆ tolk initialized");
    println!("\nNext steps:");
    println!("  1. Add your API key: tolk setup");
    println!("     (or set OPENROUTER_API_KEY)");
    println!("  2. Start translating: tolk chat -d ./docs");

    Ok(())
}

/// Interactive setup wizard
pub async fn setup_command() -> Result<()> {
    println!("◆ tolk Setup Wizard");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    let config_path = tolk_config::config_path();
    let mut config = if config_path.exists() {
        Config::load().await.unwrap_or_default()
    } else {
        Config::default()
    };

    // ========================================================
    // Step 1: API key
    // ========================================================
    println!("Step 1: OpenRouter API Key");
    println!("Get your API key at: https://openrouter.ai/keys");
    if config.configured_api_key().is_some() {
        println!("A key is already configured; press Enter to keep it.");
    }
    print!("API key: ");
    std::io::stdout().flush()?;
    let api_key = read_password()?;
    if !api_key.is_empty() {
        config.providers.openrouter = ProviderConfig {
            api_key,
            api_base: Some(OPENROUTER_API_BASE.to_string()),
        };
    } else if config.configured_api_key().is_none() {
        println!("No key entered. Set OPENROUTER_API_KEY or rerun setup later.");
    }
    println!();

    // ========================================================
    // Step 2: Models and language
    // ========================================================
    println!("Step 2: Models");
    config.models.agent = prompt_with_default("Agent model", &config.models.agent)?;
    config.models.translator =
        prompt_with_default("Translator model", &config.models.translator)?;
    config.agent.target_language =
        prompt_with_default("Target language", &config.agent.target_language)?;
    println!();

    // ========================================================
    // Step 3: Save
    // ========================================================
    print!("Saving configuration... ");
    std::io::stdout().flush()?;
    config.save().await?;
    println!("✓ Saved to {}", config_path.display());

    println!();
    println!("Setup complete! ✓");
    println!("  - Check status:    tolk status");
    println!("  - Start a session: tolk chat -d ./docs");

    Ok(())
}

/// Show configuration status
pub async fn status_command() -> Result<()> {
    let config_path = tolk_config::config_path();

    println!("◆ tolk Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Config:     {} {}",
        config_path.display(),
        mark(config_path.exists(), "OK", "Missing")
    );

    let config = if config_path.exists() {
        Config::load().await?
    } else {
        Config::default()
    };
    let workspace = config.workspace_path();

    println!(
        "API Key:    {}",
        mark(config.has_api_key(), "Set", "Missing")
    );
    println!("API Base:   {}", config.api_base());
    println!("Agent:      {}", config.models.agent);
    println!("Translator: {}", config.models.translator);
    println!("Language:   {}", config.agent.target_language);
    println!(
        "Workspace:  {} {}",
        workspace.display(),
        mark(workspace.exists(), "OK", "Missing")
    );
    println!(
        "Review:     {}",
        if config.review.enabled {
            "[Interactive]"
        } else {
            "[Auto-approve]"
        }
    );

    Ok(())
}

/// Split a file into translatable segments and print them
pub async fn segment_command(file: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let analyzer = TextAnalyzer::new()?;
    let output = analyzer.segment_text(&content);

    println!("◆ {}", output.result);
    if let Some(meta) = &output.metadata {
        println!(
            "Language: {}  Characters: {}",
            meta.language_detected, meta.total_length
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for segment in output.segments.unwrap_or_default() {
        println!("[{}] ({} chars) {}", segment.index, segment.length, segment.text);
    }

    Ok(())
}

#[derive(Debug, Default)]
pub struct ChatArgs {
    pub message: Option<String>,
    pub dir: Option<PathBuf>,
    pub auto_approve: bool,
    pub language: Option<String>,
}

type TurnReport = tolk_agent::Result<StepOutcome>;

/// User text for the worker; `started` fires once the turn is open.
struct TurnRequest {
    text: String,
    started: oneshot::Sender<()>,
}

/// Lines from stdin, read on a dedicated thread.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line.trim_end_matches(['\r', '\n']).to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Runs turns on its own task; the session side only sends text and
/// receives reports.
fn spawn_turn_worker(
    mut controller: TurnController,
) -> (
    mpsc::Sender<TurnRequest>,
    mpsc::Receiver<TurnReport>,
    tokio::task::JoinHandle<()>,
) {
    let (turn_tx, mut turn_rx) = mpsc::channel::<TurnRequest>(1);
    let (report_tx, report_rx) = mpsc::channel::<TurnReport>(1);

    let handle = tokio::spawn(async move {
        while let Some(TurnRequest { text, started }) = turn_rx.recv().await {
            let report = match controller.submit_user_input(&text) {
                Ok(()) => {
                    // the stop handle now targets this turn
                    let _ = started.send(());
                    controller
                        .advance_observed(|_, records| {
                            for record in records {
                                for line in render_record(record) {
                                    println!("{}", line);
                                }
                            }
                        })
                        .await
                }
                Err(e) => Err(e),
            };
            if report_tx.send(report).await.is_err() {
                break;
            }
        }
        debug!(records = controller.log().len(), "turn worker stopped");
    });

    (turn_tx, report_rx, handle)
}

/// Wait for the next request the gate publishes. Never resolves without a gate.
async fn next_request(
    requests: &mut Option<watch::Receiver<Option<ApprovalRequest>>>,
) -> ApprovalRequest {
    if let Some(rx) = requests {
        loop {
            if rx.changed().await.is_err() {
                break;
            }
            if let Some(request) = rx.borrow_and_update().clone() {
                return request;
            }
        }
    }
    std::future::pending().await
}

struct Session {
    turns: mpsc::Sender<TurnRequest>,
    reports: mpsc::Receiver<TurnReport>,
    lines: mpsc::UnboundedReceiver<String>,
    stdin_open: bool,
    gate: Option<ApprovalGate>,
    requests: Option<watch::Receiver<Option<ApprovalRequest>>>,
    stop: StopHandle,
}

async fn recv_line(lines: &mut mpsc::UnboundedReceiver<String>, open: &mut bool) -> Option<String> {
    if !*open {
        return None;
    }
    let line = lines.recv().await;
    if line.is_none() {
        *open = false;
    }
    line
}

impl Session {
    async fn read_input(&mut self) -> Option<String> {
        recv_line(&mut self.lines, &mut self.stdin_open).await
    }

    /// Hand `text` to the worker and wait until its turn is open, so a stop
    /// never lands on the previous turn.
    async fn start_turn(&mut self, text: String) -> Result<()> {
        let (started, mut started_rx) = oneshot::channel();
        self.turns
            .send(TurnRequest { text, started })
            .await
            .context("turn worker is gone")?;

        let interrupted = tokio::select! {
            _ = &mut started_rx => false,
            _ = tokio::signal::ctrl_c() => true,
        };
        if interrupted {
            info!("stop requested");
            println!("\n◆ Stopping...");
            // A refused submit drops the sender; its report still arrives.
            if started_rx.await.is_ok() {
                self.stop.stop();
            }
        }
        Ok(())
    }

    /// Run one user turn to completion, serving approvals and Ctrl-C meanwhile.
    async fn drive_turn(&mut self, text: String) -> Result<TurnReport> {
        self.start_turn(text).await?;

        let mut pending: Option<ApprovalRequest> = None;
        loop {
            tokio::select! {
                report = self.reports.recv() => {
                    return report.context("turn worker is gone");
                }
                request = next_request(&mut self.requests) => {
                    if !self.stdin_open {
                        warn!("review requested but stdin is closed, stopping the turn");
                        self.stop.stop();
                        continue;
                    }
                    println!("{}", format_request(&request));
                    print!("review> ");
                    std::io::stdout().flush()?;
                    pending = Some(request);
                }
                line = recv_line(&mut self.lines, &mut self.stdin_open), if self.stdin_open => {
                    let Some(line) = line else {
                        if pending.is_some() {
                            warn!("stdin closed during a review, stopping the turn");
                            self.stop.stop();
                        }
                        continue;
                    };
                    match (&pending, &self.gate) {
                        (Some(request), Some(gate)) => match parse_review(&line, request) {
                            Some(response) => {
                                if let Err(e) = gate.resolve(response) {
                                    warn!(error = %e, "review answer not delivered");
                                }
                                pending = None;
                            }
                            None => {
                                println!("  {}", REVIEW_HELP);
                                print!("review> ");
                                std::io::stdout().flush()?;
                            }
                        },
                        _ => println!("(agent is working; Ctrl-C stops the turn)"),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("stop requested");
                    println!("\n◆ Stopping...");
                    self.stop.stop();
                }
            }
        }
    }
}

fn print_report(report: TurnReport) {
    match report {
        Ok(outcome) if outcome.cancelled => println!("◆ Turn stopped"),
        Ok(_) => {}
        Err(AgentError::MaxIterations) => {
            println!("◆ The agent hit its step limit for this turn")
        }
        Err(e) => println!("◆ Turn failed: {}", e),
    }
}

/// Start a translation session
pub async fn chat_command(args: ChatArgs) -> Result<()> {
    let config = Config::load().await?;

    let api_key = config
        .api_key()
        .context("No API key configured. Run `tolk setup` or set OPENROUTER_API_KEY")?;
    let workspace = match &args.dir {
        Some(dir) => dir.clone(),
        None => config.workspace_path(),
    };
    let language = args
        .language
        .clone()
        .unwrap_or_else(|| config.agent.target_language.clone());

    let provider: Arc<dyn Provider> = Arc::new(OpenRouterProvider::new(
        api_key,
        Some(config.api_base()),
        Some(config.models.agent.clone()),
    ));
    let tools = default_registry(
        workspace.clone(),
        provider.clone(),
        config.models.translator.clone(),
    )?;

    let memory = PreferenceMemory::new();
    let mut options = LoopOptions::default().with_memory(memory.clone());
    let gate = if config.review.enabled && !args.auto_approve {
        let gate = ApprovalGate::new();
        options = options.with_approval(Arc::new(gate.clone()));
        Some(gate)
    } else {
        None
    };

    let settings = LoopSettings {
        model: config.models.agent.clone(),
        max_tokens: config.agent.max_tokens,
        temperature: config.agent.temperature,
        max_tool_iterations: config.agent.max_tool_iterations,
    };
    let controller = TurnController::new(
        provider,
        tools,
        ContextBuilder::new(&workspace, language.clone()),
        options,
        settings,
    );
    let stop = controller.stop_handle();

    info!(
        workspace = %workspace.display(),
        language = %language,
        review = gate.is_some(),
        "session started"
    );

    let (turns, reports, worker) = spawn_turn_worker(controller);
    let mut session = Session {
        turns,
        reports,
        lines: spawn_stdin_reader(),
        stdin_open: true,
        requests: gate.as_ref().map(|g| g.subscribe()),
        gate,
        stop: stop.clone(),
    };

    if let Some(message) = args.message {
        print_report(session.drive_turn(message).await?);
    } else {
        println!("◆ Translating into {} in {}", language, workspace.display());
        println!("◆ Interactive mode (type 'exit' to quit, Ctrl-C stops a turn)");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        loop {
            print!("◆ ");
            std::io::stdout().flush()?;

            let input = tokio::select! {
                line = session.read_input() => line,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(input) = input else { break };

            let input = input.trim();
            if input.is_empty() {
                continue;
            }
            if input == "exit" || input == "quit" {
                break;
            }
            print_report(session.drive_turn(input.to_string()).await?);
        }
    }

    let learned = memory.entry_count().await;
    if learned > 0 {
        println!("\n◆ Learned {} preference(s) this session", learned);
    }

    stop.shutdown();
    drop(session);
    if let Err(e) = worker.await {
        warn!(error = %e, "turn worker panicked");
    }

    Ok(())
}
