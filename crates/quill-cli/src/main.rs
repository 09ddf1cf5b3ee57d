//! quill - terminal coding agent driven by tagged reply directives

mod approval;
mod commands;
mod config;
mod context;
mod env;
mod ui;

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use quill_agent::{GitVcs, ProviderTransport, Session, SessionConfig, SessionHandle, TurnEnd};
use quill_agent::{prompt, vcs};
use quill_ai::Model;
use quill_tui::Theme;
use tracing_subscriber::EnvFilter;

use crate::approval::TerminalApprover;
use crate::commands::{CommandResult, Input};
use crate::config::Config;
use crate::env::EnvironmentSummary;
use crate::ui::{Activity, Ui};

/// quill - terminal coding agent
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model to use (default: gpt-4o)
    #[arg(short, long)]
    model: Option<String>,

    /// Endpoint base URL (default: https://api.openai.com/v1)
    #[arg(short, long)]
    base_url: Option<String>,

    /// Run a single request non-interactively and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Working directory
    #[arg(short, long)]
    working_dir: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Do not show the waiting spinner
    #[arg(long)]
    no_spinner: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

const ADD_OUTPUT_PROMPT: &str = "\x07Add to context? [t]runcated/[f]ull/[n]o: ";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.init_config {
        match Config::init() {
            Ok(path) => {
                println!("Config file at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    if let Some(ref dir) = args.working_dir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("cannot change to working directory {}", dir))?;
    }
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let root = match vcs::repo_root(&cwd).await {
        Some(root) => root,
        None => cwd.clone(),
    };
    tracing::debug!("repository root: {}", root.display());

    let config = Config::load();
    let model = Model::new(
        config.resolve_model(args.model.as_deref()),
        config.resolve_base_url(args.base_url.as_deref()),
    );
    tracing::debug!("model {} at {} ({:?})", model.id, model.base_url, model.api);

    let ui = Ui::new(Theme::default());
    let mut session = build_session(&args, &config, &ui, model.clone(), root, cwd).await;
    watch_interrupts(session.handle(), ui.clone());

    if let Some(request) = args.command {
        ui.set_activity(Activity::Working);
        let summary = session.run_turn(&request).await;
        return match summary.end {
            TurnEnd::TransportFailed(message) => Err(anyhow::anyhow!(message)),
            _ => Ok(()),
        };
    }

    ui.println(&ui.banner(&model.id));
    run_interactive(&mut session, &ui).await
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("quill=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn build_session(
    args: &Args,
    config: &Config,
    ui: &Ui,
    model: Model,
    root: PathBuf,
    cwd: PathBuf,
) -> Session {
    let mut transport = ProviderTransport::new(model);
    if let Some(ref name) = config.api_key_env {
        transport = transport.with_api_key_env(name);
    }

    let project = context::load_context(&root, &cwd);
    let environment = EnvironmentSummary::collect(&cwd).await;

    let mut session_config = SessionConfig::new(root.clone());
    session_config.instructions = prompt::system_instructions(project.as_deref());
    session_config.environment = environment.to_json();
    session_config.theme = ui.theme().clone();
    session_config.plain = ui.is_plain();
    session_config.spinner =
        !args.no_spinner && config.spinner.unwrap_or(true) && std::io::stderr().is_terminal();

    Session::new(
        session_config,
        Box::new(transport),
        Box::new(GitVcs::new(root)),
        Box::new(TerminalApprover::new(ui.clone())),
    )
}

/// Ctrl-C interrupts the work in progress; when idle it exits.
fn watch_interrupts(handle: SessionHandle, ui: Ui) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.interrupt() {
                tracing::debug!("interrupt requested");
                continue;
            }
            ui.set_activity(Activity::Waiting);
            println!();
            std::process::exit(130);
        }
    });
}

async fn run_interactive(session: &mut Session, ui: &Ui) -> anyhow::Result<()> {
    loop {
        ui.set_activity(Activity::Waiting);
        ui.prompt();

        let Some(input) = ui::read_request().await? else {
            println!();
            break;
        };

        match commands::parse_input(&input) {
            Input::Empty => continue,
            Input::Command(command) => match commands::execute_command(command, session).await {
                CommandResult::Message(text) => ui.println(&text),
                CommandResult::Exit => {
                    ui.println("Bye!");
                    break;
                }
            },
            Input::Shell(command) => run_shell(session, ui, &command).await,
            Input::Request(request) => {
                println!();
                ui.set_activity(Activity::Working);
                let summary = session.run_turn(&request).await;
                tracing::debug!(
                    "turn ended after {} round(s): {:?}, {} edit(s) applied",
                    summary.rounds,
                    summary.end,
                    summary.applied
                );
            }
        }
    }
    Ok(())
}

async fn run_shell(session: &mut Session, ui: &Ui, command: &str) {
    ui.set_activity(Activity::Working);
    let outcome = session.run_user_command(command).await;
    ui.set_activity(Activity::Waiting);

    let truncated = match ui::ask(ADD_OUTPUT_PROMPT).await.as_str() {
        "t" => true,
        "f" => false,
        _ => return,
    };
    session.record_shell_output(&outcome, truncated);
    ui.println(&ui.paint(ui.theme().warning_style(), "Added to context"));
}
