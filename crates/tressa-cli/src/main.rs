//! `tressa`: the practitioner's terminal dashboard for the Tressa portal.
//!
//! # Usage
//!
//! ```text
//! tressa --url http://localhost:8080 --user admin --password secret
//! tressa --config ~/.config/tressa/config.toml
//! tressa create --name "Ana Sousa" --email ana@example.pt
//! ```

mod app;
mod ui;

use std::{
  fs::OpenOptions,
  io,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
  time::Duration,
};

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, Subcommand};
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tressa_core::client::NewClient;
use tressa_sync::{AdminHooks, ApiConfig, HttpPortalApi, QueryCache, StaleTimes};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tressa", about = "Terminal dashboard for the Tressa client portal")]
struct Args {
  /// Path to a TOML config file (url, username, password, stale_times).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the tressa server (default: http://localhost:8080).
  #[arg(long, env = "TRESSA_URL")]
  url: Option<String>,

  /// Admin username.
  #[arg(long, env = "TRESSA_USER")]
  user: Option<String>,

  /// Admin password (plaintext).
  #[arg(long, env = "TRESSA_PASSWORD")]
  password: Option<String>,

  /// Append logs to this file. The terminal is never logged to.
  #[arg(long, value_name = "FILE")]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Provision a client and print their login credentials.
  Create {
    #[arg(long)]
    name:  String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: Option<String>,
  },
  /// Print the dashboard counters and exit.
  Stats,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:           String,
  #[serde(default)]
  username:      String,
  #[serde(default)]
  password:      String,
  #[serde(default)]
  stale_times:   StaleTimes,
  recent_limit:  Option<usize>,
  updates_limit: Option<usize>,
}

const DEFAULT_RECENT_LIMIT: usize = 25;
const DEFAULT_UPDATES_LIMIT: usize = 20;

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  init_logging(args.log_file.as_deref())?;

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let or_file = |flag: Option<String>, file: &str| {
    flag.or_else(|| (!file.is_empty()).then(|| file.to_string()))
  };
  let api_config = ApiConfig {
    base_url: or_file(args.url, &file_cfg.url)
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    username: or_file(args.user, &file_cfg.username).unwrap_or_default(),
    password: or_file(args.password, &file_cfg.password).unwrap_or_default(),
  };

  let api = HttpPortalApi::new(api_config).context("failed to build HTTP client")?;
  let hooks = AdminHooks::new(QueryCache::new(), Arc::new(api), file_cfg.stale_times);

  match args.command {
    Some(Command::Create { name, email, phone }) => {
      let creds = hooks
        .create_client(NewClient { name, email, phone })
        .await
        .context("creating client")?;
      println!("email:    {}", creds.email);
      println!("password: {}", creds.password);
      Ok(())
    }
    Some(Command::Stats) => {
      let stats = hooks.stats().fetch().await.context("fetching stats")?;
      let counts = hooks.client_stats().fetch().await.context("fetching client stats")?;
      println!("clients:            {}", stats.clients_count);
      println!("updates:            {}", stats.updates_count);
      println!("posts:              {}", stats.posts_count);
      println!("with appointment:   {}", counts.with_appointment);
      println!("without:            {}", counts.without_appointment);
      Ok(())
    }
    None => {
      let app = App::new(
        hooks,
        file_cfg.recent_limit.unwrap_or(DEFAULT_RECENT_LIMIT),
        file_cfg.updates_limit.unwrap_or(DEFAULT_UPDATES_LIMIT),
      );
      run_tui(app).await
    }
  }
}

fn init_logging(path: Option<&Path>) -> Result<()> {
  let Some(path) = path else {
    return Ok(());
  };
  let file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .with_context(|| format!("opening log file {}", path.display()))?;
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_ansi(false)
    .with_writer(Mutex::new(file))
    .init();
  Ok(())
}

// ─── Terminal ─────────────────────────────────────────────────────────────────

async fn run_tui(mut app: App<HttpPortalApi>) -> Result<()> {
  // Load before taking over the terminal so connection errors print plainly.
  app.load().await?;

  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  let run_result = run_event_loop(&mut terminal, &mut app).await;

  // Restore terminal regardless of result.
  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  run_result
}

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App<HttpPortalApi>,
) -> Result<()> {
  loop {
    app.poll_background();
    app.sync_view();
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event
      && !app.handle_key(key).await?
    {
      break;
    }
  }

  Ok(())
}
