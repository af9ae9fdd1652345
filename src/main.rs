use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shellcache::clients::ClientRegistry;
use shellcache::config::Config;
use shellcache::generation::Generation;
use shellcache::lifecycle::{Interception, Worker};
use shellcache::network::{Fetch, HttpClient, Request};
use shellcache::store::{CacheStore, SqliteStorage};
use shellcache::strategy::{Outcome, Served, Source};

#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(about = "Offline application-shell cache with versioned generations")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./shellcache.yaml or $XDG_CONFIG_HOME/shellcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// SQLite database to use instead of the configured one
  #[arg(long)]
  database: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  /// Debug logging
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Populate the configured generation and activate it
  Install,
  /// Route one request through the current generation
  Fetch {
    /// Absolute URL, or a path relative to base_url
    url: String,
    #[arg(short, long, default_value = "GET")]
    method: String,
    /// Write the body here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// List stored generations
  Generations,
  /// Delete every generation except the current one
  Collect,
}

type AppWorker = Worker<SqliteStorage, HttpClient>;

/// Everything a worker needs, built once from the config.
struct Context {
  config: Config,
  store: CacheStore<SqliteStorage>,
  network: Arc<HttpClient>,
  clients: Arc<ClientRegistry>,
}

impl Context {
  fn worker(&self, generation: Generation) -> AppWorker {
    Worker::new(
      generation,
      self.store.clone(),
      Arc::clone(&self.network),
      self.config.rule_table(),
      Arc::clone(&self.clients),
      self.config.lifecycle,
    )
  }
}

/// Keeps the non-blocking log writer flushing until exit.
type LogGuard = Option<tracing_appender::non_blocking::WorkerGuard>;

fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<LogGuard> {
  let filter = if verbose {
    EnvFilter::new("shellcache=debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shellcache=info"))
  };

  match log_file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
      let name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;

      let appender = tracing_appender::rolling::never(dir, name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(filter)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
      Ok(None)
    }
  }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_tracing(args.verbose, args.log_file.as_deref())?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override database if specified on command line
  let database = args.database.or_else(|| config.database.clone());
  let store = CacheStore::new(SqliteStorage::open(database.as_deref())?);
  let network = Arc::new(HttpClient::new(&config.network)?);

  let ctx = Context {
    config,
    store,
    network,
    clients: Arc::new(ClientRegistry::new()),
  };

  match args.command {
    Command::Install => install(&ctx).await,
    Command::Fetch {
      url,
      method,
      output,
    } => {
      let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| eyre!("Invalid method: {}", method))?;
      let request = Request::new(method, ctx.config.resolve_url(&url)?);
      fetch(&ctx, &request, output.as_deref()).await
    }
    Command::Generations => generations(&ctx.store),
    Command::Collect => collect(&ctx),
  }
}

async fn install(ctx: &Context) -> Result<()> {
  let mut worker = ctx.worker(ctx.config.generation()?);
  let phase = worker.install().await?;
  println!(
    "{} {} ({} resources)",
    worker.generation().name(),
    phase,
    worker.generation().manifest().len()
  );
  Ok(())
}

/// Resume the configured generation if it is current, otherwise whichever
/// generation an earlier install left current.
fn active_worker(ctx: &Context) -> Result<Option<AppWorker>> {
  let mut worker = ctx.worker(ctx.config.generation()?);
  if worker.resume()? {
    return Ok(Some(worker));
  }

  match ctx.store.current_generation()? {
    Some(current) => {
      warn!(
        configured = %ctx.config.generation_name(),
        current = %current,
        "configured generation is not installed; serving from the current one"
      );
      let mut worker = ctx.worker(Generation::new(current, Vec::new()));
      Ok(worker.resume()?.then_some(worker))
    }
    None => Ok(None),
  }
}

async fn fetch(ctx: &Context, request: &Request, output: Option<&Path>) -> Result<()> {
  let interception = match active_worker(ctx)? {
    Some(worker) => worker.handle(request).await,
    None => {
      info!("nothing installed; request is not intercepted");
      Interception::PassThrough
    }
  };

  let (label, outcome) = match interception {
    Interception::Handled { strategy, outcome } => (strategy.to_string(), outcome),
    Interception::PassThrough => {
      let outcome = match ctx.network.fetch(request).await {
        Ok(response) => Outcome::Served(Served::from_network(response)),
        Err(e) => {
          info!(error = %e, "pass-through fetch failed");
          Outcome::Unavailable
        }
      };
      ("pass-through".to_string(), outcome)
    }
  };

  let served = match outcome {
    Outcome::Served(served) => served,
    Outcome::Unavailable => {
      return Err(eyre!(
        "{} is unavailable: offline and not cached ({})",
        request.url,
        label
      ))
    }
  };

  let source = match served.source {
    Source::Network => "network",
    Source::Cache => "cache",
    Source::Offline => "cache (offline)",
  };
  eprintln!(
    "{} {} via {} from {}",
    served.response.status, served.response.status_text, label, source
  );

  match output {
    Some(path) => std::fs::write(path, &served.response.body)?,
    None => std::io::stdout().write_all(&served.response.body)?,
  }
  Ok(())
}

fn generations(store: &CacheStore<SqliteStorage>) -> Result<()> {
  let current = store.current_generation()?;
  for name in store.names()? {
    let marker = if current.as_deref() == Some(name.as_str()) {
      "*"
    } else {
      " "
    };
    println!("{} {} ({} entries)", marker, name, store.entry_count(&name)?);
  }
  Ok(())
}

fn collect(ctx: &Context) -> Result<()> {
  let worker = active_worker(ctx)?
    .ok_or_else(|| eyre!("No current generation; run `shellcache install` first"))?;

  let report = worker.generations().collect(worker.generation().name());
  for name in &report.deleted {
    println!("deleted {}", name);
  }
  for (name, reason) in &report.failed {
    eprintln!("failed to delete {}: {}", name, reason);
  }
  Ok(())
}
