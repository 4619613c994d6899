//! queuewatch - job queue monitoring dashboard.
//!
//! `serve` runs the HTTP API over in-memory demo queues, `watch` renders the
//! dashboard in a terminal, and `action` runs a single queue action.

use queuewatch::backend::{spawn_simulator, JobStatus, MemoryQueue, QueueRegistry};
use queuewatch::client::{
    render_dashboard, ActionDispatcher, AutoConfirm, Confirm, DispatchOutcome, HttpApi,
    MetricType, QueueCommand, QueueView, QueuesController, QueuesStore,
};
use queuewatch::config::{DashboardSettings, ServerConfig};
use queuewatch::stats::TimeUnit;
use queuewatch::web::Server;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "queuewatch", version)]
#[command(about = "Job queue monitoring dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API and web dashboard
    Serve {
        /// HTTP port (overrides QUEUEWATCH_HTTP_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Do not run the demo simulator
        #[arg(long)]
        no_simulate: bool,
    },
    /// Poll a server and render the dashboard in the terminal
    Watch {
        /// API base URL (overrides QUEUEWATCH_URL)
        #[arg(long)]
        url: Option<String>,
        /// Seconds between polls; zero or negative fetches once
        #[arg(long, allow_negative_numbers = true)]
        interval: Option<i64>,
        /// Unit for average job time (sec, min, hour, day)
        #[arg(long, default_value = "min")]
        timeframe: TimeUnit,
        /// What the chart plots (JobPerMinute, JobAvgTime)
        #[arg(long, default_value = "JobPerMinute")]
        metric: MetricType,
        /// First sample index to read
        #[arg(long, allow_negative_numbers = true)]
        start: Option<i64>,
        /// Last sample index to read
        #[arg(long, allow_negative_numbers = true)]
        end: Option<i64>,
        /// Queue whose jobs are listed
        #[arg(long)]
        queue: Option<String>,
        /// Job status listed for the active queue
        #[arg(long, requires = "queue")]
        status: Option<JobStatus>,
        /// Page of the job list
        #[arg(long)]
        page: Option<u64>,
        /// Jobs per page (overrides QUEUEWATCH_JOBS_PER_PAGE)
        #[arg(long)]
        jobs_per_page: Option<u64>,
    },
    /// Run one queue action
    Action {
        /// API base URL (overrides QUEUEWATCH_URL)
        #[arg(long)]
        url: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
        #[command(subcommand)]
        action: ActionCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ActionCommands {
    /// Retry all failed or completed jobs
    Retry { queue: String, status: JobStatus },
    /// Promote all delayed jobs
    Promote { queue: String },
    /// Remove all jobs with a status
    Clean { queue: String, status: JobStatus },
    /// Pause a queue
    Pause { queue: String },
    /// Resume a paused queue
    Resume { queue: String },
    /// Remove all waiting, delayed and prioritized jobs
    Empty { queue: String },
    /// Add a job
    Add {
        queue: String,
        name: String,
        /// Job data as JSON
        #[arg(long, default_value = "{}")]
        data: String,
        /// Job options as JSON (e.g. {"delay": 5000})
        #[arg(long, default_value = "{}")]
        options: String,
    },
}

impl ActionCommands {
    fn into_command(self) -> Result<QueueCommand, serde_json::Error> {
        Ok(match self {
            ActionCommands::Retry { queue, status } => QueueCommand::RetryAll { queue, status },
            ActionCommands::Promote { queue } => QueueCommand::PromoteAll { queue },
            ActionCommands::Clean { queue, status } => QueueCommand::CleanAll { queue, status },
            ActionCommands::Pause { queue } => QueueCommand::PauseQueue { queue },
            ActionCommands::Resume { queue } => QueueCommand::ResumeQueue { queue },
            ActionCommands::Empty { queue } => QueueCommand::EmptyQueue { queue },
            ActionCommands::Add {
                queue,
                name,
                data,
                options,
            } => QueueCommand::AddJob {
                queue,
                name,
                data: serde_json::from_str(&data)?,
                options: serde_json::from_str(&options)?,
            },
        })
    }
}

/// Prompts on the terminal.
struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, message: &str) -> bool {
        let prompt = format!("{} [y/N] ", message);
        let answer = tokio::task::spawn_blocking(move || {
            print!("{}", prompt);
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            Ok::<_, io::Error>(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

fn init_logging(to_stderr: bool) -> Result<(), BoxError> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("queuewatch=info".parse()?);
    let registry = tracing_subscriber::registry().with(filter);

    // Client output owns stdout.
    if to_stderr {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    init_logging(!matches!(cli.command, Commands::Serve { .. }))?;

    match cli.command {
        Commands::Serve { port, no_simulate } => {
            let mut cfg = ServerConfig::load();
            if let Some(port) = port {
                cfg.http_port = port;
            }
            if no_simulate {
                cfg.simulate = false;
            }
            serve(cfg).await
        }
        Commands::Watch {
            url,
            interval,
            timeframe,
            metric,
            start,
            end,
            queue,
            status,
            page,
            jobs_per_page,
        } => {
            let mut settings = DashboardSettings::load();
            if let Some(url) = url {
                settings.base_url = url;
            }
            if let Some(interval) = interval {
                settings.polling_interval = interval;
            }
            if let Some(jobs_per_page) = jobs_per_page {
                settings.jobs_per_page = jobs_per_page;
            }

            let mut view = QueueView {
                active_queue: queue.clone(),
                page,
                ..QueueView::default()
            };
            if let (Some(queue), Some(status)) = (queue, status) {
                view.selected_statuses.insert(queue, status);
            }

            watch(settings, view, timeframe, metric, start, end).await
        }
        Commands::Action { url, yes, action } => {
            let mut settings = DashboardSettings::load();
            if let Some(url) = url {
                settings.base_url = url;
            }
            run_action(settings, action.into_command()?, yes).await
        }
    }
}

async fn serve(cfg: ServerConfig) -> Result<(), BoxError> {
    tracing::info!("Starting queuewatch on port {}...", cfg.http_port);

    let registry = QueueRegistry::new();
    let mut demo_queues = Vec::with_capacity(cfg.demo_queues.len());
    for name in &cfg.demo_queues {
        let queue = Arc::new(MemoryQueue::new(name));
        registry.add(queue.clone()).await;
        demo_queues.push(queue);
    }

    if cfg.simulate && !demo_queues.is_empty() {
        let _simulator = spawn_simulator(demo_queues, Duration::from_secs(1));
    }

    let server = Server::new(cfg, registry);
    server.start().await
}

async fn watch(
    settings: DashboardSettings,
    view: QueueView,
    timeframe: TimeUnit,
    metric: MetricType,
    start: Option<i64>,
    end: Option<i64>,
) -> Result<(), BoxError> {
    let api = Arc::new(HttpApi::new(&settings.base_url)?);
    let store = Arc::new(QueuesStore::new());
    let controller = QueuesController::new(api, store.clone(), settings, view);

    let mut changes = store.subscribe();
    let queues_poll = controller.poll_queues();
    let metrics_poll = controller.pull_metrics(start, end, timeframe);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let text = render_dashboard(&changes.borrow_and_update(), timeframe, metric);
                let mut stdout = io::stdout().lock();
                write!(stdout, "\x1b[2J\x1b[H{}", text)?;
                stdout.flush()?;
            }
        }
    }

    queues_poll.stop();
    metrics_poll.stop();
    tracing::info!("Watch: Stopped polling {}", controller.settings().base_url);

    Ok(())
}

async fn run_action(settings: DashboardSettings, command: QueueCommand, yes: bool) -> Result<(), BoxError> {
    let api = Arc::new(HttpApi::new(&settings.base_url)?);
    let store = Arc::new(QueuesStore::new());
    let controller = QueuesController::new(api.clone(), store.clone(), settings, QueueView::default());

    let confirm: Arc<dyn Confirm> = if yes {
        Arc::new(AutoConfirm)
    } else {
        Arc::new(StdinConfirm)
    };
    let dispatcher = ActionDispatcher::new(api, controller.clone(), confirm);

    match dispatcher.dispatch(command).await? {
        DispatchOutcome::Cancelled => {
            println!("Cancelled.");
            return Ok(());
        }
        DispatchOutcome::Executed => println!("Done."),
    }

    // Failure is logged by the controller; the queue list still prints.
    let _ = controller.get_queue_stats(TimeUnit::Min, None, None).await;
    print!("{}", render_dashboard(&store.snapshot(), TimeUnit::Min, MetricType::default()));

    Ok(())
}
