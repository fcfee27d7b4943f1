use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crewline::core::Subtask;
use crewline::{build_coordinator, Config, Task};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crewline")]
#[command(author, version, about = "crewline - multi-agent coordination engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP task API
    Serve {
        /// Port to listen on (default from config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (default from config)
        #[arg(long)]
        host: Option<String>,

        /// Use the offline simulated model
        #[arg(long)]
        sim: bool,
    },

    /// Run one task and print the terminal state as JSON
    Run {
        /// Task description
        description: String,

        /// Coordination mode (sequential, parallel, hierarchical, feedback)
        #[arg(short, long, default_value = "sequential")]
        mode: String,

        /// Task type tag, selects a configured pipeline
        #[arg(short = 't', long = "type")]
        task_type: Option<String>,

        /// Extra context for the agents
        #[arg(short, long)]
        context: Option<String>,

        /// Requirement (repeatable)
        #[arg(short, long = "requirement")]
        requirements: Vec<String>,

        #[arg(long)]
        max_iterations: Option<u32>,

        #[arg(long)]
        max_feedback_rounds: Option<u32>,

        /// Task plan for parallel mode, as a JSON array of
        /// {"description", "agent_type"} objects
        #[arg(long)]
        plan: Option<String>,

        /// Use the offline simulated model
        #[arg(long)]
        sim: bool,
    },

    /// List the registered agents
    Agents {
        /// Use the offline simulated model
        #[arg(long)]
        sim: bool,
    },

    /// Print the effective configuration
    Config,
}

fn load_config(sim: bool) -> Result<Config> {
    let mut config = Config::load()?;
    if sim {
        config.llm.provider = "sim".to_string();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "crewline=debug"
    } else {
        "crewline=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve { port, host, sim } => {
            let config = load_config(sim)?;
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let coordinator = build_coordinator(&config)?;
            tracing::info!("Starting HTTP server on {}:{}", host, port);
            crewline::transport::run_http_server(&host, port, coordinator, config).await?;
        }
        Commands::Run {
            description,
            mode,
            task_type,
            context,
            requirements,
            max_iterations,
            max_feedback_rounds,
            plan,
            sim,
        } => {
            let config = load_config(sim)?;
            let coordinator = build_coordinator(&config)?;

            let mut task = Task::new(description);
            task.task_type = task_type;
            task.context = context;
            task.requirements = requirements;

            let mut options = config.run_options(max_iterations, max_feedback_rounds);
            if let Some(plan) = plan {
                let subtasks: Vec<Subtask> =
                    serde_json::from_str(&plan).context("Invalid --plan JSON")?;
                options = options.with_task_plan(subtasks);
            }

            let state = coordinator.run(task, &mode, options).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            if state.error.is_some() {
                std::process::exit(1);
            }
        }
        Commands::Agents { sim } => {
            let config = load_config(sim)?;
            let coordinator = build_coordinator(&config)?;
            for info in coordinator.registry().list() {
                let d = &info.descriptor;
                let caps: Vec<&str> = d.capabilities.iter().map(|c| c.name.as_str()).collect();
                println!(
                    "{:<16} {:<11} {:<7} {}",
                    d.agent_id,
                    d.agent_type.to_string(),
                    info.status.to_string(),
                    caps.join(", ")
                );
            }
        }
        Commands::Config => {
            let config = Config::load()?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
