use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use voidmail::config::CleanupConfig;
use voidmail::{
    CleanupService, Config, Database, DomainAuthority, EmptySweepReport, InboxService,
    MailboxSettings, PassReport, Reconciler, Result, SmtpServer, VoidmailError,
};

/// voidmail - disposable email service
#[derive(Parser, Debug)]
#[command(name = "voidmail")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the SMTP server and the reconciler until Ctrl-C
    Serve,

    /// Run the SMTP server only
    Smtp {
        /// Address to bind (overrides smtp.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides smtp.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Delete expired mailboxes and mailboxes that never received mail
    Cleanup(CleanupArgs),

    /// Delete mailboxes that never received mail
    PurgeEmpty {
        /// Minimum age in minutes (overrides cleanup.empty_grace_minutes)
        #[arg(long)]
        minutes: Option<u64>,

        /// List the candidates without deleting anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Domain administration
    #[command(subcommand)]
    Domain(DomainCommands),

    /// Mailbox administration
    #[command(subcommand)]
    Mailbox(MailboxCommands),
}

#[derive(Args, Debug)]
struct CleanupArgs {
    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Seconds between passes of both sweeps (overrides the cleanup intervals)
    #[arg(long)]
    interval: Option<u64>,

    /// Skip the empty-mailbox sweep
    #[arg(long, visible_alias = "no-empty")]
    expiry_only: bool,

    /// Minimum age in minutes of an empty mailbox (overrides cleanup.empty_grace_minutes)
    #[arg(long)]
    minutes: Option<u64>,

    /// List empty-mailbox candidates without deleting them
    #[arg(long, conflicts_with = "expiry_only")]
    dry_run: bool,
}

impl CleanupArgs {
    fn reconciler(&self, db: Database, config: &CleanupConfig) -> Result<Reconciler> {
        let mut reconciler = Reconciler::new(db, config).with_empty_dry_run(self.dry_run);
        if let Some(secs) = self.interval {
            if secs == 0 {
                return Err(VoidmailError::Validation("--interval must be positive".to_string()));
            }
            reconciler = reconciler.with_interval(secs);
        }
        if let Some(minutes) = self.minutes {
            reconciler = reconciler.with_empty_grace(chrono::Duration::minutes(minutes as i64));
        }
        if self.expiry_only {
            reconciler = reconciler.without_empty_sweep();
        }
        Ok(reconciler)
    }
}

#[derive(Subcommand, Debug)]
enum DomainCommands {
    /// Add a domain
    Add {
        /// Domain name
        name: String,

        /// Create the domain without accepting mail yet
        #[arg(long)]
        inactive: bool,
    },

    /// List all domains
    #[command(alias = "ls")]
    List,

    /// Start accepting mail for a domain
    Activate {
        /// Domain name
        name: String,
    },

    /// Stop accepting mail for a domain
    Deactivate {
        /// Domain name
        name: String,
    },

    /// Remove a domain with all of its mailboxes and emails
    Remove {
        /// Domain name
        name: String,
    },
}

#[derive(Subcommand, Debug)]
enum MailboxCommands {
    /// Create a mailbox and print its address and token
    Create {
        /// Domain to create the mailbox under (default: first active domain)
        #[arg(long)]
        domain: Option<String>,

        /// Custom local part
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load_with_env(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = voidmail::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        voidmail::logging::init_console_only(&config.logging.level);
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, mut config: Config) -> Result<()> {
    let db = Database::open(&config.database.path).await?;
    let settings = MailboxSettings::new(config.mailbox.ttl());

    let result = match command {
        Commands::Serve => {
            seed_domains(&db, &config).await?;
            let server = SmtpServer::bind(&config.smtp, db.clone(), settings).await?;
            let reconciler = Reconciler::new(db.clone(), &config.cleanup);
            info!("voidmail started");

            let (served, ()) = tokio::join!(
                server.run_until(shutdown_signal()),
                reconciler.run(shutdown_signal()),
            );
            served
        }
        Commands::Smtp { host, port } => {
            if let Some(host) = host {
                config.smtp.host = host;
            }
            if let Some(port) = port {
                config.smtp.port = port;
            }
            seed_domains(&db, &config).await?;
            let server = SmtpServer::bind(&config.smtp, db.clone(), settings).await?;
            server.run_until(shutdown_signal()).await
        }
        Commands::Cleanup(args) => {
            let reconciler = args.reconciler(db.clone(), &config.cleanup)?;
            if args.once {
                let report = reconciler.run_once().await;
                print_pass(&report);
                if report.failed_sweeps > 0 {
                    Err(VoidmailError::Database(format!(
                        "{} sweep(s) failed, see the log",
                        report.failed_sweeps
                    )))
                } else {
                    Ok(())
                }
            } else {
                println!(
                    "Running cleanup every {}s (Ctrl-C to stop)",
                    reconciler.expiry_interval().as_secs()
                );
                reconciler.run(shutdown_signal()).await;
                Ok(())
            }
        }
        Commands::PurgeEmpty { minutes, dry_run } => {
            let grace = match minutes {
                Some(minutes) => chrono::Duration::minutes(minutes as i64),
                None => config.cleanup.empty_grace(),
            };
            let report = CleanupService::new(&db).sweep_empty(grace, dry_run).await?;
            print_empty(&report);
            Ok(())
        }
        Commands::Domain(command) => run_domain(&db, command).await,
        Commands::Mailbox(MailboxCommands::Create { domain, name }) => {
            seed_domains(&db, &config).await?;
            let handle = InboxService::new(&db, settings)
                .create(domain.as_deref(), name.as_deref())
                .await?;
            println!("Address: {}", handle.address);
            println!("Token:   {}", handle.token);
            println!("Expires: {}", handle.expires_at);
            Ok(())
        }
    };

    db.close().await;
    result
}

async fn run_domain(db: &Database, command: DomainCommands) -> Result<()> {
    let authority = DomainAuthority::new(db);
    match command {
        DomainCommands::Add { name, inactive } => {
            let outcome = authority.add(&name, !inactive).await?;
            let domain = outcome.domain();
            if outcome.is_created() {
                println!("Added domain: {} ({})", domain.name, domain.status());
            } else {
                println!("Domain already exists: {} ({})", domain.name, domain.status());
            }
        }
        DomainCommands::List => {
            let domains = authority.list().await?;
            if domains.is_empty() {
                println!("No domains configured.");
            }
            for domain in domains {
                println!("  {} [{}]", domain.name, domain.status());
            }
        }
        DomainCommands::Activate { name } => {
            authority.activate(&name).await?;
            println!("Activated domain: {name}");
        }
        DomainCommands::Deactivate { name } => {
            authority.deactivate(&name).await?;
            println!("Deactivated domain: {name}");
        }
        DomainCommands::Remove { name } => {
            let removed = authority.remove(&name).await?;
            println!("Removed domain {name} and {removed} mailbox(es)");
        }
    }
    Ok(())
}

fn print_pass(report: &PassReport) {
    if let Some(expired) = &report.expired {
        println!("Deleted {} expired mailbox(es)", expired.removed);
        if expired.failed > 0 {
            println!("{} deletion(s) failed and will be retried", expired.failed);
        }
    }
    if let Some(empty) = &report.empty {
        print_empty(empty);
    }
}

fn print_empty(report: &EmptySweepReport) {
    if report.dry_run {
        println!("Would delete {} empty mailbox(es):", report.candidates.len());
        for candidate in &report.candidates {
            println!("  {} (created {})", candidate.address, candidate.created_at);
        }
    } else {
        println!("Deleted {} empty mailbox(es)", report.removed);
        if report.failed > 0 {
            println!("{} deletion(s) failed and will be retried", report.failed);
        }
    }
}

async fn seed_domains(db: &Database, config: &Config) -> Result<()> {
    if config.domains.seed.is_empty() {
        return Ok(());
    }
    for outcome in DomainAuthority::new(db).ensure_seeded(&config.domains.seed).await? {
        if outcome.is_created() {
            info!("Seeded domain {}", outcome.domain().name);
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
