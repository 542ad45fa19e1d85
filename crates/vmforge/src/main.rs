mod report;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vmforge_cloud_azure::AzureClient;
use vmforge_config::{
    BuiltinDefaults, CliOverrides, ConfigSource, EnvironmentDefaults, FileConfig,
};
use vmforge_core::{PartialSpecification, ProvisioningPlan, Specification};
use vmforge_provision::{Mode, Orchestrator};

#[derive(Parser)]
#[command(name = "vmforge")]
#[command(version)]
#[command(about = "Provision an Azure VM and its supporting network resources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the VM and every resource it depends on
    Apply {
        #[command(flatten)]
        spec: SpecArgs,
        /// Validate and preview the run without mutating cloud state
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the resolved provisioning plan without touching the cloud
    Plan {
        #[command(flatten)]
        spec: SpecArgs,
    },
    /// Write a configuration file skeleton to edit and re-use
    GenerateConfig {
        /// Destination path, e.g. vmforge.json
        path: PathBuf,
    },
}

#[derive(Args)]
struct SpecArgs {
    /// JSON configuration file (vmforge.json is discovered when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Azure subscription id (falls back to AZURE_SUBSCRIPTION_ID)
    #[arg(long)]
    subscription_id: Option<String>,

    /// Virtual machine name
    #[arg(long)]
    vm_name: Option<String>,

    /// Resource group name
    #[arg(long)]
    resource_group: Option<String>,

    /// Azure location, e.g. "West Europe"
    #[arg(long)]
    location: Option<String>,

    /// VM size, e.g. Standard_B2s
    #[arg(long)]
    vm_size: Option<String>,

    /// Administrator account name
    #[arg(long)]
    admin_user: Option<String>,

    /// Administrator password
    #[arg(long)]
    admin_password: Option<String>,
}

impl SpecArgs {
    /// Resolve all configuration sources into a validated specification.
    ///
    /// Precedence: command line > configuration file > environment >
    /// built-in defaults. The environment is read here, at the outermost
    /// layer; the core crates never touch it.
    fn resolve(&self) -> anyhow::Result<Specification> {
        let mut sources: Vec<Box<dyn ConfigSource>> = Vec::new();

        sources.push(Box::new(CliOverrides {
            subscription_id: self.subscription_id.clone(),
            vm_name: self.vm_name.clone(),
            resource_group: self.resource_group.clone(),
            location: self.location.clone(),
            vm_size: self.vm_size.clone(),
            admin_username: self.admin_user.clone(),
            admin_password: self.admin_password.clone().map(Into::into),
        }));

        let file = self
            .config
            .clone()
            .or_else(vmforge_config::find_config_file);
        if let Some(path) = file {
            println!("Using configuration file: {}", path.display().to_string().cyan());
            sources.push(Box::new(FileConfig::new(path)));
        }

        sources.push(Box::new(EnvironmentDefaults::new(
            std::env::var("AZURE_SUBSCRIPTION_ID").ok(),
        )));
        sources.push(Box::new(BuiltinDefaults));

        Ok(vmforge_config::resolve(&sources)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Apply { spec, dry_run } => {
            let mode = if dry_run { Mode::DryRun } else { Mode::Apply };
            apply(&spec, mode).await
        }
        Commands::Plan { spec } => {
            let spec = spec.resolve()?;
            let plan = ProvisioningPlan::build(&spec)
                .context("internal error while building the provisioning plan")?;
            print_plan(&plan);
            Ok(())
        }
        Commands::GenerateConfig { path } => generate_config(&path),
    }
}

async fn apply(args: &SpecArgs, mode: Mode) -> anyhow::Result<()> {
    let spec = args.resolve()?;
    let plan = ProvisioningPlan::build(&spec)
        .context("internal error while building the provisioning plan")?;

    println!();
    println!(
        "{}",
        format!(
            "Provisioning {} ({} resources, {})",
            spec.vm_name,
            plan.len(),
            match mode {
                Mode::Apply => "apply",
                Mode::DryRun => "dry run",
            }
        )
        .bold()
    );
    print_plan(&plan);

    let client = AzureClient::new(&spec);
    match client.check_auth().await {
        Ok(account) => println!("Authenticated as {}", account.cyan()),
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            eprintln!("  Run {} first.", "az login".cyan());
            std::process::exit(1);
        }
    }

    // In-flight creations finish on Ctrl-C; nothing new starts.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!();
                eprintln!("{}", "Cancelling; waiting for in-flight operations...".yellow());
                cancel.cancel();
            }
        });
    }

    let orchestrator = Orchestrator::new(Arc::new(client));
    let report = orchestrator.execute(&plan, mode, cancel).await;

    report::render(&report);

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_plan(plan: &ProvisioningPlan) {
    println!();
    for (index, level) in plan.levels().iter().enumerate() {
        println!("  {}", format!("stage {}", index + 1).bold());
        for id in level {
            let Some(descriptor) = plan.descriptor(id) else {
                continue;
            };
            let depends = if descriptor.depends_on.is_empty() {
                String::new()
            } else {
                format!(" (after {})", descriptor.depends_on.join(", "))
            };
            println!(
                "    • {} {}{}",
                descriptor.kind,
                descriptor.name.cyan(),
                depends.dimmed()
            );
        }
    }
    println!();
}

fn generate_config(path: &PathBuf) -> anyhow::Result<()> {
    let template = PartialSpecification::template();
    let mut json = serde_json::to_string_pretty(&template)?;
    json.push('\n');
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!(
        "{} Configuration template written to {}",
        "✓".green(),
        path.display().to_string().cyan()
    );
    println!("  Edit it, then run: vmforge apply --config {}", path.display());
    Ok(())
}
