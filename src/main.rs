use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use waydroid_backup::audit::AuditLogger;
use waydroid_backup::cli::{handle_lifecycle_command, LifecycleCommands};
use waydroid_backup::config::{paths::BackupPaths, settings::Settings};
use waydroid_backup::service::controller_for;

#[derive(Parser)]
#[command(
    name = "waydroid-backup",
    version,
    about = "Backup, restore and retention for Waydroid installations",
    long_about = "waydroid-backup creates timestamped backups of a Waydroid \
                  installation (configuration, user data and optionally the \
                  system images), prunes old ones and restores them after \
                  validating every archive member."
)]
struct Cli {
    /// Backup root directory (overrides backup_root in config.json)
    #[arg(long, global = true, env = "WAYDROID_BACKUP_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Lifecycle(LifecycleCommands),

    /// Show current configuration and paths
    Config {
        /// Write the resolved settings to config.json
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Initialize paths and settings
    let paths = BackupPaths::new()?;
    let mut settings = Settings::load_or_create(&paths)?;
    if let Some(root) = cli.root {
        settings = settings.with_backup_root(root);
        settings.validate()?;
    }

    match cli.command {
        Some(Commands::Lifecycle(cmd)) => {
            paths.ensure_directories()?;
            let audit = AuditLogger::new(paths.audit_log());
            let services = controller_for(&settings);
            handle_lifecycle_command(&settings, services.as_ref(), &audit, cmd)?;
        }
        Some(Commands::Config { save }) => {
            if save {
                settings.save(&paths)?;
                println!("Settings saved to {}", paths.settings_file().display());
                println!();
            }
            println!("waydroid-backup Configuration");
            println!("=============================");
            println!("Config file:  {}", paths.settings_file().display());
            println!("Audit log:    {}", paths.audit_log().display());
            println!();
            println!("Settings:");
            println!("  Backup root:     {}", settings.backup_root.display());
            println!("  Max backups:     {}", settings.max_backups);
            println!(
                "  Waydroid state:  {}",
                settings.sources.waydroid_state_dir.display()
            );
            println!("  User data:       {}", settings.sources.user_data_dir().display());
            println!(
                "  wayvnc config:   {}",
                settings.sources.wayvnc_config_dir.display()
            );
            println!(
                "  VNC password:    {}",
                settings.sources.vnc_password_file.display()
            );
            println!("  Service manager: {:?}", settings.services.manager);
            let managed: Vec<String> = settings
                .services
                .managed
                .iter()
                .map(|s| s.to_string())
                .collect();
            println!("  Managed:         {}", managed.join(", "));
        }
        None => {
            println!("waydroid-backup - Waydroid backup and restore");
            println!();
            println!("Run 'waydroid-backup --help' for usage information.");
        }
    }

    Ok(())
}
