//! `xcutr`: parallel command execution and file transfer across a fleet (C12).
//!
//! A thin shim — subcommand wiring and flag grammar are not this library's concern, only
//! building the right `ExecFilter`/`CopyOptions` and calling into `picl`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::error;

use picl::config::{self, ClusterConfig};
use picl::crypto::Cryptor;
use picl::error::PiclError;
use picl::session::filter::{CopyOptions, DuplicatePolicy, ExecFilter};
use picl::session::pool::ConnectionPool;
use picl::{bootstrap, executor, transfer};

#[derive(Parser)]
#[command(name = "xcutr", about = "Run commands and move files across a node fleet")]
struct Cli {
    #[arg(long, env = "PICL_CONFIG", default_value = "")]
    config: String,
    #[arg(long)]
    only: Option<String>,
    #[arg(long)]
    except: Option<String>,
    #[arg(long)]
    sudo: bool,
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a shell command on every filtered node.
    Exec { command: Vec<String> },
    /// Copy a file from one remote node to the local machine.
    Pull {
        #[arg(long)]
        local_path: PathBuf,
        /// `<nodeName>:<remotePath>`
        #[arg(long)]
        remote: String,
    },
    /// Copy a local file to every filtered node.
    Push {
        #[arg(long)]
        local_path: PathBuf,
        #[arg(long)]
        remote_path: String,
        #[arg(long, default_value = "ignore")]
        file_conflict_policy: String,
    },
    /// Copy a file already present on one remote node to every other filtered node.
    Replicate {
        /// `<nodeName>:<remotePath>`
        #[arg(long)]
        remote: String,
        #[arg(long, default_value = "ignore")]
        file_conflict_policy: String,
    },
    /// Delete a remote file from every filtered node.
    Remove { remote_path: String },
    /// Install the operator's public key into every node's `authorized_keys`.
    CopyId,
    /// Encrypt a plaintext cluster config file in place.
    EncryptConfig,
    /// Decrypt an encrypted cluster config file in place.
    DecryptConfig,
    /// No recognized subcommand: treat the positional args as a shell command.
    #[command(external_subcommand)]
    Shell(Vec<String>),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    picl::logging::init_logging(&cli.log_level);
    std::process::exit(match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            error!("{err}");
            1
        }
    });
}

async fn run(cli: Cli) -> Result<(), PiclError> {
    match &cli.command {
        Command::EncryptConfig => return encrypt_config(&cli.config).await,
        Command::DecryptConfig => return decrypt_config(&cli.config).await,
        _ => {}
    }

    let cluster = ClusterConfig::load(&cli.config)?;
    let pool = ConnectionPool::dial_all(&cluster.hosts).await;
    let filter = build_filter(&cli);

    match cli.command {
        Command::Exec { command } => {
            let joined = command.join(" ");
            run_exec(&pool, &joined, &filter).await
        }
        Command::Shell(args) => run_exec(&pool, &args.join(" "), &filter).await,
        Command::Pull {
            local_path,
            remote,
        } => {
            let (node, path) = split_remote(&remote)?;
            transfer::pull(&pool, node, path, &local_path).await
        }
        Command::Push {
            local_path,
            remote_path,
            file_conflict_policy,
        } => {
            let opts = copy_options(filter, &file_conflict_policy)?;
            transfer::push(&pool, &local_path, &remote_path, &opts).await
        }
        Command::Replicate {
            remote,
            file_conflict_policy,
        } => {
            let (node, path) = split_remote(&remote)?;
            let opts = copy_options(filter, &file_conflict_policy)?;
            transfer::replicate(&pool, node, path, &opts).await
        }
        Command::Remove { remote_path } => transfer::remove(&pool, &remote_path, &filter).await,
        Command::CopyId => bootstrap::copy_id(&pool).await,
        Command::EncryptConfig | Command::DecryptConfig => unreachable!("handled above"),
    }
}

async fn run_exec(pool: &ConnectionPool, command: &str, filter: &ExecFilter) -> Result<(), PiclError> {
    if filter.with_sudo {
        executor::exec_sudo(pool, command, filter).await
    } else {
        executor::exec(pool, command, filter).await
    }
}

fn build_filter(cli: &Cli) -> ExecFilter {
    let included = split_csv(cli.only.as_deref());
    let excluded = split_csv(cli.except.as_deref());
    ExecFilter::new()
        .include(included)
        .exclude(excluded)
        .with_sudo(cli.sudo)
}

fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
        .unwrap_or_default()
}

fn copy_options(filter: ExecFilter, policy: &str) -> Result<CopyOptions, PiclError> {
    let duplicate_policy = DuplicatePolicy::parse(policy)
        .ok_or_else(|| PiclError::ConfigError(format!("unknown file-conflict-policy: {policy}")))?;
    Ok(CopyOptions {
        filter,
        duplicate_policy,
    })
}

fn split_remote(remote: &str) -> Result<(&str, &str), PiclError> {
    remote
        .split_once(':')
        .ok_or_else(|| PiclError::InvalidRemoteSpec(remote.to_string()))
}

async fn encrypt_config(name: &str) -> Result<(), PiclError> {
    let (plain_path, encrypted_path) = config::config_paths(name)?;
    let password = read_password()?;
    let plaintext = tokio::fs::read(&plain_path).await?;
    Cryptor::new(password)
        .encrypt_to_file(&plaintext, &encrypted_path)
        .await?;
    tokio::fs::remove_file(&plain_path).await?;
    Ok(())
}

async fn decrypt_config(name: &str) -> Result<(), PiclError> {
    let (plain_path, encrypted_path) = config::config_paths(name)?;
    let password = read_password()?;
    let plaintext = Cryptor::new(password).decrypt_from_file(&encrypted_path).await?;
    tokio::fs::write(&plain_path, plaintext).await?;
    tokio::fs::remove_file(&encrypted_path).await?;
    Ok(())
}

fn read_password() -> Result<String, PiclError> {
    std::env::var(config::CONFIG_PASSWORD_ENV).map_err(|_| {
        PiclError::ConfigError(format!("set {} to (de/en)crypt the config", config::CONFIG_PASSWORD_ENV))
    })
}
