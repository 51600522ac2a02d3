//! Argument parsing and the two ways of running: menu or subcommand

mod prompt;
mod render;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::debug;
use prompt::Prompt;
use std::path::PathBuf;
use zbx_migrate::{
    default_config_path, Action, CredentialStore, Credentials, EntityKind, FileStore,
    JsonRpcClient, MigrationConfig, RestoreOptions, Result, Runner, Selection,
};

#[cfg(feature = "keychain")]
const KEYCHAIN_SERVICE: &str = "zbx-migrate";

#[derive(Parser, Debug)]
#[command(name = "zbx-migrate", version)]
#[command(about = "Back up and restore Zabbix configuration through the API")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Credentials file
    #[arg(long, global = true, default_value = "auth.toml")]
    auth_file: PathBuf,

    /// Artifact directory, overrides the configuration file
    #[arg(long, global = true)]
    backup_dir: Option<PathBuf>,

    /// Keep credentials in the OS keychain instead of the credentials file
    #[cfg(feature = "keychain")]
    #[arg(long, global = true)]
    keychain: bool,

    /// More output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export configuration into the artifact directory
    Backup(RunArgs),
    /// Replay the artifact directory against a server
    Restore(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Kinds by menu number; 0 or nothing means all
    #[arg(long, num_args = 1.., value_parser = clap::value_parser!(u8).range(0..=10))]
    kinds: Vec<u8>,

    /// Host groups whose hosts are restored; nothing means all
    #[arg(long, num_args = 1..)]
    groups: Vec<String>,

    /// Server URL, with or without /api_jsonrpc.php
    #[arg(long, env = "ZBX_URL")]
    url: Option<String>,

    #[arg(long, env = "ZBX_LOGIN")]
    login: Option<String>,

    #[arg(long, env = "ZBX_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Save the credentials used into the credentials file
    #[arg(long)]
    save: bool,
}

/// Parse arguments and run
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    let store = credential_store(&cli);
    debug!("Credentials backend: {}", store.backend_name());

    match cli.command {
        Some(Command::Backup(args)) => run_command(Action::Backup, args, &config, store.as_ref()),
        Some(Command::Restore(args)) => run_command(Action::Restore, args, &config, store.as_ref()),
        None => run_menu(&config, store.as_ref()),
    }
}

fn credential_store(cli: &Cli) -> Box<dyn CredentialStore> {
    #[cfg(feature = "keychain")]
    if cli.keychain {
        return Box::new(zbx_migrate::KeychainStore::new(KEYCHAIN_SERVICE));
    }
    debug!("Credentials file: {}", cli.auth_file.display());
    Box::new(FileStore::new(&cli.auth_file))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn load_config(cli: &Cli) -> Result<MigrationConfig> {
    let mut config = match &cli.config {
        Some(path) => MigrationConfig::from_file(path)?,
        None => {
            let path = default_config_path();
            if path.is_file() {
                MigrationConfig::from_file(&path)?
            } else {
                MigrationConfig::default()
            }
        }
    };
    if let Some(dir) = &cli.backup_dir {
        config.backup_dir.clone_from(dir);
    }
    Ok(config)
}

fn run_command(
    action: Action,
    args: RunArgs,
    config: &MigrationConfig,
    store: &dyn CredentialStore,
) -> Result<()> {
    let saved = store.load(action.section())?;
    let credentials = merge_credentials(saved, args.url, args.login, args.password).ok_or_else(|| {
        zbx_migrate::Error::Credential(format!(
            "no credentials for [{}]; pass --url, --login and --password or run without a subcommand",
            action.section()
        ))
    })?;
    credentials.validate()?;
    if args.save {
        store.store(action.section(), &credentials)?;
    }

    let selection = if args.kinds.is_empty() || args.kinds.contains(&0) {
        Selection::all()
    } else {
        let kinds: Vec<EntityKind> = args
            .kinds
            .iter()
            .filter_map(|&n| EntityKind::from_number(n))
            .collect();
        Selection::of(&kinds)
    };

    execute(action, &credentials, config, &selection, RestoreOptions::new().host_groups(&args.groups))
}

/// Fill what the flags did not give from the saved entry
fn merge_credentials(
    saved: Option<Credentials>,
    url: Option<String>,
    login: Option<String>,
    password: Option<String>,
) -> Option<Credentials> {
    let (saved_url, saved_login, saved_password) = match saved {
        Some(c) => (Some(c.url), Some(c.login), Some(c.password)),
        None => (None, None, None),
    };
    Some(Credentials {
        url: url.or(saved_url)?,
        login: login.or(saved_login)?,
        password: password.or(saved_password)?,
    })
}

fn run_menu(config: &MigrationConfig, store: &dyn CredentialStore) -> Result<()> {
    let stdin = std::io::stdin();
    let mut prompt = Prompt::new(stdin.lock(), std::io::stdout());

    println!("{}", "Zabbix configuration backup".bold());
    let action = prompt.choose_action()?;
    let credentials = prompt.credentials(store, action)?;
    let selection = prompt.choose_selection(action)?;

    let mut options = RestoreOptions::new();
    if action == Action::Restore && selection.contains(EntityKind::Hosts) {
        options = options.host_groups(&prompt.host_groups()?);
    }

    execute(action, &credentials, config, &selection, options)
}

fn execute(
    action: Action,
    credentials: &Credentials,
    config: &MigrationConfig,
    selection: &Selection,
    options: RestoreOptions,
) -> Result<()> {
    let mut client = JsonRpcClient::connect(&credentials.url, config.timeout)?;
    client.login(&credentials.login, &credentials.password)?;
    println!(
        "Connected to {} (API {})",
        client.endpoint().cyan(),
        zbx_migrate::ApiClient::api_version(&client)
    );

    let report = Runner::new(&client, config)
        .options(options)
        .on_kind(render::kind_report)
        .run(action, selection);

    render::passwords(&report);
    render::totals(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "zbx-migrate",
            "--backup-dir",
            "/tmp/b",
            "restore",
            "--kinds",
            "3",
            "5",
            "--groups",
            "Linux servers",
        ])
        .unwrap();

        assert_eq!(cli.backup_dir, Some(PathBuf::from("/tmp/b")));
        match cli.command {
            Some(Command::Restore(args)) => {
                assert_eq!(args.kinds, vec![3, 5]);
                assert_eq!(args.groups, vec!["Linux servers"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_kinds_out_of_range() {
        assert!(Cli::try_parse_from(["zbx-migrate", "backup", "--kinds", "11"]).is_err());
    }

    #[test]
    fn test_merge_credentials() {
        let saved = Credentials::new("http://old", "Admin", "zabbix");

        let merged = merge_credentials(Some(saved), Some("http://new".into()), None, None).unwrap();
        assert_eq!(merged, Credentials::new("http://new", "Admin", "zabbix"));

        assert!(merge_credentials(None, Some("http://new".into()), Some("a".into()), None).is_none());
    }
}
