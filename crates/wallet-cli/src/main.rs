use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wallet_store::password::{generate_password, PasswordPolicy};
use wallet_store::paths::{data_dir, ensure_dirs, list_wallets, wallet_file};
use wallet_store::{Password, Retention, SecretStore, StoreError, Updates};

const PASSWORD_ENV: &str = "WALLET_PASSWORD";
/// Candidate for `verify`; kept apart from the password that opens the wallet.
const CONFIRM_ENV: &str = "WALLET_CONFIRM_PASSWORD";

#[derive(Parser, Debug)]
#[command(author, version, about = "Encrypted wallet store tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Location {
    /// Wallet name under the data directory
    #[arg(long, default_value = "default")]
    wallet: String,
    /// Data directory (defaults to the platform data dir or $WALLET_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Explicit wallet file path; overrides --wallet and --data-dir
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create and initialise a new wallet file
    Init {
        #[command(flatten)]
        location: Location,
    },
    /// Print one record value as JSON
    Get {
        key: String,
        #[command(flatten)]
        location: Location,
    },
    /// Write one record value given as JSON
    Set {
        key: String,
        /// Value as JSON, e.g. 20, "text" or ["a","b"]
        value: String,
        #[arg(long)]
        allow_new_key: bool,
        #[command(flatten)]
        location: Location,
    },
    /// Exit non-zero unless the password opens the wallet
    Check {
        #[command(flatten)]
        location: Location,
    },
    /// Re-confirm a password against an opened wallet
    Verify {
        #[command(flatten)]
        location: Location,
    },
    /// List wallet files in the data directory
    List {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Generate a random password
    GenPassword {
        #[arg(short, long, default_value = "16")]
        length: usize,
        #[arg(long)]
        no_lowercase: bool,
        #[arg(long)]
        no_uppercase: bool,
        #[arg(long)]
        no_digits: bool,
        #[arg(long)]
        no_specials: bool,
        #[arg(long)]
        allow_ambiguous: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Init { location } => {
            let path = resolve(&location)?;
            let mut password = prompt_password_twice("Create wallet password: ")?;
            SecretStore::create(&path, &mut password, Retention::Erase)
                .with_context(|| format!("create wallet at {}", path.display()))?;
            info!(path = %path.display(), "wallet initialised");
            println!("Wallet created: {}", path.display());
        }
        Commands::Get { key, location } => {
            let store = open(&location)?;
            let value = store.get_value(&key)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Set {
            key,
            value,
            allow_new_key,
            location,
        } => {
            let value: serde_json::Value =
                serde_json::from_str(&value).context("value must be valid JSON")?;
            let mut store = open(&location)?;
            let updates: Updates = [(key, value)].into_iter().collect();
            store.write_values(updates, allow_new_key)?;
        }
        Commands::Check { location } => {
            let verdict = check_verdict(open(&location))?;
            println!("{}", verdict.message());
            if verdict != CheckVerdict::Ok {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Verify { location } => {
            let store = open(&location)?;
            let mut candidate = read_password(CONFIRM_ENV, "Confirm password: ")?;
            if !store.validate_password(&mut candidate)? {
                println!("password does not match");
                return Ok(ExitCode::FAILURE);
            }
            println!("password confirmed");
        }
        Commands::List { data_dir: dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => data_dir()?,
            };
            for name in list_wallets(&dir)? {
                println!("{name}");
            }
        }
        Commands::GenPassword {
            length,
            no_lowercase,
            no_uppercase,
            no_digits,
            no_specials,
            allow_ambiguous,
        } => {
            let policy = PasswordPolicy {
                lowercase: !no_lowercase,
                uppercase: !no_uppercase,
                digits: !no_digits,
                specials: !no_specials,
                exclude_ambiguous: !allow_ambiguous,
            };
            let password = generate_password(length, &policy)?;
            let text = std::str::from_utf8(password.as_bytes())
                .map_err(|e| anyhow!("generated password is not utf-8: {e}"))?;
            println!("{text}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckVerdict {
    Ok,
    Incorrect,
    Unreadable,
}

impl CheckVerdict {
    fn message(self) -> &'static str {
        match self {
            CheckVerdict::Ok => "password ok",
            CheckVerdict::Incorrect => "password incorrect",
            CheckVerdict::Unreadable => "wallet file no longer decrypts",
        }
    }
}

fn check_verdict(opened: Result<SecretStore>) -> Result<CheckVerdict> {
    match opened {
        Ok(store) if store.check_password() => Ok(CheckVerdict::Ok),
        Ok(_) => Ok(CheckVerdict::Unreadable),
        Err(e) => match e.downcast_ref::<StoreError>() {
            Some(StoreError::IncorrectPassword) => Ok(CheckVerdict::Incorrect),
            _ => Err(e),
        },
    }
}

fn resolve(location: &Location) -> Result<PathBuf> {
    if let Some(file) = &location.file {
        return Ok(file.clone());
    }
    let data = match &location.data_dir {
        Some(dir) => dir.clone(),
        None => data_dir()?,
    };
    ensure_dirs(&data)?;
    Ok(wallet_file(&data, &location.wallet))
}

fn open(location: &Location) -> Result<SecretStore> {
    let path = resolve(location)?;
    let mut password = prompt_password("Wallet password: ")?;
    let store = SecretStore::open(&path, &mut password)?;
    Ok(store)
}

fn prompt_password(prompt: &str) -> Result<Password> {
    read_password(PASSWORD_ENV, prompt)
}

fn read_password(env: &str, prompt: &str) -> Result<Password> {
    if let Ok(pw) = std::env::var(env) {
        if !pw.is_empty() {
            return Ok(Password::from(pw));
        }
    }
    let pw = rpassword::prompt_password(prompt).map_err(|e| anyhow!("password prompt: {e}"))?;
    Ok(Password::from(pw))
}

fn prompt_password_twice(prompt: &str) -> Result<Password> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Password::from(pw));
        }
    }
    let first = prompt_password(prompt)?;
    let second = prompt_password("Confirm password: ")?;
    if first.as_bytes() != second.as_bytes() {
        bail!("passwords do not match");
    }
    if first.is_empty() {
        bail!("password must not be empty");
    }
    Ok(first)
}
