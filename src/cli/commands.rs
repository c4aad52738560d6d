//! CLI command implementations
//!
//! Each command loads the persisted layout, runs exactly one directory
//! operation, and saves the layout back only if that operation committed.
//! Events are staged in memory and reach the configured sink only after
//! the layout file has been written. Read commands never rewrite it.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::args::{Cli, Command};
use super::config::CliConfig;
use super::errors::{CliError, CliErrorCode, CliResult};
use super::io::{read_request, write_error, write_response};
use crate::directory::Directory;
use crate::history::HistoryLedger;
use crate::keys::fixed_name_of;
use crate::observability::{forward, EventSink, Logger, MemoryEventSink};
use crate::permit::{PermitSignature, PermitSigner, SetModuleBatchPermit, SetModulePermit};
use crate::store::LayoutStore;
use crate::types::{Identifier, Identity, Key};

/// Unix seconds as RFC 3339; out-of-range values render as null.
fn rfc3339(secs: u64) -> Option<String> {
    let secs = i64::try_from(secs).ok()?;
    chrono::DateTime::from_timestamp(secs, 0).map(|t| t.to_rfc3339())
}

/// Main CLI entry point
///
/// Parses arguments, dispatches, and reports failures as a JSON error
/// object on stdout before returning them to `main`.
pub fn run() -> CliResult<()> {
    Logger::init_from_env();
    let cli = Cli::parse_args();
    match run_command(&cli.config, cli.command) {
        Ok(()) => Ok(()),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Run the appropriate command based on CLI args
pub fn run_command(config_path: &Path, cmd: Command) -> CliResult<()> {
    let config = CliConfig::load(config_path)?;
    let data = match cmd {
        Command::Init => init(&config)?,
        Command::SignPermit => sign_permit(&config, read_request()?)?,
        cmd => {
            let read_only = cmd.is_read_only();
            let mut session = Session::open(&config)?;
            let data = session.dispatch(cmd)?;
            if !read_only {
                session.commit()?;
            }
            data
        }
    };
    write_response(data)
}

/// Create the layout file. Fails if one already exists.
pub fn init(config: &CliConfig) -> CliResult<Value> {
    let store = LayoutStore::new(config.data_path());
    if store.exists() {
        return Err(CliError::already_initialized());
    }
    std::fs::create_dir_all(config.data_path())?;

    let directory = Directory::initialize(
        config.directory.clone(),
        config.init_params(),
        config.collaborators()?,
    )?;
    store.save(directory.layout())?;

    Ok(json!({
        "initialized": true,
        "path": store.path().display().to_string(),
        "version": directory.version(),
    }))
}

/// Loaded directory plus where to write it back.
pub struct Session {
    store: LayoutStore,
    directory: Directory,
    staged: MemoryEventSink,
    outlet: Arc<dyn EventSink>,
}

impl Session {
    pub fn open(config: &CliConfig) -> CliResult<Self> {
        let store = LayoutStore::new(config.data_path());
        let layout = store.load()?.ok_or_else(CliError::not_initialized)?;

        let collaborators = config.collaborators()?;
        let outlet = Arc::clone(&collaborators.events);
        let staged = MemoryEventSink::new();
        let collaborators = collaborators.with_events(Arc::new(staged.clone()));

        let directory = Directory::open(layout, config.directory.clone(), collaborators)?;
        Ok(Self {
            store,
            directory,
            staged,
            outlet,
        })
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Persist the layout, then release staged events to the sink.
    ///
    /// If the write fails the staged events are discarded.
    pub fn commit(&self) -> CliResult<()> {
        let staged = self.staged.take();
        self.store.save(self.directory.layout())?;
        forward(self.outlet.as_ref(), staged);
        Ok(())
    }

    /// Accepts a fixed name, a registered dynamic name, or hex.
    pub fn resolve_key(&self, raw: &str) -> CliResult<Key> {
        if raw.trim().starts_with("0x") {
            return Ok(Key::from_hex(raw)?);
        }
        self.directory.resolve_name(raw).ok_or_else(|| {
            CliError::new(
                CliErrorCode::Rejected("MODDIR_NOT_FOUND"),
                format!("unknown key name '{}'", raw),
            )
        })
    }

    pub fn dispatch(&mut self, cmd: Command) -> CliResult<Value> {
        match cmd {
            Command::Init | Command::SignPermit => {
                Err(CliError::io_error("command does not operate on a session"))
            }
            Command::Status => Ok(self.status()),
            Command::Get { key } => {
                let key = self.resolve_key(&key)?;
                Ok(json!({
                    "key": key,
                    "identifier": self.directory.get(&key),
                }))
            }
            Command::Set {
                caller,
                key,
                identifier,
                allow_replace,
            } => {
                let caller = Identity::from_hex(&caller)?;
                let key = self.resolve_key(&key)?;
                let identifier = Identifier::from_hex(&identifier)?;
                let outcome = self.directory.set(caller, key, identifier, allow_replace)?;
                Ok(serde_json::to_value(outcome)?)
            }
            Command::Schedule {
                caller,
                key,
                identifier,
            } => {
                let caller = Identity::from_hex(&caller)?;
                let key = self.resolve_key(&key)?;
                let identifier = Identifier::from_hex(&identifier)?;
                let pending = self.directory.schedule(caller, key, identifier)?;
                Ok(serde_json::to_value(pending)?)
            }
            Command::Execute { caller, key } => {
                let caller = Identity::from_hex(&caller)?;
                let key = self.resolve_key(&key)?;
                let outcome = self.directory.execute(caller, key)?;
                Ok(serde_json::to_value(outcome)?)
            }
            Command::Cancel { caller, key, all } => {
                let caller = Identity::from_hex(&caller)?;
                if all {
                    let cancelled = self.directory.emergency_cancel_all(caller)?;
                    return Ok(json!({ "cancelled": cancelled }));
                }
                let raw = key.ok_or_else(|| CliError::io_error("--key is required"))?;
                let key = self.resolve_key(&raw)?;
                let cancelled = self.directory.cancel(caller, key)?;
                Ok(json!({ "cancelled": cancelled }))
            }
            Command::History { key, chronological } => {
                let key = self.resolve_key(&key)?;
                let layout = self.directory.layout();
                let entries = if chronological {
                    HistoryLedger::chronological(layout, &key)
                } else {
                    HistoryLedger::all(layout, &key)
                };
                Ok(json!({
                    "key": key,
                    "count": HistoryLedger::count(layout, &key),
                    "cursor": HistoryLedger::cursor(layout, &key),
                    "entries": entries,
                }))
            }
            Command::RegisterKey { caller, name } => {
                let caller = Identity::from_hex(&caller)?;
                let entry = self.directory.register_key(caller, &name)?;
                Ok(serde_json::to_value(entry)?)
            }
            Command::Pause { caller } => {
                self.directory.pause(Identity::from_hex(&caller)?)?;
                Ok(json!({ "paused": true }))
            }
            Command::Unpause { caller } => {
                self.directory.unpause(Identity::from_hex(&caller)?)?;
                Ok(json!({ "paused": false }))
            }
            Command::SubmitPermit { caller } => {
                let relayer = Identity::from_hex(&caller)?;
                let request: SubmitRequest = read_request()?;
                self.submit(relayer, request)
            }
        }
    }

    fn status(&self) -> Value {
        let layout = self.directory.layout();
        let modules: Vec<Value> = layout
            .modules
            .iter()
            .map(|(key, id)| json!({ "key": key, "name": fixed_name_of(key), "identifier": id }))
            .collect();
        let pending: Vec<Value> = layout
            .pending
            .iter()
            .map(|(key, p)| {
                json!({
                    "key": key,
                    "state": self.directory.upgrade_state(key).as_str(),
                    "ready_at": rfc3339(p.execute_after),
                    "upgrade": p,
                })
            })
            .collect();
        json!({
            "governance": self.directory.governance(),
            "min_delay": layout.min_delay,
            "modules": modules,
            "pending": pending,
            "dynamic_keys": self.directory.known_keys(),
        })
    }

    pub fn submit(&mut self, relayer: Identity, request: SubmitRequest) -> CliResult<Value> {
        let result = match request.permit {
            AnyPermit::Single(permit) => serde_json::to_value(self.directory.permit_set(
                relayer,
                &permit,
                &request.signature,
            )?)?,
            AnyPermit::Batch(permit) => serde_json::to_value(self.directory.permit_set_batch(
                relayer,
                &permit,
                &request.signature,
            )?)?,
        };
        Ok(result)
    }
}

/// Either permit kind; a batch is recognized by its `keys` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnyPermit {
    Single(SetModulePermit),
    Batch(SetModuleBatchPermit),
}

/// stdin of `submit-permit`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub permit: AnyPermit,
    pub signature: PermitSignature,
}

/// stdin of `sign-permit`
///
/// `nonce` defaults to the signer's current counter in the persisted layout.
#[derive(Debug, Clone, Deserialize)]
pub struct SignRequest {
    pub secret_key: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub identifier: Option<Identifier>,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub identifiers: Vec<Identifier>,
    #[serde(default)]
    pub allow_replace: bool,
    pub deadline: u64,
    #[serde(default)]
    pub nonce: Option<u64>,
}

/// Produce a permit and its signature without writing the layout.
pub fn sign_permit(config: &CliConfig, request: SignRequest) -> CliResult<Value> {
    let session = Session::open(config)?;
    let signer = PermitSigner::from_hex(&request.secret_key)?;
    let nonce = request
        .nonce
        .unwrap_or_else(|| session.directory().nonce_of(&signer.identity()));

    let permit = match (request.key, request.identifier) {
        (Some(key), Some(identifier)) => AnyPermit::Single(SetModulePermit {
            key: session.resolve_key(&key)?,
            new_identifier: identifier,
            allow_replace: request.allow_replace,
            nonce,
            deadline: request.deadline,
        }),
        (None, None) => AnyPermit::Batch(SetModuleBatchPermit {
            keys: request
                .keys
                .iter()
                .map(|k| session.resolve_key(k))
                .collect::<CliResult<Vec<_>>>()?,
            identifiers: request.identifiers,
            allow_replace: request.allow_replace,
            nonce,
            deadline: request.deadline,
        }),
        _ => {
            return Err(CliError::io_error(
                "single permits need both 'key' and 'identifier'",
            ))
        }
    };

    let digest = match &permit {
        AnyPermit::Single(p) => session.directory().permit_digest(p),
        AnyPermit::Batch(p) => session.directory().permit_digest(p),
    };
    let signature = signer.sign_digest(&digest);

    Ok(json!({
        "signer": signer.identity(),
        "digest": format!("0x{}", hex::encode(digest)),
        "permit": permit,
        "signature": signature,
    }))
}
