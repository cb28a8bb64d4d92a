use crate::errors::{BdUiError, Result};
use serde_json::Value;
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use tracing::{debug, warn};

/// A runtime module transformer: turns on-disk configuration and step
/// module source into an in-memory value.
pub trait ModuleLoader: Send + Sync {
    fn name(&self) -> &'static str;
    fn load_value(&self, source: &str) -> Result<Value>;
}

/// Registration state machine. `Registered` is terminal; `Failed` is not —
/// a later call may retry, while callers that waited on an in-flight
/// attempt adopt its outcome.
#[derive(Debug)]
enum RegistryState {
    Unregistered,
    Registering,
    Registered,
    Failed(String),
}

/// Process-wide loader registry.
///
/// `register_with` is single-flight: concurrent callers during
/// `Registering` block until the in-flight attempt settles, and the
/// installation side effect runs at most once per transition.
pub struct LoaderRegistry {
    state: Mutex<RegistryState>,
    cond: Condvar,
    loaders: Mutex<Vec<Arc<dyn ModuleLoader>>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::Unregistered),
            cond: Condvar::new(),
            loaders: Mutex::new(Vec::new()),
        }
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, RegistryState>> {
        self.state
            .lock()
            .map_err(|_| BdUiError::Config("loader registry lock poisoned".to_string()))
    }

    pub fn is_registered(&self) -> bool {
        self.lock_state()
            .map(|state| matches!(*state, RegistryState::Registered))
            .unwrap_or(false)
    }

    pub fn register_with<F>(&self, install: F) -> Result<()>
    where
        F: FnOnce() -> Result<Vec<Arc<dyn ModuleLoader>>>,
    {
        let mut state = self.lock_state()?;
        let mut waited = false;
        loop {
            match &*state {
                RegistryState::Registered => return Ok(()),
                RegistryState::Registering => {
                    waited = true;
                    state = self
                        .cond
                        .wait(state)
                        .map_err(|_| {
                            BdUiError::Config("loader registry lock poisoned".to_string())
                        })?;
                }
                RegistryState::Failed(message) if waited => {
                    // Adopt the in-flight attempt's outcome instead of
                    // re-running the side effect.
                    return Err(BdUiError::Config(format!(
                        "loader registration failed: {}",
                        message
                    )));
                }
                RegistryState::Failed(_) | RegistryState::Unregistered => {
                    *state = RegistryState::Registering;
                    break;
                }
            }
        }
        drop(state);

        let outcome = install();

        let mut state = self.lock_state()?;
        match outcome {
            Ok(installed) => {
                if let Ok(mut loaders) = self.loaders.lock() {
                    *loaders = installed;
                }
                *state = RegistryState::Registered;
                self.cond.notify_all();
                debug!(target: "bdui::loader", "loaders registered");
                Ok(())
            }
            Err(e) => {
                *state = RegistryState::Failed(e.to_string());
                self.cond.notify_all();
                Err(e)
            }
        }
    }

    /// Parse module source with the registered loaders, in registration
    /// order; the first to succeed wins.
    pub fn load_value(&self, source: &str) -> Result<Value> {
        let loaders = self
            .loaders
            .lock()
            .map_err(|_| BdUiError::Config("loader registry lock poisoned".to_string()))?
            .clone();
        if loaders.is_empty() {
            return Err(BdUiError::Config(
                "no module loaders registered; call register_loaders() first".to_string(),
            ));
        }
        let mut last_error = None;
        for loader in &loaders {
            match loader.load_value(source) {
                Ok(value) => return Ok(value),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| BdUiError::Config("module source rejected".to_string())))
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Relaxed JSON: tolerates `//` and `/* */` comments plus trailing commas,
/// the syntax the scaffolded configuration file is written in. The
/// stripping passes track string state, so comment markers and commas
/// inside string values survive untouched.
pub struct RelaxedJsonLoader;

impl RelaxedJsonLoader {
    pub fn install() -> Result<Arc<dyn ModuleLoader>> {
        Ok(Arc::new(Self))
    }
}

impl ModuleLoader for RelaxedJsonLoader {
    fn name(&self) -> &'static str {
        "relaxed-json"
    }

    fn load_value(&self, source: &str) -> Result<Value> {
        let stripped = strip_trailing_commas(&strip_comments(source));
        Ok(serde_json::from_str(&stripped)?)
    }
}

/// Remove `//` (to end of line) and `/* */` comments occurring outside
/// string literals.
fn strip_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            out.push(c);
            if c == b'\\' && i + 1 < bytes.len() {
                out.push(bytes[i + 1]);
                i += 2;
                continue;
            }
            if c == b'"' {
                in_string = false;
            }
            i += 1;
        } else if c == b'"' {
            in_string = true;
            out.push(c);
            i += 1;
        } else if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
        } else {
            out.push(c);
            i += 1;
        }
    }
    // Only ASCII-delimited regions were removed, at ASCII boundaries.
    String::from_utf8_lossy(&out).into_owned()
}

/// Remove commas whose next non-whitespace character closes an object or
/// array, again leaving string literals alone.
fn strip_trailing_commas(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            out.push(c);
            if c == b'\\' && i + 1 < bytes.len() {
                out.push(bytes[i + 1]);
                i += 2;
                continue;
            }
            if c == b'"' {
                in_string = false;
            }
            i += 1;
        } else if c == b'"' {
            in_string = true;
            out.push(c);
            i += 1;
        } else if c == b',' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if !matches!(bytes.get(j), Some(&b'}') | Some(&b']')) {
                out.push(c);
            }
            i += 1;
        } else {
            out.push(c);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Strict JSON backstop when the relaxed loader cannot be installed.
pub struct StrictJsonLoader;

impl StrictJsonLoader {
    pub fn install() -> Result<Arc<dyn ModuleLoader>> {
        Ok(Arc::new(Self))
    }
}

impl ModuleLoader for StrictJsonLoader {
    fn name(&self) -> &'static str {
        "strict-json"
    }

    fn load_value(&self, source: &str) -> Result<Value> {
        Ok(serde_json::from_str(source)?)
    }
}

/// Install the default loader set: relaxed first, strict as backstop. Only
/// when every mechanism fails does registration error, carrying both
/// causes.
fn default_loaders() -> Result<Vec<Arc<dyn ModuleLoader>>> {
    match RelaxedJsonLoader::install() {
        Ok(primary) => Ok(vec![primary, StrictJsonLoader::install()?]),
        Err(primary_err) => match StrictJsonLoader::install() {
            Ok(fallback) => {
                warn!(target: "bdui::loader", error = %primary_err, "primary loader unavailable, using strict JSON only");
                Ok(vec![fallback])
            }
            Err(fallback_err) => Err(BdUiError::Bootstrap {
                primary: primary_err.to_string(),
                fallback: fallback_err.to_string(),
            }),
        },
    }
}

static REGISTRY: OnceLock<LoaderRegistry> = OnceLock::new();

pub fn global() -> &'static LoaderRegistry {
    REGISTRY.get_or_init(LoaderRegistry::new)
}

/// Idempotent process-wide bootstrap; safe to call from every entry point
/// (CLI, programmatic API, runner plugin) and from concurrent scenarios.
pub fn register_loaders() -> Result<()> {
    global().register_with(default_loaders)
}
