//! Process-wide value function table.
//!
//! The table is fixed once per process. Hosts that embed the engine install
//! its table (directly or through [`load_library`]) before creating values;
//! otherwise the first value creation falls back to the in-process engine.

use sciter_sys::{ValueApi, ValueApiEntry};
use std::path::Path;
use std::ptr;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::error::{SciterError, SciterResult};

static API: OnceLock<&'static ValueApi> = OnceLock::new();

/// Default name of the exported table entry point
pub const DEFAULT_API_SYMBOL: &str = "SciterValueAPI";

/// The installed table, falling back to the in-process engine
pub fn current() -> &'static ValueApi {
    API.get_or_init(|| {
        debug!("no value API installed, using the in-process engine");
        sciter_engine::api()
    })
}

/// Check whether a table has been fixed yet
pub fn is_installed() -> bool {
    API.get().is_some()
}

/// Install `table` for the whole process.
///
/// Installing the same table again is a no-op. Fails with
/// [`SciterError::ApiAlreadyInstalled`] once a different table is in use.
pub fn install(table: &'static ValueApi) -> SciterResult<()> {
    let installed = *API.get_or_init(|| table);
    if ptr::eq(installed, table) {
        info!(table = ?ptr::from_ref(table), "value API installed");
        Ok(())
    } else {
        Err(SciterError::ApiAlreadyInstalled)
    }
}

/// Load the engine library at `path` and install the table it exports.
///
/// `symbol` names an `extern "C" fn() -> *const ValueApi` entry point. The
/// library stays loaded for the rest of the process.
pub fn load_library(path: impl AsRef<Path>, symbol: &str) -> SciterResult<&'static ValueApi> {
    let path = path.as_ref();
    debug!(path = %path.display(), symbol, "loading engine library");

    // SAFETY: loading a library runs its initializers; the caller vouches for it
    let library = unsafe { libloading::Library::new(path) }
        .map_err(|e| SciterError::Library(format!("{}: {e}", path.display())))?;

    // SAFETY: the symbol is declared with the entry point signature
    let entry: ValueApiEntry = unsafe {
        *library
            .get::<ValueApiEntry>(symbol.as_bytes())
            .map_err(|e| SciterError::Library(format!("{symbol}: {e}")))?
    };

    // SAFETY: entry comes from the library loaded above
    let table = unsafe { entry() };
    if table.is_null() {
        return Err(SciterError::Library(format!("{symbol} returned null")));
    }

    // the table points into the library, so it must never be unloaded
    std::mem::forget(library);

    // SAFETY: non-null and valid for the rest of the process
    let table: &'static ValueApi = unsafe { &*table };
    install(table)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library() {
        let err = load_library("/nonexistent/libsciter-missing.so", DEFAULT_API_SYMBOL).unwrap_err();
        assert!(matches!(err, SciterError::Library(_)));
        assert!(err.to_string().contains("libsciter-missing"));
    }

    #[test]
    fn test_builtin_table_is_stable() {
        let first = current();
        assert!(is_installed());
        assert!(ptr::eq(first, current()));
        // reinstalling the active table is fine
        install(first).unwrap();
    }
}
