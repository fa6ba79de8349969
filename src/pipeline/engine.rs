//! pdfium engine lifecycle: explicit, idempotent initialisation.
//!
//! pdfium keeps process-wide state behind its C API, so "is the library
//! available" is a question best answered exactly once. [`initialize`] probes
//! the binding behind a `OnceCell` guard; every later call returns the cached
//! result instantly. The per-run [`bind`] then creates a fresh binding inside
//! the blocking task that owns the render pass — no rendering state is shared
//! across concurrent documents.
//!
//! Library resolution order: `PDFIUM_LIB_PATH` (a directory containing the
//! shared library), the executable's own directory, then the system library
//! path.

use crate::error::PipelineError;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use tracing::debug;

static ENGINE_PROBED: OnceCell<()> = OnceCell::new();

/// Verify once that a pdfium library can be bound.
///
/// Safe to call from multiple threads; later calls are no-ops. The pipeline
/// calls this lazily before the first render, but callers that want startup
/// failures surfaced early (e.g. a server's boot sequence) can invoke it
/// themselves.
pub fn initialize() -> Result<(), PipelineError> {
    ENGINE_PROBED
        .get_or_try_init(|| {
            let _ = bind()?;
            debug!("pdfium engine bound successfully");
            Ok(())
        })
        .copied()
}

/// Create a pdfium binding for one run.
///
/// Called inside `spawn_blocking`; each pipeline invocation owns its binding
/// (and the documents opened through it) exclusively.
pub(crate) fn bind() -> Result<Pdfium, PipelineError> {
    let bindings = if let Ok(dir) = std::env::var("PDFIUM_LIB_PATH") {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
    } else {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
    };

    bindings
        .map(Pdfium::new)
        .map_err(|e| PipelineError::EngineBinding(format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_is_idempotent() {
        // Whatever the first probe returned, the second call must agree and
        // must not re-probe (OnceCell caches the success case; a failure on
        // a machine without pdfium re-probes, which is also fine here).
        let first = initialize().is_ok();
        let second = initialize().is_ok();
        if first {
            assert!(second);
        }
    }
}
