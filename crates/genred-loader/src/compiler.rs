//! Invoking the external formula compiler
//!
//! The compiler itself lives outside this crate. It is a CMake project that
//! receives the formula and its aliases as cache variables and produces one
//! shared library per routine.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::key::RoutineRequest;
use crate::precision::Precision;

/// Produces the binary for a routine request
pub trait RoutineCompiler: Send + Sync {
    /// Build synchronously; on success the binary must exist where the
    /// matching [`crate::RoutineLoader`] looks for it.
    fn compile(&self, request: &RoutineRequest) -> Result<()>;
}

/// Metadata written next to each compiled routine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub routine: String,
    pub formula: String,
    pub aliases: Vec<String>,
    pub precision: Precision,
    pub genred_version: String,
}

impl BuildManifest {
    pub fn for_request(request: &RoutineRequest) -> Self {
        Self {
            routine: request.key().name().to_string(),
            formula: request.formula().to_string(),
            aliases: request.aliases().to_vec(),
            precision: request.precision(),
            genred_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Read a manifest back from the build directory
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| LoaderError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| LoaderError::io(path, std::io::Error::other(e)))
    }

    fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| LoaderError::io(path, std::io::Error::other(e)))?;
        std::fs::write(path, json).map_err(|e| LoaderError::io(path, e))
    }
}

/// Runs `cmake` then `make` in the build directory
#[derive(Debug, Clone)]
pub struct CmakeCompiler {
    source_dir: PathBuf,
    build_dir: PathBuf,
    cmake_program: String,
    make_program: String,
    make_target: String,
}

impl CmakeCompiler {
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            source_dir: config.source_dir.clone(),
            build_dir: config.build_dir.clone(),
            cmake_program: config.cmake_program.clone(),
            make_program: config.make_program.clone(),
            make_target: config.make_target.clone(),
        }
    }

    /// Configure-step arguments for one request
    pub fn cmake_args(&self, request: &RoutineRequest) -> Vec<String> {
        let alias_string = request
            .aliases()
            .iter()
            .map(|alias| format!("auto {alias}; "))
            .collect::<Vec<_>>()
            .join("\n");

        vec![
            self.source_dir.display().to_string(),
            "-DPYTHON_LIB=TRUE".to_string(),
            "-DUSENEWSYNTAX=TRUE".to_string(),
            format!("-DFORMULA_OBJ={}", request.formula()),
            format!("-DVAR_ALIASES={alias_string}"),
            format!("-Dshared_obj_name={}", request.key().name()),
            format!("-D__TYPE__={}", request.precision().type_name()),
        ]
    }

    fn run_step(&self, request: &RoutineRequest, mut command: Command) -> Result<()> {
        let rendered = format!("{command:?}");
        tracing::debug!(command = %rendered, "running build step");

        let output = command
            .current_dir(&self.build_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| LoaderError::build(request.key().name(), format!("could not run {rendered}: {e}")))?;

        if !output.status.success() {
            return Err(LoaderError::build(
                request.key().name(),
                format!(
                    "{rendered} exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(())
    }
}

impl RoutineCompiler for CmakeCompiler {
    #[tracing::instrument(skip_all, fields(routine = request.key().name(), precision = %request.precision()))]
    fn compile(&self, request: &RoutineRequest) -> Result<()> {
        let start = Instant::now();
        std::fs::create_dir_all(&self.build_dir).map_err(|e| LoaderError::io(&self.build_dir, e))?;

        tracing::info!(
            formula = request.formula(),
            aliases = %request.aliases().join("; "),
            "compiling formula"
        );

        let mut configure = Command::new(&self.cmake_program);
        configure.args(self.cmake_args(request));
        self.run_step(request, configure)?;

        let mut build = Command::new(&self.make_program);
        build.arg(&self.make_target);
        self.run_step(request, build)?;

        let library = self.build_dir.join(request.key().library_file_name());
        if !library.is_file() {
            return Err(LoaderError::build(
                request.key().name(),
                format!("build finished but {} was not produced", library.display()),
            ));
        }

        let manifest_path = self.build_dir.join(request.key().manifest_file_name());
        if let Err(e) = BuildManifest::for_request(request).write(&manifest_path) {
            tracing::warn!(error = %e, "could not write routine manifest");
        }

        genred_tracing::performance::record_compilation(request.key().name(), start.elapsed().as_micros() as u64);
        Ok(())
    }
}
