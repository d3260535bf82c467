//! Loader configuration
//!
//! Defaults can be overridden through the environment:
//!
//! - `GENRED_BUILD_DIR`: where compiled routines and manifests are stored
//! - `GENRED_SOURCE_DIR`: CMake project that compiles a formula
//! - `GENRED_CMAKE` / `GENRED_MAKE`: build tool executables
//! - `GENRED_MAKE_TARGET`: make target producing the routine library

use std::env;
use std::path::PathBuf;

/// Settings for locating and building routine binaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub build_dir: PathBuf,
    pub source_dir: PathBuf,
    pub cmake_program: String,
    pub make_program: String,
    pub make_target: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            build_dir: default_build_dir(),
            source_dir: PathBuf::from("."),
            cmake_program: "cmake".to_string(),
            make_program: "make".to_string(),
            make_target: "genred".to_string(),
        }
    }
}

impl LoaderConfig {
    /// Defaults overridden by `GENRED_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = non_empty_var("GENRED_BUILD_DIR") {
            config.build_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty_var("GENRED_SOURCE_DIR") {
            config.source_dir = PathBuf::from(dir);
        }
        if let Some(program) = non_empty_var("GENRED_CMAKE") {
            config.cmake_program = program;
        }
        if let Some(program) = non_empty_var("GENRED_MAKE") {
            config.make_program = program;
        }
        if let Some(target) = non_empty_var("GENRED_MAKE_TARGET") {
            config.make_target = target;
        }

        config
    }

    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    pub fn with_source_dir(mut self, source_dir: impl Into<PathBuf>) -> Self {
        self.source_dir = source_dir.into();
        self
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Platform cache directory, or the temp dir when none is known
fn default_build_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "genred")
        .map(|dirs| dirs.cache_dir().join("build"))
        .unwrap_or_else(|| env::temp_dir().join("genred").join("build"))
}
