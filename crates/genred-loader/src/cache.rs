//! Process-wide routine cache
//!
//! Resolves a (aliases, formula, precision) request to a callable
//! [`RoutineSet`]:
//!
//! 1. in-memory lookup (read lock only)
//! 2. load an already-built binary from the build directory
//! 3. compile, then load once more
//!
//! Concurrent requests for the same key wait on a per-key gate so that the
//! external compiler runs at most once per key, and never twice at the same
//! time even when builds fail. Requests for different keys do not block each
//! other while compiling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::{Mutex, RwLock};

use crate::backend::Backend;
use crate::compiler::{CmakeCompiler, RoutineCompiler};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::key::{RoutineKey, RoutineRequest};
use crate::library::{DylibLoader, RoutineLoader};
use crate::precision::Precision;
use crate::routine::RoutineSet;

static GLOBAL_CACHE: LazyLock<Arc<RoutineCache>> =
    LazyLock::new(|| Arc::new(RoutineCache::from_config(&LoaderConfig::from_env())));

/// The process-wide cache, configured from the environment on first use
pub fn global_cache() -> Arc<RoutineCache> {
    Arc::clone(&GLOBAL_CACHE)
}

/// Counters describing how requests were served
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from memory
    pub hits: u64,
    /// Opened from the build directory
    pub loads: u64,
    /// Required a compiler run
    pub compilations: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    loads: AtomicU64,
    compilations: AtomicU64,
}

/// Memoizes routine sets by content key
pub struct RoutineCache {
    loader: Box<dyn RoutineLoader>,
    compiler: Box<dyn RoutineCompiler>,
    routines: RwLock<HashMap<RoutineKey, Arc<RoutineSet>>>,
    in_flight: Mutex<HashMap<RoutineKey, Arc<Mutex<()>>>>,
    counters: Counters,
}

impl RoutineCache {
    pub fn new(loader: Box<dyn RoutineLoader>, compiler: Box<dyn RoutineCompiler>) -> Self {
        Self {
            loader,
            compiler,
            routines: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Dynamic-library loader and CMake compiler sharing one build directory
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self::new(
            Box::new(DylibLoader::new(config.build_dir.clone())),
            Box::new(CmakeCompiler::from_config(config)),
        )
    }

    /// Get the routine set for a formula, building it if needed
    pub fn acquire<S: AsRef<str>>(&self, aliases: &[S], formula: &str, precision: Precision) -> Result<Arc<RoutineSet>> {
        self.acquire_request(&RoutineRequest::new(aliases, formula, precision))
    }

    /// Like [`acquire`](Self::acquire), also checking that `backend` is served
    pub fn acquire_for<S: AsRef<str>>(
        &self,
        aliases: &[S],
        formula: &str,
        precision: Precision,
        backend: Backend,
    ) -> Result<Arc<RoutineSet>> {
        let routines = self.acquire(aliases, formula, precision)?;
        routines.ensure_available(backend)?;
        Ok(routines)
    }

    #[tracing::instrument(skip_all, fields(routine = request.key().name()))]
    pub fn acquire_request(&self, request: &RoutineRequest) -> Result<Arc<RoutineSet>> {
        if let Some(routines) = self.lookup(request.key()) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(routines);
        }

        let gate = {
            let mut in_flight = self.in_flight.lock();
            Arc::clone(in_flight.entry(request.key().clone()).or_default())
        };
        let _building = gate.lock();

        // Another thread may have finished while we waited on the gate
        if let Some(routines) = self.lookup(request.key()) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(routines);
        }

        let outcome = self.load_or_build(request);

        if let Ok(routines) = &outcome {
            self.routines
                .write()
                .entry(request.key().clone())
                .or_insert_with(|| Arc::clone(routines));

            // A failed key keeps its gate so later retries stay serialized
            let mut in_flight = self.in_flight.lock();
            if in_flight
                .get(request.key())
                .is_some_and(|current| Arc::ptr_eq(current, &gate))
            {
                in_flight.remove(request.key());
            }
        }

        outcome
    }

    fn lookup(&self, key: &RoutineKey) -> Option<Arc<RoutineSet>> {
        self.routines.read().get(key).map(Arc::clone)
    }

    fn load_or_build(&self, request: &RoutineRequest) -> Result<Arc<RoutineSet>> {
        if let Some(routines) = self.loader.open(request)? {
            self.counters.loads.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::new(routines));
        }

        tracing::info!(formula = request.formula(), "routine not built yet, compiling");
        self.compiler.compile(request)?;
        self.counters.compilations.fetch_add(1, Ordering::Relaxed);

        match self.loader.open(request)? {
            Some(routines) => {
                self.counters.loads.fetch_add(1, Ordering::Relaxed);
                Ok(Arc::new(routines))
            }
            None => Err(LoaderError::build(
                request.key().name(),
                "compiler reported success but no routine binary was found",
            )),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            compilations: self.counters.compilations.load(Ordering::Relaxed),
        }
    }

    /// Number of routine sets held in memory
    pub fn len(&self) -> usize {
        self.routines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RoutineCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutineCache")
            .field("routines", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
