//! Test execution coordinator
//!
//! The engine's public face: runs one test, a sequence, or many tests
//! across a bounded pool of shard workers, and owns global configuration
//! and the running-process registry.

use futures::future::join_all;
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{error, info, warn};

use super::process;
use super::registry::ProcessRegistry;
use super::OutputCallback;
use crate::models::{ExecutionResult, TestSpec};

type ResultSlots = Arc<Mutex<Vec<Option<ExecutionResult>>>>;

/// Engine-wide execution settings, read by every spawn
#[derive(Clone)]
pub struct ExecutorConfig {
    /// Default timeout applied when a test carries none
    pub global_timeout: Duration,
    /// Whether `execute_tests_parallel` may actually fan out
    pub parallel_enabled: bool,
    /// Upper bound on concurrent shard workers
    pub max_parallel: usize,
    /// Working directory for spawned tests
    pub working_dir: Option<PathBuf>,
    /// Environment overlaid on the parent's; override wins
    pub env_overrides: HashMap<String, String>,
    /// Whether stdout/stderr are captured through pipes
    pub capture_output: bool,
    /// Invoked with (test name, combined chunk) as output arrives
    pub output_callback: Option<OutputCallback>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            global_timeout: Duration::from_secs(30),
            parallel_enabled: true,
            max_parallel: 4,
            working_dir: None,
            env_overrides: HashMap::new(),
            capture_output: true,
            output_callback: None,
        }
    }
}

/// Test execution engine.
///
/// Every failure mode is captured into the returned records; the public
/// methods never fail except by returning records tagged `SystemError`.
pub struct TestExecutor {
    inner: ExecutorInner,
}

/// Shared state cloned into shard workers
#[derive(Clone)]
struct ExecutorInner {
    config: ExecutorConfig,
    registry: ProcessRegistry,
    shutdown: Arc<AtomicBool>,
}

impl TestExecutor {
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            inner: ExecutorInner {
                config,
                registry: ProcessRegistry::new(),
                shutdown: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Set the default timeout for tests that carry none
    pub fn set_global_timeout(&mut self, timeout: Duration) {
        self.inner.config.global_timeout = timeout;
    }

    /// Enable or disable parallel execution
    pub fn enable_parallel_execution(&mut self, enable: bool) {
        self.inner.config.parallel_enabled = enable;
    }

    /// Set the maximum number of concurrent shard workers
    pub fn set_max_parallel(&mut self, max_parallel: usize) {
        self.inner.config.max_parallel = max_parallel.max(1);
    }

    pub fn max_parallel(&self) -> usize {
        self.inner.config.max_parallel
    }

    /// Set the working directory for spawned tests
    pub fn set_working_directory(&mut self, dir: impl Into<PathBuf>) {
        self.inner.config.working_dir = Some(dir.into());
    }

    /// Replace the environment override map
    pub fn set_environment_variables(&mut self, env: HashMap<String, String>) {
        self.inner.config.env_overrides = env;
    }

    /// Add one environment override
    pub fn add_environment_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner
            .config
            .env_overrides
            .insert(name.into(), value.into());
    }

    /// Set the streaming-output callback
    pub fn set_output_callback(&mut self, callback: OutputCallback) {
        self.inner.config.output_callback = Some(callback);
    }

    /// Enable or disable output capture
    pub fn enable_output_capture(&mut self, capture: bool) {
        self.inner.config.capture_output = capture;
    }

    /// Execute a single test
    pub async fn execute_test(&self, test: &TestSpec) -> ExecutionResult {
        self.inner.execute_single(test).await
    }

    /// Execute tests strictly sequentially, in list order.
    ///
    /// Once shutdown has been requested, each remaining test is recorded
    /// as cancelled rather than silently omitted.
    pub async fn execute_tests(&self, tests: &[TestSpec]) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(tests.len());

        for test in tests {
            if self.inner.shutdown.load(Ordering::SeqCst) {
                results.push(ExecutionResult::cancelled(&test.name));
                continue;
            }
            results.push(self.inner.execute_single(test).await);
        }

        results
    }

    /// Execute tests across a bounded pool of shard workers.
    ///
    /// The list is partitioned into contiguous near-equal shards, one
    /// worker per shard, each running its shard sequentially. Results land
    /// at their original index regardless of completion order. Falls back
    /// to the sequential path when parallelism is disabled or
    /// `max_workers <= 1`.
    pub async fn execute_tests_parallel(
        &self,
        tests: &[TestSpec],
        max_workers: usize,
    ) -> Vec<ExecutionResult> {
        if !self.inner.config.parallel_enabled || max_workers <= 1 {
            return self.execute_tests(tests).await;
        }
        if tests.is_empty() {
            return Vec::new();
        }

        let worker_count = max_workers.min(tests.len());
        let results: ResultSlots = Arc::new(Mutex::new(vec![None; tests.len()]));

        let mut workers = Vec::with_capacity(worker_count);
        let mut start_index = 0;

        for count in shard_counts(tests.len(), worker_count) {
            let shard = tests[start_index..start_index + count].to_vec();
            let inner = self.inner.clone();
            let results = Arc::clone(&results);

            workers.push(tokio::spawn(async move {
                inner.run_shard(shard, start_index, results).await;
            }));

            start_index += count;
        }

        join_all(workers).await;

        let slots = std::mem::take(&mut *lock_slots(&results));
        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.unwrap_or_else(|| ExecutionResult::cancelled(&tests[i].name)))
            .collect()
    }

    /// Request shutdown and forcefully terminate every registered process.
    ///
    /// Prevents new tests from starting; a test already inside its wait
    /// loop is killed and classified by its own supervisor. Safe to call
    /// repeatedly and with nothing running.
    pub fn terminate_all(&self) {
        self.inner.terminate_all();
    }

    pub fn has_running_tests(&self) -> bool {
        self.inner.registry.has_running()
    }

    pub fn running_test_count(&self) -> usize {
        self.inner.registry.count()
    }

    pub fn running_test_names(&self) -> Vec<String> {
        self.inner.registry.names()
    }
}

impl Default for TestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestExecutor {
    fn drop(&mut self) {
        self.inner.terminate_all();
    }
}

impl ExecutorInner {
    /// Validate, spawn, supervise, and sweep for one test
    async fn execute_single(&self, test: &TestSpec) -> ExecutionResult {
        if let Err(message) = validate_executable(&test.executable) {
            return ExecutionResult::build_error(&test.name, message);
        }

        let timeout = test.effective_timeout(self.config.global_timeout);
        info!("Running {} ({}ms timeout)", test.name, timeout.as_millis());

        let mut handle = match process::spawn_process(
            &test.executable,
            &test.name,
            timeout,
            self.config.working_dir.as_deref(),
            &self.config.env_overrides,
            self.config.capture_output,
        ) {
            Ok(handle) => handle,
            Err(e) => {
                error!("{}: {e}", test.name);
                return ExecutionResult::system_error(&test.name, e.to_string());
            }
        };

        self.registry
            .register(&test.name, handle.pid, handle.running.clone());

        let result =
            process::wait_for_process(&mut handle, self.config.output_callback.as_deref()).await;

        self.registry.sweep();
        info!("  {result}");

        result
    }

    /// Run one contiguous shard sequentially, writing each result at its
    /// original index
    async fn run_shard(&self, shard: Vec<TestSpec>, start_index: usize, results: ResultSlots) {
        for (offset, test) in shard.iter().enumerate() {
            let result = if self.shutdown.load(Ordering::SeqCst) {
                ExecutionResult::cancelled(&test.name)
            } else {
                self.execute_single(test).await
            };

            // Lock held only for the single index write
            lock_slots(&results)[start_index + offset] = Some(result);
        }
    }

    fn terminate_all(&self) {
        self.shutdown.store(true, Ordering::SeqCst);

        for entry in self.registry.drain() {
            if entry.running.load(Ordering::SeqCst) {
                warn!(
                    "Forcefully terminating {} (pid {})",
                    entry.test_name, entry.pid
                );
                process::kill_pid(entry.pid);
            }
        }
    }
}

fn lock_slots(results: &ResultSlots) -> MutexGuard<'_, Vec<Option<ExecutionResult>>> {
    results.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Contiguous near-equal shard sizes; earlier shards absorb the remainder
fn shard_counts(total: usize, workers: usize) -> Vec<usize> {
    let per_worker = total / workers;
    let remainder = total % workers;
    (0..workers)
        .map(|i| per_worker + usize::from(i < remainder))
        .collect()
}

/// Check the target before ever spawning: it must exist as a regular file
/// and carry the owner execute bit
fn validate_executable(path: &Path) -> Result<(), String> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(_) => return Err(format!("Test executable not found: {}", path.display())),
    };

    if !metadata.is_file() || metadata.permissions().mode() & 0o100 == 0 {
        return Err(format!("Test file is not executable: {}", path.display()));
    }

    Ok(())
}
