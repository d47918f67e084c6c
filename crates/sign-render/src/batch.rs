//! Chunked, multithreaded batch export
//!
//! A batch is split into chunks whose size shrinks with the artifact size.
//! Every chunk builds its own [`TemplateArena`], renders its tasks on a
//! rayon pool and drops the arena before the next chunk starts. Workers
//! send `(id, result)` messages to the calling thread, which owns all
//! result lists and invokes the progress callback.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::artifact::RenderTask;
use crate::cache::{TemplateArena, graphic_key, text_key};
use crate::constants::{
    DEFAULT_CHUNK_MULTIPLIER, DEFAULT_THREADS, LARGE_ARTIFACT_THRESHOLD_MM,
    PARALLEL_OVERHEAD_FACTOR, VERY_LARGE_ARTIFACT_THRESHOLD_MM,
};
use crate::render::{ArtifactRenderer, normalize};
use crate::stats::calculate_statistics;
use crate::types::{BatchStatistics, RenderError, Result, StageTimings};

/// Tasks per chunk for artifacts whose largest side is `max_mm`
pub fn chunk_size_for(max_mm: f32, threads: usize) -> usize {
    let multiplier = if max_mm > VERY_LARGE_ARTIFACT_THRESHOLD_MM {
        1
    } else if max_mm > LARGE_ARTIFACT_THRESHOLD_MM {
        2
    } else {
        DEFAULT_CHUNK_MULTIPLIER
    };
    threads.max(1) * multiplier
}

/// Worker count used when the caller does not choose one
pub fn default_threads() -> usize {
    num_cpus::get().clamp(1, DEFAULT_THREADS)
}

/// Ordered list of tasks plus scheduling parameters
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub tasks: Vec<RenderTask>,
    pub threads: usize,
    /// Fixed chunk size; derived from the largest artifact when `None`
    pub chunk_size: Option<usize>,
    pub output_dir: PathBuf,
}

impl BatchJob {
    pub fn new(tasks: Vec<RenderTask>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            tasks,
            threads: default_threads(),
            chunk_size: None,
            output_dir: output_dir.into(),
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn effective_chunk_size(&self) -> usize {
        let derived = || {
            let max_mm = self
                .tasks
                .iter()
                .map(|t| t.spec.max_finished_mm())
                .fold(0.0, f32::max);
            chunk_size_for(max_mm, self.threads)
        };
        self.chunk_size.unwrap_or_else(derived).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(RenderError::Config(
                "At least one worker thread is required".to_string(),
            ));
        }
        if self.chunk_size == Some(0) {
            return Err(RenderError::Config("Chunk size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Progress of a running batch, reported after every finished task
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress<'a> {
    pub completed: usize,
    pub total: usize,
    pub id: &'a str,
    pub ok: bool,
}

/// Templates built for one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSummary {
    pub index: usize,
    pub tasks: usize,
    pub text_templates: usize,
    pub graphic_templates: usize,
}

/// Outcome of a batch: written files, failed tasks and statistics
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub successes: Vec<PathBuf>,
    /// `(artifact id, message)` of every failed task
    pub errors: Vec<(String, String)>,
    pub chunks: Vec<ChunkSummary>,
    pub stats: BatchStatistics,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Findings of a pre-flight pass over a job
#[derive(Debug, Default)]
pub struct PreflightReport {
    pub warnings: Vec<(String, String)>,
    pub errors: Vec<(String, RenderError)>,
}

impl PreflightReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs batch jobs with a shared renderer
#[derive(Clone)]
pub struct BatchRunner {
    renderer: Arc<ArtifactRenderer>,
}

impl BatchRunner {
    pub fn new(renderer: ArtifactRenderer) -> Self {
        Self {
            renderer: Arc::new(renderer),
        }
    }

    pub fn renderer(&self) -> &ArtifactRenderer {
        &self.renderer
    }

    /// Pre-flight every task of `job` without rendering anything
    pub fn check(&self, job: &BatchJob) -> PreflightReport {
        let mut report = PreflightReport::default();
        for task in &job.tasks {
            match self.renderer.preflight(task) {
                Ok(warnings) => report
                    .warnings
                    .extend(warnings.into_iter().map(|w| (task.id.clone(), w))),
                Err(e) => report.errors.push((task.id.clone(), e)),
            }
        }
        report
    }

    /// Run `job` to completion.
    ///
    /// Per-task failures, including failed pre-flight checks, end up in the
    /// error list. Only invalid jobs and thread-pool failures abort the run.
    pub fn run(
        &self,
        job: &BatchJob,
        progress: &mut dyn FnMut(BatchProgress<'_>),
    ) -> Result<BatchReport> {
        job.validate()?;
        let pool = build_pool(job.threads)?;

        let started = Instant::now();
        let total = job.tasks.len();
        let chunk_size = job.effective_chunk_size();
        info!(
            "Rendering {} artifacts with {} threads in chunks of {}",
            total, job.threads, chunk_size
        );

        let mut report = BatchReport::default();
        let mut timings = Vec::with_capacity(total);
        let mut completed = 0;

        let mut scheduled = Vec::with_capacity(total);
        for task in &job.tasks {
            match self.renderer.preflight(task) {
                Ok(warnings) => {
                    for warning in warnings {
                        warn!("{}: {}", task.id, warning);
                    }
                    scheduled.push(normalize(task));
                }
                Err(e) => {
                    warn!("{}: {}", task.id, e);
                    report.errors.push((task.id.clone(), e.to_string()));
                    completed += 1;
                    progress(BatchProgress {
                        completed,
                        total,
                        id: &task.id,
                        ok: false,
                    });
                }
            }
        }

        for (index, chunk) in scheduled.chunks(chunk_size).enumerate() {
            let arena = self.build_arena(&pool, chunk);
            let summary = ChunkSummary {
                index,
                tasks: chunk.len(),
                text_templates: arena.text_count(),
                graphic_templates: arena.graphic_count(),
            };
            info!(
                "Chunk {}: {} tasks, {} text and {} graphic templates ({} KiB)",
                index + 1,
                summary.tasks,
                summary.text_templates,
                summary.graphic_templates,
                arena.byte_size() / 1024
            );

            let (tx, rx) = mpsc::channel::<(String, Result<(PathBuf, StageTimings)>)>();
            pool.in_place_scope(|scope| {
                for task in chunk {
                    let tx = tx.clone();
                    let arena = &arena;
                    let renderer = &*self.renderer;
                    let output_dir = job.output_dir.as_path();
                    scope.spawn(move |_| {
                        let result = renderer.render_to_file(task, Some(arena), output_dir);
                        // The receiver lives until every worker of the chunk is done
                        let _ = tx.send((task.id.clone(), result));
                    });
                }
                drop(tx);

                for (id, result) in rx {
                    completed += 1;
                    let ok = result.is_ok();
                    match result {
                        Ok((path, stage)) => {
                            debug!("{} -> {}", id, path.display());
                            report.successes.push(path);
                            timings.push(stage);
                        }
                        Err(e) => {
                            warn!("{} failed: {}", id, e);
                            report.errors.push((id.clone(), e.to_string()));
                        }
                    }
                    progress(BatchProgress {
                        completed,
                        total,
                        id: &id,
                        ok,
                    });
                }
            });
            drop(arena);
            report.chunks.push(summary);
        }

        let ids: Vec<&str> = job.tasks.iter().map(|t| t.id.as_str()).collect();
        report.stats = calculate_statistics(
            &ids,
            report.successes.len(),
            report.errors.len(),
            &timings,
            report.chunks.len(),
            started.elapsed(),
        );
        info!(
            "Batch finished: {} written, {} failed in {}",
            report.stats.succeeded,
            report.stats.failed,
            format_duration(started.elapsed())
        );
        Ok(report)
    }

    /// Run `job` on a blocking thread
    pub async fn run_async<F>(&self, job: BatchJob, mut progress: F) -> Result<BatchReport>
    where
        F: FnMut(BatchProgress<'_>) + Send + 'static,
    {
        let runner = self.clone();
        tokio::task::spawn_blocking(move || runner.run(&job, &mut progress)).await?
    }

    /// Build the shared templates of `tasks` up front.
    ///
    /// Used by callers that render sequentially but still want one
    /// rasterization per distinct template.
    pub fn prepare_templates(&self, tasks: &[RenderTask], threads: usize) -> Result<TemplateArena> {
        let pool = build_pool(threads.max(1))?;
        let normalized: Vec<_> = tasks.iter().map(normalize).collect();
        Ok(self.build_arena(&pool, &normalized))
    }

    /// Render the templates shared within `chunk`, one per distinct key.
    ///
    /// A template that fails to build is skipped; its tasks render fresh.
    fn build_arena(&self, pool: &rayon::ThreadPool, chunk: &[Cow<'_, RenderTask>]) -> TemplateArena {
        let mut text_jobs: HashMap<String, &RenderTask> = HashMap::new();
        let mut graphic_jobs: HashMap<String, &RenderTask> = HashMap::new();
        for task in chunk {
            if let Some(key) = text_key(task) {
                text_jobs.entry(key).or_insert(&**task);
            }
            if let Some(key) = graphic_key(task) {
                graphic_jobs.entry(key).or_insert(&**task);
            }
        }

        let renderer = &*self.renderer;
        let (texts, graphics) = pool.install(|| {
            let texts: Vec<_> = text_jobs
                .into_par_iter()
                .map(|(key, task)| (key, renderer.render_text_layer(task)))
                .collect();
            let graphics: Vec<_> = graphic_jobs
                .into_par_iter()
                .map(|(key, task)| (key, renderer.render_graphic(task)))
                .collect();
            (texts, graphics)
        });

        let mut arena = TemplateArena::new();
        for (key, result) in texts {
            match result {
                Ok(Some(pixmap)) => {
                    arena.insert_text(key, pixmap);
                }
                Ok(None) => {}
                Err(e) => warn!("Text template {} not cached: {}", key, e),
            }
        }
        for (key, result) in graphics {
            match result {
                Ok(Some(pixmap)) => {
                    arena.insert_graphic(key, pixmap);
                }
                Ok(None) => {}
                Err(e) => warn!("Graphic template {} not cached: {}", key, e),
            }
        }
        arena
    }
}

fn build_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("tzg-render-{i}"))
        .build()
        .map_err(|e| RenderError::ThreadPool(e.to_string()))
}

/// Expected wall-clock time of `task_count` tasks on `threads` workers
pub fn estimate_duration(task_count: usize, avg_seconds_per_task: f64, threads: usize) -> Duration {
    let sequential = task_count as f64 * avg_seconds_per_task.max(0.0);
    let parallel = sequential / threads.max(1) as f64 * PARALLEL_OVERHEAD_FACTOR;
    Duration::from_secs_f64(parallel)
}

/// Format a duration as `"Xm Ys"`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}m {}s", secs / 60, secs % 60)
}
