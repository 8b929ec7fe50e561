//! Pipeline coordinator
//!
//! Runs the sync stages strictly in order over one [`PipelineContext`]:
//!
//! `Init → ListRemoteFolders → ListRemoteFiles → ScanLocal → FilterByPattern
//! → Hash → MapFolders → ClassifyFiles → DeleteOrphans → Upload → Done`
//!
//! A stage either continues, stops the run with the "nothing to do" outcome
//! (not an error), or fails. The first failure aborts the remaining stages.
//! The remote session is closed in every case before the run returns.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use cdsync_core::config::Config;
use cdsync_core::domain::{LocalTree, RemoteNode, RemoteTree, SyncPlan};
use cdsync_core::ports::IRemoteStore;

use crate::hasher::ContentHasher;
use crate::lister::{list_files, list_folders};
use crate::reconciler::{classify_files, map_folders};
use crate::scanner::Scanner;
use crate::transfer::{delete_nodes, upload_files, TransferOptions};
use crate::SyncError;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Init,
    ListRemoteFolders,
    ListRemoteFiles,
    ScanLocal,
    FilterByPattern,
    Hash,
    MapFolders,
    ClassifyFiles,
    DeleteOrphans,
    Upload,
    Done,
}

impl Stage {
    /// Stages that do work; `Done` only marks the end
    pub const SEQUENCE: [Stage; 10] = [
        Stage::Init,
        Stage::ListRemoteFolders,
        Stage::ListRemoteFiles,
        Stage::ScanLocal,
        Stage::FilterByPattern,
        Stage::Hash,
        Stage::MapFolders,
        Stage::ClassifyFiles,
        Stage::DeleteOrphans,
        Stage::Upload,
    ];
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a stage tells the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Hand the context to the next stage
    Continue,
    /// Stop early; the run succeeded with nothing left to do
    NothingToDo,
}

/// How a successful run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Every stage ran
    Completed,
    /// Stopped early: no matching local files, or nothing to upload
    NothingToDo,
}

/// Counters collected during a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub remote_folders: usize,
    pub remote_files: usize,
    pub files_scanned: usize,
    pub files_matched: usize,
    pub total_size: u64,
    pub files_hashed: usize,
    pub folders_matched: usize,
    pub folders_created: usize,
    pub folders_planned: usize,
    pub files_kept: usize,
    /// Files uploaded (or that would be, under dry run)
    pub files_uploaded: usize,
    pub delete_candidates: usize,
    pub files_deleted: usize,
    pub dry_run: bool,
    pub duration_ms: u64,
}

/// Result of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub outcome: PipelineOutcome,
    pub report: SyncReport,
}

/// Everything the stages need besides the store
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Local scan root
    pub root: PathBuf,
    /// File names to keep after scanning
    pub pattern: Regex,
    /// Compare checksums when matching files (and hash local files)
    pub compare_checksums: bool,
    /// Backend filter for the remote file listing
    pub file_filter: Option<String>,
    pub scan_concurrency: usize,
    pub parallel_checksum: usize,
    pub transfer: TransferOptions,
}

impl PipelineOptions {
    /// Build from a loaded configuration
    pub fn from_config(config: &Config) -> Result<Self, SyncError> {
        let filter = config.drive.file_filter.trim();
        Ok(Self {
            root: config.sync.path.clone(),
            pattern: config.sync.compiled_pattern()?,
            compare_checksums: config.sync.checksum,
            file_filter: (!filter.is_empty()).then(|| filter.to_string()),
            scan_concurrency: config.scan.max_concurrent,
            parallel_checksum: config.transfer.parallel_checksum,
            transfer: TransferOptions::from_config(
                &config.transfer,
                config.sync.dry_run,
                config.sync.delete,
            ),
        })
    }
}

/// Mutable state threaded through the stages of one run
struct PipelineContext {
    started: Instant,
    folders: Option<RemoteTree>,
    remote_files: Vec<RemoteNode>,
    local: Option<LocalTree>,
    plan: SyncPlan,
    report: SyncReport,
}

impl PipelineContext {
    fn new(dry_run: bool) -> Self {
        Self {
            started: Instant::now(),
            folders: None,
            remote_files: Vec::new(),
            local: None,
            plan: SyncPlan::default(),
            report: SyncReport {
                dry_run,
                ..SyncReport::default()
            },
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn local(&self) -> Result<&LocalTree> {
        self.local.as_ref().ok_or_else(|| anyhow!("local tree not scanned"))
    }

    fn local_mut(&mut self) -> Result<&mut LocalTree> {
        self.local.as_mut().ok_or_else(|| anyhow!("local tree not scanned"))
    }
}

/// Sequences the sync stages against one remote store
pub struct SyncPipeline {
    store: Arc<dyn IRemoteStore>,
    options: PipelineOptions,
}

impl SyncPipeline {
    pub fn new(store: Arc<dyn IRemoteStore>, options: PipelineOptions) -> Self {
        Self { store, options }
    }

    /// Run every stage; the error of a failed stage names the stage
    #[instrument(skip(self), fields(root = %self.options.root.display(), dry_run = self.options.transfer.dry_run))]
    pub async fn run(&self) -> Result<PipelineResult> {
        let mut ctx = PipelineContext::new(self.options.transfer.dry_run);
        let mut outcome = PipelineOutcome::Completed;
        let mut failure = None;

        for stage in Stage::SEQUENCE {
            debug!(%stage, "Stage started");
            let result = self
                .run_stage(stage, &mut ctx)
                .await
                .with_context(|| format!("stage {stage} failed"));
            match result {
                Ok(StageOutcome::Continue) => {
                    info!(%stage, elapsed_ms = ctx.elapsed_ms(), "Stage complete");
                }
                Ok(StageOutcome::NothingToDo) => {
                    info!(%stage, elapsed_ms = ctx.elapsed_ms(), "Nothing to do");
                    outcome = PipelineOutcome::NothingToDo;
                    break;
                }
                Err(err) => {
                    error!(%stage, elapsed_ms = ctx.elapsed_ms(), error = %format!("{err:#}"), "Stage failed");
                    failure = Some(err);
                    break;
                }
            }
        }

        self.finalize().await;
        ctx.report.duration_ms = ctx.elapsed_ms();

        if let Some(err) = failure {
            return Err(err);
        }
        info!(
            stage = %Stage::Done,
            ?outcome,
            uploaded = ctx.report.files_uploaded,
            kept = ctx.report.files_kept,
            deleted = ctx.report.files_deleted,
            folders_created = ctx.report.folders_created,
            duration_ms = ctx.report.duration_ms,
            "Sync finished"
        );
        Ok(PipelineResult {
            outcome,
            report: ctx.report,
        })
    }

    async fn finalize(&self) {
        if let Err(err) = self.store.close().await {
            warn!(error = %err, "Failed to close remote session");
        }
    }

    async fn run_stage(&self, stage: Stage, ctx: &mut PipelineContext) -> Result<StageOutcome> {
        let store = self.store.as_ref();
        let opts = &self.options;

        match stage {
            Stage::Init => {
                store.open().await.context("Failed to open remote session")?;
            }
            Stage::ListRemoteFolders => {
                let folders = list_folders(store).await?;
                ctx.report.remote_folders = folders.len();
                ctx.folders = Some(folders);
            }
            Stage::ListRemoteFiles => {
                ctx.remote_files = list_files(store, opts.file_filter.clone()).await?;
                ctx.report.remote_files = ctx.remote_files.len();
            }
            Stage::ScanLocal => {
                let tree = Scanner::new(opts.scan_concurrency).scan(&opts.root).await?;
                ctx.report.files_scanned = tree.files().len();
                ctx.local = Some(tree);
            }
            Stage::FilterByPattern => {
                let pattern = &opts.pattern;
                let local = ctx.local_mut()?;
                let removed = local.retain_files(|n| pattern.is_match(&n.name));
                let matched = local.files().len();
                let total_size: u64 = local.files().iter().map(|id| local[*id].size).sum();
                debug!(removed, matched, "Filtered by pattern");
                ctx.report.files_matched = matched;
                ctx.report.total_size = total_size;
                if matched == 0 {
                    info!(pattern = %pattern, "No local files match the pattern");
                    return Ok(StageOutcome::NothingToDo);
                }
            }
            Stage::Hash => {
                if opts.compare_checksums {
                    let hasher = ContentHasher::new(opts.parallel_checksum);
                    ctx.report.files_hashed = hasher.hash_tree(ctx.local_mut()?).await?;
                } else {
                    debug!("Checksum comparison disabled, skipping hashing");
                }
            }
            Stage::MapFolders => {
                let (Some(local), Some(folders)) = (ctx.local.as_mut(), ctx.folders.as_mut()) else {
                    return Err(anyhow!("folder mapping needs both trees"));
                };
                let stats = map_folders(store, local, folders, opts.transfer.dry_run).await?;
                ctx.report.folders_matched = stats.matched;
                ctx.report.folders_created = stats.created;
                ctx.report.folders_planned = stats.planned;
            }
            Stage::ClassifyFiles => {
                let plan = classify_files(ctx.local()?, &ctx.remote_files, opts.compare_checksums);
                ctx.report.files_kept = plan.kept.len();
                ctx.report.delete_candidates = plan.files_to_delete.len();
                ctx.plan = plan;
            }
            Stage::DeleteOrphans => {
                ctx.report.files_deleted =
                    delete_nodes(store, &ctx.plan.files_to_delete, &opts.transfer).await?;
            }
            Stage::Upload => {
                if ctx.plan.is_up_to_date() {
                    info!("Already up to date");
                    return Ok(StageOutcome::NothingToDo);
                }
                let local = ctx.local()?;
                ctx.report.files_uploaded =
                    upload_files(store, local, &ctx.plan.files_to_upload, &opts.transfer).await?;
            }
            Stage::Done => {}
        }

        Ok(StageOutcome::Continue)
    }
}
