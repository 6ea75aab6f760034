//! Reporting collaborator. Engines emit structured [`Event`]s; rendering
//! them into text (and progress bars) is the reporter's business.

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Resort,
    FixExtensions,
    Deduplicate,
    Clean,
    CleanEmptyDirs,
}

impl Task {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Resort => "Audio file resorting",
            Self::FixExtensions => "Extension repair",
            Self::Deduplicate => "Audio file deduplication",
            Self::Clean => "Invalid audio file cleanup",
            Self::CleanEmptyDirs => "Empty directory cleanup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The run will not touch the filesystem.
    SimulateOnly,
    SourceMissing { path: PathBuf },
    Started { task: Task, total: usize },
    Advanced,
    Finished,
    DirCreated { path: PathBuf, simulated: bool },
    Moved { file: String, dest: PathBuf, simulated: bool },
    Deleted { file: String, simulated: bool },
    Renamed { from: String, to: String, simulated: bool },
    DirRemoved { path: PathBuf, simulated: bool },
    FileSkipped { file: String, reason: String },
    CollisionsFound { count: usize },
    Collision { from: String, to: String },
}

impl Event {
    pub fn level(&self) -> log::Level {
        match self {
            Event::SourceMissing { .. } => log::Level::Error,
            Event::FileSkipped { .. } | Event::CollisionsFound { .. } | Event::Collision { .. } => {
                log::Level::Warn
            }
            Event::Advanced | Event::Finished => log::Level::Trace,
            _ => log::Level::Info,
        }
    }
}

fn would(simulated: bool, done: &'static str, planned: &'static str) -> &'static str {
    if simulated { planned } else { done }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::SimulateOnly => write!(f, "DRY-RUN MODE: no filesystem changes will be made"),
            Event::SourceMissing { path } => {
                write!(f, "Source directory does not exist: {}", path.display())
            }
            Event::Started { task, total } => write!(f, "{} ({} entries)", task.title(), total),
            Event::Advanced => write!(f, "advanced"),
            Event::Finished => write!(f, "finished"),
            Event::DirCreated { path, simulated } => write!(
                f,
                "{} directory: {}",
                would(*simulated, "Created", "Would create"),
                path.display()
            ),
            Event::Moved { file, dest, simulated } => write!(
                f,
                "{} file: {} -> {}",
                would(*simulated, "Moved", "Would move"),
                file,
                dest.display()
            ),
            Event::Deleted { file, simulated } => write!(
                f,
                "{} file: {}",
                would(*simulated, "Deleted", "Would delete"),
                file
            ),
            Event::Renamed { from, to, simulated } => write!(
                f,
                "{}: {} -> {}",
                would(*simulated, "Renamed", "Would rename"),
                from,
                to
            ),
            Event::DirRemoved { path, simulated } => write!(
                f,
                "{} empty directory: {}",
                would(*simulated, "Removed", "Would remove"),
                path.display()
            ),
            Event::FileSkipped { file, reason } => write!(f, "Skipped file {}: {}", file, reason),
            Event::CollisionsFound { count } => {
                write!(f, "Name normalization collisions found: {}", count)
            }
            Event::Collision { from, to } => write!(
                f,
                "Collision: {} conflicts with existing {} (duplicates with different parameters)",
                from, to
            ),
        }
    }
}

pub trait Reporter {
    fn emit(&self, event: Event);
}

/// Renders events through the `log` facade with an `indicatif` bar per task.
#[derive(Default)]
pub struct LogReporter {
    bar: RefCell<Option<ProgressBar>>,
}

impl LogReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&self, task: Task, total: usize) {
        log::info!("{}", task.title());
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) ({eta}) {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        pb.set_message(task.title());
        if let Some(old) = self.bar.replace(Some(pb)) {
            old.finish_and_clear();
        }
    }
}

impl Reporter for LogReporter {
    fn emit(&self, event: Event) {
        match event {
            Event::Started { task, total } => self.start(task, total),
            Event::Advanced => {
                if let Some(pb) = self.bar.borrow().as_ref() {
                    pb.inc(1);
                }
            }
            Event::Finished => {
                if let Some(pb) = self.bar.borrow_mut().take() {
                    pb.finish_and_clear();
                }
            }
            other => {
                let level = other.level();
                match self.bar.borrow().as_ref() {
                    Some(pb) => pb.suspend(|| log::log!(level, "{}", other)),
                    None => log::log!(level, "{}", other),
                }
            }
        }
    }
}
