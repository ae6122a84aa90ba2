//! A scripted [`ActionRunner`] that never spawns processes.

use crate::sandbox::{ActionRunner, ActionStatus, LineSink};
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub argv: Vec<String>,
    pub working_dir: PathBuf,
    /// Whether the working directory existed when the command was invoked
    pub workspace_existed: bool,
    /// Sorted top-level entries of the working directory at that moment
    pub entries: Vec<String>,
}

#[derive(Debug, Clone)]
enum Reply {
    Fail {
        lines: Vec<String>,
        code: i32,
    },
    SpawnError(String),
}

#[derive(Debug, Clone)]
struct Rule {
    tokens: Vec<String>,
    reply: Reply,
}

/// Succeeds unless a rule matches.
///
/// A rule matches when every one of its tokens is an element of the argv.
/// Clones share the call log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    delay: Option<Duration>,
    delays_on: Vec<(Vec<String>, Duration)>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Print `lines` and exit with code 1 when `tokens` match.
    #[must_use]
    pub fn fail_on(mut self, tokens: &[&str], lines: &[&str]) -> Self {
        self.rules.push(Rule {
            tokens: tokens.iter().map(|t| (*t).to_string()).collect(),
            reply: Reply::Fail {
                lines: lines.iter().map(|l| (*l).to_string()).collect(),
                code: 1,
            },
        });
        self
    }

    /// Fail to start the command when `tokens` match.
    #[must_use]
    pub fn spawn_error_on(mut self, tokens: &[&str], message: &str) -> Self {
        self.rules.push(Rule {
            tokens: tokens.iter().map(|t| (*t).to_string()).collect(),
            reply: Reply::SpawnError(message.to_string()),
        });
        self
    }

    /// Make every invocation take at least `delay`.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make invocations matching `tokens` take `delay` instead.
    #[must_use]
    pub fn with_delay_on(mut self, tokens: &[&str], delay: Duration) -> Self {
        self.delays_on.push((tokens.iter().map(|t| (*t).to_string()).collect(), delay));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Most invocations that were running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn reply_for(&self, argv: &[String]) -> Option<Reply> {
        self.rules
            .iter()
            .find(|rule| rule.tokens.iter().all(|token| argv.contains(token)))
            .map(|rule| rule.reply.clone())
    }

    fn record(&self, argv: &[String], working_dir: &Path) {
        let mut entries: Vec<String> = std::fs::read_dir(working_dir)
            .map(|dir| {
                dir.filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        entries.sort();

        self.calls.lock().unwrap().push(RecordedCall {
            argv: argv.to_vec(),
            working_dir: working_dir.to_path_buf(),
            workspace_existed: working_dir.is_dir(),
            entries,
        });
    }
}

impl ActionRunner for ScriptedRunner {
    async fn invoke(&self, argv: &[String], working_dir: &Path, lines: &LineSink) -> Result<ActionStatus> {
        self.record(argv, working_dir);
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        let delay = self
            .delays_on
            .iter()
            .find(|(tokens, _)| tokens.iter().all(|token| argv.contains(token)))
            .map(|(_, delay)| *delay)
            .or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        match self.reply_for(argv) {
            None => {
                let _ = lines.send(format!("$ {}", argv.join(" ")));
                Ok(ActionStatus::succeeded())
            }
            Some(Reply::Fail {
                lines: output,
                code,
            }) => {
                for line in output {
                    let _ = lines.send(line);
                }
                Ok(ActionStatus::failed(code))
            }
            Some(Reply::SpawnError(message)) => Err(anyhow!(message)),
        }
    }
}
