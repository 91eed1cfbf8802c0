//! Replay a scripted sequence of session and gateway operations.
//!
//! A script is a TOML file of `[[step]]` tables run against an in-memory
//! store. Every relay notification and every `show` step is printed as
//! one JSON line.
//!
//! ```toml
//! [[step]]
//! action = "subject"
//! subject = "alice"
//!
//! [[step]]
//! action = "add"
//! at = 100
//! fields = { role = "user", content = "hello" }
//!
//! [[step]]
//! action = "show"
//! ```

use anyhow::{Context, Result};
use mirror_sync_client::{
    ChannelRelay, MemoryRemote, MutationGateway, RemoteError, SessionState, SessionView,
    SyncSession,
};
use mirror_sync_types::{Fields, NewRecord, Notification, OrderingKey, RecordId, Subject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::Config;

/// A parsed script.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Script {
    /// Steps, in order.
    #[serde(rename = "step", default)]
    pub steps: Vec<Step>,
}

impl Script {
    /// Load a script from a TOML file.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        toml::from_str(&contents).context("Invalid script")
    }
}

/// One scripted operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    /// Select a subject, or clear it when omitted.
    Subject {
        /// Subject key.
        #[serde(default)]
        subject: Option<String>,
    },
    /// Add a record to the current subject's collection.
    Add {
        /// Ordering key in milliseconds (default: now).
        #[serde(default)]
        at: Option<i64>,
        /// Payload fields.
        #[serde(default)]
        fields: Fields,
    },
    /// Delete a record by id, or by its position in the mirror.
    Delete {
        /// Record id.
        #[serde(default)]
        id: Option<String>,
        /// Zero-based position in the current mirror.
        #[serde(default)]
        index: Option<usize>,
    },
    /// Delete every record in the current subject's collection.
    Clear,
    /// End the live subscription with a remote error.
    FailSubscription,
    /// Print the current view.
    Show,
}

/// One line of output.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Line {
    /// A relay event.
    Notification(Notification),
    /// The session view after a `show` step.
    View(SessionView),
}

/// Run the replay command.
pub async fn run(config: &Config, script_path: &Path) -> Result<()> {
    let script = Script::load(script_path).await?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(config, &script.steps, &mut out).await
}

/// Run `steps` against a fresh in-memory store, writing JSON lines to `out`.
pub async fn execute<W: Write>(config: &Config, steps: &[Step], out: &mut W) -> Result<()> {
    let mut runner = Runner::new(config);

    for (n, step) in steps.iter().enumerate() {
        tracing::debug!("Step {}: {:?}", n, step);
        runner
            .apply(step)
            .await
            .with_context(|| format!("Step {} ({:?}) failed", n, step))?;
        runner.settle(step).await;
        runner.flush_events(out)?;
        if matches!(step, Step::Show) {
            write_line(out, &Line::View(runner.session.view()))?;
        }
    }

    runner.session.dispose().await;
    runner.flush_events(out)?;
    Ok(())
}

struct Runner {
    remote: Arc<MemoryRemote>,
    session: SyncSession,
    gateway: MutationGateway<MemoryRemote>,
    events: mpsc::UnboundedReceiver<Notification>,
    settle_timeout: Duration,
}

impl Runner {
    fn new(config: &Config) -> Self {
        let remote = Arc::new(MemoryRemote::new());
        let (relay, events) = ChannelRelay::new();
        let relay = Arc::new(relay);
        let session = SyncSession::new(
            Arc::clone(&remote),
            config.collection.spec(),
            relay.clone(),
        );
        let gateway = MutationGateway::new(Arc::clone(&remote), relay);

        Self {
            remote,
            session,
            gateway,
            events,
            settle_timeout: config.session.settle_timeout(),
        }
    }

    async fn apply(&self, step: &Step) -> Result<()> {
        let collection = self.session.collection_ref();

        match step {
            Step::Subject { subject } => {
                self.session
                    .set_subject(subject.as_deref().map(Subject::from))
                    .await?;
            }
            Step::Add { at, fields } => {
                let key = at.map(OrderingKey::from_millis).unwrap_or_else(OrderingKey::now);
                // Failures are already reported through the relay.
                let _ = self
                    .gateway
                    .add(&collection, NewRecord::new(key, fields.clone()))
                    .await;
            }
            Step::Delete { id, index } => {
                let id = self.resolve_target(id.as_deref(), *index)?;
                let _ = self.gateway.delete_one(&collection, &id).await;
            }
            Step::Clear => {
                let _ = self.gateway.batch_clear(&collection).await;
            }
            Step::FailSubscription => {
                if let Some(path) = collection.path() {
                    self.remote.fail_subscriptions(
                        &path,
                        RemoteError::Unavailable("subscription dropped by script".into()),
                    );
                }
            }
            Step::Show => {}
        }
        Ok(())
    }

    fn resolve_target(&self, id: Option<&str>, index: Option<usize>) -> Result<RecordId> {
        match (id, index) {
            (Some(id), _) => Ok(RecordId::from(id)),
            (None, Some(index)) => self
                .session
                .current_snapshot()
                .records()
                .get(index)
                .map(|r| r.id.clone())
                .with_context(|| format!("No record at index {}", index)),
            (None, None) => anyhow::bail!("delete needs an id or an index"),
        }
    }

    /// Wait until the mirror reflects the store, or the subscription failed.
    async fn settle(&self, step: &Step) {
        let path = self.session.collection_ref().path();
        let expect_failure = matches!(step, Step::FailSubscription) && path.is_some();
        let expected: BTreeSet<RecordId> = match path {
            Some(path) => self.remote.records(&path).into_iter().map(|r| r.id).collect(),
            None => BTreeSet::new(),
        };

        let mut views = self.session.observe();
        let caught_up = views.wait_for(|view| match view.state {
            SessionState::Failed { .. } => true,
            _ if expect_failure => false,
            SessionState::Loading { .. } => false,
            _ => view.snapshot.ids() == expected,
        });
        if tokio::time::timeout(self.settle_timeout, caught_up)
            .await
            .is_err()
        {
            tracing::warn!("Mirror did not settle within {:?}", self.settle_timeout);
        }
    }

    fn flush_events<W: Write>(&mut self, out: &mut W) -> Result<()> {
        while let Ok(event) = self.events.try_recv() {
            write_line(out, &Line::Notification(event))?;
        }
        Ok(())
    }
}

fn write_line<W: Write>(out: &mut W, line: &Line) -> Result<()> {
    serde_json::to_writer(&mut *out, line)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn lines(output: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(output)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn fields(content: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("role".into(), "user".into());
        fields.insert("content".into(), content.into());
        fields
    }

    #[test]
    fn script_parses_every_action() {
        let toml = r#"
[[step]]
action = "subject"
subject = "alice"

[[step]]
action = "add"
at = 5
fields = { content = "hi" }

[[step]]
action = "delete"
index = 0

[[step]]
action = "clear"

[[step]]
action = "fail-subscription"

[[step]]
action = "subject"

[[step]]
action = "show"
"#;
        let script: Script = toml::from_str(toml).unwrap();
        assert_eq!(script.steps.len(), 7);
        assert_eq!(
            script.steps[0],
            Step::Subject {
                subject: Some("alice".into())
            }
        );
        assert!(matches!(script.steps[1], Step::Add { at: Some(5), .. }));
        assert_eq!(script.steps[4], Step::FailSubscription);
        assert_eq!(script.steps[5], Step::Subject { subject: None });
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result: Result<Script, _> = toml::from_str("[[step]]\naction = \"explode\"\n");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn execute_prints_notifications_and_views() {
        let steps = vec![
            Step::Subject {
                subject: Some("alice".into()),
            },
            Step::Add {
                at: Some(20),
                fields: fields("second"),
            },
            Step::Add {
                at: Some(10),
                fields: fields("first"),
            },
            Step::Show,
        ];
        let mut out = Vec::new();

        execute(&Config::default(), &steps, &mut out).await.unwrap();

        let lines = lines(&out);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["type"], "notification");
        assert_eq!(lines[0]["detail"]["outcome"], "added");
        let view = &lines[2];
        assert_eq!(view["type"], "view");
        assert_eq!(view["state"]["status"], "synced");
        let records = view["snapshot"]["records"].as_array().unwrap();
        assert_eq!(records[0]["fields"]["content"], "first");
        assert_eq!(records[1]["fields"]["content"], "second");
    }

    #[tokio::test]
    async fn add_without_subject_reports_failure() {
        let steps = vec![Step::Add {
            at: Some(1),
            fields: fields("lost"),
        }];
        let mut out = Vec::new();

        execute(&Config::default(), &steps, &mut out).await.unwrap();

        let lines = lines(&out);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["severity"], "error");
        assert_eq!(lines[0]["detail"]["kind"], "no_subject");
    }

    #[tokio::test]
    async fn delete_by_index_and_clear() {
        let steps = vec![
            Step::Subject {
                subject: Some("alice".into()),
            },
            Step::Add {
                at: Some(1),
                fields: fields("a"),
            },
            Step::Add {
                at: Some(2),
                fields: fields("b"),
            },
            Step::Add {
                at: Some(3),
                fields: fields("c"),
            },
            Step::Delete {
                id: None,
                index: Some(0),
            },
            Step::Clear,
            Step::Show,
        ];
        let mut out = Vec::new();

        execute(&Config::default(), &steps, &mut out).await.unwrap();

        let lines = lines(&out);
        let cleared = lines
            .iter()
            .find(|l| l["detail"]["outcome"] == "cleared")
            .unwrap();
        assert_eq!(cleared["detail"]["deleted"], 2);
        let view = lines.last().unwrap();
        assert!(view["snapshot"]["records"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_index_out_of_range_fails_step() {
        let steps = vec![
            Step::Subject {
                subject: Some("alice".into()),
            },
            Step::Delete {
                id: None,
                index: Some(3),
            },
        ];
        let mut out = Vec::new();

        let result = execute(&Config::default(), &steps, &mut out).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn failed_subscription_is_reported_once() {
        let steps = vec![
            Step::Subject {
                subject: Some("alice".into()),
            },
            Step::FailSubscription,
            Step::Show,
        ];
        let mut out = Vec::new();

        execute(&Config::default(), &steps, &mut out).await.unwrap();

        let lines = lines(&out);
        let failures: Vec<_> = lines.iter().filter(|l| l["severity"] == "error").collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0]["operation"], "sync");
        assert_eq!(lines.last().unwrap()["state"]["status"], "failed");
    }
}
