//! Built-in walkthrough of a session switching between two subjects.

use anyhow::Result;
use mirror_sync_types::{ChatMessage, OrderingKey, PlanUpload, SortDirection};

use crate::commands::replay::{self, Step};
use crate::config::Config;

/// Run the demo command.
pub async fn run(config: &Config) -> Result<()> {
    let steps = script(config)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    replay::execute(config, &steps, &mut out).await
}

/// The demo steps for the configured collection.
///
/// Ascending collections get chat messages, descending ones get uploads.
pub fn script(config: &Config) -> Result<Vec<Step>> {
    let record = |text: &str, at: i64| -> Result<Step> {
        let key = OrderingKey::from_millis(at);
        let draft = match config.collection.direction {
            SortDirection::Ascending => ChatMessage::user(text).into_new_record(key)?,
            SortDirection::Descending => PlanUpload::new(text, "").into_new_record(key)?,
        };
        Ok(Step::Add {
            at: Some(at),
            fields: draft.fields,
        })
    };
    let subject = |name: &str| Step::Subject {
        subject: Some(name.to_string()),
    };

    Ok(vec![
        subject("alice"),
        record("alice one", 1_000)?,
        record("alice three", 3_000)?,
        record("alice two", 2_000)?,
        Step::Show,
        subject("bob"),
        record("bob one", 1_500)?,
        Step::Show,
        subject("alice"),
        Step::Delete {
            id: Some("missing-record".to_string()),
            index: None,
        },
        Step::Clear,
        Step::Show,
        Step::Subject { subject: None },
        record("nobody", 4_000)?,
        Step::Show,
    ])
}
