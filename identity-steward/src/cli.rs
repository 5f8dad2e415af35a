//! Steward CLI - subcommands that drive the sync engine
//!
//! Each command runs at most one synchronization cycle and renders the
//! outcome as plain text.

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use tracing::info;

use identity_sync::{
    BatchContent, ContentMapEdit, DataDescriptor, EntryPayload, HistoryEntry, IdentitySnapshot,
    IdentitySummary, IdentitySyncEngine, MultiMapEdit, SyncError, UpdateOutcome,
};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List identities, minus ticket/lottery names unless --no-filter is set
    List,

    /// Show an identity's content map and content multimap
    Show {
        /// Identity name (`alice@`) or i-address
        identity: String,
    },

    /// Add or replace a content map value
    SetContent {
        identity: String,
        key: String,
        value: String,
        /// Move the value from this key (rename)
        #[arg(long)]
        from_key: Option<String>,
    },

    /// Remove a content map key
    RemoveContent { identity: String, key: String },

    /// Add or replace a content multimap entry
    SetMultimap {
        identity: String,
        primary_key: String,
        nested_key: String,
        /// Label distinguishing entries under the same nested key
        #[arg(short, long)]
        label: Option<String>,
        /// Plain-text message payload
        #[arg(short, long, conflicts_with = "json")]
        message: Option<String>,
        /// Mimetype for the message payload
        #[arg(long, default_value = "text/plain")]
        mimetype: String,
        /// Raw JSON payload
        #[arg(long)]
        json: Option<String>,
    },

    /// Remove a content multimap entry
    RemoveMultimap {
        identity: String,
        primary_key: String,
        nested_key: String,
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Replace content wholesale from a JSON file
    Import {
        identity: String,
        /// File holding `{ "contentmap": {...}, "contentmultimap": {...} }`
        file: PathBuf,
    },
}

/// Execute a steward command against the engine
pub async fn execute_command(engine: &IdentitySyncEngine, command: Commands) -> anyhow::Result<String> {
    match command {
        Commands::List => {
            let identities = engine.list_filtered_identities().await?;
            Ok(format_identities(&identities))
        }

        Commands::Show { identity } => {
            let snapshot = engine.fetch_snapshot(&identity).await?;
            format_snapshot(&snapshot)
        }

        Commands::SetContent {
            identity,
            key,
            value,
            from_key,
        } => {
            let edit = match from_key {
                Some(original) => ContentMapEdit::edit(original, key, value),
                None => ContentMapEdit::add(key, value),
            };
            let result = engine.apply_content_map_edit(&identity, &edit).await;
            report(engine, &identity, result).await
        }

        Commands::RemoveContent { identity, key } => {
            let edit = ContentMapEdit::delete(key);
            let result = engine.apply_content_map_edit(&identity, &edit).await;
            report(engine, &identity, result).await
        }

        Commands::SetMultimap {
            identity,
            primary_key,
            nested_key,
            label,
            message,
            mimetype,
            json,
        } => {
            let payload = build_payload(label, message, &mimetype, json)?;
            let edit = MultiMapEdit::add(primary_key, nested_key, payload);
            let result = engine.apply_content_multimap_edit(&identity, &edit).await;
            report(engine, &identity, result).await
        }

        Commands::RemoveMultimap {
            identity,
            primary_key,
            nested_key,
            label,
        } => {
            let edit = MultiMapEdit::delete(primary_key, nested_key, label.as_deref());
            let result = engine.apply_content_multimap_edit(&identity, &edit).await;
            report(engine, &identity, result).await
        }

        Commands::Import { identity, file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let content: BatchContent = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", file.display()))?;
            info!(identity = %identity, file = %file.display(), "importing content");

            let result = engine.batch_replace(&identity, content).await;
            report(engine, &identity, result).await
        }
    }
}

/// Build a multimap payload from either a message or raw JSON
fn build_payload(
    label: Option<String>,
    message: Option<String>,
    mimetype: &str,
    json: Option<String>,
) -> anyhow::Result<EntryPayload> {
    if let Some(json) = json {
        let mut payload: EntryPayload =
            serde_json::from_str(&json).context("--json is not valid JSON")?;
        if let Some(label) = label {
            match &mut payload {
                EntryPayload::Descriptor(d) => d.label = Some(label),
                EntryPayload::Raw(_) => {
                    anyhow::bail!("--label needs a --json payload that is a data descriptor object")
                }
            }
        }
        return Ok(payload);
    }

    let message = message.context("either --message or --json is required")?;
    let mut descriptor = DataDescriptor::text(message);
    descriptor.mimetype = Some(mimetype.to_string());
    if let Some(label) = label {
        descriptor = descriptor.with_label(label);
    }
    Ok(descriptor.into())
}

/// Render a finished cycle, using the history entry the engine recorded for it
async fn report(
    engine: &IdentitySyncEngine,
    identity: &str,
    result: Result<UpdateOutcome, SyncError>,
) -> anyhow::Result<String> {
    let outcome = result?;
    let entry = match engine.history() {
        Some(history) => history.recent(1).await.into_iter().next(),
        None => None,
    };
    Ok(format_outcome(identity, &outcome, entry.as_ref()))
}

fn format_outcome(identity: &str, outcome: &UpdateOutcome, entry: Option<&HistoryEntry>) -> String {
    let mut output = String::new();
    output.push_str(&format!("Submitted:  {}\n", outcome.txid));
    output.push_str(&format!("Identity:   {}\n", identity));
    if let Some(entry) = entry {
        output.push_str(&format!("Entry:      {}\n", entry.entry_id));
        output.push_str(&format!("Took:       {} ms\n", entry.duration_ms));
    }

    if let Some(warning) = &outcome.refresh_error {
        output.push_str(&format!("\nWarning: {}\n", warning));
        output.push_str("The update stands; run `show` to see the confirmed state.\n");
    } else if let Some(record) = &outcome.record {
        output.push_str(&format!(
            "Content:    {} map keys, {} multimap keys\n",
            record.identity.content_map.len(),
            record.identity.content_multimap.len()
        ));
    }

    output
}

fn format_identities(identities: &[IdentitySummary]) -> String {
    if identities.is_empty() {
        return "No identities".to_string();
    }

    let mut output = String::new();
    for id in identities {
        output.push_str(&format!(
            "{:<32} {:<36} {}\n",
            id.name.as_deref().unwrap_or("-"),
            id.identity_address.as_deref().unwrap_or("-"),
            id.status.as_deref().unwrap_or("")
        ));
    }
    output
}

fn format_snapshot(snapshot: &IdentitySnapshot) -> anyhow::Result<String> {
    let identity = &snapshot.identity;
    let mut output = String::new();
    output.push_str(&format!("{}@ ({})\n", identity.name, identity.identity_address));
    output.push_str(&format!("Status:     {}\n", snapshot.status.as_deref().unwrap_or("unknown")));
    if let Some(height) = snapshot.block_height {
        output.push_str(&format!("Height:     {}\n", height));
    }

    output.push_str("\nContent map:\n");
    if identity.content_map.is_empty() {
        output.push_str("  (empty)\n");
    }
    for (key, value) in &identity.content_map {
        output.push_str(&format!("  {} = {}\n", key, value));
    }

    output.push_str("\nContent multimap:\n");
    if identity.content_multimap.is_empty() {
        output.push_str("  (empty)\n");
    }
    for (primary, entries) in &identity.content_multimap {
        output.push_str(&format!("  {}\n", primary));
        for entry in entries {
            let payload = serde_json::to_string(&entry.payload)?;
            output.push_str(&format!("    {} -> {}\n", entry.nested_key, payload));
        }
    }

    Ok(output)
}
