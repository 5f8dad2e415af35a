//! Enumeration filter
//!
//! Drops ticket and lottery identities from `listidentities` output before
//! they reach the caller. Pure and order-preserving; entries without a name
//! are always kept.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::types::IdentitySummary;

/// Naming pattern that marks an identity as a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPattern {
    /// `123456_1of10@parent@`
    BlockTicketWithParent,
    /// `123456_1of10.parent@`
    BlockTicketWithDot,
    /// `123456_1of10` / `123456_1of10@`
    NumberedTicket,
    /// `ticket42`, `Ticket-7`, ...
    TicketPrefix,
    /// any name containing lottery/lotto/ticket
    LotteryKeyword,
}

impl TicketPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockTicketWithParent => "block_ticket_with_parent",
            Self::BlockTicketWithDot => "block_ticket_with_dot",
            Self::NumberedTicket => "numbered_ticket",
            Self::TicketPrefix => "ticket_prefix",
            Self::LotteryKeyword => "lottery_keyword",
        }
    }
}

// Most specific first so `classify` reports the tightest match.
static TICKET_PATTERNS: LazyLock<Vec<(TicketPattern, Regex)>> = LazyLock::new(|| {
    [
        (TicketPattern::BlockTicketWithParent, r"^\d{6}_\d+of\d+@[^@.]+@$"),
        (TicketPattern::BlockTicketWithDot, r"^\d{6}_\d+of\d+\.[^@.]+@?$"),
        (TicketPattern::NumberedTicket, r"^\d{6}_\d+of\d+@?$"),
        (TicketPattern::TicketPrefix, r"(?i)^ticket[-_.]?\d+"),
        (TicketPattern::LotteryKeyword, r"(?i)(lottery|lotto|ticket)"),
    ]
    .into_iter()
    .filter_map(|(pattern, source)| match Regex::new(source) {
        Ok(re) => Some((pattern, re)),
        Err(e) => {
            tracing::error!(pattern = pattern.as_str(), error = %e, "ticket pattern failed to compile");
            None
        }
    })
    .collect()
});

/// First ticket pattern `name` matches, if any
pub fn classify(name: &str) -> Option<TicketPattern> {
    TICKET_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(name))
        .map(|(pattern, _)| *pattern)
}

/// Whether a summary survives the filter
pub fn is_retained(summary: &IdentitySummary) -> bool {
    match summary.name.as_deref() {
        Some(name) => classify(name).is_none(),
        None => true,
    }
}

/// Remove ticket/lottery identities, keeping the original order
pub fn filter(identities: Vec<IdentitySummary>) -> Vec<IdentitySummary> {
    let before = identities.len();
    let kept: Vec<_> = identities.into_iter().filter(is_retained).collect();
    tracing::debug!(before, after = kept.len(), "filtered identity list");
    kept
}
