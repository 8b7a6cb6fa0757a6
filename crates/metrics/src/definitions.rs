//! Metric name and label definitions.
//!
//! Every metric the bot records is named here so dashboards and code agree on
//! the spelling.

/// Poll authoring and publishing.
pub mod polls {
    /// Direct messages handled by the authoring wizard
    pub const WIZARD_MESSAGES_TOTAL: &str = "guildbot_wizard_messages_total";
    /// Wizard inputs rejected, labelled by `reason`
    pub const WIZARD_REJECTIONS_TOTAL: &str = "guildbot_wizard_rejections_total";
    /// Polls successfully created on the backend and posted
    pub const PUBLISHED_TOTAL: &str = "guildbot_polls_published_total";
    /// Publish attempts that failed
    pub const PUBLISH_ERRORS_TOTAL: &str = "guildbot_publish_errors_total";
    /// Time an outbound message waited for a throttle slot
    pub const THROTTLE_WAIT_SECONDS: &str = "guildbot_throttle_wait_seconds";
}

/// Reaction vote reconciliation.
pub mod votes {
    /// Reaction events processed, labelled by `kind` (added/removed)
    pub const RECONCILE_EVENTS_TOTAL: &str = "guildbot_reconcile_events_total";
    /// Votes submitted to the backend
    pub const CAST_TOTAL: &str = "guildbot_votes_cast_total";
    /// Votes retracted on the backend
    pub const RETRACTED_TOTAL: &str = "guildbot_votes_retracted_total";
    /// Reactions removed from poll messages
    pub const REACTIONS_STRIPPED_TOTAL: &str = "guildbot_reactions_stripped_total";
}

/// Poll backend API.
pub mod backend {
    /// Failed backend requests, labelled by `operation`
    pub const ERRORS_TOTAL: &str = "guildbot_backend_errors_total";
}

/// Common label keys used across metrics
pub mod labels {
    pub const REASON: &str = "reason";
    pub const KIND: &str = "kind";
    pub const OPERATION: &str = "operation";
}

/// Histogram buckets
pub mod buckets {
    /// Throttle wait buckets (in seconds), 1ms to 30s
    pub const THROTTLE_WAIT: &[f64] = &[
        0.001, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
    ];
}
