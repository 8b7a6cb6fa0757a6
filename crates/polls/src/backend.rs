//! Client for the remote poll store.
//!
//! The backend owns polls and their tallies. Every mutation here is a single
//! remote call and every tally is a fresh read; nothing is cached locally.

use std::{collections::BTreeMap, time::Duration};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    reqwest::{Client, Response, StatusCode},
    serde::{Deserialize, Deserializer, Serialize},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use guildbot_metrics::{backend as backend_metrics, counter, labels};

use crate::{Error, Result, emoji::EmojiToken, types::MAX_OPTIONS};

/// A finished draft ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    pub channel_id: String,
    pub question: String,
    pub options: Vec<String>,
    pub reactions: Vec<EmojiToken>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    #[serde(default)]
    pub id: u64,
    pub question: String,
    pub options: Vec<String>,
    pub reactions: Vec<EmojiToken>,
    #[serde(
        rename = "expDate",
        deserialize_with = "unix_seconds",
        serialize_with = "to_unix_seconds"
    )]
    pub expires_at: DateTime<Utc>,
}

impl Poll {
    /// Votes are accepted strictly before `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Option index triggered by `emoji`, if it is one of this poll's reactions.
    #[must_use]
    pub fn option_index(&self, emoji: &EmojiToken) -> Option<usize> {
        emoji.position_in(&self.reactions)
    }
}

/// Per-option vote counts, index-aligned with the poll's options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollResults {
    pub counts: Vec<u64>,
}

impl PollResults {
    #[must_use]
    pub fn count(&self, option_index: usize) -> u64 {
        self.counts.get(option_index).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

impl<'de> Deserialize<'de> for PollResults {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Counts(Vec<u64>),
            Indexed(BTreeMap<String, u64>),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Counts(counts) => Self { counts },
            Wire::Indexed(map) => {
                let mut counts = Vec::new();
                for (key, count) in map {
                    let index = key
                        .parse::<usize>()
                        .ok()
                        .filter(|i| *i < MAX_OPTIONS)
                        .ok_or_else(|| D::Error::custom(format!("invalid option index: {key}")))?;
                    if counts.len() <= index {
                        counts.resize(index + 1, 0);
                    }
                    counts[index] = count;
                }
                Self { counts }
            },
        })
    }
}

/// Body of `POST`/`DELETE /poll/vote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote<'a> {
    pub platform: &'a str,
    pub poll_id: u64,
    pub platform_user_id: &'a str,
    pub option_index: usize,
}

#[async_trait]
pub trait PollBackend: Send + Sync {
    /// Store a new poll and return its id. A malformed poll is rejected with
    /// [`Error::Publish`].
    async fn create_poll(&self, poll: &NewPoll) -> Result<u64>;

    /// Fails with [`Error::NotFound`] for unknown ids.
    async fn get_poll(&self, poll_id: u64) -> Result<Poll>;

    async fn get_results(&self, poll_id: u64) -> Result<PollResults>;

    /// Idempotent: casting the same vote twice counts once.
    async fn cast_vote(&self, poll_id: u64, user_id: &str, option_index: usize) -> Result<()>;

    /// Idempotent: retracting a vote that does not exist is a no-op.
    async fn retract_vote(&self, poll_id: u64, user_id: &str, option_index: usize) -> Result<()>;
}

/// [`PollBackend`] over the poll store's JSON HTTP API.
#[derive(Clone)]
pub struct HttpPollBackend {
    client: Client,
    base_url: String,
    platform: String,
}

impl HttpPollBackend {
    pub fn new(
        base_url: impl Into<String>,
        platform: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| Error::backend("failed to build HTTP client", source))?;
        Ok(Self::with_client(client, base_url, platform))
    }

    #[must_use]
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            platform: platform.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn vote<'a>(&'a self, poll_id: u64, user_id: &'a str, option_index: usize) -> Vote<'a> {
        Vote {
            platform: &self.platform,
            poll_id,
            platform_user_id: user_id,
            option_index,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePollBody<'a> {
    platform: &'a str,
    channel_id: &'a str,
    question: &'a str,
    options: &'a [String],
    reactions: &'a [EmojiToken],
    exp_date: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CreatedPoll {
    Id(u64),
    Text(String),
    Object { id: u64 },
}

#[async_trait]
impl PollBackend for HttpPollBackend {
    async fn create_poll(&self, poll: &NewPoll) -> Result<u64> {
        let body = CreatePollBody {
            platform: &self.platform,
            channel_id: &poll.channel_id,
            question: &poll.question,
            options: &poll.options,
            reactions: &poll.reactions,
            exp_date: poll.expires_at.timestamp().to_string(),
        };
        let resp = self
            .client
            .post(self.url("/poll"))
            .json(&body)
            .send()
            .await
            .map_err(|source| transport_error("create_poll", "failed to create poll", source))?;

        let status = resp.status();
        if status.is_client_error() {
            let message = resp.text().await.unwrap_or_default();
            record_error("create_poll");
            return Err(Error::Publish {
                message: if message.is_empty() {
                    format!("HTTP {status}")
                } else {
                    message
                },
            });
        }
        let resp = ensure_success(resp, "create_poll", None).await?;
        let created: CreatedPoll = resp
            .json()
            .await
            .map_err(|source| {
                transport_error("create_poll", "failed to parse created poll id", source)
            })?;
        match created {
            CreatedPoll::Id(id) | CreatedPoll::Object { id } => Ok(id),
            CreatedPoll::Text(raw) => raw.trim().parse().map_err(|_| {
                Error::message(format!("backend returned a non-numeric poll id: {raw}"))
            }),
        }
    }

    async fn get_poll(&self, poll_id: u64) -> Result<Poll> {
        let resp = self
            .client
            .get(self.url(&format!("/poll/{poll_id}")))
            .send()
            .await
            .map_err(|source| transport_error("get_poll", "failed to fetch poll", source))?;
        let resp = ensure_success(resp, "get_poll", Some(poll_id)).await?;
        let mut poll: Poll = resp
            .json()
            .await
            .map_err(|source| transport_error("get_poll", "failed to parse poll", source))?;
        if poll.id == 0 {
            poll.id = poll_id;
        }
        Ok(poll)
    }

    async fn get_results(&self, poll_id: u64) -> Result<PollResults> {
        let resp = self
            .client
            .get(self.url(&format!("/poll/results/{poll_id}")))
            .send()
            .await
            .map_err(|source| {
                transport_error("get_results", "failed to fetch poll results", source)
            })?;
        let resp = ensure_success(resp, "get_results", Some(poll_id)).await?;
        resp.json()
            .await
            .map_err(|source| {
                transport_error("get_results", "failed to parse poll results", source)
            })
    }

    async fn cast_vote(&self, poll_id: u64, user_id: &str, option_index: usize) -> Result<()> {
        let resp = self
            .client
            .post(self.url("/poll/vote"))
            .json(&self.vote(poll_id, user_id, option_index))
            .send()
            .await
            .map_err(|source| transport_error("cast_vote", "failed to cast vote", source))?;
        if resp.status() == StatusCode::CONFLICT {
            debug!(poll_id, user_id, option_index, "vote already recorded");
            return Ok(());
        }
        ensure_success(resp, "cast_vote", Some(poll_id)).await?;
        Ok(())
    }

    async fn retract_vote(&self, poll_id: u64, user_id: &str, option_index: usize) -> Result<()> {
        let resp = self
            .client
            .delete(self.url("/poll/vote"))
            .json(&self.vote(poll_id, user_id, option_index))
            .send()
            .await
            .map_err(|source| transport_error("retract_vote", "failed to retract vote", source))?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(poll_id, user_id, option_index, "no vote to retract");
            return Ok(());
        }
        ensure_success(resp, "retract_vote", Some(poll_id)).await?;
        Ok(())
    }
}

async fn ensure_success(
    resp: Response,
    operation: &'static str,
    poll_id: Option<u64>,
) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::NOT_FOUND
        && let Some(poll_id) = poll_id
    {
        return Err(Error::NotFound { poll_id });
    }
    let body = resp.text().await.unwrap_or_default();
    warn!(operation, status = status.as_u16(), body = %body, "poll backend request failed");
    record_error(operation);
    Err(Error::BackendStatus {
        context: operation.to_string(),
        status: status.as_u16(),
        body,
    })
}

fn transport_error(operation: &'static str, context: &str, source: reqwest::Error) -> Error {
    record_error(operation);
    Error::backend(context, source)
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn record_error(operation: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(backend_metrics::ERRORS_TOTAL, labels::OPERATION => operation).increment(1);
}

/// `expDate` arrives as unix seconds, either a number or a numeric string.
fn unix_seconds<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<DateTime<Utc>, D::Error> {
    use serde::de::Error as _;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Int(i64),
        Float(f64),
        Text(String),
    }

    let secs = match Wire::deserialize(deserializer)? {
        Wire::Int(secs) => secs,
        Wire::Float(secs) => secs as i64,
        Wire::Text(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| D::Error::custom(format!("invalid expDate: {raw}")))?,
    };
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| D::Error::custom(format!("expDate out of range: {secs}")))
}

fn to_unix_seconds<S: serde::Serializer>(
    at: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_i64(at.timestamp())
}
