//! Token usage tracking types.

use serde::{Deserialize, Serialize};

use super::fields::Fields;
use crate::error::Result;

/// Token usage statistics reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    /// Number of input tokens consumed.
    pub input_tokens: u64,
    /// Tokens written to cache (if caching enabled).
    #[serde(skip_serializing_if = "is_zero")]
    pub cache_creation_input_tokens: u64,
    /// Tokens read from cache (if caching enabled).
    #[serde(skip_serializing_if = "is_zero")]
    pub cache_read_input_tokens: u64,
    /// Number of output tokens generated.
    pub output_tokens: u64,
    /// Server-side tool invocation counts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_tool_use: Option<ServerToolUse>,
    /// Cache write breakdown by retention tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation: Option<CacheCreation>,
    /// Service tier the request ran on (e.g. "standard").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<String>,
}

/// Counts of tools executed by the API itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToolUse {
    pub web_search_requests: u64,
}

/// Cache creation tokens split by time-to-live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheCreation {
    pub ephemeral_1h_input_tokens: u64,
    pub ephemeral_5m_input_tokens: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl Usage {
    /// Create a new empty Usage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a usage object. Absent counters are zero.
    pub(crate) fn from_fields(f: &Fields<'_>) -> Result<Self> {
        let server_tool_use = match f.opt_object("server_tool_use")? {
            Some(s) => Some(ServerToolUse {
                web_search_requests: s.opt_u64("web_search_requests")?.unwrap_or(0),
            }),
            None => None,
        };
        let cache_creation = match f.opt_object("cache_creation")? {
            Some(c) => Some(CacheCreation {
                ephemeral_1h_input_tokens: c.opt_u64("ephemeral_1h_input_tokens")?.unwrap_or(0),
                ephemeral_5m_input_tokens: c.opt_u64("ephemeral_5m_input_tokens")?.unwrap_or(0),
            }),
            None => None,
        };
        Ok(Usage {
            input_tokens: f.opt_u64("input_tokens")?.unwrap_or(0),
            cache_creation_input_tokens: f.opt_u64("cache_creation_input_tokens")?.unwrap_or(0),
            cache_read_input_tokens: f.opt_u64("cache_read_input_tokens")?.unwrap_or(0),
            output_tokens: f.opt_u64("output_tokens")?.unwrap_or(0),
            server_tool_use,
            cache_creation,
            service_tier: f.opt_str("service_tier")?.map(str::to_string),
        })
    }

    /// Total input tokens including cache operations.
    pub fn total_input_tokens(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.cache_read_input_tokens)
            .saturating_add(self.cache_creation_input_tokens)
    }

    /// Total tokens (input + output).
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens().saturating_add(self.output_tokens)
    }

    /// Accumulate token counters from another Usage instance.
    ///
    /// Counters come straight from CLI output and saturate at `u64::MAX`.
    ///
    /// The nested breakdowns are summed when present on either side; the
    /// service tier keeps the first non-empty value.
    pub fn accumulate(&mut self, other: &Usage) {
        add_to(&mut self.input_tokens, other.input_tokens);
        add_to(&mut self.output_tokens, other.output_tokens);
        add_to(&mut self.cache_read_input_tokens, other.cache_read_input_tokens);
        add_to(&mut self.cache_creation_input_tokens, other.cache_creation_input_tokens);
        if let Some(theirs) = &other.server_tool_use {
            let mine = self.server_tool_use.get_or_insert_with(Default::default);
            add_to(&mut mine.web_search_requests, theirs.web_search_requests);
        }
        if let Some(theirs) = &other.cache_creation {
            let mine = self.cache_creation.get_or_insert_with(Default::default);
            add_to(&mut mine.ephemeral_1h_input_tokens, theirs.ephemeral_1h_input_tokens);
            add_to(&mut mine.ephemeral_5m_input_tokens, theirs.ephemeral_5m_input_tokens);
        }
        if self.service_tier.is_none() {
            self.service_tier.clone_from(&other.service_tier);
        }
    }
}

fn add_to(counter: &mut u64, amount: u64) {
    *counter = counter.saturating_add(amount);
}

impl std::ops::Add for Usage {
    type Output = Usage;

    fn add(mut self, other: Usage) -> Usage {
        self.accumulate(&other);
        self
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, other: Usage) {
        self.accumulate(&other);
    }
}
