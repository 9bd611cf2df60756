//! Payment Intents
//!
//! The intent record, its lifecycle states, and the transition rules.
//!
//! ```text
//! Created ──▶ RequiresAction ──▶ Succeeded
//!    │              │
//!    ├──────────────┴──────────▶ Failed
//!    └─────────────────────────▶ Succeeded
//! (any non-terminal) ──────────▶ Canceled
//! ```
//!
//! Terminal states absorb every later transition, so the outcome does not
//! depend on the order in which signals arrive.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Processor-assigned intent identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(String);

impl IntentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IntentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase ISO 4217 currency code
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Normalise to lowercase, falling back to `default` when absent
    pub fn parse(raw: Option<&str>, default: &str) -> Result<Self> {
        let code = raw
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(default)
            .to_lowercase();

        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(PaymentError::InvalidCurrency(format!(
                "Invalid currency '{code}'. Expected a three-letter ISO 4217 code."
            )));
        }

        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single-use token the client confirms with.
///
/// `Debug` is redacted and the type is never serialised, so it cannot leak
/// through logs or status responses by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecret(String);

impl ClientSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Reveal the secret (only for the creation response)
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClientSecret([REDACTED])")
    }
}

/// Amount as supplied by a caller, before validation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl AmountInput {
    /// Validate against `min` and return whole minor units.
    ///
    /// The minimum is checked before rounding, so 49.6 is still too low.
    pub fn to_minor_units(input: Option<&Self>, min: i64) -> Result<i64> {
        let too_low = || {
            PaymentError::InvalidAmount(format!(
                "Invalid amount. Minimum amount is {min} cents."
            ))
        };

        let value = match input {
            None => return Err(too_low()),
            Some(Self::Integer(n)) => return if *n < min { Err(too_low()) } else { Ok(*n) },
            Some(Self::Decimal(f)) => *f,
            Some(Self::Text(s)) => s.trim().parse::<f64>().map_err(|_| too_low())?,
        };

        #[allow(clippy::cast_precision_loss)]
        let (floor, ceiling) = (min as f64, i64::MAX as f64);
        if !value.is_finite() || value < floor || value > ceiling {
            return Err(too_low());
        }

        #[allow(clippy::cast_possible_truncation)]
        let minor = value.round() as i64;
        Ok(minor)
    }
}

/// Lifecycle state of an intent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentState {
    Created,
    RequiresAction,
    Succeeded,
    Failed,
    Canceled,
}

impl IntentState {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentState::Created => "created",
            IntentState::RequiresAction => "requires_action",
            IntentState::Succeeded => "succeeded",
            IntentState::Failed => "failed",
            IntentState::Canceled => "canceled",
        }
    }

    /// Terminal states have no outgoing transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, IntentState::Succeeded | IntentState::Failed | IntentState::Canceled)
    }

    /// Whether `self -> target` is an edge of the state machine
    pub fn can_transition_to(self, target: Self) -> bool {
        use IntentState::{Canceled, Created, Failed, RequiresAction, Succeeded};

        match (self, target) {
            (from, _) if from.is_terminal() => false,
            (_, Canceled) => true,
            (Created, RequiresAction | Succeeded | Failed) => true,
            (RequiresAction, Succeeded | Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for IntentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locally tracked payment intent
#[derive(Clone, Debug, Serialize)]
pub struct PaymentIntent {
    pub id: IntentId,

    /// Amount in the currency's smallest unit
    pub amount: i64,

    pub currency: Currency,

    pub description: Option<String>,

    /// Passed through to the processor unchanged
    pub metadata: HashMap<String, String>,

    pub state: IntentState,

    #[serde(skip)]
    pub client_secret: ClientSecret,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// Apply a transition in place.
    ///
    /// Disallowed transitions (including any out of a terminal state) leave
    /// the record untouched and report `applied: false`.
    pub fn apply(&mut self, target: IntentState) -> Transition {
        let from = self.state;
        let applied = from.can_transition_to(target);

        if applied {
            self.state = target;
            self.updated_at = Utc::now();
        }

        Transition {
            from,
            to: self.state,
            applied,
        }
    }

    /// Public view of the intent, without the client secret
    pub fn status(&self) -> IntentStatus {
        IntentStatus {
            id: self.id.clone(),
            state: self.state,
            processor_status: None,
            amount: self.amount,
            currency: self.currency.clone(),
            description: self.description.clone(),
            metadata: self.metadata.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Result of a transition attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// State before the attempt
    pub from: IntentState,

    /// State after the attempt (equal to `from` when not applied)
    pub to: IntentState,

    pub applied: bool,
}

/// Status query result. Has no client secret field by construction.
#[derive(Clone, Debug, Serialize)]
pub struct IntentStatus {
    pub id: IntentId,
    pub state: IntentState,

    /// Raw processor status when the lookup re-queried the processor
    pub processor_status: Option<String>,

    pub amount: i64,
    pub currency: Currency,
    pub description: Option<String>,
    pub metadata: HashMap<String, String>,
    pub updated_at: DateTime<Utc>,
}
