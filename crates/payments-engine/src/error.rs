//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Amount missing, non-numeric, or below the configured minimum
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Currency is not a three-letter ISO 4217 code
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),

    /// Upstream processor failure (carries the processor's message)
    #[error("Processor error: {0}")]
    Processor(String),

    /// Webhook verification failed.
    ///
    /// Deliberately carries no detail: the reason is logged where it is
    /// detected and never returned to the caller.
    #[error("Webhook verification failed")]
    Verification,

    /// Unknown intent id
    #[error("Payment intent not found: {0}")]
    NotFound(String),

    /// The processor returned an intent that is already tracked locally,
    /// typically because an idempotency key was reused
    #[error("Duplicate payment intent: {0}")]
    Duplicate(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Processor(_) | PaymentError::Storage(_))
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::InvalidAmount(msg) | PaymentError::InvalidCurrency(msg) => msg.clone(),
            PaymentError::Processor(msg) => msg.clone(),
            PaymentError::Verification => "Webhook signature verification failed.".into(),
            PaymentError::NotFound(_) => "Payment intent not found.".into(),
            PaymentError::Duplicate(_) => {
                "Payment intent already exists. Retry with a new idempotency key.".into()
            }
            PaymentError::Config(_) => "Service configuration error.".into(),
            PaymentError::Storage(_) => "An error occurred processing your request.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_message_is_generic() {
        let err = PaymentError::Verification;
        assert_eq!(err.to_string(), "Webhook verification failed");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable() {
        assert!(PaymentError::Processor("timeout".into()).is_retryable());
        assert!(!PaymentError::InvalidAmount("too low".into()).is_retryable());
        assert!(!PaymentError::Duplicate("pi_1".into()).is_retryable());
    }

    #[test]
    fn test_duplicate_message_hides_id() {
        let err = PaymentError::Duplicate("pi_123".into());
        assert!(!err.user_message().contains("pi_123"));
    }
}
