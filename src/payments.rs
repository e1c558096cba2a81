//! Sandbox payment gateway adapter.
//!
//! Presents the hosted gateway's interface (initialize -> checkout link,
//! verify -> settled status) while keeping every attempt in memory only;
//! nothing is persisted to the workspace database.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::repo::StoreError;

#[derive(Debug, Clone)]
pub struct PaymentDescriptor {
    pub amount: f64,
    pub currency: String,
    pub email: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAttempt {
    pub tx_ref: String,
    pub amount: f64,
    pub currency: String,
    pub email: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub link: String,
    pub created_at: String,
}

#[derive(Debug, Default)]
pub struct PaymentGateway {
    attempts: Vec<PaymentAttempt>,
}

impl PaymentGateway {
    pub fn initialize(&mut self, desc: PaymentDescriptor) -> Result<&PaymentAttempt, StoreError> {
        if !desc.amount.is_finite() || desc.amount <= 0.0 {
            return Err(StoreError::validation("amount must be positive"));
        }
        let currency = desc.currency.trim().to_uppercase();
        if currency.is_empty() {
            return Err(StoreError::validation("currency must not be empty"));
        }
        let email = desc.email.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(StoreError::validation("email must be a valid address"));
        }

        let tx_ref = format!("edumanager-{}", Uuid::new_v4());
        let attempt = PaymentAttempt {
            link: format!("https://sandbox.checkout.example/pay/{}", tx_ref),
            tx_ref,
            amount: desc.amount,
            currency,
            email,
            name: desc.name,
            description: desc.description,
            status: "pending".to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.attempts.insert(0, attempt);
        Ok(&self.attempts[0])
    }

    /// The sandbox settles on first verification.
    pub fn verify(&mut self, tx_ref: &str) -> Result<&PaymentAttempt, StoreError> {
        let attempt = self
            .attempts
            .iter_mut()
            .find(|a| a.tx_ref == tx_ref)
            .ok_or_else(|| StoreError::not_found("payment attempt"))?;
        if attempt.status == "pending" {
            attempt.status = "successful".to_string();
        }
        Ok(attempt)
    }

    pub fn attempts(&self) -> &[PaymentAttempt] {
        &self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> PaymentDescriptor {
        PaymentDescriptor {
            amount: 150.0,
            currency: "ngn".to_string(),
            email: "parent@example.com".to_string(),
            name: "Term fees".to_string(),
            description: "First term tuition".to_string(),
        }
    }

    #[test]
    fn initialize_issues_link_and_pending_status() {
        let mut gw = PaymentGateway::default();
        let attempt = gw.initialize(descriptor()).expect("initialize");
        assert_eq!(attempt.status, "pending");
        assert_eq!(attempt.currency, "NGN");
        assert!(attempt.link.contains(&attempt.tx_ref));
    }

    #[test]
    fn verify_settles_and_unknown_ref_is_an_error() {
        let mut gw = PaymentGateway::default();
        let tx_ref = gw.initialize(descriptor()).expect("initialize").tx_ref.clone();
        let verified = gw.verify(&tx_ref).expect("verify");
        assert_eq!(verified.status, "successful");
        assert!(gw.verify("edumanager-missing").is_err());
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let mut gw = PaymentGateway::default();
        let mut bad = descriptor();
        bad.amount = 0.0;
        assert!(gw.initialize(bad).is_err());
        assert!(gw.attempts().is_empty());
    }
}
