use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared::domain::Operator;
use tracing::info;

use crate::error::AuthError;

/// Who is operating the console right now, if anyone.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<Operator>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub email: String,
    pub password: String,
}

impl Credential {
    /// Bench account shipped with the console.
    pub fn bench_operator() -> Self {
        Self {
            id: "1".to_string(),
            email: "admin@email.com".to_string(),
            password: "password".to_string(),
        }
    }
}

/// Credential list held in memory with a single signed-in slot.
pub struct LocalIdentity {
    accounts: RwLock<Vec<Credential>>,
    current: RwLock<Option<Operator>>,
}

impl LocalIdentity {
    pub fn new(accounts: Vec<Credential>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
            current: RwLock::new(None),
        }
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Operator, AuthError> {
        let operator = self
            .accounts
            .read()
            .iter()
            .find(|account| same_email(&account.email, email) && account.password == password)
            .map(|account| Operator {
                id: account.id.clone(),
                email: account.email.clone(),
            })
            .ok_or(AuthError::InvalidCredentials)?;

        info!(operator = %operator.email, "operator signed in");
        *self.current.write() = Some(operator.clone());
        Ok(operator)
    }

    /// Registers a new account and signs it in.
    pub fn sign_up(&self, email: &str, password: &str) -> Result<Operator, AuthError> {
        let mut accounts = self.accounts.write();
        if accounts
            .iter()
            .any(|account| same_email(&account.email, email))
        {
            return Err(AuthError::UserAlreadyExists);
        }

        let credential = Credential {
            id: (accounts.len() + 1).to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let operator = Operator {
            id: credential.id.clone(),
            email: credential.email.clone(),
        };
        accounts.push(credential);
        drop(accounts);

        info!(operator = %operator.email, "operator account created");
        *self.current.write() = Some(operator.clone());
        Ok(operator)
    }

    pub fn sign_out(&self) {
        if let Some(operator) = self.current.write().take() {
            info!(operator = %operator.email, "operator signed out");
        }
    }
}

impl IdentityProvider for LocalIdentity {
    fn current_user(&self) -> Option<Operator> {
        self.current.read().clone()
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
