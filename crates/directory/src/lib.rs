/*
 * SPDX-FileCopyrightText: 2026 Mail Server Contributors
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! User/domain/alias directory: authentication and address resolution over
//! `store`'s domains/users/aliases tables (§3 User, §9 Open Question on
//! alias resolution).

mod password;

pub use password::{hash_password, verify_password, PasswordError};

use store::{Store, StoreError, User};
use utils::Deadline;

#[derive(Debug, Clone)]
pub enum Credentials {
    Plain { username: String, password: String },
}

pub enum QueryBy<'x> {
    Address(&'x str),
    Credentials(&'x Credentials),
}

pub struct QueryParams<'x> {
    pub by: QueryBy<'x>,
}

impl<'x> QueryParams<'x> {
    pub fn address(address: &'x str) -> Self {
        QueryParams {
            by: QueryBy::Address(address),
        }
    }

    pub fn credentials(credentials: &'x Credentials) -> Self {
        QueryParams {
            by: QueryBy::Credentials(credentials),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DirectoryError {
    NotFound,
    InvalidCredentials,
    Inactive,
    Backend(String),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::NotFound => write!(f, "principal not found"),
            DirectoryError::InvalidCredentials => write!(f, "invalid credentials"),
            DirectoryError::Inactive => write!(f, "principal inactive"),
            DirectoryError::Backend(s) => write!(f, "directory backend error: {s}"),
        }
    }
}

impl std::error::Error for DirectoryError {}

impl From<StoreError> for DirectoryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => DirectoryError::NotFound,
            other => DirectoryError::Backend(other.to_string()),
        }
    }
}

pub struct Directory {
    store: Store,
}

impl Directory {
    pub fn new(store: Store) -> Self {
        Directory { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Splits `address` at the last `@`, the same convention the Sieve
    /// address tests use.
    pub fn split_address(address: &str) -> Option<(&str, &str)> {
        address.rsplit_once('@')
    }

    pub async fn query(
        &self,
        deadline: Deadline,
        params: QueryParams<'_>,
    ) -> Result<User, DirectoryError> {
        match params.by {
            QueryBy::Address(address) => {
                let (local_part, domain) =
                    Self::split_address(address).ok_or(DirectoryError::NotFound)?;
                self.store
                    .find_user_by_address(deadline, local_part, domain)
                    .await?
                    .ok_or(DirectoryError::NotFound)
            }
            QueryBy::Credentials(Credentials::Plain { username, password }) => {
                let (local_part, domain) =
                    Self::split_address(username).ok_or(DirectoryError::InvalidCredentials)?;
                let user = self
                    .store
                    .find_user_by_address(deadline, local_part, domain)
                    .await?
                    .ok_or(DirectoryError::InvalidCredentials)?;
                if !user.active {
                    return Err(DirectoryError::Inactive);
                }
                if !verify_password(&user.password_hash, password) {
                    return Err(DirectoryError::InvalidCredentials);
                }
                Ok(user)
            }
        }
    }

    /// Resolves `address` through the alias table, unconditionally, before
    /// RCPT TO is accepted (Open Question (a) — see DESIGN.md).
    pub async fn resolve_address(
        &self,
        deadline: Deadline,
        address: &str,
    ) -> Result<String, DirectoryError> {
        let (local_part, domain) =
            Self::split_address(address).ok_or(DirectoryError::NotFound)?;
        if let Some(target) = self.store.resolve_alias(deadline, local_part, domain).await? {
            Ok(target)
        } else {
            Ok(address.to_string())
        }
    }

    pub async fn is_local_address(
        &self,
        deadline: Deadline,
        address: &str,
    ) -> Result<bool, DirectoryError> {
        match self.query(deadline, QueryParams::address(address)).await {
            Ok(_) => Ok(true),
            Err(DirectoryError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn authenticates_with_correct_password() {
        let store = Store::open_test().unwrap();
        let deadline = Deadline::after(std::time::Duration::from_secs(5));
        let domain_id = store.create_domain(deadline, "example.com").await.unwrap();
        let hash = hash_password("hunter2").unwrap();
        store
            .create_user(deadline, domain_id, "alice", &hash, 1 << 30)
            .await
            .unwrap();

        let directory = Directory::new(store);
        let creds = Credentials::Plain {
            username: "alice@example.com".into(),
            password: "hunter2".into(),
        };
        let user = directory
            .query(deadline, QueryParams::credentials(&creds))
            .await
            .unwrap();
        assert_eq!(user.local_part, "alice");

        let bad_creds = Credentials::Plain {
            username: "alice@example.com".into(),
            password: "wrong".into(),
        };
        assert!(directory
            .query(deadline, QueryParams::credentials(&bad_creds))
            .await
            .is_err());
    }
}
