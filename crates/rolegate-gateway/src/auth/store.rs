//! Account, role and assignment storage backed by sled.
//!
//! Layout:
//! - `accounts`: account id (big-endian u64) -> JSON account
//! - `account_names`: username -> account id
//! - `roles`: role id -> JSON role
//! - `role_names`: lowercased role name -> role id
//! - `assignments`: account id ++ role id -> JSON assignment
//! - `meta`: id sequences
//!
//! Every write that has to respect a uniqueness rule runs inside a
//! multi-tree transaction, so concurrent inserts cannot both pass the check.

use std::path::Path;

use chrono::{DateTime, Utc};
use rolegate_core::{AccountId, RoleId};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{IVec, Transactional};

use super::AuthError;

const ACCOUNT_SEQ: &[u8] = b"seq:accounts";
const ROLE_SEQ: &[u8] = b"seq:roles";

/// Stored account.
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    /// Stable account ID.
    pub id: AccountId,
    /// Unique, case-sensitive username.
    pub username: String,
    /// Argon2 PHC string. Never serialized to clients.
    pub password_hash: String,
    /// Optional first name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Optional last name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Whether the account may log in.
    pub active: bool,
    /// When created.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Client-facing view without the password hash.
    #[must_use]
    pub fn to_public(&self) -> PublicAccount {
        PublicAccount {
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            active: self.active,
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// Public account representation (for API responses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    /// Account ID.
    pub id: AccountId,
    /// Username.
    pub username: String,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Whether active.
    pub active: bool,
    /// When created.
    pub created_at: DateTime<Utc>,
}

/// Input for [`CredentialStore::insert_account`].
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Normalised username.
    pub username: String,
    /// Already-hashed password.
    pub password_hash: String,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
}

/// Stored role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Stable role ID.
    pub id: RoleId,
    /// Unique (case-insensitive) role name, stored as entered.
    pub name: String,
    /// When created.
    pub created_at: DateTime<Utc>,
}

/// Account to role binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Account side.
    pub account_id: AccountId,
    /// Role side.
    pub role_id: RoleId,
    /// When created.
    pub created_at: DateTime<Utc>,
}

/// Credential store backed by sled.
pub struct CredentialStore {
    db: sled::Db,
    accounts: sled::Tree,
    account_names: sled::Tree,
    roles: sled::Tree,
    role_names: sled::Tree,
    assignments: sled::Tree,
    meta: sled::Tree,
}

impl CredentialStore {
    /// Open or create a credential store under the given data directory.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, AuthError> {
        let db = sled::open(path.join("credentials"))
            .map_err(|e| AuthError::Storage(format!("Failed to open credential database: {e}")))?;
        Self::with_db(db)
    }

    /// Create a store over an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if a tree cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, AuthError> {
        let tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| AuthError::Storage(format!("Failed to open {name} tree: {e}")))
        };

        Ok(Self {
            accounts: tree("accounts")?,
            account_names: tree("account_names")?,
            roles: tree("roles")?,
            role_names: tree("role_names")?,
            assignments: tree("assignments")?,
            meta: tree("meta")?,
            db,
        })
    }

    // ---- accounts ----

    /// Number of accounts.
    #[must_use]
    pub fn count_accounts(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the account table is empty.
    #[must_use]
    pub fn accounts_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Insert an account, assigning the next id.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the username is taken.
    pub fn insert_account(&self, new: NewAccount) -> Result<Account, AuthError> {
        let account = (&self.accounts, &self.account_names, &self.meta)
            .transaction(|(accounts, names, meta)| -> TxResult<Account> {
                if names.get(new.username.as_bytes())?.is_some() {
                    return abort(AuthError::Conflict(format!(
                        "Username '{}' already exists",
                        new.username
                    )));
                }

                let id = next_id(meta, ACCOUNT_SEQ)?;
                let account = Account {
                    id: AccountId::new(id),
                    username: new.username.clone(),
                    password_hash: new.password_hash.clone(),
                    first_name: new.first_name.clone(),
                    last_name: new.last_name.clone(),
                    active: true,
                    created_at: Utc::now(),
                };

                accounts.insert(id_key(id), tx_encode(&account)?)?;
                names.insert(new.username.as_bytes(), id_key(id))?;
                Ok(account)
            })
            .map_err(map_tx)?;

        self.flush()?;
        Ok(account)
    }

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_account(&self, id: AccountId) -> Result<Option<Account>, AuthError> {
        self.accounts
            .get(id.get().to_be_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Find an account by exact username.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn find_by_username(&self, username: &str) -> Result<Option<Account>, AuthError> {
        match self.account_names.get(username.as_bytes())? {
            Some(id) => self.get_account(AccountId::new(decode_id(&id)?)),
            None => Ok(None),
        }
    }

    /// List all accounts in id order.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list_accounts(&self) -> Result<Vec<Account>, AuthError> {
        self.accounts
            .iter()
            .values()
            .map(|value| decode(&value?))
            .collect()
    }

    /// Delete an account and its assignments.
    ///
    /// Returns whether the account existed.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete_account(&self, id: AccountId) -> Result<bool, AuthError> {
        let removed = (&self.accounts, &self.account_names)
            .transaction(|(accounts, names)| -> TxResult<bool> {
                let Some(bytes) = accounts.remove(id_key(id.get()))? else {
                    return Ok(false);
                };
                let account: Account = tx_decode(&bytes)?;
                names.remove(account.username.as_bytes())?;
                Ok(true)
            })
            .map_err(map_tx)?;

        if removed {
            for key in self.assignments.scan_prefix(id.get().to_be_bytes()).keys() {
                self.assignments.remove(key?)?;
            }
        }

        self.flush()?;
        Ok(removed)
    }

    /// Enable or disable an account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub fn set_account_active(&self, id: AccountId, active: bool) -> Result<Account, AuthError> {
        self.update_account(id, |account| account.active = active)
    }

    /// Replace an account's password hash.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account does not exist.
    pub fn update_password_hash(&self, id: AccountId, hash: String) -> Result<(), AuthError> {
        self.update_account(id, move |account| account.password_hash.clone_from(&hash))
            .map(|_| ())
    }

    fn update_account<F>(&self, id: AccountId, apply: F) -> Result<Account, AuthError>
    where
        F: Fn(&mut Account),
    {
        let account = self
            .accounts
            .transaction(|accounts| -> TxResult<Account> {
                let Some(bytes) = accounts.get(id_key(id.get()))? else {
                    return abort(AuthError::NotFound(format!("Account {id}")));
                };
                let mut account: Account = tx_decode(&bytes)?;
                apply(&mut account);
                accounts.insert(id_key(id.get()), tx_encode(&account)?)?;
                Ok(account)
            })
            .map_err(map_tx)?;

        self.flush()?;
        Ok(account)
    }

    // ---- roles ----

    /// Number of roles.
    #[must_use]
    pub fn count_roles(&self) -> usize {
        self.roles.len()
    }

    /// Whether the role table is empty.
    #[must_use]
    pub fn roles_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Insert a role, assigning the next id.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if a role with the same name (ignoring case) exists.
    pub fn insert_role(&self, name: &str) -> Result<Role, AuthError> {
        let name_key = role_name_key(name);

        let role = (&self.roles, &self.role_names, &self.meta)
            .transaction(|(roles, names, meta)| -> TxResult<Role> {
                if names.get(name_key.as_bytes())?.is_some() {
                    return abort(AuthError::Conflict(format!("Role '{name}' already exists")));
                }

                let id = next_id(meta, ROLE_SEQ)?;
                let role = Role {
                    id: RoleId::new(id),
                    name: name.to_string(),
                    created_at: Utc::now(),
                };

                roles.insert(id_key(id), tx_encode(&role)?)?;
                names.insert(name_key.as_bytes(), id_key(id))?;
                Ok(role)
            })
            .map_err(map_tx)?;

        self.flush()?;
        Ok(role)
    }

    /// Get a role by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_role(&self, id: RoleId) -> Result<Option<Role>, AuthError> {
        self.roles
            .get(id.get().to_be_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Find a role by name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, AuthError> {
        match self.role_names.get(role_name_key(name).as_bytes())? {
            Some(id) => self.get_role(RoleId::new(decode_id(&id)?)),
            None => Ok(None),
        }
    }

    /// List all roles in id order.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list_roles(&self) -> Result<Vec<Role>, AuthError> {
        self.roles
            .iter()
            .values()
            .map(|value| decode(&value?))
            .collect()
    }

    /// Delete a role and every assignment of it.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete_role(&self, id: RoleId) -> Result<bool, AuthError> {
        let removed = (&self.roles, &self.role_names)
            .transaction(|(roles, names)| -> TxResult<bool> {
                let Some(bytes) = roles.remove(id_key(id.get()))? else {
                    return Ok(false);
                };
                let role: Role = tx_decode(&bytes)?;
                names.remove(role_name_key(&role.name).as_bytes())?;
                Ok(true)
            })
            .map_err(map_tx)?;

        if removed {
            let suffix = id.get().to_be_bytes();
            for key in self.assignments.iter().keys() {
                let key = key?;
                if key.ends_with(&suffix) {
                    self.assignments.remove(key)?;
                }
            }
        }

        self.flush()?;
        Ok(removed)
    }

    // ---- assignments ----

    /// Bind a role to an account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if either side is missing and `Conflict` if the
    /// pair is already bound.
    pub fn insert_assignment(
        &self,
        account_id: AccountId,
        role_id: RoleId,
    ) -> Result<Assignment, AuthError> {
        let key = assignment_key(account_id, role_id);

        let assignment = (&self.accounts, &self.roles, &self.assignments)
            .transaction(|(accounts, roles, assignments)| -> TxResult<Assignment> {
                if accounts.get(id_key(account_id.get()))?.is_none() {
                    return abort(AuthError::NotFound(format!("Account {account_id}")));
                }
                if roles.get(id_key(role_id.get()))?.is_none() {
                    return abort(AuthError::NotFound(format!("Role {role_id}")));
                }
                if assignments.get(key.clone())?.is_some() {
                    return abort(AuthError::Conflict(format!(
                        "Account {account_id} already has role {role_id}"
                    )));
                }

                let assignment = Assignment {
                    account_id,
                    role_id,
                    created_at: Utc::now(),
                };
                assignments.insert(key.clone(), tx_encode(&assignment)?)?;
                Ok(assignment)
            })
            .map_err(map_tx)?;

        self.flush()?;
        Ok(assignment)
    }

    /// Look up one binding.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn find_assignment(
        &self,
        account_id: AccountId,
        role_id: RoleId,
    ) -> Result<Option<Assignment>, AuthError> {
        self.assignments
            .get(assignment_key(account_id, role_id))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Remove one binding. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete_assignment(
        &self,
        account_id: AccountId,
        role_id: RoleId,
    ) -> Result<bool, AuthError> {
        let removed = self
            .assignments
            .remove(assignment_key(account_id, role_id))?
            .is_some();
        self.flush()?;
        Ok(removed)
    }

    /// Roles currently bound to an account, in role id order.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list_roles_for_account(&self, account_id: AccountId) -> Result<Vec<Role>, AuthError> {
        let mut roles = Vec::new();
        for value in self.assignments.scan_prefix(account_id.get().to_be_bytes()).values() {
            let assignment: Assignment = decode(&value?)?;
            if let Some(role) = self.get_role(assignment.role_id)? {
                roles.push(role);
            }
        }
        Ok(roles)
    }

    /// Accounts currently holding a role.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list_accounts_with_role(&self, role_id: RoleId) -> Result<Vec<Account>, AuthError> {
        let suffix = role_id.get().to_be_bytes();
        let mut accounts = Vec::new();
        for key in self.assignments.iter().keys() {
            let key = key?;
            if !key.ends_with(&suffix) {
                continue;
            }
            let account_id = AccountId::new(decode_id(&key[..8])?);
            if let Some(account) = self.get_account(account_id)? {
                accounts.push(account);
            }
        }
        Ok(accounts)
    }

    /// Flush pending writes to disk.
    ///
    /// # Errors
    ///
    /// Returns error if the flush fails.
    pub fn flush(&self) -> Result<(), AuthError> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| AuthError::Storage(format!("Flush error: {e}")))
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("accounts", &self.accounts.len())
            .field("roles", &self.roles.len())
            .finish_non_exhaustive()
    }
}

type TxResult<T> = Result<T, ConflictableTransactionError<AuthError>>;

fn abort<T>(err: AuthError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

fn map_tx(err: TransactionError<AuthError>) -> AuthError {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => AuthError::Storage(err.to_string()),
    }
}

fn next_id(meta: &TransactionalTree, key: &[u8]) -> TxResult<u64> {
    let current = match meta.get(key)? {
        Some(bytes) => decode_id(&bytes).or_else(abort)?,
        None => 0,
    };
    let next = current + 1;
    meta.insert(key, id_key(next))?;
    Ok(next)
}

fn role_name_key(name: &str) -> String {
    name.to_lowercase()
}

fn id_key(id: u64) -> IVec {
    IVec::from(&id.to_be_bytes()[..])
}

fn assignment_key(account_id: AccountId, role_id: RoleId) -> IVec {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&account_id.get().to_be_bytes());
    key[8..].copy_from_slice(&role_id.get().to_be_bytes());
    IVec::from(&key[..])
}

fn decode_id(bytes: &[u8]) -> Result<u64, AuthError> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| AuthError::Storage("Corrupt id bytes".to_string()))?;
    Ok(u64::from_be_bytes(array))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AuthError> {
    serde_json::from_slice(bytes)
        .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))
}

fn tx_decode<T: DeserializeOwned>(bytes: &[u8]) -> TxResult<T> {
    decode(bytes).or_else(abort)
}

fn tx_encode<T: Serialize>(value: &T) -> TxResult<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| AuthError::Storage(format!("Serialization error: {e}")))
        .or_else(abort)
}
