use std::collections::BTreeMap;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::PublicKey;

/// The set of aliases a record's content key is wrapped for.
///
/// The owner is always a member; there is no way to build an `Acl`
/// without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acl {
    owner: String,
    members: BTreeMap<String, PublicKey>,
}

impl Acl {
    /// An ACL containing only the owner.
    pub fn new(owner: impl Into<String>, owner_key: PublicKey) -> Self {
        let owner = owner.into();
        let mut members = BTreeMap::new();
        members.insert(owner.clone(), owner_key);
        Self { owner, members }
    }

    /// Add a member. Re-adding an alias replaces its key, except for the
    /// owner whose key is fixed at construction.
    pub fn with_member(mut self, alias: impl Into<String>, key: PublicKey) -> Self {
        let alias = alias.into();
        if alias != self.owner {
            self.members.insert(alias, key);
        }
        self
    }

    /// Build from an explicit member map, which must contain `owner`.
    pub fn from_members(
        owner: impl Into<String>,
        members: BTreeMap<String, PublicKey>,
    ) -> CryptoResult<Self> {
        let owner = owner.into();
        if owner.is_empty() {
            return Err(CryptoError::InvalidAcl("owner alias is empty".into()));
        }
        if !members.contains_key(&owner) {
            return Err(CryptoError::InvalidAcl(format!(
                "owner '{owner}' missing from member list"
            )));
        }
        if let Some(empty) = members.keys().find(|a| a.is_empty()) {
            return Err(CryptoError::InvalidAcl(format!(
                "empty alias in member list: {empty:?}"
            )));
        }
        Ok(Self { owner, members })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.members.contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PublicKey)> {
        self.members.iter().map(|(a, k)| (a.as_str(), k))
    }
}
