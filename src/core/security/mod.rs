// src/core/security/mod.rs

//! Role and policy metadata mutated by the GRANT/REVOKE and security-policy
//! statements. Resource paths are dotted strings (`database.class.Person`);
//! permission checks fall back along the path (`database.class.*`,
//! `database.*`) when no exact grant exists.

use crate::core::common::QuiverError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    Create,
    Read,
    Update,
    Delete,
    Execute,
}

impl Permission {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Execute => "execute",
        }
    }
}

/// A named policy: per-operation rule predicates plus an active flag.
/// Predicates are stored as expression text and handed to the embedding
/// engine's filter evaluator when rows are checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub name: String,
    pub active: bool,
    pub rules: HashMap<Permission, String>,
}

impl SecurityPolicy {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), active: true, rules: HashMap::new() }
    }

    pub fn set_rule(&mut self, permission: Permission, predicate: &str) {
        self.rules.insert(permission, predicate.to_string());
    }

    #[must_use]
    pub fn rule(&self, permission: Permission) -> Option<&str> {
        self.rules.get(&permission).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    grants: HashMap<String, HashSet<Permission>>,
    /// resource path -> policy name
    policies: HashMap<String, String>,
}

impl Role {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), grants: HashMap::new(), policies: HashMap::new() }
    }
}

#[derive(Debug, Default)]
pub struct SecurityManager {
    roles: HashMap<String, Role>,
    policies: HashMap<String, SecurityPolicy>,
}

impl SecurityManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_role(&mut self, name: &str) -> Result<(), QuiverError> {
        if self.roles.contains_key(name) {
            return Err(QuiverError::AlreadyExists { name: name.to_string() });
        }
        self.roles.insert(name.to_string(), Role::new(name));
        Ok(())
    }

    fn require_role_mut(&mut self, name: &str) -> Result<&mut Role, QuiverError> {
        self.roles.get_mut(name).ok_or_else(|| QuiverError::NotFound(format!("role '{name}'")))
    }

    pub fn grant(
        &mut self,
        role: &str,
        resource: &str,
        permission: Permission,
    ) -> Result<(), QuiverError> {
        let role = self.require_role_mut(role)?;
        role.grants.entry(resource.to_string()).or_default().insert(permission);
        Ok(())
    }

    pub fn revoke(
        &mut self,
        role: &str,
        resource: &str,
        permission: Permission,
    ) -> Result<(), QuiverError> {
        let role = self.require_role_mut(role)?;
        if let Some(perms) = role.grants.get_mut(resource) {
            perms.remove(&permission);
            if perms.is_empty() {
                role.grants.remove(resource);
            }
        }
        Ok(())
    }

    /// Checks a permission against the role's grants, walking up the dotted
    /// resource path through wildcard grants on miss.
    #[must_use]
    pub fn is_allowed(&self, role: &str, resource: &str, permission: Permission) -> bool {
        let Some(role) = self.roles.get(role) else {
            return false;
        };
        if role.grants.get(resource).is_some_and(|p| p.contains(&permission)) {
            return true;
        }
        let mut path = resource;
        while let Some(dot) = path.rfind('.') {
            path = &path[..dot];
            let wildcard = format!("{path}.*");
            if role.grants.get(&wildcard).is_some_and(|p| p.contains(&permission)) {
                return true;
            }
        }
        false
    }

    pub fn create_policy(&mut self, name: &str) -> Result<(), QuiverError> {
        if self.policies.contains_key(name) {
            return Err(QuiverError::AlreadyExists { name: name.to_string() });
        }
        self.policies.insert(name.to_string(), SecurityPolicy::new(name));
        Ok(())
    }

    pub fn alter_policy(
        &mut self,
        name: &str,
        permission: Permission,
        predicate: &str,
    ) -> Result<(), QuiverError> {
        let policy = self
            .policies
            .get_mut(name)
            .ok_or_else(|| QuiverError::NotFound(format!("security policy '{name}'")))?;
        policy.set_rule(permission, predicate);
        Ok(())
    }

    #[must_use]
    pub fn policy(&self, name: &str) -> Option<&SecurityPolicy> {
        self.policies.get(name)
    }

    /// Attaches a named policy to a role for one resource path.
    pub fn set_role_policy(
        &mut self,
        role: &str,
        resource: &str,
        policy: &str,
    ) -> Result<(), QuiverError> {
        if !self.policies.contains_key(policy) {
            return Err(QuiverError::NotFound(format!("security policy '{policy}'")));
        }
        let role = self.require_role_mut(role)?;
        role.policies.insert(resource.to_string(), policy.to_string());
        Ok(())
    }

    pub fn remove_role_policy(&mut self, role: &str, resource: &str) -> Result<(), QuiverError> {
        let role = self.require_role_mut(role)?;
        role.policies.remove(resource);
        Ok(())
    }

    /// The active policy applied to a role for a resource path, if any.
    #[must_use]
    pub fn role_policy(&self, role: &str, resource: &str) -> Option<&SecurityPolicy> {
        let role = self.roles.get(role)?;
        let name = role.policies.get(resource)?;
        self.policies.get(name).filter(|p| p.active)
    }
}
