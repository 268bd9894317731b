// src/core/query/statements.rs

//! The parsed-statement surface the executor consumes. The text parser lives
//! in the embedding engine; this crate receives statements already shaped as
//! these values.

use crate::core::common::types::Rid;
use crate::core::query::expression::Expression;
use crate::core::schema::ClassKind;
use crate::core::security::Permission;
use crate::core::types::Value;
use std::collections::BTreeMap;

/// Target clause of `DELETE VERTEX` / `DELETE EDGE`.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteTarget {
    /// Every record of the class, subclasses included.
    Class(String),
    /// An explicit rid list.
    Rids(Vec<Rid>),
    /// Rows produced by a nested SELECT; rid-carrying rows name the targets.
    Subquery(Box<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub class: String,
    pub filter: Option<Expression>,
    pub distinct: bool,
    /// `SELECT count(*)` shape; collapses the stream to one `{count}` row.
    pub count: bool,
    pub limit: Option<usize>,
    /// Fan the cluster scan out across worker threads.
    pub parallel: bool,
}

impl SelectStatement {
    #[must_use]
    pub fn from_class(class: &str) -> Self {
        Self {
            class: class.to_string(),
            filter: None,
            distinct: false,
            count: false,
            limit: None,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    // transactions
    Begin,
    Commit,
    Rollback,

    // schema DDL
    CreateClass {
        name: String,
        kind: ClassKind,
        is_abstract: bool,
        superclass: Option<String>,
        clusters: usize,
        if_not_exists: bool,
    },
    DropClass {
        name: String,
        /// `UNSAFE` clause: drop even when records exist.
        unsafe_drop: bool,
        if_exists: bool,
    },
    CreateIndex {
        name: String,
        class: String,
        property: String,
        unique: bool,
        if_not_exists: bool,
    },
    DropIndex {
        name: String,
        if_exists: bool,
    },
    RebuildIndex {
        name: String,
    },
    CreateSequence {
        name: String,
        start: i64,
    },
    AlterSequence {
        name: String,
        increment: i64,
    },

    // data
    Insert {
        class: String,
        properties: BTreeMap<String, Value>,
    },
    Select(SelectStatement),
    /// Plain record delete; safe-delete guarded against graph elements.
    Delete {
        class: String,
        filter: Option<Expression>,
        batch: Option<usize>,
    },
    DeleteVertex {
        target: DeleteTarget,
        batch: Option<usize>,
    },
    DeleteEdge {
        target: DeleteTarget,
        batch: Option<usize>,
    },

    // security
    Grant {
        permission: Permission,
        resource: String,
        role: String,
    },
    Revoke {
        permission: Permission,
        resource: String,
        role: String,
    },
    CreateSecurityPolicy {
        name: String,
    },
    AlterSecurityPolicy {
        name: String,
        permission: Permission,
        predicate: String,
    },
    AlterRoleSetPolicy {
        role: String,
        resource: String,
        policy: String,
    },
    AlterRoleRemovePolicy {
        role: String,
        resource: String,
    },

    // introspection
    Explain(Box<Statement>),
    Profile(Box<Statement>),

    // scripting
    Foreach {
        variable: String,
        items: Expression,
        body: Vec<Statement>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    If {
        condition: Expression,
        body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    Return(Expression),
    Let {
        name: String,
        value: Expression,
    },
}

impl Statement {
    #[must_use]
    pub fn select(class: &str) -> Self {
        Self::Select(SelectStatement::from_class(class))
    }

    /// Keyword-style name for logging and error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Rollback => "ROLLBACK",
            Self::CreateClass { .. } => "CREATE CLASS",
            Self::DropClass { .. } => "DROP CLASS",
            Self::CreateIndex { .. } => "CREATE INDEX",
            Self::DropIndex { .. } => "DROP INDEX",
            Self::RebuildIndex { .. } => "REBUILD INDEX",
            Self::CreateSequence { .. } => "CREATE SEQUENCE",
            Self::AlterSequence { .. } => "ALTER SEQUENCE",
            Self::Insert { .. } => "INSERT",
            Self::Select(_) => "SELECT",
            Self::Delete { .. } => "DELETE",
            Self::DeleteVertex { .. } => "DELETE VERTEX",
            Self::DeleteEdge { .. } => "DELETE EDGE",
            Self::Grant { .. } => "GRANT",
            Self::Revoke { .. } => "REVOKE",
            Self::CreateSecurityPolicy { .. } => "CREATE SECURITY POLICY",
            Self::AlterSecurityPolicy { .. } => "ALTER SECURITY POLICY",
            Self::AlterRoleSetPolicy { .. } => "ALTER ROLE SET POLICY",
            Self::AlterRoleRemovePolicy { .. } => "ALTER ROLE REMOVE POLICY",
            Self::Explain(_) => "EXPLAIN",
            Self::Profile(_) => "PROFILE",
            Self::Foreach { .. } => "FOREACH",
            Self::While { .. } => "WHILE",
            Self::If { .. } => "IF",
            Self::Return(_) => "RETURN",
            Self::Let { .. } => "LET",
        }
    }

}
