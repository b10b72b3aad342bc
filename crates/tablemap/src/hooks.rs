//! Lifecycle hooks.
//!
//! A record type opts into hooks by implementing [`Hooks`] and returning
//! `Some(self)` from [`Record::hooks`]. Every callback receives the mapper or
//! transaction that is running the operation, so it can issue further SQL in
//! the same context.
//!
//! # Example
//!
//! ```rust,ignore
//! use tablemap::{Hooks, Record, SqlExecutor, Result};
//!
//! impl Hooks for Product {
//!     fn pre_insert(&mut self, _exec: &dyn SqlExecutor) -> Result<()> {
//!         self.description = self.description.trim().to_string();
//!         Ok(())
//!     }
//! }
//!
//! impl Record for Product {
//!     fn fields() -> Vec<Field<Self>> { /* ... */ }
//!
//!     fn hooks(&mut self) -> Option<&mut dyn Hooks> {
//!         Some(self)
//!     }
//! }
//! ```

use crate::executor::SqlExecutor;
use crate::record::Record;
use std::fmt;
use tablemap_core::Result;

/// Callbacks around mapped operations.
///
/// An error from a `pre_*` hook aborts the operation before any SQL is sent.
/// An error from a `post_*` hook is reported after the statement ran; inside
/// a transaction the statement stays part of it until `end` rolls back.
pub trait Hooks {
    /// Called before the INSERT is built.
    #[allow(unused_variables)]
    fn pre_insert(&mut self, exec: &dyn SqlExecutor) -> Result<()> {
        Ok(())
    }

    /// Called after the INSERT succeeded. Generated keys are already set.
    #[allow(unused_variables)]
    fn post_insert(&mut self, exec: &dyn SqlExecutor) -> Result<()> {
        Ok(())
    }

    /// Called before the UPDATE is built.
    #[allow(unused_variables)]
    fn pre_update(&mut self, exec: &dyn SqlExecutor) -> Result<()> {
        Ok(())
    }

    /// Called after the UPDATE matched its row. The version is already bumped.
    #[allow(unused_variables)]
    fn post_update(&mut self, exec: &dyn SqlExecutor) -> Result<()> {
        Ok(())
    }

    #[allow(unused_variables)]
    fn pre_delete(&mut self, exec: &dyn SqlExecutor) -> Result<()> {
        Ok(())
    }

    #[allow(unused_variables)]
    fn post_delete(&mut self, exec: &dyn SqlExecutor) -> Result<()> {
        Ok(())
    }

    /// Called after a record has been loaded by `get` or `select`.
    #[allow(unused_variables)]
    fn post_get(&mut self, exec: &dyn SqlExecutor) -> Result<()> {
        Ok(())
    }
}

/// Hook points, in the order an operation reaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    PreInsert,
    PostInsert,
    PreUpdate,
    PostUpdate,
    PreDelete,
    PostDelete,
    PostGet,
}

impl Hook {
    pub const fn name(self) -> &'static str {
        match self {
            Hook::PreInsert => "PreInsert",
            Hook::PostInsert => "PostInsert",
            Hook::PreUpdate => "PreUpdate",
            Hook::PostUpdate => "PostUpdate",
            Hook::PreDelete => "PreDelete",
            Hook::PostDelete => "PostDelete",
            Hook::PostGet => "PostGet",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Run one hook on a record; a no-op for records without hooks.
pub(crate) fn invoke<T: Record>(hook: Hook, record: &mut T, exec: &dyn SqlExecutor) -> Result<()> {
    let Some(hooks) = record.hooks() else {
        return Ok(());
    };

    tracing::trace!(hook = %hook, record = std::any::type_name::<T>(), "Invoking hook");

    let result = match hook {
        Hook::PreInsert => hooks.pre_insert(exec),
        Hook::PostInsert => hooks.post_insert(exec),
        Hook::PreUpdate => hooks.pre_update(exec),
        Hook::PostUpdate => hooks.post_update(exec),
        Hook::PreDelete => hooks.pre_delete(exec),
        Hook::PostDelete => hooks.post_delete(exec),
        Hook::PostGet => hooks.post_get(exec),
    };

    if let Err(e) = &result {
        tracing::debug!(hook = %hook, error = %e, "Hook failed");
    }
    result
}
