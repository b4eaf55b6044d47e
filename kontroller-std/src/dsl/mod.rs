//! # Configuration language
//!
//! Controller classes are configured by a short script evaluated once per
//! class:
//!
//! ```text
//! load('application');
//! before(authenticate, {except: ['index']});
//! action(index);
//! action('show', show_post);
//! after(audit);
//! skipBefore('authenticate', {only: 'index'});
//! layout('admin');
//! ```
//!
//! Every statement is a call. Identifiers refer to steps or helpers bound in
//! the controller's namespace or the global one; see [`evaluate`] and
//! [`Word`] for the vocabulary.

mod eval;
mod lexer;
mod parser;

pub use eval::{Word, evaluate};
pub use parser::{Call, Expr, parse};

use std::{collections::HashMap, sync::Arc};

/// Named scripts available to `load`.
#[derive(Debug, Clone, Default)]
pub struct ScriptLibrary {
    scripts: HashMap<String, Arc<str>>,
}

impl ScriptLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a script.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<Arc<str>>) -> &mut Self {
        self.scripts.insert(name.into(), source.into());
        self
    }

    /// The source of a script.
    pub fn get(&self, name: &str) -> Option<Arc<str>> {
        self.scripts.get(name).cloned()
    }

    /// Whether a script of this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    /// Number of scripts.
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether the library is empty.
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
