//! Action filters for hooks.
//!
//! A hook may be limited to some actions (`only`) or excluded from some
//! (`except`). Both lists may coexist on one hook once a skip has rewritten
//! it; see [`HookFilter::admits`] for the exact rule.

/// Restricts which actions a hook runs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFilter {
    /// Run only for these actions.
    pub only: Option<Vec<String>>,
    /// Run for every action except these.
    pub except: Option<Vec<String>>,
}

impl HookFilter {
    /// A filter admitting only the listed actions.
    pub fn only<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: Some(actions.into_iter().map(Into::into).collect()),
            except: None,
        }
    }

    /// A filter admitting every action except the listed ones.
    pub fn except<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: None,
            except: Some(actions.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether the hook runs for `action`.
    ///
    /// True if `only` lists the action and `except` does not, or if `except`
    /// is present and does not list it. Once `except` is present, an action
    /// missing from `only` is still admitted.
    pub fn admits(&self, action: &str) -> bool {
        let listed =
            |names: &Option<Vec<String>>| names.as_ref().map(|v| v.iter().any(|n| n == action));

        match (listed(&self.only), listed(&self.except)) {
            (Some(true), None | Some(false)) => true,
            (_, Some(false)) => true,
            _ => false,
        }
    }

    /// Merge `actions` into the `except` list, creating it if needed.
    pub(crate) fn exclude(&mut self, actions: &[String]) {
        self.except
            .get_or_insert_with(Vec::new)
            .extend(actions.iter().cloned());
    }
}

/// How `skip_before` / `skip_after` treat the hook they find.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Skip {
    /// Remove the hook from every future queue.
    #[default]
    Always,
    /// Keep the hook but stop running it for these actions.
    Only(Vec<String>),
}

impl Skip {
    /// Skip only for the listed actions.
    pub fn only<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Skip::Only(actions.into_iter().map(Into::into).collect())
    }
}
