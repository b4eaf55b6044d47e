//! Evaluation of parsed configuration scripts against a controller class.
//!
//! Names resolve in three layers: the class's own namespace, the built-in
//! vocabulary ([`Word`]), then the global namespace handed in by the caller.
//! Evaluation only ever writes to the class.

use super::{
    ScriptLibrary,
    parser::{Call, Expr, parse},
};
use kontroller_core::{
    ActionRegistrar, Binding, ConfigError, ControllerClass, HelperFn, HookFilter, Layout,
    Namespace, Skip, StepFn,
};
use std::sync::Arc;

/// Built-in configuration words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    /// `action(name?, step)`
    Action,
    /// `before(name?, step, filter?)`
    Before,
    /// `after(name?, step, filter?)`
    After,
    /// `prependBefore(name?, step, filter?)`
    PrependBefore,
    /// `prependAfter(name?, step, filter?)`
    PrependAfter,
    /// `skipBefore(name, {only}?)`
    SkipBefore,
    /// `skipAfter(name, {only}?)`
    SkipAfter,
    /// `layout(name | null | false | true)`
    Layout,
    /// `load(script)`
    Load,
}

impl Word {
    /// Look a word up by any of its spellings.
    pub fn lookup(name: &str) -> Option<Word> {
        let word = match name {
            "action" => Word::Action,
            "before" | "beforeFilter" | "before_filter" => Word::Before,
            "after" | "afterFilter" | "after_filter" => Word::After,
            "prependBefore" | "prependBeforeFilter" | "prepend_before" | "prepend_before_filter" => {
                Word::PrependBefore
            }
            "prependAfter" | "prependAfterFilter" | "prepend_after" | "prepend_after_filter" => {
                Word::PrependAfter
            }
            "skipBefore" | "skipBeforeFilter" | "skip_before" | "skip_before_filter" => {
                Word::SkipBefore
            }
            "skipAfter" | "skipAfterFilter" | "skip_after" | "skip_after_filter" => {
                Word::SkipAfter
            }
            "layout" => Word::Layout,
            "load" => Word::Load,
            _ => return None,
        };
        Some(word)
    }
}

enum Resolved<'n> {
    Binding(&'n Binding),
    Word(Word),
}

/// Run `source` against `class`.
///
/// The class should be freshly [`reset`](ControllerClass::reset); evaluation
/// adds to whatever it already holds.
pub fn evaluate(
    source: &str,
    class: &mut ControllerClass,
    globals: &Namespace,
    library: &ScriptLibrary,
) -> Result<(), ConfigError> {
    let mut evaluator = Evaluator {
        class,
        globals,
        library,
        loading: Vec::new(),
    };
    evaluator.run(source)
}

struct Evaluator<'a> {
    class: &'a mut ControllerClass,
    globals: &'a Namespace,
    library: &'a ScriptLibrary,
    loading: Vec<String>,
}

impl Evaluator<'_> {
    fn run(&mut self, source: &str) -> Result<(), ConfigError> {
        for call in parse(source)? {
            self.call(&call)?;
        }
        Ok(())
    }

    fn resolve<'n>(
        methods: &'n Namespace,
        globals: &'n Namespace,
        name: &str,
    ) -> Option<Resolved<'n>> {
        if let Some(binding) = methods.get(name) {
            return Some(Resolved::Binding(binding));
        }
        if let Some(word) = Word::lookup(name) {
            return Some(Resolved::Word(word));
        }
        globals.get(name).map(Resolved::Binding)
    }

    fn call(&mut self, call: &Call) -> Result<(), ConfigError> {
        let line = call.line;
        let resolved = Self::resolve(self.class.methods(), self.globals, &call.callee);
        let helper: Arc<HelperFn> = match resolved {
            Some(Resolved::Word(word)) => return self.word(word, call),
            Some(Resolved::Binding(Binding::Helper(helper))) => Arc::clone(helper),
            Some(Resolved::Binding(Binding::Step(_))) => {
                return Err(ConfigError::NotCallable {
                    name: call.callee.clone(),
                    line,
                });
            }
            None => {
                return Err(ConfigError::UndefinedIdentifier {
                    name: call.callee.clone(),
                    line,
                });
            }
        };

        if !call.args.is_empty() {
            return Err(invalid(call, "helpers take no arguments"));
        }
        tracing::trace!(controller = %self.class.name(), helper = %call.callee, "running helper");
        helper(self.class).map_err(|source| ConfigError::Helper {
            name: call.callee.clone(),
            line,
            source,
        })
    }

    fn word(&mut self, word: Word, call: &Call) -> Result<(), ConfigError> {
        match word {
            Word::Action => {
                let (name, step) = match call.args.as_slice() {
                    [step] => (None, self.step(call, step)?),
                    [Expr::Str(name), step] => (Some(name.as_str()), self.step(call, step)?),
                    _ => return Err(invalid(call, "expected ([name,] step)")),
                };
                self.class.action(name, step)
            }
            Word::Before | Word::After | Word::PrependBefore | Word::PrependAfter => {
                let (name, step, filter) = self.hook_args(call)?;
                match word {
                    Word::Before => self.class.before(name, step, filter),
                    Word::After => self.class.after(name, step, filter),
                    Word::PrependBefore => self.class.prepend_before(name, step, filter),
                    _ => self.class.prepend_after(name, step, filter),
                }
                Ok(())
            }
            Word::SkipBefore | Word::SkipAfter => {
                let (name, skip) = self.skip_args(call)?;
                if word == Word::SkipBefore {
                    self.class.skip_before(&name, skip);
                } else {
                    self.class.skip_after(&name, skip);
                }
                Ok(())
            }
            Word::Layout => {
                let layout = match call.args.as_slice() {
                    [Expr::Str(name)] if name.is_empty() => Layout::Disabled,
                    [Expr::Str(name)] => Layout::Named(name.clone()),
                    [Expr::Null | Expr::Bool(false)] => Layout::Disabled,
                    [Expr::Bool(true)] => Layout::Default,
                    _ => return Err(invalid(call, "expected a layout name, null or false")),
                };
                self.class.set_layout(layout);
                Ok(())
            }
            Word::Load => match call.args.as_slice() {
                [Expr::Str(name)] => self.load(name, call.line),
                _ => Err(invalid(call, "expected a script name")),
            },
        }
    }

    fn load(&mut self, name: &str, line: usize) -> Result<(), ConfigError> {
        if self.loading.iter().any(|n| n == name) {
            return Err(ConfigError::RecursiveLoad {
                name: name.to_string(),
                line,
            });
        }
        let source = self
            .library
            .get(name)
            .ok_or_else(|| ConfigError::UnknownScript {
                name: name.to_string(),
                line,
            })?;

        tracing::trace!(controller = %self.class.name(), script = name, "loading script");
        self.loading.push(name.to_string());
        let result = self.run(&source);
        self.loading.pop();
        result
    }

    /// Resolve an argument that must name a step.
    fn step(&self, call: &Call, expr: &Expr) -> Result<StepFn, ConfigError> {
        let Expr::Identifier { name, line } = expr else {
            return Err(invalid(
                call,
                &format!("expected a step, found {}", expr.describe()),
            ));
        };
        match Self::resolve(self.class.methods(), self.globals, name) {
            Some(Resolved::Binding(Binding::Step(step))) => Ok(step.clone()),
            Some(_) => Err(ConfigError::NotAStep {
                name: name.clone(),
                line: *line,
            }),
            None => Err(ConfigError::UndefinedIdentifier {
                name: name.clone(),
                line: *line,
            }),
        }
    }

    fn hook_args<'c>(
        &self,
        call: &'c Call,
    ) -> Result<(Option<&'c str>, StepFn, Option<HookFilter>), ConfigError> {
        let (name, rest) = match call.args.as_slice() {
            [Expr::Str(name), rest @ ..] => (Some(name.as_str()), rest),
            rest => (None, rest),
        };
        let (step, filter) = match rest {
            [step] => (step, None),
            [step, filter] => (step, Some(filter)),
            _ => return Err(invalid(call, "expected ([name,] step[, filter])")),
        };
        let step = self.step(call, step)?;
        let filter = match filter {
            Some(Expr::Object(entries)) => hook_filter(call, entries)?,
            Some(Expr::Null) | None => None,
            Some(other) => {
                return Err(invalid(
                    call,
                    &format!("expected a filter object, found {}", other.describe()),
                ));
            }
        };
        Ok((name, step, filter))
    }

    fn skip_args(&self, call: &Call) -> Result<(String, Skip), ConfigError> {
        let (target, options) = match call.args.as_slice() {
            [target] => (target, None),
            [target, options] => (target, Some(options)),
            _ => return Err(invalid(call, "expected (name[, {only}])")),
        };
        let name = match target {
            Expr::Str(name) => name.clone(),
            Expr::Identifier { .. } => {
                let step = self.step(call, target)?;
                step.name()
                    .map(str::to_owned)
                    .ok_or_else(|| invalid(call, "cannot skip an anonymous hook"))?
            }
            other => {
                return Err(invalid(
                    call,
                    &format!("expected a hook name, found {}", other.describe()),
                ));
            }
        };

        let skip = match options {
            None | Some(Expr::Null) => Skip::Always,
            Some(Expr::Object(entries)) => {
                let mut skip = Skip::Always;
                for (key, value) in entries {
                    match key.as_str() {
                        "only" => {
                            if let Some(actions) = action_list(call, key, value)? {
                                skip = Skip::Only(actions);
                            }
                        }
                        _ => return Err(invalid(call, &format!("unknown skip option {key}"))),
                    }
                }
                skip
            }
            Some(other) => {
                return Err(invalid(
                    call,
                    &format!("expected an options object, found {}", other.describe()),
                ));
            }
        };
        Ok((name, skip))
    }
}

fn hook_filter(call: &Call, entries: &[(String, Expr)]) -> Result<Option<HookFilter>, ConfigError> {
    let mut filter = HookFilter {
        only: None,
        except: None,
    };
    for (key, value) in entries {
        let actions = action_list(call, key, value)?;
        match key.as_str() {
            "only" => filter.only = actions,
            "except" => filter.except = actions,
            _ => return Err(invalid(call, &format!("unknown filter option {key}"))),
        }
    }
    if filter.only.is_none() && filter.except.is_none() {
        return Ok(None);
    }
    Ok(Some(filter))
}

/// `'a'`, `['a', 'b']` or `null`.
fn action_list(call: &Call, key: &str, value: &Expr) -> Result<Option<Vec<String>>, ConfigError> {
    match value {
        Expr::Null => Ok(None),
        Expr::Str(action) => Ok(Some(vec![action.clone()])),
        Expr::List(items) => items
            .iter()
            .map(|item| match item {
                Expr::Str(action) => Ok(action.clone()),
                other => Err(invalid(
                    call,
                    &format!("{key} lists action names, found {}", other.describe()),
                )),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        other => Err(invalid(
            call,
            &format!("{key} expects an action name or a list, found {}", other.describe()),
        )),
    }
}

fn invalid(call: &Call, message: &str) -> ConfigError {
    ConfigError::InvalidArgument {
        call: call.callee.clone(),
        line: call.line,
        message: message.to_string(),
    }
}
