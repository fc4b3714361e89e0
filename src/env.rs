use std::collections::HashMap;
use std::rc::Rc;

use crate::evaluator::EvalError;

/// A registered function: receives the evaluated arguments and checks its own arity.
pub type Function = Rc<dyn Fn(&[f64]) -> Result<f64, EvalError>>;

/// Number of arguments a registered function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn check(&self, n: usize) -> bool {
        match self {
            Self::Exact(m) => n == *m,
            Self::AtLeast(m) => n >= *m,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{}", n),
            Self::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// Functions and constants that expressions can refer to by name.
///
/// Build it once before evaluating anything and pass it by reference to every
/// evaluation. It is deliberately not `Sync`.
#[derive(Clone, Default)]
pub struct Environment {
    functions: HashMap<String, Function>,
    constants: HashMap<String, f64>,
}

impl Environment {
    /// An environment with no functions and no constants.
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment holding the built-in math functions and constants.
    pub fn with_builtins() -> Self {
        let mut env = Self::new();
        crate::builtins::register(&mut env);
        env
    }

    /// Registers `handler` under `name`, replacing any previous function of that name.
    /// The handler is responsible for rejecting a wrong number of arguments.
    pub fn define_function<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&[f64]) -> Result<f64, EvalError> + 'static,
    {
        self.functions.insert(name.into(), Rc::new(handler));
    }

    /// Registers an infallible function whose argument count is checked against `arity`.
    pub fn define_checked<F>(&mut self, name: &str, arity: Arity, f: F)
    where
        F: Fn(&[f64]) -> f64 + 'static,
    {
        let function = name.to_string();
        self.define_function(name, move |args: &[f64]| {
            if !arity.check(args.len()) {
                return Err(EvalError::ArgumentCount {
                    function: function.clone(),
                    expected: arity,
                    found: args.len(),
                });
            }
            Ok(f(args))
        });
    }

    pub fn define_constant(&mut self, name: impl Into<String>, value: f64) {
        self.constants.insert(name.into(), value);
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<f64> {
        self.constants.get(name).copied()
    }

    /// Resolves a bare identifier: local `variables` first, then constants.
    pub fn lookup(&self, name: &str, variables: &HashMap<String, f64>) -> Option<f64> {
        variables
            .get(name)
            .copied()
            .or_else(|| self.constant(name))
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut functions: Vec<_> = self.function_names().collect();
        functions.sort_unstable();
        f.debug_struct("Environment")
            .field("functions", &functions)
            .field("constants", &self.constants)
            .finish()
    }
}
