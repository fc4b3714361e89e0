use std::collections::HashMap;

use crate::{env::Environment, lexer::tokenize, parser::parse, parser::Node, Error};

/// An expression kept as source text, parsed on first use and evaluated as `f64`.
///
/// The parsed tree is cached after the first [`evaluate`](Flux::evaluate) and
/// reused from then on. Changing the source through
/// [`set_source`](Flux::set_source) does **not** drop that cache: evaluation
/// keeps using the old tree until [`refresh`](Flux::refresh) is called. This
/// lets a layout pass evaluate the same expressions every frame while paying
/// for parsing only once.
///
/// An empty source always evaluates to `0.0` and is never parsed.
///
/// ```
/// use flux::{Environment, Flux};
///
/// let env = Environment::with_builtins();
/// let mut width = Flux::new("psx * 0.5 - 8");
/// width.set_variable("psx", 640.0);
/// assert_eq!(width.evaluate(&env).unwrap(), 312.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flux {
    source: String,
    tree: Option<Node>,
    /// Local variables, consulted before the environment's constants.
    pub variables: HashMap<String, f64>,
}

impl Flux {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            tree: None,
            variables: HashMap::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replaces the source text. The cached tree, if any, is kept.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub fn tree(&self) -> Option<&Node> {
        self.tree.as_ref()
    }

    pub fn is_parsed(&self) -> bool {
        self.tree.is_some()
    }

    pub fn variables_mut(&mut self) -> &mut HashMap<String, f64> {
        &mut self.variables
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: f64) {
        self.variables.insert(name.into(), value);
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set_variable(name, value);
        self
    }

    /// Re-tokenizes and re-parses the current source, replacing the cached tree.
    ///
    /// On failure the previous tree is left untouched.
    pub fn refresh(&mut self) -> Result<(), Error> {
        if self.source.is_empty() {
            return Ok(());
        }

        self.tree = Some(parse_source(&self.source)?);
        Ok(())
    }

    /// Evaluates the cached tree, parsing the source first if it never was.
    pub fn evaluate(&mut self, env: &Environment) -> Result<f64, Error> {
        if self.source.is_empty() {
            return Ok(0.0);
        }

        let tree = match self.tree.take() {
            Some(tree) => tree,
            None => parse_source(&self.source)?,
        };
        let tree = self.tree.insert(tree);

        Ok(tree.evaluate(&self.variables, env)?)
    }
}

fn parse_source(source: &str) -> Result<Node, Error> {
    let tokens = tokenize(source)?;
    let tree = parse(&tokens)?;
    log::debug!("parsed {:?} as {}", source, tree);
    Ok(tree)
}

impl std::fmt::Display for Flux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl From<&str> for Flux {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for Flux {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

impl From<f64> for Flux {
    fn from(value: f64) -> Self {
        Self::new(value.to_string())
    }
}

impl From<f32> for Flux {
    fn from(value: f32) -> Self {
        Self::new(value.to_string())
    }
}

impl From<i32> for Flux {
    fn from(value: i32) -> Self {
        Self::new(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_is_zero_and_never_parsed() {
        let env = Environment::new();
        let mut flux = Flux::default();
        assert_eq!(flux.evaluate(&env), Ok(0.0));
        assert!(!flux.is_parsed());

        flux.refresh().unwrap();
        assert!(!flux.is_parsed());
    }

    #[test]
    fn test_parses_lazily_once() {
        let env = Environment::new();
        let mut flux = Flux::new("1 + 2");
        assert!(!flux.is_parsed());
        assert_eq!(flux.evaluate(&env), Ok(3.0));
        assert!(flux.is_parsed());
        assert_eq!(flux.evaluate(&env), Ok(3.0));
    }

    #[test]
    fn test_variables_are_read_at_evaluation_time() {
        let env = Environment::new();
        let mut flux = Flux::new("psx / 2").with_variable("psx", 100.0);
        assert_eq!(flux.evaluate(&env), Ok(50.0));

        flux.variables_mut().insert("psx".to_string(), 300.0);
        assert_eq!(flux.evaluate(&env), Ok(150.0));
    }

    #[test]
    fn test_source_change_without_refresh_is_stale() {
        let env = Environment::new();
        let mut flux = Flux::new("1 + 1");
        assert_eq!(flux.evaluate(&env), Ok(2.0));

        flux.set_source("10 * 10");
        assert_eq!(flux.source(), "10 * 10");
        assert_eq!(flux.evaluate(&env), Ok(2.0));

        flux.refresh().unwrap();
        assert_eq!(flux.evaluate(&env), Ok(100.0));
    }

    #[test]
    fn test_source_change_before_first_evaluation_is_seen() {
        let env = Environment::new();
        let mut flux = Flux::new("1");
        flux.set_source("2");
        assert_eq!(flux.evaluate(&env), Ok(2.0));
    }

    #[test]
    fn test_emptied_source_short_circuits_cache() {
        let env = Environment::new();
        let mut flux = Flux::new("5");
        assert_eq!(flux.evaluate(&env), Ok(5.0));
        flux.set_source("");
        assert_eq!(flux.evaluate(&env), Ok(0.0));
        assert!(flux.is_parsed());
    }

    #[test]
    fn test_failed_refresh_keeps_previous_tree() {
        let env = Environment::new();
        let mut flux = Flux::new("4");
        flux.evaluate(&env).unwrap();

        flux.set_source("4 +");
        assert!(matches!(flux.refresh(), Err(Error::Parse(_))));
        assert_eq!(flux.evaluate(&env), Ok(4.0));
    }

    #[test]
    fn test_errors_are_classified() {
        let env = Environment::new();
        assert!(matches!(
            Flux::new("1 # 2").evaluate(&env),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            Flux::new("1 \" 2").evaluate(&env),
            Err(Error::Lex(_))
        ));
        assert!(matches!(Flux::new("x").evaluate(&env), Err(Error::Eval(_))));
    }

    #[test]
    fn test_from_numbers() {
        let env = Environment::new();
        assert_eq!(Flux::from(0.25_f64).evaluate(&env), Ok(0.25));
        assert_eq!(Flux::from(-3.0_f64).evaluate(&env), Ok(-3.0));
        assert_eq!(Flux::from(1.5_f32).evaluate(&env), Ok(1.5));
        assert_eq!(Flux::from(42).evaluate(&env), Ok(42.0));
        assert_eq!(Flux::from(42).source(), "42");
    }
}
