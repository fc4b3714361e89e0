use std::collections::HashMap;

use miette::Diagnostic;
use thiserror::Error;

use crate::{
    builtins::{greater, lesser},
    env::{Arity, Environment},
    parser::Node,
};

#[derive(Diagnostic, Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("invalid variable \"{name}\"")]
    #[diagnostic(
        code(flux::eval::unknown_variable),
        help("bind it as a local variable or register it as a constant")
    )]
    UnknownVariable { name: String },

    #[error("invalid function \"{name}\"")]
    #[diagnostic(code(flux::eval::unknown_function))]
    UnknownFunction { name: String },

    #[error("invalid parameters for {function}: expected {expected} argument(s), found {found}")]
    #[diagnostic(code(flux::eval::argument_count))]
    ArgumentCount {
        function: String,
        expected: Arity,
        found: usize,
    },

    #[error("invalid argument for {function}: {reason}")]
    #[diagnostic(code(flux::eval::invalid_argument))]
    InvalidArgument { function: String, reason: String },

    #[error("invalid {} operator \"{symbol}\"", operator_kind(.arity))]
    #[diagnostic(code(flux::eval::unknown_operator))]
    UnknownOperator { symbol: String, arity: usize },

    #[error("invalid number of operands for \"{symbol}\": {found}")]
    #[diagnostic(code(flux::eval::operand_count))]
    OperandCount { symbol: String, found: usize },
}

fn operator_kind(arity: &usize) -> &'static str {
    if *arity == 1 {
        "unary"
    } else {
        "binary"
    }
}

fn truth(value: f64) -> bool {
    value != 0.0
}

fn from_bool(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Rounds half away from zero, then converts (saturating) to an integer.
fn to_int(value: f64) -> i32 {
    value.round() as i32
}

impl Node {
    /// Evaluates the tree against local `variables`, falling back to the
    /// constants and functions of `env`.
    ///
    /// Arithmetic never fails: division by zero and domain errors give the
    /// usual IEEE-754 infinities and NaNs.
    pub fn evaluate(
        &self,
        variables: &HashMap<String, f64>,
        env: &Environment,
    ) -> Result<f64, EvalError> {
        match self {
            Node::Number(value) => Ok(*value),

            Node::Variable(name) => {
                env.lookup(name, variables)
                    .ok_or_else(|| EvalError::UnknownVariable {
                        name: name.clone(),
                    })
            }

            Node::FunctionCall { name, args } => {
                let function = env
                    .function(name)
                    .ok_or_else(|| EvalError::UnknownFunction { name: name.clone() })?;
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(variables, env))
                    .collect::<Result<Vec<f64>, EvalError>>()?;
                function(&values)
            }

            Node::Operator { symbol, operands } => match operands.as_slice() {
                [operand] => apply_unary(symbol, operand.evaluate(variables, env)?),
                [left, right] => {
                    let left = left.evaluate(variables, env)?;
                    let right = right.evaluate(variables, env)?;
                    apply_binary(symbol, left, right)
                }
                _ => Err(EvalError::OperandCount {
                    symbol: symbol.clone(),
                    found: operands.len(),
                }),
            },

            // Only the selected branch is evaluated.
            Node::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                if truth(condition.evaluate(variables, env)?) {
                    if_true.evaluate(variables, env)
                } else {
                    if_false.evaluate(variables, env)
                }
            }
        }
    }
}

fn apply_unary(symbol: &str, operand: f64) -> Result<f64, EvalError> {
    Ok(match symbol {
        "+" | "*" => operand,
        "-" => -operand,
        "/" => 1.0 / operand,
        "!" => from_bool(operand == 0.0),
        "~" => f64::from(!to_int(operand)),
        _ => {
            return Err(EvalError::UnknownOperator {
                symbol: symbol.to_string(),
                arity: 1,
            })
        }
    })
}

fn apply_binary(symbol: &str, left: f64, right: f64) -> Result<f64, EvalError> {
    Ok(match symbol {
        "+" => left + right,
        "-" => left - right,
        "*" => left * right,
        "/" => left / right,
        // `%` on f64 is fmod: the result takes the sign of the dividend.
        "%" => left % right,
        "%%" => {
            let remainder = left % right;
            if remainder < 0.0 {
                remainder + right
            } else {
                remainder
            }
        }
        "**" => left.powf(right),
        "//" => (left / right).floor(),

        "==" => from_bool(left == right),
        "!=" => from_bool(left != right),
        "<" => from_bool(left < right),
        ">" => from_bool(left > right),
        "<=" => from_bool(left <= right),
        ">=" => from_bool(left >= right),
        "!<" => from_bool(!(left < right)),
        "!>" => from_bool(!(left > right)),
        "!<=" => from_bool(!(left <= right)),
        "!>=" => from_bool(!(left >= right)),

        "&&" => from_bool(truth(left) && truth(right)),
        "||" => from_bool(truth(left) || truth(right)),
        "=>" => from_bool(!truth(left) || truth(right)),

        "&" => f64::from(to_int(left) & to_int(right)),
        "|" => f64::from(to_int(left) | to_int(right)),
        "^" => f64::from(to_int(left) ^ to_int(right)),
        "<<" => f64::from(to_int(left).wrapping_shl(to_int(right) as u32)),
        ">>" => f64::from(to_int(left).wrapping_shr(to_int(right) as u32)),

        "<?" => lesser(left, right),
        ">?" => greater(left, right),
        "!!" => (left - right).abs(),

        "??" => {
            if truth(left) {
                left
            } else {
                right
            }
        }

        _ => {
            return Err(EvalError::UnknownOperator {
                symbol: symbol.to_string(),
                arity: 2,
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer::tokenize, parser::parse};

    fn eval_with(input: &str, variables: &[(&str, f64)]) -> Result<f64, EvalError> {
        let tokens = tokenize(input).unwrap();
        let tree = parse(&tokens).unwrap();
        let variables = variables
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        tree.evaluate(&variables, &Environment::with_builtins())
    }

    fn eval(input: &str) -> f64 {
        eval_with(input, &[]).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("2 + 3 * 4"), 14.0);
        assert_eq!(eval("(2 + 3) * 4"), 20.0);
        assert_eq!(eval("10 - 4 - 3"), 3.0);
        assert_eq!(eval("7 / 2"), 3.5);
    }

    #[test]
    fn test_power_is_left_associative() {
        assert_eq!(eval("2 ** 3 ** 2"), 64.0);
    }

    #[test]
    fn test_flooring_division() {
        assert_eq!(eval("7 // 2"), 3.0);
        assert_eq!(eval("-7 // 2"), -4.0);
    }

    #[test]
    fn test_modulo_follows_dividend() {
        assert_eq!(eval("7 % 3"), 1.0);
        assert_eq!(eval("-7 % 3"), -1.0);
        assert_eq!(eval("7.5 % 2"), 1.5);
    }

    #[test]
    fn test_wrapping_modulo_is_non_negative() {
        assert_eq!(eval("-7 %% 3"), 2.0);
        assert_eq!(eval("7 %% 3"), 1.0);
        assert_eq!(eval("-1 %% 5"), 4.0);
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(eval("-5"), -5.0);
        assert_eq!(eval("+5"), 5.0);
        assert_eq!(eval("*5"), 5.0);
        assert_eq!(eval("/4"), 0.25);
        assert_eq!(eval("!0"), 1.0);
        assert_eq!(eval("!3"), 0.0);
        assert_eq!(eval("~0"), -1.0);
        assert_eq!(eval("~2.6"), -4.0);
        assert_eq!(eval("- - 2"), 2.0);
    }

    #[test]
    fn test_relational() {
        assert_eq!(eval("1 == 1"), 1.0);
        assert_eq!(eval("1 != 1"), 0.0);
        assert_eq!(eval("1 < 2"), 1.0);
        assert_eq!(eval("1 > 2"), 0.0);
        assert_eq!(eval("2 <= 2"), 1.0);
        assert_eq!(eval("1 >= 2"), 0.0);
        assert_eq!(eval("1 !< 2"), 0.0);
        assert_eq!(eval("1 !> 2"), 1.0);
        assert_eq!(eval("2 !<= 2"), 0.0);
        assert_eq!(eval("1 !>= 2"), 1.0);
    }

    #[test]
    fn test_negated_relations_differ_from_flipped_on_nan() {
        // `!<` is "not less than", which holds for NaN where `>=` does not.
        assert_eq!(eval("nan() !< 1"), 1.0);
        assert_eq!(eval("nan() >= 1"), 0.0);
    }

    #[test]
    fn test_logical() {
        assert_eq!(eval("2 && 3"), 1.0);
        assert_eq!(eval("2 && 0"), 0.0);
        assert_eq!(eval("0 || -1"), 1.0);
        assert_eq!(eval("0 || 0"), 0.0);
        assert_eq!(eval("0 => 0"), 1.0);
        assert_eq!(eval("1 => 0"), 0.0);
        assert_eq!(eval("1 => 5"), 1.0);
    }

    #[test]
    fn test_bitwise_rounds_operands() {
        assert_eq!(eval("6 & 3"), 2.0);
        assert_eq!(eval("6 | 3"), 7.0);
        assert_eq!(eval("6 ^ 3"), 5.0);
        assert_eq!(eval("1 << 4"), 16.0);
        assert_eq!(eval("-16 >> 2"), -4.0);
        assert_eq!(eval("2.6 & 2.4"), 2.0);
    }

    #[test]
    fn test_bitwise_saturates_non_finite_operands() {
        assert_eq!(eval("~nan()"), -1.0);
        assert_eq!(eval("nan() | 5"), 5.0);
        assert_eq!(eval("1/0 & 1"), 1.0);
        assert_eq!(eval("1/0 ^ 0"), f64::from(i32::MAX));
        assert_eq!(eval("-1/0 | 0"), f64::from(i32::MIN));
        assert_eq!(eval("2147483648 * 2 | 0"), f64::from(i32::MAX));
    }

    #[test]
    fn test_shift_amount_wraps() {
        assert_eq!(eval("1 << 40"), 256.0);
        assert_eq!(eval("1 << 32"), 1.0);
        assert_eq!(eval("1 << -1"), f64::from(i32::MIN));
        assert_eq!(eval("256 >> -28"), 16.0);
        assert_eq!(eval("1 << 31"), f64::from(i32::MIN));
    }

    #[test]
    fn test_min_max_and_absolute_difference() {
        assert_eq!(eval("3 <? 5"), 3.0);
        assert_eq!(eval("3 >? 5"), 5.0);
        assert!(eval("nan() <? 1").is_nan());
        assert!(eval("nan() >? 1").is_nan());
        assert_eq!(eval("1 <? nan()"), 1.0);
        assert_eq!(eval("1 >? nan()"), 1.0);
        assert_eq!(eval("3 !! 5"), 2.0);
        assert_eq!(eval("5 !! 3"), 2.0);
    }

    #[test]
    fn test_null_coalescing() {
        assert_eq!(eval("0 ?? 7"), 7.0);
        assert_eq!(eval("3 ?? 7"), 3.0);
    }

    #[test]
    fn test_conditional_evaluates_one_branch() {
        assert_eq!(eval("1 ? 5 : (1/0)"), 5.0);
        assert_eq!(eval("0 ? 5 : 6"), 6.0);
        // The untaken branch may even reference unknown names.
        assert_eq!(eval("1 ? 5 : missing"), 5.0);
        assert_eq!(eval("0 ? undefined_fn(1) : 6"), 6.0);
    }

    #[test]
    fn test_division_by_zero_is_not_an_error() {
        assert_eq!(eval("1 / 0"), f64::INFINITY);
        assert_eq!(eval("-1 / 0"), f64::NEG_INFINITY);
        assert!(eval("0 / 0").is_nan());
        assert!(eval("1 % 0").is_nan());
        assert!(eval("1 %% 0").is_nan());
        assert_eq!(eval("1 // 0"), f64::INFINITY);
        assert_eq!(eval("/0"), f64::INFINITY);
    }

    #[test]
    fn test_variables_and_constants() {
        assert_eq!(eval_with("psx / 2", &[("psx", 640.0)]), Ok(320.0));
        assert_eq!(eval("pi"), std::f64::consts::PI);
        assert_eq!(eval_with("pi", &[("pi", 3.0)]), Ok(3.0));
    }

    #[test]
    fn test_unknown_variable() {
        assert_eq!(
            eval_with("psx + 1", &[]),
            Err(EvalError::UnknownVariable {
                name: "psx".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            eval_with("frobnicate(1)", &[]),
            Err(EvalError::UnknownFunction {
                name: "frobnicate".to_string()
            })
        );
    }

    #[test]
    fn test_function_arity_errors() {
        assert!(matches!(
            eval_with("sqrt(1, 2)", &[]),
            Err(EvalError::ArgumentCount { found: 2, .. })
        ));
        assert!(matches!(
            eval_with("min()", &[]),
            Err(EvalError::ArgumentCount { found: 0, .. })
        ));
    }

    #[test]
    fn test_arguments_are_evaluated_in_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut env = Environment::new();
        let log = Rc::clone(&seen);
        env.define_function("record", move |args: &[f64]| {
            log.borrow_mut().push(args[0]);
            Ok(args[0])
        });
        env.define_function("sum", |args: &[f64]| Ok(args.iter().sum()));

        let tokens = tokenize("sum(record(1), record(2), record(3))").unwrap();
        let tree = parse(&tokens).unwrap();
        assert_eq!(tree.evaluate(&HashMap::new(), &env), Ok(6.0));
        assert_eq!(*seen.borrow(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_hand_built_trees_reject_bad_operators() {
        let env = Environment::new();
        let vars = HashMap::new();

        let unknown = Node::binary("<>", Node::Number(1.0), Node::Number(2.0));
        assert_eq!(
            unknown.evaluate(&vars, &env),
            Err(EvalError::UnknownOperator {
                symbol: "<>".to_string(),
                arity: 2
            })
        );

        let unknown_unary = Node::unary("!!", Node::Number(1.0));
        assert!(matches!(
            unknown_unary.evaluate(&vars, &env),
            Err(EvalError::UnknownOperator { arity: 1, .. })
        ));

        let empty = Node::Operator {
            symbol: "+".to_string(),
            operands: vec![],
        };
        assert_eq!(
            empty.evaluate(&vars, &env),
            Err(EvalError::OperandCount {
                symbol: "+".to_string(),
                found: 0
            })
        );
    }

    #[test]
    fn test_error_messages() {
        let err = EvalError::UnknownOperator {
            symbol: "<>".into(),
            arity: 2,
        };
        assert_eq!(err.to_string(), "invalid binary operator \"<>\"");
        let err = EvalError::ArgumentCount {
            function: "sqrt".into(),
            expected: Arity::Exact(1),
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "invalid parameters for sqrt: expected 1 argument(s), found 2"
        );
    }
}
