use crate::Error;
use crate::environment::Env;
use crate::evaluator::evaluate;
use crate::parser::parse_str;
use tracing::debug;

/// Derived forms written in the language itself, loaded before user code.
pub const PRELUDE: &str = "
(do
  (def defmacro (macro [n a e] (def n (macro a e))))
  (defmacro defn [nn aa ee] (def nn (fn aa ee))))
";

/// Evaluates the prelude against `env`, binding its definitions globally.
pub fn load_prelude(env: &Env) -> Result<(), Error> {
    let program = parse_str(PRELUDE)?;
    evaluate(&program, env)?;
    debug!("prelude loaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::evaluator::tests::eval_str;
    use crate::types::Value;

    #[test]
    fn test_prelude_parses() {
        assert!(parse_str(PRELUDE).is_ok());
    }

    #[test]
    fn test_prelude_defines_macros() {
        let env = Environment::new();
        load_prelude(&env).unwrap();
        assert!(matches!(env.borrow().get("defmacro"), Ok(Value::Macro(_))));
        assert!(matches!(env.borrow().get("defn"), Ok(Value::Macro(_))));
    }

    #[test]
    fn test_defn() {
        let env = Environment::new();
        load_prelude(&env).unwrap();
        let result = eval_str("(do (defn add1 [a] (+ 1 a)) (add1 5))", &env);
        assert_eq!(result, Ok(Value::Integer(6)));
    }

    #[test]
    fn test_defmacro() {
        let env = Environment::new();
        load_prelude(&env).unwrap();
        let result = eval_str(
            "(do
                (defmacro unless [c t f] (if c f t))
                (unless false 1 (first never-bound)))",
            &env,
        );
        assert_eq!(result, Ok(Value::Integer(1)));
    }
}
