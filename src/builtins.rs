//! Built-in demo functions
//!
//! The CLI can only name functions, never ship code, so every worker binary
//! registers the same set:
//!
//! | id         | arguments           | result                         |
//! |------------|---------------------|--------------------------------|
//! | `add`      | `a, b`              | `a + b`                        |
//! | `mul`      | `a, b`              | `a * b`                        |
//! | `sum`      | any numbers         | their sum                      |
//! | `concat`   | any strings         | the strings joined             |
//! | `sleep_ms` | `ms`                | `ms`, after sleeping that long |
//! | `fail`     | anything            | always fails                   |
//!
//! Integer arithmetic stays integral; any float operand promotes to `f64`.

use crate::registry::{arg, Registry};
use anyhow::{bail, Context};
use serde_json::{json, Value};
use std::time::Duration;

/// Registry holding every built-in function
pub fn registry() -> Registry {
    Registry::new()
        .register("add", |args| {
            expect_arity(args, 2)?;
            binary(&args[0], &args[1], i64::checked_add, |a, b| a + b)
        })
        .register("mul", |args| {
            expect_arity(args, 2)?;
            binary(&args[0], &args[1], i64::checked_mul, |a, b| a * b)
        })
        .register("sum", |args| {
            args.iter().try_fold(json!(0), |acc, v| binary(&acc, v, i64::checked_add, |a, b| a + b))
        })
        .register("concat", |args| {
            let mut out = String::new();
            for index in 0..args.len() {
                out.push_str(&arg::<String>(args, index)?);
            }
            Ok(Value::String(out))
        })
        .register("sleep_ms", |args| {
            expect_arity(args, 1)?;
            let ms: u64 = arg(args, 0)?;
            std::thread::sleep(Duration::from_millis(ms));
            Ok(json!(ms))
        })
        .register("fail", |args| bail!("fail called with {} argument(s)", args.len()))
}

fn expect_arity(args: &[Value], n: usize) -> anyhow::Result<()> {
    if args.len() != n {
        bail!("expected {} argument(s), got {}", n, args.len());
    }
    Ok(())
}

fn binary(
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> anyhow::Result<Value> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let value = int_op(x, y).with_context(|| format!("integer overflow on {} and {}", x, y))?;
        return Ok(json!(value));
    }

    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => {
            let value = float_op(x, y);
            if !value.is_finite() {
                bail!("result of {} and {} is not finite", x, y);
            }
            Ok(json!(value))
        }
        _ => bail!("expected two numbers, got {} and {}", a, b),
    }
}
