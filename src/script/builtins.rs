// src/script/builtins.rs

//! Built-in functions and methods available to code cells.

use std::cmp::Ordering;
use std::sync::Arc;

use super::value::{Table, Value};

/// Upper bound on the number of items `range()` may materialize.
const MAX_RANGE_LEN: i64 = 10_000_000;

/// Upper bound on the length of a list (items) or string (bytes) built by
/// repetition.
pub(crate) const MAX_REPEAT_LEN: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Len,
    Str,
    Int,
    Float,
    Range,
    Sum,
    Min,
    Max,
    Abs,
    Round,
    Sorted,
    Table,
    Html,
    Image,
    Chart,
}

const ALL: &[Builtin] = &[
    Builtin::Print,
    Builtin::Len,
    Builtin::Str,
    Builtin::Int,
    Builtin::Float,
    Builtin::Range,
    Builtin::Sum,
    Builtin::Min,
    Builtin::Max,
    Builtin::Abs,
    Builtin::Round,
    Builtin::Sorted,
    Builtin::Table,
    Builtin::Html,
    Builtin::Image,
    Builtin::Chart,
];

/// Look up a built-in function by name.
pub fn lookup(name: &str) -> Option<Builtin> {
    ALL.iter().copied().find(|b| b.name() == name)
}

pub fn is_builtin(name: &str) -> bool {
    lookup(name).is_some()
}

type CallResult = Result<Value, String>;

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Range => "range",
            Builtin::Sum => "sum",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Abs => "abs",
            Builtin::Round => "round",
            Builtin::Sorted => "sorted",
            Builtin::Table => "table",
            Builtin::Html => "html",
            Builtin::Image => "image",
            Builtin::Chart => "chart",
        }
    }

    /// Invoke the builtin. `stdout` receives anything written by `print`.
    pub fn call(self, args: Vec<Value>, stdout: &mut String) -> CallResult {
        match self {
            Builtin::Print => {
                let line = args
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                stdout.push_str(&line);
                stdout.push('\n');
                Ok(Value::None)
            }
            Builtin::Len => {
                let [v] = exact::<1>(self, args)?;
                let n = match &v {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) => items.len(),
                    Value::Dict(map) => map.len(),
                    Value::Table(t) => t.rows.len(),
                    other => return Err(format!("object of type '{}' has no len()", other.type_name())),
                };
                Ok(Value::Int(n as i64))
            }
            Builtin::Str => {
                let [v] = exact::<1>(self, args)?;
                Ok(Value::Str(v.to_string()))
            }
            Builtin::Int => {
                let [v] = exact::<1>(self, args)?;
                match v {
                    Value::Int(i) => Ok(Value::Int(i)),
                    Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                    Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
                    Value::Str(s) => s
                        .trim()
                        .parse::<i64>()
                        .map(Value::Int)
                        .map_err(|_| format!("invalid literal for int(): '{s}'")),
                    other => Err(format!("int() argument must be a number or string, not '{}'", other.type_name())),
                }
            }
            Builtin::Float => {
                let [v] = exact::<1>(self, args)?;
                match v {
                    Value::Str(s) => s
                        .trim()
                        .parse::<f64>()
                        .map(Value::Float)
                        .map_err(|_| format!("could not convert string to float: '{s}'")),
                    other => other
                        .as_f64()
                        .map(Value::Float)
                        .ok_or_else(|| format!("float() argument must be a number or string, not '{}'", other.type_name())),
                }
            }
            Builtin::Range => range(args),
            Builtin::Sum => {
                let [v] = exact::<1>(self, args)?;
                let items = as_list(self, v)?;
                let mut int_total: i64 = 0;
                let mut float_total: Option<f64> = None;
                for item in &items {
                    match item {
                        Value::Int(i) if float_total.is_none() => {
                            int_total = int_total.checked_add(*i).ok_or("integer overflow")?;
                        }
                        other => {
                            let x = other.as_f64().ok_or_else(|| {
                                format!("unsupported operand type(s) for +: 'int' and '{}'", other.type_name())
                            })?;
                            float_total = Some(float_total.unwrap_or(int_total as f64) + x);
                        }
                    }
                }
                Ok(float_total.map(Value::Float).unwrap_or(Value::Int(int_total)))
            }
            Builtin::Min | Builtin::Max => {
                let items = if args.len() == 1 {
                    let [v] = exact::<1>(self, args)?;
                    as_list(self, v)?
                } else {
                    args
                };
                let want = if self == Builtin::Min { Ordering::Less } else { Ordering::Greater };
                let mut iter = items.into_iter();
                let mut best = iter
                    .next()
                    .ok_or_else(|| format!("{}() arg is an empty sequence", self.name()))?;
                for item in iter {
                    let ord = item.compare(&best).ok_or_else(|| {
                        format!(
                            "'<' not supported between instances of '{}' and '{}'",
                            item.type_name(),
                            best.type_name()
                        )
                    })?;
                    if ord == want {
                        best = item;
                    }
                }
                Ok(best)
            }
            Builtin::Abs => {
                let [v] = exact::<1>(self, args)?;
                match v {
                    Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(|| "integer overflow".to_string()),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    other => Err(format!("bad operand type for abs(): '{}'", other.type_name())),
                }
            }
            Builtin::Round => {
                if args.len() == 2 {
                    let [v, digits] = exact::<2>(self, args)?;
                    let x = v.as_f64().ok_or("round() expects a number")?;
                    let d = digits.as_i64().ok_or("round() digits must be an int")?;
                    let factor = 10f64.powi(d as i32);
                    Ok(Value::Float((x * factor).round() / factor))
                } else {
                    let [v] = exact::<1>(self, args)?;
                    match v {
                        Value::Int(i) => Ok(Value::Int(i)),
                        other => {
                            let x = other.as_f64().ok_or("round() expects a number")?;
                            Ok(Value::Int(x.round() as i64))
                        }
                    }
                }
            }
            Builtin::Sorted => {
                let [v] = exact::<1>(self, args)?;
                let mut items = as_list(self, v)?;
                let mut failed = false;
                items.sort_by(|a, b| {
                    a.compare(b).unwrap_or_else(|| {
                        failed = true;
                        Ordering::Equal
                    })
                });
                if failed {
                    return Err("sorted() received values that cannot be compared".to_string());
                }
                Ok(Value::List(items))
            }
            Builtin::Table => {
                let [v] = exact::<1>(self, args)?;
                let table = match &v {
                    Value::List(records) => Table::from_records(records),
                    Value::Dict(columns) => Table::from_columns(columns),
                    Value::Table(t) => Some(t.as_ref().clone()),
                    _ => None,
                };
                table
                    .map(|t| Value::Table(Arc::new(t)))
                    .ok_or_else(|| "table() expects a list of dicts or a dict of equal-length lists".to_string())
            }
            Builtin::Html => {
                let [v] = exact::<1>(self, args)?;
                Ok(Value::Html(v.to_string()))
            }
            Builtin::Image => {
                let (data, mime) = match args.len() {
                    1 => {
                        let [d] = exact::<1>(self, args)?;
                        (d, Value::Str("image/png".into()))
                    }
                    _ => {
                        let [d, m] = exact::<2>(self, args)?;
                        (d, m)
                    }
                };
                match (data, mime) {
                    (Value::Str(data), Value::Str(mime)) => Ok(Value::Image { mime, data }),
                    _ => Err("image() expects a base64 string and an optional mime type".to_string()),
                }
            }
            Builtin::Chart => {
                let [v] = exact::<1>(self, args)?;
                match v {
                    Value::Dict(map) if map.contains_key("mark") || map.contains_key("$schema") => {
                        Ok(Value::Dict(map))
                    }
                    _ => Err("chart() expects a dict with a 'mark' or '$schema' key".to_string()),
                }
            }
        }
    }
}

/// Call a method on `receiver`. Mutating methods update `receiver` in place;
/// the caller decides whether to write it back to a binding.
pub fn call_method(receiver: &mut Value, name: &str, args: Vec<Value>) -> CallResult {
    match (receiver, name) {
        (Value::List(items), "append") => {
            let [v] = exact_method::<1>(name, args)?;
            items.push(v);
            Ok(Value::None)
        }
        (Value::Str(s), "upper") => {
            exact_method::<0>(name, args)?;
            Ok(Value::Str(s.to_uppercase()))
        }
        (Value::Str(s), "lower") => {
            exact_method::<0>(name, args)?;
            Ok(Value::Str(s.to_lowercase()))
        }
        (Value::Dict(map), "keys") => {
            exact_method::<0>(name, args)?;
            Ok(Value::List(map.keys().cloned().map(Value::Str).collect()))
        }
        (Value::Dict(map), "get") => {
            let (key, default) = match args.len() {
                1 => {
                    let [k] = exact_method::<1>(name, args)?;
                    (k, Value::None)
                }
                _ => {
                    let [k, d] = exact_method::<2>(name, args)?;
                    (k, d)
                }
            };
            let Value::Str(key) = key else {
                return Ok(default);
            };
            Ok(map.get(&key).cloned().unwrap_or(default))
        }
        (other, _) => Err(format!(
            "'{}' object has no attribute '{name}'",
            other.type_name()
        )),
    }
}

/// Methods that mutate their receiver.
pub fn is_mutating_method(name: &str) -> bool {
    name == "append"
}

fn exact<const N: usize>(b: Builtin, args: Vec<Value>) -> Result<[Value; N], String> {
    let given = args.len();
    args.try_into()
        .map_err(|_| format!("{}() takes {N} argument(s) ({given} given)", b.name()))
}

fn exact_method<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], String> {
    let given = args.len();
    args.try_into()
        .map_err(|_| format!("{name}() takes {N} argument(s) ({given} given)"))
}

fn as_list(b: Builtin, v: Value) -> Result<Vec<Value>, String> {
    match v {
        Value::List(items) => Ok(items),
        Value::Dict(map) => Ok(map.into_keys().map(Value::Str).collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(format!(
            "{}() argument must be iterable, not '{}'",
            b.name(),
            other.type_name()
        )),
    }
}

fn range(args: Vec<Value>) -> CallResult {
    let ints = args
        .iter()
        .map(|a| a.as_i64().ok_or_else(|| format!("'{}' object cannot be interpreted as an integer", a.type_name())))
        .collect::<Result<Vec<_>, _>>()?;

    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(format!("range expected 1 to 3 arguments, got {}", ints.len())),
    };
    if step == 0 {
        return Err("range() arg 3 must not be zero".to_string());
    }

    // i128 keeps the span and the step arithmetic exact over the whole i64 range.
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let len = if step > 0 {
        (stop - start + step - 1).max(0) / step
    } else {
        (start - stop - step - 1).max(0) / -step
    };
    if len > i128::from(MAX_RANGE_LEN) {
        return Err(format!("range() of {len} items exceeds the limit of {MAX_RANGE_LEN}"));
    }

    let out = (0..len)
        .map(|k| i64::try_from(start + k * step).map(Value::Int))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| "integer overflow".to_string())?;
    Ok(Value::List(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(b: Builtin, args: Vec<Value>) -> CallResult {
        let mut out = String::new();
        b.call(args, &mut out)
    }

    #[test]
    fn print_joins_arguments_with_spaces() {
        let mut out = String::new();
        Builtin::Print
            .call(vec![Value::Str("y".into()), Value::Int(25)], &mut out)
            .unwrap();
        assert_eq!(out, "y 25\n");
    }

    #[test]
    fn range_matches_python_semantics() {
        assert_eq!(
            call(Builtin::Range, vec![Value::Int(3)]).unwrap(),
            Value::List(vec![Value::Int(0), Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            call(Builtin::Range, vec![Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap(),
            Value::List(vec![Value::Int(5), Value::Int(3), Value::Int(1)])
        );
        assert!(call(Builtin::Range, vec![Value::Int(1), Value::Int(2), Value::Int(0)]).is_err());
    }

    #[test]
    fn range_near_the_integer_limits_reports_its_size() {
        let huge = call(Builtin::Range, vec![Value::Int(0), Value::Int(i64::MAX), Value::Int(2)]);
        assert!(huge.unwrap_err().contains("exceeds the limit"));

        let down = call(
            Builtin::Range,
            vec![Value::Int(i64::MAX), Value::Int(i64::MIN), Value::Int(-1)],
        );
        assert!(down.unwrap_err().contains("exceeds the limit"));

        let min_step = call(Builtin::Range, vec![Value::Int(0), Value::Int(-1), Value::Int(i64::MIN)]);
        assert_eq!(min_step.unwrap(), Value::List(vec![Value::Int(0)]));

        let tail = call(
            Builtin::Range,
            vec![Value::Int(i64::MAX - 2), Value::Int(i64::MAX), Value::Int(i64::MAX)],
        );
        assert_eq!(tail.unwrap(), Value::List(vec![Value::Int(i64::MAX - 2)]));
    }

    #[test]
    fn sum_promotes_to_float() {
        let xs = Value::List(vec![Value::Int(1), Value::Float(0.5)]);
        assert_eq!(call(Builtin::Sum, vec![xs]).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn min_max_over_list_and_arguments() {
        let xs = Value::List(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        assert_eq!(call(Builtin::Min, vec![xs]).unwrap(), Value::Int(1));
        assert_eq!(
            call(Builtin::Max, vec![Value::Int(3), Value::Int(9)]).unwrap(),
            Value::Int(9)
        );
    }

    #[test]
    fn append_mutates_receiver() {
        let mut xs = Value::List(vec![]);
        call_method(&mut xs, "append", vec![Value::Int(1)]).unwrap();
        assert_eq!(xs, Value::List(vec![Value::Int(1)]));
    }

    #[test]
    fn wrong_arity_is_reported() {
        let err = call(Builtin::Len, vec![]).unwrap_err();
        assert!(err.contains("len() takes 1"));
    }
}
