use crate::protocol::{datatype, ErrorCode, ParamDescriptor};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub code: ErrorCode,
    pub msg: String,
}

impl Rejection {
    fn new(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }
}

/// Checks a value written by the panel and returns it in canonical form.
pub fn validate_value(desc: &ParamDescriptor, value: &Value) -> Result<Value, Rejection> {
    if desc.readonly {
        return Err(Rejection::new(
            ErrorCode::Readonly,
            format!("parameter {} is readonly", desc.id),
        ));
    }

    match desc.datatype.as_str() {
        datatype::FLOAT => {
            let n = value
                .as_f64()
                .filter(|n| n.is_finite())
                .ok_or_else(|| invalid(desc, value))?;
            check_range(desc, n)?;
            Ok(Value::from(n))
        }
        datatype::INT => {
            let n = match value.as_i64() {
                Some(n) => n,
                None => match value.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 => f as i64,
                    _ => return Err(invalid(desc, value)),
                },
            };
            check_range(desc, n as f64)?;
            Ok(Value::from(n))
        }
        datatype::STRING => match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err(invalid(desc, value)),
        },
        datatype::BOOLEAN => match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(invalid(desc, value)),
        },
        other => Err(Rejection::new(
            ErrorCode::InvalidCommand,
            format!("parameter {} of type {other} carries no value", desc.id),
        )),
    }
}

fn check_range(desc: &ParamDescriptor, n: f64) -> Result<(), Rejection> {
    let below = desc.minimum.is_some_and(|min| n < min);
    let above = desc.maximum.is_some_and(|max| n > max);
    if below || above {
        return Err(Rejection::new(
            ErrorCode::InvalidValue,
            format!("{n} out of range for parameter {}", desc.id),
        ));
    }
    Ok(())
}

fn invalid(desc: &ParamDescriptor, value: &Value) -> Rejection {
    Rejection::new(
        ErrorCode::InvalidValue,
        format!("{value} is not a valid {} for parameter {}", desc.datatype, desc.id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn float(min: f64, max: f64) -> ParamDescriptor {
        let mut d = ParamDescriptor::new(1, datatype::FLOAT);
        d.minimum = Some(min);
        d.maximum = Some(max);
        d
    }

    #[test]
    fn floats_are_range_checked() {
        let d = float(0.0, 1.0);
        assert_eq!(validate_value(&d, &json!(0.25)), Ok(json!(0.25)));
        assert_eq!(
            validate_value(&d, &json!(1.5)).unwrap_err().code,
            ErrorCode::InvalidValue
        );
        assert_eq!(
            validate_value(&d, &json!("x")).unwrap_err().code,
            ErrorCode::InvalidValue
        );
    }

    #[test]
    fn ints_accept_whole_floats() {
        let d = ParamDescriptor::new(2, datatype::INT);
        assert_eq!(validate_value(&d, &json!(3.0)), Ok(json!(3)));
        assert!(validate_value(&d, &json!(3.5)).is_err());
    }

    #[test]
    fn readonly_and_valueless_kinds_are_refused() {
        let mut d = ParamDescriptor::new(3, datatype::STRING);
        d.readonly = true;
        assert_eq!(
            validate_value(&d, &json!("x")).unwrap_err().code,
            ErrorCode::Readonly
        );

        let g = ParamDescriptor::new(4, datatype::GROUP);
        assert_eq!(
            validate_value(&g, &json!(1)).unwrap_err().code,
            ErrorCode::InvalidCommand
        );
    }
}
