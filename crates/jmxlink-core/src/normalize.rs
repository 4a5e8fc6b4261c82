//! Flattening of raw attribute values into typed wire entries.

use chrono::{DateTime, Utc};
use jmxlink_protocol::{AttributeResponse, AttributeValue};

use crate::error::{FetchError, FetchResult};
use crate::value::RawValue;

/// Composites nested deeper than this are reported as unsupported.
pub const MAX_COMPOSITE_DEPTH: usize = 16;

/// US medium date-time layout, e.g. `Jan 5, 2021 3:04:05 PM`.
const DATE_FORMAT: &str = "%b %-d, %Y %-I:%M:%S %p";

/// Appends the entries for `raw` under the qualified `name` to `out`.
///
/// Scalars produce one entry. Composites recurse into each non-empty field
/// as `name.Field`; failing fields are skipped as long as at least one field
/// produced an entry, otherwise the last field failure is returned.
///
/// # Errors
///
/// Returns an operational [`FetchError`] for null and unsupported values.
pub fn parse_value(name: &str, raw: &RawValue, out: &mut Vec<AttributeResponse>) -> FetchResult<()> {
    parse_at_depth(name, raw, out, 0)
}

fn parse_at_depth(
    name: &str,
    raw: &RawValue,
    out: &mut Vec<AttributeResponse>,
    depth: usize,
) -> FetchResult<()> {
    let value = match raw {
        RawValue::Null => {
            return Err(FetchError::operation(format!(
                "found a null value for bean: {name}"
            )));
        }
        RawValue::Double(v) => AttributeValue::Double(finite(*v)),
        RawValue::Integer(v) => AttributeValue::Int(*v),
        RawValue::Str(v) => AttributeValue::String(v.clone()),
        RawValue::Bool(v) => AttributeValue::Bool(*v),
        RawValue::Date(v) => AttributeValue::String(format_date(v)),
        RawValue::Composite(_) if depth >= MAX_COMPOSITE_DEPTH => {
            return Err(unsupported(name, "composite nested too deep"));
        }
        RawValue::Composite(fields) => {
            let before = out.len();
            let mut last_err = None;

            for (key, field) in fields {
                let Some(field_name) = capitalize_first(key) else {
                    continue;
                };
                let qualified = format!("{name}.{field_name}");
                if let Err(e) = parse_at_depth(&qualified, field, out, depth + 1) {
                    last_err = Some(e);
                }
            }

            return match last_err {
                Some(e) if out.len() == before => Err(e),
                _ => Ok(()),
            };
        }
        RawValue::Unsupported(ty) => return Err(unsupported(name, ty)),
    };

    out.push(AttributeResponse::new(name, value));
    Ok(())
}

fn unsupported(name: &str, ty: &str) -> FetchError {
    FetchError::operation(format!("unsupported data type ({ty}) for bean {name}"))
}

/// Maps non-finite doubles onto finite stand-ins.
fn finite(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else if v == f64::NEG_INFINITY {
        // smallest positive subnormal
        f64::from_bits(1)
    } else if v == f64::INFINITY {
        f64::MAX
    } else {
        v
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn capitalize_first(key: &str) -> Option<String> {
    let mut chars = key.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}
