//! Canonical text of scalar values.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::SecondsFormat;
use num_traits::float::FloatCore;
use zmij::Float;

use crate::value::Value;

/// Format as float string, making sure the result reads back as a YAML float
/// (zmij may render `4e-6` where YAML wants `4.0e-6`).
pub(crate) fn push_float_string<F: Float + FloatCore>(target: &mut String, f: F) {
    if f.is_nan() {
        target.push_str(".nan");
    } else if f.is_infinite() {
        if f.is_sign_positive() {
            target.push_str(".inf");
        } else {
            target.push_str("-.inf");
        }
    } else {
        let mut buf = zmij::Buffer::new();
        let s = buf.format_finite(f);
        if s.as_bytes().contains(&b'.') {
            target.push_str(s);
        } else if let Some(exp_pos) = s.find(['e', 'E']) {
            // "4e-6" -> "4.0e-6"
            target.push_str(&s[..exp_pos]);
            target.push_str(".0");
            target.push_str(&s[exp_pos..]);
        } else {
            target.push_str(s);
            target.push_str(".0");
        }
    }
}

pub(crate) fn float_string<F: Float + FloatCore>(f: F) -> String {
    let mut out = String::new();
    push_float_string(&mut out, f);
    out
}

/// Text of a scalar value. `None` for objects, sequences and mappings.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_owned(),
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U8(v) => v.to_string(),
        Value::U16(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::F32(v) => float_string(*v),
        Value::F64(v) => float_string(*v),
        Value::Decimal(d) => d.to_string(),
        Value::Char(c) => c.to_string(),
        Value::String(s) => s.clone(),
        Value::Bytes(b) => STANDARD.encode(b),
        Value::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        Value::Enum(e) => e.name().to_owned(),
        Value::Object(_) | Value::Sequence(_) | Value::Mapping(_) => return None,
    };
    Some(text)
}
