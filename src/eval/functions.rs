//! Function registry consulted by constant propagation (§4.3.1).
//!
//! Deliberately small: one recognized function. A registry entry must either produce a
//! deterministic scalar for fixed inputs or refuse to fold — never something in between.

use crate::error::AnalyzerError;
use crate::store::ScalarValue;

/// Resolves `name` against the registry and invokes it with `args`. Unknown names are not a
/// constant-propagation failure by themselves from the caller's point of view — `eval::mod`
/// treats any `Err` the same way, as a recorded node error that leaves the call unfolded.
pub fn call(name: &str, args: &[ScalarValue]) -> Result<ScalarValue, AnalyzerError> {
    match name {
        "format" => format_fn(args),
        other => Err(AnalyzerError::not_implemented(format!("unknown function: {other}"))),
    }
}

/// `format(template, arg0, arg1, ...)`: replaces each `{}` in `template` with the display form of
/// the next argument, in order.
fn format_fn(args: &[ScalarValue]) -> Result<ScalarValue, AnalyzerError> {
    let Some((template, rest)) = args.split_first() else {
        return Err(AnalyzerError::invalid("format() requires at least a template argument"));
    };
    let template = template.to_display_string();
    let mut out = String::with_capacity(template.len());
    let mut args = rest.iter();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' && chars.peek() == Some(&'}') {
            chars.next();
            let Some(value) = args.next() else {
                return Err(AnalyzerError::invalid("format(): not enough arguments for template"));
            };
            out.push_str(&value.to_display_string());
        } else {
            out.push(c);
        }
    }
    Ok(ScalarValue::Utf8(out))
}
