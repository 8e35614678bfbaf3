use base64::{Engine, engine::general_purpose::STANDARD};
use gtmpl::{Func, FuncError, Value};

/// Helper functions available to every template, next to `ssm`.
pub const HELPERS: &[(&str, Func)] = &[
    ("quote", quote as Func),
    ("upper", upper as Func),
    ("lower", lower as Func),
    ("trim", trim as Func),
    ("default", default as Func),
    ("b64enc", b64enc as Func),
    ("b64dec", b64dec as Func),
    ("sha256sum", sha256sum as Func),
];

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Nil => String::new(),
        other => other.to_string(),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Nil => true,
        Value::String(s) => s.is_empty(),
        Value::Bool(b) => !b,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Piped values arrive as the last argument.
fn piped<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, FuncError> {
    args.last()
        .ok_or_else(|| FuncError::Generic(format!("{} requires an argument", name)))
}

fn quote(args: &[Value]) -> Result<Value, FuncError> {
    let text = text_of(piped("quote", args)?);
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    Ok(Value::from(format!("\"{}\"", escaped)))
}

fn upper(args: &[Value]) -> Result<Value, FuncError> {
    Ok(Value::from(text_of(piped("upper", args)?).to_uppercase()))
}

fn lower(args: &[Value]) -> Result<Value, FuncError> {
    Ok(Value::from(text_of(piped("lower", args)?).to_lowercase()))
}

fn trim(args: &[Value]) -> Result<Value, FuncError> {
    Ok(Value::from(text_of(piped("trim", args)?).trim().to_string()))
}

/// `default FALLBACK VALUE`: VALUE unless it is empty.
fn default(args: &[Value]) -> Result<Value, FuncError> {
    match args {
        [fallback] => Ok(fallback.clone()),
        [fallback, given] if is_empty(given) => Ok(fallback.clone()),
        [_, given] => Ok(given.clone()),
        _ => Err(FuncError::Generic(
            "default requires one or two arguments".to_string(),
        )),
    }
}

fn b64enc(args: &[Value]) -> Result<Value, FuncError> {
    Ok(Value::from(STANDARD.encode(text_of(piped("b64enc", args)?))))
}

fn b64dec(args: &[Value]) -> Result<Value, FuncError> {
    let encoded = text_of(piped("b64dec", args)?);
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| FuncError::Generic(format!("b64dec: {}", e)))?;
    String::from_utf8(bytes)
        .map(Value::from)
        .map_err(|e| FuncError::Generic(format!("b64dec: {}", e)))
}

fn sha256sum(args: &[Value]) -> Result<Value, FuncError> {
    let text = text_of(piped("sha256sum", args)?);
    Ok(Value::from(sha256::digest(text.as_str())))
}
