//! Default builtin function catalog.
//!
//! The evaluator hard-codes no function bodies; everything expressions can
//! call is registered here as a [`FunctionSpec`] and dispatched through the
//! registry. Math and string primitives come from `std`. Two entries are
//! defined locally for the expression language itself: `if` (selection by
//! truthiness, both branches already evaluated) and `list` (variadic
//! comma-separated concatenation).

use crate::error::CallError;
use crate::registry::{Arity, FunctionSpec};
use crate::value::Scalar;

/// Builds the catalog registered by `ExpressionEngine::new`.
pub fn default_catalog() -> Vec<(String, FunctionSpec)> {
    let mut catalog: Vec<(String, FunctionSpec)> = Vec::new();
    let mut add = |name: &str, description: &str, arity: Arity, handler: fn(&[Scalar]) -> Result<Scalar, CallError>| {
        catalog.push((name.to_string(), FunctionSpec::new(description, arity, handler)));
    };

    add("abs", "absolute value", Arity::Fixed(vec![1]), f_abs);
    add("acos", "arc cosine", Arity::Fixed(vec![1]), f_acos);
    add("asin", "arc sine", Arity::Fixed(vec![1]), f_asin);
    add("atan", "arc tangent", Arity::Fixed(vec![1]), f_atan);
    add("atan2", "arc tangent of y/x", Arity::Fixed(vec![2]), f_atan2);
    add("ceil", "round up to the next integer", Arity::Fixed(vec![1]), f_ceil);
    add("cos", "cosine", Arity::Fixed(vec![1]), f_cos);
    add("exp", "e raised to the given power", Arity::Fixed(vec![1]), f_exp);
    add("floor", "round down to the previous integer", Arity::Fixed(vec![1]), f_floor);
    add("intval", "integer part of a value", Arity::Fixed(vec![1]), f_intval);
    add("log", "natural logarithm, or logarithm in a given base", Arity::Fixed(vec![1, 2]), f_log);
    add("max", "largest argument", Arity::Variadic, f_max);
    add("min", "smallest argument", Arity::Variadic, f_min);
    add("pi", "the circle constant", Arity::Fixed(vec![0]), f_pi);
    add("pow", "base raised to an exponent", Arity::Fixed(vec![2]), f_pow);
    add("round", "round to a number of decimal places", Arity::Fixed(vec![1, 2]), f_round);
    add("sin", "sine", Arity::Fixed(vec![1]), f_sin);
    add("sqrt", "square root", Arity::Fixed(vec![1]), f_sqrt);
    add("sum", "sum of all arguments", Arity::Variadic, f_sum);
    add("tan", "tangent", Arity::Fixed(vec![1]), f_tan);

    add("count", "number of non-empty arguments", Arity::Variadic, f_count);
    add("implode", "join arguments with the first argument as glue", Arity::Variadic, f_implode);
    add("join", "concatenate all arguments", Arity::Variadic, f_join);
    add("ltrim", "strip leading whitespace", Arity::Fixed(vec![1]), f_ltrim);
    add("number_format", "format with thousands separators", Arity::Fixed(vec![1, 2]), f_number_format);
    add("rtrim", "strip trailing whitespace", Arity::Fixed(vec![1]), f_rtrim);
    add("str_pad", "pad text on the right to a length", Arity::Fixed(vec![2, 3]), f_str_pad);
    add("str_repeat", "repeat text a number of times", Arity::Fixed(vec![2]), f_str_repeat);
    add("str_replace", "replace all occurrences (search, replace, subject)", Arity::Fixed(vec![3]), f_str_replace);
    add("strcasecmp", "case-insensitive text comparison", Arity::Fixed(vec![2]), f_strcasecmp);
    add("strcmp", "text comparison", Arity::Fixed(vec![2]), f_strcmp);
    add("strlen", "number of characters", Arity::Fixed(vec![1]), f_strlen);
    add("strpos", "position of a substring, empty when absent", Arity::Fixed(vec![2]), f_strpos);
    add("strrev", "reverse the characters", Arity::Fixed(vec![1]), f_strrev);
    add("strtolower", "lowercase", Arity::Fixed(vec![1]), f_strtolower);
    add("strtoupper", "uppercase", Arity::Fixed(vec![1]), f_strtoupper);
    add("substr", "substring by character position", Arity::Fixed(vec![2, 3]), f_substr);
    add("trim", "strip surrounding whitespace", Arity::Fixed(vec![1]), f_trim);
    add("ucwords", "uppercase the first character of each word", Arity::Fixed(vec![1]), f_ucwords);

    add("is_empty", "1 when the value is falsy", Arity::Fixed(vec![1]), f_is_empty);
    add("is_float", "1 when numeric with a fractional part", Arity::Fixed(vec![1]), f_is_float);
    add("is_int", "1 when numeric and integral", Arity::Fixed(vec![1]), f_is_int);
    add("is_nan", "1 when the numeric value is not a number", Arity::Fixed(vec![1]), f_is_nan);
    add("is_numeric", "1 when the value is a number or numeric text", Arity::Fixed(vec![1]), f_is_numeric);
    add("is_string", "1 when the payload is text", Arity::Fixed(vec![1]), f_is_string);

    add("if", "select the second or third argument by truthiness of the first", Arity::Fixed(vec![3]), f_if);
    add("list", "arguments joined with ', '", Arity::Variadic, f_list);

    catalog
}

fn num(args: &[Scalar], index: usize) -> f64 {
    args[index].coerce_number()
}

fn text(args: &[Scalar], index: usize) -> String {
    args[index].display()
}

fn number(n: f64) -> Result<Scalar, CallError> {
    Ok(Scalar::Number(n))
}

fn boolean(b: bool) -> Result<Scalar, CallError> {
    Ok(Scalar::Number(if b { 1.0 } else { 0.0 }))
}

fn f_abs(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).abs())
}

fn f_acos(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).acos())
}

fn f_asin(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).asin())
}

fn f_atan(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).atan())
}

fn f_atan2(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).atan2(num(args, 1)))
}

fn f_ceil(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).ceil())
}

fn f_cos(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).cos())
}

fn f_exp(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).exp())
}

fn f_floor(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).floor())
}

fn f_intval(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).trunc())
}

fn f_log(args: &[Scalar]) -> Result<Scalar, CallError> {
    let x = num(args, 0);
    if args.len() == 2 {
        number(x.ln() / num(args, 1).ln())
    } else {
        number(x.ln())
    }
}

fn f_max(args: &[Scalar]) -> Result<Scalar, CallError> {
    if args.is_empty() {
        return Err(CallError::InvalidArgument(
            "max expects at least 1 argument".to_string(),
        ));
    }
    number(args.iter().map(|a| a.coerce_number()).fold(f64::NEG_INFINITY, f64::max))
}

fn f_min(args: &[Scalar]) -> Result<Scalar, CallError> {
    if args.is_empty() {
        return Err(CallError::InvalidArgument(
            "min expects at least 1 argument".to_string(),
        ));
    }
    number(args.iter().map(|a| a.coerce_number()).fold(f64::INFINITY, f64::min))
}

fn f_pi(_args: &[Scalar]) -> Result<Scalar, CallError> {
    number(std::f64::consts::PI)
}

fn f_pow(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).powf(num(args, 1)))
}

fn f_round(args: &[Scalar]) -> Result<Scalar, CallError> {
    let x = num(args, 0);
    if args.len() == 2 {
        let digits = num(args, 1);
        if !(0.0..=12.0).contains(&digits) || digits.fract() != 0.0 {
            return Err(CallError::OutOfRange(
                "round precision must be an integer between 0 and 12".to_string(),
            ));
        }
        let factor = 10f64.powi(digits as i32);
        number((x * factor).round() / factor)
    } else {
        number(x.round())
    }
}

fn f_sin(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).sin())
}

fn f_sqrt(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).sqrt())
}

fn f_sum(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(args.iter().map(|a| a.coerce_number()).sum())
}

fn f_tan(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(num(args, 0).tan())
}

fn f_count(args: &[Scalar]) -> Result<Scalar, CallError> {
    let n = args
        .iter()
        .filter(|a| !matches!(a, Scalar::Text(s) if s.is_empty()))
        .count();
    number(n as f64)
}

fn f_implode(args: &[Scalar]) -> Result<Scalar, CallError> {
    if args.is_empty() {
        return Err(CallError::InvalidArgument(
            "implode expects a glue argument".to_string(),
        ));
    }
    let glue = args[0].display();
    let parts: Vec<String> = args[1..].iter().map(Scalar::display).collect();
    Ok(Scalar::Text(parts.join(&glue)))
}

fn f_join(args: &[Scalar]) -> Result<Scalar, CallError> {
    Ok(Scalar::Text(args.iter().map(Scalar::display).collect()))
}

fn f_ltrim(args: &[Scalar]) -> Result<Scalar, CallError> {
    Ok(Scalar::Text(text(args, 0).trim_start().to_string()))
}

fn f_number_format(args: &[Scalar]) -> Result<Scalar, CallError> {
    let value = num(args, 0);
    let decimals = if args.len() == 2 {
        let d = num(args, 1);
        if !(0.0..=12.0).contains(&d) || d.fract() != 0.0 {
            return Err(CallError::OutOfRange(
                "number_format decimals must be an integer between 0 and 12".to_string(),
            ));
        }
        d as usize
    } else {
        0
    };

    let negative = value < 0.0;
    // Round half away from zero before formatting; the formatter itself
    // rounds ties to even.
    let factor = 10f64.powi(decimals as i32);
    let rounded = format!("{:.*}", decimals, (value.abs() * factor).round() / factor);
    let (integral, fraction) = match rounded.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (rounded, None),
    };

    let mut grouped = String::new();
    let digits: Vec<char> = integral.chars().collect();
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*ch);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(Scalar::Text(out))
}

fn f_rtrim(args: &[Scalar]) -> Result<Scalar, CallError> {
    Ok(Scalar::Text(text(args, 0).trim_end().to_string()))
}

fn f_str_pad(args: &[Scalar]) -> Result<Scalar, CallError> {
    let input = text(args, 0);
    let target = num(args, 1);
    if target < 0.0 || target.fract() != 0.0 {
        return Err(CallError::OutOfRange(
            "str_pad length must be a non-negative integer".to_string(),
        ));
    }
    let target = target as usize;
    let pad = if args.len() == 3 { text(args, 2) } else { " ".to_string() };
    if pad.is_empty() {
        return Err(CallError::InvalidArgument(
            "str_pad pad string must be non-empty".to_string(),
        ));
    }

    let mut out = input;
    let mut pad_chars = pad.chars().cycle();
    while out.chars().count() < target {
        out.push(pad_chars.next().expect("cycled iterator"));
    }
    Ok(Scalar::Text(out))
}

fn f_str_repeat(args: &[Scalar]) -> Result<Scalar, CallError> {
    let times = num(args, 1);
    if !(0.0..=65535.0).contains(&times) || times.fract() != 0.0 {
        return Err(CallError::OutOfRange(
            "str_repeat count must be an integer between 0 and 65535".to_string(),
        ));
    }
    Ok(Scalar::Text(text(args, 0).repeat(times as usize)))
}

fn f_str_replace(args: &[Scalar]) -> Result<Scalar, CallError> {
    let search = text(args, 0);
    let replace = text(args, 1);
    let subject = text(args, 2);
    if search.is_empty() {
        return Ok(Scalar::Text(subject));
    }
    Ok(Scalar::Text(subject.replace(&search, &replace)))
}

fn f_strcasecmp(args: &[Scalar]) -> Result<Scalar, CallError> {
    let a = text(args, 0).to_lowercase();
    let b = text(args, 1).to_lowercase();
    number(cmp_sign(a.cmp(&b)))
}

fn f_strcmp(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(cmp_sign(text(args, 0).cmp(&text(args, 1))))
}

fn cmp_sign(ordering: std::cmp::Ordering) -> f64 {
    match ordering {
        std::cmp::Ordering::Less => -1.0,
        std::cmp::Ordering::Equal => 0.0,
        std::cmp::Ordering::Greater => 1.0,
    }
}

fn f_strlen(args: &[Scalar]) -> Result<Scalar, CallError> {
    number(text(args, 0).chars().count() as f64)
}

fn f_strpos(args: &[Scalar]) -> Result<Scalar, CallError> {
    let haystack = text(args, 0);
    let needle = text(args, 1);
    // The scalar model has no false; a miss yields the falsy empty text.
    match haystack.find(&needle) {
        Some(byte_pos) => number(haystack[..byte_pos].chars().count() as f64),
        None => Ok(Scalar::Text(String::new())),
    }
}

fn f_strrev(args: &[Scalar]) -> Result<Scalar, CallError> {
    Ok(Scalar::Text(text(args, 0).chars().rev().collect()))
}

fn f_strtolower(args: &[Scalar]) -> Result<Scalar, CallError> {
    Ok(Scalar::Text(text(args, 0).to_lowercase()))
}

fn f_strtoupper(args: &[Scalar]) -> Result<Scalar, CallError> {
    Ok(Scalar::Text(text(args, 0).to_uppercase()))
}

fn f_substr(args: &[Scalar]) -> Result<Scalar, CallError> {
    let chars: Vec<char> = text(args, 0).chars().collect();
    let len = chars.len() as i64;

    let start = num(args, 1) as i64;
    let start = if start < 0 { (len + start).max(0) } else { start.min(len) } as usize;

    let end = if args.len() == 3 {
        let want = num(args, 2) as i64;
        if want < 0 {
            ((len + want).max(start as i64)) as usize
        } else {
            (start + want as usize).min(chars.len())
        }
    } else {
        chars.len()
    };

    Ok(Scalar::Text(chars[start..end.max(start)].iter().collect()))
}

fn f_trim(args: &[Scalar]) -> Result<Scalar, CallError> {
    Ok(Scalar::Text(text(args, 0).trim().to_string()))
}

fn f_ucwords(args: &[Scalar]) -> Result<Scalar, CallError> {
    let input = text(args, 0);
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;
    for ch in input.chars() {
        if ch.is_whitespace() {
            at_word_start = true;
            out.push(ch);
        } else if at_word_start {
            at_word_start = false;
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
    }
    Ok(Scalar::Text(out))
}

fn f_is_empty(args: &[Scalar]) -> Result<Scalar, CallError> {
    boolean(!args[0].is_truthy())
}

fn f_is_float(args: &[Scalar]) -> Result<Scalar, CallError> {
    boolean(args[0].as_number().map(|n| n.fract() != 0.0).unwrap_or(false))
}

fn f_is_int(args: &[Scalar]) -> Result<Scalar, CallError> {
    boolean(args[0].as_number().map(|n| n.fract() == 0.0).unwrap_or(false))
}

fn f_is_nan(args: &[Scalar]) -> Result<Scalar, CallError> {
    boolean(args[0].coerce_number().is_nan())
}

fn f_is_numeric(args: &[Scalar]) -> Result<Scalar, CallError> {
    boolean(args[0].is_numeric())
}

fn f_is_string(args: &[Scalar]) -> Result<Scalar, CallError> {
    boolean(matches!(args[0], Scalar::Text(_)))
}

fn f_if(args: &[Scalar]) -> Result<Scalar, CallError> {
    // Both branches were evaluated by the caller; this only selects.
    if args[0].is_truthy() {
        Ok(args[1].clone())
    } else {
        Ok(args[2].clone())
    }
}

fn f_list(args: &[Scalar]) -> Result<Scalar, CallError> {
    let parts: Vec<String> = args.iter().map(Scalar::display).collect();
    Ok(Scalar::Text(parts.join(", ")))
}
