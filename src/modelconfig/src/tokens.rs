use crate::error::ConfigError;

/// One directive and its arguments, as split out of the configuration text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGroup {
    pub line: usize,
    pub tokens: Vec<String>,
}

/// Split configuration text into token groups. Groups end at semicolons and
/// newlines; `#` comments run to end of line; commas separate values.
pub fn tokenize(text: &str) -> Vec<TokenGroup> {
    let mut groups = Vec::new();
    for (line_ix, raw_line) in text.lines().enumerate() {
        let line = match raw_line.find('#') {
            Some(at) => &raw_line[..at],
            None => raw_line,
        };
        for segment in line.split(';') {
            let tokens: Vec<String> = segment
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect();
            if !tokens.is_empty() {
                groups.push(TokenGroup { line: line_ix + 1, tokens });
            }
        }
    }
    groups
}

/// One parsed argument of a range-valued directive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Scalar(f64),
    /// Inclusive arithmetic progression `start-end:step`.
    Range { start: f64, end: f64, step: f64 },
    /// `start-end:step` with the literal `end` keyword: open-ended sweep.
    OpenRange { start: f64, step: f64 },
    /// The literal `Marker` symbol.
    Marker,
}

impl Value {
    /// Expand into concrete doubles. Symbolic values yield nothing here;
    /// the caller handles them from the `Value` form.
    pub fn expand_into(&self, out: &mut Vec<f64>) {
        match *self {
            Value::Scalar(v) => out.push(v),
            Value::Range { start, end, step } => {
                let mut i = 0;
                loop {
                    let v = start + f64::from(i) * step;
                    if v > end + 1.0e-12 {
                        break;
                    }
                    out.push(v);
                    i += 1;
                }
            }
            Value::OpenRange { .. } | Value::Marker => {}
        }
    }
}

/// Parse the argument tokens of a list-valued directive. Each token is a
/// double, an `i-j:k` range, an `i-end:k` open range, or the `Marker`
/// symbol.
pub fn parse_values(directive: &str, tokens: &[String]) -> Result<Vec<Value>, ConfigError> {
    if tokens.is_empty() {
        return Err(ConfigError::MissingArgument(directive.to_owned()));
    }
    tokens.iter().map(|t| parse_value(directive, t)).collect()
}

/// Parse argument tokens that must all be plain doubles or closed ranges,
/// expanded to a flat list.
pub fn parse_doubles(directive: &str, tokens: &[String]) -> Result<Vec<f64>, ConfigError> {
    let values = parse_values(directive, tokens)?;
    let mut out = Vec::new();
    for value in &values {
        match value {
            Value::OpenRange { .. } | Value::Marker => {
                return Err(ConfigError::IllegalArgument {
                    directive: directive.to_owned(),
                    arg: "symbolic range".to_owned(),
                })
            }
            _ => value.expand_into(&mut out),
        }
    }
    Ok(out)
}

fn parse_value(directive: &str, token: &str) -> Result<Value, ConfigError> {
    if token.eq_ignore_ascii_case("marker") {
        return Ok(Value::Marker);
    }
    if let Ok(v) = token.parse::<f64>() {
        return Ok(Value::Scalar(v));
    }

    let illegal = || ConfigError::IllegalArgument {
        directive: directive.to_owned(),
        arg: token.to_owned(),
    };

    // range form: <start>-<end>:<step>, where start may itself be negative
    let (head, step) = token.split_once(':').ok_or_else(illegal)?;
    let step: f64 = step.parse().map_err(|_| illegal())?;
    let dash = find_range_dash(head).ok_or_else(illegal)?;
    let start: f64 = head[..dash].parse().map_err(|_| illegal())?;
    let tail = &head[dash + 1..];
    if tail.eq_ignore_ascii_case("end") {
        return Ok(Value::OpenRange { start, step });
    }
    let end: f64 = tail.parse().map_err(|_| illegal())?;
    if step <= 0.0 || end < start {
        return Err(illegal());
    }
    Ok(Value::Range { start, end, step })
}

/// Find the '-' separating start from end. Skip a leading sign and any
/// minus directly after an exponent marker.
fn find_range_dash(expr: &str) -> Option<usize> {
    let bytes = expr.as_bytes();
    for (i, &b) in bytes.iter().enumerate().skip(1) {
        if b == b'-' && !matches!(bytes[i - 1], b'e' | b'E') {
            return Some(i);
        }
    }
    None
}
