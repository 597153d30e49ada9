use crate::grammar::{EnvFileParser, Rule};
use withconfig_core::{EnvMap, Result, WithConfigError};
use pest::Parser;

/// Parse an env file into a mapping. Later assignments of a key replace
/// earlier ones.
pub fn parse_env_file(input: &str) -> Result<EnvMap> {
    let mut pairs = EnvFileParser::parse(Rule::file, input)
        .map_err(|e| WithConfigError::ParseError(e.to_string()))?;

    let file_pair = pairs.next().ok_or_else(|| {
        WithConfigError::ParseError("No content found in env file".to_string())
    })?;

    let mut env = EnvMap::new();
    for inner_pair in file_pair.into_inner() {
        if inner_pair.as_rule() == Rule::assignment {
            let (key, value) = parse_assignment(inner_pair)?;
            env.insert(key, value);
        }
    }

    Ok(env)
}

fn parse_assignment(pair: pest::iterators::Pair<Rule>) -> Result<(String, String)> {
    let mut key = None;
    let mut value = String::new();

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::key => key = Some(inner_pair.as_str().to_string()),
            Rule::double_quoted => value = unescape_double_quoted(inner_text(inner_pair)),
            Rule::single_quoted => value = inner_text(inner_pair).to_string(),
            Rule::bare => value = inner_pair.as_str().trim_end().to_string(),
            _ => {}
        }
    }

    let key = key.ok_or_else(|| WithConfigError::ParseError("Assignment without a key".to_string()))?;
    Ok((key, value))
}

fn inner_text(pair: pest::iterators::Pair<Rule>) -> &str {
    pair.into_inner().next().map(|p| p.as_str()).unwrap_or("")
}

fn unescape_double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('$') => out.push('$'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}
