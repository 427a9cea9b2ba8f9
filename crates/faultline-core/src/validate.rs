use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;

use crate::error::FieldIssue;
use crate::models::{Category, Environment, ErrorReport, RawErrorReport, Severity};

pub const MAX_MESSAGE_CHARS: usize = 1000;
pub const MAX_MODULE_CHARS: usize = 50;
pub const MAX_FUNCTION_CHARS: usize = 100;
pub const MAX_USER_AGENT_CHARS: usize = 500;
pub const MAX_STACK_CHARS: usize = 16_384;
pub const MAX_TAGS: usize = 10;

/// Check a raw submission against the report schema.
///
/// All violations are collected so the caller can fix them in one round trip.
pub fn validate_report(raw: RawErrorReport) -> Result<ErrorReport, Vec<FieldIssue>> {
    let mut issues = Vec::new();

    let message = required_text(&mut issues, "message", raw.message, MAX_MESSAGE_CHARS);
    let module = required_text(&mut issues, "module", raw.module, MAX_MODULE_CHARS);

    if let Some(stack) = &raw.stack {
        check_max_chars(&mut issues, "stack", stack, MAX_STACK_CHARS);
    }
    if let Some(user_agent) = &raw.user_agent {
        check_max_chars(&mut issues, "userAgent", user_agent, MAX_USER_AGENT_CHARS);
    }
    if let Some(function) = &raw.function {
        check_length(&mut issues, "function", function, 1, MAX_FUNCTION_CHARS);
    }
    if let Some(url) = &raw.url
        && Url::parse(url).is_err()
    {
        issues.push(FieldIssue::new("url", "must be an absolute URL"));
    }
    if let Some(user_id) = &raw.user_id
        && Uuid::parse_str(user_id).is_err()
    {
        issues.push(FieldIssue::new("userId", "must be a UUID"));
    }

    let environment = match raw.environment.as_deref() {
        None => None,
        Some(value) => {
            let parsed = Environment::parse(value);
            if parsed.is_none() {
                issues.push(FieldIssue::new(
                    "environment",
                    "must be one of development, test, production",
                ));
            }
            parsed
        }
    };
    let severity = match raw.severity.as_deref() {
        None => Severity::default(),
        Some(value) => Severity::parse(value).unwrap_or_else(|| {
            issues.push(FieldIssue::new(
                "severity",
                "must be one of low, medium, high, critical",
            ));
            Severity::default()
        }),
    };
    let category = match raw.category.as_deref() {
        None => Category::default(),
        Some(value) => Category::parse(value).unwrap_or_else(|| {
            issues.push(FieldIssue::new(
                "category",
                "must be one of frontend, backend, api, database, network, security, performance",
            ));
            Category::default()
        }),
    };

    let tags = raw.tags.unwrap_or_default();
    if tags.len() > MAX_TAGS {
        issues.push(FieldIssue::new(
            "tags",
            format!("must contain at most {MAX_TAGS} entries"),
        ));
    }

    let additional_data = match raw.additional_data {
        None | Some(serde_json::Value::Null) => serde_json::Map::new(),
        Some(serde_json::Value::Object(map)) => map,
        Some(_) => {
            issues.push(FieldIssue::new("additionalData", "must be a JSON object"));
            serde_json::Map::new()
        }
    };

    let timestamp = match raw.timestamp.as_deref() {
        None => None,
        Some(value) => match DateTime::parse_from_rfc3339(value) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(_) => {
                issues.push(FieldIssue::new(
                    "timestamp",
                    "must be an ISO-8601 date-time",
                ));
                None
            }
        },
    };

    if !issues.is_empty() {
        return Err(issues);
    }

    Ok(ErrorReport {
        message,
        error_code: raw.error_code,
        stack: raw.stack,
        url: raw.url,
        user_agent: raw.user_agent,
        user_id: raw.user_id,
        session_id: raw.session_id,
        module,
        function: raw.function,
        version: raw.version,
        environment,
        severity,
        category,
        tags,
        additional_data,
        fingerprint: raw.fingerprint.filter(|value| !value.is_empty()),
        timestamp,
        browser_info: raw.browser_info,
    })
}

fn required_text(
    issues: &mut Vec<FieldIssue>,
    field: &str,
    value: Option<String>,
    max_chars: usize,
) -> String {
    match value {
        Some(value) => {
            check_length(issues, field, &value, 1, max_chars);
            value
        }
        None => {
            issues.push(FieldIssue::new(field, "is required"));
            String::new()
        }
    }
}

fn check_length(issues: &mut Vec<FieldIssue>, field: &str, value: &str, min: usize, max: usize) {
    let chars = value.chars().count();
    if chars < min {
        issues.push(FieldIssue::new(field, "must not be empty"));
    } else if chars > max {
        issues.push(FieldIssue::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
}

fn check_max_chars(issues: &mut Vec<FieldIssue>, field: &str, value: &str, max: usize) {
    check_length(issues, field, value, 0, max);
}
