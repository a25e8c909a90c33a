//! Reproduction file generator - converts failed scenarios to .http format

use crate::config::is_sensitive_header;
use crate::verdict::ScenarioResult;

/// Generate .http file content from failed scenario results.
///
/// Credential headers are emitted as `{{header-name}}` variables so the file
/// can be shared without leaking secrets. With `basic_auth` set every request
/// carries `Authorization: Basic {{authorization}}`.
pub fn to_http_file<'a>(
    failures: impl IntoIterator<Item = &'a ScenarioResult>,
    headers: &[(String, String)],
    basic_auth: bool,
) -> String {
    let failures: Vec<&ScenarioResult> = failures.into_iter().collect();
    let mut lines = Vec::new();

    lines.push(format!(
        "# Auto-generated reproduction cases ({} failures)",
        failures.len()
    ));
    lines.push(String::new());

    for (idx, result) in failures.iter().enumerate() {
        let label = result
            .failure
            .as_ref()
            .map_or("failure", |f| f.label());
        lines.push(format!(
            "### [{idx}] {} - {label}",
            result.label()
        ));
        if let Some(failure) = &result.failure {
            for line in failure.describe() {
                lines.push(format!("# {line}"));
            }
        }

        lines.push(format!("{} {}", result.request.method, result.request.url));
        lines.push("Accept: application/json".to_string());
        if basic_auth {
            lines.push("Authorization: Basic {{authorization}}".to_string());
        }
        for (key, value) in headers {
            if is_sensitive_header(key) {
                lines.push(format!("{key}: {{{{{}}}}}", key.to_lowercase()));
            } else {
                lines.push(format!("{key}: {value}"));
            }
        }

        lines.push(String::new());
        lines.push("###".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}
