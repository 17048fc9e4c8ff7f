use meetrag_core::error::{AppError, ErrorKind};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
}

impl OllamaClient {
    /// Create a client for an Ollama server. The base URL must be `http(s)://host[:port]`.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = validate_base_url(base_url)?;
        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = ureq::get(&url)
            .timeout(std::time::Duration::from_millis(800))
            .call();

        match resp {
            Ok(r) if r.status() == 200 => Ok(()),
            Ok(r) => Err(
                AppError::new(ErrorKind::CompletionService, "AI_OLLAMA_UNHEALTHY", "Ollama health check failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(e) => Err(AppError::new(
                ErrorKind::CompletionService,
                "AI_OLLAMA_UNREACHABLE",
                "Failed to reach Ollama",
            )
            .with_details(e.to_string())),
        }
    }
}

/// Accept `scheme://host[:port]` with an optional trailing slash. Paths, userinfo,
/// queries and out-of-range ports are rejected.
pub(crate) fn validate_base_url(raw: &str) -> Result<String, AppError> {
    let base_url = raw.trim().trim_end_matches('/').to_string();
    let invalid = |why: &str| {
        AppError::new(ErrorKind::InvalidConfig, "AI_BASE_URL_INVALID", "Provider base URL is invalid")
            .with_details(format!("base_url={base_url}; reason={why}"))
    };

    let rest = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))
        .ok_or_else(|| invalid("scheme must be http or https"))?;
    if rest.is_empty() {
        return Err(invalid("missing host"));
    }
    if rest.contains('@') || rest.contains('?') || rest.contains('#') {
        return Err(invalid("userinfo, query and fragment are not allowed"));
    }

    // Everything after the first '/' is a path; only a version prefix like `/v1` is tolerated.
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };
    if !path.is_empty() && !is_version_path(path) {
        return Err(invalid("path is not allowed"));
    }

    let host = match authority.rsplit_once(':') {
        Some((host, port)) if !authority.starts_with('[') || host.ends_with(']') => {
            match port.parse::<u16>() {
                Ok(p) if p > 0 => host,
                _ => return Err(invalid("port must be 1-65535")),
            }
        }
        _ => authority,
    };
    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    Ok(base_url)
}

fn is_version_path(path: &str) -> bool {
    // `/v1`, `/openai/v1`
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    segments.last().map_or(false, |s| {
        s.len() >= 2 && s.starts_with('v') && s[1..].chars().all(|c| c.is_ascii_digit())
    }) && segments.iter().all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
}
