use thiserror::Error;

/// Failures raised while talking to the portal or reading its markup.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("landing page has no element matching `{selector}`")]
    MissingElement { selector: String },

    #[error("element `{selector}` has no `{attribute}` attribute")]
    MissingAttribute { selector: String, attribute: String },

    #[error("row is missing the `{label}` field")]
    MissingLabel { label: &'static str },

    #[error("data cell `{text}` has no `Label:Value` separator")]
    MalformedCell { text: String },

    #[error("field `{label}` has unexpected value `{value}`")]
    MalformedField { label: &'static str, value: String },
}

impl ScrapeError {
    /// Network or HTTP-level failure, as opposed to a markup problem.
    pub fn is_transport(&self) -> bool {
        matches!(self, ScrapeError::Transport { .. } | ScrapeError::Status { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        let status = ScrapeError::Status {
            url: "https://example.com".to_string(),
            status: 503,
        };
        assert!(status.is_transport());

        let missing = ScrapeError::MissingLabel { label: "CRN" };
        assert!(!missing.is_transport());
        assert_eq!(missing.to_string(), "row is missing the `CRN` field");
    }
}
