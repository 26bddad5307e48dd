//! Hidden WebForms state scraped from the course offering landing page.
//!
//! The portal only accepts a postback if it echoes the `__VIEWSTATE`,
//! `__VIEWSTATEGENERATOR` and `__EVENTVALIDATION` values it rendered, from
//! within the same cookie session.

use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::error::ScrapeError;
use crate::transport::Transport;

const DEPARTMENT_SELECT: &str = "#CntntPlcHldr_ddlDept";
const TERM_SELECT: &str = "#CntntPlcHldr_ddlTerm";
const VIEWSTATE_INPUT: &str = "input#__VIEWSTATE";
const VIEWSTATEGENERATOR_INPUT: &str = "input#__VIEWSTATEGENERATOR";
const EVENTVALIDATION_INPUT: &str = "input#__EVENTVALIDATION";

pub const TERM_FIELD: &str = "ctl00$CntntPlcHldr$ddlTerm";
pub const DEPARTMENT_FIELD: &str = "ctl00$CntntPlcHldr$ddlDept";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostbackTokens {
    pub view_state: String,
    pub view_state_generator: String,
    pub event_validation: String,
}

/// Everything needed to replay the search form; fixed for the whole crawl.
#[derive(Debug, Clone)]
pub struct FormState {
    pub tokens: PostbackTokens,
    pub departments: Vec<String>,
    pub terms: Vec<String>,
}

impl FormState {
    /// Fetch the landing page and read tokens, departments and terms from it.
    pub async fn load(
        transport: &dyn Transport,
        url: &str,
        term_limit: usize,
    ) -> Result<Self, ScrapeError> {
        debug!(url = %url, "Loading landing page");
        let body = transport.get(url).await?;
        let document = Html::parse_document(&body);
        Self::from_document(&document, term_limit)
    }

    pub fn from_document(document: &Html, term_limit: usize) -> Result<Self, ScrapeError> {
        let tokens = extract_tokens(document)?;
        let departments = extract_departments(document)?;
        let terms = extract_terms(document, term_limit)?;

        info!(count = departments.len(), departments = ?departments, "Departments acquired");
        info!(count = terms.len(), terms = ?terms, "Terms acquired");

        Ok(Self {
            tokens,
            departments,
            terms,
        })
    }

    /// Form body selecting one (term, department) pair.
    pub fn postback_payload(&self, term: &str, department: &str) -> Vec<(String, String)> {
        vec![
            ("__VIEWSTATE".to_string(), self.tokens.view_state.clone()),
            (
                "__VIEWSTATEGENERATOR".to_string(),
                self.tokens.view_state_generator.clone(),
            ),
            (
                "__EVENTVALIDATION".to_string(),
                self.tokens.event_validation.clone(),
            ),
            (TERM_FIELD.to_string(), term.to_string()),
            (DEPARTMENT_FIELD.to_string(), department.to_string()),
        ]
    }

    /// Number of postbacks a full crawl will issue.
    pub fn pair_count(&self) -> usize {
        self.terms.len() * self.departments.len()
    }
}

pub fn extract_tokens(document: &Html) -> Result<PostbackTokens, ScrapeError> {
    Ok(PostbackTokens {
        view_state: input_value(document, VIEWSTATE_INPUT)?,
        view_state_generator: input_value(document, VIEWSTATEGENERATOR_INPUT)?,
        event_validation: input_value(document, EVENTVALIDATION_INPUT)?,
    })
}

pub fn extract_departments(document: &Html) -> Result<Vec<String>, ScrapeError> {
    option_values(document, DEPARTMENT_SELECT)
}

/// Term options in page order, cut to the first `limit` (the portal lists the newest first).
pub fn extract_terms(document: &Html, limit: usize) -> Result<Vec<String>, ScrapeError> {
    let mut terms = option_values(document, TERM_SELECT)?;
    terms.truncate(limit);
    Ok(terms)
}

fn input_value(document: &Html, css: &str) -> Result<String, ScrapeError> {
    let selector = Selector::parse(css).expect("Invalid input selector");
    let input = document
        .select(&selector)
        .next()
        .ok_or_else(|| ScrapeError::MissingElement {
            selector: css.to_string(),
        })?;

    input
        .value()
        .attr("value")
        .map(str::to_string)
        .ok_or_else(|| ScrapeError::MissingAttribute {
            selector: css.to_string(),
            attribute: "value".to_string(),
        })
}

/// Option values of a `<select>`, deduplicated in first-seen order.
fn option_values(document: &Html, css: &str) -> Result<Vec<String>, ScrapeError> {
    let select_selector = Selector::parse(css).expect("Invalid select selector");
    let option_selector = Selector::parse("option").expect("Invalid option selector");

    let select = document
        .select(&select_selector)
        .next()
        .ok_or_else(|| ScrapeError::MissingElement {
            selector: css.to_string(),
        })?;

    let mut values: Vec<String> = Vec::new();
    for option in select.select(&option_selector) {
        let Some(value) = option.value().attr("value") else {
            continue;
        };
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }

    Ok(values)
}
