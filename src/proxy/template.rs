//! Rendering of the proxy site template.
//!
//! Templates use `{{.Domain}}`, `{{.CertDomain}}` and `{{.Target}}` placeholders, with optional
//! whitespace inside the braces. Any other placeholder is rejected when the template is loaded.

use crate::error::Error;
use crate::route::Route;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::path::Path;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{\{\s*\.(\w+)\s*\}\}").unwrap();
}

const FIELDS: [&str; 3] = ["Domain", "CertDomain", "Target"];

#[derive(Debug, Clone)]
pub struct Template {
    source: String,
}

impl Template {
    /// # Errors
    ///
    /// Returns [`Error::Template`] if `source` references an unknown placeholder.
    pub fn parse(source: impl Into<String>) -> Result<Self, Error> {
        let source = source.into();
        if let Some(unknown) = PLACEHOLDER_RE
            .captures_iter(&source)
            .map(|c| c[1].to_string())
            .find(|field| !FIELDS.contains(&field.as_str()))
        {
            return Err(Error::Template(format!("unknown placeholder \"{unknown}\"")));
        }
        Ok(Self { source })
    }

    /// # Errors
    ///
    /// Returns [`Error::IO`] if the file can't be read, or [`Error::Template`] if it
    /// references an unknown placeholder.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        Self::parse(std::fs::read_to_string(p)?)
    }

    #[must_use]
    pub fn render(&self, route: &Route) -> String {
        PLACEHOLDER_RE
            .replace_all(&self.source, |caps: &Captures| match &caps[1] {
                "Domain" => route.domain.clone(),
                "CertDomain" => route.cert_domain.clone(),
                "Target" => route.target.clone(),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }
}
