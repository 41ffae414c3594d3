//! Template identifier to form type resolution.

use crate::config::TemplateIds;
use crate::models::FormType;

/// Form type reported when a template is not one of the configured four.
pub const UNKNOWN_FORM_TYPE: &str = "unknown";

/// Ordered template → form type mapping, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMap {
    entries: Vec<(String, FormType)>,
}

impl TemplateMap {
    pub fn new(entries: impl IntoIterator<Item = (String, FormType)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Form type for a template identifier. Exact string match; the first
    /// entry wins when identifiers repeat.
    pub fn form_type_for(&self, template_id: &str) -> &'static str {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == template_id)
            .map(|(_, form_type)| form_type.as_str())
            .unwrap_or(UNKNOWN_FORM_TYPE)
    }
}

impl From<&TemplateIds> for TemplateMap {
    fn from(templates: &TemplateIds) -> Self {
        Self::new(
            templates
                .entries()
                .into_iter()
                .map(|(id, form_type)| (id.to_string(), form_type)),
        )
    }
}
