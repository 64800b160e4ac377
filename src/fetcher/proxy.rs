//! CORS-relay rotation. The relay for an attempt is a pure function of the
//! attempt number, so concurrent terms never share a mutable cursor.

/// Template that calls the target directly.
pub const DIRECT: &str = "{url}";

#[derive(Debug, Clone)]
pub struct ProxyRotation {
    templates: Vec<String>,
}

impl ProxyRotation {
    pub fn new(templates: Vec<String>) -> Self {
        Self { templates }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Wraps around the list. Panics on an empty rotation; callers check
    /// `len` first.
    pub fn template_for_attempt(&self, attempt: usize) -> &str {
        &self.templates[attempt % self.templates.len()]
    }

    pub fn url_for_attempt(&self, attempt: usize, target: &str) -> String {
        apply_template(self.template_for_attempt(attempt), target)
    }
}

/// Replace `{url}` with the percent-encoded target; the bare template is a
/// direct call and keeps the target as-is.
pub fn apply_template(template: &str, target: &str) -> String {
    if template == DIRECT {
        return target.to_string();
    }
    template.replace("{url}", &encode_component(target))
}

pub fn encode_component(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
