use serde::{Deserialize, Serialize};

/// What the user has told Cortex about themselves. Rendered into a system
/// message on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub address: String,
    /// Free-form notes appended after the structured fields.
    pub about: String,
}

impl UserProfile {
    /// Field names accepted by [`UserProfile::set_field`].
    pub const FIELDS: &'static [&'static str] = &["name", "email", "mobile", "address", "about"];

    pub fn is_empty(&self) -> bool {
        [&self.name, &self.email, &self.mobile, &self.address, &self.about]
            .iter()
            .all(|f| f.trim().is_empty())
    }

    /// Set one field by name. Returns `false` for an unknown field.
    pub fn set_field(&mut self, field: &str, value: impl Into<String>) -> bool {
        let slot = match field {
            "name" => &mut self.name,
            "email" => &mut self.email,
            "mobile" | "phone" => &mut self.mobile,
            "address" => &mut self.address,
            "about" => &mut self.about,
            _ => return false,
        };
        *slot = value.into();
        true
    }

    /// The free-text context sent to the model, or `None` for an empty profile.
    pub fn to_context(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut parts = Vec::new();
        if !self.name.trim().is_empty() {
            parts.push(format!("My name is {}", self.name.trim()));
        }
        if !self.email.trim().is_empty() {
            parts.push(format!("my email is {}", self.email.trim()));
        }
        if !self.mobile.trim().is_empty() {
            parts.push(format!("my phone number is {}", self.mobile.trim()));
        }
        if !self.address.trim().is_empty() {
            parts.push(format!("my address is {}", self.address.trim()));
        }

        let mut context = String::new();
        if !parts.is_empty() {
            context.push_str(&format!("User Profile: {}. ", parts.join(", ")));
        }
        if !self.about.trim().is_empty() {
            context.push_str(self.about.trim());
            context.push(' ');
        }
        context.push_str("Please use this information when relevant to provide personalized responses.");
        Some(context)
    }
}
