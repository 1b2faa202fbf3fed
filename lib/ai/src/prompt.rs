//! Prompt templates.
//!
//! Templates use `{{variable_name}}` placeholders. The persona template
//! below is the system prompt for every answer; it is also where the
//! `SUGGESTIONS:` output contract with the model is established.

use crate::error::PromptError;
use std::collections::HashMap;

/// Marker the model is asked to emit before its follow-up questions.
pub const SUGGESTIONS_MARKER: &str = "SUGGESTIONS:";

/// Separator between follow-up questions after the marker.
pub const SUGGESTIONS_DELIMITER: char = '|';

/// System prompt for the autism resources guide.
pub const PERSONA_TEMPLATE: &str = "\
You are a warm, patient guide who helps families and individuals find autism \
resources. Speak gently and plainly, avoid jargon, and never diagnose.

The person you are talking with:
- Role: {{role}}
- Age of the autistic person: {{age}}
- Location: {{location}}

Tailor your answer to this role, age, and location. Prefer services and \
programs that are available in their location when the context mentions them.

Answer using only the resources in the context below. If the context does not \
cover the question, say so kindly and suggest where they might look next.

Context:
{{context}}

After your answer, on its own line, write SUGGESTIONS: followed by exactly \
three short follow-up questions the person might ask next, separated by |. \
For example:
SUGGESTIONS: What is an IEP? | Are there local support groups? | How do I find a therapist?";

/// Definition of a template variable.
#[derive(Debug, Clone)]
pub struct VariableDefinition {
    /// Description of what this variable is for.
    pub description: String,
    /// Whether this variable is required.
    pub required: bool,
    /// Default value if not provided.
    pub default: Option<String>,
}

impl VariableDefinition {
    /// Creates a required variable definition.
    #[must_use]
    pub fn required(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            required: true,
            default: None,
        }
    }

    /// Creates an optional variable definition.
    #[must_use]
    pub fn optional(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            required: false,
            default: None,
        }
    }

    /// Sets a default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A named prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Template name (used in errors).
    pub name: String,
    /// Template content with placeholders.
    pub content: String,
    /// Variable definitions (name -> definition).
    pub variables: HashMap<String, VariableDefinition>,
}

impl PromptTemplate {
    /// Creates a new prompt template.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            variables: HashMap::new(),
        }
    }

    /// The default persona template with its variables declared.
    #[must_use]
    pub fn persona() -> Self {
        Self::new("persona", PERSONA_TEMPLATE)
            .with_variable("role", VariableDefinition::required("Who is asking"))
            .with_variable(
                "age",
                VariableDefinition::required("Age of the autistic person"),
            )
            .with_variable(
                "location",
                VariableDefinition::optional("Where the family lives").with_default("Not specified"),
            )
            .with_variable(
                "context",
                VariableDefinition::optional("Retrieved passages")
                    .with_default("No matching resources were found."),
            )
    }

    /// Adds a variable definition.
    #[must_use]
    pub fn with_variable(
        mut self,
        name: impl Into<String>,
        definition: VariableDefinition,
    ) -> Self {
        self.variables.insert(name.into(), definition);
        self
    }

    /// Renders the template with the given variables.
    ///
    /// Placeholders are resolved in one left-to-right pass over the
    /// template; substituted values are never scanned again, so a value
    /// containing `{{name}}` is emitted literally. Empty values fall back to
    /// the variable's default, if it has one. Undeclared variables are
    /// substituted verbatim and unknown placeholders are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `MissingVariable` for a required variable with no value and
    /// no default.
    pub fn render(&self, variables: &HashMap<String, String>) -> Result<String, PromptError> {
        let mut result = String::with_capacity(self.content.len());
        let mut rest = self.content.as_str();

        while let Some(start) = rest.find("{{") {
            let after_open = &rest[start + 2..];
            let Some(end) = after_open.find("}}") else {
                break;
            };
            result.push_str(&rest[..start]);

            let name = &after_open[..end];
            match self.resolve(name, variables)? {
                Some(value) => result.push_str(value),
                None => result.push_str(&rest[start..start + 2 + end + 2]),
            }
            rest = &after_open[end + 2..];
        }
        result.push_str(rest);

        Ok(result)
    }

    /// Value for one placeholder, or `None` if the name is unknown.
    fn resolve<'a>(
        &'a self,
        name: &str,
        variables: &'a HashMap<String, String>,
    ) -> Result<Option<&'a str>, PromptError> {
        let provided = variables.get(name).map(String::as_str);
        let Some(def) = self.variables.get(name) else {
            return Ok(provided);
        };

        match (provided.filter(|v| !v.trim().is_empty()), def.default.as_deref()) {
            (Some(v), _) => Ok(Some(v)),
            (None, Some(default)) => Ok(Some(default)),
            (None, None) if def.required => Err(PromptError::MissingVariable {
                template: self.name.clone(),
                variable: name.to_string(),
            }),
            (None, None) => Ok(Some("")),
        }
    }
}
