//! Composable building blocks for plain-text system prompts.
//!
//! A [`Prompt`] is an ordered list of components separated by blank lines.
//! Most components render as a titled section:
//!
//! ```
//! use prompt_crafter::{Instruction, Persona, Prompt};
//!
//! let prompt = Prompt::builder()
//!     .add(Persona::new("You are terse."))
//!     .add(Instruction::new("Answer in one word."))
//!     .build();
//! assert_eq!(
//!     prompt.to_string(),
//!     "### Persona ###\nYou are terse.\n\n### Instruction ###\nAnswer in one word."
//! );
//! ```

use std::fmt;

/// A piece of a prompt.
pub trait PromptComponent: Send + Sync {
    fn render(&self) -> String;
}

fn section(title: &str, body: &str) -> String {
    format!("### {title} ###\n{body}")
}

/// An ordered set of components.
pub struct Prompt {
    components: Vec<Box<dyn PromptComponent>>,
}

impl Prompt {
    pub fn builder() -> PromptBuilder {
        PromptBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }
            f.write_str(&component.render())?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct PromptBuilder {
    components: Vec<Box<dyn PromptComponent>>,
}

impl PromptBuilder {
    pub fn add(mut self, component: impl PromptComponent + 'static) -> Self {
        self.components.push(Box::new(component));
        self
    }

    pub fn build(self) -> Prompt {
        Prompt {
            components: self.components,
        }
    }
}

macro_rules! text_section {
    ($(#[$doc:meta])* $name:ident, $title:literal) => {
        $(#[$doc])*
        pub struct $name {
            text: String,
        }

        impl $name {
            pub fn new(text: impl Into<String>) -> Self {
                Self { text: text.into() }
            }
        }

        impl PromptComponent for $name {
            fn render(&self) -> String {
                section($title, &self.text)
            }
        }
    };
}

text_section!(
    /// Who the model is.
    Persona,
    "Persona"
);
text_section!(
    /// What the model should do.
    Instruction,
    "Instruction"
);
text_section!(
    /// Background facts, e.g. the current date.
    Context,
    "Context"
);

/// The shape the reply must take.
pub struct OutputFormat {
    format_description: String,
}

impl OutputFormat {
    pub fn new(format_description: impl Into<String>) -> Self {
        Self {
            format_description: format_description.into(),
        }
    }
}

impl PromptComponent for OutputFormat {
    fn render(&self) -> String {
        section(
            "Output Format",
            &format!(
                "Your response must be in the following format:\n{}",
                self.format_description
            ),
        )
    }
}

/// One input/output demonstration.
pub struct Example {
    input: String,
    output: String,
}

impl Example {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

impl PromptComponent for Example {
    fn render(&self) -> String {
        format!("Input: {}\nOutput: {}", self.input, self.output)
    }
}

/// A titled list of demonstrations.
pub struct FewShot {
    examples: Vec<Example>,
}

impl FewShot {
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }
}

impl PromptComponent for FewShot {
    fn render(&self) -> String {
        let body = self
            .examples
            .iter()
            .map(Example::render)
            .collect::<Vec<_>>()
            .join("\n\n");
        section("Examples", &body)
    }
}

/// A tool the model may call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments, already serialized.
    pub parameters: String,
}

/// Lists the available tools with their argument schemas.
pub struct ToolCatalog {
    tools: Vec<ToolSpec>,
}

impl ToolCatalog {
    pub fn new(tools: Vec<ToolSpec>) -> Self {
        Self { tools }
    }
}

impl PromptComponent for ToolCatalog {
    fn render(&self) -> String {
        if self.tools.is_empty() {
            return section("Tools", "No tools are available.");
        }
        let body = self
            .tools
            .iter()
            .map(|tool| {
                format!(
                    "- {}: {}\n  arguments: {}",
                    tool.name, tool.description, tool.parameters
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        section("Tools", &body)
    }
}
