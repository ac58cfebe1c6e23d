//! Project-instruction file (`CLAUDE.md`) generation.
//!
//! The generated file gives the monitored assistant the project overview,
//! the numbered requirements, the detected stack, and the working directory.
//! Anything the user wrote between the custom-section markers survives
//! regeneration.

use std::path::{Path, PathBuf};

use super::{ProjectContext, ProjectType};

/// Marker for the start of a user-preserved section.
pub const USER_CUSTOM_START: &str = "<!-- USER_CUSTOM_START -->";

/// Marker for the end of a user-preserved section.
pub const USER_CUSTOM_END: &str = "<!-- USER_CUSTOM_END -->";

/// Builds instruction text from a [`ProjectContext`].
#[derive(Debug, Clone)]
pub struct InstructionGenerator<'a> {
    context: &'a ProjectContext,
    working_directory: PathBuf,
    existing_content: Option<String>,
}

impl<'a> InstructionGenerator<'a> {
    #[must_use]
    pub fn new(context: &'a ProjectContext, working_directory: impl AsRef<Path>) -> Self {
        Self {
            context,
            working_directory: working_directory.as_ref().to_path_buf(),
            existing_content: None,
        }
    }

    /// Keep user sections from a previous version of the file.
    #[must_use]
    pub fn with_existing_content(mut self, content: impl Into<String>) -> Self {
        self.existing_content = Some(content.into());
        self
    }

    /// Render the full instruction file.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut content = String::new();
        content.push_str(&self.generate_header());
        content.push_str(&self.generate_requirements());
        content.push_str(&self.generate_stack());
        content.push_str(&self.generate_working_directory());
        content.push_str(SUPERVISION_NOTES);
        content.push_str(&generate_user_customization_section());

        if let Some(ref existing) = self.existing_content {
            content = preserve_user_customizations(&content, existing);
        }

        content
    }

    fn generate_header(&self) -> String {
        let overview = self
            .context
            .overview
            .as_deref()
            .unwrap_or("No project overview was found in the requirements document.");
        format!("# Project Instructions\n\n## Overview\n\n{overview}\n\n---\n\n")
    }

    fn generate_requirements(&self) -> String {
        let mut section = String::from("## Requirements\n\n");
        if self.context.requirements.is_empty() {
            section.push_str(
                "No explicit requirements were found. Follow the overview and keep \
                 the implementation minimal.\n",
            );
        } else {
            for (i, req) in self.context.requirements.iter().enumerate() {
                section.push_str(&format!("{}. {}\n", i + 1, req));
            }
        }
        section.push_str("\n---\n\n");
        section
    }

    fn generate_stack(&self) -> String {
        let frameworks = if self.context.frameworks.is_empty() {
            "none detected".to_string()
        } else {
            self.context
                .frameworks
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };
        let project_type = match self.context.project_type {
            ProjectType::Unknown => "not specified".to_string(),
            other => other.to_string(),
        };
        format!(
            "## Project Type\n\n\
             **Type:** {project_type}\n\
             **Frameworks:** {frameworks}\n\n\
             ---\n\n"
        )
    }

    fn generate_working_directory(&self) -> String {
        format!(
            "## Working Directory\n\n\
             All files belong under `{}`. Use paths relative to this directory.\n\n\
             ---\n\n",
            self.working_directory.display()
        )
    }
}

const SUPERVISION_NOTES: &str = "## Supervision\n\n\
This session is supervised. Routine questions are answered automatically:\n\
- Proceed with the requirements above without asking for confirmation.\n\
- Prefer the detected frameworks when a technology choice is needed.\n\
- Deletions and schema or database changes are always reviewed by a person.\n\n\
---\n\n";

fn generate_user_customization_section() -> String {
    format!(
        "## User Notes\n\n\
         Add project-specific notes below. This section is preserved during regeneration.\n\n\
         {USER_CUSTOM_START}\n\
         \n\
         {USER_CUSTOM_END}\n"
    )
}

fn preserve_user_customizations(new_content: &str, existing: &str) -> String {
    let custom_sections = extract_user_custom_sections(existing);
    if custom_sections.is_empty() {
        return new_content.to_string();
    }

    let empty_section = format!("{USER_CUSTOM_START}\n\n{USER_CUSTOM_END}");
    let preserved: String = custom_sections.concat();
    let preserved_section = format!("{USER_CUSTOM_START}{preserved}{USER_CUSTOM_END}");
    new_content.replacen(&empty_section, &preserved_section, 1)
}

/// Text found between each pair of custom-section markers, skipping blank ones.
#[must_use]
pub fn extract_user_custom_sections(content: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut remaining = content;

    while let Some(start) = remaining.find(USER_CUSTOM_START) {
        let after_start = &remaining[start + USER_CUSTOM_START.len()..];
        let Some(end) = after_start.find(USER_CUSTOM_END) else {
            break;
        };
        let section = &after_start[..end];
        if !section.trim().is_empty() {
            sections.push(section.to_string());
        }
        remaining = &after_start[end + USER_CUSTOM_END.len()..];
    }

    sections
}
