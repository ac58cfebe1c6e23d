//! Project context for supervision decisions.
//!
//! The [`ContextProvider`] reads the requirements document and the
//! project-instruction file, takes a shallow look at the project directory,
//! and exposes the result as a read-only [`ProjectContext`]. Missing files are
//! never errors: they only show up as a weaker [`ContextHealth`].
//!
//! # Example
//!
//! ```rust,ignore
//! use overseer::context::ContextProvider;
//!
//! let mut provider = ContextProvider::new(".");
//! let context = provider.initialize(None);
//! for (name, holds) in provider.condition_report() {
//!     println!("{name}: {holds}");
//! }
//! ```

pub mod conditions;
pub mod instructions;
pub mod requirements;

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{OverseerError, Result};

pub use conditions::{ConditionFn, ConditionRegistry, ALWAYS_REVIEW};
pub use instructions::{extract_user_custom_sections, InstructionGenerator};
pub use requirements::{
    detect_frameworks, detect_project_type, extract_overview, extract_requirements, ProjectType,
};

/// Default requirements document names, in lookup order.
pub const DEFAULT_REQUIREMENTS_FILES: &[&str] =
    &["PRD.md", "prd.md", "requirements.md", "REQUIREMENTS.md"];

/// Default project-instruction file name.
pub const DEFAULT_INSTRUCTIONS_FILE: &str = "CLAUDE.md";

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "e2e"];
const COMPONENT_DIRS: &[&str] = &["components", "src/components"];
const LINT_CONFIGS: &[&str] = &[
    ".eslintrc*",
    "eslint.config.*",
    ".prettierrc*",
    "prettier.config.*",
    "biome.json",
    "rustfmt.toml",
    ".rustfmt.toml",
    "clippy.toml",
    "ruff.toml",
    ".flake8",
    "tslint.json",
];

/// Read-only project knowledge shared with the decision engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub instruction_text: Option<String>,
    pub requirements_text: Option<String>,
    pub overview: Option<String>,
    pub requirements: Vec<String>,
    pub project_type: ProjectType,
    pub frameworks: std::collections::BTreeSet<String>,
    pub has_tests: bool,
    pub has_component_dir: bool,
    pub has_lint_config: bool,
    pub working_directory: PathBuf,
}

impl ProjectContext {
    /// Most specific detected framework.
    #[must_use]
    pub fn primary_framework(&self) -> Option<&'static str> {
        requirements::FRAMEWORKS
            .iter()
            .map(|(name, _)| *name)
            .find(|name| self.frameworks.contains(*name))
    }
}

/// How complete the loaded context is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextHealth {
    pub instruction_file_found: bool,
    pub instruction_file_created: bool,
    pub requirements_found: bool,
    pub requirement_count: usize,
    pub project_type: ProjectType,
    pub frameworks: Vec<String>,
}

/// Loads and holds the [`ProjectContext`] for one project directory.
#[derive(Debug)]
pub struct ContextProvider {
    project_dir: PathBuf,
    requirements_files: Vec<String>,
    instructions_file: String,
    conditions: ConditionRegistry,
    create_instructions: bool,
    context: ProjectContext,
    health: ContextHealth,
}

impl ContextProvider {
    #[must_use]
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
            requirements_files: DEFAULT_REQUIREMENTS_FILES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            instructions_file: DEFAULT_INSTRUCTIONS_FILE.to_string(),
            conditions: ConditionRegistry::builtin(),
            create_instructions: true,
            context: ProjectContext::default(),
            health: ContextHealth::default(),
        }
    }

    /// Requirements document names to try, in order.
    #[must_use]
    pub fn with_requirements_files(mut self, files: Vec<String>) -> Self {
        self.requirements_files = files;
        self
    }

    #[must_use]
    pub fn with_instructions_file(mut self, file: impl Into<String>) -> Self {
        self.instructions_file = file.into();
        self
    }

    #[must_use]
    pub fn with_conditions(mut self, conditions: ConditionRegistry) -> Self {
        self.conditions = conditions;
        self
    }

    /// Never write the instruction file; the generated text is still used
    /// as context.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.create_instructions = false;
        self
    }

    #[must_use]
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    #[must_use]
    pub fn instructions_path(&self) -> PathBuf {
        self.project_dir.join(&self.instructions_file)
    }

    #[must_use]
    pub fn context(&self) -> &ProjectContext {
        &self.context
    }

    #[must_use]
    pub fn health(&self) -> &ContextHealth {
        &self.health
    }

    /// Build the context from `requirements_text`, or from the first
    /// requirements document found on disk when `None`.
    ///
    /// Creates the instruction file when it does not exist yet. A failed
    /// write is logged and leaves `instruction_file_created` false.
    pub fn initialize(&mut self, requirements_text: Option<&str>) -> ProjectContext {
        let requirements_text = match requirements_text {
            Some(text) => Some(text.to_string()),
            None => self.load_requirements(),
        };
        let instruction_path = self.instructions_path();
        let instruction_text = std::fs::read_to_string(&instruction_path).ok();

        let mut context = analyze(
            &self.project_dir,
            requirements_text.as_deref(),
            instruction_text.as_deref(),
        );
        context.requirements_text = requirements_text;
        context.instruction_text = instruction_text;

        let mut health = ContextHealth {
            instruction_file_found: context.instruction_text.is_some(),
            requirements_found: context.requirements_text.is_some(),
            ..ContextHealth::default()
        };

        if context.instruction_text.is_none() {
            let generated = InstructionGenerator::new(&context, &self.project_dir).generate();
            if self.create_instructions {
                match std::fs::write(&instruction_path, &generated) {
                    Ok(()) => {
                        info!("Created {}", instruction_path.display());
                        health.instruction_file_created = true;
                    }
                    Err(e) => warn!(
                        "Could not write {}: {} (continuing without it)",
                        instruction_path.display(),
                        e
                    ),
                }
            }
            context.instruction_text = Some(generated);
        }

        health.requirement_count = context.requirements.len();
        health.project_type = context.project_type;
        health.frameworks = context.frameworks.iter().cloned().collect();

        info!(
            "Context ready: {} requirements, type {}, frameworks [{}]",
            health.requirement_count,
            health.project_type,
            health.frameworks.join(", ")
        );

        self.context = context;
        self.health = health;
        self.context.clone()
    }

    /// Rebuild the context, keeping the requirements text already loaded.
    pub fn refresh(&mut self) -> ProjectContext {
        let text = self.context.requirements_text.clone();
        self.initialize(text.as_deref())
    }

    /// Write (or rewrite) the instruction file, keeping user sections.
    ///
    /// Returns the path written. Fails with `InstructionWrite` when the file
    /// exists and `force` is false, or when the write itself fails.
    pub fn write_instructions(
        &mut self,
        requirements_text: Option<&str>,
        force: bool,
    ) -> Result<PathBuf> {
        let path = self.instructions_path();
        let existing = std::fs::read_to_string(&path).ok();
        if existing.is_some() && !force {
            return Err(OverseerError::InstructionWrite {
                path: path.clone(),
                message: "file already exists (use --force to regenerate)".to_string(),
            });
        }

        let requirements_text = match requirements_text {
            Some(text) => Some(text.to_string()),
            None => self.load_requirements(),
        };
        let context = analyze(&self.project_dir, requirements_text.as_deref(), None);
        let mut generator = InstructionGenerator::new(&context, &self.project_dir);
        if let Some(existing) = existing {
            generator = generator.with_existing_content(existing);
        }

        std::fs::write(&path, generator.generate()).map_err(|e| {
            OverseerError::InstructionWrite {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;
        info!("Wrote {}", path.display());
        Ok(path)
    }

    /// Every registered condition with its result for the current context.
    #[must_use]
    pub fn condition_report(&self) -> Vec<(String, bool)> {
        self.conditions
            .evaluate(&self.conditions.names(), &self.context)
    }

    fn load_requirements(&self) -> Option<String> {
        for name in &self.requirements_files {
            let path = self.project_dir.join(name);
            if let Ok(text) = std::fs::read_to_string(&path) {
                debug!("Loaded requirements from {}", path.display());
                return Some(text);
            }
        }
        debug!("No requirements document found in {}", self.project_dir.display());
        None
    }
}

/// Derive everything except the raw texts.
fn analyze(
    project_dir: &Path,
    requirements_text: Option<&str>,
    instruction_text: Option<&str>,
) -> ProjectContext {
    let texts: Vec<&str> = [requirements_text, instruction_text]
        .into_iter()
        .flatten()
        .collect();
    let frameworks = detect_frameworks(&texts);
    let project_type = detect_project_type(&texts, &frameworks);
    let layout = scan_layout(project_dir);

    ProjectContext {
        overview: requirements_text.and_then(extract_overview),
        requirements: requirements_text.map(extract_requirements).unwrap_or_default(),
        project_type,
        frameworks,
        has_tests: layout.has_tests,
        has_component_dir: layout.has_component_dir,
        has_lint_config: layout.has_lint_config,
        working_directory: project_dir.to_path_buf(),
        ..ProjectContext::default()
    }
}

#[derive(Debug, Default)]
struct Layout {
    has_tests: bool,
    has_component_dir: bool,
    has_lint_config: bool,
}

fn lint_globs() -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in LINT_CONFIGS {
        builder.add(Glob::new(pattern).ok()?);
    }
    builder.build().ok()
}

/// One-level scan of the project root.
fn scan_layout(project_dir: &Path) -> Layout {
    let mut layout = Layout::default();
    let lint = lint_globs();

    for entry in WalkDir::new(project_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let file_name = entry.file_name().to_string_lossy();
        let name: &str = &file_name;
        if entry.file_type().is_dir() {
            if TEST_DIRS.contains(&name) {
                layout.has_tests = true;
            }
            if COMPONENT_DIRS.contains(&name) {
                layout.has_component_dir = true;
            }
        } else if lint.as_ref().is_some_and(|set| set.is_match(name)) {
            layout.has_lint_config = true;
        }
    }

    if !layout.has_component_dir {
        layout.has_component_dir = COMPONENT_DIRS
            .iter()
            .any(|dir| project_dir.join(dir).is_dir());
    }

    layout
}
