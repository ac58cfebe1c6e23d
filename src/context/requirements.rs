//! Requirement extraction and project-shape detection from free text.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum number of requirement bullets kept.
pub const MAX_REQUIREMENTS: usize = 20;

/// Broad kind of project described by the requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    WebApp,
    Api,
    FullStack,
    Cli,
    Library,
    Mobile,
    #[default]
    Unknown,
}

impl ProjectType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebApp => "web_app",
            Self::Api => "api",
            Self::FullStack => "full_stack",
            Self::Cli => "cli",
            Self::Library => "library",
            Self::Mobile => "mobile",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Framework keywords: (framework name, pattern), most specific first.
pub(crate) const FRAMEWORKS: &[(&str, &str)] = &[
    ("react", r"(?i)\breact\b"),
    ("next.js", r"(?i)\bnext\.?js\b"),
    ("vue", r"(?i)\bvue(\.js)?\b"),
    ("angular", r"(?i)\bangular\b"),
    ("svelte", r"(?i)\bsvelte(kit)?\b"),
    ("express", r"(?i)\bexpress(\.js)?\b"),
    ("fastapi", r"(?i)\bfastapi\b"),
    ("django", r"(?i)\bdjango\b"),
    ("flask", r"(?i)\bflask\b"),
    ("tailwind", r"(?i)\btailwind(css)?\b"),
    ("typescript", r"(?i)\btypescript\b"),
    ("node", r"(?i)\bnode(\.js|js)?\b"),
];

/// Project-type keywords, checked in this order.
const PROJECT_TYPES: &[(ProjectType, &str)] = &[
    (
        ProjectType::WebApp,
        r"(?i)\b(frontend|front-end|website|web app|web application|landing page|dashboard|ui)\b",
    ),
    (
        ProjectType::Api,
        r"(?i)\b(api|backend|back-end|server|endpoint|rest|graphql|microservice)\b",
    ),
    (
        ProjectType::Cli,
        r"(?i)\b(cli|command line|command-line|terminal tool)\b",
    ),
    (ProjectType::Library, r"(?i)\b(library|sdk|package|crate)\b"),
    (ProjectType::Mobile, r"(?i)\b(mobile|ios|android|react native)\b"),
];

/// Frameworks that imply a web front end.
const FRONTEND_FRAMEWORKS: &[&str] = &["react", "next.js", "vue", "angular", "svelte"];

/// Line matchers. A pattern that fails to compile matches nothing.
struct Matchers {
    numbered: Option<Regex>,
    bullet: Option<Regex>,
    modal: Option<Regex>,
    frameworks: Vec<(&'static str, Regex)>,
    project_types: Vec<(ProjectType, Regex)>,
}

/// End of the list marker (`1.`, `-`, `* [ ]`) at the start of `line`.
fn marker_end(m: &Matchers, line: &str) -> Option<usize> {
    [&m.numbered, &m.bullet]
        .into_iter()
        .flatten()
        .find_map(|re| re.find(line))
        .map(|found| found.end())
}

fn matchers() -> &'static Matchers {
    static MATCHERS: OnceLock<Matchers> = OnceLock::new();
    MATCHERS.get_or_init(|| Matchers {
        numbered: Regex::new(r"^\d+[.)]\s+").ok(),
        bullet: Regex::new(r"^[-*+•]\s+(\[[ xX]\]\s+)?").ok(),
        modal: Regex::new(r"(?i)\b(must|should)\b").ok(),
        frameworks: FRAMEWORKS
            .iter()
            .filter_map(|(name, p)| Regex::new(p).ok().map(|re| (*name, re)))
            .collect(),
        project_types: PROJECT_TYPES
            .iter()
            .filter_map(|(kind, p)| Regex::new(p).ok().map(|re| (*kind, re)))
            .collect(),
    })
}

/// Extract requirement statements from a requirements document.
///
/// A line counts when it starts with a numbering or bullet marker, or when
/// it contains "must" or "should". Markers are stripped; at most
/// [`MAX_REQUIREMENTS`] are kept.
#[must_use]
pub fn extract_requirements(text: &str) -> Vec<String> {
    let m = matchers();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let stripped = if let Some(end) = marker_end(m, line) {
                &line[end..]
            } else if m.modal.as_ref().is_some_and(|re| re.is_match(line)) {
                line
            } else {
                return None;
            };
            let stripped = stripped.trim();
            (!stripped.is_empty()).then(|| stripped.to_string())
        })
        .take(MAX_REQUIREMENTS)
        .collect()
}

/// Detect frameworks mentioned in any of the given texts.
#[must_use]
pub fn detect_frameworks(texts: &[&str]) -> BTreeSet<String> {
    matchers()
        .frameworks
        .iter()
        .filter(|(_, re)| texts.iter().any(|t| re.is_match(t)))
        .map(|(name, _)| (*name).to_string())
        .collect()
}

/// Classify the project type from the given texts and detected frameworks.
#[must_use]
pub fn detect_project_type(texts: &[&str], frameworks: &BTreeSet<String>) -> ProjectType {
    let hits: Vec<ProjectType> = matchers()
        .project_types
        .iter()
        .filter(|(_, re)| texts.iter().any(|t| re.is_match(t)))
        .map(|(kind, _)| *kind)
        .collect();

    let frontend = hits.contains(&ProjectType::WebApp)
        || FRONTEND_FRAMEWORKS.iter().any(|f| frameworks.contains(*f));
    let backend = hits.contains(&ProjectType::Api);

    match (frontend, backend) {
        (true, true) => ProjectType::FullStack,
        (true, false) if !hits.contains(&ProjectType::Mobile) => ProjectType::WebApp,
        (false, true) => ProjectType::Api,
        _ => hits.first().copied().unwrap_or_default(),
    }
}

/// First descriptive sentence of a requirements document.
#[must_use]
pub fn extract_overview(text: &str) -> Option<String> {
    let m = matchers();
    let mut heading = None;
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with('#') {
            if heading.is_none() {
                heading = Some(line.trim_start_matches('#').trim().to_string());
            }
            continue;
        }
        if marker_end(m, line).is_some() {
            continue;
        }
        return Some(line.chars().take(500).collect());
    }
    heading.filter(|h| !h.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRD: &str = "# Todo App\n\
        A small todo application built with React.\n\
        \n\
        ## Requirements\n\
        1. Users can add todos\n\
        2) Users can delete todos\n\
        - Todos persist in local storage\n\
        * [ ] Dark mode toggle\n\
        The UI must be responsive.\n\
        Nothing special here.\n";

    #[test]
    fn test_extract_requirements() {
        let reqs = extract_requirements(PRD);
        assert_eq!(
            reqs,
            vec![
                "Users can add todos",
                "Users can delete todos",
                "Todos persist in local storage",
                "Dark mode toggle",
                "The UI must be responsive.",
            ]
        );
    }

    #[test]
    fn test_extract_requirements_caps_at_twenty() {
        let text: String = (1..=30).map(|i| format!("{i}. item {i}\n")).collect();
        let reqs = extract_requirements(&text);
        assert_eq!(reqs.len(), MAX_REQUIREMENTS);
        assert_eq!(reqs[0], "item 1");
        assert_eq!(reqs[19], "item 20");
    }

    #[test]
    fn test_extract_requirements_empty() {
        assert!(extract_requirements("").is_empty());
        assert!(extract_requirements("just prose\nmore prose").is_empty());
    }

    #[test]
    fn test_detect_frameworks() {
        let frameworks = detect_frameworks(&[PRD, "Use Tailwind for styling"]);
        assert!(frameworks.contains("react"));
        assert!(frameworks.contains("tailwind"));
        assert!(!frameworks.contains("vue"));
    }

    #[test]
    fn test_detect_project_type() {
        let none = BTreeSet::new();
        assert_eq!(
            detect_project_type(&["Build a REST api backend"], &none),
            ProjectType::Api
        );
        assert_eq!(
            detect_project_type(&["A marketing website"], &none),
            ProjectType::WebApp
        );
        assert_eq!(
            detect_project_type(&["React dashboard with an api backend"], &none),
            ProjectType::FullStack
        );
        assert_eq!(
            detect_project_type(&["A command-line tool"], &none),
            ProjectType::Cli
        );
        assert_eq!(detect_project_type(&["hello"], &none), ProjectType::Unknown);

        let react: BTreeSet<String> = ["react".to_string()].into_iter().collect();
        assert_eq!(detect_project_type(&["todos"], &react), ProjectType::WebApp);
    }

    #[test]
    fn test_extract_overview() {
        assert_eq!(
            extract_overview(PRD).as_deref(),
            Some("A small todo application built with React.")
        );
        assert_eq!(
            extract_overview("# Only a title\n- bullet").as_deref(),
            Some("Only a title")
        );
        assert_eq!(extract_overview(""), None);
    }
}
