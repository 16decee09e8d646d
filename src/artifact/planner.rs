//! Step planning: actions + artifact title → ordered, user-facing build steps.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::{Action, Extraction};

/// Shell command substrings that mark a dependency-install invocation.
const INSTALL_PATTERNS: &[&str] = &["npm install", "npm i", "pnpm install", "yarn add"];

/// Classification of a build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    CreateFile,
    UpdateFile,
    DeleteFile,
    InstallPackage,
    RunCommand,
}

/// Display status of a build step.
///
/// The planner only ever assigns the initial status; transitions are applied
/// by the session layer as execution progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// A display/tracking unit derived from one action, or from the artifact
/// wrapper itself. Steps are never deleted, only appended across turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Step {
    /// A marker step carrying no code, e.g. the scaffolding acknowledgement
    /// or the follow-up separator the session inserts between turns.
    pub fn marker(
        title: impl Into<String>,
        description: impl Into<String>,
        status: StepStatus,
    ) -> Self {
        Self::new(title, description, StepType::CreateFile).with_status(status)
    }

    fn new(title: impl Into<String>, description: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            step_type,
            status: StepStatus::Pending,
            code: None,
            error: None,
        }
    }

    fn with_status(mut self, status: StepStatus) -> Self {
        self.status = status;
        self
    }

    fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Plan the ordered step batch for one parse pass.
///
/// The leading step acknowledges the project scaffolding and is born
/// `Completed`. File steps dedupe by path, first occurrence wins — this
/// intentionally differs from the tree builder's last-write-wins policy, since
/// step history and file-content truth serve different purposes.
pub fn plan(extraction: &Extraction) -> Vec<Step> {
    let mut steps = Vec::with_capacity(extraction.actions.len() + 1);

    steps.push(Step::marker(
        extraction.title.clone(),
        "Setting up project structure",
        StepStatus::Completed,
    ));

    let mut seen_paths: HashSet<&str> = HashSet::new();

    for action in &extraction.actions {
        match action {
            Action::File { path, content } => {
                if !seen_paths.insert(path) {
                    continue;
                }
                steps.push(
                    Step::new(
                        format!("Create {}", path),
                        format!("Creating file: {}", path),
                        StepType::CreateFile,
                    )
                    .with_code(content.trim()),
                );
            }
            Action::Shell { command } => {
                let is_install = INSTALL_PATTERNS.iter().any(|p| command.contains(p));
                let step = if is_install {
                    Step::new("Install Dependencies", command.clone(), StepType::InstallPackage)
                } else {
                    Step::new("Run Command", command.clone(), StepType::RunCommand)
                };
                steps.push(step.with_code(command.clone()));
            }
        }
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::extract;

    #[test]
    fn empty_extraction_plans_only_the_scaffolding_step() {
        let extraction = extract("just chatting, no artifact here");
        let steps = plan(&extraction);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].title, "Project Files");
        assert_eq!(steps[0].status, StepStatus::Completed);
        assert_eq!(steps[0].step_type, StepType::CreateFile);
    }

    #[test]
    fn demo_scenario() {
        let response = r#"<boltArtifact title="Demo"><boltAction type="file" filePath="src/App.tsx">hello</boltAction><boltAction type="shell">npm install axios</boltAction></boltArtifact>"#;
        let steps = plan(&extract(response));

        assert_eq!(steps.len(), 3);

        assert_eq!(steps[0].title, "Demo");
        assert_eq!(steps[0].status, StepStatus::Completed);

        assert_eq!(steps[1].title, "Create src/App.tsx");
        assert_eq!(steps[1].step_type, StepType::CreateFile);
        assert_eq!(steps[1].status, StepStatus::Pending);
        assert_eq!(steps[1].code.as_deref(), Some("hello"));

        assert_eq!(steps[2].title, "Install Dependencies");
        assert_eq!(steps[2].step_type, StepType::InstallPackage);
        assert_eq!(steps[2].status, StepStatus::Pending);
        assert_eq!(steps[2].code.as_deref(), Some("npm install axios"));
    }

    #[test]
    fn duplicate_paths_dedupe_first_wins() {
        let response = r#"<boltArtifact title="T"><boltAction type="file" filePath="a.txt">first</boltAction><boltAction type="file" filePath="a.txt">second</boltAction></boltArtifact>"#;
        let steps = plan(&extract(response));

        // Scaffolding step + one file step; the first occurrence wins.
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].code.as_deref(), Some("first"));
    }

    #[test]
    fn step_count_is_one_plus_files_plus_shell() {
        let response = r#"<boltArtifact title="T">
            <boltAction type="file" filePath="a.txt">a</boltAction>
            <boltAction type="file" filePath="b.txt">b</boltAction>
            <boltAction type="file" filePath="a.txt">again</boltAction>
            <boltAction type="shell">npm run dev</boltAction>
        </boltArtifact>"#;
        let steps = plan(&extract(response));

        // 1 + N' + M with N' = 2 (deduped) and M = 1
        assert_eq!(steps.len(), 4);
    }

    #[test]
    fn shell_classification() {
        let response = r#"<boltArtifact title="T"><boltAction type="shell">yarn add react</boltAction><boltAction type="shell">node index.js</boltAction></boltArtifact>"#;
        let steps = plan(&extract(response));

        assert_eq!(steps[1].step_type, StepType::InstallPackage);
        assert_eq!(steps[2].step_type, StepType::RunCommand);
        assert_eq!(steps[2].title, "Run Command");
    }

    #[test]
    fn file_step_code_is_trimmed() {
        let response = "<boltArtifact title=\"T\"><boltAction type=\"file\" filePath=\"a.txt\">\n  body\n</boltAction></boltArtifact>";
        let steps = plan(&extract(response));
        assert_eq!(steps[1].code.as_deref(), Some("body"));
    }
}
