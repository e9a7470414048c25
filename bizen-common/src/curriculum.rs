//! Course structure: modules, sections, pages and quiz placement
//!
//! This is the only place that knows how many pages a section has and which
//! pages end in a quiz. Every progression decision (quiz submit, section
//! completion, backfill) reads its totals from a [`Curriculum`].
//!
//! The compiled-in table lives in `curriculum.toml` at the crate root and can
//! be replaced at startup with a file named by `curriculum_path`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const BUILTIN_CURRICULUM: &str = include_str!("../curriculum.toml");

/// One section of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub id: u32,
    pub title: String,
    /// Total number of content pages (1-based page ids)
    pub pages: u32,
    /// Pages that carry a quiz; one attempt per page counts toward completion
    #[serde(default)]
    pub quiz_pages: Vec<u32>,
}

impl SectionSpec {
    /// Number of quiz attempts required to complete the section
    pub fn quizzes_total(&self) -> u32 {
        self.quiz_pages.len() as u32
    }

    pub fn is_quiz_page(&self, page: u32) -> bool {
        self.quiz_pages.contains(&page)
    }

    pub fn has_page(&self, page: u32) -> bool {
        (1..=self.pages).contains(&page)
    }
}

/// One module of the course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub id: u32,
    pub title: String,
    pub sections: Vec<SectionSpec>,
}

impl ModuleSpec {
    pub fn section_count(&self) -> u32 {
        self.sections.len() as u32
    }

    pub fn section(&self, section_id: u32) -> Option<&SectionSpec> {
        self.sections.iter().find(|s| s.id == section_id)
    }
}

/// Full course structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Curriculum {
    pub modules: Vec<ModuleSpec>,
}

impl Curriculum {
    /// Compiled-in course structure
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CURRICULUM)
    }

    /// Load a curriculum override from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate a curriculum from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let curriculum: Curriculum = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid curriculum: {}", e)))?;
        curriculum.validate()?;
        Ok(curriculum)
    }

    /// Check id contiguity and quiz page bounds
    pub fn validate(&self) -> Result<()> {
        if self.modules.is_empty() {
            return Err(Error::Config("Curriculum has no modules".to_string()));
        }

        for (module_idx, module) in self.modules.iter().enumerate() {
            let expected_module = module_idx as u32 + 1;
            if module.id != expected_module {
                return Err(Error::Config(format!(
                    "Module ids must be contiguous from 1: expected {}, found {}",
                    expected_module, module.id
                )));
            }
            if module.sections.is_empty() {
                return Err(Error::Config(format!("Module {} has no sections", module.id)));
            }

            for (section_idx, section) in module.sections.iter().enumerate() {
                let expected_section = section_idx as u32 + 1;
                if section.id != expected_section {
                    return Err(Error::Config(format!(
                        "Module {}: section ids must be contiguous from 1: expected {}, found {}",
                        module.id, expected_section, section.id
                    )));
                }
                if section.pages == 0 {
                    return Err(Error::Config(format!(
                        "Module {} section {} has no pages",
                        module.id, section.id
                    )));
                }

                let mut seen = HashSet::new();
                for &page in &section.quiz_pages {
                    if !section.has_page(page) {
                        return Err(Error::Config(format!(
                            "Module {} section {}: quiz page {} outside 1..={}",
                            module.id, section.id, page, section.pages
                        )));
                    }
                    if !seen.insert(page) {
                        return Err(Error::Config(format!(
                            "Module {} section {}: quiz page {} listed twice",
                            module.id, section.id, page
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn module(&self, module_id: u32) -> Option<&ModuleSpec> {
        self.modules.iter().find(|m| m.id == module_id)
    }

    pub fn section(&self, module_id: u32, section_id: u32) -> Option<&SectionSpec> {
        self.module(module_id).and_then(|m| m.section(section_id))
    }

    /// Number of sections in a module (0 for unknown modules)
    pub fn section_count(&self, module_id: u32) -> u32 {
        self.module(module_id).map(|m| m.section_count()).unwrap_or(0)
    }

    /// Expected quiz count for a section (0 for unknown sections)
    pub fn quizzes_total(&self, module_id: u32, section_id: u32) -> u32 {
        self.section(module_id, section_id)
            .map(|s| s.quizzes_total())
            .unwrap_or(0)
    }

    pub fn is_quiz_page(&self, module_id: u32, section_id: u32, page: u32) -> bool {
        self.section(module_id, section_id)
            .map(|s| s.is_quiz_page(page))
            .unwrap_or(false)
    }

    /// Resolve a module/section pair or fail with `NotFound`
    pub fn require_section(&self, module_id: u32, section_id: u32) -> Result<(&ModuleSpec, &SectionSpec)> {
        let module = self
            .module(module_id)
            .ok_or_else(|| Error::NotFound(format!("Module {}", module_id)))?;
        let section = module.section(section_id).ok_or_else(|| {
            Error::NotFound(format!("Module {} section {}", module_id, section_id))
        })?;
        Ok((module, section))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_curriculum_is_valid() {
        let curriculum = Curriculum::builtin().unwrap();
        assert_eq!(curriculum.modules.len(), 5);
        assert_eq!(curriculum.section_count(3), 4);
    }

    #[test]
    fn test_module3_section1_has_single_quiz() {
        let curriculum = Curriculum::builtin().unwrap();
        assert_eq!(curriculum.quizzes_total(3, 1), 1);
    }

    #[test]
    fn test_unknown_lookups_are_empty() {
        let curriculum = Curriculum::builtin().unwrap();
        assert_eq!(curriculum.section_count(42), 0);
        assert_eq!(curriculum.quizzes_total(1, 42), 0);
        assert!(!curriculum.is_quiz_page(1, 1, 1));
        assert!(curriculum.is_quiz_page(1, 1, 4));
    }

    #[test]
    fn test_require_section_not_found() {
        let curriculum = Curriculum::builtin().unwrap();
        assert!(matches!(curriculum.require_section(9, 1), Err(Error::NotFound(_))));
        assert!(matches!(curriculum.require_section(1, 9), Err(Error::NotFound(_))));
        assert!(curriculum.require_section(1, 2).is_ok());
    }

    #[test]
    fn test_rejects_non_contiguous_sections() {
        let toml = r#"
            [[modules]]
            id = 1
            title = "M"
              [[modules.sections]]
              id = 2
              title = "S"
              pages = 1
        "#;
        let err = Curriculum::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("contiguous"));
    }

    #[test]
    fn test_rejects_quiz_page_out_of_range() {
        let toml = r#"
            [[modules]]
            id = 1
            title = "M"
              [[modules.sections]]
              id = 1
              title = "S"
              pages = 2
              quiz_pages = [3]
        "#;
        let err = Curriculum::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn test_rejects_duplicate_quiz_page() {
        let toml = r#"
            [[modules]]
            id = 1
            title = "M"
              [[modules.sections]]
              id = 1
              title = "S"
              pages = 2
              quiz_pages = [2, 2]
        "#;
        let err = Curriculum::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn test_section_without_quizzes() {
        let curriculum = Curriculum::builtin().unwrap();
        let section = curriculum.section(5, 4).unwrap();
        assert_eq!(section.quizzes_total(), 0);
        assert!(section.has_page(2));
        assert!(!section.has_page(3));
    }
}
