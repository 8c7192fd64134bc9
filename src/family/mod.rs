//! Test families: expand project inputs into concrete test cases.
//!
//! Families are compiled in and listed in [`REGISTRY`]; the scheduler only
//! sees the [`TestFamily`] capability set.
mod ges;
pub mod playback;
pub mod render;

pub use ges::{discover_projects, normalize_basename, check_launcher, GesProject, ProjectInput};

use crate::options::RunOptions;
use crate::scenario::ScenarioCatalog;
use crate::test_case::TestCase;
use anyhow::Result;
use std::sync::atomic::AtomicBool;

/// Read-only inputs shared by every family's expansion.
pub struct FamilyContext<'a> {
    pub options: &'a RunOptions,
    pub scenarios: &'a ScenarioCatalog,
    pub inputs: &'a [ProjectInput],
}

pub trait TestFamily {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Whether this family can run on this host. A missing or incapable
    /// executable is `Ok(false)`, not an error; an interrupt is.
    fn init(&mut self, options: &RunOptions, cancel: &AtomicBool) -> Result<bool>;

    /// Produce one test per (input, variant) pair. Called once per run.
    fn expand(&mut self, context: &FamilyContext<'_>) -> Result<()>;

    fn tests(&self) -> &[TestCase];

    /// Hand the produced tests to the scheduler.
    fn take_tests(&mut self) -> Vec<TestCase>;
}

pub type FamilyConstructor = fn() -> Box<dyn TestFamily>;

/// Registered families, in scheduling order.
pub const REGISTRY: &[(&str, FamilyConstructor)] = &[
    (playback::FAMILY_NAME, playback::new_family),
    (render::FAMILY_NAME, render::new_family),
];

/// Split positional targets into selected families and leftover project paths.
///
/// No family named means every registered family, in registry order.
pub fn select(targets: &[String]) -> (Vec<Box<dyn TestFamily>>, Vec<String>) {
    let mut names = Vec::new();
    let mut projects = Vec::new();
    for target in targets {
        if REGISTRY.iter().any(|(name, _)| *name == target.as_str()) {
            if !names.contains(&target.as_str()) {
                names.push(target.as_str());
            }
        } else {
            projects.push(target.clone());
        }
    }
    let families = REGISTRY
        .iter()
        .filter(|(name, _)| names.is_empty() || names.contains(name))
        .map(|(_, constructor)| constructor())
        .collect();
    (families, projects)
}

/// Classname for one (family, variant, input) triple.
pub(crate) fn classname(family: &str, variant: &str, input: &ProjectInput) -> String {
    format!("{family}.{variant}.{}", input.basename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn no_family_named_selects_all() {
        let (families, projects) = select(&strings(&["/tmp/a.xges"]));
        let names: Vec<_> = families.iter().map(|family| family.name()).collect();
        assert_eq!(names, vec!["playback", "render"]);
        assert_eq!(projects, vec!["/tmp/a.xges"]);
    }

    #[test]
    fn named_family_restricts_selection() {
        let (families, projects) = select(&strings(&["render", "render"]));
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].name(), "render");
        assert!(projects.is_empty());
    }
}
