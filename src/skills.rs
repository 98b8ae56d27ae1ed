//! Skill-gap scoring. Everything here is pure and recomputed on each call.

use serde::Serialize;

use crate::error::{AppError, AppResult};

/// How many missing skills the learning path recommends.
pub const LEARNING_PATH_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequiredSkill {
    pub name: String,
    pub weight: u8, // importance, 0-100
    pub has: bool,
}

impl RequiredSkill {
    pub fn new(name: &str, weight: u8) -> Self {
        Self {
            name: name.to_string(),
            weight: weight.min(100),
            has: false,
        }
    }
}

/// Reference requirements used for every target role.
///
/// The list is fixed; the target role is a label and does not select it.
pub fn reference_skills() -> Vec<RequiredSkill> {
    [
        ("JavaScript", 100),
        ("TypeScript", 90),
        ("React", 100),
        ("Node.js", 80),
        ("PostgreSQL", 70),
        ("Docker", 60),
        ("AWS", 65),
        ("CSS", 100),
    ]
    .into_iter()
    .map(|(name, weight)| RequiredSkill::new(name, weight))
    .collect()
}

/// The user's own skills: insertion-ordered, no duplicates, no blanks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SkillSet(Vec<String>);

impl SkillSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, skill: &str) -> AppResult<bool> {
        let skill = skill.trim();
        if skill.is_empty() {
            return Err(AppError::validation("skill name cannot be empty"));
        }
        if self.contains(skill) {
            return Ok(false);
        }
        self.0.push(skill.to_string());
        Ok(true)
    }

    pub fn remove(&mut self, skill: &str) -> AppResult<bool> {
        let skill = skill.trim();
        if skill.is_empty() {
            return Err(AppError::validation("skill name cannot be empty"));
        }
        let before = self.0.len();
        self.0.retain(|s| s != skill);
        Ok(self.0.len() != before)
    }

    pub fn contains(&self, skill: &str) -> bool {
        self.0.iter().any(|s| s == skill)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for SkillSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = SkillSet::new();
        for skill in iter {
            // blanks are skipped
            let _ = set.add(skill);
        }
        set
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillMatch {
    pub percentage: u32,
    pub missing: Vec<RequiredSkill>,
}

/// Match percentage is the share of the requirement count covered by the
/// size of the user's skill set, capped at 100. Importance weights only order
/// the learning path.
pub fn compute_match(current: &SkillSet, required: &[RequiredSkill]) -> SkillMatch {
    let percentage = if required.is_empty() {
        100
    } else {
        let raw = (current.len() as f64 / required.len() as f64 * 100.0).round();
        raw.min(100.0) as u32
    };

    let mut missing: Vec<RequiredSkill> = required
        .iter()
        .filter(|skill| !current.contains(&skill.name))
        .cloned()
        .collect();
    // stable: equal weights keep reference order
    missing.sort_by(|a, b| b.weight.cmp(&a.weight));
    missing.truncate(LEARNING_PATH_LEN);

    SkillMatch { percentage, missing }
}

/// Coverage of the requirement list weighted by importance, 0-100.
pub fn weighted_percentage(current: &SkillSet, required: &[RequiredSkill]) -> u32 {
    let total: u32 = required.iter().map(|s| s.weight as u32).sum();
    if total == 0 {
        return 100;
    }
    let covered: u32 = required
        .iter()
        .filter(|s| current.contains(&s.name))
        .map(|s| s.weight as u32)
        .sum();
    (covered as f64 / total as f64 * 100.0).round() as u32
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillGapReport {
    pub target_role: String,
    pub current_count: usize,
    pub required_count: usize,
    pub required: Vec<RequiredSkill>,
    #[serde(flatten)]
    pub result: SkillMatch,
    pub weighted_percentage: u32,
}

pub fn assess(current: &SkillSet, target_role: &str, required: &[RequiredSkill]) -> SkillGapReport {
    let required_marked: Vec<RequiredSkill> = required
        .iter()
        .map(|skill| RequiredSkill {
            has: current.contains(&skill.name),
            ..skill.clone()
        })
        .collect();

    let result = compute_match(current, &required_marked);
    tracing::debug!(
        role = target_role,
        percentage = result.percentage,
        missing = result.missing.len(),
        "skill gap assessed"
    );

    SkillGapReport {
        target_role: target_role.trim().to_string(),
        current_count: current.len(),
        required_count: required_marked.len(),
        weighted_percentage: weighted_percentage(current, &required_marked),
        required: required_marked,
        result,
    }
}
