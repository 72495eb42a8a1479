use serde::{Deserialize, Serialize};

/// Skill areas tracked by `mdl_course_categories.category_type`.
///
/// The stored labels are fixed; anything outside the first six is filed
/// under `Other` by the content team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillCategory {
    Reading,
    Grammar,
    Vocabulary,
    Speaking,
    Listening,
    Writing,
    Other,
}

impl SkillCategory {
    pub const ALL: [SkillCategory; 7] = [
        SkillCategory::Reading,
        SkillCategory::Grammar,
        SkillCategory::Vocabulary,
        SkillCategory::Speaking,
        SkillCategory::Listening,
        SkillCategory::Writing,
        SkillCategory::Other,
    ];

    /// Label as stored in the database and shown by the dashboard
    pub fn label(self) -> &'static str {
        match self {
            SkillCategory::Reading => "閱讀",
            SkillCategory::Grammar => "文法",
            SkillCategory::Vocabulary => "字彙",
            SkillCategory::Speaking => "口說",
            SkillCategory::Listening => "聽力",
            SkillCategory::Writing => "寫作",
            SkillCategory::Other => "其他",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    pub fn labels() -> [&'static str; 7] {
        Self::ALL.map(SkillCategory::label)
    }
}
