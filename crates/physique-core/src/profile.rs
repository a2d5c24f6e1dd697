use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const HEIGHT_RANGE: (u16, u16) = (100, 250);
pub const WEIGHT_RANGE: (u16, u16) = (30, 200);
pub const AGE_RANGE: (u16, u16) = (16, 100);

pub const DEFAULT_HEIGHT_CM: u16 = 170;
pub const DEFAULT_WEIGHT_KG: u16 = 70;
pub const DEFAULT_AGE: u16 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Goal {
    #[default]
    BuildMuscle,
    LoseFat,
    GetToned,
    Maintain,
}

impl Goal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Goal::BuildMuscle => "build-muscle",
            Goal::LoseFat => "lose-fat",
            Goal::GetToned => "get-toned",
            Goal::Maintain => "maintain",
        }
    }

    /// Accepts either the kebab-case id or the display label.
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '_'], "-");
        match normalized.as_str() {
            "build-muscle" => Some(Goal::BuildMuscle),
            "lose-fat" => Some(Goal::LoseFat),
            "get-toned" => Some(Goal::GetToned),
            "maintain" => Some(Goal::Maintain),
            _ => None,
        }
    }

    pub fn all() -> Vec<Goal> {
        vec![Goal::BuildMuscle, Goal::LoseFat, Goal::GetToned, Goal::Maintain]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Goal::BuildMuscle => "Build Muscle",
            Goal::LoseFat => "Lose Fat",
            Goal::GetToned => "Get Toned",
            Goal::Maintain => "Maintain",
        }
    }

    pub fn next(&self) -> Goal {
        match self {
            Goal::BuildMuscle => Goal::LoseFat,
            Goal::LoseFat => Goal::GetToned,
            Goal::GetToned => Goal::Maintain,
            Goal::Maintain => Goal::BuildMuscle,
        }
    }

    pub fn prev(&self) -> Goal {
        match self {
            Goal::BuildMuscle => Goal::Maintain,
            Goal::LoseFat => Goal::BuildMuscle,
            Goal::GetToned => Goal::LoseFat,
            Goal::Maintain => Goal::GetToned,
        }
    }
}

/// A fully validated profile. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    goal: Goal,
    height_cm: u16,
    weight_kg: u16,
    age: u16,
}

impl UserProfile {
    pub fn new(goal: Goal, height_cm: u16, weight_kg: u16, age: u16) -> Result<Self, ValidationError> {
        check_range("height", height_cm, HEIGHT_RANGE)?;
        check_range("weight", weight_kg, WEIGHT_RANGE)?;
        check_range("age", age, AGE_RANGE)?;
        Ok(Self {
            goal,
            height_cm,
            weight_kg,
            age,
        })
    }

    pub fn goal(&self) -> Goal {
        self.goal
    }

    pub fn height_cm(&self) -> u16 {
        self.height_cm
    }

    pub fn weight_kg(&self) -> u16 {
        self.weight_kg
    }

    pub fn age(&self) -> u16 {
        self.age
    }
}

fn check_range(field: &'static str, value: u16, (min, max): (u16, u16)) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange { field, min, max, value });
    }
    Ok(())
}

/// In-progress form values. Numeric fields are optional until the user fills them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDraft {
    pub goal: Goal,
    pub height_cm: Option<u16>,
    pub weight_kg: Option<u16>,
    pub age: Option<u16>,
}

impl Default for ProfileDraft {
    fn default() -> Self {
        Self {
            goal: Goal::default(),
            height_cm: Some(DEFAULT_HEIGHT_CM),
            weight_kg: Some(DEFAULT_WEIGHT_KG),
            age: Some(DEFAULT_AGE),
        }
    }
}

impl ProfileDraft {
    /// An empty draft with only the goal chosen.
    pub fn empty() -> Self {
        Self {
            goal: Goal::default(),
            height_cm: None,
            weight_kg: None,
            age: None,
        }
    }

    pub fn to_profile(&self) -> Result<UserProfile, ValidationError> {
        let height = self.height_cm.ok_or(ValidationError::MissingField("height"))?;
        let weight = self.weight_kg.ok_or(ValidationError::MissingField("weight"))?;
        let age = self.age.ok_or(ValidationError::MissingField("age"))?;
        UserProfile::new(self.goal, height, weight, age)
    }
}

impl TryFrom<&ProfileDraft> for UserProfile {
    type Error = ValidationError;

    fn try_from(draft: &ProfileDraft) -> Result<Self, Self::Error> {
        draft.to_profile()
    }
}
