//! Workout profiles and the built-in template catalogue.
//!
//! A [`WorkoutProfile`] is an immutable value handed to the timer core by
//! whatever authored it (a config file, the shell, a template). The core only
//! reads the repetition count and the durations; everything else is metadata.

use crate::common::Seconds;
use crate::error::ProfileError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hang or rest durations: one value for every rep, or one value per rep.
///
/// Deserializes from either `10` or `[10, 20, 30]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Durations {
    Uniform(Seconds),
    PerRep(Vec<Seconds>),
}

impl Durations {
    /// Duration for a 1-based rep.
    ///
    /// A per-rep list that is too short falls back to its first element.
    pub fn for_rep(&self, rep: u32) -> Seconds {
        match self {
            Durations::Uniform(secs) => *secs,
            Durations::PerRep(list) => rep
                .checked_sub(1)
                .and_then(|index| list.get(index as usize))
                .or_else(|| list.first())
                .copied()
                .unwrap_or(0),
        }
    }

    /// The value shown when a single representative duration is needed.
    pub fn first(&self) -> Seconds {
        self.for_rep(1)
    }

    fn validate(&self, field: &'static str) -> Result<(), ProfileError> {
        match self {
            Durations::Uniform(0) => Err(ProfileError::NonPositiveDuration { field }),
            Durations::Uniform(_) => Ok(()),
            Durations::PerRep(list) if list.is_empty() => {
                Err(ProfileError::EmptyDurations { field })
            }
            Durations::PerRep(list) if list.contains(&0) => {
                Err(ProfileError::NonPositiveDuration { field })
            }
            Durations::PerRep(_) => Ok(()),
        }
    }
}

impl From<Seconds> for Durations {
    fn from(secs: Seconds) -> Self {
        Durations::Uniform(secs)
    }
}

impl From<Vec<Seconds>> for Durations {
    fn from(list: Vec<Seconds>) -> Self {
        Durations::PerRep(list)
    }
}

/// Difficulty level, used for filtering and display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    #[default]
    Custom,
}

/// Configuration for a single workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutProfile {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Number of hang/rest sets.
    pub repetitions: u32,
    pub hang_times: Durations,
    pub pause_times: Durations,
    /// Preparation time before the first hang.
    pub start_pause: Seconds,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkoutProfile {
    /// Creates a custom profile.
    pub fn new(
        name: impl Into<String>,
        repetitions: u32,
        hang_times: impl Into<Durations>,
        pause_times: impl Into<Durations>,
        start_pause: Seconds,
    ) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: format!("custom-{}-{}", slug(&name), now.timestamp_millis()),
            name,
            description: None,
            repetitions,
            hang_times: hang_times.into(),
            pause_times: pause_times.into(),
            start_pause,
            difficulty: Difficulty::Custom,
            is_template: false,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Checks the invariants the timer core relies on.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.repetitions == 0 {
            return Err(ProfileError::NoRepetitions);
        }
        if self.start_pause == 0 {
            return Err(ProfileError::NonPositiveDuration {
                field: "start_pause",
            });
        }
        self.hang_times.validate("hang_times")?;
        self.pause_times.validate("pause_times")?;
        Ok(())
    }

    /// Planned length of the whole workout in seconds.
    ///
    /// Counts one rest per rep, the same way the template catalogue estimates it.
    pub fn estimated_total_seconds(&self) -> u64 {
        let sets: u64 = (1..=self.repetitions)
            .map(|rep| u64::from(self.hang_times.for_rep(rep)) + u64::from(self.pause_times.for_rep(rep)))
            .sum();
        u64::from(self.start_pause) + sets
    }
}

/// A built-in workout template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub difficulty: Difficulty,
    pub repetitions: u32,
    pub hang: Seconds,
    pub rest: Seconds,
    pub start_pause: Seconds,
}

pub const TEMPLATES: [Template; 3] = [
    Template {
        id: "beginner",
        name: "Beginner",
        description: "3 short hangs with equal rest, a gentle way in",
        difficulty: Difficulty::Beginner,
        repetitions: 3,
        hang: 5,
        rest: 5,
        start_pause: 5,
    },
    Template {
        id: "intermediate",
        name: "Intermediate",
        description: "5 x 45 s hang, 45 s rest, for regular climbers",
        difficulty: Difficulty::Intermediate,
        repetitions: 5,
        hang: 45,
        rest: 45,
        start_pause: 10,
    },
    Template {
        id: "advanced",
        name: "Advanced",
        description: "5 x 60 s hang, 60 s rest, for experienced athletes",
        difficulty: Difficulty::Advanced,
        repetitions: 5,
        hang: 60,
        rest: 60,
        start_pause: 10,
    },
];

/// Looks a template up by id or name, ignoring case.
pub fn find_template(key: &str) -> Option<&'static Template> {
    TEMPLATES
        .iter()
        .find(|t| t.id.eq_ignore_ascii_case(key) || t.name.eq_ignore_ascii_case(key))
}

/// Creates a fresh, editable profile from a template.
pub fn profile_from_template(template: &Template) -> WorkoutProfile {
    let now = Utc::now();
    WorkoutProfile {
        id: format!("template-{}-{}", template.id, now.timestamp_millis()),
        name: template.name.to_string(),
        description: Some(template.description.to_string()),
        repetitions: template.repetitions,
        hang_times: Durations::Uniform(template.hang),
        pause_times: Durations::Uniform(template.rest),
        start_pause: template.start_pause,
        difficulty: template.difficulty,
        is_template: false,
        created_at: Some(now),
        updated_at: Some(now),
    }
}

fn slug(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_rep_durations_fall_back_to_first_element() {
        let hang = Durations::PerRep(vec![10, 20]);
        assert_eq!(hang.for_rep(1), 10);
        assert_eq!(hang.for_rep(2), 20);
        assert_eq!(hang.for_rep(5), 10);
        assert_eq!(hang.for_rep(0), 10);
        assert_eq!(Durations::Uniform(7).for_rep(42), 7);
    }

    #[test]
    fn validate_rejects_zero_reps_and_zero_durations() {
        let mut profile = WorkoutProfile::new("test", 2, 10, 5, 3);
        assert_eq!(profile.validate(), Ok(()));

        profile.repetitions = 0;
        assert_eq!(profile.validate(), Err(ProfileError::NoRepetitions));

        profile.repetitions = 2;
        profile.hang_times = Durations::PerRep(vec![10, 0]);
        assert_eq!(
            profile.validate(),
            Err(ProfileError::NonPositiveDuration { field: "hang_times" })
        );

        profile.hang_times = Durations::PerRep(vec![]);
        assert_eq!(
            profile.validate(),
            Err(ProfileError::EmptyDurations { field: "hang_times" })
        );

        profile.hang_times = Durations::Uniform(10);
        profile.start_pause = 0;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn estimated_total_counts_prep_and_every_set() {
        let profile = WorkoutProfile::new("test", 2, vec![10, 20], 5, 3);
        assert_eq!(profile.estimated_total_seconds(), 3 + (10 + 5) + (20 + 5));
    }

    #[test]
    fn templates_produce_valid_non_template_profiles() {
        for template in TEMPLATES.iter() {
            let profile = profile_from_template(template);
            assert_eq!(profile.validate(), Ok(()));
            assert!(!profile.is_template);
            assert!(profile.id.starts_with("template-"));
        }
        assert_eq!(find_template("ADVANCED").map(|t| t.hang), Some(60));
        assert!(find_template("nonexistent").is_none());
    }

    #[test]
    fn custom_profile_ids_are_slugged() {
        let profile = WorkoutProfile::new("Morning Hangs", 1, 10, 10, 5);
        assert!(profile.id.starts_with("custom-morning-hangs-"));
        assert_eq!(profile.difficulty, Difficulty::Custom);
    }
}
