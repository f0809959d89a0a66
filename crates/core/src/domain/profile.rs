use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("birth date `{0}` is not a valid calendar date")]
    InvalidBirthDate(String),
    #[error("birth date {birth_date} is after {today}")]
    BirthDateInFuture { birth_date: NaiveDate, today: NaiveDate },
}

/// Traveller facts supplied by the client with every chat request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub gender: String,
    pub birth_date: NaiveDate,
    pub interests: Vec<String>,
}

impl UserProfile {
    pub fn new(
        name: impl Into<String>,
        gender: impl Into<String>,
        birth_date: NaiveDate,
        interests: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            name: name.into(),
            gender: gender.into(),
            birth_date,
            interests: normalize_interests(interests),
        }
    }

    pub fn context_on(&self, today: NaiveDate) -> Result<ProfileContext, ProfileError> {
        Ok(ProfileContext {
            age: age_on(self.birth_date, today)?,
            gender: self.gender.trim().to_string(),
            interests: self.interests.clone(),
        })
    }
}

/// The slice of a profile that personalizes the system instructions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProfileContext {
    pub age: u32,
    pub gender: String,
    pub interests: Vec<String>,
}

impl ProfileContext {
    pub fn interest_list(&self) -> String {
        if self.interests.is_empty() {
            "no particular interests".to_string()
        } else {
            self.interests.join(", ")
        }
    }
}

/// Whole years elapsed between `birth_date` and `today`.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> Result<u32, ProfileError> {
    if birth_date > today {
        return Err(ProfileError::BirthDateInFuture { birth_date, today });
    }

    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }

    Ok(age.max(0) as u32)
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp, keeping only the date.
pub fn parse_birth_date(raw: &str) -> Result<NaiveDate, ProfileError> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|timestamp| timestamp.date_naive())
        .map_err(|_| ProfileError::InvalidBirthDate(raw.to_string()))
}

fn normalize_interests(interests: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for interest in interests {
        let trimmed = interest.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !normalized.iter().any(|existing| existing.eq_ignore_ascii_case(trimmed)) {
            normalized.push(trimmed.to_string());
        }
    }
    normalized
}
