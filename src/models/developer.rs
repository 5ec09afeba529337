use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Developer {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Skill tags, in the order they were supplied.
    pub skills: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeveloper {
    #[validate(length(min = 1, max = 100, message = "Developer name is required"))]
    pub name: String,
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,
    #[serde(default)]
    pub skills: Vec<String>,
}

impl CreateDeveloper {
    /// Trims every field and lowercases the email before validation.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.skills = self
            .skills
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }
}

pub type UpdateDeveloper = CreateDeveloper;

#[derive(Debug, Clone)]
pub struct NewDeveloper {
    pub name: String,
    pub email: String,
    pub skills: Vec<String>,
}

impl From<CreateDeveloper> for NewDeveloper {
    fn from(req: CreateDeveloper) -> Self {
        Self {
            name: req.name,
            email: req.email,
            skills: req.skills,
        }
    }
}
