use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classroom {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub invite_code: String,
    pub is_active: bool,
    pub max_members: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassroomMembership {
    pub id: Uuid,
    pub classroom_id: Uuid,
    pub student_id: Uuid,
    pub joined_at: DateTime<Utc>,
    pub is_active: bool,
}
