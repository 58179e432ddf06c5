// Classes: création, annuaire, adhésion par code d'invitation

use serde_json::json;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::classroom::{Classroom, ClassroomMembership};
use crate::supabase::SupabaseClient;

const CLASSROOM_TABLE: &str = "classrooms";
const MEMBERSHIP_TABLE: &str = "classroom_memberships";

pub struct ClassroomService;

impl ClassroomService {
    pub async fn create_classroom(
        client: &SupabaseClient,
        teacher_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Classroom, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::Validation("name is required".to_string()));
        }
        Ok(client
            .from(CLASSROOM_TABLE)
            .insert(&json!({
                "teacher_id": teacher_id,
                "name": name,
                "description": description,
            }))
            .await?)
    }

    pub async fn teacher_classrooms(
        client: &SupabaseClient,
        teacher_id: Uuid,
    ) -> Result<Vec<Classroom>, ServiceError> {
        Ok(client
            .from(CLASSROOM_TABLE)
            .eq("teacher_id", teacher_id)
            .eq("is_active", true)
            .order("created_at", false)
            .fetch()
            .await?)
    }

    /// Classes rejointes par un étudiant: adhésions actives, puis les
    /// classes correspondantes.
    pub async fn student_classrooms(
        client: &SupabaseClient,
        student_id: Uuid,
    ) -> Result<Vec<Classroom>, ServiceError> {
        let memberships: Vec<ClassroomMembership> = client
            .from(MEMBERSHIP_TABLE)
            .eq("student_id", student_id)
            .eq("is_active", true)
            .fetch()
            .await?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let classroom_ids: Vec<Uuid> = memberships.iter().map(|m| m.classroom_id).collect();
        Ok(client
            .from(CLASSROOM_TABLE)
            .in_list("id", &classroom_ids)
            .fetch()
            .await?)
    }

    /// Rejoint une classe via son code d'invitation (insensible à la casse).
    pub async fn join_classroom(
        client: &SupabaseClient,
        student_id: Uuid,
        invite_code: &str,
    ) -> Result<ClassroomMembership, ServiceError> {
        // 1. Retrouver la classe
        let classroom: Option<Classroom> = client
            .from(CLASSROOM_TABLE)
            .eq("invite_code", invite_code.to_uppercase())
            .eq("is_active", true)
            .maybe_single()
            .await?;
        let Some(classroom) = classroom else {
            return Err(ServiceError::Validation("Invalid invite code".to_string()));
        };

        // 2. Déjà membre?
        let existing: Option<ClassroomMembership> = client
            .from(MEMBERSHIP_TABLE)
            .eq("classroom_id", classroom.id)
            .eq("student_id", student_id)
            .maybe_single()
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Validation(
                "Already a member of this classroom".to_string(),
            ));
        }

        // 3. Adhésion
        Ok(client
            .from(MEMBERSHIP_TABLE)
            .insert(&json!({
                "classroom_id": classroom.id,
                "student_id": student_id,
            }))
            .await?)
    }

    pub async fn classroom(
        client: &SupabaseClient,
        classroom_id: Uuid,
    ) -> Result<Classroom, ServiceError> {
        Ok(client
            .from(CLASSROOM_TABLE)
            .eq("id", classroom_id)
            .single()
            .await?)
    }

    pub async fn member_count(
        client: &SupabaseClient,
        classroom_id: Uuid,
    ) -> Result<u64, ServiceError> {
        Ok(client
            .from(MEMBERSHIP_TABLE)
            .eq("classroom_id", classroom_id)
            .eq("is_active", true)
            .count()
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supabase::test_client;
    use httpmock::prelude::*;

    fn classroom_row(id: Uuid, teacher_id: Uuid) -> serde_json::Value {
        json!({
            "id": id,
            "teacher_id": teacher_id,
            "name": "Databases 101",
            "invite_code": "ABC123",
            "is_active": true,
            "max_members": 50,
            "created_at": "2026-01-15T08:00:00+00:00"
        })
    }

    fn membership_row(classroom_id: Uuid, student_id: Uuid) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "classroom_id": classroom_id,
            "student_id": student_id,
            "joined_at": "2026-01-16T08:00:00+00:00",
            "is_active": true
        })
    }

    #[tokio::test]
    async fn test_join_with_unknown_code_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/classrooms");
                then.status(200).json_body(json!([]));
            })
            .await;

        let client = test_client(&server.base_url());
        let err = ClassroomService::join_classroom(&client, Uuid::new_v4(), "nope")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid invite code");
    }

    #[tokio::test]
    async fn test_join_normalizes_code_and_rejects_duplicates() {
        let server = MockServer::start_async().await;
        let classroom_id = Uuid::new_v4();
        let student_id = Uuid::new_v4();
        let classroom_get = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/classrooms")
                    .query_param("invite_code", "eq.ABC123");
                then.status(200)
                    .json_body(json!([classroom_row(classroom_id, Uuid::new_v4())]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/classroom_memberships");
                then.status(200)
                    .json_body(json!([membership_row(classroom_id, student_id)]));
            })
            .await;

        let client = test_client(&server.base_url());
        let err = ClassroomService::join_classroom(&client, student_id, "abc123")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Already a member of this classroom");
        assert_eq!(classroom_get.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_join_inserts_membership() {
        let server = MockServer::start_async().await;
        let classroom_id = Uuid::new_v4();
        let student_id = Uuid::new_v4();
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/classrooms");
                then.status(200)
                    .json_body(json!([classroom_row(classroom_id, Uuid::new_v4())]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/classroom_memberships");
                then.status(200).json_body(json!([]));
            })
            .await;
        let insert = server
            .mock_async(|when, then| {
                when.method(POST).path("/rest/v1/classroom_memberships");
                then.status(201)
                    .json_body(json!([membership_row(classroom_id, student_id)]));
            })
            .await;

        let client = test_client(&server.base_url());
        let membership = ClassroomService::join_classroom(&client, student_id, "ABC123")
            .await
            .unwrap();

        assert_eq!(membership.classroom_id, classroom_id);
        assert_eq!(insert.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_student_classrooms_resolves_memberships() {
        let server = MockServer::start_async().await;
        let classroom_id = Uuid::new_v4();
        let student_id = Uuid::new_v4();
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/classroom_memberships")
                    .query_param("student_id", format!("eq.{student_id}"));
                then.status(200)
                    .json_body(json!([membership_row(classroom_id, student_id)]));
            })
            .await;
        let classrooms_get = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/classrooms")
                    .query_param("id", format!("in.({classroom_id})"));
                then.status(200)
                    .json_body(json!([classroom_row(classroom_id, Uuid::new_v4())]));
            })
            .await;

        let client = test_client(&server.base_url());
        let classrooms = ClassroomService::student_classrooms(&client, student_id)
            .await
            .unwrap();

        assert_eq!(classrooms.len(), 1);
        assert_eq!(classrooms[0].id, classroom_id);
        assert_eq!(classrooms_get.hits_async().await, 1);
    }
}
