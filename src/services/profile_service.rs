// Résolution de rôle, provisionnement et CRUD des profils.
// Deux tables côté backend (une par rôle); l'exclusivité des rôles n'est
// garantie que par l'ordre de consultation, pas par une contrainte.

use chrono::Utc;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::dto::{StudentDraft, StudentProfileUpdate, TeacherDraft, TeacherProfileUpdate};
use crate::models::identity::Identity;
use crate::models::profile::{
    NotificationPreferences, Profile, Role, StudentProfile, TeacherProfile,
};
use crate::supabase::SupabaseClient;

const STUDENT_TABLE: &str = "student_profiles";
const TEACHER_TABLE: &str = "teacher_profiles";

/// Délai avant relecture quand une insertion concurrente a gagné la course.
const PROVISION_RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct ProfileService;

impl ProfileService {
    /// Détermine le rôle d'une identité en sondant les deux tables de
    /// profils. Aucune ligne nulle part est un résultat valide (None), pas
    /// une erreur. La table étudiante a priorité: une identité présente des
    /// deux côtés est une corruption de données, signalée dans les logs
    /// mais résolue en faveur du profil étudiant.
    pub async fn resolve_role(
        client: &SupabaseClient,
        user_id: Uuid,
    ) -> Result<Option<Profile>, ServiceError> {
        let (student, teacher) = futures::join!(
            Self::student_profile(client, user_id),
            Self::teacher_profile(client, user_id),
        );

        match (student, teacher) {
            (Err(e), _) => Err(e),
            (Ok(Some(student)), teacher) => {
                if matches!(teacher, Ok(Some(_))) {
                    log::warn!(
                        "identity {user_id} has rows in both profile tables; using the student profile"
                    );
                }
                Ok(Some(Profile::Student(student)))
            }
            (Ok(None), Err(e)) => Err(e),
            (Ok(None), Ok(Some(teacher))) => Ok(Some(Profile::Teacher(teacher))),
            (Ok(None), Ok(None)) => Ok(None),
        }
    }

    pub async fn student_profile(
        client: &SupabaseClient,
        user_id: Uuid,
    ) -> Result<Option<StudentProfile>, ServiceError> {
        Ok(client
            .from(STUDENT_TABLE)
            .eq("user_id", user_id)
            .maybe_single()
            .await?)
    }

    pub async fn teacher_profile(
        client: &SupabaseClient,
        user_id: Uuid,
    ) -> Result<Option<TeacherProfile>, ServiceError> {
        Ok(client
            .from(TEACHER_TABLE)
            .eq("user_id", user_id)
            .maybe_single()
            .await?)
    }

    /// Annuaire des enseignants visibles par les étudiants: actifs et
    /// acceptant des consultations, triés par nom.
    pub async fn all_teachers(client: &SupabaseClient) -> Result<Vec<TeacherProfile>, ServiceError> {
        Ok(client
            .from(TEACHER_TABLE)
            .eq("is_active", true)
            .eq("is_accepting_consultations", true)
            .order("last_name", true)
            .fetch()
            .await?)
    }

    pub async fn teachers_by_department(
        client: &SupabaseClient,
        department: &str,
    ) -> Result<Vec<TeacherProfile>, ServiceError> {
        Ok(client
            .from(TEACHER_TABLE)
            .eq("department", department)
            .eq("is_active", true)
            .eq("is_accepting_consultations", true)
            .order("last_name", true)
            .fetch()
            .await?)
    }

    /// Crée un profil étudiant. Deux sign-in quasi simultanés d'une même
    /// identité nouvelle peuvent insérer en même temps: sur violation de
    /// clé unique on attend brièvement puis on relit la ligne gagnante.
    pub async fn create_student_profile(
        client: &SupabaseClient,
        user_id: Uuid,
        draft: &StudentDraft,
    ) -> Result<StudentProfile, ServiceError> {
        let mut body =
            serde_json::to_value(draft).map_err(|e| ServiceError::Backend(e.to_string()))?;
        body["user_id"] = json!(user_id);
        if draft.notification_preferences.is_none() {
            body["notification_preferences"] = json!(NotificationPreferences::default());
        }

        match client.from(STUDENT_TABLE).insert(&body).await {
            Ok(profile) => Ok(profile),
            Err(e) if e.is_unique_violation() => {
                log::info!("duplicate student profile insert for {user_id}; re-reading the winning row");
                tokio::time::sleep(PROVISION_RETRY_DELAY).await;
                match Self::student_profile(client, user_id).await? {
                    Some(profile) => Ok(profile),
                    None => Err(ServiceError::Conflict(e.to_string())),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Même contrat que la création étudiante, avec les défauts de capacité
    /// du backend posés explicitement.
    pub async fn create_teacher_profile(
        client: &SupabaseClient,
        user_id: Uuid,
        draft: &TeacherDraft,
    ) -> Result<TeacherProfile, ServiceError> {
        let mut body =
            serde_json::to_value(draft).map_err(|e| ServiceError::Backend(e.to_string()))?;
        body["user_id"] = json!(user_id);
        if draft.expertise_tags.is_none() {
            body["expertise_tags"] = json!([]);
        }
        if draft.office_hours.is_none() {
            body["office_hours"] = json!([]);
        }
        if draft.max_consultations_per_day.is_none() {
            body["max_consultations_per_day"] = json!(8);
        }
        if draft.consultation_duration_minutes.is_none() {
            body["consultation_duration_minutes"] = json!(30);
        }
        if draft.average_response_time_hours.is_none() {
            body["average_response_time_hours"] = json!(24);
        }
        if draft.is_accepting_consultations.is_none() {
            body["is_accepting_consultations"] = json!(true);
        }
        if draft.notification_preferences.is_none() {
            body["notification_preferences"] = json!(NotificationPreferences::default());
        }

        match client.from(TEACHER_TABLE).insert(&body).await {
            Ok(profile) => Ok(profile),
            Err(e) if e.is_unique_violation() => {
                log::info!("duplicate teacher profile insert for {user_id}; re-reading the winning row");
                tokio::time::sleep(PROVISION_RETRY_DELAY).await;
                match Self::teacher_profile(client, user_id).await? {
                    Some(profile) => Ok(profile),
                    None => Err(ServiceError::Conflict(e.to_string())),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Provisionnement automatique au premier sign-in authentifié: profil
    /// minimal bâti depuis les métadonnées du fournisseur d'identité. Un
    /// rôle non renseigné retombe sur étudiant. Si la course d'insertion
    /// est irrécupérable, plutôt que de bloquer le sign-in, un profil en
    /// mémoire (jamais persisté) est retourné.
    pub async fn provision(
        client: &SupabaseClient,
        identity: &Identity,
        requested_role: Role,
    ) -> Result<Profile, ServiceError> {
        let full_name = identity.user_metadata.full_name.clone().unwrap_or_default();
        let (first_name, last_name) = split_display_name(&full_name);
        let email = identity.email.clone().unwrap_or_default();
        let avatar = identity.user_metadata.avatar_url.clone();

        let created = match requested_role {
            Role::Teacher => {
                let draft = TeacherDraft {
                    email,
                    first_name,
                    last_name,
                    profile_photo_url: avatar,
                    ..Default::default()
                };
                Self::create_teacher_profile(client, identity.id, &draft)
                    .await
                    .map(Profile::Teacher)
            }
            _ => {
                let draft = StudentDraft {
                    email,
                    first_name,
                    last_name,
                    profile_photo_url: avatar,
                    ..Default::default()
                };
                Self::create_student_profile(client, identity.id, &draft)
                    .await
                    .map(Profile::Student)
            }
        };

        match created {
            Ok(profile) => Ok(profile),
            Err(ServiceError::Conflict(reason)) => {
                log::warn!(
                    "profile provisioning raced and the re-read found nothing ({reason}); \
                     returning a non-persisted fallback profile for {}",
                    identity.id
                );
                Ok(fallback_profile(identity, requested_role))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn update_student_profile(
        client: &SupabaseClient,
        user_id: Uuid,
        updates: &StudentProfileUpdate,
    ) -> Result<StudentProfile, ServiceError> {
        let mut body =
            serde_json::to_value(updates).map_err(|e| ServiceError::Backend(e.to_string()))?;
        body["updated_at"] = json!(Utc::now());
        Ok(client
            .from(STUDENT_TABLE)
            .eq("user_id", user_id)
            .update(&body)
            .await?)
    }

    pub async fn update_teacher_profile(
        client: &SupabaseClient,
        user_id: Uuid,
        updates: &TeacherProfileUpdate,
    ) -> Result<TeacherProfile, ServiceError> {
        let mut body =
            serde_json::to_value(updates).map_err(|e| ServiceError::Backend(e.to_string()))?;
        body["updated_at"] = json!(Utc::now());
        Ok(client
            .from(TEACHER_TABLE)
            .eq("user_id", user_id)
            .update(&body)
            .await?)
    }

    /// Trace du dernier login, best-effort: un échec est loggé, jamais
    /// remonté à l'appelant.
    pub async fn touch_student_login(client: &SupabaseClient, user_id: Uuid) {
        let result = client
            .from(STUDENT_TABLE)
            .eq("user_id", user_id)
            .update_void(&json!({ "last_login": Utc::now() }))
            .await;
        if let Err(e) = result {
            log::warn!("failed to update student last_login: {e}");
        }
    }

    pub async fn touch_teacher_login(client: &SupabaseClient, user_id: Uuid) {
        let result = client
            .from(TEACHER_TABLE)
            .eq("user_id", user_id)
            .update_void(&json!({ "last_login": Utc::now() }))
            .await;
        if let Err(e) = result {
            log::warn!("failed to update teacher last_login: {e}");
        }
    }

    /// Suppression de compte.
    pub async fn delete_profile(
        client: &SupabaseClient,
        user_id: Uuid,
        role: Role,
    ) -> Result<(), ServiceError> {
        let table = match role {
            Role::Teacher => TEACHER_TABLE,
            _ => STUDENT_TABLE,
        };
        Ok(client.from(table).eq("user_id", user_id).delete().await?)
    }
}

/// "Jane van Dorn" → ("Jane", "van Dorn"); le premier token fait le prénom,
/// le reste le nom.
fn split_display_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or("").to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

fn fallback_profile(identity: &Identity, requested_role: Role) -> Profile {
    let now = Utc::now();
    let (first_name, last_name) =
        split_display_name(identity.user_metadata.full_name.as_deref().unwrap_or(""));
    let email = identity.email.clone().unwrap_or_default();
    let avatar = identity.user_metadata.avatar_url.clone();

    match requested_role {
        Role::Teacher => Profile::Teacher(TeacherProfile {
            id: Uuid::nil(),
            user_id: identity.id,
            email,
            first_name,
            last_name,
            employee_id: None,
            phone: None,
            profile_photo_url: avatar,
            department: None,
            position: None,
            expertise_tags: None,
            office_location: None,
            office_hours: None,
            bio: None,
            max_consultations_per_day: 8,
            consultation_duration_minutes: 30,
            average_response_time_hours: 24,
            is_accepting_consultations: true,
            notification_preferences: NotificationPreferences::default(),
            created_at: now,
            updated_at: now,
            last_login: None,
            is_active: true,
        }),
        _ => Profile::Student(StudentProfile {
            id: Uuid::nil(),
            user_id: identity.id,
            email,
            first_name,
            last_name,
            student_id: None,
            phone: None,
            profile_photo_url: avatar,
            department: None,
            year_level: None,
            course: None,
            section: None,
            notification_preferences: NotificationPreferences::default(),
            created_at: now,
            updated_at: now,
            last_login: None,
            is_active: true,
        }),
    }
}
