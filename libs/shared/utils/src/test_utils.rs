use std::sync::Arc;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: impl Into<String>) -> Self {
        Self {
            supabase_url: url.into(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            port: 3000,
            review_page_limit: 50,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "owner@example.com".to_string(),
            role: "authenticated".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    /// A pet owner, as Supabase issues them.
    pub fn owner(email: &str) -> Self {
        Self::new(email, "authenticated")
    }

    pub fn clinic(email: &str) -> Self {
        Self::new(email, "clinic")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).expect("test user ids are generated uuids")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let claims = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "aud": "authenticated",
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .expect("HS256 signing with an in-memory secret cannot fail")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row shapes as PostgREST returns them for the catalog and ledger tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn hospital_response(hospital_id: &str, name: &str) -> Value {
        json!({
            "id": hospital_id,
            "name": name,
            "address": "12 Harbour Road",
            "phone": "+20 100 000 0000",
            "specialties": ["Surgery", "Dermatology"],
            "rating": 0.0,
            "is_active": true
        })
    }

    pub fn doctor_response(doctor_id: &str, hospital_id: &str, consultation_fee: f64) -> Value {
        json!({
            "id": doctor_id,
            "hospital_id": hospital_id,
            "name": "Dr. Salma Hatem",
            "specialization": "General Practitioner",
            "consultation_fee": consultation_fee,
            "available_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"],
            "available_time_slots": ["09:00", "09:30", "10:00", "10:30"],
            "rating": 0.0,
            "is_active": true
        })
    }

    pub fn pet_response(pet_id: &str, owner_id: &str) -> Value {
        json!({
            "id": pet_id,
            "owner_id": owner_id,
            "name": "Miso",
            "type": "Cat",
            "age": 3
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        user_id: &str,
        doctor_id: &str,
        hospital_id: &str,
        status: &str,
    ) -> Value {
        json!({
            "id": appointment_id,
            "user_id": user_id,
            "pet_id": Uuid::new_v4(),
            "hospital_id": hospital_id,
            "doctor_id": doctor_id,
            "appointment_date": "2025-01-10",
            "time_slot": "09:00",
            "reason": "Annual vaccination",
            "symptoms": null,
            "notes": null,
            "prescription": null,
            "status": status,
            "total_fee": 300.0,
            "payment_status": "pending",
            "reminder_sent": false,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn error_response(code: &str, message: &str) -> Value {
        json!({
            "code": code,
            "details": null,
            "hint": null,
            "message": message
        })
    }
}
