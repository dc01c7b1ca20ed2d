use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use futures::future::join_all;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::*;
use appointment_cell::services::availability::AvailabilityService;
use appointment_cell::services::booking::AppointmentBookingService;
use shared_database::SupabaseClient;
use shared_utils::fake_postgrest::FakePostgrest;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

// 2025-01-10 is a Friday, inside the Monday-Friday fixture schedule.
const FRIDAY: &str = "2025-01-10";
const SATURDAY: &str = "2025-01-11";

struct Clinic {
    _server: MockServer,
    store: FakePostgrest,
    supabase: Arc<SupabaseClient>,
    owner: TestUser,
    pet_id: Uuid,
    hospital_id: Uuid,
    doctor_id: Uuid,
}

impl Clinic {
    async fn open() -> Self {
        let server = MockServer::start().await;
        let store = FakePostgrest::new();
        store.mount(&server).await;

        let owner = TestUser::owner("owner@example.com");
        let pet_id = Uuid::new_v4();
        let hospital_id = Uuid::new_v4();
        let doctor_id = Uuid::new_v4();

        store.seed("hospitals", MockSupabaseResponses::hospital_response(&hospital_id.to_string(), "Harbour Vets"));
        store.seed(
            "doctors",
            MockSupabaseResponses::doctor_response(&doctor_id.to_string(), &hospital_id.to_string(), 300.0),
        );
        store.seed("pets", MockSupabaseResponses::pet_response(&pet_id.to_string(), &owner.id));

        let config = TestConfig::with_supabase_url(server.uri()).to_app_config();
        let supabase = Arc::new(SupabaseClient::new(&config));

        Self { _server: server, store, supabase, owner, pet_id, hospital_id, doctor_id }
    }

    fn booking(&self) -> AppointmentBookingService {
        AppointmentBookingService::with_client(Arc::clone(&self.supabase))
    }

    fn availability(&self) -> AvailabilityService {
        AvailabilityService::with_client(Arc::clone(&self.supabase))
    }

    fn request(&self, date: &str, time_slot: &str) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            pet_id: Some(self.pet_id),
            hospital_id: Some(self.hospital_id),
            doctor_id: Some(self.doctor_id),
            appointment_date: Some(date.to_string()),
            time_slot: Some(time_slot.to_string()),
            reason: Some("Annual vaccination".to_string()),
            symptoms: Some("None".to_string()),
        }
    }

    fn active_rows(&self) -> usize {
        self.store
            .rows("appointments")
            .iter()
            .filter(|row| row["status"] == "pending" || row["status"] == "confirmed")
            .count()
    }
}

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, DATE_FORMAT).unwrap()
}

#[tokio::test]
async fn test_create_booking_snapshots_fee_and_starts_pending() {
    let clinic = Clinic::open().await;

    let details = clinic
        .booking()
        .create_booking(clinic.owner.uuid(), clinic.request(FRIDAY, "09:30"))
        .await
        .unwrap();

    let appointment = details.appointment;
    assert_eq!(appointment.user_id, clinic.owner.uuid());
    assert_eq!(appointment.appointment_date, date(FRIDAY));
    assert_eq!(appointment.time_slot, "09:30");
    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.payment_status, PaymentStatus::Pending);
    assert_eq!(appointment.total_fee, 300.0);
    assert!(!appointment.reminder_sent);
    assert_eq!(appointment.symptoms.as_deref(), Some("None"));
}

#[tokio::test]
async fn test_concurrent_identical_bookings_leave_one_active_appointment() {
    let clinic = Clinic::open().await;
    let service = clinic.booking();
    let owner_id = clinic.owner.uuid();

    let attempts = (0..8).map(|_| service.create_booking(owner_id, clinic.request(FRIDAY, "10:00")));
    let results = join_all(attempts).await;

    let booked = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(booked, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(AppointmentError::SlotAlreadyBooked));
    }
    assert_eq!(clinic.active_rows(), 1);
}

#[tokio::test]
async fn test_fee_change_after_booking_keeps_snapshot() {
    let clinic = Clinic::open().await;
    let service = clinic.booking();
    let owner_id = clinic.owner.uuid();

    let first = service.create_booking(owner_id, clinic.request(FRIDAY, "09:00")).await.unwrap();

    clinic.store.patch_row("doctors", &clinic.doctor_id.to_string(), json!({ "consultation_fee": 450.0 }));

    let reread = service.get_appointment(owner_id, first.appointment.id).await.unwrap();
    assert_eq!(reread.appointment.total_fee, 300.0);

    let second = service.create_booking(owner_id, clinic.request(FRIDAY, "09:30")).await.unwrap();
    assert_eq!(second.appointment.total_fee, 450.0);
}

#[tokio::test]
async fn test_booking_checks_fail_fast_in_order() {
    let clinic = Clinic::open().await;
    let service = clinic.booking();
    let owner_id = clinic.owner.uuid();

    let mut missing_reason = clinic.request(FRIDAY, "09:00");
    missing_reason.reason = None;
    assert_matches!(
        service.create_booking(owner_id, missing_reason).await,
        Err(AppointmentError::ValidationError(_))
    );

    // Someone else's pet looks exactly like a missing one.
    let stranger = TestUser::owner("stranger@example.com");
    assert_matches!(
        service.create_booking(stranger.uuid(), clinic.request(FRIDAY, "09:00")).await,
        Err(AppointmentError::PetNotFound)
    );

    let mut unknown_doctor = clinic.request(FRIDAY, "09:00");
    unknown_doctor.doctor_id = Some(Uuid::new_v4());
    assert_matches!(
        service.create_booking(owner_id, unknown_doctor).await,
        Err(AppointmentError::DoctorNotFound)
    );

    let mut wrong_hospital = clinic.request(FRIDAY, "09:00");
    wrong_hospital.hospital_id = Some(Uuid::new_v4());
    assert_matches!(
        service.create_booking(owner_id, wrong_hospital).await,
        Err(AppointmentError::ValidationError(msg)) if msg.contains("hospital")
    );

    assert_matches!(
        service.create_booking(owner_id, clinic.request(FRIDAY, "17:00")).await,
        Err(AppointmentError::ValidationError(msg)) if msg.contains("17:00")
    );

    assert_matches!(
        service.create_booking(owner_id, clinic.request(SATURDAY, "09:00")).await,
        Err(AppointmentError::ValidationError(msg)) if msg.contains("Saturday")
    );

    assert_eq!(clinic.store.rows("appointments").len(), 0);
}

#[tokio::test]
async fn test_inactive_doctor_cannot_be_booked() {
    let clinic = Clinic::open().await;
    clinic.store.patch_row("doctors", &clinic.doctor_id.to_string(), json!({ "is_active": false }));

    let result = clinic
        .booking()
        .create_booking(clinic.owner.uuid(), clinic.request(FRIDAY, "09:00"))
        .await;

    assert_matches!(result, Err(AppointmentError::DoctorNotFound));
}

#[tokio::test]
async fn test_cancel_is_guarded_by_current_status() {
    let clinic = Clinic::open().await;
    let service = clinic.booking();
    let owner_id = clinic.owner.uuid();

    let booked = service.create_booking(owner_id, clinic.request(FRIDAY, "09:00")).await.unwrap();
    let id = booked.appointment.id;

    let cancelled = service.update_status(id, owner_id, AppointmentStatus::Cancelled).await.unwrap();
    assert_eq!(cancelled.appointment.status, AppointmentStatus::Cancelled);

    assert_matches!(
        service.update_status(id, owner_id, AppointmentStatus::Cancelled).await,
        Err(AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Cancelled,
            to: AppointmentStatus::Cancelled
        })
    );

    for terminal in ["completed", "no_show"] {
        let row_id = Uuid::new_v4();
        clinic.store.seed(
            "appointments",
            MockSupabaseResponses::appointment_response(
                &row_id.to_string(),
                &clinic.owner.id,
                &clinic.doctor_id.to_string(),
                &clinic.hospital_id.to_string(),
                terminal,
            ),
        );
        assert_matches!(
            service.update_status(row_id, owner_id, AppointmentStatus::Cancelled).await,
            Err(AppointmentError::InvalidStatusTransition { .. })
        );
    }
}

#[tokio::test]
async fn test_owner_cannot_confirm_their_own_booking() {
    let clinic = Clinic::open().await;
    let service = clinic.booking();
    let owner_id = clinic.owner.uuid();

    let booked = service.create_booking(owner_id, clinic.request(FRIDAY, "09:00")).await.unwrap();

    assert_matches!(
        service.update_status(booked.appointment.id, owner_id, AppointmentStatus::Confirmed).await,
        Err(AppointmentError::InvalidStatusTransition { .. })
    );
}

#[tokio::test]
async fn test_concurrent_cancels_succeed_exactly_once() {
    let clinic = Clinic::open().await;
    let service = clinic.booking();
    let owner_id = clinic.owner.uuid();

    let booked = service.create_booking(owner_id, clinic.request(FRIDAY, "10:30")).await.unwrap();
    let id = booked.appointment.id;

    let results = join_all(
        (0..4).map(|_| service.update_status(id, owner_id, AppointmentStatus::Cancelled)),
    )
    .await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AppointmentError::InvalidStatusTransition { .. })));
}

#[tokio::test]
async fn test_other_users_cannot_read_or_cancel() {
    let clinic = Clinic::open().await;
    let service = clinic.booking();
    let stranger = TestUser::owner("stranger@example.com").uuid();

    let booked = service
        .create_booking(clinic.owner.uuid(), clinic.request(FRIDAY, "09:00"))
        .await
        .unwrap();
    let id = booked.appointment.id;

    assert_matches!(service.get_appointment(stranger, id).await, Err(AppointmentError::NotFound));
    assert_matches!(
        service.update_status(id, stranger, AppointmentStatus::Cancelled).await,
        Err(AppointmentError::NotFound)
    );
    assert!(service.list_my_appointments(stranger, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_my_appointments_newest_date_first_with_status_filter() {
    let clinic = Clinic::open().await;
    let service = clinic.booking();
    let owner_id = clinic.owner.uuid();

    let early = service.create_booking(owner_id, clinic.request("2025-01-06", "09:00")).await.unwrap();
    let late = service.create_booking(owner_id, clinic.request("2025-01-09", "09:00")).await.unwrap();
    service.update_status(early.appointment.id, owner_id, AppointmentStatus::Cancelled).await.unwrap();

    let all = service.list_my_appointments(owner_id, None).await.unwrap();
    let ids: Vec<Uuid> = all.iter().map(|a| a.appointment.id).collect();
    assert_eq!(ids, vec![late.appointment.id, early.appointment.id]);

    let cancelled = service
        .list_my_appointments(owner_id, Some(AppointmentStatus::Cancelled))
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].appointment.id, early.appointment.id);
}

#[tokio::test]
async fn test_clinic_drives_appointment_to_completion() {
    let clinic = Clinic::open().await;
    let service = clinic.booking();

    let booked = service
        .create_booking(clinic.owner.uuid(), clinic.request(FRIDAY, "09:00"))
        .await
        .unwrap();
    let id = booked.appointment.id;

    let confirmed = service.apply_clinic_transition(id, AppointmentStatus::Confirmed).await.unwrap();
    assert_eq!(confirmed.appointment.status, AppointmentStatus::Confirmed);

    let completed = service.apply_clinic_transition(id, AppointmentStatus::Completed).await.unwrap();
    assert_eq!(completed.appointment.status, AppointmentStatus::Completed);

    assert_matches!(
        service.apply_clinic_transition(id, AppointmentStatus::NoShow).await,
        Err(AppointmentError::InvalidStatusTransition { from: AppointmentStatus::Completed, .. })
    );
    assert_matches!(
        service.apply_clinic_transition(Uuid::new_v4(), AppointmentStatus::Confirmed).await,
        Err(AppointmentError::NotFound)
    );
}

#[tokio::test]
async fn test_book_conflict_slots_cancel_rebook_flow() {
    let clinic = Clinic::open().await;
    let service = clinic.booking();
    let availability = clinic.availability();
    let owner_id = clinic.owner.uuid();

    let first = service.create_booking(owner_id, clinic.request(FRIDAY, "09:00")).await.unwrap();

    assert_matches!(
        service.create_booking(owner_id, clinic.request(FRIDAY, "09:00")).await,
        Err(AppointmentError::SlotAlreadyBooked)
    );

    let slots = availability.resolve_slots(clinic.doctor_id, date(FRIDAY)).await.unwrap();
    assert_eq!(slots.booked_slots, vec!["09:00"]);
    assert_eq!(slots.available_slots, vec!["09:30", "10:00", "10:30"]);
    assert!(slots.is_working_day);

    service.update_status(first.appointment.id, owner_id, AppointmentStatus::Cancelled).await.unwrap();

    let slots = availability.resolve_slots(clinic.doctor_id, date(FRIDAY)).await.unwrap();
    assert!(slots.booked_slots.is_empty());
    assert_eq!(slots.available_slots, slots.all_slots);

    let rebooked = service.create_booking(owner_id, clinic.request(FRIDAY, "09:00")).await.unwrap();
    assert_ne!(rebooked.appointment.id, first.appointment.id);
    assert_eq!(clinic.active_rows(), 1);
}

#[tokio::test]
async fn test_resolver_reports_non_working_days_without_filtering() {
    let clinic = Clinic::open().await;

    let slots = clinic
        .availability()
        .resolve_slots(clinic.doctor_id, date(SATURDAY))
        .await
        .unwrap();

    assert!(!slots.is_working_day);
    assert_eq!(slots.all_slots, vec!["09:00", "09:30", "10:00", "10:30"]);
    assert_eq!(slots.available_slots, slots.all_slots);
}

#[tokio::test]
async fn test_resolver_keeps_bookings_outside_the_current_template() {
    let clinic = Clinic::open().await;

    let mut legacy = MockSupabaseResponses::appointment_response(
        &Uuid::new_v4().to_string(),
        &clinic.owner.id,
        &clinic.doctor_id.to_string(),
        &clinic.hospital_id.to_string(),
        "confirmed",
    );
    legacy["time_slot"] = json!("16:00");
    clinic.store.seed("appointments", legacy);

    let slots = clinic
        .availability()
        .resolve_slots(clinic.doctor_id, date(FRIDAY))
        .await
        .unwrap();

    assert_eq!(slots.booked_slots, vec!["16:00"]);
    assert_eq!(slots.available_slots, slots.all_slots);
}

#[tokio::test]
async fn test_resolver_unknown_doctor_is_not_found() {
    let clinic = Clinic::open().await;

    let result = clinic.availability().resolve_slots(Uuid::new_v4(), date(FRIDAY)).await;
    assert_matches!(result, Err(AppointmentError::DoctorNotFound));
}

// The pre-check passes but the insert loses the race at the index.
#[tokio::test]
async fn test_unique_violation_on_insert_is_a_conflict() {
    let mock_server = MockServer::start().await;
    let owner = TestUser::owner("owner@example.com");
    let pet_id = Uuid::new_v4();
    let hospital_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/pets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::pet_response(&pet_id.to_string(), &owner.id)
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id.to_string(), &hospital_id.to_string(), 300.0)
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "23505",
            "duplicate key value violates unique constraint \"appointments_active_slot_key\"",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let request = CreateAppointmentRequest {
        pet_id: Some(pet_id),
        hospital_id: Some(hospital_id),
        doctor_id: Some(doctor_id),
        appointment_date: Some(FRIDAY.to_string()),
        time_slot: Some("09:00".to_string()),
        reason: Some("Limping".to_string()),
        symptoms: None,
    };

    let result = AppointmentBookingService::new(&config)
        .create_booking(owner.uuid(), request)
        .await;

    assert_matches!(result, Err(AppointmentError::SlotAlreadyBooked));
}

#[tokio::test]
async fn test_created_booking_carries_embedded_summaries() {
    let mock_server = MockServer::start().await;
    let owner = TestUser::owner("owner@example.com");
    let pet_id = Uuid::new_v4();
    let hospital_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/pets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::pet_response(&pet_id.to_string(), &owner.id)
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(&doctor_id.to_string(), &hospital_id.to_string(), 300.0)
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let mut created = MockSupabaseResponses::appointment_response(
        &appointment_id.to_string(),
        &owner.id,
        &doctor_id.to_string(),
        &hospital_id.to_string(),
        "pending",
    );
    created["pet"] = json!({ "name": "Miso", "type": "Cat", "age": 3 });
    created["hospital"] = json!({ "name": "Harbour Vets", "address": "12 Harbour Road", "phone": null });
    created["doctor"] = json!({ "name": "Dr. Salma Hatem", "specialization": "General Practitioner", "consultation_fee": 300.0 });

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([created])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let request = CreateAppointmentRequest {
        pet_id: Some(pet_id),
        hospital_id: Some(hospital_id),
        doctor_id: Some(doctor_id),
        appointment_date: Some(FRIDAY.to_string()),
        time_slot: Some("09:00".to_string()),
        reason: Some("Annual vaccination".to_string()),
        symptoms: None,
    };

    let details = AppointmentBookingService::new(&config)
        .create_booking(owner.uuid(), request)
        .await
        .unwrap();

    assert_eq!(details.appointment.id, appointment_id);
    assert_eq!(serde_json::to_value(&details).unwrap()["pet"]["type"], "Cat");
    assert_eq!(details.pet.unwrap().pet_type.as_deref(), Some("Cat"));
    assert_eq!(details.hospital.unwrap().name, "Harbour Vets");
    assert_eq!(details.doctor.unwrap().consultation_fee, Some(300.0));
}
