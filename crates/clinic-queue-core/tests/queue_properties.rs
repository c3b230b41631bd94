//! Queue ordering and estimation property tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use clinic_queue_core::estimator::estimate;
use clinic_queue_core::models::{CheckIn, NewPatient, Patient, PatientStatus, Priority};
use clinic_queue_core::queue::{
    format_position, next_waiting, order_waiting, queue_stats, QueueSnapshot,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
}

fn make_patient(id: usize, priority: Priority, status: PatientStatus, offset_secs: i64) -> Patient {
    let mut record = NewPatient::waiting(
        CheckIn::new(format!("Patient {}", id), "555-0100", priority),
        0,
        t0() + Duration::seconds(offset_secs),
    );
    record.status = status;
    record.into_patient(format!("p-{}", id), t0())
}

fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![Just(Priority::Normal), Just(Priority::Urgent)]
}

fn status_strategy() -> impl Strategy<Value = PatientStatus> {
    prop_oneof![
        3 => Just(PatientStatus::Waiting),
        1 => Just(PatientStatus::Called),
        1 => Just(PatientStatus::InConsultation),
        1 => Just(PatientStatus::Completed),
    ]
}

fn patients_strategy() -> impl Strategy<Value = Vec<Patient>> {
    prop::collection::vec((priority_strategy(), status_strategy(), 0i64..7_200), 0..40).prop_map(
        |specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (priority, status, offset))| make_patient(i, priority, status, offset))
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn estimate_follows_formula(n in 0usize..500) {
        let normal = estimate(n, Priority::Normal);
        let urgent = estimate(n, Priority::Urgent);

        prop_assert_eq!(normal, (n as f64 * 15.0).round() as u32);
        prop_assert_eq!(urgent, (n as f64 * 7.5).round() as u32);
        prop_assert!(urgent <= normal);
    }

    #[test]
    fn ordering_keeps_only_waiting(patients in patients_strategy()) {
        let ordered = order_waiting(&patients);
        let waiting = patients.iter().filter(|p| p.status == PatientStatus::Waiting).count();

        prop_assert_eq!(ordered.len(), waiting);
        prop_assert!(ordered.iter().all(|p| p.status == PatientStatus::Waiting));
    }

    #[test]
    fn urgent_always_ahead_of_normal(patients in patients_strategy()) {
        let ordered = order_waiting(&patients);
        let first_normal = ordered.iter().position(|p| p.priority == Priority::Normal);
        let last_urgent = ordered.iter().rposition(|p| p.priority == Priority::Urgent);

        if let (Some(normal), Some(urgent)) = (first_normal, last_urgent) {
            prop_assert!(urgent < normal);
        }
    }

    #[test]
    fn earlier_check_in_first_within_priority(patients in patients_strategy()) {
        let ordered = order_waiting(&patients);
        for pair in ordered.windows(2) {
            if pair[0].priority == pair[1].priority {
                prop_assert!(pair[0].check_in_time <= pair[1].check_in_time);
            }
        }
    }

    #[test]
    fn ordering_is_idempotent(patients in patients_strategy()) {
        let once = order_waiting(&patients);
        let twice = order_waiting(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn next_is_head_of_ordered_list(patients in patients_strategy()) {
        let ordered = order_waiting(&patients);
        let next = next_waiting(&patients);
        prop_assert_eq!(next.map(|p| p.id.clone()), ordered.first().map(|p| p.id.clone()));
    }

    #[test]
    fn stats_match_waiting_list(patients in patients_strategy(), later in 0i64..10_000) {
        let now = t0() + Duration::seconds(later);
        let stats = queue_stats(&patients, now);
        let snapshot = QueueSnapshot::project(&patients, now);

        prop_assert_eq!(stats.total_patients, snapshot.waiting.len());
        prop_assert_eq!(stats.next_patient, snapshot.waiting.first().map(|p| p.name.clone()));
        if snapshot.waiting.is_empty() {
            prop_assert_eq!(stats.average_wait_time, 0);
        }
    }
}

#[test]
fn urgent_late_arrival_jumps_queue() {
    let a = make_patient(1, Priority::Normal, PatientStatus::Waiting, 0);
    let b = make_patient(2, Priority::Urgent, PatientStatus::Waiting, 300);

    let ordered = order_waiting(&[a, b]);
    let names: Vec<_> = ordered.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Patient 2", "Patient 1"]);
}

#[test]
fn position_labels_for_live_display() {
    let patients: Vec<_> = (0..5)
        .map(|i| make_patient(i, Priority::Normal, PatientStatus::Waiting, i as i64 * 60))
        .collect();
    let snapshot = QueueSnapshot::project(&patients, t0() + Duration::minutes(10));

    let labels: Vec<_> = snapshot
        .waiting
        .iter()
        .map(|p| format_position(snapshot.position_of(&p.id).unwrap()))
        .collect();
    assert_eq!(labels, vec!["1st", "2nd", "3rd", "4th", "5th"]);
    assert_eq!(snapshot.elapsed_label(&snapshot.waiting[0]), "10 minutes ago");
    assert_eq!(snapshot.stats.average_wait_time, 8);
}
