//! Who is next.

use std::cmp::Ordering;

use crate::models::Patient;

/// Urgent before normal, then earliest check-in first.
pub fn compare(a: &Patient, b: &Patient) -> Ordering {
    b.is_urgent()
        .cmp(&a.is_urgent())
        .then_with(|| a.check_in_time.cmp(&b.check_in_time))
}

/// Order waiting patients for service. Non-waiting records are dropped.
///
/// Stable: records with equal priority and check-in keep their input order.
pub fn order_waiting<'a, I>(patients: I) -> Vec<Patient>
where
    I: IntoIterator<Item = &'a Patient>,
{
    let mut waiting: Vec<Patient> = patients
        .into_iter()
        .filter(|p| p.is_waiting())
        .cloned()
        .collect();
    waiting.sort_by(compare);
    waiting
}

/// Head of the queue.
pub fn next_waiting<'a, I>(patients: I) -> Option<&'a Patient>
where
    I: IntoIterator<Item = &'a Patient>,
{
    patients
        .into_iter()
        .filter(|p| p.is_waiting())
        .min_by(|a, b| compare(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatientStatus, Priority};
    use crate::queue::test_support::patient_at;

    #[test]
    fn test_urgent_jumps_earlier_normal() {
        let a = patient_at("a", Priority::Normal, 0);
        let b = patient_at("b", Priority::Urgent, 60);

        let ordered = order_waiting(&[a, b]);
        let ids: Vec<_> = ordered.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_first_come_first_served_within_tier() {
        let c = patient_at("c", Priority::Normal, 120);
        let a = patient_at("a", Priority::Normal, 0);
        let b = patient_at("b", Priority::Normal, 60);

        let ordered = order_waiting(&[c, a, b]);
        let ids: Vec<_> = ordered.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_only_waiting_patients() {
        let a = patient_at("a", Priority::Urgent, 0);
        let mut b = patient_at("b", Priority::Urgent, 10);
        b.status = PatientStatus::Called;

        let ordered = order_waiting(&[a, b]);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].id, "a");
    }

    #[test]
    fn test_ties_keep_input_order() {
        let first = patient_at("first", Priority::Normal, 30);
        let second = patient_at("second", Priority::Normal, 30);

        let ordered = order_waiting(&[first, second]);
        assert_eq!(ordered[0].id, "first");
        assert_eq!(ordered[1].id, "second");
    }

    #[test]
    fn test_next_waiting_matches_head() {
        let patients = vec![
            patient_at("a", Priority::Normal, 0),
            patient_at("b", Priority::Normal, 10),
            patient_at("c", Priority::Urgent, 20),
        ];
        assert_eq!(next_waiting(&patients).map(|p| p.id.as_str()), Some("c"));
        assert!(next_waiting(&Vec::<Patient>::new()).is_none());
    }
}
