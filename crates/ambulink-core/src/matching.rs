//! Doctor matching.
//!
//! Pure query over a roster snapshot: nothing here mutates availability.
//! Callers flip the winner to `Busy` through the registry.

use crate::doctor::Doctor;
use crate::error::MatchError;

/// Specializations used for conditions missing from the table.
pub const DEFAULT_SPECIALIZATIONS: &[&str] = &["Emergency Medicine"];

/// Condition -> specializations, most preferred first. Lookup order matters
/// for the substring fallback: the first key contained in the condition wins.
const CONDITION_TABLE: &[(&str, &[&str])] = &[
    ("Heart Attack", &["Cardiologist", "Emergency Medicine"]),
    ("Cardiac Arrest", &["Cardiologist", "Emergency Medicine"]),
    ("Chest Pain", &["Cardiologist", "Emergency Medicine"]),
    ("Stroke", &["Neurologist", "Emergency Medicine"]),
    (
        "Traumatic Brain Injury",
        &["Neurologist", "Neurosurgeon", "Emergency Medicine"],
    ),
    (
        "Subarachnoid Hemorrhage",
        &["Neurologist", "Neurosurgeon", "Emergency Medicine"],
    ),
    ("Seizure", &["Neurologist", "Neurosurgeon", "Emergency Medicine"]),
    ("Fracture", &["Orthopedic Surgeon", "Emergency Medicine"]),
    ("Trauma", &["Orthopedic Surgeon", "Emergency Medicine"]),
    ("Respiratory Distress", &["Pulmonologist", "Emergency Medicine"]),
    ("Asthma", &["Pulmonologist", "Emergency Medicine"]),
    ("Burns", &["Plastic Surgeon", "Emergency Medicine"]),
    ("Poisoning", &["Toxicologist", "Emergency Medicine"]),
    ("Overdose", &["Toxicologist", "Emergency Medicine"]),
];

/// Ordered specialization list for a condition.
///
/// Exact (case-insensitive) key match first, then the first table key that
/// appears inside the condition text, then [`DEFAULT_SPECIALIZATIONS`].
pub fn specializations_for(condition: &str) -> &'static [&'static str] {
    let condition = condition.trim();
    if condition.is_empty() {
        return DEFAULT_SPECIALIZATIONS;
    }

    if let Some((_, specs)) = CONDITION_TABLE
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(condition))
    {
        return specs;
    }

    let lowered = condition.to_lowercase();
    CONDITION_TABLE
        .iter()
        .find(|(key, _)| lowered.contains(&key.to_lowercase()))
        .map(|(_, specs)| *specs)
        .unwrap_or(DEFAULT_SPECIALIZATIONS)
}

/// Score a doctor against an ordered specialization list.
///
/// Returns `None` when the doctor's specialization is not in the list.
pub fn score(doctor: &Doctor, specializations: &[&str]) -> Option<f64> {
    let index = specializations
        .iter()
        .position(|spec| *spec == doctor.specialization)?;

    let experience = (f64::from(doctor.experience_years) / 4.0).min(5.0);
    let rating = doctor.rating * 0.6;
    let volume = (f64::from(doctor.patients_handled) / 1000.0).min(2.0);
    let closeness = (specializations.len() - index) as f64 * 1.5;

    Some(experience + rating + volume + closeness)
}

/// Select the best available doctor for `condition`.
///
/// An explicit `suggested` doctor (name, case-insensitive, or id) short-circuits
/// scoring, but only when available; a busy or unknown suggestion is an error,
/// never a silent fallback. Without a suggestion, candidates are the available
/// doctors whose specialization is mapped for the condition. No candidate is a
/// hard failure: this engine never returns an unrelated doctor.
pub fn match_doctor(
    doctors: &[Doctor],
    condition: &str,
    suggested: Option<&str>,
) -> Result<Doctor, MatchError> {
    if let Some(requested) = suggested.map(str::trim).filter(|s| !s.is_empty()) {
        let doctor = doctors
            .iter()
            .find(|d| d.name.trim().eq_ignore_ascii_case(requested) || d.id == requested)
            .ok_or_else(|| MatchError::RequestedDoctorNotFound {
                name: requested.to_string(),
            })?;

        if !doctor.availability.is_available() {
            return Err(MatchError::RequestedDoctorUnavailable {
                name: doctor.name.clone(),
                availability: doctor.availability.to_string(),
            });
        }
        return Ok(doctor.clone());
    }

    let specializations = specializations_for(condition);

    let mut best: Option<(&Doctor, f64)> = None;
    for doctor in doctors.iter().filter(|d| d.availability.is_available()) {
        let Some(candidate_score) = score(doctor, specializations) else {
            continue;
        };
        // Strictly greater keeps the earliest roster entry on ties.
        match best {
            Some((_, best_score)) if candidate_score <= best_score => {}
            _ => best = Some((doctor, candidate_score)),
        }
    }

    best.map(|(doctor, _)| doctor.clone())
        .ok_or_else(|| MatchError::NoCandidate {
            condition: condition.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctor::Availability;

    fn doctor(
        id: &str,
        specialization: &str,
        years: u32,
        rating: f64,
        availability: Availability,
    ) -> Doctor {
        Doctor {
            id: id.into(),
            name: format!("Dr. {id}"),
            specialization: specialization.into(),
            title: "Senior Specialist".into(),
            experience_years: years,
            availability,
            rating,
            patients_handled: 1000,
            contact: format!("+1555000{id}"),
            email: format!("{id}@hospital.test"),
            image_url: None,
        }
    }

    #[test]
    fn heart_attack_prefers_cardiologist() {
        let roster = vec![
            doctor("B", "Emergency Medicine", 12, 4.7, Availability::Available),
            doctor("A", "Cardiologist", 15, 4.8, Availability::Available),
        ];
        let winner = match_doctor(&roster, "Heart Attack", None).unwrap();
        assert_eq!(winner.id, "A");
    }

    #[test]
    fn ranking_follows_score_within_a_specialization() {
        let roster = vec![
            doctor("junior", "Neurologist", 4, 4.0, Availability::Available),
            doctor("senior", "Neurologist", 20, 4.9, Availability::Available),
        ];
        let specs = specializations_for("Stroke");
        let junior = score(&roster[0], specs).unwrap();
        let senior = score(&roster[1], specs).unwrap();
        assert!(senior > junior);
        assert_eq!(match_doctor(&roster, "Stroke", None).unwrap().id, "senior");
    }

    #[test]
    fn score_formula_matches_weights() {
        let d = doctor("A", "Cardiologist", 15, 4.8, Availability::Available);
        let specs = specializations_for("heart attack");
        // 15/4 + 4.8*0.6 + 1000/1000 + 2*1.5
        let expected = 3.75 + 2.88 + 1.0 + 3.0;
        assert!((score(&d, specs).unwrap() - expected).abs() < 1e-9);

        let capped = Doctor {
            experience_years: 40,
            patients_handled: 9000,
            ..d
        };
        let expected_capped = 5.0 + 2.88 + 2.0 + 3.0;
        assert!((score(&capped, specs).unwrap() - expected_capped).abs() < 1e-9);
    }

    #[test]
    fn no_available_specialist_is_a_hard_failure() {
        let roster = vec![
            doctor("A", "Cardiologist", 15, 4.8, Availability::Busy),
            doctor("N", "Neurologist", 20, 4.9, Availability::Available),
        ];
        let err = match_doctor(&roster, "Heart Attack", None).unwrap_err();
        assert_eq!(
            err,
            MatchError::NoCandidate {
                condition: "Heart Attack".into()
            }
        );
    }

    #[test]
    fn unmapped_condition_uses_emergency_medicine() {
        assert_eq!(specializations_for("Sunburn"), DEFAULT_SPECIALIZATIONS);
        let roster = vec![
            doctor("A", "Cardiologist", 15, 4.8, Availability::Available),
            doctor("E", "Emergency Medicine", 3, 3.9, Availability::Available),
        ];
        assert_eq!(match_doctor(&roster, "Sunburn", None).unwrap().id, "E");
    }

    #[test]
    fn condition_lookup_is_case_insensitive_and_substring_aware() {
        assert_eq!(
            specializations_for("HEART ATTACK"),
            &["Cardiologist", "Emergency Medicine"]
        );
        assert_eq!(
            specializations_for("Subarachnoid Hemorrhage due to Traumatic Brain Injury"),
            &["Neurologist", "Neurosurgeon", "Emergency Medicine"]
        );
        assert_eq!(specializations_for("   "), DEFAULT_SPECIALIZATIONS);
    }

    #[test]
    fn suggested_doctor_short_circuits_scoring() {
        let roster = vec![
            doctor("A", "Cardiologist", 15, 4.8, Availability::Available),
            doctor("E", "Emergency Medicine", 1, 1.0, Availability::Available),
        ];
        let chosen = match_doctor(&roster, "Heart Attack", Some("dr. e")).unwrap();
        assert_eq!(chosen.id, "E");
    }

    #[test]
    fn busy_suggested_doctor_does_not_fall_back() {
        let roster = vec![
            doctor("A", "Cardiologist", 15, 4.8, Availability::Available),
            doctor("E", "Emergency Medicine", 12, 4.7, Availability::OffDuty),
        ];
        let err = match_doctor(&roster, "Heart Attack", Some("Dr. E")).unwrap_err();
        assert!(matches!(err, MatchError::RequestedDoctorUnavailable { ref availability, .. } if availability == "Off-duty"));

        let err = match_doctor(&roster, "Heart Attack", Some("Dr. Nobody")).unwrap_err();
        assert!(matches!(err, MatchError::RequestedDoctorNotFound { .. }));
    }

    #[test]
    fn ties_keep_roster_order() {
        let roster = vec![
            doctor("first", "Cardiologist", 10, 4.5, Availability::Available),
            doctor("second", "Cardiologist", 10, 4.5, Availability::Available),
        ];
        assert_eq!(
            match_doctor(&roster, "Heart Attack", None).unwrap().id,
            "first"
        );
    }
}
