//! Most-urgent service selection.

use std::cmp::Ordering;

use crate::services::due_status::UpcomingService;

/// Urgency order: dated before undated, earlier date first, then lower due
/// mileage (absent last). Equal keys keep input order.
fn urgency(a: &UpcomingService, b: &UpcomingService) -> Ordering {
    let by_date = match (a.due_date, b.due_date) {
        (Some(da), Some(db)) => da.cmp(&db),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_date.then_with(|| {
        let ma = a.schedule.next_due_mileage.filter(|m| *m >= 0).unwrap_or(i64::MAX);
        let mb = b.schedule.next_due_mileage.filter(|m| *m >= 0).unwrap_or(i64::MAX);
        ma.cmp(&mb)
    })
}

/// All services, most urgent first.
pub fn rank_by_urgency(upcoming: &[UpcomingService]) -> Vec<&UpcomingService> {
    let mut ranked: Vec<&UpcomingService> = upcoming.iter().collect();
    // stable: ties fall through to input order
    ranked.sort_by(|a, b| urgency(a, b));
    ranked
}

/// The single most urgent service, or `None` for an empty set.
pub fn pick_next_service(upcoming: &[UpcomingService]) -> Option<&UpcomingService> {
    rank_by_urgency(upcoming).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::due_status::evaluate_schedule;
    use crate::services::due_status::tests::schedule;
    use chrono::{TimeZone, Utc};

    fn evaluated(due_date: Option<&str>, due_mileage: Option<i64>) -> UpcomingService {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        evaluate_schedule(&schedule(due_date, due_mileage, None, None), Some(40_000), now)
    }

    #[test]
    fn empty_set_has_no_next_service() {
        assert!(pick_next_service(&[]).is_none());
    }

    #[test]
    fn earliest_date_wins() {
        let later = evaluated(Some("2024-08-15"), Some(51_200));
        let sooner = evaluated(Some("2024-07-01"), Some(50_000));
        let sooner_id = sooner.schedule.id;
        let upcoming = vec![later, sooner];
        assert_eq!(pick_next_service(&upcoming).unwrap().schedule.id, sooner_id);
    }

    #[test]
    fn dated_beats_mileage_only_regardless_of_magnitude() {
        let mileage_only = evaluated(None, Some(40_001));
        let dated = evaluated(Some("2030-01-01"), None);
        let dated_id = dated.schedule.id;
        let upcoming = vec![mileage_only, dated];
        assert_eq!(pick_next_service(&upcoming).unwrap().schedule.id, dated_id);
    }

    #[test]
    fn same_date_falls_back_to_mileage_then_input_order() {
        let no_mileage = evaluated(Some("2024-07-01"), None);
        let high = evaluated(Some("2024-07-01"), Some(60_000));
        let low = evaluated(Some("2024-07-01"), Some(50_000));
        let twin = evaluated(Some("2024-07-01"), Some(50_000));
        let expected = vec![low.schedule.id, twin.schedule.id, high.schedule.id, no_mileage.schedule.id];

        let upcoming = vec![no_mileage, high, low, twin];
        let order: Vec<_> = rank_by_urgency(&upcoming).iter().map(|u| u.schedule.id).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn undated_sorted_by_mileage() {
        let none = evaluated(None, None);
        let far = evaluated(None, Some(90_000));
        let near = evaluated(None, Some(41_000));
        let near_id = near.schedule.id;
        let upcoming = vec![none, far, near];
        assert_eq!(pick_next_service(&upcoming).unwrap().schedule.id, near_id);
    }
}
