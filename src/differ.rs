use crate::models::{ChangeEvent, ChangeKind, ScheduleSnapshot, TicketStatus};

/// Compare two schedule snapshots and produce availability change events.
///
/// Only two transitions are notification-worthy: a screening seen for the
/// first time that is already purchasable, and a known sold-out screening
/// opening back up. Everything else, including availability being lost, stays
/// silent. Output order follows the current snapshot's iteration order.
pub fn diff(previous: &ScheduleSnapshot, current: &ScheduleSnapshot) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for (key, record) in current.iter() {
        match previous.get(key) {
            None => {
                if record.status == TicketStatus::Available {
                    events.push(ChangeEvent::availability(ChangeKind::NewAvailable, record));
                }
            }
            Some(old) => {
                if old.status == TicketStatus::SoldOut && record.status == TicketStatus::Available {
                    events.push(ChangeEvent::availability(ChangeKind::NowAvailable, record));
                }
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScreeningRecord;
    use rstest::rstest;

    fn snapshot(entries: &[(&str, TicketStatus)]) -> ScheduleSnapshot {
        entries
            .iter()
            .map(|(title, status)| {
                ScreeningRecord::new(*title, "7:00 PM", *status, "Order", "https://fest.example")
            })
            .collect()
    }

    #[test]
    fn test_first_seen_available_emits_new_available() {
        let events = diff(
            &ScheduleSnapshot::new(),
            &snapshot(&[("Mirror", TicketStatus::Available)]),
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::NewAvailable);
        assert_eq!(events[0].title, "Mirror");
    }

    #[rstest]
    #[case(TicketStatus::SoldOut)]
    #[case(TicketStatus::Waitlist)]
    #[case(TicketStatus::Unknown)]
    fn test_first_seen_unpurchasable_is_silent(#[case] status: TicketStatus) {
        let events = diff(&ScheduleSnapshot::new(), &snapshot(&[("Mirror", status)]));
        assert!(events.is_empty());
    }

    #[test]
    fn test_sold_out_to_available_emits_now_available() {
        let events = diff(
            &snapshot(&[("Mirror", TicketStatus::SoldOut)]),
            &snapshot(&[("Mirror", TicketStatus::Available)]),
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::NowAvailable);
    }

    #[rstest]
    #[case(TicketStatus::Available, TicketStatus::Available)]
    #[case(TicketStatus::Available, TicketStatus::SoldOut)]
    #[case(TicketStatus::Waitlist, TicketStatus::Available)]
    #[case(TicketStatus::Unknown, TicketStatus::Available)]
    #[case(TicketStatus::SoldOut, TicketStatus::Waitlist)]
    fn test_other_transitions_are_silent(
        #[case] before: TicketStatus,
        #[case] after: TicketStatus,
    ) {
        let events = diff(&snapshot(&[("Mirror", before)]), &snapshot(&[("Mirror", after)]));
        assert!(events.is_empty());
    }

    #[test]
    fn test_events_follow_current_snapshot_order() {
        let previous = snapshot(&[
            ("Stalker", TicketStatus::SoldOut),
            ("Mirror", TicketStatus::SoldOut),
        ]);
        let current = snapshot(&[
            ("Solaris", TicketStatus::Available),
            ("Mirror", TicketStatus::Available),
            ("Stalker", TicketStatus::Available),
        ]);

        let titles: Vec<String> = diff(&previous, &current)
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["Solaris", "Mirror", "Stalker"]);
    }

    #[test]
    fn test_disappeared_screening_is_silent() {
        let events = diff(
            &snapshot(&[("Mirror", TicketStatus::Available)]),
            &ScheduleSnapshot::new(),
        );
        assert!(events.is_empty());
    }
}
