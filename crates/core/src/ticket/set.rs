//! The session's ticket set.

use serde::{Deserialize, Serialize};

use super::{TicketNo, TicketPatch, TicketRef};

/// Ordered, deduplicated set of ticket snapshots in a session.
///
/// Insertion order is preserved because receipts are printed in the order
/// tickets were entered. Membership is keyed by ticket number; all
/// mutations report whether they changed anything so the caller can bump
/// the session's ticket-set revision only on real changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketSet {
    tickets: Vec<TicketRef>,
}

impl TicketSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ticket. Idempotent: returns false without modifying the set
    /// when a ticket with the same number is already present.
    pub fn add(&mut self, ticket: TicketRef) -> bool {
        if self.contains(&ticket.ticket_no) {
            return false;
        }
        self.tickets.push(ticket);
        true
    }

    /// Remove a ticket by number. Returns the removed snapshot, or None if
    /// it was not present.
    pub fn remove(&mut self, ticket_no: &TicketNo) -> Option<TicketRef> {
        let idx = self.tickets.iter().position(|t| &t.ticket_no == ticket_no)?;
        Some(self.tickets.remove(idx))
    }

    /// Merge a patch into an existing ticket. Returns false (no-op) if the
    /// ticket is absent or the patch is empty.
    pub fn update(&mut self, ticket_no: &TicketNo, patch: &TicketPatch) -> bool {
        if patch.is_empty() {
            return false;
        }
        match self.tickets.iter_mut().find(|t| &t.ticket_no == ticket_no) {
            Some(ticket) => {
                patch.apply(ticket);
                true
            }
            None => false,
        }
    }

    /// Empty the set, returning how many tickets were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.tickets.len();
        self.tickets.clear();
        count
    }

    /// Look up a ticket by number.
    pub fn get(&self, ticket_no: &TicketNo) -> Option<&TicketRef> {
        self.tickets.iter().find(|t| &t.ticket_no == ticket_no)
    }

    /// True when a ticket with this number is present.
    pub fn contains(&self, ticket_no: &TicketNo) -> bool {
        self.get(ticket_no).is_some()
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Tickets in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TicketRef> {
        self.tickets.iter()
    }

    /// Ticket numbers in insertion order (the shape remote calls expect).
    pub fn ticket_nos(&self) -> Vec<TicketNo> {
        self.tickets.iter().map(|t| t.ticket_no.clone()).collect()
    }

    /// Snapshot of all tickets in insertion order.
    pub fn to_vec(&self) -> Vec<TicketRef> {
        self.tickets.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketStatus;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn ticket(no: &str) -> TicketRef {
        TicketRef {
            ticket_no: no.parse().unwrap(),
            customer_name: "Lim Bee Hoon".to_string(),
            customer_id: None,
            pledge_description: "gold ring".to_string(),
            principal: dec!(500),
            interest_due: dec!(15),
            penalty_due: dec!(0),
            pledge_date: NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(),
            status: TicketStatus::Unredeemed,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut set = TicketSet::new();
        assert!(set.add(ticket("B/0725/0001")));
        assert!(!set.add(ticket("B/0725/0001")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut set = TicketSet::new();
        set.add(ticket("B/0725/0003"));
        set.add(ticket("B/0725/0001"));
        set.add(ticket("B/0725/0002"));

        let nos: Vec<String> = set.ticket_nos().iter().map(|n| n.to_string()).collect();
        assert_eq!(nos, vec!["B/0725/0003", "B/0725/0001", "B/0725/0002"]);
    }

    #[test]
    fn test_remove_absent_is_silent() {
        let mut set = TicketSet::new();
        set.add(ticket("B/0725/0001"));

        assert!(set.remove(&"B/0725/9999".parse().unwrap()).is_none());
        assert_eq!(set.len(), 1);

        let removed = set.remove(&"B/0725/0001".parse().unwrap()).unwrap();
        assert_eq!(removed.ticket_no.to_string(), "B/0725/0001");
        assert!(set.is_empty());
    }

    #[test]
    fn test_update_merges_fields() {
        let mut set = TicketSet::new();
        set.add(ticket("B/0725/0001"));

        let no = "B/0725/0001".parse().unwrap();
        let patch = TicketPatch {
            interest_due: Some(dec!(20)),
            ..Default::default()
        };
        assert!(set.update(&no, &patch));
        assert_eq!(set.get(&no).unwrap().interest_due, dec!(20));
        // Other fields untouched.
        assert_eq!(set.get(&no).unwrap().principal, dec!(500));
    }

    #[test]
    fn test_update_absent_or_empty_is_noop() {
        let mut set = TicketSet::new();
        set.add(ticket("B/0725/0001"));

        let absent = "B/0725/9999".parse().unwrap();
        assert!(!set.update(&absent, &TicketPatch::status(TicketStatus::Lost)));

        let present = "B/0725/0001".parse().unwrap();
        assert!(!set.update(&present, &TicketPatch::default()));
    }

    #[test]
    fn test_serializes_as_plain_ticket_list() {
        let mut set = TicketSet::new();
        set.add(ticket("B/0725/0001"));
        set.add(ticket("B/0725/0002"));

        let json = serde_json::to_value(&set).unwrap();
        let list = json.as_array().expect("array, not a wrapper object");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["ticket_no"], "B/0725/0001");

        let restored: TicketSet = serde_json::from_value(json).unwrap();
        assert_eq!(restored, set);
    }

    #[test]
    fn test_clear() {
        let mut set = TicketSet::new();
        set.add(ticket("B/0725/0001"));
        set.add(ticket("B/0725/0002"));
        assert_eq!(set.clear(), 2);
        assert!(set.is_empty());
    }
}
