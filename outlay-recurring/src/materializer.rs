//! Materializer: expand one template's pending due dates into concrete expenses.

use chrono::NaiveDate;
use outlay_core::{step, NewExpense, RecurringTemplate};
use uuid::Uuid;

/// Upper bound on occurrences produced for one template in one call.
pub const MAX_OCCURRENCES_PER_TEMPLATE: usize = 100_000;

/// Result of materializing one template against a cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct Materialization {
    pub template_id: Uuid,
    /// Due date the template had when it was read.
    pub previous_due_date: NaiveDate,
    /// One per missed occurrence, oldest first.
    pub occurrences: Vec<NewExpense>,
    /// First due date after the cutoff.
    pub next_due_date: NaiveDate,
}

impl Materialization {
    pub fn count(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }
}

/// Generate every occurrence of `template` dated on or before `cutoff`.
///
/// Pure: depends only on the template snapshot and the cutoff. Does not look at
/// `active`. Panics if the frequency fails to advance the date or the per-template cap
/// is hit, both of which would mean a broken stepping rule.
pub fn materialize(template: &RecurringTemplate, cutoff: NaiveDate) -> Materialization {
    let mut occurrences = Vec::new();
    let mut due = template.next_due_date;

    while due <= cutoff {
        assert!(
            occurrences.len() < MAX_OCCURRENCES_PER_TEMPLATE,
            "recurring template {} produced more than {} occurrences up to {}",
            template.id,
            MAX_OCCURRENCES_PER_TEMPLATE,
            cutoff
        );

        occurrences.push(NewExpense {
            owner_id: template.owner_id,
            title: template.title.clone(),
            amount: template.amount,
            category: template.category.clone(),
            date: due,
            recurring_id: Some(template.id),
        });

        let next = step(due, template.frequency);
        assert!(
            next > due,
            "frequency {} did not advance {} for recurring template {}",
            template.frequency,
            due,
            template.id
        );
        due = next;
    }

    Materialization {
        template_id: template.id,
        previous_due_date: template.next_due_date,
        occurrences,
        next_due_date: due,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use outlay_core::{Frequency, TemplateFields};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn template(frequency: Frequency, next_due_date: NaiveDate) -> RecurringTemplate {
        RecurringTemplate::new(
            1,
            TemplateFields {
                title: "Rent".into(),
                amount: 1200.0,
                category: "housing".into(),
                frequency,
                next_due_date,
            },
        )
    }

    fn dates(m: &Materialization) -> Vec<NaiveDate> {
        m.occurrences.iter().map(|o| o.date).collect()
    }

    #[test]
    fn monthly_backfills_to_cutoff() {
        let t = template(Frequency::Monthly, d(2025, 11, 1));
        let m = materialize(&t, d(2026, 1, 15));
        assert_eq!(dates(&m), vec![d(2025, 11, 1), d(2025, 12, 1), d(2026, 1, 1)]);
        assert_eq!(m.next_due_date, d(2026, 2, 1));
        assert_eq!(m.previous_due_date, d(2025, 11, 1));
    }

    #[test]
    fn weekly_count_matches_day_distance() {
        let start = d(2026, 1, 1);
        let t = template(Frequency::Weekly, start);
        for offset in 0..120i64 {
            let cutoff = start + Duration::days(offset);
            let m = materialize(&t, cutoff);
            assert_eq!(m.count() as i64, offset / 7 + 1, "offset {offset}");
            for (k, occurrence) in m.occurrences.iter().enumerate() {
                assert_eq!(occurrence.date, start + Duration::days(7 * k as i64));
                assert!(occurrence.date <= cutoff);
            }
            assert!(m.next_due_date > cutoff);
        }
    }

    #[test]
    fn not_due_is_a_no_op() {
        let t = template(Frequency::Weekly, d(2026, 2, 1));
        let m = materialize(&t, d(2026, 1, 31));
        assert!(m.is_empty());
        assert_eq!(m.next_due_date, d(2026, 2, 1));
    }

    #[test]
    fn due_exactly_on_cutoff_emits_one() {
        let t = template(Frequency::Monthly, d(2026, 1, 15));
        let m = materialize(&t, d(2026, 1, 15));
        assert_eq!(dates(&m), vec![d(2026, 1, 15)]);
        assert_eq!(m.next_due_date, d(2026, 2, 15));
    }

    #[test]
    fn month_end_clamp_carries_forward() {
        let t = template(Frequency::Monthly, d(2025, 1, 31));
        let m = materialize(&t, d(2025, 4, 30));
        assert_eq!(
            dates(&m),
            vec![d(2025, 1, 31), d(2025, 2, 28), d(2025, 3, 28), d(2025, 4, 28)]
        );
        assert_eq!(m.next_due_date, d(2025, 5, 28));
    }

    #[test]
    fn long_outage_generates_every_missed_occurrence() {
        let t = template(Frequency::Monthly, d(2020, 1, 1));
        let m = materialize(&t, d(2026, 1, 15));
        assert_eq!(m.count(), 6 * 12 + 1);
        assert!(dates(&m).windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn occurrences_copy_template_fields() {
        let t = template(Frequency::Weekly, d(2026, 1, 1));
        let m = materialize(&t, d(2026, 1, 1));
        let o = &m.occurrences[0];
        assert_eq!(o.owner_id, t.owner_id);
        assert_eq!(o.title, t.title);
        assert_eq!(o.amount, t.amount);
        assert_eq!(o.category, t.category);
        assert_eq!(o.recurring_id, Some(t.id));
    }

    #[test]
    fn rerun_on_same_snapshot_is_identical() {
        let t = template(Frequency::Weekly, d(2026, 1, 1));
        assert_eq!(materialize(&t, d(2026, 3, 1)), materialize(&t, d(2026, 3, 1)));
    }

    #[test]
    fn ignores_active_flag() {
        let mut t = template(Frequency::Weekly, d(2026, 1, 1));
        t.active = false;
        assert_eq!(materialize(&t, d(2026, 1, 8)).count(), 2);
    }
}
