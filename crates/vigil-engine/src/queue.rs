//! Triage queue ranking and views.
//!
//! The queue imposes a total order so pagination is stable: SLA
//! breaches first, then severity descending, unclaimed before claimed,
//! oldest first, alert id as the final tiebreak. Snoozed and
//! suppressed alerts are hidden from the default and unassigned views.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vigil_core::{Alert, AlertStatus, Severity, TriagePolicy, UserId};
use vigil_policy::AuthContext;
use vigil_store::{AlertQueryFilter, AlertRepository};

/// Default page size.
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Maximum page size.
pub const MAX_PAGE_LIMIT: usize = 200;

/// Which slice of the queue to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueView {
    /// Everything actionable in the organization.
    #[default]
    Full,
    /// Open alerts claimed by one user, snoozed or not.
    MyTasks(UserId),
    /// Unclaimed critical alerts.
    UnassignedCritical,
}

/// Pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// How many entries to skip.
    pub offset: usize,
    /// Page size, clamped to [`MAX_PAGE_LIMIT`].
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Pagination echo returned with each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// The applied offset.
    pub offset: usize,
    /// The applied limit.
    pub limit: usize,
    /// Total entries across all pages.
    pub total: usize,
}

/// One ranked queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// The alert.
    pub alert: Alert,
    /// True when the alert is still pending past its SLA deadline.
    pub sla_breached: bool,
    /// The live claim holder, if any.
    pub claimed_by: Option<UserId>,
}

/// One page of the ranked queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuePage {
    /// Entries in rank order.
    pub data: Vec<QueueEntry>,
    /// Pagination echo.
    pub pagination: Pagination,
}

/// Builds ranked triage queue views.
pub struct TriageQueue {
    alerts: Arc<dyn AlertRepository>,
    policy: TriagePolicy,
}

impl TriageQueue {
    /// Wires the queue to the alert repository.
    #[must_use]
    pub fn new(alerts: Arc<dyn AlertRepository>, policy: TriagePolicy) -> Self {
        Self { alerts, policy }
    }

    /// Returns one page of the requested view for the caller's
    /// organization.
    #[must_use]
    pub fn page(
        &self,
        ctx: &AuthContext,
        view: QueueView,
        page: Page,
        now: DateTime<Utc>,
    ) -> QueuePage {
        let open = self.alerts.list(ctx.org_id, &AlertQueryFilter::open(), now);

        let mut entries: Vec<QueueEntry> = open
            .into_iter()
            .filter(|alert| Self::visible(alert, view, now))
            .map(|alert| entry(alert, self.policy, now))
            .collect();
        entries.sort_by(rank);

        let total = entries.len();
        let limit = page.limit.clamp(1, MAX_PAGE_LIMIT);
        let data: Vec<QueueEntry> = entries.into_iter().skip(page.offset).take(limit).collect();

        QueuePage {
            data,
            pagination: Pagination {
                offset: page.offset,
                limit,
                total,
            },
        }
    }

    fn visible(alert: &Alert, view: QueueView, now: DateTime<Utc>) -> bool {
        match view {
            QueueView::Full => alert.queue_visible(now),
            // Holders keep sight of their own snoozed work.
            QueueView::MyTasks(user) => {
                alert.is_open() && !alert.suppressed && alert.live_holder(now) == Some(user)
            }
            QueueView::UnassignedCritical => {
                alert.queue_visible(now)
                    && alert.severity == Severity::Critical
                    && alert.live_holder(now).is_none()
            }
        }
    }

}

/// Builds one entry, deriving the breach flag from the deadline the
/// alert's escalation level has stretched it to. An escalated alert
/// inside its extended window is not flagged.
fn entry(alert: Alert, policy: TriagePolicy, now: DateTime<Utc>) -> QueueEntry {
    let window = policy.sla.window(alert.severity);
    let current_deadline = policy.escalation.deadline_for_level(
        alert.first_sla_deadline,
        window,
        alert.escalation_level,
    );
    let sla_breached = alert.status == AlertStatus::Pending && now > current_deadline;
    let claimed_by = alert.live_holder(now);
    QueueEntry {
        alert,
        sla_breached,
        claimed_by,
    }
}

/// The queue's total order.
fn rank(a: &QueueEntry, b: &QueueEntry) -> Ordering {
    b.sla_breached
        .cmp(&a.sla_breached)
        .then_with(|| b.alert.severity.priority().cmp(&a.alert.severity.priority()))
        .then_with(|| a.claimed_by.is_some().cmp(&b.claimed_by.is_some()))
        .then_with(|| a.alert.created_at.cmp(&b.alert.created_at))
        .then_with(|| a.alert.id.cmp(&b.alert.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use vigil_core::{
        AlertId, ClaimLease, OrgId, PatientId, SlaPolicy,
    };
    use vigil_policy::Role;
    use vigil_store::MemoryAlertRepository;

    fn seeded(
        repo: &MemoryAlertRepository,
        org: OrgId,
        severity: Severity,
        created_at: DateTime<Utc>,
        claimed_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Alert {
        let deadline = SlaPolicy::default().first_deadline(severity, created_at);
        let mut alert = Alert::manual(org, PatientId::new(), severity, deadline, created_at);
        if let Some(holder) = claimed_by {
            alert.claim = Some(ClaimLease {
                holder,
                acquired_at: now,
                expires_at: now + Duration::minutes(30),
            });
        }
        repo.insert(alert).unwrap()
    }

    fn ctx(org: OrgId) -> AuthContext {
        AuthContext::new(UserId::new(), org, Role::Clinician)
    }

    #[test]
    fn ranking_is_breach_severity_claim_age() {
        let repo = Arc::new(MemoryAlertRepository::new());
        let org = OrgId::new();
        let now = Utc::now();

        // Medium alert way past its deadline.
        let breached = seeded(&repo, org, Severity::Medium, now - Duration::hours(6), None, now);
        // Fresh critical, unclaimed.
        let critical = seeded(&repo, org, Severity::Critical, now, None, now);
        // Fresh critical, claimed.
        let claimed_critical = seeded(
            &repo,
            org,
            Severity::Critical,
            now,
            Some(UserId::new()),
            now,
        );
        // Older high alert inside its window.
        let old_high = seeded(&repo, org, Severity::High, now - Duration::minutes(30), None, now);
        let new_high = seeded(&repo, org, Severity::High, now, None, now);

        let queue = TriageQueue::new(Arc::clone(&repo) as Arc<dyn AlertRepository>, TriagePolicy::default());
        let page = queue.page(&ctx(org), QueueView::Full, Page::default(), now);

        let order: Vec<AlertId> = page.data.iter().map(|e| e.alert.id).collect();
        assert_eq!(
            order,
            vec![breached.id, critical.id, claimed_critical.id, old_high.id, new_high.id]
        );
        assert!(page.data[0].sla_breached);
    }

    #[test]
    fn escalated_alert_inside_extended_window_is_not_breached() {
        let repo = Arc::new(MemoryAlertRepository::new());
        let org = OrgId::new();
        let now = Utc::now();

        // Medium severity, one hour past the first four-hour deadline.
        let alert = seeded(&repo, org, Severity::Medium, now - Duration::hours(5), None, now);

        let queue = TriageQueue::new(Arc::clone(&repo) as Arc<dyn AlertRepository>, TriagePolicy::default());
        let page = queue.page(&ctx(org), QueueView::Full, Page::default(), now);
        assert!(page.data[0].sla_breached);

        // After escalating to level 1 the doubling backoff stretches the
        // deadline a full window further, so the flag clears.
        repo.update(org, alert.id, &mut |a| {
            a.escalation_level = 1;
            Ok(())
        })
        .unwrap();

        let page = queue.page(&ctx(org), QueueView::Full, Page::default(), now);
        assert!(!page.data[0].sla_breached);

        // Past the stretched deadline it flags again.
        let later = now + Duration::hours(4);
        let page = queue.page(&ctx(org), QueueView::Full, Page::default(), later);
        assert!(page.data[0].sla_breached);
    }

    #[test]
    fn snoozed_and_suppressed_are_hidden() {
        let repo = Arc::new(MemoryAlertRepository::new());
        let org = OrgId::new();
        let now = Utc::now();

        let visible = seeded(&repo, org, Severity::High, now, None, now);
        let snoozed = seeded(&repo, org, Severity::High, now, None, now);
        let suppressed = seeded(&repo, org, Severity::High, now, None, now);

        repo.update(org, snoozed.id, &mut |a| {
            a.snoozed_until = Some(now + Duration::hours(1));
            Ok(())
        })
        .unwrap();
        repo.update(org, suppressed.id, &mut |a| {
            a.suppressed = true;
            Ok(())
        })
        .unwrap();

        let queue = TriageQueue::new(Arc::clone(&repo) as Arc<dyn AlertRepository>, TriagePolicy::default());
        let page = queue.page(&ctx(org), QueueView::Full, Page::default(), now);
        let ids: Vec<AlertId> = page.data.iter().map(|e| e.alert.id).collect();
        assert_eq!(ids, vec![visible.id]);

        // The snooze lapses and the alert returns.
        let later = now + Duration::hours(2);
        let page = queue.page(&ctx(org), QueueView::Full, Page::default(), later);
        assert_eq!(page.data.len(), 2);
    }

    #[test]
    fn my_tasks_includes_snoozed_claims() {
        let repo = Arc::new(MemoryAlertRepository::new());
        let org = OrgId::new();
        let now = Utc::now();
        let me = UserId::new();

        let mine = seeded(&repo, org, Severity::High, now, Some(me), now);
        seeded(&repo, org, Severity::High, now, Some(UserId::new()), now);
        seeded(&repo, org, Severity::High, now, None, now);

        repo.update(org, mine.id, &mut |a| {
            a.snoozed_until = Some(now + Duration::hours(1));
            Ok(())
        })
        .unwrap();

        let queue = TriageQueue::new(Arc::clone(&repo) as Arc<dyn AlertRepository>, TriagePolicy::default());
        let page = queue.page(&ctx(org), QueueView::MyTasks(me), Page::default(), now);
        let ids: Vec<AlertId> = page.data.iter().map(|e| e.alert.id).collect();
        assert_eq!(ids, vec![mine.id]);
    }

    #[test]
    fn unassigned_critical_view() {
        let repo = Arc::new(MemoryAlertRepository::new());
        let org = OrgId::new();
        let now = Utc::now();

        let target = seeded(&repo, org, Severity::Critical, now, None, now);
        seeded(&repo, org, Severity::Critical, now, Some(UserId::new()), now);
        seeded(&repo, org, Severity::High, now, None, now);

        let queue = TriageQueue::new(Arc::clone(&repo) as Arc<dyn AlertRepository>, TriagePolicy::default());
        let page = queue.page(&ctx(org), QueueView::UnassignedCritical, Page::default(), now);
        let ids: Vec<AlertId> = page.data.iter().map(|e| e.alert.id).collect();
        assert_eq!(ids, vec![target.id]);
    }

    #[test]
    fn pagination_echoes_totals() {
        let repo = Arc::new(MemoryAlertRepository::new());
        let org = OrgId::new();
        let now = Utc::now();
        for i in 0..7 {
            seeded(
                &repo,
                org,
                Severity::Medium,
                now - Duration::minutes(i),
                None,
                now,
            );
        }

        let queue = TriageQueue::new(Arc::clone(&repo) as Arc<dyn AlertRepository>, TriagePolicy::default());
        let first = queue.page(&ctx(org), QueueView::Full, Page { offset: 0, limit: 3 }, now);
        let second = queue.page(&ctx(org), QueueView::Full, Page { offset: 3, limit: 3 }, now);
        let third = queue.page(&ctx(org), QueueView::Full, Page { offset: 6, limit: 3 }, now);

        assert_eq!(first.pagination.total, 7);
        assert_eq!(first.data.len(), 3);
        assert_eq!(second.data.len(), 3);
        assert_eq!(third.data.len(), 1);

        // Pages never overlap.
        let mut seen: Vec<AlertId> = Vec::new();
        for page in [&first, &second, &third] {
            for entry in &page.data {
                assert!(!seen.contains(&entry.alert.id));
                seen.push(entry.alert.id);
            }
        }
    }

    #[test]
    fn queue_is_org_scoped() {
        let repo = Arc::new(MemoryAlertRepository::new());
        let org_a = OrgId::new();
        let org_b = OrgId::new();
        let now = Utc::now();
        seeded(&repo, org_a, Severity::High, now, None, now);
        seeded(&repo, org_b, Severity::High, now, None, now);

        let queue = TriageQueue::new(Arc::clone(&repo) as Arc<dyn AlertRepository>, TriagePolicy::default());
        assert_eq!(queue.page(&ctx(org_a), QueueView::Full, Page::default(), now).data.len(), 1);
    }

    proptest! {
        /// The rank comparator is a total order: sorting any shuffle of
        /// the same entries yields the same sequence.
        #[test]
        fn ranking_is_deterministic(seed in 0u64..1000) {
            let now = Utc::now();
            let org = OrgId::new();
            let severities = [Severity::Low, Severity::Medium, Severity::High, Severity::Critical];

            let mut entries: Vec<QueueEntry> = (0..20)
                .map(|i| {
                    let severity = severities[((seed as usize) + i) % 4];
                    let created = now - Duration::minutes(((seed as i64) + i as i64) % 90);
                    let deadline = SlaPolicy::default().first_deadline(severity, created);
                    let mut alert = Alert::manual(org, PatientId::new(), severity, deadline, created);
                    if (seed as usize + i) % 3 == 0 {
                        alert.claim = Some(ClaimLease {
                            holder: UserId::new(),
                            acquired_at: now,
                            expires_at: now + Duration::minutes(30),
                        });
                    }
                    entry(alert, TriagePolicy::default(), now)
                })
                .collect();

            let mut sorted_once = entries.clone();
            sorted_once.sort_by(rank);

            entries.reverse();
            entries.sort_by(rank);

            let a: Vec<AlertId> = sorted_once.iter().map(|e| e.alert.id).collect();
            let b: Vec<AlertId> = entries.iter().map(|e| e.alert.id).collect();
            prop_assert_eq!(a, b);

            // Rank invariant: breached entries always precede clean ones.
            let first_clean = sorted_once.iter().position(|e| !e.sla_breached);
            if let Some(pos) = first_clean {
                prop_assert!(sorted_once[pos..].iter().all(|e| !e.sla_breached));
            }
        }
    }
}
