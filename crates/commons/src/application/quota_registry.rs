use invoker_clock::Clock;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace};

use crate::domain::PermitRequest;

/// Capacity of one rate-limited resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    pub resource: String,
    pub capacity: u32,
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(resource: impl Into<String>, capacity: u32, window: Duration) -> Self {
        RateLimitRule {
            resource: resource.into(),
            capacity,
            window,
        }
    }
}

/// Outcome of a permit acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    Granted,
    /// Nothing was consumed; `retry_after` is the longest wait among the
    /// resources that could not fit the request
    Denied { retry_after: Duration },
}

impl Acquisition {
    pub fn is_granted(&self) -> bool {
        matches!(self, Acquisition::Granted)
    }
}

/// Permit requests that can never succeed, whatever the timing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    #[error("Unknown rate-limited resource: {0}")]
    UnknownResource(String),

    #[error("Permit weight {weight} for {resource} exceeds capacity {capacity}")]
    ExceedsCapacity {
        resource: String,
        weight: u64,
        capacity: u32,
    },
}

/// Point-in-time view of one resource's window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaUsage {
    pub consumed: u64,
    pub capacity: u32,
    pub window: Duration,
    /// Grant time of the oldest permit still inside the window
    pub window_start: Option<Instant>,
}

struct ResourceQuota {
    capacity: u32,
    window: Duration,
    state: Mutex<QuotaWindow>,
}

/// Sliding-window log of grants for one resource
#[derive(Default)]
struct QuotaWindow {
    consumed: u64,
    grants: VecDeque<(Instant, u32)>,
}

impl QuotaWindow {
    fn reclaim(&mut self, now: Instant, window: Duration) {
        while let Some(&(granted_at, weight)) = self.grants.front() {
            if now.saturating_duration_since(granted_at) < window {
                break;
            }
            self.grants.pop_front();
            self.consumed -= u64::from(weight);
        }
    }

    fn has_room(&self, weight: u64, capacity: u32) -> bool {
        self.consumed + weight <= u64::from(capacity)
    }

    /// Time until enough old grants expire for `weight` to fit
    fn wait_for(&self, weight: u64, capacity: u32, window: Duration, now: Instant) -> Duration {
        let excess = self.consumed + weight - u64::from(capacity);
        let mut freed = 0u64;
        for &(granted_at, granted) in &self.grants {
            freed += u64::from(granted);
            if freed >= excess {
                return (granted_at + window).saturating_duration_since(now);
            }
        }
        window
    }

    fn commit(&mut self, weight: u64, now: Instant) {
        // weight <= capacity <= u32::MAX, checked before commit
        self.grants.push_back((now, weight as u32));
        self.consumed += weight;
    }
}

/// Shared permit budget for every rate-limited resource of a venue
///
/// Each resource has its own lock. A request touching several resources
/// locks them in key order, checks all of them and only then consumes, so
/// a multi-permit acquisition is all-or-nothing and concurrent acquisitions
/// only contend on the resources they share.
///
/// `try_acquire` never sleeps; callers decide whether to wait.
pub struct QuotaRegistry {
    resources: BTreeMap<String, ResourceQuota>,
    clock: Arc<dyn Clock>,
}

impl QuotaRegistry {
    pub fn new(rules: impl IntoIterator<Item = RateLimitRule>, clock: Arc<dyn Clock>) -> Self {
        let resources = rules
            .into_iter()
            .map(|rule| {
                (
                    rule.resource,
                    ResourceQuota {
                        capacity: rule.capacity,
                        window: rule.window,
                        state: Mutex::new(QuotaWindow::default()),
                    },
                )
            })
            .collect();

        QuotaRegistry { resources, clock }
    }

    /// Names of all configured resources, sorted
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Try to take every permit in `permits` at once
    pub fn try_acquire(&self, permits: &[PermitRequest]) -> Result<Acquisition, QuotaError> {
        // Merge duplicates; BTreeMap keeps the lock order stable
        let mut demand: BTreeMap<&str, u64> = BTreeMap::new();
        for permit in permits.iter().filter(|p| p.weight() > 0) {
            *demand.entry(permit.resource()).or_default() += u64::from(permit.weight());
        }

        let mut slots = Vec::with_capacity(demand.len());
        for (resource, weight) in demand {
            let quota = self
                .resources
                .get(resource)
                .ok_or_else(|| QuotaError::UnknownResource(resource.to_string()))?;
            if weight > u64::from(quota.capacity) {
                return Err(QuotaError::ExceedsCapacity {
                    resource: resource.to_string(),
                    weight,
                    capacity: quota.capacity,
                });
            }
            slots.push((resource, weight, quota));
        }

        let mut guards: Vec<_> = slots
            .iter()
            .map(|(resource, weight, quota)| (*resource, *weight, *quota, quota.state.lock()))
            .collect();

        // Read the clock under the locks so grants stay time-ordered per window
        let now = self.clock.now();
        let mut retry_after: Option<Duration> = None;

        for (resource, weight, quota, window) in guards.iter_mut() {
            window.reclaim(now, quota.window);
            if !window.has_room(*weight, quota.capacity) {
                let wait = window.wait_for(*weight, quota.capacity, quota.window, now);
                debug!(
                    resource = %resource,
                    weight = *weight,
                    consumed = window.consumed,
                    capacity = quota.capacity,
                    wait_ms = wait.as_millis() as u64,
                    "Permit denied"
                );
                retry_after = Some(retry_after.map_or(wait, |current| current.max(wait)));
            }
        }

        if let Some(retry_after) = retry_after {
            return Ok(Acquisition::Denied { retry_after });
        }

        for (resource, weight, _, window) in guards.iter_mut() {
            window.commit(*weight, now);
            trace!(
                resource = %resource,
                weight = *weight,
                consumed = window.consumed,
                "Permit granted"
            );
        }

        Ok(Acquisition::Granted)
    }

    /// Current usage of one resource
    pub fn usage(&self, resource: &str) -> Option<QuotaUsage> {
        let quota = self.resources.get(resource)?;
        let mut window = quota.state.lock();
        window.reclaim(self.clock.now(), quota.window);

        Some(QuotaUsage {
            consumed: window.consumed,
            capacity: quota.capacity,
            window: quota.window,
            window_start: window.grants.front().map(|(at, _)| *at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invoker_clock::ManualClock;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn registry(rules: Vec<RateLimitRule>) -> (QuotaRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (QuotaRegistry::new(rules, clock.clone()), clock)
    }

    #[test]
    fn test_request_limit() {
        let (quota, _clock) = registry(vec![RateLimitRule::new(
            "rest_request",
            10,
            Duration::from_secs(60),
        )]);
        let permit = [PermitRequest::fixed("rest_request", 1)];

        // Should allow first requests
        for _ in 0..10 {
            assert!(quota.try_acquire(&permit).unwrap().is_granted());
        }

        // Should deny when limit exceeded
        let result = quota.try_acquire(&permit).unwrap();
        assert_eq!(
            result,
            Acquisition::Denied {
                retry_after: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn test_window_reclaims_after_elapsed() {
        let (quota, clock) = registry(vec![RateLimitRule::new(
            "orders",
            1,
            Duration::from_secs(10),
        )]);
        let permit = [PermitRequest::fixed("orders", 1)];

        assert!(quota.try_acquire(&permit).unwrap().is_granted());

        clock.advance(Duration::from_secs(4));
        assert_eq!(
            quota.try_acquire(&permit).unwrap(),
            Acquisition::Denied {
                retry_after: Duration::from_secs(6)
            }
        );

        clock.advance(Duration::from_secs(6));
        assert!(quota.try_acquire(&permit).unwrap().is_granted());
    }

    #[test]
    fn test_sliding_window_waits_for_oldest_needed_grant() {
        let (quota, clock) = registry(vec![RateLimitRule::new(
            "weight",
            10,
            Duration::from_secs(60),
        )]);

        assert!(quota.try_acquire(&[PermitRequest::fixed("weight", 4)]).unwrap().is_granted());
        clock.advance(Duration::from_secs(20));
        assert!(quota.try_acquire(&[PermitRequest::fixed("weight", 6)]).unwrap().is_granted());
        clock.advance(Duration::from_secs(10));

        // 10 consumed; 3 more needs the first grant (4) to expire at t=60
        let result = quota.try_acquire(&[PermitRequest::fixed("weight", 3)]).unwrap();
        assert_eq!(
            result,
            Acquisition::Denied {
                retry_after: Duration::from_secs(30)
            }
        );

        // 5 more needs both grants to expire, the second at t=80
        let result = quota.try_acquire(&[PermitRequest::fixed("weight", 5)]).unwrap();
        assert_eq!(
            result,
            Acquisition::Denied {
                retry_after: Duration::from_secs(50)
            }
        );
    }

    #[test]
    fn test_multi_permit_all_or_nothing() {
        let (quota, _clock) = registry(vec![
            RateLimitRule::new("ip", 10, Duration::from_secs(60)),
            RateLimitRule::new("orders", 1, Duration::from_secs(10)),
        ]);
        let order = [
            PermitRequest::fixed("ip", 1),
            PermitRequest::fixed("orders", 1),
        ];

        assert!(quota.try_acquire(&order).unwrap().is_granted());

        // orders is full: ip must not be consumed either
        let result = quota.try_acquire(&order).unwrap();
        assert!(!result.is_granted());
        assert_eq!(quota.usage("ip").unwrap().consumed, 1);
        assert_eq!(quota.usage("orders").unwrap().consumed, 1);
    }

    #[test]
    fn test_denial_reports_longest_wait() {
        let (quota, clock) = registry(vec![
            RateLimitRule::new("second", 1, Duration::from_secs(1)),
            RateLimitRule::new("minute", 1, Duration::from_secs(60)),
        ]);
        let both = [
            PermitRequest::fixed("second", 1),
            PermitRequest::fixed("minute", 1),
        ];

        assert!(quota.try_acquire(&both).unwrap().is_granted());
        clock.advance(Duration::from_millis(500));

        assert_eq!(
            quota.try_acquire(&both).unwrap(),
            Acquisition::Denied {
                retry_after: Duration::from_millis(59_500)
            }
        );
    }

    #[test]
    fn test_duplicate_resources_are_summed() {
        let (quota, _clock) = registry(vec![RateLimitRule::new(
            "weight",
            5,
            Duration::from_secs(60),
        )]);
        quota.try_acquire(&[PermitRequest::fixed("weight", 2)]).unwrap();

        let twice = [
            PermitRequest::fixed("weight", 2),
            PermitRequest::fixed("weight", 2),
        ];
        assert!(!quota.try_acquire(&twice).unwrap().is_granted());
        assert_eq!(quota.usage("weight").unwrap().consumed, 2);
    }

    #[test]
    fn test_faults() {
        let (quota, _clock) = registry(vec![RateLimitRule::new(
            "weight",
            3,
            Duration::from_secs(60),
        )]);

        assert_eq!(
            quota.try_acquire(&[PermitRequest::fixed("unknown", 1)]),
            Err(QuotaError::UnknownResource("unknown".to_string()))
        );
        assert!(matches!(
            quota.try_acquire(&[PermitRequest::fixed("weight", 4)]),
            Err(QuotaError::ExceedsCapacity { weight: 4, .. })
        ));
    }

    #[test]
    fn test_no_permits_is_granted() {
        let (quota, _clock) = registry(vec![]);
        assert!(quota.try_acquire(&[]).unwrap().is_granted());
    }

    #[test]
    fn test_usage_snapshot() {
        let (quota, clock) = registry(vec![RateLimitRule::new(
            "rest_request",
            5,
            Duration::from_secs(10),
        )]);
        let start = clock.now();

        quota.try_acquire(&[PermitRequest::fixed("rest_request", 2)]).unwrap();
        let usage = quota.usage("rest_request").unwrap();
        assert_eq!(usage.consumed, 2);
        assert_eq!(usage.capacity, 5);
        assert_eq!(usage.window_start, Some(start));

        clock.advance(Duration::from_secs(10));
        let usage = quota.usage("rest_request").unwrap();
        assert_eq!(usage.consumed, 0);
        assert_eq!(usage.window_start, None);

        assert!(quota.usage("missing").is_none());
        assert_eq!(quota.resources().collect::<Vec<_>>(), vec!["rest_request"]);
    }

    #[test]
    fn test_concurrent_acquisitions_never_exceed_capacity() {
        let (quota, _clock) = registry(vec![
            RateLimitRule::new("shared", 100, Duration::from_secs(60)),
            RateLimitRule::new("orders", 40, Duration::from_secs(60)),
        ]);
        let granted_shared = AtomicU64::new(0);
        let granted_orders = AtomicU64::new(0);

        std::thread::scope(|scope| {
            for worker in 0..16 {
                let quota = &quota;
                let granted_shared = &granted_shared;
                let granted_orders = &granted_orders;
                scope.spawn(move || {
                    for _ in 0..50 {
                        let permits = if worker % 2 == 0 {
                            vec![PermitRequest::fixed("shared", 1)]
                        } else {
                            vec![
                                PermitRequest::fixed("shared", 1),
                                PermitRequest::fixed("orders", 1),
                            ]
                        };
                        if quota.try_acquire(&permits).unwrap().is_granted() {
                            granted_shared.fetch_add(1, Ordering::SeqCst);
                            if permits.len() == 2 {
                                granted_orders.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                });
            }
        });

        assert_eq!(granted_shared.load(Ordering::SeqCst), 100);
        assert!(granted_orders.load(Ordering::SeqCst) <= 40);
        assert_eq!(quota.usage("shared").unwrap().consumed, 100);
        assert_eq!(
            quota.usage("orders").unwrap().consumed,
            granted_orders.load(Ordering::SeqCst)
        );
    }
}
