//! Backward pagination cursor.
//!
//! Gates older-page requests so that at most one is in flight per collection,
//! successive pages are spaced by a cooldown, and an empty page ends
//! pagination until the next full reload.
//!
//! The cursor is time-agnostic: callers pass `now` and the cursor compares it
//! with the completion instant of the last page. Re-arming after the cooldown
//! happens lazily on the next check, so no timer is needed.

use std::time::Duration;

use roomsync_proto::{Entity, EntityId};

/// Why a page request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRejection {
    /// A page is already being fetched.
    InFlight,
    /// The previous page completed less than a cooldown ago.
    CoolingDown {
        /// Time until the cursor re-arms.
        remaining: Duration,
    },
    /// An empty page was returned; there is no older history.
    Exhausted,
    /// Nothing is loaded yet, so there is no entity to page before.
    NoAnchor,
}

/// An accepted page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Fetch entities older than this one.
    pub before_id: EntityId,
    /// Maximum entities to fetch.
    pub page_size: usize,
    /// Cursor generation the request belongs to. A completion from an older
    /// generation is ignored.
    pub generation: u64,
}

/// Read-only view of a cursor for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    /// Oldest entity loaded so far.
    pub oldest_loaded_id: Option<EntityId>,
    /// A request issued now would be accepted.
    pub can_fetch_more: bool,
    /// A page is being fetched.
    pub in_flight: bool,
    /// History is exhausted.
    pub exhausted: bool,
}

/// Pagination cursor for one collection.
///
/// # Invariants
///
/// - At most one request is in flight.
/// - `cooldown_from` is only set by a non-empty successful page.
#[derive(Debug, Clone)]
pub struct PaginationCursor<I> {
    oldest: Option<(u64, EntityId)>,
    in_flight: bool,
    exhausted: bool,
    cooldown_from: Option<I>,
    generation: u64,
    page_size: usize,
    cooldown: Duration,
}

impl<I> PaginationCursor<I>
where
    I: Copy + Ord + std::ops::Sub<Output = Duration>,
{
    /// Idle cursor with no anchor.
    pub fn new(page_size: usize, cooldown: Duration) -> Self {
        Self {
            oldest: None,
            in_flight: false,
            exhausted: false,
            cooldown_from: None,
            generation: 0,
            page_size,
            cooldown,
        }
    }

    /// Start over after a full reload: new anchor from `entities`, history no
    /// longer exhausted, any in-flight request orphaned.
    pub fn reset<E: Entity>(&mut self, entities: &[E]) {
        self.generation += 1;
        self.oldest = None;
        self.in_flight = false;
        self.exhausted = false;
        self.cooldown_from = None;
        self.observe(entities);
    }

    /// Move the anchor back if `entities` contains something older.
    pub fn observe<E: Entity>(&mut self, entities: &[E]) {
        for entity in entities {
            let key = entity.ordering_key();
            let older = match &self.oldest {
                None => true,
                Some((oldest, oldest_id)) => key < *oldest || (key == *oldest && entity.id() > oldest_id),
            };
            if older {
                self.oldest = Some((key, entity.id().clone()));
            }
        }
    }

    /// Recompute the anchor from `entities` alone, for when the anchor
    /// entity left the collection or moved. Unlike [`Self::reset`], an
    /// in-flight request stays valid and exhaustion is kept.
    pub fn retarget<E: Entity>(&mut self, entities: &[E]) {
        self.oldest = None;
        self.observe(entities);
    }

    /// Ask for the next older page.
    ///
    /// # Errors
    ///
    /// The [`PageRejection`] explaining why no request may be issued now. A
    /// rejection has no side effects.
    pub fn request(&mut self, now: I) -> Result<PageRequest, PageRejection> {
        self.check(now)?;
        let Some((_, before_id)) = &self.oldest else {
            return Err(PageRejection::NoAnchor);
        };

        let request = PageRequest {
            before_id: before_id.clone(),
            page_size: self.page_size,
            generation: self.generation,
        };
        self.in_flight = true;
        Ok(request)
    }

    /// Record a successful page of `entities` for `request`.
    ///
    /// Returns false if the request belongs to an earlier generation; the
    /// caller should then discard the page.
    pub fn complete<E: Entity>(&mut self, request: &PageRequest, entities: &[E], now: I) -> bool {
        if request.generation != self.generation {
            return false;
        }

        self.in_flight = false;
        if entities.is_empty() {
            self.exhausted = true;
        } else {
            self.observe(entities);
            self.cooldown_from = Some(now);
        }
        true
    }

    /// Record a failed page. The cursor re-arms immediately.
    pub fn fail(&mut self, request: &PageRequest) {
        if request.generation == self.generation {
            self.in_flight = false;
        }
    }

    /// True if a request issued at `now` would be accepted.
    pub fn can_fetch_more(&self, now: I) -> bool {
        self.check(now).is_ok() && self.oldest.is_some()
    }

    /// Current generation. Bumped by every [`Self::reset`].
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Oldest entity loaded so far.
    pub fn oldest_loaded_id(&self) -> Option<&EntityId> {
        self.oldest.as_ref().map(|(_, id)| id)
    }

    /// Snapshot of the cursor at `now`.
    pub fn state(&self, now: I) -> PaginationState {
        PaginationState {
            oldest_loaded_id: self.oldest_loaded_id().cloned(),
            can_fetch_more: self.can_fetch_more(now),
            in_flight: self.in_flight,
            exhausted: self.exhausted,
        }
    }

    fn check(&self, now: I) -> Result<(), PageRejection> {
        if self.in_flight {
            return Err(PageRejection::InFlight);
        }
        if self.exhausted {
            return Err(PageRejection::Exhausted);
        }
        if let Some(from) = self.cooldown_from {
            let elapsed = if now > from { now - from } else { Duration::ZERO };
            if elapsed < self.cooldown {
                return Err(PageRejection::CoolingDown { remaining: self.cooldown - elapsed });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use roomsync_proto::Message;

    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(2);

    fn history() -> Vec<Message> {
        vec![Message::new("m3", "u", 30), Message::new("m2", "u", 20), Message::new("m1", "u", 10)]
    }

    fn cursor() -> PaginationCursor<Instant> {
        let mut cursor = PaginationCursor::new(50, COOLDOWN);
        cursor.reset(&history());
        cursor
    }

    #[test]
    fn anchor_is_oldest_loaded() {
        let mut cursor = cursor();
        let request = cursor.request(Instant::now()).unwrap();
        assert_eq!(request.before_id.as_str(), "m1");
        assert_eq!(request.page_size, 50);
    }

    #[test]
    fn no_anchor_before_load() {
        let mut cursor: PaginationCursor<Instant> = PaginationCursor::new(50, COOLDOWN);
        assert_eq!(cursor.request(Instant::now()), Err(PageRejection::NoAnchor));
    }

    #[test]
    fn single_request_in_flight() {
        let mut cursor = cursor();
        let now = Instant::now();
        cursor.request(now).unwrap();
        assert_eq!(cursor.request(now), Err(PageRejection::InFlight));
    }

    #[test]
    fn cooldown_after_success() {
        let mut cursor = cursor();
        let start = Instant::now();
        let request = cursor.request(start).unwrap();
        assert!(cursor.complete(&request, &[Message::new("m0", "u", 5)], start));

        assert!(matches!(
            cursor.request(start + Duration::from_millis(500)),
            Err(PageRejection::CoolingDown { .. })
        ));
        assert!(cursor.can_fetch_more(start + COOLDOWN));

        let next = cursor.request(start + COOLDOWN).unwrap();
        assert_eq!(next.before_id.as_str(), "m0");
    }

    #[test]
    fn failure_rearms_immediately() {
        let mut cursor = cursor();
        let now = Instant::now();
        let request = cursor.request(now).unwrap();
        cursor.fail(&request);
        assert!(cursor.request(now).is_ok());
    }

    #[test]
    fn empty_page_exhausts_until_reset() {
        let mut cursor = cursor();
        let now = Instant::now();
        let request = cursor.request(now).unwrap();
        cursor.complete::<Message>(&request, &[], now);

        assert_eq!(cursor.request(now + COOLDOWN), Err(PageRejection::Exhausted));
        assert!(cursor.state(now).exhausted);

        cursor.reset(&history());
        assert!(cursor.request(now).is_ok());
    }

    #[test]
    fn retarget_after_anchor_leaves() {
        let mut cursor = cursor();
        let now = Instant::now();
        let remaining = [Message::new("m3", "u", 30), Message::new("m2", "u", 20)];

        cursor.retarget(&remaining);
        assert_eq!(cursor.request(now).unwrap().before_id.as_str(), "m2");

        cursor.retarget::<Message>(&[]);
        assert_eq!(cursor.oldest_loaded_id(), None);
    }

    #[test]
    fn retarget_keeps_in_flight_request() {
        let mut cursor = cursor();
        let now = Instant::now();
        let request = cursor.request(now).unwrap();

        cursor.retarget(&history()[..2]);
        assert!(cursor.state(now).in_flight);
        assert!(cursor.complete(&request, &[Message::new("m0", "u", 5)], now));
        assert_eq!(cursor.oldest_loaded_id().map(EntityId::as_str), Some("m0"));
    }

    #[test]
    fn reset_bumps_generation() {
        let mut cursor = cursor();
        let before = cursor.generation();
        cursor.reset(&history());
        assert_eq!(cursor.generation(), before + 1);
    }

    #[test]
    fn reset_orphans_in_flight_request() {
        let mut cursor = cursor();
        let now = Instant::now();
        let request = cursor.request(now).unwrap();
        cursor.reset(&history());

        assert!(!cursor.complete(&request, &[Message::new("m0", "u", 5)], now));
        assert_eq!(cursor.oldest_loaded_id().map(EntityId::as_str), Some("m1"));
    }
}
