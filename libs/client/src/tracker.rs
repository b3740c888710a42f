//! Countdown of the hold on a reserved slot
//!
//! The server owns the real expiry of a hold. The tracker only mirrors it so
//! a UI can count down and drop the reservation locally once it lapses.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use lifecycle::{Clock, DEFAULT_HOLD_MINUTES};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{ApiError, BookingApi, BookingDetails, SessionStore, StoreError};

/// Key the held reservation is persisted under
pub const SESSION_KEY: &str = "reservationSession";

/// Local copy of a held reservation
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationSession {
	pub booking_id: Uuid,
	pub expires_at: Option<NaiveDateTime>,
	pub group_size: i32,
	pub date:       NaiveDate,
	pub time_slot:  String,
	pub deposit:    i32,
}

impl From<BookingDetails> for ReservationSession {
	fn from(value: BookingDetails) -> Self {
		Self {
			booking_id: value.id,
			expires_at: value.expires_at,
			group_size: value.group_size,
			date:       value.date,
			time_slot:  value.time_slot,
			deposit:    value.deposit,
		}
	}
}

/// What a UI needs to render the countdown
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackerState {
	pub session:        Option<ReservationSession>,
	/// Whole seconds left on the hold
	pub time_remaining: u64,
	pub is_expired:     bool,
}

#[derive(Debug, Error)]
pub enum TrackerError {
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error("reservation session serialization error -- {0}")]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Api(#[from] ApiError),
}

type ExpiryCallback = Arc<dyn Fn(ReservationSession) + Send + Sync>;

/// State shared with the countdown task
struct Shared<S> {
	store:      S,
	state:      watch::Sender<TrackerState>,
	on_expired: Mutex<Option<ExpiryCallback>>,
	/// Bumped whenever a countdown is started or stopped, only the
	/// countdown of the current generation may touch the state
	generation: Mutex<u64>,
}

impl<S: SessionStore> Shared<S> {
	/// Invalidate every running countdown, returns the new generation
	fn next_generation(&self) -> u64 {
		let mut generation = self.generation.lock();
		*generation += 1;

		*generation
	}

	/// Count down a second for the countdown of `generation`
	///
	/// Returns false once that countdown is done, either because the hold
	/// lapsed or because a newer countdown replaced it. The generation lock
	/// is held until the lapsed session is gone from the store so a session
	/// saved concurrently is never removed.
	fn step(&self, generation: u64) -> bool {
		let current = self.generation.lock();

		if *current != generation {
			return false;
		}

		let mut lapsed = false;

		self.state.send_modify(|state| {
			state.time_remaining = state.time_remaining.saturating_sub(1);
			lapsed = state.time_remaining == 0;
		});

		if !lapsed {
			return true;
		}

		let expired = self.expire();
		drop(current);

		if let Some(session) = expired {
			info!("hold on booking {} lapsed", session.booking_id);

			let callback = self.on_expired.lock().clone();
			if let Some(callback) = callback {
				callback(session);
			}
		}

		false
	}

	/// Drop the held session as expired and return it
	fn expire(&self) -> Option<ReservationSession> {
		let mut expired = None;

		self.state.send_modify(|state| {
			expired = state.session.take();
			state.time_remaining = 0;
			state.is_expired = true;
		});

		if let Err(e) = self.store.remove(SESSION_KEY) {
			warn!("failed to remove expired reservation session -- {e}");
		}

		expired
	}
}

/// Keeps the held reservation of this client and counts down its hold
///
/// Every method that (re)starts the countdown spawns a tokio task and
/// therefore has to be called from within a tokio runtime.
pub struct ReservationTracker<S, A> {
	shared:      Arc<Shared<S>>,
	api:         A,
	clock:       Arc<dyn Clock>,
	hold_window: TimeDelta,
	countdown:   Mutex<Option<JoinHandle<()>>>,
}

impl<S, A> ReservationTracker<S, A>
where
	S: SessionStore + 'static,
	A: BookingApi,
{
	#[must_use]
	pub fn new(store: S, api: A, clock: Arc<dyn Clock>) -> Self {
		let (state, _) = watch::channel(TrackerState::default());

		Self {
			shared: Arc::new(Shared {
				store,
				state,
				on_expired: Mutex::new(None),
				generation: Mutex::new(0),
			}),
			api,
			clock,
			hold_window: TimeDelta::minutes(DEFAULT_HOLD_MINUTES),
			countdown: Mutex::new(None),
		}
	}

	/// Hold window assumed for sessions saved without an expiry
	#[must_use]
	pub fn with_hold_window(mut self, hold_window: TimeDelta) -> Self {
		self.hold_window = hold_window;
		self
	}

	/// Register the function to call when a held session lapses
	pub fn on_expired<F>(&self, callback: F)
	where
		F: Fn(ReservationSession) + Send + Sync + 'static,
	{
		*self.shared.on_expired.lock() = Some(Arc::new(callback));
	}

	/// Watch the countdown
	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<TrackerState> {
		self.shared.state.subscribe()
	}

	/// The current countdown state
	#[must_use]
	pub fn state(&self) -> TrackerState { self.shared.state.borrow().clone() }

	/// Restore the persisted session
	///
	/// A session whose hold already lapsed is discarded and reported as
	/// expired without starting a countdown or firing the callback.
	///
	/// # Errors
	/// Errors if the store can not be read
	#[instrument(skip(self))]
	pub fn load(&self) -> Result<TrackerState, TrackerError> {
		self.stop_countdown();

		let Some(raw) = self.shared.store.get(SESSION_KEY)? else {
			self.shared.state.send_replace(TrackerState::default());

			return Ok(TrackerState::default());
		};

		let session = match serde_json::from_str::<ReservationSession>(&raw) {
			Ok(session) => session,
			Err(e) => {
				warn!("discarding unreadable reservation session -- {e}");

				self.shared.store.remove(SESSION_KEY)?;
				self.shared.state.send_replace(TrackerState::default());

				return Ok(TrackerState::default());
			},
		};

		self.activate(session)
	}

	/// Persist `session` and start counting down its hold
	///
	/// A session without an expiry gets the default hold window from now.
	///
	/// # Errors
	/// Errors if the session can not be persisted
	#[instrument(skip(self))]
	pub fn save_reservation(
		&self,
		mut session: ReservationSession,
	) -> Result<TrackerState, TrackerError> {
		self.stop_countdown();

		let now = self.clock.now();
		session.expires_at.get_or_insert(now + self.hold_window);

		self.persist(&session)?;

		self.activate(session)
	}

	/// Forget the held session
	///
	/// Local state is always cleared first. With `notify_server` set the
	/// booking is cancelled on the server too and a failure doing so is
	/// returned without restoring anything.
	///
	/// # Errors
	/// Errors if the store can not be written or the server rejects the
	/// cancellation
	#[instrument(skip(self))]
	pub async fn clear_reservation(
		&self,
		notify_server: bool,
	) -> Result<(), TrackerError> {
		self.stop_countdown();

		let previous = self.shared.state.send_replace(TrackerState::default());
		let removed = self.shared.store.remove(SESSION_KEY);

		if let Some(session) = previous.session.filter(|_| notify_server) {
			self.api.cancel_reservation(session.booking_id).await?;

			info!("cancelled booking {}", session.booking_id);
		}

		Ok(removed?)
	}

	/// Push the expiry of the held session to `minutes` from now
	///
	/// Does nothing when no session is held.
	///
	/// # Errors
	/// Errors if the session can not be persisted
	#[instrument(skip(self))]
	pub fn extend_reservation(&self, minutes: i64) -> Result<(), TrackerError> {
		let Some(mut session) = self.state().session else {
			return Ok(());
		};

		self.stop_countdown();

		session.expires_at = Some(self.clock.now() + TimeDelta::minutes(minutes));

		self.persist(&session)?;
		self.activate(session)?;

		Ok(())
	}

	fn persist(&self, session: &ReservationSession) -> Result<(), TrackerError> {
		let raw = serde_json::to_string(session)?;

		Ok(self.shared.store.set(SESSION_KEY, raw)?)
	}

	/// Publish `session` and count down whatever is left of its hold
	fn activate(
		&self,
		session: ReservationSession,
	) -> Result<TrackerState, TrackerError> {
		let now = self.clock.now();

		let remaining = session
			.expires_at
			.filter(|expires_at| *expires_at > now)
			.map(|expires_at| (expires_at - now).num_seconds())
			.and_then(|seconds| u64::try_from(seconds).ok())
			.filter(|seconds| *seconds > 0);

		let Some(remaining) = remaining else {
			debug!("reservation session {} already lapsed", session.booking_id);

			self.shared.store.remove(SESSION_KEY)?;

			let state = TrackerState {
				session:        None,
				time_remaining: 0,
				is_expired:     true,
			};
			self.shared.state.send_replace(state.clone());

			return Ok(state);
		};

		let state = TrackerState {
			session:        Some(session),
			time_remaining: remaining,
			is_expired:     false,
		};
		self.shared.state.send_replace(state.clone());

		self.start_countdown();

		Ok(state)
	}

	fn start_countdown(&self) {
		let shared = self.shared.clone();
		let generation = shared.next_generation();

		let handle = tokio::spawn(async move {
			let mut interval = tokio::time::interval(Duration::from_secs(1));

			// The first tick completes immediately
			interval.tick().await;

			loop {
				interval.tick().await;

				if !shared.step(generation) {
					break;
				}
			}
		});

		if let Some(previous) = self.countdown.lock().replace(handle) {
			previous.abort();
		}
	}

	fn stop_countdown(&self) {
		self.shared.next_generation();

		if let Some(handle) = self.countdown.lock().take() {
			handle.abort();
		}
	}
}

impl<S, A> Drop for ReservationTracker<S, A> {
	fn drop(&mut self) {
		if let Some(handle) = self.countdown.lock().take() {
			handle.abort();
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use chrono::NaiveDate;
	use lifecycle::ManualClock;

	use super::*;
	use crate::{ApiErrorKind, AvailableSlot, MemoryStore, Reservation};

	#[derive(Default)]
	struct MockApi {
		cancelled: Mutex<Vec<Uuid>>,
		fail:      bool,
	}

	impl BookingApi for MockApi {
		async fn available_slots(
			&self,
			_date: NaiveDate,
		) -> Result<Vec<AvailableSlot>, ApiError> {
			Ok(vec![])
		}

		async fn reserve(
			&self,
			_reservation: &Reservation,
		) -> Result<BookingDetails, ApiError> {
			Err(ApiError::network("not mocked"))
		}

		async fn confirm_reservation(
			&self,
			_booking_id: Uuid,
		) -> Result<BookingDetails, ApiError> {
			Err(ApiError::network("not mocked"))
		}

		async fn cancel_reservation(
			&self,
			booking_id: Uuid,
		) -> Result<BookingDetails, ApiError> {
			self.cancelled.lock().push(booking_id);

			if self.fail {
				return Err(ApiError::network("connection refused"));
			}

			Ok(details(booking_id))
		}
	}

	fn details(id: Uuid) -> BookingDetails {
		BookingDetails {
			id,
			profile_id: 1,
			date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
			time_slot: "09:00 - 10:00".to_string(),
			group_size: 5,
			deposit: 2500,
			status: db::BookingStatus::Cancelled,
			expires_at: None,
		}
	}

	fn now() -> NaiveDateTime {
		NaiveDate::from_ymd_opt(2025, 3, 19)
			.unwrap()
			.and_hms_opt(18, 0, 0)
			.unwrap()
	}

	fn session(expires_at: Option<NaiveDateTime>) -> ReservationSession {
		ReservationSession {
			booking_id: Uuid::new_v4(),
			expires_at,
			group_size: 5,
			date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
			time_slot: "09:00 - 10:00".to_string(),
			deposit: 2500,
		}
	}

	fn tracker(api: MockApi) -> ReservationTracker<MemoryStore, MockApi> {
		let clock = Arc::new(ManualClock::new(now()));

		ReservationTracker::new(MemoryStore::new(), api, clock)
	}

	fn stored(
		tracker: &ReservationTracker<MemoryStore, MockApi>,
	) -> Option<String> {
		tracker.shared.store.get(SESSION_KEY).unwrap()
	}

	fn expiry_counter(
		tracker: &ReservationTracker<MemoryStore, MockApi>,
	) -> Arc<AtomicUsize> {
		let fired = Arc::new(AtomicUsize::new(0));
		let counter = fired.clone();

		tracker.on_expired(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		fired
	}

	#[tokio::test(start_paused = true)]
	async fn load_discards_lapsed_session() {
		let tracker = tracker(MockApi::default());
		let fired = expiry_counter(&tracker);

		let lapsed = session(Some(now() - TimeDelta::minutes(5)));
		tracker
			.shared
			.store
			.set(SESSION_KEY, serde_json::to_string(&lapsed).unwrap())
			.unwrap();

		let state = tracker.load().unwrap();

		assert!(state.is_expired);
		assert_eq!(state.session, None);
		assert_eq!(state.time_remaining, 0);
		assert_eq!(stored(&tracker), None);
		assert!(tracker.countdown.lock().is_none());
		assert_eq!(fired.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn load_without_session() {
		let tracker = tracker(MockApi::default());

		assert_eq!(tracker.load().unwrap(), TrackerState::default());
	}

	#[tokio::test(start_paused = true)]
	async fn load_resumes_countdown() {
		let tracker = tracker(MockApi::default());

		let held = session(Some(
			now() + TimeDelta::seconds(90) + TimeDelta::milliseconds(500),
		));
		tracker
			.shared
			.store
			.set(SESSION_KEY, serde_json::to_string(&held).unwrap())
			.unwrap();

		let state = tracker.load().unwrap();

		assert!(!state.is_expired);
		assert_eq!(state.time_remaining, 90);
		assert_eq!(state.session, Some(held));

		tokio::time::sleep(Duration::from_millis(30_500)).await;

		assert_eq!(tracker.state().time_remaining, 60);
	}

	#[tokio::test(start_paused = true)]
	async fn countdown_expires_once() {
		let tracker = tracker(MockApi::default());
		let fired = expiry_counter(&tracker);

		tracker
			.save_reservation(session(Some(now() + TimeDelta::seconds(3))))
			.unwrap();

		tokio::time::sleep(Duration::from_millis(3_500)).await;

		let state = tracker.state();
		assert!(state.is_expired);
		assert_eq!(state.session, None);
		assert_eq!(stored(&tracker), None);
		assert_eq!(fired.load(Ordering::SeqCst), 1);

		tokio::time::sleep(Duration::from_secs(10)).await;

		assert_eq!(fired.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn replaced_countdown_leaves_new_session_alone() {
		let tracker = tracker(MockApi::default());
		let fired = expiry_counter(&tracker);

		tracker
			.save_reservation(session(Some(now() + TimeDelta::seconds(1))))
			.unwrap();
		let replaced = *tracker.shared.generation.lock();

		let held = session(Some(now() + TimeDelta::seconds(1)));
		tracker.save_reservation(held.clone()).unwrap();

		// Last step of the replaced countdown, running after the new save
		assert!(!tracker.shared.step(replaced));

		let state = tracker.state();
		assert_eq!(state.session, Some(held));
		assert_eq!(state.time_remaining, 1);
		assert!(!state.is_expired);
		assert!(stored(&tracker).is_some());
		assert_eq!(fired.load(Ordering::SeqCst), 0);

		let current = *tracker.shared.generation.lock();
		assert!(!tracker.shared.step(current));

		assert!(tracker.state().is_expired);
		assert_eq!(stored(&tracker), None);
		assert_eq!(fired.load(Ordering::SeqCst), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn save_fills_in_hold_window() {
		let tracker = tracker(MockApi::default());

		let state = tracker.save_reservation(session(None)).unwrap();

		assert_eq!(state.time_remaining, 15 * 60);

		let persisted: ReservationSession =
			serde_json::from_str(&stored(&tracker).unwrap()).unwrap();
		assert_eq!(persisted.expires_at, Some(now() + TimeDelta::minutes(15)));
	}

	#[tokio::test(start_paused = true)]
	async fn clear_notifies_server() {
		let tracker = tracker(MockApi::default());

		let held = session(None);
		tracker.save_reservation(held.clone()).unwrap();

		tracker.clear_reservation(true).await.unwrap();

		assert_eq!(tracker.state(), TrackerState::default());
		assert_eq!(stored(&tracker), None);
		assert_eq!(*tracker.api.cancelled.lock(), vec![held.booking_id]);
	}

	#[tokio::test(start_paused = true)]
	async fn clear_locally_only() {
		let tracker = tracker(MockApi::default());

		tracker.save_reservation(session(None)).unwrap();
		tracker.clear_reservation(false).await.unwrap();

		assert_eq!(stored(&tracker), None);
		assert!(tracker.api.cancelled.lock().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn failed_cancel_keeps_local_state_cleared() {
		let tracker = tracker(MockApi { fail: true, ..Default::default() });
		let fired = expiry_counter(&tracker);

		tracker.save_reservation(session(None)).unwrap();

		let err = tracker.clear_reservation(true).await.unwrap_err();

		assert!(matches!(
			err,
			TrackerError::Api(ApiError { kind: ApiErrorKind::Network, .. })
		));
		assert_eq!(tracker.state(), TrackerState::default());
		assert_eq!(stored(&tracker), None);

		tokio::time::sleep(Duration::from_secs(20 * 60)).await;

		assert_eq!(fired.load(Ordering::SeqCst), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn extend_without_session_is_noop() {
		let tracker = tracker(MockApi::default());

		tracker.extend_reservation(10).unwrap();

		assert_eq!(tracker.state(), TrackerState::default());
		assert_eq!(stored(&tracker), None);
	}

	#[tokio::test(start_paused = true)]
	async fn extend_restarts_countdown() {
		let tracker = tracker(MockApi::default());

		tracker
			.save_reservation(session(Some(now() + TimeDelta::minutes(1))))
			.unwrap();

		tracker.extend_reservation(10).unwrap();

		let state = tracker.state();
		assert_eq!(state.time_remaining, 600);

		let persisted: ReservationSession =
			serde_json::from_str(&stored(&tracker).unwrap()).unwrap();
		assert_eq!(persisted.expires_at, Some(now() + TimeDelta::minutes(10)));

		// The old one minute countdown must not fire anymore
		tokio::time::sleep(Duration::from_secs(90)).await;
		assert!(!tracker.state().is_expired);
	}

	#[tokio::test(start_paused = true)]
	async fn subscribers_see_updates() {
		let tracker = tracker(MockApi::default());
		let mut rx = tracker.subscribe();

		tracker.save_reservation(session(None)).unwrap();

		rx.changed().await.unwrap();
		assert_eq!(rx.borrow_and_update().time_remaining, 15 * 60);

		rx.changed().await.unwrap();
		assert_eq!(rx.borrow_and_update().time_remaining, 15 * 60 - 1);
	}
}
