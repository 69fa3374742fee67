//! The gallery client's three-stage progressive image reveal, as a pure
//! reducer.
//!
//! Each gallery item renders its micro-thumbnail immediately, starts loading
//! the low-res preview once the item becomes visible, and swaps the preview
//! in only after its bytes have fully loaded. The browser supplies two
//! events (a viewport-intersection callback and the image load event); this
//! module owns the ordering rules so they are testable without a viewport:
//!
//! - the viewport observation is one-shot per item,
//! - the preview is never shown before its load event,
//! - no transition ever reverts to an earlier stage.

/// Fraction of the item's area that must be visible before the low-res load
/// starts.
pub const VISIBILITY_THRESHOLD: f32 = 0.1;

/// Reveal stage of a single gallery item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
	/// Only the micro-thumbnail is rendered.
	#[default]
	Placeholder,
	/// The item became visible; the low-res preview is loading but hidden.
	LowResLoading,
	/// Terminal: the loaded preview is layered above the thumbnail.
	LowResVisible,
}

/// External events driving the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
	/// The item's container intersects the viewport at or above
	/// [`VISIBILITY_THRESHOLD`].
	ViewportEntered,
	/// The low-res image's bytes finished loading.
	LowResLoaded,
}

/// Side effect the host should perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
	/// Insert the (hidden) low-res `<img>` so its load event can fire.
	StartLowResLoad,
	/// Show the loaded low-res image above the placeholder.
	ShowLowRes,
}

impl Stage {
	/// Advance the reducer. Late, repeated or out-of-order events are
	/// no-ops; the stage never moves backwards.
	#[must_use]
	pub fn apply(self, event: Event) -> (Self, Option<Action>) {
		match (self, event) {
			(Self::Placeholder, Event::ViewportEntered) => {
				(Self::LowResLoading, Some(Action::StartLowResLoad))
			}
			(Self::LowResLoading, Event::LowResLoaded) => {
				(Self::LowResVisible, Some(Action::ShowLowRes))
			}
			(stage, _) => (stage, None),
		}
	}

	/// Whether the item still observes the viewport. The observation is
	/// torn down after its first hit.
	pub fn observes_viewport(self) -> bool {
		self == Self::Placeholder
	}

	/// Whether the low-res preview is shown.
	pub fn shows_low_res(self) -> bool {
		self == Self::LowResVisible
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn preview_stays_hidden_until_its_load_event() {
		// Intersection at t=0, load completes at t=100.
		let (stage, action) = Stage::Placeholder.apply(Event::ViewportEntered);
		assert_eq!(stage, Stage::LowResLoading);
		assert_eq!(action, Some(Action::StartLowResLoad));
		assert!(!stage.shows_low_res());

		let (stage, action) = stage.apply(Event::LowResLoaded);
		assert_eq!(stage, Stage::LowResVisible);
		assert_eq!(action, Some(Action::ShowLowRes));
		assert!(stage.shows_low_res());
	}

	#[test]
	fn viewport_observation_is_one_shot() {
		assert!(Stage::Placeholder.observes_viewport());

		let (stage, _) = Stage::Placeholder.apply(Event::ViewportEntered);
		assert!(!stage.observes_viewport());

		// Re-entering the viewport does nothing further.
		let (again, action) = stage.apply(Event::ViewportEntered);
		assert_eq!(again, stage);
		assert_eq!(action, None);
	}

	#[test]
	fn load_event_before_visibility_is_ignored() {
		let (stage, action) = Stage::Placeholder.apply(Event::LowResLoaded);
		assert_eq!(stage, Stage::Placeholder);
		assert_eq!(action, None);
	}

	#[test]
	fn terminal_stage_never_regresses() {
		for event in [Event::ViewportEntered, Event::LowResLoaded] {
			let (stage, action) = Stage::LowResVisible.apply(event);
			assert_eq!(stage, Stage::LowResVisible);
			assert_eq!(action, None);
		}
	}
}
