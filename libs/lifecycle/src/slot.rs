use chrono::NaiveDate;

use crate::InputError;

pub const MIN_GROUP_SIZE: i32 = 1;
pub const MAX_GROUP_SIZE: i32 = 50;

pub const DEFAULT_TIME_SLOTS: [&str; 6] = [
	"09:00 - 10:00",
	"10:00 - 11:00",
	"11:00 - 12:00",
	"13:00 - 14:00",
	"14:00 - 15:00",
	"15:00 - 16:00",
];

/// Number of visitors in a single booking, always within
/// [`MIN_GROUP_SIZE`]..=[`MAX_GROUP_SIZE`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupSize(i32);

impl GroupSize {
	#[must_use]
	pub fn get(self) -> i32 { self.0 }
}

impl TryFrom<i32> for GroupSize {
	type Error = InputError;

	fn try_from(value: i32) -> Result<Self, Self::Error> {
		if (MIN_GROUP_SIZE..=MAX_GROUP_SIZE).contains(&value) {
			Ok(Self(value))
		} else {
			Err(InputError::GroupSize(value))
		}
	}
}

/// The ordered set of tour time slots offered every day
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotCatalogue {
	slots: Vec<String>,
}

impl Default for SlotCatalogue {
	fn default() -> Self { Self::new(DEFAULT_TIME_SLOTS) }
}

impl SlotCatalogue {
	/// Build a catalogue from slot labels, dropping blanks and repeats while
	/// keeping the original order
	pub fn new<I, S>(slots: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut labels: Vec<String> = vec![];

		for slot in slots {
			let slot = slot.into().trim().to_string();

			if !slot.is_empty() && !labels.contains(&slot) {
				labels.push(slot);
			}
		}

		Self { slots: labels }
	}

	/// Parse a comma separated list of slot labels
	#[must_use]
	pub fn parse(list: &str) -> Self { Self::new(list.split(',')) }

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.slots.iter().map(String::as_str)
	}

	#[must_use]
	pub fn len(&self) -> usize { self.slots.len() }

	#[must_use]
	pub fn is_empty(&self) -> bool { self.slots.is_empty() }

	#[must_use]
	pub fn contains(&self, slot: &str) -> bool {
		self.slots.iter().any(|s| s == slot)
	}

	/// Look up a slot label, surrounding whitespace is ignored
	///
	/// # Errors
	/// Fails if the label is not part of this catalogue
	pub fn resolve(&self, slot: &str) -> Result<&str, InputError> {
		let trimmed = slot.trim();

		self.slots
			.iter()
			.find(|s| *s == trimmed)
			.map(String::as_str)
			.ok_or_else(|| InputError::UnknownTimeSlot(slot.to_string()))
	}
}

/// Make sure `date` can still be reserved on `today`
///
/// # Errors
/// Fails if `date` lies before `today`
pub fn check_reservable_date(
	date: NaiveDate,
	today: NaiveDate,
) -> Result<(), InputError> {
	if date < today {
		return Err(InputError::DateInPast(date));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn group_size_bounds() {
		assert_eq!(GroupSize::try_from(0), Err(InputError::GroupSize(0)));
		assert_eq!(GroupSize::try_from(51), Err(InputError::GroupSize(51)));
		assert_eq!(GroupSize::try_from(1).map(GroupSize::get), Ok(1));
		assert_eq!(GroupSize::try_from(50).map(GroupSize::get), Ok(50));
	}

	#[test]
	fn parse_catalogue_keeps_order_and_drops_noise() {
		let catalogue =
			SlotCatalogue::parse(" 10:00 - 11:00,09:00 - 10:00,,10:00 - 11:00");

		assert_eq!(catalogue.iter().collect::<Vec<_>>(), [
			"10:00 - 11:00",
			"09:00 - 10:00"
		]);
	}

	#[test]
	fn resolve_unknown_slot() {
		let catalogue = SlotCatalogue::default();

		assert_eq!(catalogue.resolve(" 09:00 - 10:00 "), Ok("09:00 - 10:00"));
		assert_eq!(
			catalogue.resolve("08:00 - 09:00"),
			Err(InputError::UnknownTimeSlot("08:00 - 09:00".to_string()))
		);
	}

	#[test]
	fn past_dates_are_not_reservable() {
		let today = NaiveDate::from_ymd_opt(2025, 3, 20).unwrap();

		assert!(check_reservable_date(today, today).is_ok());
		assert!(check_reservable_date(today.succ_opt().unwrap(), today).is_ok());
		assert_eq!(
			check_reservable_date(today.pred_opt().unwrap(), today),
			Err(InputError::DateInPast(today.pred_opt().unwrap()))
		);
	}
}
