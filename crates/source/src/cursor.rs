use std::fmt;

/// Position in a resource's change stream, as reported by the server.
///
/// Zero is never stored: the server reports 0 when nothing has been
/// written yet, and echoing 0 back would make every read return at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cursor(u64);

impl Cursor {
	/// Smallest storable cursor.
	pub const MIN: Self = Self(1);

	/// Normalizes a raw server index. Returns the cursor and whether the raw
	/// value had to be raised to [`Cursor::MIN`].
	pub const fn from_index(index: u64) -> (Self, bool) {
		if index < 1 { (Self::MIN, true) } else { (Self(index), false) }
	}

	pub const fn get(self) -> u64 {
		self.0
	}

	/// Whether a response at `self` may replace the stored cursor.
	pub fn admits_over(self, stored: Option<Self>) -> bool {
		stored.is_none_or(|stored| self >= stored)
	}
}

impl fmt::Display for Cursor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}
