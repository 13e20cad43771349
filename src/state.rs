//! # State word
//!
//! The whole lock lives in one `u32`, partitioned into three fields:
//!
//! | Field            | Bits    | Mask           |
//! |------------------|---------|----------------|
//! | exclusive        | 31      | [`EXCLUSIVE`]      |
//! | writer pending   | 30      | [`WRITER_PENDING`] |
//! | reader count     | 29..=0  | [`READER_MASK`]    |
//!
//! The raw lock only ever touches the word through atomics; [`State`] is the
//! decoded view the state machine reasons over, so no operation has to do
//! bit arithmetic inline.
//!
//! ```rust
//! use rw_spinlock::state::{State, WRITER_PENDING};
//!
//! let st = State::decode(WRITER_PENDING | 3);
//! assert!(st.writer_pending);
//! assert_eq!(st.readers, 3);
//! assert_eq!(st.encode(), WRITER_PENDING | 3);
//! ```

/// Set while a writer holds the lock.
pub const EXCLUSIVE: u32 = 1 << 31;

/// Set by a spinning writer so that new readers back off.
pub const WRITER_PENDING: u32 = 1 << 30;

/// Low bits holding the number of shared holders.
pub const READER_MASK: u32 = WRITER_PENDING - 1;

/// Largest reader count the field can hold. A shared acquisition that would
/// go past it is refused as if the lock were held exclusively.
pub const MAX_READERS: u32 = READER_MASK;

/// The unique free word: no reader, no writer, no pending writer.
pub const FREE: u32 = 0;

/// Decoded view of the lock word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct State {
    pub exclusive: bool,
    pub writer_pending: bool,
    pub readers: u32,
}

impl State {
    /// The free state.
    pub const FREE: State = State {
        exclusive: false,
        writer_pending: false,
        readers: 0,
    };

    /// Splits a raw word into its fields.
    #[inline(always)]
    pub const fn decode(word: u32) -> Self {
        State {
            exclusive: word & EXCLUSIVE != 0,
            writer_pending: word & WRITER_PENDING != 0,
            readers: word & READER_MASK,
        }
    }

    /// Packs the fields back into a raw word.
    ///
    /// `readers` is truncated to the width of its field.
    #[inline(always)]
    pub const fn encode(self) -> u32 {
        let mut word = self.readers & READER_MASK;
        if self.exclusive {
            word |= EXCLUSIVE;
        }
        if self.writer_pending {
            word |= WRITER_PENDING;
        }
        word
    }

    /// `true` for the all-zero word.
    #[inline(always)]
    pub const fn is_free(self) -> bool {
        !self.exclusive && !self.writer_pending && self.readers == 0
    }

    /// Whether a new reader may join from this state.
    ///
    /// Refused while a writer holds or waits for the lock, and when the
    /// reader field is saturated.
    #[inline(always)]
    pub const fn admits_reader(self) -> bool {
        !self.exclusive && !self.writer_pending && self.readers < MAX_READERS
    }

    /// Whether a writer may take the lock directly from this state.
    ///
    /// A lone pending flag does not block the writer; the swap to
    /// [`EXCLUSIVE`] clears it.
    #[inline(always)]
    pub const fn admits_writer(self) -> bool {
        !self.exclusive && self.readers == 0
    }

    /// This state with one more reader.
    #[inline(always)]
    pub const fn with_reader(self) -> Self {
        State {
            readers: self.readers + 1,
            ..self
        }
    }

    /// This state with the pending flag raised.
    #[inline(always)]
    pub const fn with_writer_pending(self) -> Self {
        State {
            writer_pending: true,
            ..self
        }
    }

    /// The exclusively held state.
    #[inline(always)]
    pub const fn exclusive() -> Self {
        State {
            exclusive: true,
            writer_pending: false,
            readers: 0,
        }
    }

    /// The state left behind when the last reader leaves while a writer waits.
    #[inline(always)]
    pub const fn drained_with_writer_pending() -> Self {
        State {
            exclusive: false,
            writer_pending: true,
            readers: 0,
        }
    }
}

impl From<u32> for State {
    #[inline(always)]
    fn from(word: u32) -> Self {
        State::decode(word)
    }
}

impl From<State> for u32 {
    #[inline(always)]
    fn from(state: State) -> Self {
        state.encode()
    }
}
