//! Initial scroll position for a freshly opened collection.

/// Where a view should open after the first load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAnchor {
    /// No unread entity within the scan limit. Open at the most recent.
    Latest,
    /// Open at the first unread entity.
    FirstUnread {
        /// Position of the entity in display order.
        index: usize,
        /// The anchor is close enough to the top that an older page should be
        /// requested immediately.
        prefetch_older: bool,
    },
}

impl ScrollAnchor {
    /// Anchor for a first unread position found at `index`.
    ///
    /// `index == 0` means the view is already at the anchor, so it opens at
    /// the latest entity.
    pub(crate) fn at(index: Option<usize>, scan_limit: usize, lookback_sections: usize) -> Self {
        match index {
            Some(index) if index > 0 && index < scan_limit => {
                Self::FirstUnread { index, prefetch_older: index <= lookback_sections }
            },
            _ => Self::Latest,
        }
    }

    /// Position to scroll to, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Latest => None,
            Self::FirstUnread { index, .. } => Some(*index),
        }
    }
}
