//! Grid cursor, range selection, and edit-buffer lifecycle.
//!
//! Headless state machine: the UI feeds it clicks and keystrokes, it hands
//! back commit requests. The controller never writes cells itself — a
//! committed buffer goes through `Cell::apply_manual_edit` at the call site.

use serde::{Deserialize, Serialize};

/// Where the cursor moves after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMove {
    /// Enter: one row down.
    Down,
    /// Tab: one column right.
    Right,
    /// Shift+Tab: one column left.
    Left,
    /// Focus loss: stay put.
    None,
}

/// A committed edit buffer, ready to be applied to the cell at (row, col).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub row: usize,
    pub col: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionState {
    Idle,
    Selected {
        row: usize,
        col: usize,
    },
    /// Rectangular span between a fixed anchor and a moving cursor.
    Range {
        anchor: (usize, usize),
        cursor: (usize, usize),
    },
    Editing {
        row: usize,
        col: usize,
        buffer: String,
    },
}

/// Selection controller for a rows × cols grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    state: SelectionState,
    rows: usize,
    cols: usize,
    /// Active while previewing a version: editing and commits are inert,
    /// navigation stays live.
    read_only: bool,
}

impl Selection {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            state: SelectionState::Idle,
            rows,
            cols,
            read_only: false,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Enter/leave read-only mode. An in-progress edit is discarded on
    /// entry: preview must not commit anything.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
        if read_only {
            if let SelectionState::Editing { row, col, .. } = self.state {
                self.state = SelectionState::Selected { row, col };
            }
        }
    }

    /// Re-clamp after the grid changes shape (rows added/removed, preset
    /// applied). An empty grid collapses to Idle.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        if rows == 0 || cols == 0 {
            self.state = SelectionState::Idle;
            return;
        }
        self.state = match std::mem::replace(&mut self.state, SelectionState::Idle) {
            SelectionState::Idle => SelectionState::Idle,
            SelectionState::Selected { row, col } => {
                let (row, col) = self.clamp(row, col);
                SelectionState::Selected { row, col }
            }
            SelectionState::Range { anchor, cursor } => SelectionState::Range {
                anchor: self.clamp(anchor.0, anchor.1),
                cursor: self.clamp(cursor.0, cursor.1),
            },
            SelectionState::Editing { row, col, buffer } => {
                let (row, col) = self.clamp(row, col);
                SelectionState::Editing { row, col, buffer }
            }
        };
    }

    // =========================================================================
    // Mouse
    // =========================================================================

    /// Plain click: select the cell and reset the anchor to it. Clicking
    /// the already-selected cell deselects. A click while editing commits
    /// first (focus loss) and the commit request is returned.
    pub fn click(&mut self, row: usize, col: usize) -> Option<CommitRequest> {
        let commit = self.take_commit();
        let (row, col) = match self.clamp_checked(row, col) {
            Some(pos) => pos,
            None => return commit,
        };
        self.state = match &self.state {
            SelectionState::Selected { row: r, col: c } if *r == row && *c == col => {
                SelectionState::Idle
            }
            _ => SelectionState::Selected { row, col },
        };
        commit
    }

    /// Shift-click: rectangular range from the current anchor to the
    /// clicked cell. Without an anchor this is a plain click.
    pub fn shift_click(&mut self, row: usize, col: usize) -> Option<CommitRequest> {
        let (row, col) = match self.clamp_checked(row, col) {
            Some(pos) => pos,
            None => return None,
        };
        match &self.state {
            SelectionState::Selected { row: r, col: c } => {
                self.state = SelectionState::Range {
                    anchor: (*r, *c),
                    cursor: (row, col),
                };
                None
            }
            SelectionState::Range { anchor, .. } => {
                self.state = SelectionState::Range {
                    anchor: *anchor,
                    cursor: (row, col),
                };
                None
            }
            _ => self.click(row, col),
        }
    }

    // =========================================================================
    // Keyboard navigation
    // =========================================================================

    /// Arrow key: move the selection, clamped at grid edges (no wraparound).
    /// The anchor follows; a range collapses to its cursor's new position.
    pub fn arrow(&mut self, dr: i32, dc: i32) {
        if self.rows == 0 || self.cols == 0 {
            return;
        }
        match &self.state {
            SelectionState::Idle => {
                self.state = SelectionState::Selected { row: 0, col: 0 };
            }
            SelectionState::Selected { row, col } => {
                let (row, col) = self.step(*row, *col, dr, dc);
                self.state = SelectionState::Selected { row, col };
            }
            SelectionState::Range { cursor, .. } => {
                let (row, col) = self.step(cursor.0, cursor.1, dr, dc);
                self.state = SelectionState::Selected { row, col };
            }
            SelectionState::Editing { .. } => {} // arrows move the text caret, not the grid
        }
    }

    /// Shift+arrow: grow/shrink the range from the fixed anchor.
    pub fn shift_arrow(&mut self, dr: i32, dc: i32) {
        if self.rows == 0 || self.cols == 0 {
            return;
        }
        match &self.state {
            SelectionState::Selected { row, col } => {
                let anchor = (*row, *col);
                let cursor = self.step(*row, *col, dr, dc);
                self.state = SelectionState::Range { anchor, cursor };
            }
            SelectionState::Range { anchor, cursor } => {
                let anchor = *anchor;
                let cursor = self.step(cursor.0, cursor.1, dr, dc);
                self.state = SelectionState::Range { anchor, cursor };
            }
            _ => {}
        }
    }

    /// Normalized bounds of the current selection:
    /// (min_row, min_col, max_row, max_col). Independent min/max per axis,
    /// so the rectangle is the same regardless of drag direction.
    pub fn range_bounds(&self) -> Option<(usize, usize, usize, usize)> {
        match &self.state {
            SelectionState::Selected { row, col } | SelectionState::Editing { row, col, .. } => {
                Some((*row, *col, *row, *col))
            }
            SelectionState::Range { anchor, cursor } => Some((
                anchor.0.min(cursor.0),
                anchor.1.min(cursor.1),
                anchor.0.max(cursor.0),
                anchor.1.max(cursor.1),
            )),
            SelectionState::Idle => None,
        }
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Enter/F2: start editing the selected cell, buffer seeded from the
    /// current value. Inert in read-only mode.
    pub fn begin_edit(&mut self, seed: &str) {
        if self.read_only {
            return;
        }
        if let SelectionState::Selected { row, col } = self.state {
            self.state = SelectionState::Editing {
                row,
                col,
                buffer: seed.to_string(),
            };
        }
    }

    /// A printable character on a selected cell starts editing with the
    /// character as the buffer; while editing it appends.
    pub fn type_char(&mut self, ch: char) {
        if self.read_only {
            return;
        }
        match &mut self.state {
            SelectionState::Selected { row, col } => {
                self.state = SelectionState::Editing {
                    row: *row,
                    col: *col,
                    buffer: ch.to_string(),
                };
            }
            SelectionState::Editing { buffer, .. } => buffer.push(ch),
            _ => {}
        }
    }

    /// Commit the edit buffer and move per `mv`. Returns the request for
    /// the caller to apply via `apply_manual_edit`. None when not editing.
    pub fn commit(&mut self, mv: CommitMove) -> Option<CommitRequest> {
        let request = self.take_commit()?;
        let (dr, dc) = match mv {
            CommitMove::Down => (1, 0),
            CommitMove::Right => (0, 1),
            CommitMove::Left => (0, -1),
            CommitMove::None => (0, 0),
        };
        let (row, col) = self.step(request.row, request.col, dr, dc);
        self.state = SelectionState::Selected { row, col };
        Some(request)
    }

    /// Escape: discard the buffer, back to Selected. The only path that
    /// silently drops an edit.
    pub fn cancel(&mut self) {
        if let SelectionState::Editing { row, col, .. } = self.state {
            self.state = SelectionState::Selected { row, col };
        }
    }

    /// Focus left the editor: commit in place.
    pub fn focus_lost(&mut self) -> Option<CommitRequest> {
        self.commit(CommitMove::None)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn take_commit(&mut self) -> Option<CommitRequest> {
        if self.read_only {
            return None;
        }
        if let SelectionState::Editing { row, col, buffer } = &self.state {
            let request = CommitRequest {
                row: *row,
                col: *col,
                text: buffer.clone(),
            };
            self.state = SelectionState::Selected {
                row: request.row,
                col: request.col,
            };
            Some(request)
        } else {
            None
        }
    }

    fn step(&self, row: usize, col: usize, dr: i32, dc: i32) -> (usize, usize) {
        let row = (row as i32 + dr).max(0).min(self.rows as i32 - 1) as usize;
        let col = (col as i32 + dc).max(0).min(self.cols as i32 - 1) as usize;
        (row, col)
    }

    fn clamp(&self, row: usize, col: usize) -> (usize, usize) {
        (row.min(self.rows - 1), col.min(self.cols - 1))
    }

    fn clamp_checked(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        if self.rows == 0 || self.cols == 0 {
            None
        } else {
            Some(self.clamp(row, col))
        }
    }
}
