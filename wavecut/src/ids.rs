// Copyright 2023-2024 The Regents of the University of California
// Copyright 2024-2025 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use rustc_hash::FxHashMap;

const LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Number of characters following the leading letter.
const TAIL_LEN: u32 = 5;
const TAIL_CODES: u64 = 36u64.pow(TAIL_LEN);
/// Total number of distinct codes.
pub const MAX_IDS: u64 = 26 * TAIL_CODES;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    #[error("[ids] all {MAX_IDS} identifier codes are in use")]
    Exhausted,
}

/// Hands out short identifier codes for the re-encoded output.
///
/// Codes are six characters: an upper case letter followed by five upper case letters or
/// digits. The same reference always gets the same code within one allocator, and no two
/// references share a code. One allocator is owned by one run, so all files written by that
/// run agree on the codes.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    assigned: FxHashMap<String, String>,
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, reference: &str) -> Result<String, IdError> {
        if let Some(id) = self.assigned.get(reference) {
            return Ok(id.clone());
        }
        let id = code(self.next).ok_or(IdError::Exhausted)?;
        self.next += 1;
        self.assigned.insert(reference.to_string(), id.clone());
        Ok(id)
    }

    pub fn get(&self, reference: &str) -> Option<&str> {
        self.assigned.get(reference).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

fn code(index: u64) -> Option<String> {
    if index >= MAX_IDS {
        return None;
    }
    let mut out = [0u8; 1 + TAIL_LEN as usize];
    out[0] = LETTERS[(index / TAIL_CODES) as usize];
    let mut rest = index % TAIL_CODES;
    for c in out[1..].iter_mut().rev() {
        *c = ALPHANUMERIC[(rest % 36) as usize];
        rest /= 36;
    }
    Some(out.iter().map(|&c| c as char).collect())
}
