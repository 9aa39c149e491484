use uuid::Uuid;

use crate::store::{Dataset, TrimesterLock};

pub const TRIMESTERS: [u8; 3] = [1, 2, 3];

/// Absence of a lock record means locked. Callers never probe for record
/// absence themselves; this is the only read path.
pub fn is_unlocked(data: &Dataset, student_id: &str, trimester: u8) -> bool {
    data.trimester_locks
        .iter()
        .find(|l| l.student_id == student_id && l.trimester == trimester)
        .map(|l| l.unlocked)
        .unwrap_or(false)
}

/// Flips the (student, trimester) gate. The first toggle for a pair creates
/// the record already unlocked, so the sequence always starts from locked.
/// Returns the new state.
pub fn toggle(data: &mut Dataset, student_id: &str, trimester: u8) -> bool {
    if let Some(lock) = data
        .trimester_locks
        .iter_mut()
        .find(|l| l.student_id == student_id && l.trimester == trimester)
    {
        lock.unlocked = !lock.unlocked;
        return lock.unlocked;
    }
    data.trimester_locks.push(TrimesterLock {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        trimester,
        unlocked: true,
    });
    true
}

/// Lock state for all three trimesters, in trimester order.
pub fn status(data: &Dataset, student_id: &str) -> [bool; 3] {
    [
        is_unlocked(data, student_id, 1),
        is_unlocked(data, student_id, 2),
        is_unlocked(data, student_id, 3),
    ]
}
