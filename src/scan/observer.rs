use super::TrialRecord;

/// Receives every [`TrialRecord`] as soon as its trial completes,
/// e.g. to report progress.
///
/// Implemented for `()` (ignore all trials) and for any `FnMut(&TrialRecord)`.
pub trait TrialObserver {
    /// Called once per completed trial, in arrival order.
    fn on_trial(&mut self, record: &TrialRecord);
}

impl TrialObserver for () {
    fn on_trial(&mut self, _record: &TrialRecord) {}
}

impl<F> TrialObserver for F
where
    F: FnMut(&TrialRecord),
{
    fn on_trial(&mut self, record: &TrialRecord) {
        (self)(record)
    }
}
