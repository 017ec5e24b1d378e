use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::effects::response::Response;
use crate::effects::response_factory::ResponseFactory;

/// An ordered queue of canned responses.
///
/// Every `push_*` call appends `times` copies of its response; `times == 0` appends
/// nothing. [`ResponseSequence::get_next`] hands the entries out in order, then the
/// [`when_empty`](ResponseSequence::when_empty) fallback forever, or `None` when no
/// fallback was set.
///
/// The cursor only moves forward and is advanced under a lock, so concurrent callers
/// never receive the same entry.
///
/// # Examples
///
/// ```
/// use courier_http::ResponseSequence;
///
/// let sequence = ResponseSequence::new();
/// sequence.push_status(500, 2).push_string("done", 200, 1);
///
/// assert!(sequence.get_next().unwrap().server_error());
/// assert!(sequence.get_next().unwrap().server_error());
/// assert!(sequence.get_next().unwrap().ok());
/// assert!(sequence.get_next().is_none());
/// ```
#[derive(Debug, Default)]
pub struct ResponseSequence {
    state:   Mutex<SequenceState>,
    factory: ResponseFactory,
}

#[derive(Debug, Default)]
struct SequenceState {
    responses:  Vec<Response>,
    cursor:     usize,
    when_empty: Option<Response>,
}

impl ResponseSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: Response, times: usize) -> &Self {
        let mut state = self.lock();
        state
            .responses
            .extend(std::iter::repeat_n(response, times));
        self
    }

    pub fn push_status(&self, status: u16, times: usize) -> &Self {
        self.push(self.factory.status(status), times)
    }

    pub fn push_string(&self, body: impl Into<String>, status: u16, times: usize) -> &Self {
        self.push(self.factory.string(body, status), times)
    }

    pub fn push_json<T: Serialize + ?Sized>(&self, value: &T, status: u16, times: usize) -> &Self {
        self.push(self.factory.json(value, status), times)
    }

    /// Response returned once every pushed entry has been handed out.
    pub fn when_empty(&self, response: Response) -> &Self {
        self.lock().when_empty = Some(response);
        self
    }

    pub fn get_next(&self) -> Option<Response> {
        let mut state = self.lock();
        match state.responses.get(state.cursor).cloned() {
            Some(response) => {
                state.cursor += 1;
                Some(response)
            }
            None => state.when_empty.clone(),
        }
    }

    /// Entries not handed out yet, the fallback excluded.
    pub fn remaining(&self) -> usize {
        let state = self.lock();
        state.responses.len() - state.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn lock(&self) -> MutexGuard<'_, SequenceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use reqwest::StatusCode;

    use super::*;

    fn statuses(sequence: &ResponseSequence, n: usize) -> Vec<Option<u16>> {
        (0..n)
            .map(|_| sequence.get_next().map(|r| r.status().as_u16()))
            .collect()
    }

    #[test]
    fn test_repeat_counts_expand_inline() {
        let sequence = ResponseSequence::new();
        sequence.push_status(500, 3).push_status(200, 1);

        assert_eq!(sequence.remaining(), 4);
        assert_eq!(
            statuses(&sequence, 5),
            vec![Some(500), Some(500), Some(500), Some(200), None]
        );
        assert!(sequence.is_exhausted());
    }

    #[test]
    fn test_when_empty_fallback() {
        let sequence = ResponseSequence::new();
        sequence
            .push_status(500, 3)
            .push_status(200, 1)
            .when_empty(ResponseFactory::new().status(429));

        assert_eq!(
            statuses(&sequence, 6),
            vec![Some(500), Some(500), Some(500), Some(200), Some(429), Some(429)]
        );
    }

    #[test]
    fn test_zero_times_pushes_nothing() {
        let sequence = ResponseSequence::new();
        sequence.push_status(500, 0);
        assert!(sequence.is_exhausted());
        assert!(sequence.get_next().is_none());
    }

    #[test]
    fn test_cursor_never_rewinds() {
        let sequence = ResponseSequence::new();
        sequence.push_status(201, 1);
        assert_eq!(statuses(&sequence, 2), vec![Some(201), None]);

        // Entries pushed after exhaustion are still served in order.
        sequence.push_status(202, 1);
        assert_eq!(statuses(&sequence, 2), vec![Some(202), None]);
    }

    #[tokio::test]
    async fn test_push_string_and_json() {
        let sequence = ResponseSequence::new();
        sequence
            .push_string("first", 200, 1)
            .push_json(&serde_json::json!({"n": 2}), 201, 1);

        assert_eq!(sequence.get_next().unwrap().text().await.unwrap(), "first");
        let second = sequence.get_next().unwrap();
        assert_eq!(second.status(), StatusCode::CREATED);
        assert_eq!(second.json().await.unwrap()["n"], 2);
    }

    #[test]
    fn test_concurrent_callers_get_distinct_entries() {
        let sequence = Arc::new(ResponseSequence::new());
        for code in 200..264 {
            sequence.push_status(code, 1);
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sequence = sequence.clone();
                std::thread::spawn(move || {
                    (0..8)
                        .filter_map(|_| sequence.get_next())
                        .map(|r| r.status().as_u16())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let seen: Vec<u16> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let unique: HashSet<u16> = seen.iter().copied().collect();
        assert_eq!(seen.len(), 64);
        assert_eq!(unique.len(), 64);
    }
}
