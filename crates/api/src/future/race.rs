use super::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Complete with `on_first` applied to whichever input reaches its terminal
/// state first.
///
/// `on_first` is invoked exactly once. Inputs completing after the winner
/// are not dropped silently: cancellations are discarded, failures are
/// logged as short-circuited. Racing an empty set fails.
pub fn race<T, U, F>(results: Vec<AsyncResult<T>>, on_first: F) -> AsyncResult<U>
where
    T: ResultValue,
    U: ResultValue,
    F: FnOnce(AsyncResult<T>) -> VendResult<U> + 'static + Send,
{
    race_with_log(
        results,
        move |winner| on_first(AsyncResult::from_result(winner.clone())),
        log_short_circuited,
    )
}

/// Complete with the outcome of whichever input completes first.
pub fn first_of<T: ResultValue>(results: Vec<AsyncResult<T>>) -> AsyncResult<T> {
    race_with_log(results, |winner| winner.clone(), log_short_circuited)
}

fn log_short_circuited(err: &VendError) {
    tracing::error!(?err, "short-circuited task failed");
}

pub(crate) fn race_with_log<T, U, F, L>(
    results: Vec<AsyncResult<T>>,
    on_first: F,
    log: L,
) -> AsyncResult<U>
where
    T: ResultValue,
    U: ResultValue,
    F: FnOnce(&VendResult<T>) -> VendResult<U> + 'static + Send,
    L: Fn(&VendError) + 'static + Send + Sync,
{
    let (completer, out) = AsyncResult::create();

    if results.is_empty() {
        completer
            .set_failure(VendError::other("cannot race an empty set of results"));
        return out;
    }

    let winner_chosen = Arc::new(AtomicBool::new(false));
    let handler = Arc::new(Mutex::new(Some((completer, on_first))));
    let log = Arc::new(log);

    for result in results {
        let winner_chosen = winner_chosen.clone();
        let handler = handler.clone();
        let log = log.clone();
        result.on_complete(move |r| {
            if winner_chosen
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let taken = handler.lock().unwrap().take();
                if let Some((completer, on_first)) = taken {
                    completer.complete(catch(move || on_first(r)));
                }
            } else if let Err(err) = r {
                if !err.is_cancelled() {
                    log(err);
                }
            }
        });
    }

    out
}
